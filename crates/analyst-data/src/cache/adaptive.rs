//! 적응형 캐시 퍼사드.
//!
//! 연산마다 탐지된 기본 백엔드를 먼저 시도하고, 어떤 실패든 파일
//! 저장소로 폴백합니다. 호출자 관점에서 캐싱은 항상 best-effort이며
//! 이 모듈의 공개 연산은 오류를 전파하지 않습니다.
//!
//! 백엔드 간 데이터 이관/동기화는 하지 않습니다. 한 백엔드에 기록된
//! 값은 다른 백엔드에서 보이지 않으며, 이는 의도된 단순화입니다.

use analyst_core::{DataKind, Market, Payload};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::detect::BackendRegistry;
use crate::policy::{cache_key, TtlPolicy};
use crate::storage::{
    BackendKind, CacheBackend, CacheMetadata, CachedRecord, DocumentStore, FileStore, RedisStore,
};

/// 캐시 통계.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// 기본 백엔드
    pub primary: BackendKind,
    /// Redis 가용 여부
    pub redis_available: bool,
    /// 문서 저장소 가용 여부
    pub document_available: bool,
    /// 파일 캐시 항목 수
    pub file_entries: usize,
    /// 문서 저장소 문서 수 (연결된 경우)
    pub document_count: Option<i64>,
    /// Redis 키 수 (연결된 경우)
    pub redis_keys: Option<i64>,
}

/// 적응형 캐시 퍼사드.
#[derive(Clone)]
pub struct AdaptiveCache {
    redis: Option<RedisStore>,
    document: Option<DocumentStore>,
    file: FileStore,
    primary: BackendKind,
    policy: TtlPolicy,
}

impl AdaptiveCache {
    /// 탐지된 레지스트리로 퍼사드를 구성합니다.
    pub fn new(registry: &BackendRegistry, file: FileStore, policy: TtlPolicy) -> Self {
        Self::with_parts(
            registry.redis().cloned(),
            registry.document().cloned(),
            file,
            registry.status().primary,
            policy,
        )
    }

    pub(crate) fn with_parts(
        redis: Option<RedisStore>,
        document: Option<DocumentStore>,
        file: FileStore,
        primary: BackendKind,
        policy: TtlPolicy,
    ) -> Self {
        Self {
            redis,
            document,
            file,
            primary,
            policy,
        }
    }

    /// TTL 정책.
    pub fn policy(&self) -> &TtlPolicy {
        &self.policy
    }

    /// 파일 저장소 핸들 (정리/구조 경로용).
    pub fn file_store(&self) -> &FileStore {
        &self.file
    }

    /// 기본 백엔드 핸들. 핸들이 없으면 None (즉시 파일 폴백 대상).
    fn primary_backend(&self) -> Option<&dyn CacheBackend> {
        match self.primary {
            BackendKind::Redis => self.redis.as_ref().map(|s| s as &dyn CacheBackend),
            BackendKind::Document => self.document.as_ref().map(|s| s as &dyn CacheBackend),
            BackendKind::File => Some(&self.file),
        }
    }

    /// 페이로드를 캐시에 기록하고 캐시 키를 반환합니다.
    ///
    /// TTL은 정책 테이블에서 계산합니다. 기본 백엔드가 실패하면 파일
    /// 저장소로 폴백하며, 모든 백엔드가 실패해도 오류를 전파하지 않고
    /// None을 반환합니다.
    pub async fn write(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        source: &str,
        kind: DataKind,
        payload: &Payload,
    ) -> Option<String> {
        let market = Market::classify(symbol);
        let key = cache_key(symbol, start, end, source, kind);
        let metadata = CacheMetadata {
            symbol: symbol.to_string(),
            start_date: start,
            end_date: end,
            source: source.to_string(),
            kind,
            market,
        };
        let ttl_secs = self.policy.ttl_secs(market, kind);

        if let Some(primary) = self.primary_backend() {
            match primary.put(&key, payload, &metadata, ttl_secs).await {
                Ok(()) => {
                    info!(symbol = %symbol, key = %key, backend = %primary.kind(), "캐시 저장 완료");
                    return Some(key);
                }
                Err(e) if primary.kind() == BackendKind::File => {
                    error!(symbol = %symbol, error = %e, "파일 캐시 저장 실패");
                    return None;
                }
                Err(e) => {
                    warn!(
                        symbol = %symbol,
                        backend = %primary.kind(),
                        error = %e,
                        "기본 백엔드 저장 실패, 파일 캐시로 폴백"
                    );
                }
            }
        }

        match self.file.put(&key, payload, &metadata, ttl_secs).await {
            Ok(()) => {
                info!(symbol = %symbol, key = %key, backend = %BackendKind::File, "캐시 저장 완료 (폴백)");
                Some(key)
            }
            Err(e) => {
                error!(symbol = %symbol, error = %e, "파일 캐시 폴백 저장 실패");
                None
            }
        }
    }

    /// 키로 캐시를 조회합니다.
    ///
    /// 기본 백엔드 미스/오류 시 파일 저장소를 시도합니다. 파일 백엔드
    /// 항목은 네이티브 만료가 없으므로 여기서 명시적으로 나이를
    /// 검증합니다.
    pub async fn read(&self, key: &str) -> Option<CachedRecord> {
        let mut record = None;

        if let Some(primary) = self.primary_backend() {
            match primary.get(key).await {
                Ok(found) => record = found,
                Err(e) => {
                    debug!(key = %key, backend = %primary.kind(), error = %e, "기본 백엔드 조회 실패, 파일 캐시 시도");
                }
            }
        }

        if record.is_none() && self.primary != BackendKind::File {
            record = match self.file.get(key).await {
                Ok(found) => found,
                Err(e) => {
                    debug!(key = %key, error = %e, "파일 캐시 조회 실패");
                    None
                }
            };
        }

        let record = record?;

        if record.backend == BackendKind::File {
            let ttl_secs = self
                .policy
                .ttl_secs(record.metadata.market, record.metadata.kind);
            if record.is_expired(ttl_secs) {
                debug!(key = %key, "파일 캐시 항목 만료");
                return None;
            }
        }

        Some(record)
    }

    /// 요청 파라미터로 키를 재파생해 유효한 캐시 항목을 찾습니다.
    pub async fn find(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        source: &str,
        kind: DataKind,
    ) -> Option<CachedRecord> {
        let key = cache_key(symbol, start, end, source, kind);
        self.read(&key).await
    }

    /// 캐시 통계를 수집합니다.
    pub async fn stats(&self) -> CacheStats {
        let document_count = match &self.document {
            Some(store) => store.document_count().await.ok(),
            None => None,
        };
        let redis_keys = match &self.redis {
            Some(store) => store.key_count().await.ok(),
            None => None,
        };

        CacheStats {
            primary: self.primary,
            redis_available: self.redis.is_some(),
            document_available: self.document.is_some(),
            file_entries: self.file.entry_count(),
            document_count,
            redis_keys,
        }
    }
}
