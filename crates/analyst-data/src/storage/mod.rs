//! 계층형 저장 백엔드.
//!
//! 모든 백엔드는 동일한 put/get 계약(`CacheBackend`)을 구현하지만
//! 만료 의미론은 서로 다릅니다:
//! - **Redis**: 쓰기 시점에 네이티브 TTL 설정, get은 단일 조회로 충분
//! - **문서 저장소**: 명시적 `expires_at` 컬럼, get이 현재 시각과 재검증
//! - **파일**: 만료 개념이 없으므로 유효성은 호출자가 `created_at + ttl`로 계산

pub mod document;
pub mod file;
pub mod redis;

pub use document::{DocumentStore, DocumentStoreConfig};
pub use file::FileStore;
pub use redis::{RedisStore, RedisStoreConfig};

use analyst_core::{DataKind, Market, Payload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// 저장 백엔드 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// 만료형 키-값 저장소
    Redis,
    /// 문서 저장소
    Document,
    /// 파일 저장소
    File,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Redis => "redis",
            BackendKind::Document => "document",
            BackendKind::File => "file",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 캐시 항목에 기록되는 원본 요청 파라미터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// 종목 코드
    pub symbol: String,
    /// 조회 구간 시작 (구간이 없는 데이터 종류는 None)
    pub start_date: Option<chrono::NaiveDate>,
    /// 조회 구간 끝
    pub end_date: Option<chrono::NaiveDate>,
    /// 데이터 출처 (벤더명)
    pub source: String,
    /// 데이터 종류
    pub kind: DataKind,
    /// 시장 분류
    pub market: Market,
}

/// 백엔드에서 읽어낸 캐시 항목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRecord {
    /// 저장된 페이로드
    pub payload: Payload,
    /// 원본 요청 파라미터
    pub metadata: CacheMetadata,
    /// 항목 생성 시각
    pub created_at: DateTime<Utc>,
    /// 이 항목을 보관했던 백엔드
    pub backend: BackendKind,
}

impl CachedRecord {
    /// 항목의 현재 나이.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }

    /// `created_at + ttl`이 지났는지 확인합니다.
    ///
    /// 파일 백엔드처럼 네이티브 만료가 없는 저장소의 읽기 경로에서 사용합니다.
    pub fn is_expired(&self, ttl_secs: u64) -> bool {
        self.age() > chrono::Duration::seconds(ttl_secs as i64)
    }
}

/// 백엔드별 put/get 능력 인터페이스.
///
/// 백엔드 선택은 런타임 속성 탐색이 아니라 탐지 결과 설정으로 이뤄집니다.
/// `get`이 반환하는 항목의 신선도 보장은 백엔드 의미론을 따릅니다
/// (모듈 문서 참고): 파일 백엔드 항목은 호출자가 나이를 검증해야 합니다.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// 백엔드 종류.
    fn kind(&self) -> BackendKind;

    /// 항목을 저장합니다. 같은 키에 대한 쓰기는 멱등 upsert입니다.
    async fn put(
        &self,
        key: &str,
        payload: &Payload,
        metadata: &CacheMetadata,
        ttl_secs: u64,
    ) -> Result<()>;

    /// 키로 항목을 조회합니다.
    async fn get(&self, key: &str) -> Result<Option<CachedRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(created_at: DateTime<Utc>) -> CachedRecord {
        CachedRecord {
            payload: Payload::Text("x".to_string()),
            metadata: CacheMetadata {
                symbol: "000001".to_string(),
                start_date: None,
                end_date: None,
                source: "test".to_string(),
                kind: DataKind::StockData,
                market: Market::China,
            },
            created_at,
            backend: BackendKind::File,
        }
    }

    #[test]
    fn test_ttl_boundary() {
        let ttl = 3_600u64;
        // t0 + T - ε 시점: 유효
        let fresh = record(Utc::now() - Duration::seconds(ttl as i64 - 5));
        assert!(!fresh.is_expired(ttl));

        // t0 + T + ε 시점: 만료
        let expired = record(Utc::now() - Duration::seconds(ttl as i64 + 5));
        assert!(expired.is_expired(ttl));
    }

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::Redis.to_string(), "redis");
        assert_eq!(BackendKind::Document.to_string(), "document");
        assert_eq!(BackendKind::File.to_string(), "file");
    }
}
