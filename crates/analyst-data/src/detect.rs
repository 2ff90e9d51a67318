//! 백엔드 탐지.
//!
//! 시작 시 선택적 백엔드(Redis, 문서 저장소)에 짧은 타임아웃으로 연결을
//! 시도하고, 가용한 것 중 우선순위가 가장 높은 백엔드를 기본(primary)으로
//! 선택합니다. 어떤 실패도 치명적이지 않으며 가용성만 낮춥니다.
//!
//! 핫 경로를 가볍게 유지하기 위해 재탐지는 요청마다 암묵적으로 일어나지
//! 않고 `redetect` 호출로만 수행됩니다.

use analyst_core::AppConfig;
use serde::Serialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::storage::{
    BackendKind, DocumentStore, DocumentStoreConfig, RedisStore, RedisStoreConfig,
};

/// 탐지 결과 스냅샷.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    /// Redis 가용 여부
    pub redis_available: bool,
    /// 문서 저장소 가용 여부
    pub document_available: bool,
    /// 선택된 기본 백엔드
    pub primary: BackendKind,
}

/// 연결된 백엔드 핸들 묶음.
///
/// 프로세스 수명 동안 하나만 구성해 파이프라인 연산에 명시적으로
/// 전달합니다. 핸들 자체가 동시 사용을 허용합니다 (연결 풀은 드라이버가
/// 관리).
#[derive(Clone)]
pub struct BackendRegistry {
    redis: Option<RedisStore>,
    document: Option<DocumentStore>,
    status: BackendStatus,
}

/// 가용성 기준 우선순위: redis > document > file.
fn choose_primary(redis_available: bool, document_available: bool) -> BackendKind {
    if redis_available {
        BackendKind::Redis
    } else if document_available {
        BackendKind::Document
    } else {
        BackendKind::File
    }
}

impl BackendRegistry {
    /// 연결 후 왕복 확인까지 통과해야 가용으로 판정합니다.
    async fn probe_redis(config: &RedisStoreConfig) -> crate::error::Result<RedisStore> {
        let store = RedisStore::connect(config).await?;
        if !store.health_check().await? {
            return Err(crate::error::DataError::ConnectionError(
                "Redis ping failed".to_string(),
            ));
        }
        Ok(store)
    }

    async fn probe_document(
        config: &DocumentStoreConfig,
    ) -> crate::error::Result<DocumentStore> {
        let store = DocumentStore::connect(config).await?;
        if !store.health_check().await? {
            return Err(crate::error::DataError::ConnectionError(
                "Document store round trip failed".to_string(),
            ));
        }
        Ok(store)
    }

    /// 설정된 백엔드를 탐지하고 레지스트리를 구성합니다.
    ///
    /// 연결 시도는 `connect_timeout_secs`로 제한되며 실패는 경고 로그 후
    /// 해당 백엔드만 비활성화합니다.
    pub async fn detect(config: &AppConfig) -> Self {
        let redis = if config.redis.enabled {
            let store_config = RedisStoreConfig {
                url: config.redis.url.clone(),
            };
            match timeout(
                Duration::from_secs(config.redis.connect_timeout_secs),
                Self::probe_redis(&store_config),
            )
            .await
            {
                Ok(Ok(store)) => Some(store),
                Ok(Err(e)) => {
                    warn!(error = %e, "Redis 탐지 실패, 비활성화");
                    None
                }
                Err(_) => {
                    warn!(
                        timeout_secs = config.redis.connect_timeout_secs,
                        "Redis 탐지 타임아웃, 비활성화"
                    );
                    None
                }
            }
        } else {
            info!("Redis 비활성화됨 (설정)");
            None
        };

        let document = if config.document.enabled {
            let store_config = DocumentStoreConfig {
                url: config.document.url.clone(),
                max_connections: config.document.max_connections,
            };
            match timeout(
                Duration::from_secs(config.document.connect_timeout_secs),
                Self::probe_document(&store_config),
            )
            .await
            {
                Ok(Ok(store)) => Some(store),
                Ok(Err(e)) => {
                    warn!(error = %e, "문서 저장소 탐지 실패, 비활성화");
                    None
                }
                Err(_) => {
                    warn!(
                        timeout_secs = config.document.connect_timeout_secs,
                        "문서 저장소 탐지 타임아웃, 비활성화"
                    );
                    None
                }
            }
        } else {
            info!("문서 저장소 비활성화됨 (설정)");
            None
        };

        let status = BackendStatus {
            redis_available: redis.is_some(),
            document_available: document.is_some(),
            primary: choose_primary(redis.is_some(), document.is_some()),
        };

        info!(
            redis = status.redis_available,
            document = status.document_available,
            primary = %status.primary,
            "백엔드 탐지 완료"
        );

        Self {
            redis,
            document,
            status,
        }
    }

    /// 명시적 재탐지. 기존 핸들을 버리고 처음부터 다시 탐지합니다.
    pub async fn redetect(&mut self, config: &AppConfig) {
        *self = Self::detect(config).await;
    }

    /// 데이터베이스 백엔드 없이 파일 전용 레지스트리를 구성합니다.
    pub fn offline() -> Self {
        Self {
            redis: None,
            document: None,
            status: BackendStatus {
                redis_available: false,
                document_available: false,
                primary: BackendKind::File,
            },
        }
    }

    /// Redis 핸들.
    pub fn redis(&self) -> Option<&RedisStore> {
        self.redis.as_ref()
    }

    /// 문서 저장소 핸들.
    pub fn document(&self) -> Option<&DocumentStore> {
        self.document.as_ref()
    }

    /// 탐지 결과 스냅샷.
    pub fn status(&self) -> BackendStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_priority() {
        assert_eq!(choose_primary(true, true), BackendKind::Redis);
        assert_eq!(choose_primary(true, false), BackendKind::Redis);
        assert_eq!(choose_primary(false, true), BackendKind::Document);
        assert_eq!(choose_primary(false, false), BackendKind::File);
    }

    #[tokio::test]
    async fn test_detect_with_all_disabled() {
        // enabled=false인 백엔드는 탐지 자체를 건너뛴다
        let config = AppConfig::default();
        let registry = BackendRegistry::detect(&config).await;

        let status = registry.status();
        assert!(!status.redis_available);
        assert!(!status.document_available);
        assert_eq!(status.primary, BackendKind::File);
        assert!(registry.redis().is_none());
        assert!(registry.document().is_none());
    }

    #[test]
    fn test_offline_registry() {
        let registry = BackendRegistry::offline();
        assert_eq!(registry.status().primary, BackendKind::File);
    }
}
