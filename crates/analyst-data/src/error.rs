//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 계층 오류.
///
/// 백엔드 수준 오류는 해석 파이프라인까지 전파되지 않고
/// "사용 불가" 신호로 다음 폴백 전이에 소비됩니다.
#[derive(Debug, Error)]
pub enum DataError {
    /// 벤더/네트워크 전송 오류
    #[error("Transport error: {0}")]
    Transport(String),

    /// 백엔드 연결 오류
    #[error("Backend connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 캐시 백엔드 오류
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 직렬화/역직렬화 오류 (손상된 저장 페이로드는 캐시 미스로 취급)
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 설정 오류 (해당 백엔드/벤더 초기화에만 치명적)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 타임아웃 오류
    #[error("Operation timeout: {0}")]
    Timeout(String),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::Timeout("Connection pool timed out".to_string()),
            sqlx::Error::Io(e) => DataError::ConnectionError(e.to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            DataError::Timeout(err.to_string())
        } else {
            DataError::CacheError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DataError::Timeout(err.to_string())
        } else {
            DataError::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
