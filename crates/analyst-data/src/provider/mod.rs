//! 업스트림 벤더 Provider 모듈.
//!
//! 벤더 통합마다 fetcher 하나를 두고, 벤더별 최소 호출 간격을 강제하며
//! 응답을 통일된 페이로드 형태로 정규화합니다.
//!
//! "벤더가 응답했지만 구간에 데이터가 없음"(`FetchOutcome::Empty`)과
//! "벤더 호출 실패"(`Err`)는 구분됩니다. 해석 파이프라인이 두 경우에
//! 다르게 반응하기 때문입니다.

pub mod eastmoney;
pub mod finnhub;

pub use eastmoney::EastmoneyFetcher;
pub use finnhub::FinnhubFetcher;

use analyst_core::{BasicInfo, Payload};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::Result;

/// 벤더 호출 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 벤더가 데이터를 반환함
    Data(Payload),
    /// 벤더가 정상 응답했지만 요청 구간에 데이터가 없음
    Empty,
}

/// 벤더별 호출 간격 제한기.
///
/// 프로세스당 벤더당 하나의 공유 상태를 가지며, 모든 동시 호출자를
/// 직렬화합니다. 높은 팬아웃에서는 알려진 경합 지점입니다.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// 최소 호출 간격으로 제한기를 생성합니다.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// 직전 호출로부터 최소 간격이 지날 때까지 대기합니다.
    ///
    /// 잠금을 대기 동안 유지하므로 같은 벤더의 호출은 호출자 수와
    /// 무관하게 순차 실행됩니다.
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let next_allowed = prev + self.min_interval;
            if Instant::now() < next_allowed {
                tokio::time::sleep_until(next_allowed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// 업스트림 벤더 인터페이스.
///
/// 구현체는 호출 간격을 스스로 강제하고(`RateLimiter`), 응답을 통일된
/// 페이로드로 정규화해야 합니다.
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    /// 벤더 식별자 (캐시 키의 source 필드로 사용).
    fn vendor(&self) -> &'static str;

    /// 구간의 일별 시세를 조회합니다.
    async fn fetch_stock_data(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchOutcome>;

    /// 구간의 뉴스를 조회합니다.
    async fn fetch_news(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchOutcome>;

    /// 펀더멘털 스냅샷을 조회합니다.
    async fn fetch_fundamentals(&self, symbol: &str) -> Result<FetchOutcome>;

    /// 종목 기본 정보를 조회합니다.
    async fn fetch_basic_info(&self, symbol: &str) -> Result<Option<BasicInfo>>;
}
