//! Finnhub API 클라이언트 (미국 주식 + 뉴스).
//!
//! API 키가 필요합니다. 키가 설정되지 않으면 이 벤더만 비활성화되고
//! (`ConfigError`), 프로세스 전체에는 영향을 주지 않습니다.
//!
//! # 지원 데이터
//!
//! - OHLCV 일별 캔들
//! - 종목 뉴스 (회사 뉴스, 시장 무관)
//! - 펀더멘털 지표 스냅샷
//! - 회사 프로필 (기본 정보)

use analyst_core::{BasicInfo, FinnhubConfig, NewsItem, OhlcvBar, Payload};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DataError, Result};
use crate::provider::{FetchOutcome, RateLimiter, UpstreamFetcher};

/// Finnhub API 클라이언트.
pub struct FinnhubFetcher {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: RateLimiter,
}

/// 캔들 응답. 필드별 병렬 배열 형태입니다.
#[derive(Debug, Deserialize)]
struct CandleResponse {
    /// 상태 ("ok" | "no_data")
    s: String,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
}

/// 회사 뉴스 항목.
#[derive(Debug, Deserialize)]
struct RawNewsItem {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    datetime: i64,
    #[serde(default)]
    url: Option<String>,
}

/// 회사 프로필.
#[derive(Debug, Deserialize)]
struct Profile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    exchange: Option<String>,
    #[serde(rename = "finnhubIndustry", default)]
    industry: Option<String>,
}

/// 펀더멘털 지표 응답.
#[derive(Debug, Deserialize)]
struct MetricResponse {
    #[serde(default)]
    metric: serde_json::Map<String, serde_json::Value>,
}

impl FinnhubFetcher {
    /// 설정으로 클라이언트를 생성합니다.
    pub fn new(config: &FinnhubConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("HTTP client build failed"),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            limiter: RateLimiter::new(Duration::from_millis(config.min_interval_ms)),
        }
    }

    /// API 키가 설정됐는지 확인합니다.
    fn require_key(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(DataError::ConfigError(
                "Finnhub API key is not configured".to_string(),
            ));
        }
        Ok(())
    }

    /// 간격 제한을 적용한 JSON GET 요청.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        self.require_key()?;
        self.limiter.acquire().await;

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Finnhub API 요청");

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::Transport(format!(
                "Finnhub API error [{}]: {}",
                path,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

/// 병렬 배열 캔들 응답을 OHLCV 레코드로 정규화합니다.
fn normalize_candles(symbol: &str, response: &CandleResponse) -> Vec<OhlcvBar> {
    let count = response
        .t
        .len()
        .min(response.o.len())
        .min(response.h.len())
        .min(response.l.len())
        .min(response.c.len())
        .min(response.v.len());

    (0..count)
        .filter_map(|i| {
            let date = DateTime::<Utc>::from_timestamp(response.t[i], 0)?.date_naive();
            Some(OhlcvBar {
                symbol: symbol.to_string(),
                date,
                open: Decimal::from_f64(response.o[i])?,
                high: Decimal::from_f64(response.h[i])?,
                low: Decimal::from_f64(response.l[i])?,
                close: Decimal::from_f64(response.c[i])?,
                volume: response.v[i] as i64,
            })
        })
        .collect()
}

#[async_trait]
impl UpstreamFetcher for FinnhubFetcher {
    fn vendor(&self) -> &'static str {
        "finnhub"
    }

    async fn fetch_stock_data(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchOutcome> {
        let from = start
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc().timestamp())
            .unwrap_or_default()
            .to_string();
        let to = end
            .and_hms_opt(23, 59, 59)
            .map(|t| t.and_utc().timestamp())
            .unwrap_or_default()
            .to_string();

        let response: CandleResponse = self
            .get_json(
                "/stock/candle",
                &[
                    ("symbol", symbol),
                    ("resolution", "D"),
                    ("from", from.as_str()),
                    ("to", to.as_str()),
                ],
            )
            .await?;

        if response.s == "no_data" {
            return Ok(FetchOutcome::Empty);
        }

        let bars = normalize_candles(symbol, &response);
        if bars.is_empty() {
            return Ok(FetchOutcome::Empty);
        }

        info!(symbol = %symbol, count = bars.len(), "미국 시세 조회 완료");
        Ok(FetchOutcome::Data(Payload::Ohlcv(bars)))
    }

    async fn fetch_news(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchOutcome> {
        let from = start.to_string();
        let to = end.to_string();

        let raw: Vec<RawNewsItem> = self
            .get_json(
                "/company-news",
                &[("symbol", symbol), ("from", from.as_str()), ("to", to.as_str())],
            )
            .await?;

        let items: Vec<NewsItem> = raw
            .into_iter()
            .filter_map(|item| {
                let published_at = DateTime::<Utc>::from_timestamp(item.datetime, 0)?;
                Some(NewsItem {
                    symbol: symbol.to_string(),
                    title: item.headline,
                    summary: item.summary,
                    source: item.source,
                    published_at,
                    url: item.url,
                })
            })
            .collect();

        if items.is_empty() {
            return Ok(FetchOutcome::Empty);
        }

        info!(symbol = %symbol, count = items.len(), "뉴스 조회 완료");
        Ok(FetchOutcome::Data(Payload::News(items)))
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> Result<FetchOutcome> {
        let response: MetricResponse = self
            .get_json("/stock/metric", &[("symbol", symbol), ("metric", "all")])
            .await?;

        if response.metric.is_empty() {
            return Ok(FetchOutcome::Empty);
        }

        let mut report = format!("# Fundamentals: {}\n\n", symbol);
        for (label, field) in [
            ("PE (TTM)", "peTTM"),
            ("PB", "pbQuarterly"),
            ("Market cap (M)", "marketCapitalization"),
            ("52w high", "52WeekHigh"),
            ("52w low", "52WeekLow"),
        ] {
            match response.metric.get(field) {
                Some(serde_json::Value::Number(n)) => {
                    report.push_str(&format!("- {}: {}\n", label, n));
                }
                _ => report.push_str(&format!("- {}: n/a\n", label)),
            }
        }
        report.push_str("\nSource: finnhub\n");

        info!(symbol = %symbol, "펀더멘털 조회 완료");
        Ok(FetchOutcome::Data(Payload::Text(report)))
    }

    async fn fetch_basic_info(&self, symbol: &str) -> Result<Option<BasicInfo>> {
        let profile: Profile = self
            .get_json("/stock/profile2", &[("symbol", symbol)])
            .await?;

        let Some(name) = profile.name else {
            return Ok(None);
        };

        Ok(Some(BasicInfo {
            code: profile.ticker.unwrap_or_else(|| symbol.to_string()),
            name,
            market: profile.exchange.unwrap_or_else(|| "Unknown".to_string()),
            category: profile.industry.unwrap_or_else(|| "Other".to_string()),
            source: "finnhub".to_string(),
            updated_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher_for(url: &str) -> FinnhubFetcher {
        FinnhubFetcher::new(&FinnhubConfig {
            base_url: url.to_string(),
            api_key: "test-key".to_string(),
            min_interval_ms: 0,
        })
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let fetcher = FinnhubFetcher::new(&FinnhubConfig {
            base_url: "http://localhost".to_string(),
            api_key: String::new(),
            min_interval_ms: 0,
        });

        let result = fetcher
            .fetch_stock_data("AAPL", date(2024, 1, 1), date(2024, 1, 31))
            .await;
        assert!(matches!(result, Err(DataError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_fetch_stock_data_normalizes_candles() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/stock/candle")
            .match_query(mockito::Matcher::Any)
            .with_body(
                r#"{"s":"ok","t":[1704153600,1704240000],"o":[185.0,186.5],
                    "h":[186.0,187.2],"l":[184.2,185.9],"c":[185.6,186.9],"v":[1000.0,2000.0]}"#,
            )
            .create_async()
            .await;

        let fetcher = fetcher_for(&server.url());
        let outcome = fetcher
            .fetch_stock_data("AAPL", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();

        match outcome {
            FetchOutcome::Data(Payload::Ohlcv(bars)) => {
                assert_eq!(bars.len(), 2);
                assert_eq!(bars[0].symbol, "AAPL");
                assert_eq!(bars[0].volume, 1000);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_stock_data_no_data() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/stock/candle")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"s":"no_data"}"#)
            .create_async()
            .await;

        let fetcher = fetcher_for(&server.url());
        let outcome = fetcher
            .fetch_stock_data("AAPL", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Empty);
    }

    #[tokio::test]
    async fn test_fetch_news_maps_items() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/company-news")
            .match_query(mockito::Matcher::Any)
            .with_body(
                r#"[{"headline":"Apple launches product","summary":"...",
                     "source":"Reuters","datetime":1704223941,"url":"https://example.com/a"}]"#,
            )
            .create_async()
            .await;

        let fetcher = fetcher_for(&server.url());
        let outcome = fetcher
            .fetch_news("AAPL", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();

        match outcome {
            FetchOutcome::Data(Payload::News(items)) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].title, "Apple launches product");
                assert_eq!(items[0].symbol, "AAPL");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_basic_info_unknown_symbol() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/stock/profile2")
            .match_query(mockito::Matcher::Any)
            .with_body("{}")
            .create_async()
            .await;

        let fetcher = fetcher_for(&server.url());
        assert!(fetcher.fetch_basic_info("ZZZZ").await.unwrap().is_none());
    }
}
