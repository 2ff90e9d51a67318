//! Eastmoney 시세 API 클라이언트 (중국 A주).
//!
//! Eastmoney 공개 시세 게이트웨이를 통해 A주 데이터를 수집합니다.
//!
//! # 지원 데이터
//!
//! - OHLCV 일별 시세 (kline)
//! - 종목 기본 정보 (코드, 종목명, 거래소/보드 구분)
//! - 펀더멘털 스냅샷 (PER, PBR, 시가총액)
//!
//! 뉴스는 이 벤더로 수집하지 않습니다. 뉴스 조회는 Finnhub 벤더가
//! 담당합니다.

use analyst_core::{BasicInfo, EastmoneyConfig, OhlcvBar, Payload};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DataError, Result};
use crate::provider::{FetchOutcome, RateLimiter, UpstreamFetcher};

/// Eastmoney API 클라이언트.
pub struct EastmoneyFetcher {
    client: reqwest::Client,
    base_url: String,
    limiter: RateLimiter,
}

/// kline 응답 래퍼.
#[derive(Debug, Deserialize)]
struct KlineResponse {
    data: Option<KlineData>,
}

#[derive(Debug, Deserialize)]
struct KlineData {
    #[serde(default)]
    klines: Vec<String>,
}

/// 시세 스냅샷 응답 래퍼.
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    data: Option<QuoteData>,
}

/// 시세 스냅샷. 필드 값은 숫자 또는 "-"(결측)로 내려옵니다.
#[derive(Debug, Deserialize)]
struct QuoteData {
    /// 종목 코드
    #[serde(rename = "f57", default)]
    code: Option<String>,
    /// 종목명
    #[serde(rename = "f58", default)]
    name: Option<String>,
    /// PER (TTM)
    #[serde(rename = "f162", default)]
    pe_ttm: Option<serde_json::Value>,
    /// PBR
    #[serde(rename = "f167", default)]
    pb: Option<serde_json::Value>,
    /// 시가총액
    #[serde(rename = "f116", default)]
    market_cap: Option<serde_json::Value>,
}

impl EastmoneyFetcher {
    /// 설정으로 클라이언트를 생성합니다.
    pub fn new(config: &EastmoneyConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("HTTP client build failed"),
            base_url: config.base_url.clone(),
            limiter: RateLimiter::new(Duration::from_millis(config.min_interval_ms)),
        }
    }

    /// Eastmoney 마켓 식별자를 포함한 secid.
    ///
    /// 상하이 종목(60/68/90 접두사)은 `1.`, 나머지는 `0.` 접두사입니다.
    fn secid(symbol: &str) -> String {
        if symbol.starts_with("60") || symbol.starts_with("68") || symbol.starts_with("90") {
            format!("1.{}", symbol)
        } else {
            format!("0.{}", symbol)
        }
    }

    /// 간격 제한을 적용한 JSON GET 요청.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        self.limiter.acquire().await;

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Eastmoney API 요청");

        let response = self.client.get(&url).query(params).send().await?;

        if !response.status().is_success() {
            return Err(DataError::Transport(format!(
                "Eastmoney API error [{}]: {}",
                path,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

/// kline 한 줄을 OHLCV 레코드로 파싱합니다.
///
/// 형식: `date,open,close,high,low,volume` (fields2=f51..f56).
fn parse_kline_line(symbol: &str, line: &str) -> Option<OhlcvBar> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 6 {
        return None;
    }

    Some(OhlcvBar {
        symbol: symbol.to_string(),
        date: NaiveDate::parse_from_str(parts[0], "%Y-%m-%d").ok()?,
        open: parts[1].parse().ok()?,
        close: parts[2].parse().ok()?,
        high: parts[3].parse().ok()?,
        low: parts[4].parse().ok()?,
        volume: parts[5].parse::<f64>().ok()? as i64,
    })
}

/// 숫자 또는 "-"로 내려오는 스냅샷 값을 Decimal로 변환합니다.
fn value_to_decimal(value: &Option<serde_json::Value>) -> Option<Decimal> {
    match value {
        Some(serde_json::Value::Number(n)) => n.to_string().parse().ok(),
        Some(serde_json::Value::String(s)) if s != "-" => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl UpstreamFetcher for EastmoneyFetcher {
    fn vendor(&self) -> &'static str {
        "eastmoney"
    }

    async fn fetch_stock_data(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchOutcome> {
        let secid = Self::secid(symbol);
        let beg = start.format("%Y%m%d").to_string();
        let end_param = end.format("%Y%m%d").to_string();

        let response: KlineResponse = self
            .get_json(
                "/api/qt/stock/kline/get",
                &[
                    ("secid", secid.as_str()),
                    ("klt", "101"),
                    ("fqt", "1"),
                    ("beg", beg.as_str()),
                    ("end", end_param.as_str()),
                    ("fields1", "f1,f2,f3"),
                    ("fields2", "f51,f52,f53,f54,f55,f56"),
                ],
            )
            .await?;

        let Some(data) = response.data else {
            return Ok(FetchOutcome::Empty);
        };

        let bars: Vec<OhlcvBar> = data
            .klines
            .iter()
            .filter_map(|line| parse_kline_line(symbol, line))
            .collect();

        if bars.is_empty() {
            return Ok(FetchOutcome::Empty);
        }

        info!(symbol = %symbol, count = bars.len(), "A주 시세 조회 완료");
        Ok(FetchOutcome::Data(Payload::Ohlcv(bars)))
    }

    async fn fetch_news(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<FetchOutcome> {
        Err(DataError::ConfigError(
            "News is not available from the eastmoney vendor".to_string(),
        ))
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> Result<FetchOutcome> {
        let secid = Self::secid(symbol);
        let response: QuoteResponse = self
            .get_json(
                "/api/qt/stock/get",
                &[
                    ("secid", secid.as_str()),
                    ("fields", "f57,f58,f116,f162,f167"),
                ],
            )
            .await?;

        let Some(data) = response.data else {
            return Ok(FetchOutcome::Empty);
        };

        let name = data.name.clone().unwrap_or_else(|| symbol.to_string());
        let mut report = format!("# Fundamentals: {} ({})\n\n", name, symbol);
        match value_to_decimal(&data.pe_ttm) {
            Some(pe) => report.push_str(&format!("- PE (TTM): {}\n", pe)),
            None => report.push_str("- PE (TTM): n/a\n"),
        }
        match value_to_decimal(&data.pb) {
            Some(pb) => report.push_str(&format!("- PB: {}\n", pb)),
            None => report.push_str("- PB: n/a\n"),
        }
        if let Some(cap) = value_to_decimal(&data.market_cap) {
            report.push_str(&format!("- Market cap: {}\n", cap));
        }
        report.push_str("\nSource: eastmoney\n");

        info!(symbol = %symbol, "A주 펀더멘털 조회 완료");
        Ok(FetchOutcome::Data(Payload::Text(report)))
    }

    async fn fetch_basic_info(&self, symbol: &str) -> Result<Option<BasicInfo>> {
        let secid = Self::secid(symbol);
        let response: QuoteResponse = self
            .get_json("/api/qt/stock/get", &[("secid", secid.as_str()), ("fields", "f57,f58")])
            .await?;

        let Some(data) = response.data else {
            return Ok(None);
        };

        let code = data.code.unwrap_or_else(|| symbol.to_string());
        let name = match data.name {
            Some(name) => name,
            None => return Ok(None),
        };

        Ok(Some(BasicInfo {
            market: analyst_core::exchange_name(&code).to_string(),
            category: analyst_core::board_category(&code).to_string(),
            code,
            name,
            source: "eastmoney".to_string(),
            updated_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher_for(url: &str) -> EastmoneyFetcher {
        EastmoneyFetcher::new(&EastmoneyConfig {
            base_url: url.to_string(),
            min_interval_ms: 0,
        })
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_secid() {
        assert_eq!(EastmoneyFetcher::secid("600519"), "1.600519");
        assert_eq!(EastmoneyFetcher::secid("688981"), "1.688981");
        assert_eq!(EastmoneyFetcher::secid("000001"), "0.000001");
        assert_eq!(EastmoneyFetcher::secid("300750"), "0.300750");
    }

    #[test]
    fn test_parse_kline_line() {
        let bar = parse_kline_line("000001", "2024-01-02,10.25,10.49,10.61,10.10,987654").unwrap();
        assert_eq!(bar.date, date(2024, 1, 2));
        assert_eq!(bar.open, Decimal::new(1025, 2));
        assert_eq!(bar.close, Decimal::new(1049, 2));
        assert_eq!(bar.high, Decimal::new(1061, 2));
        assert_eq!(bar.low, Decimal::new(1010, 2));
        assert_eq!(bar.volume, 987_654);

        assert!(parse_kline_line("000001", "not,a,kline").is_none());
    }

    #[test]
    fn test_value_to_decimal() {
        let number = Some(serde_json::json!(5.6));
        assert_eq!(value_to_decimal(&number), Some(Decimal::new(56, 1)));

        let missing = Some(serde_json::json!("-"));
        assert_eq!(value_to_decimal(&missing), None);
        assert_eq!(value_to_decimal(&None), None);
    }

    #[tokio::test]
    async fn test_fetch_stock_data_normalizes_klines() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/qt/stock/kline/get")
            .match_query(mockito::Matcher::Any)
            .with_body(
                r#"{"data":{"code":"000001","name":"Ping An Bank","klines":[
                    "2024-01-02,10.25,10.49,10.61,10.10,987654",
                    "2024-01-03,10.49,10.30,10.55,10.21,654321"
                ]}}"#,
            )
            .create_async()
            .await;

        let fetcher = fetcher_for(&server.url());
        let outcome = fetcher
            .fetch_stock_data("000001", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();

        match outcome {
            FetchOutcome::Data(Payload::Ohlcv(bars)) => {
                assert_eq!(bars.len(), 2);
                assert_eq!(bars[0].symbol, "000001");
                assert_eq!(bars[1].date, date(2024, 1, 3));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_stock_data_empty_range() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/qt/stock/kline/get")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"data":{"code":"000001","name":"Ping An Bank","klines":[]}}"#)
            .create_async()
            .await;

        let fetcher = fetcher_for(&server.url());
        let outcome = fetcher
            .fetch_stock_data("000001", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Empty);
    }

    #[tokio::test]
    async fn test_fetch_stock_data_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/qt/stock/kline/get")
            .match_query(mockito::Matcher::Any)
            .with_status(502)
            .create_async()
            .await;

        let fetcher = fetcher_for(&server.url());
        let result = fetcher
            .fetch_stock_data("000001", date(2024, 1, 1), date(2024, 1, 31))
            .await;

        assert!(matches!(result, Err(DataError::Transport(_))));
    }

    #[tokio::test]
    async fn test_fetch_basic_info() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/qt/stock/get")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"data":{"f57":"600519","f58":"Kweichow Moutai"}}"#)
            .create_async()
            .await;

        let fetcher = fetcher_for(&server.url());
        let info = fetcher.fetch_basic_info("600519").await.unwrap().unwrap();

        assert_eq!(info.code, "600519");
        assert_eq!(info.name, "Kweichow Moutai");
        assert_eq!(info.market, "Shanghai");
        assert_eq!(info.category, "SSE Main Board");
        assert_eq!(info.source, "eastmoney");
    }
}
