//! 통일된 페이로드 구조체.
//!
//! 모든 벤더 응답은 이 모듈의 타입으로 정규화됩니다:
//! - `OhlcvBar` - 일별 시세 레코드 (테이블형)
//! - `NewsItem` - 뉴스 레코드
//! - `Payload` - 저장/반환 단위가 되는 태그된 합 타입
//!
//! 페이로드 직렬화는 명시적 계약을 따릅니다: 테이블형 데이터는
//! 정의된 레코드 구조의 JSON, 서술형 데이터는 UTF-8 텍스트입니다.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 일별 시세 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    /// 종목 코드
    pub symbol: String,
    /// 일자
    pub date: NaiveDate,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: i64,
}

/// 뉴스 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    /// 관련 종목 코드
    pub symbol: String,
    /// 제목
    pub title: String,
    /// 본문 요약
    pub summary: String,
    /// 출처
    pub source: String,
    /// 게시 시각
    pub published_at: DateTime<Utc>,
    /// 원문 링크
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// 저장/반환 단위가 되는 페이로드.
///
/// 태그된 표현으로 직렬화되므로 저장된 blob에서 형식을 추측할 필요가 없습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "value", rename_all = "snake_case")]
pub enum Payload {
    /// OHLCV 테이블
    Ohlcv(Vec<OhlcvBar>),
    /// 뉴스 목록
    News(Vec<NewsItem>),
    /// 서술형 텍스트 (펀더멘털 리포트, 오류 안내 등)
    Text(String),
}

/// 페이로드의 저장 형식 태그.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    Ohlcv,
    News,
    Text,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::Ohlcv => "ohlcv",
            PayloadFormat::News => "news",
            PayloadFormat::Text => "text",
        }
    }
}

impl Payload {
    /// 형식 태그를 반환합니다.
    pub fn format(&self) -> PayloadFormat {
        match self {
            Payload::Ohlcv(_) => PayloadFormat::Ohlcv,
            Payload::News(_) => PayloadFormat::News,
            Payload::Text(_) => PayloadFormat::Text,
        }
    }

    /// 내용이 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Ohlcv(bars) => bars.is_empty(),
            Payload::News(items) => items.is_empty(),
            Payload::Text(text) => text.trim().is_empty(),
        }
    }
}

/// 종목 기본 정보.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    /// 종목 코드
    pub code: String,
    /// 종목명
    pub name: String,
    /// 시장/거래소 명칭
    pub market: String,
    /// 보드 구분
    pub category: String,
    /// 정보 출처 (벤더명, "document_store", "fallback")
    pub source: String,
    /// 갱신 시각
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_tagged_serialization() {
        let payload = Payload::Text("hello".to_string());
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"format\":\"text\""));

        let parsed: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_payload_is_empty() {
        assert!(Payload::Ohlcv(vec![]).is_empty());
        assert!(Payload::Text("   ".to_string()).is_empty());
        assert!(!Payload::Text("report".to_string()).is_empty());
    }

    #[test]
    fn test_ohlcv_bar_round_trip() {
        let bar = OhlcvBar {
            symbol: "000001".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: Decimal::new(1025, 2),
            high: Decimal::new(1061, 2),
            low: Decimal::new(1010, 2),
            close: Decimal::new(1049, 2),
            volume: 1_234_567,
        };
        let payload = Payload::Ohlcv(vec![bar.clone()]);
        let json = serde_json::to_string(&payload).unwrap();
        let parsed: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Payload::Ohlcv(vec![bar]));
    }
}
