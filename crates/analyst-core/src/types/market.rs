//! 시장 분류.
//!
//! 이 모듈은 심볼 형식에 기반한 시장 판별 휴리스틱을 정의합니다:
//! - `Market` - 시장 유형 (중국 A주, 미국)
//! - 종목 코드 접두사 기반 거래소/보드 분류

use serde::{Deserialize, Serialize};
use std::fmt;

/// 시장 유형 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    /// 중국 A주 시장
    China,
    /// 미국 주식 시장
    Us,
}

impl Market {
    /// 심볼 형식에서 시장을 판별합니다.
    ///
    /// 6자리 숫자 심볼은 중국 A주, 그 외는 미국으로 간주합니다.
    /// 권위 있는 판별이 아닌 휴리스틱입니다.
    pub fn classify(symbol: &str) -> Self {
        if symbol.len() == 6 && symbol.chars().all(|c| c.is_ascii_digit()) {
            Market::China
        } else {
            Market::Us
        }
    }

    /// 디렉토리/키 파티셔닝용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::China => "china",
            Market::Us => "us",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 종목 코드 접두사로 거래소를 판별합니다 (중국 A주 전용).
pub fn exchange_name(code: &str) -> &'static str {
    if code.starts_with("60") || code.starts_with("68") || code.starts_with("90") {
        "Shanghai"
    } else if code.starts_with("00") || code.starts_with("30") || code.starts_with("20") {
        "Shenzhen"
    } else {
        "Unknown"
    }
}

/// 종목 코드 접두사로 보드(시장 구분)를 판별합니다 (중국 A주 전용).
pub fn board_category(code: &str) -> &'static str {
    if code.starts_with("60") {
        "SSE Main Board"
    } else if code.starts_with("68") {
        "STAR Market"
    } else if code.starts_with("00") {
        "SZSE Main Board"
    } else if code.starts_with("30") {
        "ChiNext"
    } else if code.starts_with("20") {
        "SZSE B-Share"
    } else {
        "Other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(Market::classify("000001"), Market::China);
        assert_eq!(Market::classify("600519"), Market::China);
        assert_eq!(Market::classify("AAPL"), Market::Us);
        assert_eq!(Market::classify("BRK.B"), Market::Us);
        // 6자리이지만 숫자가 아님
        assert_eq!(Market::classify("GOOGLE"), Market::Us);
        // 숫자이지만 6자리가 아님
        assert_eq!(Market::classify("12345"), Market::Us);
    }

    #[test]
    fn test_exchange_name() {
        assert_eq!(exchange_name("600519"), "Shanghai");
        assert_eq!(exchange_name("688981"), "Shanghai");
        assert_eq!(exchange_name("000001"), "Shenzhen");
        assert_eq!(exchange_name("300750"), "Shenzhen");
        assert_eq!(exchange_name("400001"), "Unknown");
    }

    #[test]
    fn test_board_category() {
        assert_eq!(board_category("600519"), "SSE Main Board");
        assert_eq!(board_category("688981"), "STAR Market");
        assert_eq!(board_category("000001"), "SZSE Main Board");
        assert_eq!(board_category("300750"), "ChiNext");
        assert_eq!(board_category("200011"), "SZSE B-Share");
        assert_eq!(board_category("900001"), "Other");
    }
}
