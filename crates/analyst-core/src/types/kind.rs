//! 데이터 종류 분류.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 캐시/조회 대상 데이터의 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// 일별 시세 (OHLCV)
    StockData,
    /// 뉴스
    News,
    /// 펀더멘털
    Fundamentals,
}

impl DataKind {
    /// 키 파생 및 TTL 테이블용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::StockData => "stock_data",
            DataKind::News => "news",
            DataKind::Fundamentals => "fundamentals",
        }
    }

    /// 파일 캐시 파티션 디렉토리 접미사.
    pub fn dir_suffix(&self) -> &'static str {
        match self {
            DataKind::StockData => "stocks",
            DataKind::News => "news",
            DataKind::Fundamentals => "fundamentals",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock_data" => Ok(DataKind::StockData),
            "news" => Ok(DataKind::News),
            "fundamentals" => Ok(DataKind::Fundamentals),
            _ => Err(format!("Unknown data kind: {}", s)),
        }
    }
}
