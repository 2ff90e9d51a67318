//! 캐시 키 파생 및 TTL 정책.
//!
//! 캐시 키는 (symbol, start, end, source, kind)의 결정적 내용 해시입니다.
//! TTL은 시장×데이터 종류 테이블에서 결정되며, 테이블에 없는 조합은
//! 보수적인 전역 기본값으로 폴백합니다.

use analyst_core::{DataKind, Market};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// 캐시 키를 파생합니다.
///
/// SHA-256의 hex 표현(256비트)을 반환하며, 같은 입력 튜플은 항상 같은
/// 키를, 다른 튜플은 사실상 항상 다른 키를 만듭니다.
pub fn cache_key(
    symbol: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    source: &str,
    kind: DataKind,
) -> String {
    let fmt_date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
    let input = format!(
        "{}|{}|{}|{}|{}",
        symbol,
        fmt_date(start),
        fmt_date(end),
        source,
        kind
    );

    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)
}

/// 시장×데이터 종류별 TTL 테이블.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    table: HashMap<(Market, DataKind), u64>,
    default_ttl_secs: u64,
}

impl TtlPolicy {
    /// 기본 테이블로 정책을 생성합니다.
    ///
    /// A주 시세는 실시간성 요구가 높아 짧게, 펀더멘털 데이터는 길게 잡습니다.
    pub fn new(default_ttl_secs: u64) -> Self {
        let mut table = HashMap::new();
        table.insert((Market::China, DataKind::StockData), 3_600); // 1시간
        table.insert((Market::Us, DataKind::StockData), 7_200); // 2시간
        table.insert((Market::China, DataKind::News), 14_400); // 4시간
        table.insert((Market::Us, DataKind::News), 21_600); // 6시간
        table.insert((Market::China, DataKind::Fundamentals), 43_200); // 12시간
        table.insert((Market::Us, DataKind::Fundamentals), 86_400); // 24시간

        Self {
            table,
            default_ttl_secs,
        }
    }

    /// (시장, 종류) 조합의 TTL을 초 단위로 반환합니다.
    ///
    /// 테이블에 없는 조합은 오류 대신 전역 기본값을 반환합니다.
    pub fn ttl_secs(&self, market: Market, kind: DataKind) -> u64 {
        self.table
            .get(&(market, kind))
            .copied()
            .unwrap_or(self.default_ttl_secs)
    }

    /// 전역 기본 TTL.
    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new(7_200)
    }
}
