//! 주식 데이터 해석 파이프라인.
//!
//! 요청(symbol, window, kind)마다 아래 상태를 순차 진행하며, 모든 터미널
//! 결과에 출처(provenance)를 태깅합니다. 하위 소비자는 이 태그로 결과를
//! 신뢰/할인/거부할 수 있습니다.
//!
//! ```text
//! 요청 (symbol, window, kind)
//!         │
//! ┌───────▼────────────┐
//! │ LOOKUP_BASIC_INFO  │ ← 실패해도 계속 (식별 정보만 저하)
//! └───────┬────────────┘
//! ┌───────▼────────────┐
//! │ LOOKUP_PRIMARY     │ ← 신선한 캐시 적중 → fresh-primary (터미널)
//! └───────┬────────────┘
//! ┌───────▼────────────┐
//! │ FETCH_UPSTREAM     │ ← 벤더 호출 (간격 제한)
//! └───────┬────────────┘
//!    성공 │        실패/빈 응답
//! ┌───────▼──────┐   │
//! │ WRITE_THROUGH│   │ ← 저장 실패는 로그만 → fresh-upstream (터미널)
//! └──────────────┘   │
//!           ┌────────▼────────┐
//!           │ RESCUE_STALE    │ ← TTL 무시 스캔 → stale-rescue (터미널)
//!           └────────┬────────┘
//!           ┌────────▼──────────────┐
//!           │ SYNTHESIZE_FALLBACK   │ → synthetic-fallback (터미널)
//!           └───────────────────────┘
//! ```

use analyst_core::{AppConfig, BasicInfo, DataKind, Market, Payload};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::cache::{AdaptiveCache, CacheStats};
use crate::detect::{BackendRegistry, BackendStatus};
use crate::error::{DataError, Result};
use crate::policy::TtlPolicy;
use crate::provider::{EastmoneyFetcher, FetchOutcome, FinnhubFetcher, UpstreamFetcher};
use crate::storage::{CachedRecord, FileStore};

/// 반환 항목이 어떻게 얻어졌는지 나타내는 태그.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// 권위 저장소의 신선한 레코드
    FreshPrimary,
    /// 벤더에서 방금 가져온 데이터
    FreshUpstream,
    /// TTL이 지난 항목의 구조 (항상 stale로 표시)
    StaleRescue,
    /// 명시적 플레이스홀더 (실데이터로 오인 불가)
    SyntheticFallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::FreshPrimary => "fresh-primary",
            Provenance::FreshUpstream => "fresh-upstream",
            Provenance::StaleRescue => "stale-rescue",
            Provenance::SyntheticFallback => "synthetic-fallback",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 출처가 태깅된 해석 결과.
///
/// 정상 동작에서 호출자는 예외 대신 항상 이 쌍을 받습니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedData {
    pub payload: Payload,
    pub provenance: Provenance,
}

/// 주식 데이터 해석 서비스.
///
/// 백엔드 핸들과 벤더 fetcher를 모두 소유하는 명시적 컨텍스트 객체입니다.
/// 전역 싱글톤 없이 생성해 파이프라인 연산에 전달합니다.
pub struct StockDataService {
    cache: AdaptiveCache,
    registry: BackendRegistry,
    china: Arc<dyn UpstreamFetcher>,
    us: Arc<dyn UpstreamFetcher>,
    /// 컨텍스트 소유 기본 정보 캐시 (프로세스 내)
    basic_info_cache: RwLock<HashMap<String, BasicInfo>>,
}

impl StockDataService {
    /// 설정에서 서비스를 구성합니다.
    ///
    /// 백엔드 탐지 실패는 가용성만 낮추며, 파일 캐시 디렉토리 준비 실패만
    /// 오류입니다.
    pub async fn init(config: &AppConfig) -> Result<Self> {
        let registry = BackendRegistry::detect(config).await;
        let file = FileStore::new(&config.cache.dir)?;
        let policy = TtlPolicy::new(config.cache.default_ttl_secs);
        let cache = AdaptiveCache::new(&registry, file, policy);

        let china: Arc<dyn UpstreamFetcher> =
            Arc::new(EastmoneyFetcher::new(&config.vendors.eastmoney));
        let us: Arc<dyn UpstreamFetcher> = Arc::new(FinnhubFetcher::new(&config.vendors.finnhub));

        Ok(Self::with_parts(cache, registry, china, us))
    }

    /// 구성 요소를 직접 주입해 서비스를 만듭니다.
    pub fn with_parts(
        cache: AdaptiveCache,
        registry: BackendRegistry,
        china: Arc<dyn UpstreamFetcher>,
        us: Arc<dyn UpstreamFetcher>,
    ) -> Self {
        Self {
            cache,
            registry,
            china,
            us,
            basic_info_cache: RwLock::new(HashMap::new()),
        }
    }

    /// 데이터 종류/시장에 맞는 벤더를 선택합니다.
    ///
    /// 뉴스는 시장과 무관하게 뉴스 벤더(Finnhub)가 담당합니다.
    fn fetcher_for(&self, market: Market, kind: DataKind) -> &Arc<dyn UpstreamFetcher> {
        match (kind, market) {
            (DataKind::News, _) => &self.us,
            (_, Market::China) => &self.china,
            (_, Market::Us) => &self.us,
        }
    }

    /// 구간의 일별 시세를 해석합니다.
    #[instrument(skip(self))]
    pub async fn get_stock_data(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ResolvedData {
        // LOOKUP_BASIC_INFO: 실패는 식별 정보 저하로만 이어진다
        let _ = self.get_basic_info(symbol).await;

        self.resolve(symbol, Some(start), Some(end), DataKind::StockData)
            .await
    }

    /// 구간의 뉴스를 해석합니다.
    #[instrument(skip(self))]
    pub async fn get_news(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> ResolvedData {
        self.resolve(symbol, Some(start), Some(end), DataKind::News)
            .await
    }

    /// 펀더멘털 데이터를 해석합니다.
    #[instrument(skip(self))]
    pub async fn get_fundamentals(&self, symbol: &str) -> ResolvedData {
        self.resolve(symbol, None, None, DataKind::Fundamentals)
            .await
    }

    /// 종목 기본 정보를 조회합니다.
    ///
    /// 컨텍스트 캐시 → 문서 저장소 → 벤더 → 저하된 플레이스홀더 순으로
    /// 시도하며 오류를 반환하지 않습니다.
    #[instrument(skip(self))]
    pub async fn get_basic_info(&self, symbol: &str) -> BasicInfo {
        if let Some(info) = self.basic_info_cache.read().await.get(symbol) {
            return info.clone();
        }

        // 권위 저장소 우선
        if let Some(document) = self.registry.document() {
            match document.get_basic_info(symbol).await {
                Ok(Some(info)) => {
                    self.basic_info_cache
                        .write()
                        .await
                        .insert(symbol.to_string(), info.clone());
                    return info;
                }
                Ok(None) => {}
                Err(e) => warn!(symbol = %symbol, error = %e, "문서 저장소 기본 정보 조회 실패"),
            }
        }

        // 벤더 폴백
        let market = Market::classify(symbol);
        let fetcher = self.fetcher_for(market, DataKind::StockData);
        match fetcher.fetch_basic_info(symbol).await {
            Ok(Some(info)) => {
                if let Some(document) = self.registry.document() {
                    if let Err(e) = document.upsert_basic_info(&info).await {
                        warn!(symbol = %symbol, error = %e, "기본 정보 저장 실패");
                    }
                }
                self.basic_info_cache
                    .write()
                    .await
                    .insert(symbol.to_string(), info.clone());
                return info;
            }
            Ok(None) => debug!(symbol = %symbol, "벤더에 기본 정보 없음"),
            Err(e) => warn!(symbol = %symbol, error = %e, "벤더 기본 정보 조회 실패"),
        }

        // 저하된 식별 정보 (캐시하지 않음: 다음 호출에서 재시도)
        let (market_name, category) = match market {
            Market::China => (
                analyst_core::exchange_name(symbol).to_string(),
                analyst_core::board_category(symbol).to_string(),
            ),
            Market::Us => ("Unknown".to_string(), "Other".to_string()),
        };
        BasicInfo {
            code: symbol.to_string(),
            name: format!("Stock {}", symbol),
            market: market_name,
            category,
            source: "fallback".to_string(),
            updated_at: Utc::now(),
        }
    }

    /// 백엔드 가용성 상태를 반환합니다.
    pub fn service_status(&self) -> BackendStatus {
        self.registry.status()
    }

    /// 캐시 통계를 반환합니다.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// 백엔드를 명시적으로 재탐지합니다.
    ///
    /// 핫 경로를 가볍게 유지하기 위해 요청마다 호출되지 않습니다.
    pub async fn redetect(&mut self, config: &AppConfig) {
        let file = self.cache.file_store().clone();
        let policy = self.cache.policy().clone();
        self.registry.redetect(config).await;
        self.cache = AdaptiveCache::new(&self.registry, file, policy);
    }

    /// 만료 항목 정리 태스크를 기동합니다.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let file = self.cache.file_store().clone();
        let policy = self.cache.policy().clone();
        let document = self.registry.document().cloned();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 기동 직후 틱은 건너뛴다
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = file.sweep_expired(&policy);
                debug!(removed = removed, "파일 캐시 정리 주기 완료");

                if let Some(document) = &document {
                    if let Err(e) = document.sweep_expired().await {
                        warn!(error = %e, "문서 저장소 정리 실패");
                    }
                }
            }
        })
    }

    /// 단일 키 해석 상태 기계.
    async fn resolve(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        kind: DataKind,
    ) -> ResolvedData {
        let market = Market::classify(symbol);
        let fetcher = self.fetcher_for(market, kind);
        let source = fetcher.vendor();

        // LOOKUP_PRIMARY_STORE
        if let Some(record) = self.cache.find(symbol, start, end, source, kind).await {
            debug!(symbol = %symbol, kind = %kind, backend = %record.backend, "신선한 캐시 적중");
            return ResolvedData {
                payload: record.payload,
                provenance: Provenance::FreshPrimary,
            };
        }

        // FETCH_UPSTREAM
        let outcome = self.fetch_upstream(fetcher, symbol, start, end, kind).await;

        match outcome {
            Ok(FetchOutcome::Data(payload)) => {
                // WRITE_THROUGH: 실패는 로그만 남기고 데이터는 그대로 반환
                self.cache
                    .write(symbol, start, end, source, kind, &payload)
                    .await;

                info!(symbol = %symbol, kind = %kind, vendor = %source, "업스트림 조회 완료");
                ResolvedData {
                    payload,
                    provenance: Provenance::FreshUpstream,
                }
            }
            Ok(FetchOutcome::Empty) => {
                info!(symbol = %symbol, kind = %kind, vendor = %source, "벤더 응답에 데이터 없음, 구조 시도");
                self.rescue_or_synthesize(symbol, start, end, kind, market)
                    .await
            }
            Err(e) => {
                warn!(symbol = %symbol, kind = %kind, vendor = %source, error = %e, "벤더 호출 실패, 구조 시도");
                self.rescue_or_synthesize(symbol, start, end, kind, market)
                    .await
            }
        }
    }

    /// 데이터 종류별 벤더 호출.
    async fn fetch_upstream(
        &self,
        fetcher: &Arc<dyn UpstreamFetcher>,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        kind: DataKind,
    ) -> Result<FetchOutcome> {
        match kind {
            DataKind::StockData => match (start, end) {
                (Some(start), Some(end)) => fetcher.fetch_stock_data(symbol, start, end).await,
                _ => Err(DataError::InvalidData(
                    "stock data requires a date window".to_string(),
                )),
            },
            DataKind::News => match (start, end) {
                (Some(start), Some(end)) => fetcher.fetch_news(symbol, start, end).await,
                _ => Err(DataError::InvalidData(
                    "news requires a date window".to_string(),
                )),
            },
            DataKind::Fundamentals => fetcher.fetch_fundamentals(symbol).await,
        }
    }

    /// RESCUE_STALE → SYNTHESIZE_FALLBACK.
    async fn rescue_or_synthesize(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        kind: DataKind,
        market: Market,
    ) -> ResolvedData {
        // TTL을 무시하고 symbol+kind+market과 일치하는 최근 항목을 찾는다
        if let Some(record) = self.scan_stale(symbol, kind, market).await {
            warn!(
                symbol = %symbol,
                kind = %kind,
                age_secs = record.age().num_seconds(),
                "만료된 캐시 항목으로 구조, stale 표시"
            );
            return ResolvedData {
                payload: record.payload,
                provenance: Provenance::StaleRescue,
            };
        }

        warn!(symbol = %symbol, kind = %kind, "모든 소스 소진, 합성 플레이스홀더 반환");
        ResolvedData {
            payload: synthesize_payload(symbol, start, end, kind),
            provenance: Provenance::SyntheticFallback,
        }
    }

    async fn scan_stale(
        &self,
        symbol: &str,
        kind: DataKind,
        market: Market,
    ) -> Option<CachedRecord> {
        if let Some(document) = self.registry.document() {
            match document.scan_stale(symbol, kind, market).await {
                Ok(Some(record)) => return Some(record),
                Ok(None) => {}
                Err(e) => debug!(symbol = %symbol, error = %e, "문서 저장소 구조 스캔 실패"),
            }
        }

        self.cache.file_store().scan_stale(symbol, kind, market)
    }
}

/// 합성 플레이스홀더 페이로드.
///
/// 실데이터와 구조적으로 구분되도록 명시적 마커 텍스트를 사용합니다.
fn synthesize_payload(
    symbol: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    kind: DataKind,
) -> Payload {
    let window = match (start, end) {
        (Some(start), Some(end)) => format!("{} to {}", start, end),
        _ => "n/a".to_string(),
    };

    Payload::Text(format!(
        "# DATA UNAVAILABLE: {} ({})\n\n\
         All data sources failed for this request.\n\
         - Requested window: {}\n\
         - The primary store, the upstream vendor, and stale-cache rescue were exhausted.\n\n\
         This is a synthetic placeholder, not market data.\n",
        symbol, kind, window
    ))
}
