//! 파일 저장 백엔드.
//!
//! 항상 사용 가능한 최후순위 백엔드입니다. 키마다 페이로드 파일 하나와
//! JSON 메타데이터 사이드카 하나를 기록하며, 디렉토리는 시장×데이터 종류로
//! 파티셔닝해 단일 디렉토리 크기를 제한합니다.
//!
//! 파일시스템에는 네이티브 만료가 없으므로 유효성은 호출자가
//! `created_at + ttl`로 계산하고, 주기적 정리가 만료 항목을 삭제합니다.

use analyst_core::{DataKind, Market, Payload, PayloadFormat};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{DataError, Result};
use crate::policy::TtlPolicy;
use crate::storage::{BackendKind, CacheBackend, CacheMetadata, CachedRecord};

/// 사이드카에 기록되는 항목 메타데이터.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sidecar {
    symbol: String,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    source: String,
    kind: DataKind,
    market: Market,
    created_at: DateTime<Utc>,
    cache_key: String,
    payload_path: PathBuf,
    format: PayloadFormat,
}

/// 파일 캐시 저장소.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// 저장소를 생성하고 파티션 디렉토리를 준비합니다.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        for dir in Self::partition_dirs(&base_dir) {
            fs::create_dir_all(&dir)
                .map_err(|e| DataError::ConfigError(format!("cache dir {:?}: {}", dir, e)))?;
        }
        Ok(Self { base_dir })
    }

    /// 모든 파티션 디렉토리 경로.
    fn partition_dirs(base_dir: &Path) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        for market in [Market::China, Market::Us] {
            for kind in [DataKind::StockData, DataKind::News, DataKind::Fundamentals] {
                dirs.push(base_dir.join(Self::partition_name(market, kind)));
            }
        }
        dirs
    }

    fn partition_name(market: Market, kind: DataKind) -> String {
        format!("{}_{}", market.as_str(), kind.dir_suffix())
    }

    fn partition_dir(&self, market: Market, kind: DataKind) -> PathBuf {
        self.base_dir.join(Self::partition_name(market, kind))
    }

    fn sidecar_path(&self, market: Market, kind: DataKind, key: &str) -> PathBuf {
        self.partition_dir(market, kind).join(format!("{}.meta.json", key))
    }

    /// 생성 시각을 지정해 항목을 기록합니다. 정리/복구 테스트에서 사용합니다.
    pub(crate) fn put_at(
        &self,
        key: &str,
        payload: &Payload,
        metadata: &CacheMetadata,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let dir = self.partition_dir(metadata.market, metadata.kind);

        // 텍스트는 UTF-8 그대로, 테이블/뉴스는 태그된 JSON으로 기록
        let payload_path = match payload {
            Payload::Text(text) => {
                let path = dir.join(format!("{}.txt", key));
                fs::write(&path, text)
                    .map_err(|e| DataError::CacheError(format!("write {:?}: {}", path, e)))?;
                path
            }
            _ => {
                let path = dir.join(format!("{}.json", key));
                let json = serde_json::to_string(payload)?;
                fs::write(&path, json)
                    .map_err(|e| DataError::CacheError(format!("write {:?}: {}", path, e)))?;
                path
            }
        };

        let sidecar = Sidecar {
            symbol: metadata.symbol.clone(),
            start_date: metadata.start_date,
            end_date: metadata.end_date,
            source: metadata.source.clone(),
            kind: metadata.kind,
            market: metadata.market,
            created_at,
            cache_key: key.to_string(),
            payload_path,
            format: payload.format(),
        };
        let sidecar_path = self.sidecar_path(metadata.market, metadata.kind, key);
        let json = serde_json::to_string_pretty(&sidecar)?;
        fs::write(&sidecar_path, json)
            .map_err(|e| DataError::CacheError(format!("write {:?}: {}", sidecar_path, e)))?;

        debug!(key = %key, partition = %Self::partition_name(metadata.market, metadata.kind), "파일 캐시 저장");
        Ok(())
    }

    fn read_sidecar(path: &Path) -> Result<Sidecar> {
        let json = fs::read_to_string(path)
            .map_err(|e| DataError::CacheError(format!("read {:?}: {}", path, e)))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// 사이드카가 가리키는 페이로드를 로드합니다.
    ///
    /// 손상된 페이로드는 캐시 미스로 취급합니다.
    fn load_record(sidecar: &Sidecar) -> Option<CachedRecord> {
        let payload = match sidecar.format {
            PayloadFormat::Text => fs::read_to_string(&sidecar.payload_path)
                .ok()
                .map(Payload::Text),
            _ => fs::read_to_string(&sidecar.payload_path)
                .ok()
                .and_then(|json| match serde_json::from_str(&json) {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        warn!(key = %sidecar.cache_key, error = %e, "손상된 캐시 페이로드, 미스로 취급");
                        None
                    }
                }),
        }?;

        Some(CachedRecord {
            payload,
            metadata: CacheMetadata {
                symbol: sidecar.symbol.clone(),
                start_date: sidecar.start_date,
                end_date: sidecar.end_date,
                source: sidecar.source.clone(),
                kind: sidecar.kind,
                market: sidecar.market,
            },
            created_at: sidecar.created_at,
            backend: BackendKind::File,
        })
    }

    /// TTL을 무시하고 symbol+kind+market과 일치하는 가장 최근 항목을 찾습니다.
    ///
    /// 모든 신선한 소스가 실패했을 때의 구조(rescue) 경로입니다.
    pub fn scan_stale(
        &self,
        symbol: &str,
        kind: DataKind,
        market: Market,
    ) -> Option<CachedRecord> {
        let dir = self.partition_dir(market, kind);
        let entries = fs::read_dir(&dir).ok()?;

        let mut best: Option<Sidecar> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.to_string_lossy().ends_with(".meta.json") {
                continue;
            }
            let sidecar = match Self::read_sidecar(&path) {
                Ok(s) => s,
                Err(_) => continue,
            };
            if sidecar.symbol != symbol {
                continue;
            }
            if best.as_ref().map_or(true, |b| sidecar.created_at > b.created_at) {
                best = Some(sidecar);
            }
        }

        let sidecar = best?;
        debug!(symbol = %symbol, key = %sidecar.cache_key, created_at = %sidecar.created_at, "만료 무시 항목 발견");
        Self::load_record(&sidecar)
    }

    /// TTL이 지난 항목을 모두 삭제합니다.
    ///
    /// 삭제한 항목 수를 반환합니다.
    pub fn sweep_expired(&self, policy: &TtlPolicy) -> usize {
        let now = Utc::now();
        let mut removed = 0;

        for dir in Self::partition_dirs(&self.base_dir) {
            let entries = match fs::read_dir(&dir) {
                Ok(e) => e,
                Err(_) => continue,
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.to_string_lossy().ends_with(".meta.json") {
                    continue;
                }
                let sidecar = match Self::read_sidecar(&path) {
                    Ok(s) => s,
                    Err(_) => continue,
                };

                let ttl = policy.ttl_secs(sidecar.market, sidecar.kind);
                let expires_at = sidecar.created_at + chrono::Duration::seconds(ttl as i64);
                if now <= expires_at {
                    continue;
                }

                if let Err(e) = fs::remove_file(&sidecar.payload_path) {
                    warn!(path = ?sidecar.payload_path, error = %e, "만료 페이로드 삭제 실패");
                }
                if fs::remove_file(&path).is_ok() {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            debug!(removed = removed, "만료 캐시 정리 완료");
        }
        removed
    }

    /// 현재 보관 중인 항목 수 (사이드카 기준).
    pub fn entry_count(&self) -> usize {
        Self::partition_dirs(&self.base_dir)
            .iter()
            .filter_map(|dir| fs::read_dir(dir).ok())
            .flatten()
            .flatten()
            .filter(|entry| entry.path().to_string_lossy().ends_with(".meta.json"))
            .count()
    }
}

#[async_trait]
impl CacheBackend for FileStore {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    async fn put(
        &self,
        key: &str,
        payload: &Payload,
        metadata: &CacheMetadata,
        _ttl_secs: u64,
    ) -> Result<()> {
        // TTL은 사이드카의 created_at에서 읽기 시점에 계산된다
        self.put_at(key, payload, metadata, Utc::now())
    }

    async fn get(&self, key: &str) -> Result<Option<CachedRecord>> {
        for market in [Market::China, Market::Us] {
            for kind in [DataKind::StockData, DataKind::News, DataKind::Fundamentals] {
                let path = self.sidecar_path(market, kind, key);
                if !path.exists() {
                    continue;
                }
                let sidecar = match Self::read_sidecar(&path) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(key = %key, error = %e, "손상된 사이드카, 미스로 취급");
                        return Ok(None);
                    }
                };
                return Ok(Self::load_record(&sidecar));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn metadata(symbol: &str, kind: DataKind) -> CacheMetadata {
        CacheMetadata {
            symbol: symbol.to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 31),
            source: "eastmoney".to_string(),
            kind,
            market: Market::classify(symbol),
        }
    }

    fn ohlcv_payload(symbol: &str) -> Payload {
        Payload::Ohlcv(vec![analyst_core::OhlcvBar {
            symbol: symbol.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: Decimal::new(1025, 2),
            high: Decimal::new(1061, 2),
            low: Decimal::new(1010, 2),
            close: Decimal::new(1049, 2),
            volume: 98_765,
        }])
    }

    #[tokio::test]
    async fn test_round_trip_ohlcv() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let meta = metadata("000001", DataKind::StockData);
        let payload = ohlcv_payload("000001");

        store.put("key1", &payload, &meta, 3_600).await.unwrap();
        let record = store.get("key1").await.unwrap().unwrap();

        assert_eq!(record.payload, payload);
        assert_eq!(record.metadata, meta);
        assert_eq!(record.backend, BackendKind::File);
    }

    #[tokio::test]
    async fn test_round_trip_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let meta = metadata("AAPL", DataKind::Fundamentals);
        let payload = Payload::Text("fundamentals report".to_string());

        store.put("key2", &payload, &meta, 3_600).await.unwrap();
        let record = store.get("key2").await.unwrap().unwrap();

        assert_eq!(record.payload, payload);
        // 미국 종목은 us 파티션에 기록된다
        assert!(dir.path().join("us_fundamentals").join("key2.txt").exists());
    }

    #[tokio::test]
    async fn test_miss_on_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let meta = metadata("000001", DataKind::StockData);

        store
            .put("key3", &ohlcv_payload("000001"), &meta, 3_600)
            .await
            .unwrap();

        // 페이로드 파일을 깨뜨린다
        let payload_path = dir.path().join("china_stocks").join("key3.json");
        fs::write(&payload_path, "{not json").unwrap();

        assert!(store.get("key3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let policy = TtlPolicy::default();
        let meta = metadata("000001", DataKind::StockData);
        let payload = ohlcv_payload("000001");

        // 신선한 항목과 TTL(1시간)을 넘긴 항목
        store.put("fresh", &payload, &meta, 3_600).await.unwrap();
        store
            .put_at(
                "old",
                &payload,
                &meta,
                Utc::now() - chrono::Duration::seconds(3_700),
            )
            .unwrap();

        let removed = store.sweep_expired(&policy);
        assert_eq!(removed, 1);
        assert!(store.get("fresh").await.unwrap().is_some());
        assert!(store.get("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_stale_picks_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let meta = metadata("000001", DataKind::StockData);

        store
            .put_at(
                "older",
                &Payload::Text("older".to_string()),
                &CacheMetadata {
                    kind: DataKind::StockData,
                    ..meta.clone()
                },
                Utc::now() - chrono::Duration::days(3),
            )
            .unwrap();
        store
            .put_at(
                "newer",
                &Payload::Text("newer".to_string()),
                &meta,
                Utc::now() - chrono::Duration::days(1),
            )
            .unwrap();

        let record = store
            .scan_stale("000001", DataKind::StockData, Market::China)
            .unwrap();
        assert_eq!(record.payload, Payload::Text("newer".to_string()));

        // 다른 종목은 매칭되지 않는다
        assert!(store
            .scan_stale("600519", DataKind::StockData, Market::China)
            .is_none());
    }
}
