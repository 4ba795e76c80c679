// Inventory data store
// Tiered acquisition of the hotel inventory payload: fresh cache, live fetch, stale cache, bundled fallback

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::hotel_data::{HotelSnapshot, Provenance};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CACHE_PATH: &str = "data/hotel-data-cache.json";
pub const DEFAULT_FALLBACK_PATH: &str = "data/hotel-data-fallback.json";
pub const DEFAULT_SOURCE_URL: &str = "https://api.example.com/hotel-data";

#[derive(Error, Debug)]
pub enum DataStoreError {
    #[error("Inventory source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Static fallback data not found at {path}: {reason}")]
    MissingFallbackData { path: String, reason: String },

    #[error("Cache I/O error: {0}")]
    CacheIo(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DataStoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            DataStoreError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            DataStoreError::MissingFallbackData { .. } => "MissingFallbackData",
            DataStoreError::CacheIo(_) => "CacheIo",
            DataStoreError::Serialization(_) => "Serialization",
        }
    }
}

// Durable cache file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    // epoch millis
    pub timestamp: i64,
    pub data: Value,
}

impl CacheRecord {
    pub fn new(data: Value) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            data,
        }
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp
    }

    // A record exactly TTL old is still fresh; one stamped in the future is not
    pub fn is_fresh(&self, now_ms: i64, ttl: Duration) -> bool {
        let age = self.age_ms(now_ms);
        age >= 0 && age <= ttl.as_millis() as i64
    }
}

#[derive(Debug, Clone)]
pub struct DataStoreConfig {
    pub cache_path: PathBuf,
    pub fallback_path: PathBuf,
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
}

impl Default for DataStoreConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            fallback_path: PathBuf::from(DEFAULT_FALLBACK_PATH),
            cache_ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

// Upstream the live inventory payload is fetched from
#[async_trait]
pub trait InventorySource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<Value, DataStoreError>;
}

#[derive(Debug, Clone)]
pub struct InventorySourceConfig {
    pub url: String,
    pub bearer_token: Option<SecretString>,
    pub timeout: Duration,
}

impl Default for InventorySourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            bearer_token: None,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

pub struct HttpInventorySource {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<SecretString>,
}

impl HttpInventorySource {
    pub fn new(config: &InventorySourceConfig) -> Result<Self, DataStoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DataStoreError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            bearer_token: config.bearer_token.clone(),
        })
    }
}

#[async_trait]
impl InventorySource for HttpInventorySource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Value, DataStoreError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DataStoreError::UpstreamUnavailable(format!("request timed out: {}", e))
            } else {
                DataStoreError::UpstreamUnavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataStoreError::UpstreamUnavailable(format!(
                "inventory source returned {}",
                status
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| DataStoreError::UpstreamUnavailable(format!("invalid payload: {}", e)))
    }
}

pub struct DataStore {
    source: Arc<dyn InventorySource>,
    config: DataStoreConfig,
    // Serializes live fetches and cache writes within the process
    refresh_lock: Mutex<()>,
}

impl DataStore {
    pub fn new(source: Arc<dyn InventorySource>, config: DataStoreConfig) -> Self {
        Self {
            source,
            config,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DataStoreConfig {
        &self.config
    }

    // Fresh cache, then live fetch, then cache of any age, then the bundled fallback
    #[instrument(skip(self))]
    pub async fn fetch_inventory(&self) -> Result<(Value, Provenance), DataStoreError> {
        if let Some(record) = self.read_cache(false).await {
            info!("Using cached hotel data");
            return Ok((record.data, Provenance::Cached));
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed the cache while we waited for the lock
        if let Some(record) = self.read_cache(false).await {
            info!("Using cached hotel data written by a concurrent refresh");
            return Ok((record.data, Provenance::Cached));
        }

        match self.fetch_and_persist().await {
            Ok(data) => {
                info!("Fresh hotel data fetched from inventory source");
                Ok((data, Provenance::Live))
            }
            Err(e) => {
                warn!(error = %e, "Live inventory fetch failed");

                if let Some(record) = self.read_cache(true).await {
                    warn!("Using expired cache as fallback");
                    return Ok((record.data, Provenance::Cached));
                }

                warn!("Using static fallback data");
                let data = self.read_fallback().await?;
                Ok((data, Provenance::Fallback))
            }
        }
    }

    // Never serves cached data: either verified-fresh or the explicit fallback
    #[instrument(skip(self))]
    pub async fn force_refresh(&self) -> Result<(Value, Provenance), DataStoreError> {
        let _guard = self.refresh_lock.lock().await;
        info!("Force refreshing hotel data");

        match self.fetch_and_persist().await {
            Ok(data) => {
                info!("Cache refreshed successfully");
                Ok((data, Provenance::Live))
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed, using static fallback");
                let data = self.read_fallback().await?;
                Ok((data, Provenance::Fallback))
            }
        }
    }

    // Callers must hold the refresh lock
    async fn fetch_and_persist(&self) -> Result<Value, DataStoreError> {
        let data = match tokio::time::timeout(self.config.fetch_timeout, self.source.fetch()).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(DataStoreError::UpstreamUnavailable(format!(
                    "fetch timed out after {}ms",
                    self.config.fetch_timeout.as_millis()
                )))
            }
        };
        validate_payload(&data).map_err(|e| {
            DataStoreError::UpstreamUnavailable(format!("malformed inventory payload: {}", e))
        })?;

        let record = CacheRecord::new(data);
        if let Err(e) = self.write_cache(&record).await {
            warn!(error = %e, path = %self.config.cache_path.display(), "Failed to persist hotel data cache");
        }
        Ok(record.data)
    }

    pub async fn read_cache(&self, ignore_expiry: bool) -> Option<CacheRecord> {
        let path = &self.config.cache_path;
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to read cache file");
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Ignoring unreadable cache file");
                return None;
            }
        };

        if let Err(e) = validate_payload(&record.data) {
            warn!(error = %e, path = %path.display(), "Ignoring cache with malformed hotel data");
            return None;
        }

        let now_ms = Utc::now().timestamp_millis();
        if !ignore_expiry && !record.is_fresh(now_ms, self.config.cache_ttl) {
            debug!(age_ms = record.age_ms(now_ms), "Cache expired");
            return None;
        }

        Some(record)
    }

    async fn write_cache(&self, record: &CacheRecord) -> Result<(), DataStoreError> {
        let path = &self.config.cache_path;
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        // Write beside the target and rename so readers never see a torn file
        let tmp_path = temp_path_for(path);
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        debug!(path = %path.display(), "Hotel data cached successfully");
        Ok(())
    }

    async fn read_fallback(&self) -> Result<Value, DataStoreError> {
        let path = &self.config.fallback_path;
        let missing = |reason: String| DataStoreError::MissingFallbackData {
            path: path.display().to_string(),
            reason,
        };

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| missing(e.to_string()))?;
        let data: Value = serde_json::from_str(&contents).map_err(|e| missing(e.to_string()))?;
        validate_payload(&data).map_err(|e| missing(format!("malformed hotel data: {}", e)))?;
        Ok(data)
    }
}

// Only payloads the inventory engine can install are served or persisted
fn validate_payload(data: &Value) -> Result<(), serde_json::Error> {
    HotelSnapshot::from_payload(data).map(|_| ())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// Scriptable inventory source for tests
#[cfg(test)]
pub mod mock_upstream {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub struct MockInventorySource {
        payload: parking_lot::Mutex<Value>,
        failing: AtomicBool,
        delay_ms: AtomicUsize,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockInventorySource {
        pub fn serving(payload: Value) -> Self {
            Self {
                payload: parking_lot::Mutex::new(payload),
                failing: AtomicBool::new(false),
                delay_ms: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        pub fn failing() -> Self {
            let source = Self::serving(Value::Null);
            source.set_failing(true);
            source
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn set_payload(&self, payload: Value) {
            *self.payload.lock() = payload;
        }

        pub fn set_delay(&self, delay_ms: usize) {
            self.delay_ms.store(delay_ms, Ordering::SeqCst);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InventorySource for MockInventorySource {
        async fn fetch(&self) -> Result<Value, DataStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay as u64)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.load(Ordering::SeqCst) {
                return Err(DataStoreError::UpstreamUnavailable(
                    "Service unavailable".to_string(),
                ));
            }
            Ok(self.payload.lock().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock_upstream::MockInventorySource;
    use super::*;
    use crate::hotel_data::fixtures::sample_payload;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    const HOUR_MS: i64 = 60 * 60 * 1000;

    // Valid inventory payload whose hotel name tells the tiers apart
    fn hotel_named(name: &str) -> Value {
        let mut payload = sample_payload();
        payload["hotel"]["hotel_name"] = json!(name);
        payload
    }

    fn store_in(dir: &TempDir, source: Arc<MockInventorySource>) -> DataStore {
        let config = DataStoreConfig {
            cache_path: dir.path().join("cache").join("hotel-data-cache.json"),
            fallback_path: dir.path().join("hotel-data-fallback.json"),
            ..DataStoreConfig::default()
        };
        DataStore::new(source, config)
    }

    fn write_cache_record(store: &DataStore, data: Value, age_ms: i64) {
        let record = CacheRecord {
            timestamp: Utc::now().timestamp_millis() - age_ms,
            data,
        };
        let path = &store.config().cache_path;
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_string(&record).unwrap()).unwrap();
    }

    fn write_fallback(store: &DataStore, data: Value) {
        std::fs::write(
            &store.config().fallback_path,
            serde_json::to_string(&data).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_cache_freshness_boundary_is_inclusive() {
        let ttl = Duration::from_secs(24 * 60 * 60);
        let now = 1_750_000_000_000;
        let ttl_ms = ttl.as_millis() as i64;

        let at_boundary = CacheRecord {
            timestamp: now - ttl_ms,
            data: Value::Null,
        };
        let past_boundary = CacheRecord {
            timestamp: now - ttl_ms - 1,
            data: Value::Null,
        };

        assert!(at_boundary.is_fresh(now, ttl));
        assert!(!past_boundary.is_fresh(now, ttl));
    }

    #[test]
    fn test_future_timestamp_is_not_fresh() {
        let ttl = Duration::from_secs(24 * 60 * 60);
        let now = 1_750_000_000_000;

        let from_the_future = CacheRecord {
            timestamp: now + 365 * 24 * HOUR_MS,
            data: Value::Null,
        };
        let written_now = CacheRecord {
            timestamp: now,
            data: Value::Null,
        };

        assert!(!from_the_future.is_fresh(now, ttl));
        assert!(written_now.is_fresh(now, ttl));
    }

    #[tokio::test]
    async fn test_future_dated_cache_triggers_live_fetch() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::serving(hotel_named("Live")));
        let store = store_in(&dir, source.clone());
        write_cache_record(&store, hotel_named("Cache"), -24 * HOUR_MS);

        let (data, provenance) = store.fetch_inventory().await.unwrap();

        assert_eq!(provenance, Provenance::Live);
        assert_eq!(data, hotel_named("Live"));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_fresh_cache_is_served_without_fetch() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::serving(hotel_named("Live")));
        let store = store_in(&dir, source.clone());
        write_cache_record(&store, hotel_named("Cache"), HOUR_MS);

        let (data, provenance) = store.fetch_inventory().await.unwrap();

        assert_eq!(provenance, Provenance::Cached);
        assert_eq!(data, hotel_named("Cache"));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_cache_triggers_live_fetch_and_rewrite() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::serving(hotel_named("Live")));
        let store = store_in(&dir, source.clone());
        write_cache_record(&store, hotel_named("Cache"), 25 * HOUR_MS);

        let (data, provenance) = store.fetch_inventory().await.unwrap();

        assert_eq!(provenance, Provenance::Live);
        assert_eq!(data, hotel_named("Live"));
        assert_eq!(source.calls(), 1);

        let rewritten = store.read_cache(false).await.unwrap();
        assert_eq!(rewritten.data, hotel_named("Live"));
    }

    #[tokio::test]
    async fn test_upstream_failure_serves_expired_cache_over_fallback() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::failing());
        let store = store_in(&dir, source);
        write_cache_record(&store, hotel_named("Cache"), 72 * HOUR_MS);
        write_fallback(&store, hotel_named("Fallback"));

        let (data, provenance) = store.fetch_inventory().await.unwrap();

        assert_eq!(provenance, Provenance::Cached);
        assert_eq!(data, hotel_named("Cache"));
    }

    #[tokio::test]
    async fn test_upstream_failure_without_cache_serves_fallback() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::failing());
        let store = store_in(&dir, source);
        write_fallback(&store, hotel_named("Fallback"));

        let (data, provenance) = assert_ok!(store.fetch_inventory().await);

        assert_eq!(provenance, Provenance::Fallback);
        assert_eq!(data, hotel_named("Fallback"));
        assert!(store.read_cache(true).await.is_none());
    }

    #[tokio::test]
    async fn test_no_tier_available_is_missing_fallback_data() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::failing());
        let store = store_in(&dir, source);

        let err = assert_err!(store.fetch_inventory().await);

        assert!(matches!(err, DataStoreError::MissingFallbackData { .. }));
        assert_eq!(err.kind(), "MissingFallbackData");
    }

    #[tokio::test]
    async fn test_unreadable_cache_is_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::failing());
        let store = store_in(&dir, source);
        let path = &store.config().cache_path;
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "{ not json").unwrap();
        write_fallback(&store, hotel_named("Fallback"));

        let (_, provenance) = store.fetch_inventory().await.unwrap();
        assert_eq!(provenance, Provenance::Fallback);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out_into_fallback_chain() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::serving(hotel_named("Live")));
        source.set_delay(500);
        let config = DataStoreConfig {
            cache_path: dir.path().join("hotel-data-cache.json"),
            fallback_path: dir.path().join("hotel-data-fallback.json"),
            fetch_timeout: Duration::from_millis(50),
            ..DataStoreConfig::default()
        };
        let store = DataStore::new(source, config);
        write_fallback(&store, hotel_named("Fallback"));

        let (data, provenance) = assert_ok!(store.fetch_inventory().await);

        assert_eq!(provenance, Provenance::Fallback);
        assert_eq!(data, hotel_named("Fallback"));
    }

    #[tokio::test]
    async fn test_force_refresh_failure_ignores_valid_cache() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::failing());
        let store = store_in(&dir, source.clone());
        write_cache_record(&store, hotel_named("Cache"), HOUR_MS);
        write_fallback(&store, hotel_named("Fallback"));

        let (data, provenance) = store.force_refresh().await.unwrap();

        assert_eq!(provenance, Provenance::Fallback);
        assert_eq!(data, hotel_named("Fallback"));
        assert_eq!(source.calls(), 1);

        // The old cache is left untouched
        let cached = store.read_cache(false).await.unwrap();
        assert_eq!(cached.data, hotel_named("Cache"));
    }

    #[tokio::test]
    async fn test_force_refresh_success_overwrites_cache() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::serving(hotel_named("Live v2")));
        let store = store_in(&dir, source);
        write_cache_record(&store, hotel_named("Cache v1"), HOUR_MS);

        let (data, provenance) = store.force_refresh().await.unwrap();
        assert_eq!(provenance, Provenance::Live);
        assert_eq!(data, hotel_named("Live v2"));

        let cached = store.read_cache(false).await.unwrap();
        assert_eq!(cached.data, hotel_named("Live v2"));
        assert!(!temp_path_for(&store.config().cache_path).exists());
    }

    #[tokio::test]
    async fn test_force_refresh_failure_without_fallback_is_fatal() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::failing());
        let store = store_in(&dir, source);
        write_cache_record(&store, hotel_named("Cache"), HOUR_MS);

        let result = store.force_refresh().await;
        assert!(matches!(
            result,
            Err(DataStoreError::MissingFallbackData { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_are_serialized() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::serving(hotel_named("Live")));
        source.set_delay(20);
        let store = Arc::new(store_in(&dir, source.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.force_refresh().await }));
        }
        for handle in handles {
            let (_, provenance) = handle.await.unwrap().unwrap();
            assert_eq!(provenance, Provenance::Live);
        }

        assert_eq!(source.calls(), 8);
        assert_eq!(source.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_lazy_fetches_share_one_live_fetch() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::serving(hotel_named("Live")));
        source.set_delay(20);
        let store = Arc::new(store_in(&dir, source.clone()));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.fetch_inventory().await }));
        }
        let mut provenances = Vec::new();
        for handle in handles {
            provenances.push(handle.await.unwrap().unwrap().1);
        }

        assert_eq!(source.calls(), 1);
        assert_eq!(
            provenances.iter().filter(|p| **p == Provenance::Live).count(),
            1
        );
        assert!(provenances
            .iter()
            .all(|p| matches!(p, Provenance::Live | Provenance::Cached)));
    }

    #[tokio::test]
    async fn test_malformed_live_payload_serves_expired_cache() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::serving(json!({"unexpected": true})));
        let store = store_in(&dir, source.clone());
        write_cache_record(&store, hotel_named("Cache"), 25 * HOUR_MS);
        write_fallback(&store, hotel_named("Fallback"));
        let before = std::fs::read_to_string(&store.config().cache_path).unwrap();

        let (data, provenance) = store.fetch_inventory().await.unwrap();

        assert_eq!(provenance, Provenance::Cached);
        assert_eq!(data, hotel_named("Cache"));
        assert_eq!(source.calls(), 1);
        let after = std::fs::read_to_string(&store.config().cache_path).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_malformed_live_payload_without_cache_serves_fallback() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::serving(json!({"rooms": "none"})));
        let store = store_in(&dir, source);
        write_fallback(&store, hotel_named("Fallback"));

        let (data, provenance) = assert_ok!(store.fetch_inventory().await);

        assert_eq!(provenance, Provenance::Fallback);
        assert_eq!(data, hotel_named("Fallback"));
        assert!(!store.config().cache_path.exists());
    }

    #[tokio::test]
    async fn test_force_refresh_with_malformed_payload_keeps_cache() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::serving(json!({"unexpected": true})));
        let store = store_in(&dir, source);
        write_cache_record(&store, hotel_named("Cache"), HOUR_MS);
        write_fallback(&store, hotel_named("Fallback"));

        let (data, provenance) = store.force_refresh().await.unwrap();

        assert_eq!(provenance, Provenance::Fallback);
        assert_eq!(data, hotel_named("Fallback"));
        let cached = store.read_cache(false).await.unwrap();
        assert_eq!(cached.data, hotel_named("Cache"));
    }

    #[tokio::test]
    async fn test_cache_with_malformed_data_is_ignored() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::serving(hotel_named("Live")));
        let store = store_in(&dir, source.clone());
        write_cache_record(&store, json!({"unexpected": true}), HOUR_MS);

        assert!(store.read_cache(true).await.is_none());

        let (data, provenance) = store.fetch_inventory().await.unwrap();
        assert_eq!(provenance, Provenance::Live);
        assert_eq!(data, hotel_named("Live"));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_fallback_is_missing_fallback_data() {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(MockInventorySource::failing());
        let store = store_in(&dir, source);
        write_fallback(&store, json!({"unexpected": true}));

        let err = assert_err!(store.fetch_inventory().await);
        assert_eq!(err.kind(), "MissingFallbackData");
    }

    #[test]
    fn test_temp_path_sits_beside_target() {
        let path = Path::new("/var/data/hotel-data-cache.json");
        assert_eq!(
            temp_path_for(path),
            PathBuf::from("/var/data/hotel-data-cache.json.tmp")
        );
    }
}
