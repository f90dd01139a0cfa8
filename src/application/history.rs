//! History log and artifact storage on top of a [`KvStore`].
//!
//! The history log lives under a single well-known key and is rewritten in
//! full on every append. That read-modify-write is not atomic: two concurrent
//! appends can both read the same list and the later write drops the other
//! record. All three steps are kept inside [`HistoryService::append`] so a
//! conditional put can replace the final write without touching callers.

use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::{
    clock::{Clock, SystemClock},
    store::{KvStore, StoreError},
};
use crate::domain::history::{ArtifactKey, ConversionRecord, HISTORY_KEY};

pub(crate) const METRIC_STORE_CALL_MS: &str = "mdkv_store_call_ms";
pub(crate) const METRIC_STORE_FAILURE_TOTAL: &str = "mdkv_store_failure_total";
pub(crate) const METRIC_HISTORY_CORRUPT_TOTAL: &str = "mdkv_history_corrupt_total";

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("storage failure during `{operation}` on key `{key}`")]
    Storage {
        operation: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to encode history log")]
    Encode(#[from] serde_json::Error),
}

impl HistoryError {
    pub fn operation(&self) -> &'static str {
        match self {
            HistoryError::Storage { operation, .. } => operation,
            HistoryError::Encode(_) => "encode",
        }
    }
}

#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl HistoryService {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bound applied to every individual store call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Append a record stamped with the current time and return the whole log.
    ///
    /// A missing or unreadable log counts as empty. If the final write fails
    /// the updated list is dropped and nothing is persisted.
    pub async fn append(
        &self,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Result<Vec<ConversionRecord>, HistoryError> {
        let mut records = self.load_history("append").await?;

        let now = self.clock.now_millis();
        let created_at = records
            .last()
            .map_or(now, |last| now.max(last.created_at));
        records.push(ConversionRecord::new(input, output, created_at));

        let encoded = Bytes::from(serde_json::to_vec(&records)?);
        self.call("append", HISTORY_KEY, self.store.put(HISTORY_KEY, encoded))
            .await?;

        debug!(
            target = "mdkv::history",
            entries = records.len(),
            created_at,
            "appended history record"
        );
        Ok(records)
    }

    /// Current log in append order. Corrupt data reads as an empty log.
    pub async fn fetch(&self) -> Result<Vec<ConversionRecord>, HistoryError> {
        self.load_history("fetch").await
    }

    pub async fn clear(&self) -> Result<(), HistoryError> {
        self.call("clear", HISTORY_KEY, self.store.delete(HISTORY_KEY))
            .await?;
        debug!(target = "mdkv::history", "cleared history log");
        Ok(())
    }

    /// Write `output` verbatim under the derived key and return that key.
    pub async fn store_artifact(
        &self,
        output: impl Into<String>,
        explicit_key: Option<&str>,
    ) -> Result<ArtifactKey, HistoryError> {
        let key = ArtifactKey::derive(explicit_key, self.clock.now_millis());
        let value = Bytes::from(output.into());
        self.call("store_artifact", key.as_str(), self.store.put(key.as_str(), value))
            .await?;

        debug!(target = "mdkv::history", key = %key, "stored artifact");
        Ok(key)
    }

    /// Read an artifact back verbatim. The history log key is not an
    /// artifact and always reads as absent.
    pub async fn fetch_artifact(&self, key: &str) -> Result<Option<String>, HistoryError> {
        if key == HISTORY_KEY {
            return Ok(None);
        }
        let value = self
            .call("fetch_artifact", key, self.store.get(key))
            .await?;
        Ok(value.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub async fn health(&self) -> Result<(), HistoryError> {
        self.call("health", "", self.store.health_check()).await
    }

    async fn load_history(
        &self,
        operation: &'static str,
    ) -> Result<Vec<ConversionRecord>, HistoryError> {
        let stored = self
            .call(operation, HISTORY_KEY, self.store.get(HISTORY_KEY))
            .await?;
        Ok(stored
            .map(|bytes| parse_or_default(&bytes, HISTORY_KEY))
            .unwrap_or_default())
    }

    async fn call<T, F>(
        &self,
        operation: &'static str,
        key: &str,
        future: F,
    ) -> Result<T, HistoryError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        histogram!(METRIC_STORE_CALL_MS, "operation" => operation)
            .record(started.elapsed().as_secs_f64() * 1000.0);

        outcome.map_err(|source| {
            counter!(METRIC_STORE_FAILURE_TOTAL, "operation" => operation).increment(1);
            warn!(
                target = "mdkv::history",
                operation,
                key,
                error = %source,
                "store call failed"
            );
            HistoryError::Storage {
                operation,
                key: key.to_string(),
                source,
            }
        })
    }
}

/// Decode `bytes`, falling back to `T::default()` on any decode error.
fn parse_or_default<T>(bytes: &[u8], key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    serde_json::from_slice(bytes).unwrap_or_else(|err| {
        counter!(METRIC_HISTORY_CORRUPT_TOTAL).increment(1);
        warn!(
            target = "mdkv::history",
            key,
            error = %err,
            bytes = bytes.len(),
            "stored history is not valid; treating as empty"
        );
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{
        Mutex,
        atomic::{AtomicI64, AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use crate::infra::kv::MemoryKvStore;

    struct FixedClock(AtomicI64);

    impl FixedClock {
        fn at(millis: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(millis)))
        }

        fn set(&self, millis: i64) {
            self.0.store(millis, Ordering::SeqCst);
        }
    }

    impl Clock for FixedClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Memory-backed store that can be told to fail writes or hang reads.
    #[derive(Default)]
    struct ScriptedStore {
        inner: MemoryKvStore,
        fail_puts: bool,
        fail_gets: bool,
        hang_gets: bool,
        puts: AtomicUsize,
        last_put: Mutex<Option<String>>,
    }

    #[async_trait]
    impl KvStore for ScriptedStore {
        async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
            if self.hang_gets {
                std::future::pending::<()>().await;
            }
            if self.fail_gets {
                return Err(StoreError::from_backend("read refused"));
            }
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.fail_puts {
                return Err(StoreError::from_backend("write refused"));
            }
            *self.last_put.lock().expect("lock") = Some(key.to_string());
            self.inner.put(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key).await
        }
    }

    fn service_with(store: Arc<dyn KvStore>, clock: Arc<FixedClock>) -> HistoryService {
        HistoryService::new(store).with_clock(clock)
    }

    #[tokio::test]
    async fn append_on_empty_store_returns_single_record() {
        let store = Arc::new(MemoryKvStore::new());
        let service = service_with(store, FixedClock::at(1_000));

        let records = service
            .append("# Hi", "<h1>Hi</h1>")
            .await
            .expect("append succeeds");

        assert_eq!(
            records,
            vec![ConversionRecord::new("# Hi", "<h1>Hi</h1>", 1_000)]
        );
    }

    #[tokio::test]
    async fn append_grows_log_by_one() {
        let store = Arc::new(MemoryKvStore::new());
        let service = service_with(store, FixedClock::at(10));

        let first = service.append("a", "<p>a</p>").await.expect("first");
        let second = service.append("b", "<p>b</p>").await.expect("second");

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), first.len() + 1);
    }

    #[tokio::test]
    async fn sequential_appends_keep_order_and_timestamps() {
        let store = Arc::new(MemoryKvStore::new());
        let clock = FixedClock::at(100);
        let service = service_with(store, clock.clone());

        for (index, now) in [100, 250, 250, 400].into_iter().enumerate() {
            clock.set(now);
            service
                .append(format!("in-{index}"), format!("out-{index}"))
                .await
                .expect("append");
        }

        let records = service.fetch().await.expect("fetch");
        let inputs: Vec<_> = records.iter().map(|r| r.input.as_str()).collect();
        assert_eq!(inputs, ["in-0", "in-1", "in-2", "in-3"]);
        assert!(
            records
                .windows(2)
                .all(|pair| pair[0].created_at <= pair[1].created_at)
        );
    }

    #[tokio::test]
    async fn clock_going_backwards_keeps_timestamps_non_decreasing() {
        let store = Arc::new(MemoryKvStore::new());
        let clock = FixedClock::at(5_000);
        let service = service_with(store, clock.clone());

        service.append("a", "a").await.expect("first");
        clock.set(4_000);
        let records = service.append("b", "b").await.expect("second");

        assert_eq!(records[1].created_at, 5_000);
    }

    #[tokio::test]
    async fn fetch_after_clear_is_empty() {
        let store = Arc::new(MemoryKvStore::new());
        let service = service_with(store, FixedClock::at(1));

        service.append("a", "a").await.expect("append");
        service.clear().await.expect("clear");

        assert!(service.fetch().await.expect("fetch").is_empty());
    }

    #[tokio::test]
    async fn clear_on_empty_store_succeeds() {
        let service = service_with(Arc::new(MemoryKvStore::new()), FixedClock::at(1));
        service.clear().await.expect("clear");
        assert!(service.fetch().await.expect("fetch").is_empty());
    }

    #[tokio::test]
    async fn corrupt_history_reads_as_empty() {
        let store = Arc::new(MemoryKvStore::new());
        store
            .put(HISTORY_KEY, Bytes::from_static(b"{not json"))
            .await
            .expect("seed");
        let service = service_with(store, FixedClock::at(1));

        assert!(service.fetch().await.expect("fetch").is_empty());
    }

    #[tokio::test]
    async fn corrupt_history_is_replaced_on_append() {
        let store = Arc::new(MemoryKvStore::new());
        store
            .put(HISTORY_KEY, Bytes::from_static(b"[{\"unexpected\":true}]"))
            .await
            .expect("seed");
        let service = service_with(store, FixedClock::at(9));

        let records = service.append("x", "<p>x</p>").await.expect("append");
        assert_eq!(records, vec![ConversionRecord::new("x", "<p>x</p>", 9)]);
    }

    #[tokio::test]
    async fn failed_write_surfaces_error_and_persists_nothing() {
        let store = Arc::new(ScriptedStore {
            fail_puts: true,
            ..Default::default()
        });
        let service = service_with(store.clone(), FixedClock::at(1));

        let err = service.append("a", "a").await.expect_err("write fails");
        assert!(matches!(
            err,
            HistoryError::Storage {
                operation: "append",
                ..
            }
        ));
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
        assert!(
            store
                .inner
                .get(HISTORY_KEY)
                .await
                .expect("inner get")
                .is_none()
        );
    }

    #[tokio::test]
    async fn read_transport_failure_is_not_masked() {
        let store = Arc::new(ScriptedStore {
            fail_gets: true,
            ..Default::default()
        });
        let service = service_with(store.clone(), FixedClock::at(1));

        let err = service.append("a", "a").await.expect_err("read fails");
        assert_eq!(err.operation(), "append");
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hung_store_call_times_out() {
        let store = Arc::new(ScriptedStore {
            hang_gets: true,
            ..Default::default()
        });
        let service =
            service_with(store, FixedClock::at(1)).with_timeout(Duration::from_millis(20));

        let err = service.fetch().await.expect_err("timeout");
        match err {
            HistoryError::Storage { source, .. } => {
                assert!(matches!(
                    source,
                    StoreError::Timeout {
                        operation: "fetch",
                        timeout_ms: 20
                    }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn store_artifact_with_explicit_key_round_trips() {
        let store = Arc::new(MemoryKvStore::new());
        let service = service_with(store.clone(), FixedClock::at(1));

        let key = service
            .store_artifact("<p>hello</p>", Some("mykey"))
            .await
            .expect("store");

        assert_eq!(key.as_str(), "mykey");
        let stored = store.get("mykey").await.expect("get").expect("present");
        assert_eq!(&stored[..], b"<p>hello</p>");
    }

    #[tokio::test]
    async fn store_artifact_generates_timestamp_key() {
        let store = Arc::new(MemoryKvStore::new());
        let service = service_with(store.clone(), FixedClock::at(1_700_000_000_000));

        let key = service
            .store_artifact("<p>x</p>", None)
            .await
            .expect("store");

        let suffix = key.as_str().strip_prefix("html-").expect("prefix");
        assert!(!suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(
            service
                .fetch_artifact(key.as_str())
                .await
                .expect("fetch")
                .as_deref(),
            Some("<p>x</p>")
        );
    }

    #[tokio::test]
    async fn generated_keys_in_same_millisecond_do_not_crash() {
        let store = Arc::new(MemoryKvStore::new());
        let service = service_with(store, FixedClock::at(77));

        let first = service.store_artifact("one", None).await.expect("first");
        let second = service.store_artifact("two", None).await.expect("second");

        assert_eq!(first, second);
        assert_eq!(
            service
                .fetch_artifact(second.as_str())
                .await
                .expect("fetch")
                .as_deref(),
            Some("two")
        );
    }

    #[tokio::test]
    async fn history_log_is_not_an_artifact() {
        let service = service_with(Arc::new(MemoryKvStore::new()), FixedClock::at(5));
        service.append("a", "<p>a</p>").await.expect("append");

        assert!(
            service
                .fetch_artifact(HISTORY_KEY)
                .await
                .expect("fetch")
                .is_none()
        );
    }

    #[tokio::test]
    async fn store_artifact_leaves_history_untouched() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(store.clone(), FixedClock::at(3));

        service
            .store_artifact("<p>x</p>", Some("k"))
            .await
            .expect("store");

        assert_eq!(store.last_put.lock().expect("lock").as_deref(), Some("k"));
        assert!(service.fetch().await.expect("fetch").is_empty());
    }
}
