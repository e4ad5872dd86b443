//! The process-scoped query cache.
//!
//! Results are indexed by canonical string keys (`group[:param]*`). Concurrent
//! fetches for one key coalesce into a single remote call; mutations mark key
//! groups stale via [`QueryCache::invalidate`], and the next read of a stale
//! key refetches.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use color_eyre::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::state::{QueryState, RetryPolicy};

/// Outcome handed to every caller waiting on a fetch task.
type FetchOutcome = std::result::Result<Value, String>;

#[derive(Default)]
struct Entry {
  value: Option<Value>,
  error: Option<String>,
  fetched_at: Option<Instant>,
  stale: bool,
  in_flight: bool,
  waiters: Vec<oneshot::Sender<FetchOutcome>>,
}

impl Entry {
  fn is_fresh(&self, stale_time: Duration) -> bool {
    if self.stale || self.value.is_none() {
      return false;
    }
    self
      .fetched_at
      .map(|t| t.elapsed() < stale_time)
      .unwrap_or(false)
  }

  fn state<T: DeserializeOwned>(&self) -> QueryState<T> {
    if let Some(value) = &self.value {
      match serde_json::from_value(value.clone()) {
        Ok(data) => QueryState::Success(data),
        Err(e) => QueryState::Error(format!("Failed to decode cached value: {}", e)),
      }
    } else if let Some(e) = &self.error {
      QueryState::Error(e.clone())
    } else {
      QueryState::Idle
    }
  }
}

/// Keyed client-side cache of query results.
///
/// One instance is created at application start and shared (cheap clone) by
/// every reader and the mutation path. The map is only ever touched by this
/// type; locks are held across map operations, never across awaits.
#[derive(Clone)]
pub struct QueryCache {
  entries: Arc<Mutex<HashMap<String, Entry>>>,
  stale_time: Duration,
  retry: RetryPolicy,
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new()
  }
}

impl QueryCache {
  pub fn new() -> Self {
    Self {
      entries: Arc::new(Mutex::new(HashMap::new())),
      stale_time: Duration::from_secs(300),
      retry: RetryPolicy::default(),
    }
  }

  /// Set how long a successful result stays fresh.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// Set the retry policy applied to read fetches.
  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Fetch a query with cache-first semantics.
  ///
  /// A fresh entry is returned without issuing a remote call. On miss or
  /// staleness the first caller spawns a single fetch task (with bounded
  /// retry per the policy) and every caller for the same key awaits it, so
  /// identical concurrent reads issue at most one remote call. Dropping a
  /// caller does not cancel the task; the entry is still updated.
  ///
  /// With `enabled == false` nothing is issued and the last known state is
  /// returned ([`QueryState::Idle`] when the key was never fetched).
  pub async fn fetch<T, F, Fut>(&self, cache_key: &str, enabled: bool, fetcher: F) -> QueryState<T>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let rx = {
      let mut entries = self.lock();

      if !enabled {
        return entries
          .get(cache_key)
          .map(|entry| entry.state())
          .unwrap_or(QueryState::Idle);
      }

      let entry = entries.entry(cache_key.to_string()).or_default();
      if entry.is_fresh(self.stale_time) {
        return entry.state();
      }

      let (tx, rx) = oneshot::channel();
      entry.waiters.push(tx);

      if entry.in_flight {
        debug!(key = cache_key, "joined in-flight fetch");
      } else {
        entry.in_flight = true;
        debug!(key = cache_key, "fetch started");
        let cache = self.clone();
        let key = cache_key.to_string();
        tokio::spawn(async move { cache.run_fetch(key, fetcher).await });
      }
      rx
    };

    match rx.await {
      Ok(Ok(value)) => match serde_json::from_value(value) {
        Ok(data) => QueryState::Success(data),
        Err(e) => QueryState::Error(format!("Failed to decode fetched value: {}", e)),
      },
      Ok(Err(e)) => QueryState::Error(e),
      Err(_) => QueryState::Error("Fetch task dropped before completing".to_string()),
    }
  }

  /// Mark every entry under the prefix stale; the next read refetches.
  ///
  /// Matching is segment-aware: `payment` matches `payment:17` but not keys
  /// in the `payments` group.
  pub fn invalidate(&self, prefix: &str) {
    let mut entries = self.lock();
    let mut hits = 0usize;
    for (key, entry) in entries.iter_mut() {
      if prefix_matches(prefix, key) {
        entry.stale = true;
        hits += 1;
      }
    }
    debug!(prefix, hits, "invalidated");
  }

  /// Whether an entry for this key exists and is marked stale.
  pub fn is_stale(&self, cache_key: &str) -> bool {
    self
      .lock()
      .get(cache_key)
      .map(|e| e.stale)
      .unwrap_or(false)
  }

  /// Last cached value for a key, if any, regardless of freshness.
  pub fn peek<T: DeserializeOwned>(&self, cache_key: &str) -> Option<T> {
    let entries = self.lock();
    let value = entries.get(cache_key)?.value.clone()?;
    serde_json::from_value(value).ok()
  }

  /// Drive one fetch to completion and hand the outcome to all waiters.
  async fn run_fetch<T, F, Fut>(self, cache_key: String, fetcher: F)
  where
    T: Serialize,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let outcome = self.fetch_with_retry(&cache_key, fetcher).await;

    let waiters = {
      let mut entries = self.lock();
      let entry = entries.entry(cache_key).or_default();
      entry.in_flight = false;
      match &outcome {
        Ok(value) => {
          entry.value = Some(value.clone());
          entry.error = None;
          entry.fetched_at = Some(Instant::now());
          entry.stale = false;
        }
        Err(e) => {
          // Keep the last known good value; only the error state changes
          entry.error = Some(e.clone());
        }
      }
      std::mem::take(&mut entry.waiters)
    };

    for waiter in waiters {
      // Ignore send errors - the caller may have navigated away
      let _ = waiter.send(outcome.clone());
    }
  }

  async fn fetch_with_retry<T, F, Fut>(&self, cache_key: &str, fetcher: F) -> FetchOutcome
  where
    T: Serialize,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let mut attempt = 1u32;
    loop {
      match fetcher().await {
        Ok(data) => {
          return serde_json::to_value(data)
            .map_err(|e| format!("Failed to encode fetched value: {}", e));
        }
        Err(e) if attempt < self.retry.max_attempts => {
          let delay = self.retry.delay_after(attempt);
          warn!(key = cache_key, attempt, error = %e, "fetch failed, retrying in {:?}", delay);
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(e) => {
          warn!(key = cache_key, attempt, error = %e, "fetch failed");
          return Err(e.to_string());
        }
      }
    }
  }
}

fn prefix_matches(prefix: &str, key: &str) -> bool {
  key == prefix
    || (key.len() > prefix.len()
      && key.starts_with(prefix)
      && key.as_bytes()[prefix.len()] == b':')
}
