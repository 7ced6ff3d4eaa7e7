//! Keyed request execution with caching, deduplication and retry.
//!
//! Every collaborator call that benefits from caching or dedup goes through
//! [`RequestExecutor::execute`] under a logical key. Concurrent calls with
//! the same key share one in-flight future; completed values are cached with
//! a lazy wall-clock TTL; failures are retried with exponential backoff
//! before they surface.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

use practice_core::Clock;
use practice_core::model::DifficultyLevel;

use crate::contract::PracticeApi;
use crate::error::ApiError;

const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
const DIFFICULTY_LEVELS_TTL: Duration = Duration::from_secs(10 * 60);
const DIFFICULTY_LEVELS_KEY: &str = "difficulty-levels";

type DynValue = Arc<dyn Any + Send + Sync>;
type SharedRequest = Shared<BoxFuture<'static, Result<DynValue, ApiError>>>;

/// Backoff settings for [`RequestExecutor`].
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-indexed): `base * 2^attempt`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
    }
}

/// Per-call options for [`RequestExecutor::execute`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ExecuteOptions {
    /// Cache TTL override for this key.
    pub ttl: Option<Duration>,
    /// Skip the cache read and always hit the collaborator.
    pub force_refresh: bool,
    /// Per-call caching override; defaults to the executor-wide setting.
    pub use_cache: Option<bool>,
}

/// Read-only projection of a keyed request record.
///
/// `data` prefers an optimistic value over the last confirmed one.
#[derive(Clone, Debug)]
pub struct RequestView<T> {
    pub is_loading: bool,
    pub error: Option<ApiError>,
    pub last_fetched: Option<DateTime<Utc>>,
    pub data: Option<T>,
}

impl<T> Default for RequestView<T> {
    fn default() -> Self {
        Self {
            is_loading: false,
            error: None,
            last_fetched: None,
            data: None,
        }
    }
}

#[derive(Default)]
struct RequestRecord {
    is_loading: bool,
    error: Option<ApiError>,
    last_fetched: Option<DateTime<Utc>>,
    data: Option<DynValue>,
    optimistic: Option<DynValue>,
}

struct CacheEntry {
    data: DynValue,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now.signed_duration_since(self.stored_at) < ttl,
            Err(_) => true,
        }
    }
}

struct ExecutorState {
    clock: Clock,
    default_ttl: Duration,
    caching_enabled: bool,
    retry: RetryPolicy,
    requests: HashMap<String, RequestRecord>,
    cache: HashMap<String, CacheEntry>,
    pending: HashMap<String, SharedRequest>,
}

impl ExecutorState {
    fn record_mut(&mut self, key: &str) -> &mut RequestRecord {
        self.requests.entry(key.to_owned()).or_default()
    }
}

/// Generic keyed request executor (cache + dedup + retry + optimistic data).
#[derive(Clone)]
pub struct RequestExecutor {
    state: Arc<Mutex<ExecutorState>>,
}

impl Default for RequestExecutor {
    fn default() -> Self {
        Self::new(Clock::default())
    }
}

impl RequestExecutor {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            state: Arc::new(Mutex::new(ExecutorState {
                clock,
                default_ttl: DEFAULT_TTL,
                caching_enabled: true,
                retry: RetryPolicy::default(),
                requests: HashMap::new(),
                cache: HashMap::new(),
                pending: HashMap::new(),
            })),
        }
    }

    #[must_use]
    pub fn with_retry_policy(self, retry: RetryPolicy) -> Self {
        self.lock().retry = retry;
        self
    }

    /// Replaces the executor clock (tests use this to expire TTLs).
    pub fn set_clock(&self, clock: Clock) {
        self.lock().clock = clock;
    }

    pub fn set_caching_enabled(&self, enabled: bool) {
        let mut state = self.lock();
        state.caching_enabled = enabled;
        if !enabled {
            state.cache.clear();
        }
    }

    /// Drops one cache entry, or all of them when `key` is `None`.
    pub fn clear_cache(&self, key: Option<&str>) {
        let mut state = self.lock();
        match key {
            Some(key) => {
                state.cache.remove(key);
            }
            None => state.cache.clear(),
        }
    }

    /// Forgets the request record and any pending marker for a key.
    pub fn clear_request(&self, key: &str) {
        let mut state = self.lock();
        state.requests.remove(key);
        state.pending.remove(key);
    }

    /// Stores an optimistic value for a key. It is cleared (restoring the
    /// confirmed data) when the next request for the key completes, whether
    /// it succeeds or fails.
    pub fn set_optimistic<T: Clone + Send + Sync + 'static>(&self, key: &str, value: T) {
        self.lock().record_mut(key).optimistic = Some(Arc::new(value));
    }

    pub fn clear_optimistic(&self, key: &str) {
        self.lock().record_mut(key).optimistic = None;
    }

    /// Current request record for a key, downcast to the caller's type.
    #[must_use]
    pub fn request_view<T: Clone + Send + Sync + 'static>(&self, key: &str) -> RequestView<T> {
        let state = self.lock();
        let Some(record) = state.requests.get(key) else {
            return RequestView::default();
        };
        let data = record
            .optimistic
            .as_ref()
            .or(record.data.as_ref())
            .and_then(|value| value.clone().downcast::<T>().ok())
            .map(|arc| (*arc).clone());
        RequestView {
            is_loading: record.is_loading,
            error: record.error.clone(),
            last_fetched: record.last_fetched,
            data,
        }
    }

    /// Executes `request` under `key` with caching, deduplication and retry.
    ///
    /// # Errors
    ///
    /// Returns the classified error of the final attempt once retries are
    /// exhausted.
    pub async fn execute<T, F, Fut>(
        &self,
        key: &str,
        request: F,
        options: ExecuteOptions,
    ) -> Result<T, ApiError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let shared = {
            let mut state = self
                .state
                .lock()
                .map_err(|e| ApiError::Unknown(e.to_string()))?;
            let use_cache = options.use_cache.unwrap_or(state.caching_enabled);

            if use_cache && !options.force_refresh {
                let now = state.clock.now();
                if let Some(entry) = state.cache.get(key) {
                    if entry.is_valid(now) {
                        if let Ok(value) = entry.data.clone().downcast::<T>() {
                            debug!(key, "request served from cache");
                            return Ok((*value).clone());
                        }
                    } else {
                        state.cache.remove(key);
                    }
                }
            }

            if let Some(pending) = state.pending.get(key) {
                debug!(key, "joining in-flight request");
                pending.clone()
            } else {
                let record = state.record_mut(key);
                record.is_loading = true;
                record.error = None;

                let shared = Self::run_request(
                    Arc::clone(&self.state),
                    key.to_owned(),
                    request,
                    options.ttl,
                    use_cache,
                )
                .boxed()
                .shared();
                state.pending.insert(key.to_owned(), shared.clone());
                shared
            }
        };

        let value = shared.await?;
        value
            .downcast::<T>()
            .map(|arc| (*arc).clone())
            .map_err(|_| ApiError::Unknown(format!("type mismatch for request key {key}")))
    }

    async fn run_request<T, F, Fut>(
        state: Arc<Mutex<ExecutorState>>,
        key: String,
        mut request: F,
        ttl: Option<Duration>,
        use_cache: bool,
    ) -> Result<DynValue, ApiError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let retry = state
            .lock()
            .map_err(|e| ApiError::Unknown(e.to_string()))?
            .retry;
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..=retry.max_retries {
            if attempt > 0 {
                let delay = retry.delay_for_attempt(attempt - 1);
                debug!(key, attempt, ?delay, "retrying request after backoff");
                tokio::time::sleep(delay).await;
            }

            match request().await {
                Ok(value) => {
                    let value: DynValue = Arc::new(value);
                    let mut state = state
                        .lock()
                        .map_err(|e| ApiError::Unknown(e.to_string()))?;
                    let now = state.clock.now();
                    if use_cache {
                        let ttl = ttl.unwrap_or(state.default_ttl);
                        state.cache.insert(
                            key.clone(),
                            CacheEntry {
                                data: value.clone(),
                                stored_at: now,
                                ttl,
                            },
                        );
                    }
                    let record = state.record_mut(&key);
                    record.data = Some(value.clone());
                    record.last_fetched = Some(now);
                    record.error = None;
                    record.is_loading = false;
                    record.optimistic = None;
                    state.pending.remove(&key);
                    return Ok(value);
                }
                Err(err) => {
                    last_error = Some(err);
                }
            }
        }

        let err = last_error.unwrap_or_else(|| ApiError::Unknown("request never ran".into()));
        let mut state = state
            .lock()
            .map_err(|e| ApiError::Unknown(e.to_string()))?;
        let record = state.record_mut(&key);
        record.error = Some(err.clone());
        record.is_loading = false;
        record.optimistic = None;
        state.pending.remove(&key);
        Err(err)
    }

    /// Cached, deduplicated difficulty-level fetch, sorted into display
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the underlying fetch fails.
    pub async fn difficulty_levels(
        &self,
        practice_api: Arc<dyn PracticeApi>,
        force_refresh: bool,
    ) -> Result<Vec<DifficultyLevel>, ApiError> {
        self.execute(
            DIFFICULTY_LEVELS_KEY,
            move || {
                let practice_api = Arc::clone(&practice_api);
                async move {
                    let mut levels = practice_api.difficulty_levels().await?;
                    DifficultyLevel::sort_for_display(&mut levels);
                    Ok(levels)
                }
            },
            ExecuteOptions {
                ttl: Some(DIFFICULTY_LEVELS_TTL),
                force_refresh,
                use_cache: None,
            },
        )
        .await
    }

    // Settings and views tolerate a poisoned lock; none of the critical
    // sections leave the state half-written.
    fn lock(&self) -> std::sync::MutexGuard<'_, ExecutorState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_core::time::fixed_now;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn counting_request(
        calls: Arc<AtomicUsize>,
        fail_first: usize,
    ) -> impl FnMut() -> BoxFuture<'static, Result<u32, ApiError>> + Send + 'static {
        move || {
            let calls = Arc::clone(&calls);
            async move {
                // Yield once so concurrent callers can observe the request
                // as in-flight.
                tokio::task::yield_now().await;
                let call = calls.fetch_add(1, Ordering::SeqCst);
                if call < fail_first {
                    Err(ApiError::Network("down".into()))
                } else {
                    Ok(call as u32)
                }
            }
            .boxed()
        }
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn concurrent_same_key_calls_share_one_request() {
        let executor = RequestExecutor::new(Clock::fixed(fixed_now()));
        let calls = Arc::new(AtomicUsize::new(0));

        // Caching is off so sharing can only come from in-flight dedup.
        let options = ExecuteOptions {
            use_cache: Some(false),
            ..ExecuteOptions::default()
        };
        let (a, b) = tokio::join!(
            executor.execute("shared", counting_request(Arc::clone(&calls), 0), options),
            executor.execute("shared", counting_request(Arc::clone(&calls), 0), options),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_with_exponential_backoff_then_succeeds() {
        let executor =
            RequestExecutor::new(Clock::fixed(fixed_now())).with_retry_policy(fast_retry(3));
        let calls = Arc::new(AtomicUsize::new(0));

        let started = Instant::now();
        let value = executor
            .execute(
                "flaky",
                counting_request(Arc::clone(&calls), 2),
                ExecuteOptions {
                    use_cache: Some(false),
                    ..ExecuteOptions::default()
                },
            )
            .await
            .unwrap();

        // Two failures then success: exactly 3 calls, delays 10ms + 20ms.
        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_final_error() {
        let executor =
            RequestExecutor::new(Clock::fixed(fixed_now())).with_retry_policy(fast_retry(1));
        let calls = Arc::new(AtomicUsize::new(0));

        let err = executor
            .execute(
                "dead",
                counting_request(Arc::clone(&calls), usize::MAX),
                ExecuteOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let view = executor.request_view::<u32>("dead");
        assert!(!view.is_loading);
        assert!(view.error.is_some());
    }

    #[tokio::test]
    async fn cache_hit_skips_the_request_until_ttl_expires() {
        let executor = RequestExecutor::new(Clock::fixed(fixed_now()));
        let calls = Arc::new(AtomicUsize::new(0));
        let options = ExecuteOptions {
            ttl: Some(Duration::from_secs(60)),
            ..ExecuteOptions::default()
        };

        executor
            .execute("levels", counting_request(Arc::clone(&calls), 0), options)
            .await
            .unwrap();
        executor
            .execute("levels", counting_request(Arc::clone(&calls), 0), options)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Expire the entry by advancing the wall clock past the TTL.
        executor.set_clock(Clock::fixed(fixed_now() + chrono::Duration::seconds(61)));
        executor
            .execute("levels", counting_request(Arc::clone(&calls), 0), options)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_a_valid_cache_entry() {
        let executor = RequestExecutor::new(Clock::fixed(fixed_now()));
        let calls = Arc::new(AtomicUsize::new(0));

        executor
            .execute(
                "levels",
                counting_request(Arc::clone(&calls), 0),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        executor
            .execute(
                "levels",
                counting_request(Arc::clone(&calls), 0),
                ExecuteOptions {
                    force_refresh: true,
                    ..ExecuteOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn optimistic_value_is_cleared_on_success_and_failure() {
        let executor =
            RequestExecutor::new(Clock::fixed(fixed_now())).with_retry_policy(fast_retry(0));

        executor.set_optimistic("opt", 99_u32);
        assert_eq!(executor.request_view::<u32>("opt").data, Some(99));

        executor
            .execute(
                "opt",
                counting_request(Arc::new(AtomicUsize::new(0)), 0),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(executor.request_view::<u32>("opt").data, Some(0));

        executor.set_optimistic("opt", 99_u32);
        let _ = executor
            .execute(
                "opt",
                counting_request(Arc::new(AtomicUsize::new(0)), usize::MAX),
                ExecuteOptions {
                    force_refresh: true,
                    ..ExecuteOptions::default()
                },
            )
            .await;
        // Optimistic value restored to the last confirmed data.
        assert_eq!(executor.request_view::<u32>("opt").data, Some(0));
    }

    #[tokio::test]
    async fn a_poisoned_lock_surfaces_as_an_error_not_a_panic() {
        let executor = RequestExecutor::new(Clock::fixed(fixed_now()));
        let state = Arc::clone(&executor.state);
        let _ = std::thread::spawn(move || {
            let _guard = state.lock().unwrap();
            panic!("poison the executor lock");
        })
        .join();

        let err = executor
            .execute(
                "poisoned",
                counting_request(Arc::new(AtomicUsize::new(0)), 0),
                ExecuteOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unknown(_)));

        // The infallible accessors recover instead of panicking.
        assert!(executor.request_view::<u32>("poisoned").data.is_none());
    }
}
