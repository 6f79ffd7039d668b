//! Stale-while-revalidate keyed cache
//!
//! Serves cached data immediately and revalidates in the background once
//! the policy's freshness window has passed. Concurrent requests for the
//! same key coalesce onto one in-flight fetch, and responses carry a
//! per-key sequence number so a slow fetch can never overwrite the
//! result of a newer one.
//!
//! Fetches run in spawned tasks: a caller abandoning its await (UI
//! teardown) withdraws its interest without cancelling the underlying
//! network call other callers may still be waiting on.

use crate::cache::CachePolicy;
use crate::error::{FetchError, Result, SdkError};
use crate::events::EngineEvent;
use crate::model::{Rank, RoleId, UserId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::broadcast;

/// Cache key for engine data; one class per remote request contract
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The roles listing
    Roles,
    /// One roadmap, addressed by the compound (role, rank) key
    Roadmap { role: RoleId, rank: Rank },
    /// One user's progress entries
    Progress { user: UserId },
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Roles => f.write_str("roles"),
            CacheKey::Roadmap { role, rank } => write!(f, "roadmap/{}/{}", role, rank),
            CacheKey::Progress { user } => write!(f, "progress/{}", user),
        }
    }
}

/// Freshness classification of a served entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Within the freshness window; no network call was made
    Fresh,
    /// Past the window; served immediately while a refetch runs
    Stale,
    /// The most recent refetch failed; data is the last good value
    Error,
}

/// One served cache entry
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub status: CacheStatus,
    pub last_fetched_at: Instant,
}

/// Counters for cache behavior, exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub revalidations: u64,
    pub discarded_responses: u64,
}

type FetchResult<T> = std::result::Result<T, SdkError>;

struct StoredEntry<T> {
    data: T,
    fetched_at: Instant,
    refresh_failed: bool,
}

impl<T> StoredEntry<T> {
    fn status(&self, window: std::time::Duration) -> CacheStatus {
        if self.refresh_failed {
            CacheStatus::Error
        } else if self.fetched_at.elapsed() < window {
            CacheStatus::Fresh
        } else {
            CacheStatus::Stale
        }
    }
}

struct Inflight<T> {
    seq: u64,
    tx: broadcast::Sender<FetchResult<T>>,
}

struct CacheState<T> {
    entries: HashMap<CacheKey, StoredEntry<T>>,
    inflight: HashMap<CacheKey, Inflight<T>>,
    /// Monotone fetch sequence; per-key ordering derives from it
    next_seq: u64,
    /// Highest sequence that has resolved (applied or errored) per key
    applied_seq: HashMap<CacheKey, u64>,
    stats: CacheStats,
}

/// Keyed stale-while-revalidate cache over one value type
pub struct SwrCache<T> {
    policy: CachePolicy,
    state: Arc<Mutex<CacheState<T>>>,
    events: broadcast::Sender<EngineEvent>,
}

impl<T: Clone + Send + 'static> SwrCache<T> {
    pub fn new(policy: CachePolicy, events: broadcast::Sender<EngineEvent>) -> Self {
        Self {
            policy,
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                inflight: HashMap::new(),
                next_seq: 0,
                applied_seq: HashMap::new(),
                stats: CacheStats::default(),
            })),
            events,
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Resolve `key`, fetching through `fetcher` when nothing usable is
    /// cached.
    ///
    /// Within the freshness window the cached entry is returned with no
    /// network call. Past it, the cached entry is returned immediately as
    /// stale and a background refetch is issued; subscribers learn when
    /// it lands. On a cold key, concurrent callers coalesce onto a single
    /// fetch and share its outcome.
    pub async fn fetch<F, Fut>(&self, key: CacheKey, fetcher: F) -> Result<CacheEntry<T>>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, FetchError>> + Send + 'static,
    {
        enum Plan<T> {
            Serve(CacheEntry<T>),
            Join(broadcast::Receiver<FetchResult<T>>),
        }

        let plan = {
            let mut state = self.state.lock().expect("cache state poisoned");
            if let Some(entry) = state.entries.get(&key) {
                let status = entry.status(self.policy.freshness_window);
                let served = CacheEntry {
                    data: entry.data.clone(),
                    status,
                    last_fetched_at: entry.fetched_at,
                };
                state.stats.hits += 1;
                if status != CacheStatus::Fresh && !state.inflight.contains_key(&key) {
                    state.stats.revalidations += 1;
                    let _ = self.events.send(EngineEvent::CacheUpdated {
                        key: key.clone(),
                        status,
                    });
                    self.spawn_fetch(&mut state, key, fetcher);
                }
                Plan::Serve(served)
            } else {
                state.stats.misses += 1;
                let joined = state.inflight.get(&key).map(|i| i.tx.subscribe());
                match joined {
                    Some(rx) => Plan::Join(rx),
                    None => Plan::Join(self.spawn_fetch(&mut state, key, fetcher)),
                }
            }
        };

        match plan {
            Plan::Serve(entry) => Ok(entry),
            Plan::Join(rx) => Self::join(rx).await,
        }
    }

    /// Issue an explicit refetch for `key`, superseding any in-flight
    /// fetch: the new request takes a higher sequence number, so an older
    /// response resolving later is discarded.
    pub async fn refresh<F, Fut>(&self, key: CacheKey, fetcher: F) -> Result<CacheEntry<T>>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, FetchError>> + Send + 'static,
    {
        let rx = {
            let mut state = self.state.lock().expect("cache state poisoned");
            self.spawn_fetch(&mut state, key, fetcher)
        };
        Self::join(rx).await
    }

    /// Current entry for `key` without fetching
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        let state = self.state.lock().expect("cache state poisoned");
        state.entries.get(key).map(|entry| CacheEntry {
            data: entry.data.clone(),
            status: entry.status(self.policy.freshness_window),
            last_fetched_at: entry.fetched_at,
        })
    }

    /// All currently cached values
    pub fn cached_values(&self) -> Vec<T> {
        let state = self.state.lock().expect("cache state poisoned");
        state.entries.values().map(|e| e.data.clone()).collect()
    }

    /// Drop the entry for `key`; sequence bookkeeping is kept so late
    /// responses from before the invalidation are still discarded
    pub fn invalidate(&self, key: &CacheKey) {
        let mut state = self.state.lock().expect("cache state poisoned");
        state.entries.remove(key);
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("cache state poisoned");
        state.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().expect("cache state poisoned").stats
    }

    async fn join(mut rx: broadcast::Receiver<FetchResult<T>>) -> Result<CacheEntry<T>> {
        match rx.recv().await {
            Ok(Ok(data)) => Ok(CacheEntry {
                data,
                status: CacheStatus::Fresh,
                last_fetched_at: Instant::now(),
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(SdkError::TransientNetwork(
                "fetch task terminated before resolving".into(),
            )),
        }
    }

    /// Register a new fetch generation for `key` and run it in a spawned
    /// task. Must be called with the state lock held so registration is
    /// atomic with the decision to fetch.
    fn spawn_fetch<F, Fut>(
        &self,
        state: &mut CacheState<T>,
        key: CacheKey,
        fetcher: F,
    ) -> broadcast::Receiver<FetchResult<T>>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, FetchError>> + Send + 'static,
    {
        state.next_seq += 1;
        let seq = state.next_seq;
        let (tx, rx) = broadcast::channel(4);
        state.inflight.insert(
            key.clone(),
            Inflight {
                seq,
                tx: tx.clone(),
            },
        );

        let shared = Arc::clone(&self.state);
        let events = self.events.clone();
        let retry = self.policy.retry.clone();
        tokio::spawn(async move {
            let outcome = retry.run(move || fetcher()).await;

            let resolved: FetchResult<T> = {
                let mut state = shared.lock().expect("cache state poisoned");
                if state.inflight.get(&key).map(|i| i.seq) == Some(seq) {
                    state.inflight.remove(&key);
                }
                let applied = state.applied_seq.get(&key).copied().unwrap_or(0);

                match outcome {
                    Ok(data) => {
                        if seq > applied {
                            state.applied_seq.insert(key.clone(), seq);
                            state.entries.insert(
                                key.clone(),
                                StoredEntry {
                                    data: data.clone(),
                                    fetched_at: Instant::now(),
                                    refresh_failed: false,
                                },
                            );
                            let _ = events.send(EngineEvent::CacheUpdated {
                                key: key.clone(),
                                status: CacheStatus::Fresh,
                            });
                        } else {
                            state.stats.discarded_responses += 1;
                            tracing::debug!(key = %key, seq, applied, "discarding out-of-order response");
                        }
                        Ok(data)
                    }
                    Err(err) => {
                        let err = SdkError::from(err);
                        if seq > applied {
                            state.applied_seq.insert(key.clone(), seq);
                            if let Some(entry) = state.entries.get_mut(&key) {
                                entry.refresh_failed = true;
                            }
                            tracing::error!(key = %key, error = %err, "fetch failed after exhausting retries");
                            let _ = events.send(EngineEvent::CacheRefreshFailed {
                                key: key.clone(),
                                error: err.clone(),
                            });
                        } else {
                            state.stats.discarded_responses += 1;
                        }
                        Err(err)
                    }
                }
            };

            let _ = tx.send(resolved);
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RetryPolicy;
    use crate::events::EVENT_CHANNEL_CAPACITY;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn cache<T: Clone + Send + 'static>(policy: CachePolicy) -> SwrCache<T> {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        SwrCache::new(policy, tx)
    }

    fn counting_fetcher(
        calls: &Arc<AtomicU32>,
        value: &'static str,
    ) -> impl Fn() -> std::pin::Pin<
        Box<dyn Future<Output = std::result::Result<&'static str, FetchError>> + Send>,
    > + Send
           + 'static {
        let calls = Arc::clone(calls);
        move || {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            })
        }
    }

    #[tokio::test]
    async fn test_fresh_within_window_skips_network() {
        let cache = cache::<&'static str>(CachePolicy::roadmap_content());
        let calls = Arc::new(AtomicU32::new(0));
        let key = CacheKey::Roles;

        let first = cache
            .fetch(key.clone(), counting_fetcher(&calls, "v1"))
            .await
            .unwrap();
        assert_eq!(first.data, "v1");
        assert_eq!(first.status, CacheStatus::Fresh);

        let second = cache
            .fetch(key.clone(), counting_fetcher(&calls, "v2"))
            .await
            .unwrap();
        assert_eq!(second.data, "v1");
        assert_eq!(second.status, CacheStatus::Fresh);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.revalidations, 0);
    }

    #[tokio::test]
    async fn test_stale_serves_immediately_then_revalidates() {
        let cache = cache::<&'static str>(CachePolicy::read_through());
        let calls = Arc::new(AtomicU32::new(0));
        let key = CacheKey::Roadmap {
            role: "backend".into(),
            rank: Rank::Mid,
        };

        cache
            .fetch(key.clone(), counting_fetcher(&calls, "old"))
            .await
            .unwrap();

        // Zero freshness window: the entry is already stale, so this read
        // serves the cached value and revalidates in the background.
        let served = cache
            .fetch(key.clone(), counting_fetcher(&calls, "new"))
            .await
            .unwrap();
        assert_eq!(served.data, "old");
        assert_eq!(served.status, CacheStatus::Stale);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.peek(&key).unwrap().data, "new");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().revalidations, 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let cache = cache::<&'static str>(CachePolicy::roadmap_content());
        let calls = Arc::new(AtomicU32::new(0));
        let key = CacheKey::Roles;

        let slow = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(40)).await;
                    Ok::<_, FetchError>("shared")
                })
            }
        };

        let (a, b) = tokio::join!(
            cache.fetch(key.clone(), slow.clone()),
            cache.fetch(key.clone(), slow)
        );

        assert_eq!(a.unwrap().data, "shared");
        assert_eq!(b.unwrap().data, "shared");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_retry_then_succeed() {
        let policy = CachePolicy::roadmap_content().with_retry(RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
        });
        let cache = cache::<&'static str>(policy);
        let calls = Arc::new(AtomicU32::new(0));

        let flaky = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                Box::pin(async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(FetchError::Transient("timeout".into()))
                    } else {
                        Ok("recovered")
                    }
                })
            }
        };

        let entry = cache.fetch(CacheKey::Roles, flaky).await.unwrap();
        assert_eq!(entry.data, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_terminal() {
        let cache = cache::<&'static str>(CachePolicy::roadmap_content());
        let calls = Arc::new(AtomicU32::new(0));

        let rejected = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<&'static str, _>(FetchError::Client {
                        status: 403,
                        message: "forbidden".into(),
                    })
                })
            }
        };

        let err = cache.fetch(CacheKey::Roles, rejected).await.unwrap_err();
        assert!(matches!(err, SdkError::ClientRequest { status: 403, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.peek(&CacheKey::Roles).is_none());
    }

    #[tokio::test]
    async fn test_lower_sequence_response_is_discarded() {
        let cache = cache::<&'static str>(CachePolicy::roadmap_content());
        let key = CacheKey::Roadmap {
            role: "backend".into(),
            rank: Rank::Mid,
        };

        let slow = move || {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(80)).await;
                Ok::<_, FetchError>("older")
            })
        };
        let fast = move || Box::pin(async move { Ok::<_, FetchError>("newer") });

        let (first, second) = tokio::join!(cache.fetch(key.clone(), slow), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cache.refresh(key.clone(), fast).await
        });

        // Each caller receives the outcome of the request it awaited…
        assert_eq!(first.unwrap().data, "older");
        assert_eq!(second.unwrap().data, "newer");

        // …but the cache keeps the higher-sequence result.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.peek(&key).unwrap().data, "newer");
        assert_eq!(cache.stats().discarded_responses, 1);
    }

    #[tokio::test]
    async fn test_failed_revalidation_flags_entry_and_notifies() {
        let (events_tx, mut events_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let policy = CachePolicy::read_through().with_retry(RetryPolicy::none());
        let cache: SwrCache<&'static str> = SwrCache::new(policy, events_tx);
        let key = CacheKey::Progress { user: "u1".into() };

        let ok = move || Box::pin(async move { Ok::<_, FetchError>("seed") });
        cache.fetch(key.clone(), ok).await.unwrap();

        let failing =
            move || Box::pin(async move { Err::<&'static str, _>(FetchError::Transient("down".into())) });
        let served = cache.fetch(key.clone(), failing).await.unwrap();
        assert_eq!(served.data, "seed");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.peek(&key).unwrap().status, CacheStatus::Error);

        let mut saw_failure = false;
        while let Ok(event) = events_rx.try_recv() {
            if matches!(event, EngineEvent::CacheRefreshFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = cache::<&'static str>(CachePolicy::roadmap_content());
        let calls = Arc::new(AtomicU32::new(0));
        let key = CacheKey::Roles;

        cache
            .fetch(key.clone(), counting_fetcher(&calls, "v1"))
            .await
            .unwrap();
        cache.invalidate(&key);
        let refetched = cache
            .fetch(key.clone(), counting_fetcher(&calls, "v2"))
            .await
            .unwrap();

        assert_eq!(refetched.data, "v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
