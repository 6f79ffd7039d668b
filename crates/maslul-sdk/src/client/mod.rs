//! Query facade
//!
//! [`RoadmapClient`] is the single entry point UI consumers talk to. It
//! owns the caches, the progress store and the remote seams, and returns
//! fully computed views — raw wire shapes never cross this boundary.
//!
//! Mutations follow a fixed ordering: resolve locks → reject if locked →
//! optimistic update → persist → commit or revert. A persistence failure
//! always reverts the optimistic change before the error surfaces, so
//! the store never reflects unpersisted state after a failed mutation.

use crate::cache::{CacheKey, CachePolicy, CacheStats, RetryPolicy, SwrCache};
use crate::error::{FetchError, Result, SdkError};
use crate::events::{EngineEvent, EVENT_CHANNEL_CAPACITY};
use crate::model::{
    ingest_roles, ContentSnapshot, ProgressRecord, Rank, RoadmapView, Role, RoleId, Topic,
    TopicId, TopicView, UserId,
};
use crate::progress::{LevelProgress, MutationOutcome, ProgressStore};
use crate::resolver::{missing_prerequisites, resolve_locks};
use crate::traits::{ProgressSink, ProgressSource, RemoteStore, RoadmapSource};
use maslul_storage_client::{StorageClient, StorageConfig};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Cache counters per key class
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub roles: CacheStats,
    pub roadmaps: CacheStats,
    pub progress: CacheStats,
}

/// Composed roadmap engine client
///
/// # Example
///
/// ```rust,ignore
/// use maslul_sdk::{RoadmapClient, Rank};
/// use maslul_storage_client::StorageConfig;
///
/// let client = RoadmapClient::for_backend(StorageConfig {
///     base_url: "https://api.example.com".into(),
///     ..Default::default()
/// });
///
/// let view = client
///     .roadmap_view(&"user-1".into(), &"backend".into(), Rank::Mid)
///     .await?;
/// println!("{}% complete", view.completion_pct);
/// ```
pub struct RoadmapClient {
    store: Arc<dyn RemoteStore>,
    progress: ProgressStore,
    roles: SwrCache<Vec<Arc<Role>>>,
    roadmaps: SwrCache<Arc<ContentSnapshot>>,
    progress_fetches: SwrCache<Arc<Vec<ProgressRecord>>>,
    /// Users whose progress has been seeded from the remote source
    hydrated: Mutex<HashSet<UserId>>,
    mutation_retry: RetryPolicy,
    events: broadcast::Sender<EngineEvent>,
}

impl RoadmapClient {
    /// Create a client with the default policies: a 5 minute freshness
    /// window for roadmap content, read-through for progress
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::with_policies(
            store,
            CachePolicy::roadmap_content(),
            CachePolicy::read_through(),
        )
    }

    /// Create a client with explicit per-key-class policies
    pub fn with_policies(
        store: Arc<dyn RemoteStore>,
        content_policy: CachePolicy,
        progress_policy: CachePolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            progress: ProgressStore::new(),
            roles: SwrCache::new(content_policy.clone(), events.clone()),
            roadmaps: SwrCache::new(content_policy, events.clone()),
            mutation_retry: progress_policy.retry.clone(),
            progress_fetches: SwrCache::new(progress_policy, events.clone()),
            hydrated: Mutex::new(HashSet::new()),
            events,
        }
    }

    /// Create a client over the HTTP storage backend
    pub fn for_backend(config: StorageConfig) -> Self {
        Self::new(Arc::new(StorageClient::new(config)))
    }

    /// Subscribe to engine notifications: cache status transitions and
    /// mutation commits/reverts. Dropping the receiver withdraws interest
    /// without cancelling any underlying fetch.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    // ==================== Queries ====================

    /// List all roles
    pub async fn roles(&self) -> Result<Vec<Arc<Role>>> {
        let store = Arc::clone(&self.store);
        let fetcher = move || {
            let store = Arc::clone(&store);
            Box::pin(async move {
                let entries = store.fetch_roles().await?;
                ingest_roles(entries).map_err(|e| FetchError::Malformed(e.to_string()))
            })
        };
        Ok(self.roles.fetch(CacheKey::Roles, fetcher).await?.data)
    }

    /// Fully computed view for one (role, level) pair: content merged
    /// with progress and lock state
    pub async fn roadmap_view(
        &self,
        user: &UserId,
        role: &RoleId,
        rank: Rank,
    ) -> Result<RoadmapView> {
        self.ensure_progress(user).await?;
        let snapshot = self.fetch_snapshot(role, rank).await?;
        Ok(self.compose_view(user, &snapshot))
    }

    /// Aggregate completion metrics over an arbitrary topic set
    pub fn level_progress(&self, user: &UserId, topics: &[Arc<Topic>]) -> LevelProgress {
        self.progress.level_progress(user, topics)
    }

    /// Current progress record for a (user, topic) pair
    pub fn progress_record(&self, user: &UserId, topic: &TopicId) -> ProgressRecord {
        self.progress.get_record(user, topic)
    }

    /// Issue an explicit refetch for one roadmap, superseding any
    /// in-flight revalidation
    pub async fn refresh_roadmap(&self, role: &RoleId, rank: Rank) -> Result<()> {
        let key = CacheKey::Roadmap {
            role: role.clone(),
            rank,
        };
        let previous = self.roadmaps.peek(&key).map(|e| e.data);
        let fetcher = self.snapshot_fetcher(role.clone(), rank, previous);
        self.roadmaps.refresh(key, fetcher).await?;
        Ok(())
    }

    /// Re-fetch a user's progress and merge it into the store; keys with
    /// a pending optimistic mutation keep their optimistic value
    pub async fn refresh_progress(&self, user: &UserId) -> Result<()> {
        let key = CacheKey::Progress { user: user.clone() };
        let fetcher = self.progress_fetcher(user.clone());
        let entry = self.progress_fetches.refresh(key, fetcher).await?;
        self.progress.hydrate(user, entry.data.as_ref().clone());
        self.hydrated
            .lock()
            .expect("hydration set poisoned")
            .insert(user.clone());
        Ok(())
    }

    /// Cache counters per key class
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            roles: self.roles.stats(),
            roadmaps: self.roadmaps.stats(),
            progress: self.progress_fetches.stats(),
        }
    }

    // ==================== Mutations ====================

    /// Mark a topic complete for a user.
    ///
    /// Rejects with [`SdkError::PrerequisitesNotMet`] while the topic is
    /// locked and with [`SdkError::MutationInProgress`] while another
    /// change for the same record is in flight. The optimistic change is
    /// persisted with retries; exhausted retries revert it and surface
    /// the error.
    pub async fn complete_topic(
        &self,
        user: &UserId,
        topic_id: &TopicId,
    ) -> Result<ProgressRecord> {
        self.mutate_topic(user, topic_id, true).await
    }

    /// Mark a topic incomplete for a user; the record is kept with a
    /// null completion time, never deleted
    pub async fn uncomplete_topic(
        &self,
        user: &UserId,
        topic_id: &TopicId,
    ) -> Result<ProgressRecord> {
        self.mutate_topic(user, topic_id, false).await
    }

    // ==================== Internals ====================

    async fn mutate_topic(
        &self,
        user: &UserId,
        topic_id: &TopicId,
        completed: bool,
    ) -> Result<ProgressRecord> {
        self.ensure_progress(user).await?;
        let snapshot = self
            .snapshot_containing(topic_id)
            .ok_or_else(|| SdkError::UnknownTopic(topic_id.clone()))?;

        // A locked topic can never be completed; this also closes the
        // transitive case, since an incomplete prerequisite that is
        // itself locked can never have been completed.
        if completed {
            let topics = snapshot.topics_in_order();
            let locks = resolve_locks(&topics, |id| {
                self.progress.get_record(user, id).is_completed()
            });
            if locks.get(topic_id).copied().unwrap_or(false) {
                let known: HashSet<&TopicId> = topics.iter().map(|t| &t.id).collect();
                let topic = snapshot.topic(topic_id).expect("topic is in snapshot");
                let missing = missing_prerequisites(topic, &known, |id| {
                    self.progress.get_record(user, id).is_completed()
                });
                tracing::warn!(
                    topic = %topic_id,
                    ?missing,
                    "rejecting completion of a locked topic"
                );
                return Err(SdkError::PrerequisitesNotMet {
                    topic_id: topic_id.clone(),
                    missing,
                });
            }
        }

        let outcome = if completed {
            self.progress.mark_complete(user, topic_id)?
        } else {
            self.progress.mark_incomplete(user, topic_id)?
        };
        let guard = match outcome {
            MutationOutcome::Unchanged(record) => return Ok(record),
            MutationOutcome::Applied(guard) => guard,
        };

        // Mutations are never cached or coalesced; each persists
        // independently and reports back for commit or revert.
        let persist = {
            let store = Arc::clone(&self.store);
            let user = user.clone();
            let topic = topic_id.clone();
            move || {
                let store = Arc::clone(&store);
                let user = user.clone();
                let topic = topic.clone();
                async move { store.put_progress(&user, &topic, completed).await }
            }
        };

        match self.mutation_retry.run(persist).await {
            Ok(()) => {
                let record = self.progress.commit(guard);
                let _ = self.events.send(EngineEvent::MutationCommitted {
                    user_id: user.clone(),
                    topic_id: topic_id.clone(),
                    completed,
                });
                Ok(record)
            }
            Err(err) => {
                let err = SdkError::from(err);
                self.progress.revert(guard);
                let _ = self.events.send(EngineEvent::MutationReverted {
                    user_id: user.clone(),
                    topic_id: topic_id.clone(),
                    error: err.clone(),
                });
                Err(err)
            }
        }
    }

    async fn fetch_snapshot(&self, role: &RoleId, rank: Rank) -> Result<Arc<ContentSnapshot>> {
        let key = CacheKey::Roadmap {
            role: role.clone(),
            rank,
        };
        let previous = self.roadmaps.peek(&key).map(|e| e.data);
        let fetcher = self.snapshot_fetcher(role.clone(), rank, previous);
        Ok(self.roadmaps.fetch(key, fetcher).await?.data)
    }

    fn snapshot_fetcher(
        &self,
        role: RoleId,
        rank: Rank,
        previous: Option<Arc<ContentSnapshot>>,
    ) -> impl Fn() -> std::pin::Pin<
        Box<
            dyn std::future::Future<
                    Output = std::result::Result<Arc<ContentSnapshot>, FetchError>,
                > + Send,
        >,
    > + Send
           + 'static {
        let store = Arc::clone(&self.store);
        move || {
            let store = Arc::clone(&store);
            let role = role.clone();
            let previous = previous.clone();
            Box::pin(async move {
                let payload = store.fetch_roadmap(&role, rank).await?;
                let snapshot = ContentSnapshot::ingest_with_previous(payload, previous.as_ref())
                    .map_err(|e| FetchError::Malformed(e.to_string()))?;
                if snapshot.role().id != role || snapshot.level().rank != rank {
                    return Err(FetchError::Malformed(format!(
                        "payload for {}/{} describes {}/{}",
                        role,
                        rank,
                        snapshot.role().id,
                        snapshot.level().rank
                    )));
                }
                Ok(snapshot)
            })
        }
    }

    fn progress_fetcher(
        &self,
        user: UserId,
    ) -> impl Fn() -> std::pin::Pin<
        Box<
            dyn std::future::Future<
                    Output = std::result::Result<Arc<Vec<ProgressRecord>>, FetchError>,
                > + Send,
        >,
    > + Send
           + 'static {
        let store = Arc::clone(&self.store);
        move || {
            let store = Arc::clone(&store);
            let user = user.clone();
            Box::pin(async move {
                let entries = store.fetch_progress(&user).await?;
                let records = entries
                    .into_iter()
                    .map(|e| ProgressRecord {
                        user_id: user.clone(),
                        topic_id: TopicId::new(e.topic_id),
                        completed_at: e.completed_at,
                    })
                    .collect();
                Ok(Arc::new(records))
            })
        }
    }

    /// Seed a user's progress from the remote source once per session;
    /// concurrent first views coalesce onto one fetch
    async fn ensure_progress(&self, user: &UserId) -> Result<()> {
        if self
            .hydrated
            .lock()
            .expect("hydration set poisoned")
            .contains(user)
        {
            return Ok(());
        }

        let key = CacheKey::Progress { user: user.clone() };
        let fetcher = self.progress_fetcher(user.clone());
        let entry = self.progress_fetches.fetch(key, fetcher).await?;
        self.progress.hydrate(user, entry.data.as_ref().clone());
        self.hydrated
            .lock()
            .expect("hydration set poisoned")
            .insert(user.clone());
        Ok(())
    }

    fn snapshot_containing(&self, topic_id: &TopicId) -> Option<Arc<ContentSnapshot>> {
        self.roadmaps
            .cached_values()
            .into_iter()
            .find(|s| s.contains_topic(topic_id))
    }

    fn compose_view(&self, user: &UserId, snapshot: &ContentSnapshot) -> RoadmapView {
        let topics = snapshot.topics_in_order();
        let locks = resolve_locks(&topics, |id| {
            self.progress.get_record(user, id).is_completed()
        });
        let progress = self.progress.level_progress(user, &topics);

        let mut views = Vec::with_capacity(topics.len());
        let mut minutes_total = 0u32;
        let mut minutes_remaining = 0u32;
        for topic in &topics {
            let completed = self.progress.get_record(user, &topic.id).is_completed();
            minutes_total += topic.estimated_minutes;
            if !completed {
                minutes_remaining += topic.estimated_minutes;
            }
            views.push(TopicView {
                topic: Arc::clone(topic),
                locked: locks[&topic.id],
                completed,
            });
        }

        RoadmapView {
            role: Arc::clone(snapshot.role()),
            level: Arc::clone(snapshot.level()),
            topics: views,
            completion_pct: progress.completion_pct,
            completed_count: progress.completed_count,
            total_count: progress.total_count,
            estimated_minutes_total: minutes_total,
            estimated_minutes_remaining: minutes_remaining,
        }
    }
}
