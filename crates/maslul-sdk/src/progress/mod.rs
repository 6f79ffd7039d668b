//! Per-user completion state with optimistic mutation semantics
//!
//! The store is the sole mutator of [`ProgressRecord`]s. Mutations are
//! two-phase: the change is applied to the in-memory state immediately
//! and a [`MutationGuard`] capturing the prior state is handed to the
//! caller, who must either `commit` it once persistence succeeds or
//! `revert` it to restore the exact prior values. Exactly one mutation
//! may be pending per (user, topic) at a time; a second attempt is
//! rejected rather than queued.

use crate::error::{Result, SdkError};
use crate::model::{ProgressRecord, Topic, TopicId, UserId};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

/// Aggregate completion metrics for one level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelProgress {
    /// Completed topics as a percentage, rounded to the nearest integer;
    /// zero topics reports 0, never a division by zero
    pub completion_pct: u8,
    pub completed_count: usize,
    pub total_count: usize,
}

/// Outcome of an optimistic mutation attempt
#[derive(Debug)]
pub enum MutationOutcome {
    /// The store already held the requested state; nothing to persist
    Unchanged(ProgressRecord),
    /// The change was applied optimistically; the guard must be committed
    /// or reverted
    Applied(MutationGuard),
}

/// Receipt for one pending optimistic change.
///
/// Consumed exactly once by [`ProgressStore::commit`] or
/// [`ProgressStore::revert`]; revert restores the state captured when the
/// mutation began, which is only the immediately preceding change — there
/// is no stacked undo.
#[derive(Debug)]
pub struct MutationGuard {
    key: (UserId, TopicId),
    /// The optimistically applied record
    pub record: ProgressRecord,
}

impl MutationGuard {
    pub fn user_id(&self) -> &UserId {
        &self.key.0
    }

    pub fn topic_id(&self) -> &TopicId {
        &self.key.1
    }
}

#[derive(Default)]
struct ProgressState {
    records: HashMap<(UserId, TopicId), ProgressRecord>,
    /// Prior state per pending mutation; `None` means no record existed
    pending: HashMap<(UserId, TopicId), Option<ProgressRecord>>,
}

/// In-memory per-user completion store
#[derive(Default)]
pub struct ProgressStore {
    state: Mutex<ProgressState>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record for a (user, topic) pair; absence yields the
    /// implicit "not started" default. Never fails.
    pub fn get_record(&self, user_id: &UserId, topic_id: &TopicId) -> ProgressRecord {
        let state = self.state.lock().expect("progress state poisoned");
        state
            .records
            .get(&(user_id.clone(), topic_id.clone()))
            .cloned()
            .unwrap_or_else(|| ProgressRecord::not_started(user_id.clone(), topic_id.clone()))
    }

    /// All records held for a user
    pub fn records_for_user(&self, user_id: &UserId) -> Vec<ProgressRecord> {
        let state = self.state.lock().expect("progress state poisoned");
        state
            .records
            .values()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Seed the store from a fetched progress payload.
    ///
    /// Does not count as a mutation: keys with a pending optimistic
    /// change keep their optimistic value rather than being overwritten
    /// by a possibly older remote snapshot.
    pub fn hydrate(&self, user_id: &UserId, records: Vec<ProgressRecord>) {
        let mut state = self.state.lock().expect("progress state poisoned");
        for record in records {
            let key = (user_id.clone(), record.topic_id.clone());
            if state.pending.contains_key(&key) {
                continue;
            }
            state.records.insert(key, record);
        }
    }

    /// Optimistically mark a topic complete.
    ///
    /// Idempotent: an already-completed topic returns
    /// [`MutationOutcome::Unchanged`] with the existing record, leaving
    /// `completed_at` untouched. Rejects with
    /// [`SdkError::MutationInProgress`] while another change for the same
    /// record is in flight.
    pub fn mark_complete(&self, user_id: &UserId, topic_id: &TopicId) -> Result<MutationOutcome> {
        let mut state = self.state.lock().expect("progress state poisoned");
        let key = (user_id.clone(), topic_id.clone());

        if state.pending.contains_key(&key) {
            return Err(SdkError::MutationInProgress {
                topic_id: topic_id.clone(),
            });
        }

        let prior = state.records.get(&key).cloned();
        if let Some(record) = &prior {
            if record.is_completed() {
                return Ok(MutationOutcome::Unchanged(record.clone()));
            }
        }

        let record = ProgressRecord {
            user_id: user_id.clone(),
            topic_id: topic_id.clone(),
            completed_at: Some(Utc::now()),
        };
        state.records.insert(key.clone(), record.clone());
        state.pending.insert(key.clone(), prior);

        Ok(MutationOutcome::Applied(MutationGuard { key, record }))
    }

    /// Optimistically mark a topic incomplete.
    ///
    /// Sets `completed_at` to `None` on the existing record; the record
    /// itself is never deleted. Idempotent: an absent or already
    /// incomplete record returns [`MutationOutcome::Unchanged`].
    pub fn mark_incomplete(&self, user_id: &UserId, topic_id: &TopicId) -> Result<MutationOutcome> {
        let mut state = self.state.lock().expect("progress state poisoned");
        let key = (user_id.clone(), topic_id.clone());

        if state.pending.contains_key(&key) {
            return Err(SdkError::MutationInProgress {
                topic_id: topic_id.clone(),
            });
        }

        let prior = state.records.get(&key).cloned();
        match &prior {
            None => {
                return Ok(MutationOutcome::Unchanged(ProgressRecord::not_started(
                    user_id.clone(),
                    topic_id.clone(),
                )))
            }
            Some(record) if !record.is_completed() => {
                return Ok(MutationOutcome::Unchanged(record.clone()))
            }
            Some(_) => {}
        }

        let record = ProgressRecord {
            user_id: user_id.clone(),
            topic_id: topic_id.clone(),
            completed_at: None,
        };
        state.records.insert(key.clone(), record.clone());
        state.pending.insert(key.clone(), prior);

        Ok(MutationOutcome::Applied(MutationGuard { key, record }))
    }

    /// Finalize a persisted mutation, releasing the pending slot
    pub fn commit(&self, guard: MutationGuard) -> ProgressRecord {
        let mut state = self.state.lock().expect("progress state poisoned");
        state.pending.remove(&guard.key);
        guard.record
    }

    /// Roll back the optimistic change, restoring the exact prior state
    pub fn revert(&self, guard: MutationGuard) {
        let mut state = self.state.lock().expect("progress state poisoned");
        match state.pending.remove(&guard.key) {
            Some(Some(prior)) => {
                state.records.insert(guard.key, prior);
            }
            Some(None) => {
                state.records.remove(&guard.key);
            }
            None => {
                tracing::warn!(
                    topic = %guard.key.1,
                    "revert for a mutation that is no longer pending"
                );
            }
        }
    }

    /// Aggregate completion metrics over one level's topics.
    ///
    /// Pure read over current state; no side effects, safe to call
    /// repeatedly.
    pub fn level_progress(&self, user_id: &UserId, topics: &[Arc<Topic>]) -> LevelProgress {
        let total_count = topics.len();
        if total_count == 0 {
            return LevelProgress {
                completion_pct: 0,
                completed_count: 0,
                total_count: 0,
            };
        }

        let state = self.state.lock().expect("progress state poisoned");
        let completed_count = topics
            .iter()
            .filter(|t| {
                state
                    .records
                    .get(&(user_id.clone(), t.id.clone()))
                    .map(|r| r.is_completed())
                    .unwrap_or(false)
            })
            .count();

        let completion_pct =
            ((completed_count as f64 / total_count as f64) * 100.0).round() as u8;
        LevelProgress {
            completion_pct,
            completed_count,
            total_count,
        }
    }
}
