//! Prerequisite lock resolution
//!
//! A topic is locked while any of its direct prerequisites is incomplete.
//! Only direct edges matter: a topic further downstream is locked because
//! its own prerequisite cannot have been completed while itself locked —
//! the facade rejects completion of locked topics, which is what makes
//! transitive propagation a derived consequence rather than a traversal.

use crate::model::{Topic, TopicId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Compute lock state for every topic in a level.
///
/// `is_completed` is a lookup over current progress state: it answers
/// whether a topic's record exists with a non-null completion time.
///
/// A prerequisite id that does not resolve within `topics` (stale
/// content referencing a since-removed topic) is treated as vacuously
/// satisfied and logged as a content-integrity warning; it never locks
/// its dependents and never fails resolution.
pub fn resolve_locks<F>(topics: &[Arc<Topic>], is_completed: F) -> HashMap<TopicId, bool>
where
    F: Fn(&TopicId) -> bool,
{
    let known: HashSet<&TopicId> = topics.iter().map(|t| &t.id).collect();
    let mut locks = HashMap::with_capacity(topics.len());

    for topic in topics {
        let mut locked = false;
        for prereq in &topic.prerequisite_topic_ids {
            if !known.contains(prereq) {
                tracing::warn!(
                    topic = %topic.id,
                    prerequisite = %prereq,
                    "prerequisite references a topic missing from the level; treating as satisfied"
                );
                continue;
            }
            if !is_completed(prereq) {
                locked = true;
                break;
            }
        }
        locks.insert(topic.id.clone(), locked);
    }

    locks
}

/// Direct prerequisites of `topic` that are currently incomplete, for
/// error reporting on rejected mutations
pub fn missing_prerequisites<F>(topic: &Topic, known: &HashSet<&TopicId>, is_completed: F) -> Vec<TopicId>
where
    F: Fn(&TopicId) -> bool,
{
    topic
        .prerequisite_topic_ids
        .iter()
        .filter(|p| known.contains(*p) && !is_completed(p))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn topic(id: &str, prereqs: &[&str]) -> Arc<Topic> {
        Arc::new(Topic {
            id: id.into(),
            level_id: "backend-mid".into(),
            title: id.to_uppercase(),
            estimated_minutes: 30,
            prerequisite_topic_ids: prereqs.iter().map(|p| TopicId::from(*p)).collect::<BTreeSet<_>>(),
        })
    }

    #[test]
    fn test_no_prerequisites_never_locked() {
        let topics = vec![topic("t1", &[])];
        let locks = resolve_locks(&topics, |_| false);
        assert_eq!(locks[&TopicId::from("t1")], false);
    }

    #[test]
    fn test_locked_iff_direct_prerequisite_incomplete() {
        let topics = vec![topic("t1", &[]), topic("t2", &["t1"])];

        let before = resolve_locks(&topics, |_| false);
        assert_eq!(before[&TopicId::from("t1")], false);
        assert_eq!(before[&TopicId::from("t2")], true);

        let after = resolve_locks(&topics, |id| id.as_str() == "t1");
        assert_eq!(after[&TopicId::from("t2")], false);
    }

    #[test]
    fn test_any_incomplete_prerequisite_locks() {
        let topics = vec![topic("t1", &[]), topic("t2", &[]), topic("t3", &["t1", "t2"])];
        let locks = resolve_locks(&topics, |id| id.as_str() == "t1");
        assert_eq!(locks[&TopicId::from("t3")], true);
    }

    #[test]
    fn test_unknown_prerequisite_is_vacuously_satisfied() {
        // "vanished" was removed from the content model; a dependent on
        // it alone must resolve unlocked.
        let topics = vec![topic("t1", &["vanished"])];
        let locks = resolve_locks(&topics, |_| false);
        assert_eq!(locks[&TopicId::from("t1")], false);
    }

    #[test]
    fn test_missing_prerequisites_reports_incomplete_only() {
        let topics = vec![topic("t1", &[]), topic("t2", &[]), topic("t3", &["t1", "t2", "gone"])];
        let known: HashSet<&TopicId> = topics.iter().map(|t| &t.id).collect();

        let missing = missing_prerequisites(&topics[2], &known, |id| id.as_str() == "t1");
        assert_eq!(missing, vec![TopicId::from("t2")]);
    }
}
