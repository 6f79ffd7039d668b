//! Snapshot ingest and validation
//!
//! Parses raw fetched payloads into typed, immutable entities. All
//! structural invariants are loaded here, not assumed: id uniqueness,
//! prerequisite reference resolution, and prerequisite-graph acyclicity
//! via Kahn's algorithm. A payload that violates any of them is rejected
//! whole — no partial snapshot is ever produced.

use crate::error::{Result, SdkError};
use crate::model::{
    Level, LevelId, Rank, Resource, ResourceId, ResourceKind, Role, RoleId, Topic, TopicId,
};
use maslul_storage_client::{ResourceEntry, RoadmapPayload, RoleEntry};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Aggregate counts for one ingested snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotStats {
    pub topic_count: usize,
    pub resource_count: usize,
    pub edge_count: usize,
}

/// Immutable, validated content for one (role, level) pair.
///
/// Entities are individually `Arc`ed for structural sharing, and the
/// snapshot carries a content hash of the raw payload so an identical
/// re-ingest returns the previous snapshot untouched — downstream
/// consumers can rely on pointer equality to skip recomputation.
#[derive(Debug)]
pub struct ContentSnapshot {
    role: Arc<Role>,
    level: Arc<Level>,
    topics: HashMap<TopicId, Arc<Topic>>,
    /// Kahn topological order: every topic appears after its prerequisites
    topic_order: Vec<TopicId>,
    resources: HashMap<ResourceId, Arc<Resource>>,
    resource_index: HashMap<TopicId, Vec<ResourceId>>,
    content_hash: String,
}

impl ContentSnapshot {
    /// Validate a raw payload into an immutable snapshot.
    ///
    /// Fails with [`SdkError::MalformedContent`] on duplicate ids,
    /// unresolvable references, invalid rank or resource kinds, or a
    /// cyclic prerequisite graph (the error names the topics on the
    /// cycle).
    pub fn ingest(payload: RoadmapPayload) -> Result<Arc<Self>> {
        Self::ingest_with_previous(payload, None)
    }

    /// Like [`ingest`](Self::ingest), but returns `previous` unchanged
    /// when the payload hashes identically to it, skipping revalidation.
    pub fn ingest_with_previous(
        payload: RoadmapPayload,
        previous: Option<&Arc<ContentSnapshot>>,
    ) -> Result<Arc<Self>> {
        let content_hash = hash_payload(&payload)?;
        if let Some(prev) = previous {
            if prev.content_hash == content_hash {
                return Ok(Arc::clone(prev));
            }
        }
        Self::build(payload, content_hash)
    }

    fn build(payload: RoadmapPayload, content_hash: String) -> Result<Arc<Self>> {
        let role = Arc::new(Role {
            id: RoleId::new(payload.role.id),
            name: payload.role.name,
            description: payload.role.description,
        });

        let rank = Rank::parse(&payload.level.rank).ok_or_else(|| {
            SdkError::MalformedContent(format!("unknown rank '{}'", payload.level.rank))
        })?;
        let level = Arc::new(Level {
            id: LevelId::new(payload.level.id),
            role_id: RoleId::new(payload.level.role_id),
            rank,
        });
        if level.role_id != role.id {
            return Err(SdkError::MalformedContent(format!(
                "level {} belongs to role {}, payload role is {}",
                level.id, level.role_id, role.id
            )));
        }

        // Topics: unique ids, correct parent, resolvable prerequisites.
        let mut topics = HashMap::with_capacity(payload.topics.len());
        let mut input_order = Vec::with_capacity(payload.topics.len());
        for raw in &payload.topics {
            let id = TopicId::new(raw.id.clone());
            if topics.contains_key(&id) {
                return Err(SdkError::MalformedContent(format!(
                    "duplicate topic id '{}'",
                    id
                )));
            }
            let level_id = LevelId::new(raw.level_id.clone());
            if level_id != level.id {
                return Err(SdkError::MalformedContent(format!(
                    "topic '{}' references level '{}', expected '{}'",
                    id, level_id, level.id
                )));
            }
            let prerequisite_topic_ids: BTreeSet<TopicId> = raw
                .prerequisite_topic_ids
                .iter()
                .map(|p| TopicId::new(p.clone()))
                .collect();
            topics.insert(
                id.clone(),
                Arc::new(Topic {
                    id: id.clone(),
                    level_id,
                    title: raw.title.clone(),
                    estimated_minutes: raw.estimated_minutes,
                    prerequisite_topic_ids,
                }),
            );
            input_order.push(id);
        }

        for topic in topics.values() {
            for prereq in &topic.prerequisite_topic_ids {
                if !topics.contains_key(prereq) {
                    return Err(SdkError::MalformedContent(format!(
                        "topic '{}' requires unknown topic '{}'",
                        topic.id, prereq
                    )));
                }
            }
        }

        let topic_order = topological_order(&topics, &input_order)?;

        // Resources: unique ids, existing parent topic, valid kind pairing.
        let mut resources = HashMap::with_capacity(payload.resources.len());
        let mut resource_index: HashMap<TopicId, Vec<ResourceId>> = HashMap::new();
        for raw in &payload.resources {
            let id = ResourceId::new(raw.id.clone());
            if resources.contains_key(&id) {
                return Err(SdkError::MalformedContent(format!(
                    "duplicate resource id '{}'",
                    id
                )));
            }
            let topic_id = TopicId::new(raw.topic_id.clone());
            if !topics.contains_key(&topic_id) {
                return Err(SdkError::MalformedContent(format!(
                    "resource '{}' attached to unknown topic '{}'",
                    id, topic_id
                )));
            }
            let kind = resource_kind(raw)?;
            resources.insert(
                id.clone(),
                Arc::new(Resource {
                    id: id.clone(),
                    topic_id: topic_id.clone(),
                    kind,
                }),
            );
            resource_index.entry(topic_id).or_default().push(id);
        }

        Ok(Arc::new(Self {
            role,
            level,
            topics,
            topic_order,
            resources,
            resource_index,
            content_hash,
        }))
    }

    pub fn role(&self) -> &Arc<Role> {
        &self.role
    }

    pub fn level(&self) -> &Arc<Level> {
        &self.level
    }

    pub fn topic(&self, id: &TopicId) -> Option<&Arc<Topic>> {
        self.topics.get(id)
    }

    pub fn contains_topic(&self, id: &TopicId) -> bool {
        self.topics.contains_key(id)
    }

    /// Topics in prerequisite-respecting order
    pub fn topics_in_order(&self) -> Vec<Arc<Topic>> {
        self.topic_order
            .iter()
            .map(|id| Arc::clone(&self.topics[id]))
            .collect()
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&Arc<Resource>> {
        self.resources.get(id)
    }

    /// Resources attached to one topic, in payload order
    pub fn resources_for(&self, topic_id: &TopicId) -> Vec<Arc<Resource>> {
        self.resource_index
            .get(topic_id)
            .map(|ids| ids.iter().map(|id| Arc::clone(&self.resources[id])).collect())
            .unwrap_or_default()
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            topic_count: self.topics.len(),
            resource_count: self.resources.len(),
            edge_count: self
                .topics
                .values()
                .map(|t| t.prerequisite_topic_ids.len())
                .sum(),
        }
    }
}

/// Validate a raw roles listing into shared entities; role ids must be
/// unique
pub fn ingest_roles(entries: Vec<RoleEntry>) -> Result<Vec<Arc<Role>>> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut roles = Vec::with_capacity(entries.len());
    for entry in entries {
        let id = RoleId::new(entry.id);
        if !seen.insert(id.clone()) {
            return Err(SdkError::MalformedContent(format!(
                "duplicate role id '{}'",
                id
            )));
        }
        roles.push(Arc::new(Role {
            id,
            name: entry.name,
            description: entry.description,
        }));
    }
    Ok(roles)
}

fn resource_kind(raw: &ResourceEntry) -> Result<ResourceKind> {
    match raw.kind.as_str() {
        "article" | "video" => {
            let url = raw.url.clone().ok_or_else(|| {
                SdkError::MalformedContent(format!(
                    "{} resource '{}' is missing a url",
                    raw.kind, raw.id
                ))
            })?;
            Ok(if raw.kind == "article" {
                ResourceKind::Article { url }
            } else {
                ResourceKind::Video { url }
            })
        }
        "question" => {
            let question_id = raw.question_id.clone().ok_or_else(|| {
                SdkError::MalformedContent(format!(
                    "question resource '{}' is missing a questionId",
                    raw.id
                ))
            })?;
            Ok(ResourceKind::Question { question_id })
        }
        other => Err(SdkError::MalformedContent(format!(
            "unknown resource kind '{}' on resource '{}'",
            other, raw.id
        ))),
    }
}

/// Kahn's algorithm over the prerequisite graph.
///
/// Edges run prerequisite → dependent, so the returned order places every
/// topic after all of its prerequisites. Any node left unprocessed after
/// the zero-in-degree queue drains sits on a cycle; the error names them.
fn topological_order(
    topics: &HashMap<TopicId, Arc<Topic>>,
    input_order: &[TopicId],
) -> Result<Vec<TopicId>> {
    let mut in_degree: HashMap<&TopicId, usize> = HashMap::with_capacity(topics.len());
    let mut dependents: HashMap<&TopicId, Vec<&TopicId>> = HashMap::new();

    for id in input_order {
        let topic = &topics[id];
        in_degree.insert(id, topic.prerequisite_topic_ids.len());
        for prereq in &topic.prerequisite_topic_ids {
            dependents.entry(prereq).or_default().push(id);
        }
    }

    let mut queue: VecDeque<&TopicId> = input_order
        .iter()
        .filter(|id| in_degree[*id] == 0)
        .collect();
    let mut order = Vec::with_capacity(topics.len());

    while let Some(id) = queue.pop_front() {
        order.push(id.clone());
        if let Some(deps) = dependents.get(id) {
            for dep in deps {
                let degree = in_degree.get_mut(*dep).expect("dependent is a known topic");
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*dep);
                }
            }
        }
    }

    if order.len() != topics.len() {
        let mut cyclic: Vec<&str> = input_order
            .iter()
            .filter(|id| in_degree[*id] > 0)
            .map(|id| id.as_str())
            .collect();
        cyclic.sort_unstable();
        return Err(SdkError::MalformedContent(format!(
            "prerequisite cycle involving topics [{}]",
            cyclic.join(", ")
        )));
    }

    Ok(order)
}

fn hash_payload(payload: &RoadmapPayload) -> Result<String> {
    let bytes = serde_json::to_vec(payload)
        .map_err(|e| SdkError::MalformedContent(format!("unencodable payload: {}", e)))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use maslul_storage_client::{LevelEntry, TopicEntry};

    fn payload(topics: Vec<TopicEntry>, resources: Vec<ResourceEntry>) -> RoadmapPayload {
        RoadmapPayload {
            role: RoleEntry {
                id: "backend".into(),
                name: "Backend Engineer".into(),
                description: None,
            },
            level: LevelEntry {
                id: "backend-mid".into(),
                role_id: "backend".into(),
                rank: "mid".into(),
            },
            topics,
            resources,
        }
    }

    fn topic(id: &str, prereqs: &[&str]) -> TopicEntry {
        TopicEntry {
            id: id.into(),
            level_id: "backend-mid".into(),
            title: id.to_uppercase(),
            estimated_minutes: 30,
            prerequisite_topic_ids: prereqs.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_ingest_orders_topics_after_prerequisites() {
        let snapshot = ContentSnapshot::ingest(payload(
            vec![topic("t3", &["t2"]), topic("t1", &[]), topic("t2", &["t1"])],
            vec![],
        ))
        .unwrap();

        let order = snapshot.topics_in_order();
        let pos = |id: &str| order.iter().position(|t| t.id.as_str() == id).unwrap();
        assert!(pos("t1") < pos("t2"));
        assert!(pos("t2") < pos("t3"));
    }

    #[test]
    fn test_ingest_rejects_cycle_naming_topics() {
        let err = ContentSnapshot::ingest(payload(
            vec![topic("a", &["c"]), topic("b", &["a"]), topic("c", &["b"])],
            vec![],
        ))
        .unwrap_err();

        match err {
            SdkError::MalformedContent(msg) => {
                assert!(msg.contains("cycle"), "unexpected message: {}", msg);
                assert!(msg.contains('a') && msg.contains('b') && msg.contains('c'));
            }
            other => panic!("expected MalformedContent, got {:?}", other),
        }
    }

    #[test]
    fn test_ingest_rejects_self_prerequisite() {
        let err =
            ContentSnapshot::ingest(payload(vec![topic("solo", &["solo"])], vec![])).unwrap_err();
        assert!(matches!(err, SdkError::MalformedContent(_)));
    }

    #[test]
    fn test_ingest_rejects_unknown_prerequisite() {
        let err =
            ContentSnapshot::ingest(payload(vec![topic("t1", &["ghost"])], vec![])).unwrap_err();
        match err {
            SdkError::MalformedContent(msg) => assert!(msg.contains("ghost")),
            other => panic!("expected MalformedContent, got {:?}", other),
        }
    }

    #[test]
    fn test_ingest_rejects_duplicate_topic_id() {
        let err = ContentSnapshot::ingest(payload(
            vec![topic("t1", &[]), topic("t1", &[])],
            vec![],
        ))
        .unwrap_err();
        assert!(matches!(err, SdkError::MalformedContent(_)));
    }

    #[test]
    fn test_ingest_rejects_unknown_rank() {
        let mut p = payload(vec![], vec![]);
        p.level.rank = "staff".into();
        let err = ContentSnapshot::ingest(p).unwrap_err();
        assert!(matches!(err, SdkError::MalformedContent(_)));
    }

    #[test]
    fn test_ingest_rejects_question_without_question_id() {
        let err = ContentSnapshot::ingest(payload(
            vec![topic("t1", &[])],
            vec![ResourceEntry {
                id: "r1".into(),
                topic_id: "t1".into(),
                kind: "question".into(),
                url: None,
                question_id: None,
            }],
        ))
        .unwrap_err();
        assert!(matches!(err, SdkError::MalformedContent(_)));
    }

    #[test]
    fn test_identical_reingest_returns_same_snapshot() {
        let p = payload(vec![topic("t1", &[]), topic("t2", &["t1"])], vec![]);
        let first = ContentSnapshot::ingest(p.clone()).unwrap();
        let second = ContentSnapshot::ingest_with_previous(p, Some(&first)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_changed_payload_produces_new_snapshot() {
        let p = payload(vec![topic("t1", &[])], vec![]);
        let first = ContentSnapshot::ingest(p.clone()).unwrap();

        let mut changed = p;
        changed.topics.push(topic("t2", &["t1"]));
        let second = ContentSnapshot::ingest_with_previous(changed, Some(&first)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.stats().topic_count, 2);
    }

    #[test]
    fn test_stats_counts_edges() {
        let snapshot = ContentSnapshot::ingest(payload(
            vec![topic("t1", &[]), topic("t2", &["t1"]), topic("t3", &["t1", "t2"])],
            vec![ResourceEntry {
                id: "r1".into(),
                topic_id: "t1".into(),
                kind: "article".into(),
                url: Some("https://example.com/arrays".into()),
                question_id: None,
            }],
        ))
        .unwrap();

        let stats = snapshot.stats();
        assert_eq!(stats.topic_count, 3);
        assert_eq!(stats.resource_count, 1);
        assert_eq!(stats.edge_count, 3);
        assert_eq!(snapshot.resources_for(&"t1".into()).len(), 1);
    }

    #[test]
    fn test_ingest_roles_rejects_duplicates() {
        let entries = vec![
            RoleEntry {
                id: "backend".into(),
                name: "Backend".into(),
                description: None,
            },
            RoleEntry {
                id: "backend".into(),
                name: "Backend again".into(),
                description: None,
            },
        ];
        assert!(matches!(
            ingest_roles(entries),
            Err(SdkError::MalformedContent(_))
        ));
    }
}
