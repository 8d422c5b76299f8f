//! In-memory metadata graph: nodes and edges keyed by `(org_id, id)`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Actor recorded when a payload names none.
const FALLBACK_ACTOR: &str = "system";

// ─── Inputs ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInput {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeInput {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

/// Who is writing and on behalf of which ingestion job.
#[derive(Debug, Clone, Default)]
pub struct MutationContext {
    pub job_id: Option<String>,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
}

// ─── Stored records ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: String,
    pub org_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    pub id: String,
    pub org_id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
    pub job_id: Option<String>,
}

// ─── Results ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkError {
    pub error: String,
    pub code: String,
    pub details: Vec<String>,
}

/// Per-batch outcome: accepted items are written, rejected ones are
/// reported with a reason and skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkAcknowledge {
    pub accepted: usize,
    pub rejected: usize,
    pub errors: Vec<BulkError>,
}

impl BulkAcknowledge {
    fn from_outcomes(outcomes: impl IntoIterator<Item = Result<(), String>>) -> Self {
        let mut accepted = 0;
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(()) => accepted += 1,
                Err(detail) => errors.push(BulkError {
                    error: "UpsertFailed".into(),
                    code: "UPSERT_FAILURE".into(),
                    details: vec![detail],
                }),
            }
        }
        Self {
            accepted,
            rejected: errors.len(),
            errors,
        }
    }
}

// ─── Store ───────────────────────────────────────────────────────

type Key = (String, String);

/// Thread-safe graph store. Upserts overwrite mutable fields and keep the
/// original creation metadata.
#[derive(Default)]
pub struct GraphStore {
    nodes: RwLock<HashMap<Key, NodeRecord>>,
    edges: RwLock<HashMap<Key, EdgeRecord>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_nodes(
        &self,
        org_id: &str,
        items: Vec<NodeInput>,
        ctx: &MutationContext,
    ) -> BulkAcknowledge {
        let now = Utc::now();
        let mut nodes = self.nodes.write();

        let outcomes = items.into_iter().map(|item| -> Result<(), String> {
            let created_by = item
                .created_by
                .unwrap_or_else(|| FALLBACK_ACTOR.to_string());
            let updated_by = item.updated_by.unwrap_or_else(|| created_by.clone());
            let key = (org_id.to_string(), item.id.clone());

            match nodes.get_mut(&key) {
                Some(existing) => {
                    existing.kind = item.kind;
                    existing.properties = item.properties;
                    existing.updated_at = now;
                    existing.updated_by = updated_by;
                    existing.user_agent = ctx.user_agent.clone();
                    existing.client_ip = ctx.client_ip.clone();
                    existing.job_id = ctx.job_id.clone();
                }
                None => {
                    nodes.insert(
                        key,
                        NodeRecord {
                            id: item.id,
                            org_id: org_id.to_string(),
                            kind: item.kind,
                            properties: item.properties,
                            created_at: now,
                            updated_at: now,
                            created_by,
                            updated_by,
                            user_agent: ctx.user_agent.clone(),
                            client_ip: ctx.client_ip.clone(),
                            job_id: ctx.job_id.clone(),
                        },
                    );
                }
            }
            Ok(())
        });

        BulkAcknowledge::from_outcomes(outcomes)
    }

    /// Edges must connect nodes that already exist in the same org;
    /// dangling edges are rejected item by item.
    pub fn upsert_edges(
        &self,
        org_id: &str,
        items: Vec<EdgeInput>,
        ctx: &MutationContext,
    ) -> BulkAcknowledge {
        let now = Utc::now();
        let nodes = self.nodes.read();
        let mut edges = self.edges.write();

        let outcomes = items.into_iter().map(|item| {
            for endpoint in [&item.source_id, &item.target_id] {
                if !nodes.contains_key(&(org_id.to_string(), endpoint.clone())) {
                    return Err(format!(
                        "edge '{}' references unknown node '{endpoint}'",
                        item.id
                    ));
                }
            }

            let created_by = item
                .created_by
                .unwrap_or_else(|| FALLBACK_ACTOR.to_string());
            let updated_by = item.updated_by.unwrap_or_else(|| created_by.clone());
            let key = (org_id.to_string(), item.id.clone());

            match edges.get_mut(&key) {
                Some(existing) => {
                    existing.source_id = item.source_id;
                    existing.target_id = item.target_id;
                    existing.kind = item.kind;
                    existing.properties = item.properties;
                    existing.updated_at = now;
                    existing.updated_by = updated_by;
                    existing.job_id = ctx.job_id.clone();
                }
                None => {
                    edges.insert(
                        key,
                        EdgeRecord {
                            id: item.id,
                            org_id: org_id.to_string(),
                            source_id: item.source_id,
                            target_id: item.target_id,
                            kind: item.kind,
                            properties: item.properties,
                            created_at: now,
                            updated_at: now,
                            created_by,
                            updated_by,
                            job_id: ctx.job_id.clone(),
                        },
                    );
                }
            }
            Ok(())
        });

        BulkAcknowledge::from_outcomes(outcomes)
    }

    pub fn node(&self, org_id: &str, id: &str) -> Option<NodeRecord> {
        self.nodes
            .read()
            .get(&(org_id.to_string(), id.to_string()))
            .cloned()
    }

    pub fn edge(&self, org_id: &str, id: &str) -> Option<EdgeRecord> {
        self.edges
            .read()
            .get(&(org_id.to_string(), id.to_string()))
            .cloned()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.read().len()
    }
}
