use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

use crate::error::AppError;
use crate::services::graph::{BulkAcknowledge, EdgeInput, MutationContext, NodeInput};
use crate::AppState;

const MAX_BATCH: usize = 1000;
const NODE_CODE: &str = "INVALID_NODE_UPSERT";
const EDGE_CODE: &str = "INVALID_EDGE_UPSERT";

// ─── Request types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct UpsertRequest<T> {
    pub job_id: Option<String>,
    #[serde(default)]
    pub items: Vec<T>,
}

// ─── POST /orgs/:org_id/nodes ────────────────────────────────────

pub async fn upsert_nodes(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<BulkAcknowledge>), AppError> {
    let req: UpsertRequest<NodeInput> = parse(&body, NODE_CODE)?;

    let mut details = batch_violations(req.items.len());
    for (i, item) in req.items.iter().enumerate() {
        require(&mut details, i, "id", &item.id);
        require(&mut details, i, "type", &item.kind);
    }
    reject_if_any(details, NODE_CODE)?;

    let ctx = context(&headers, peer, req.job_id);
    let ack = state.graph.upsert_nodes(&org_id, req.items, &ctx);
    debug!(org_id = %org_id, accepted = ack.accepted, rejected = ack.rejected, "Nodes upserted");

    Ok((StatusCode::ACCEPTED, Json(ack)))
}

// ─── POST /orgs/:org_id/edges ────────────────────────────────────

pub async fn upsert_edges(
    State(state): State<Arc<AppState>>,
    Path(org_id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<BulkAcknowledge>), AppError> {
    let req: UpsertRequest<EdgeInput> = parse(&body, EDGE_CODE)?;

    let mut details = batch_violations(req.items.len());
    for (i, item) in req.items.iter().enumerate() {
        require(&mut details, i, "id", &item.id);
        require(&mut details, i, "sourceId", &item.source_id);
        require(&mut details, i, "targetId", &item.target_id);
        require(&mut details, i, "type", &item.kind);
    }
    reject_if_any(details, EDGE_CODE)?;

    let ctx = context(&headers, peer, req.job_id);
    let ack = state.graph.upsert_edges(&org_id, req.items, &ctx);
    debug!(org_id = %org_id, accepted = ack.accepted, rejected = ack.rejected, "Edges upserted");

    Ok((StatusCode::ACCEPTED, Json(ack)))
}

// ─── Helpers ─────────────────────────────────────────────────────

/// An empty body counts as `{}`.
fn parse<T: DeserializeOwned>(body: &[u8], code: &'static str) -> Result<T, AppError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| AppError::Validation {
        code,
        details: vec![e.to_string()],
    })
}

fn batch_violations(len: usize) -> Vec<String> {
    match len {
        0 => vec!["items array required".to_string()],
        n if n > MAX_BATCH => vec![format!("at most {MAX_BATCH} items per request, got {n}")],
        _ => Vec::new(),
    }
}

fn require(details: &mut Vec<String>, index: usize, field: &str, value: &str) {
    if value.trim().is_empty() {
        details.push(format!("items[{index}].{field} must not be empty"));
    }
}

fn reject_if_any(details: Vec<String>, code: &'static str) -> Result<(), AppError> {
    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation { code, details })
    }
}

fn context(
    headers: &HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    job_id: Option<String>,
) -> MutationContext {
    MutationContext {
        job_id,
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        client_ip: peer.map(|ConnectInfo(addr)| addr.ip().to_string()),
    }
}
