// Ported from "certificate-transparency-go" (https://github.com/google/certificate-transparency-go)
// Copyright 2016 Google LLC. All Rights Reserved.
// Licensed under Apache-2.0 License found in the LICENSE file or at https://www.apache.org/licenses/LICENSE-2.0
//
// This ports code from the original Go project "certificate-transparency-go" and adapts it to Rust idioms.
//
// Modifications and Rust implementation Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! One handler per RFC 6962 endpoint, plus the harness that maps errors to
//! `(status, message)` responses. Wrong-method requests are rejected with
//! 405 by the method router before any body is touched.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use log_rpc::{
    GetConsistencyProofRequest, GetEntryAndProofRequest, GetInclusionProofByHashRequest,
    GetLatestSignedLogRootRequest, GetLeavesByIndexRequest, LogLeaf, Node, QueueLeavesRequest,
    Status,
};
use rfc6962_api::{
    AddChainRequest, AddChainResponse, GetEntriesResponse, GetEntryAndProofResponse,
    GetProofByHashResponse, GetRootsResponse, GetSthConsistencyResponse, GetSthResponse,
    LeafEntry,
};

use crate::backend::BackendError;
use crate::instance::LogInstance;
use crate::keys::KeyError;
use crate::sign::{self, SthError};

/// Largest number of entries a single get-entries request may ask for.
/// RFC 6962 permits the server to truncate; ranges beyond this cap are
/// rejected outright before any backend RPC.
pub const MAX_GET_ENTRIES: i64 = 1000;

/// An error surfaced to the client as `(status, message)`. The message is
/// written verbatim as the response body; no internal stack detail ever
/// reaches it.
#[derive(Debug)]
pub struct HandlerError {
    status: StatusCode,
    message: String,
}

impl HandlerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, message = %self.message, "request failed");
        } else {
            debug!(status = %self.status, message = %self.message, "bad request");
        }
        (self.status, self.message).into_response()
    }
}

impl From<BackendError> for HandlerError {
    fn from(err: BackendError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<KeyError> for HandlerError {
    fn from(err: KeyError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<SthError> for HandlerError {
    fn from(err: SthError) -> Self {
        Self::internal(err.to_string())
    }
}

/// Builds the router for one log instance, nested under the instance prefix.
pub fn router(instance: Arc<LogInstance>) -> Router {
    let routes = Router::new()
        .route("/add-chain", post(add_chain))
        .route("/add-pre-chain", post(add_pre_chain))
        .route("/get-sth", get(get_sth))
        .route("/get-sth-consistency", get(get_sth_consistency))
        .route("/get-proof-by-hash", get(get_proof_by_hash))
        .route("/get-entries", get(get_entries))
        .route("/get-roots", get(get_roots))
        .route("/get-entry-and-proof", get(get_entry_and_proof))
        .with_state(instance.clone());
    Router::new().nest(&format!("/{}/ct/v1", instance.prefix), routes)
}

async fn add_chain(
    State(instance): State<Arc<LogInstance>>,
    body: Bytes,
) -> Result<Json<AddChainResponse>, HandlerError> {
    add_chain_internal(&instance, &body, false).await
}

async fn add_pre_chain(
    State(instance): State<Arc<LogInstance>>,
    body: Bytes,
) -> Result<Json<AddChainResponse>, HandlerError> {
    add_chain_internal(&instance, &body, true).await
}

async fn add_chain_internal(
    instance: &LogInstance,
    body: &[u8],
    expect_precert: bool,
) -> Result<Json<AddChainResponse>, HandlerError> {
    let request: AddChainRequest = serde_json::from_slice(body)
        .map_err(|e| HandlerError::bad_request(format!("failed to parse add-chain body: {e}")))?;

    let entry = rfc6962_api::validate_chain(&request.chain, &instance.roots, expect_precert)
        .map_err(|e| HandlerError::bad_request(format!("bad certificate chain: {e}")))?;

    // The SCT timestamp is assigned here, at leaf construction, not by the
    // backend. Idempotency across duplicate submissions is the backend's
    // concern.
    let timestamp = instance
        .now_millis()
        .ok_or_else(|| HandlerError::internal("time source reads before the Unix epoch"))?;
    let leaf = sign::merkle_tree_leaf(&entry, timestamp);
    let sct = sign::signed_certificate_timestamp(instance.key_manager.as_ref(), &leaf)?;

    let ctx = instance.request_context();
    let rsp = instance
        .backend
        .queue_leaves(
            &ctx,
            QueueLeavesRequest {
                log_id: instance.log_id,
                leaves: vec![sign::log_leaf(&leaf, &entry)],
            },
        )
        .await?;
    require_ok("QueueLeaves", rsp.status.as_ref())?;

    Ok(Json(sct))
}

async fn get_sth(
    State(instance): State<Arc<LogInstance>>,
) -> Result<Json<GetSthResponse>, HandlerError> {
    let ctx = instance.request_context();
    let rsp = instance
        .backend
        .get_latest_signed_log_root(
            &ctx,
            GetLatestSignedLogRootRequest {
                log_id: instance.log_id,
            },
        )
        .await
        .map_err(|e| HandlerError::internal(format!("request failed: {e}")))?;
    require_ok("GetLatestSignedLogRoot", rsp.status.as_ref())?;
    let root = rsp
        .signed_log_root
        .ok_or_else(|| HandlerError::internal("backend response missing signed log root"))?;

    let sth = sign::signed_tree_head(instance.key_manager.as_ref(), &root)?;
    Ok(Json(sth))
}

async fn get_sth_consistency(
    State(instance): State<Arc<LogInstance>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetSthConsistencyResponse>, HandlerError> {
    let first = int_param(&params, "first")?;
    let second = int_param(&params, "second")?;
    if first < 0 || second < 0 {
        return Err(HandlerError::bad_request(format!(
            "first ({first}) and second ({second}) must be non-negative"
        )));
    }
    if first >= second {
        return Err(HandlerError::bad_request(format!(
            "invalid tree size range {first}..{second}"
        )));
    }

    let ctx = instance.request_context();
    let rsp = instance
        .backend
        .get_consistency_proof(
            &ctx,
            GetConsistencyProofRequest {
                log_id: instance.log_id,
                first_tree_size: first,
                second_tree_size: second,
            },
        )
        .await?;
    require_ok("GetConsistencyProof", rsp.status.as_ref())?;
    let proof = rsp
        .proof
        .ok_or_else(|| HandlerError::internal("backend response missing proof"))?;

    Ok(Json(GetSthConsistencyResponse {
        consistency: audit_path(proof.nodes)?,
    }))
}

async fn get_proof_by_hash(
    State(instance): State<Arc<LogInstance>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetProofByHashResponse>, HandlerError> {
    let hash = params
        .get("hash")
        .filter(|h| !h.is_empty())
        .ok_or_else(|| HandlerError::bad_request("missing hash parameter"))?;
    let leaf_hash = BASE64_STANDARD
        .decode(hash)
        .or_else(|_| BASE64_URL_SAFE.decode(hash))
        .map_err(|e| HandlerError::bad_request(format!("invalid base64 hash: {e}")))?;
    if leaf_hash.is_empty() {
        return Err(HandlerError::bad_request("empty hash"));
    }
    let tree_size = int_param(&params, "tree_size")?;
    if tree_size < 1 {
        return Err(HandlerError::bad_request(format!(
            "tree_size ({tree_size}) must be positive"
        )));
    }

    let ctx = instance.request_context();
    let rsp = instance
        .backend
        .get_inclusion_proof_by_hash(
            &ctx,
            GetInclusionProofByHashRequest {
                log_id: instance.log_id,
                leaf_hash,
                tree_size,
                order_by_sequence: false,
            },
        )
        .await?;
    require_ok("GetInclusionProofByHash", rsp.status.as_ref())?;

    // A leaf hash can match multiple entries; serve the first proof only.
    let proof = rsp
        .proofs
        .into_iter()
        .next()
        .ok_or_else(|| HandlerError::internal("backend returned no proof"))?;

    Ok(Json(GetProofByHashResponse {
        leaf_index: proof.leaf_index,
        audit_path: audit_path(proof.nodes)?,
    }))
}

async fn get_entries(
    State(instance): State<Arc<LogInstance>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetEntriesResponse>, HandlerError> {
    let start = int_param(&params, "start")?;
    let end = int_param(&params, "end")?;
    validate_entries_range(start, end)?;

    let ctx = instance.request_context();
    let rsp = instance
        .backend
        .get_leaves_by_index(
            &ctx,
            GetLeavesByIndexRequest {
                log_id: instance.log_id,
                leaf_index: (start..=end).collect(),
            },
        )
        .await?;
    require_ok("GetLeavesByIndex", rsp.status.as_ref())?;

    let mut leaves = rsp.leaves;
    sort_leaf_range(&mut leaves, start, end)?;

    // Leaf bytes are passed through unmodified, even when they do not parse
    // as a MerkleTreeLeaf; auditors want to see exactly what the log stored.
    let entries = leaves
        .into_iter()
        .map(|leaf| LeafEntry {
            leaf_input: leaf.leaf_value,
            extra_data: leaf.extra_data,
        })
        .collect();
    Ok(Json(GetEntriesResponse { entries }))
}

async fn get_roots(State(instance): State<Arc<LogInstance>>) -> Json<GetRootsResponse> {
    Json(GetRootsResponse {
        certificates: instance.roots.raw_certificates().to_vec(),
    })
}

async fn get_entry_and_proof(
    State(instance): State<Arc<LogInstance>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetEntryAndProofResponse>, HandlerError> {
    let leaf_index = int_param(&params, "leaf_index")?;
    let tree_size = int_param(&params, "tree_size")?;
    if leaf_index < 0 {
        return Err(HandlerError::bad_request(format!(
            "leaf_index ({leaf_index}) must be non-negative"
        )));
    }
    if tree_size < 1 {
        return Err(HandlerError::bad_request(format!(
            "tree_size ({tree_size}) must be positive"
        )));
    }
    if leaf_index >= tree_size {
        return Err(HandlerError::bad_request(format!(
            "leaf_index ({leaf_index}) out of range for tree_size ({tree_size})"
        )));
    }

    let ctx = instance.request_context();
    let rsp = instance
        .backend
        .get_entry_and_proof(
            &ctx,
            GetEntryAndProofRequest {
                log_id: instance.log_id,
                leaf_index,
                tree_size,
            },
        )
        .await?;
    require_ok("GetEntryAndProof", rsp.status.as_ref())?;
    let proof = rsp
        .proof
        .ok_or_else(|| HandlerError::internal("backend response missing proof"))?;
    let leaf = rsp
        .leaf
        .ok_or_else(|| HandlerError::internal("backend response missing leaf"))?;

    Ok(Json(GetEntryAndProofResponse {
        leaf_input: leaf.leaf_value,
        extra_data: leaf.extra_data,
        audit_path: audit_path(proof.nodes)?,
    }))
}

/// Translates a backend status into a front-end error, preserving the
/// backend-reported message.
fn require_ok(operation: &str, status: Option<&Status>) -> Result<(), HandlerError> {
    match status {
        Some(status) if status.is_ok() => Ok(()),
        Some(status) => Err(HandlerError::internal(format!(
            "{operation} failed: backend status {}: {}",
            status.status_code().as_str_name(),
            status.description
        ))),
        None => Err(HandlerError::internal(format!(
            "{operation} failed: backend response missing status"
        ))),
    }
}

/// Parses a required decimal query parameter.
fn int_param(params: &HashMap<String, String>, name: &str) -> Result<i64, HandlerError> {
    let raw = params
        .get(name)
        .ok_or_else(|| HandlerError::bad_request(format!("missing {name} parameter")))?;
    raw.parse::<i64>()
        .map_err(|e| HandlerError::bad_request(format!("invalid {name} parameter: {e}")))
}

fn validate_entries_range(start: i64, end: i64) -> Result<(), HandlerError> {
    if start < 0 || end < 0 {
        return Err(HandlerError::bad_request(format!(
            "start ({start}) and end ({end}) must be non-negative"
        )));
    }
    if start > end {
        return Err(HandlerError::bad_request(format!(
            "invalid range {start}..{end}"
        )));
    }
    if end - start >= MAX_GET_ENTRIES {
        return Err(HandlerError::bad_request(format!(
            "requested range {start}..{end} exceeds limit of {MAX_GET_ENTRIES} entries"
        )));
    }
    Ok(())
}

/// Checks that the backend returned the requested contiguous range, modulo
/// truncation: after sorting, the leaf indices must run `start, start+1, …`
/// with no duplicates or gaps. Fewer leaves than requested is fine.
fn sort_leaf_range(leaves: &mut [LogLeaf], start: i64, end: i64) -> Result<(), HandlerError> {
    if leaves.len() as i64 > end - start + 1 {
        return Err(HandlerError::internal(format!(
            "too many leaves: {} for range {start}..{end}",
            leaves.len()
        )));
    }
    leaves.sort_by_key(|leaf| leaf.leaf_index);
    for (i, leaf) in leaves.iter().enumerate() {
        let want = start + i as i64;
        if leaf.leaf_index != want {
            return Err(HandlerError::internal(format!(
                "unexpected leaf index {} (want {want})",
                leaf.leaf_index
            )));
        }
    }
    Ok(())
}

/// Extracts the ordered node hashes from a proof, rejecting any empty node.
fn audit_path(nodes: Vec<Node>) -> Result<Vec<Vec<u8>>, HandlerError> {
    nodes
        .into_iter()
        .map(|node| {
            if node.node_hash.is_empty() {
                Err(HandlerError::internal("invalid proof: empty node hash"))
            } else {
                Ok(node.node_hash)
            }
        })
        .collect()
}
