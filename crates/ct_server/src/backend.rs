// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! The narrow capability set the front-end consumes from the Merkle log
//! backend, and the gRPC adapter implementing it.
//!
//! Every call carries a [`RequestContext`] whose deadline was derived from
//! the instance's time source; issuing a backend RPC without one is a
//! programming error.

use async_trait::async_trait;
use log_rpc::{
    GetConsistencyProofRequest, GetConsistencyProofResponse, GetEntryAndProofRequest,
    GetEntryAndProofResponse, GetInclusionProofByHashRequest, GetInclusionProofByHashResponse,
    GetLatestSignedLogRootRequest, GetLatestSignedLogRootResponse, GetLeavesByIndexRequest,
    GetLeavesByIndexResponse, MerkleLogClient, QueueLeavesRequest, QueueLeavesResponse,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tonic::transport::Channel;

use crate::util::TimeSource;

/// Per-request context. Created by the handler harness once per HTTP request
/// and threaded through every backend call.
#[derive(Clone, Copy, Debug)]
pub struct RequestContext {
    /// Absolute deadline for all backend work on behalf of this request.
    pub deadline: SystemTime,
}

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error(transparent)]
    Rpc(#[from] tonic::Status),
}

/// The six backend operations the front-end uses. Tests inject a mock
/// implementation; production wraps the gRPC client.
#[async_trait]
pub trait LogBackend: Send + Sync {
    async fn queue_leaves(
        &self,
        ctx: &RequestContext,
        req: QueueLeavesRequest,
    ) -> Result<QueueLeavesResponse, BackendError>;

    async fn get_latest_signed_log_root(
        &self,
        ctx: &RequestContext,
        req: GetLatestSignedLogRootRequest,
    ) -> Result<GetLatestSignedLogRootResponse, BackendError>;

    async fn get_consistency_proof(
        &self,
        ctx: &RequestContext,
        req: GetConsistencyProofRequest,
    ) -> Result<GetConsistencyProofResponse, BackendError>;

    async fn get_inclusion_proof_by_hash(
        &self,
        ctx: &RequestContext,
        req: GetInclusionProofByHashRequest,
    ) -> Result<GetInclusionProofByHashResponse, BackendError>;

    async fn get_leaves_by_index(
        &self,
        ctx: &RequestContext,
        req: GetLeavesByIndexRequest,
    ) -> Result<GetLeavesByIndexResponse, BackendError>;

    async fn get_entry_and_proof(
        &self,
        ctx: &RequestContext,
        req: GetEntryAndProofRequest,
    ) -> Result<GetEntryAndProofResponse, BackendError>;
}

/// gRPC implementation of [`LogBackend`]. The channel is shared and
/// reconnects on transport errors; cloning the client per call is cheap.
pub struct GrpcBackend {
    client: MerkleLogClient<Channel>,
    time_source: Arc<dyn TimeSource>,
}

impl GrpcBackend {
    pub fn new(client: MerkleLogClient<Channel>, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            client,
            time_source,
        }
    }

    /// Wraps a message in a request carrying the remaining time until the
    /// context deadline. An already-expired deadline turns into a zero
    /// timeout so the call fails fast instead of hanging.
    fn request<T>(&self, ctx: &RequestContext, msg: T) -> tonic::Request<T> {
        let timeout = ctx
            .deadline
            .duration_since(self.time_source.now())
            .unwrap_or(Duration::ZERO);
        let mut request = tonic::Request::new(msg);
        request.set_timeout(timeout);
        request
    }
}

#[async_trait]
impl LogBackend for GrpcBackend {
    async fn queue_leaves(
        &self,
        ctx: &RequestContext,
        req: QueueLeavesRequest,
    ) -> Result<QueueLeavesResponse, BackendError> {
        let mut client = self.client.clone();
        Ok(client.queue_leaves(self.request(ctx, req)).await?.into_inner())
    }

    async fn get_latest_signed_log_root(
        &self,
        ctx: &RequestContext,
        req: GetLatestSignedLogRootRequest,
    ) -> Result<GetLatestSignedLogRootResponse, BackendError> {
        let mut client = self.client.clone();
        Ok(client
            .get_latest_signed_log_root(self.request(ctx, req))
            .await?
            .into_inner())
    }

    async fn get_consistency_proof(
        &self,
        ctx: &RequestContext,
        req: GetConsistencyProofRequest,
    ) -> Result<GetConsistencyProofResponse, BackendError> {
        let mut client = self.client.clone();
        Ok(client
            .get_consistency_proof(self.request(ctx, req))
            .await?
            .into_inner())
    }

    async fn get_inclusion_proof_by_hash(
        &self,
        ctx: &RequestContext,
        req: GetInclusionProofByHashRequest,
    ) -> Result<GetInclusionProofByHashResponse, BackendError> {
        let mut client = self.client.clone();
        Ok(client
            .get_inclusion_proof_by_hash(self.request(ctx, req))
            .await?
            .into_inner())
    }

    async fn get_leaves_by_index(
        &self,
        ctx: &RequestContext,
        req: GetLeavesByIndexRequest,
    ) -> Result<GetLeavesByIndexResponse, BackendError> {
        let mut client = self.client.clone();
        Ok(client
            .get_leaves_by_index(self.request(ctx, req))
            .await?
            .into_inner())
    }

    async fn get_entry_and_proof(
        &self,
        ctx: &RequestContext,
        req: GetEntryAndProofRequest,
    ) -> Result<GetEntryAndProofResponse, BackendError> {
        let mut client = self.client.clone();
        Ok(client
            .get_entry_and_proof(self.request(ctx, req))
            .await?
            .into_inner())
    }
}
