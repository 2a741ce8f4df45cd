// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Generated protobuf types and gRPC client for the generic append-only
//! Merkle log backend. The front-end is stateless and consumes the backend
//! exclusively through this contract.

pub mod pb {
    pub mod v1 {
        tonic::include_proto!("merklelog.v1");
    }

    pub use v1::*;
}

pub use pb::v1::merkle_log_client::MerkleLogClient;
pub use pb::v1::*;

impl Status {
    /// Whether the backend reported success.
    pub fn is_ok(&self) -> bool {
        self.status_code() == StatusCode::Ok
    }

    /// Convenience constructor for an OK status.
    pub fn ok() -> Self {
        Self {
            status_code: StatusCode::Ok.into(),
            description: String::new(),
        }
    }

    /// Convenience constructor for an error status.
    pub fn error(description: &str) -> Self {
        Self {
            status_code: StatusCode::Error.into(),
            description: description.to_string(),
        }
    }
}
