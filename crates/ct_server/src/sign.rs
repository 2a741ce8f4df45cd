// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Constructs Merkle tree leaves for validated submissions and owns every
//! input-to-signature binding: the SCT over a new leaf, and the STH over a
//! backend log root.

use log_rpc::{LogLeaf, SignedLogRoot};
use rfc6962_api::{
    certificate_chain, certificate_timestamp_signature_input, digitally_signed,
    precert_chain_entry, tree_head_signature_input, AddChainResponse, GetSthResponse,
    MerkleTreeLeaf, PendingLogEntry, SignedEntry, TimestampedEntry, UnixTimestamp,
};
use sha2::{Digest, Sha256};

use crate::keys::{log_id, KeyError, KeyManager};

/// Builds the `MerkleTreeLeaf` for a validated submission. The timestamp is
/// assigned locally at leaf construction; concurrent submissions of the same
/// chain produce distinct leaves.
pub fn merkle_tree_leaf(entry: &PendingLogEntry, timestamp: UnixTimestamp) -> MerkleTreeLeaf {
    let signed_entry = match &entry.precert {
        Some(precert) => SignedEntry::Precert {
            issuer_key_hash: precert.issuer_key_hash,
            tbs_certificate: entry.certificate.clone(),
        },
        None => SignedEntry::X509(entry.certificate.clone()),
    };
    MerkleTreeLeaf {
        entry: TimestampedEntry {
            timestamp,
            entry: signed_entry,
            extensions: Vec::new(),
        },
    }
}

/// Packages a leaf for `QueueLeaves`: the serialized leaf, a hash over it
/// (of the stored value, not the RFC 6962 leaf hash), and the chain extra
/// data the read path serves back.
pub fn log_leaf(leaf: &MerkleTreeLeaf, entry: &PendingLogEntry) -> LogLeaf {
    let leaf_value = leaf.to_bytes();
    let leaf_value_hash = Sha256::digest(&leaf_value).to_vec();
    let extra_data = match &entry.precert {
        Some(precert) => precert_chain_entry(&precert.pre_certificate, &entry.chain),
        None => certificate_chain(&entry.chain),
    };
    LogLeaf {
        leaf_value_hash,
        leaf_value,
        extra_data,
        leaf_index: 0,
        merkle_leaf_hash: Vec::new(),
    }
}

/// Signs the SCT for a freshly built leaf and assembles the
/// add-(pre-)chain response.
///
/// # Errors
///
/// Returns an error if the key manager fails to sign.
pub fn signed_certificate_timestamp(
    key_manager: &dyn KeyManager,
    leaf: &MerkleTreeLeaf,
) -> Result<AddChainResponse, KeyError> {
    let input = certificate_timestamp_signature_input(&leaf.entry);
    let signature = key_manager.sign(&input)?;
    Ok(AddChainResponse {
        sct_version: 0, // v1 (0)
        id: log_id(key_manager),
        timestamp: leaf.entry.timestamp,
        extensions: Vec::new(),
        signature: digitally_signed(key_manager.algorithm(), &signature),
    })
}

#[derive(thiserror::Error, Debug)]
pub enum SthError {
    #[error("bad tree size: {0}")]
    BadTreeSize(i64),
    #[error("bad hash size: {0}")]
    BadHashSize(usize),
    #[error("bad timestamp: {0}")]
    BadTimestamp(i64),
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Validates a log root received from the backend and signs the tree head.
///
/// The backend reports its timestamp in nanoseconds; RFC 6962 advertises
/// milliseconds, truncating toward zero.
///
/// # Errors
///
/// Returns an error if the root is malformed or the key manager fails to
/// sign.
pub fn signed_tree_head(
    key_manager: &dyn KeyManager,
    root: &SignedLogRoot,
) -> Result<GetSthResponse, SthError> {
    let tree_size =
        u64::try_from(root.tree_size).map_err(|_| SthError::BadTreeSize(root.tree_size))?;
    let root_hash: [u8; 32] = root
        .root_hash
        .as_slice()
        .try_into()
        .map_err(|_| SthError::BadHashSize(root.root_hash.len()))?;
    let timestamp = u64::try_from(root.timestamp_nanos / 1_000_000)
        .map_err(|_| SthError::BadTimestamp(root.timestamp_nanos))?;

    let input = tree_head_signature_input(timestamp, tree_size, &root_hash);
    let signature = key_manager.sign(&input)?;

    Ok(GetSthResponse {
        tree_size,
        timestamp,
        sha256_root_hash: root_hash.to_vec(),
        tree_head_signature: digitally_signed(key_manager.algorithm(), &signature),
    })
}
