// Ported from "certificate-transparency-go" (https://github.com/google/certificate-transparency-go)
// Copyright 2016 Google LLC. All Rights Reserved.
// Licensed under Apache-2.0 License found in the LICENSE file or at https://www.apache.org/licenses/LICENSE-2.0
//
// This ports code from the original Go project "certificate-transparency-go" and adapts it to Rust idioms.
//
// Modifications and Rust implementation Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Parsing and validation of submitted certificate chains per
//! [RFC 6962](https://datatracker.ietf.org/doc/html/rfc6962), and the JSON
//! bodies of the client-facing API (RFC 6962 s4).

use crate::{Rfc6962Error, UnixTimestamp};
use der::{
    asn1::{Null, OctetString},
    oid::{
        db::rfc5280::ID_CE_AUTHORITY_KEY_IDENTIFIER, db::rfc6962::CT_PRECERT_POISON,
        db::rfc6962::CT_PRECERT_SIGNING_CERT, AssociatedOid, ObjectIdentifier,
    },
};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use sha2::{Digest, Sha256};
use x509_cert::{
    der::Encode,
    ext::{
        pkix::{AuthorityKeyIdentifier, ExtendedKeyUsage},
        Extension,
    },
    impl_newtype, Certificate, TbsCertificate,
};
use x509_util::CertPool;

/// Add-(pre-)chain request (RFC 6962 s4.1, s4.2).
#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct AddChainRequest {
    #[serde_as(as = "Vec<Base64>")]
    pub chain: Vec<Vec<u8>>,
}

/// Add-(pre-)chain response: the Signed Certificate Timestamp.
#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct AddChainResponse {
    pub sct_version: u8,
    #[serde_as(as = "Base64")]
    pub id: Vec<u8>,
    pub timestamp: UnixTimestamp,
    #[serde_as(as = "Base64")]
    pub extensions: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub signature: Vec<u8>,
}

/// Get-sth response (RFC 6962 s4.3).
#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct GetSthResponse {
    pub tree_size: u64,
    pub timestamp: UnixTimestamp,
    #[serde_as(as = "Base64")]
    pub sha256_root_hash: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub tree_head_signature: Vec<u8>,
}

/// Get-sth-consistency response (RFC 6962 s4.4).
#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct GetSthConsistencyResponse {
    #[serde_as(as = "Vec<Base64>")]
    pub consistency: Vec<Vec<u8>>,
}

/// Get-proof-by-hash response (RFC 6962 s4.5).
#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct GetProofByHashResponse {
    pub leaf_index: i64,
    #[serde_as(as = "Vec<Base64>")]
    pub audit_path: Vec<Vec<u8>>,
}

/// One element of a get-entries response (RFC 6962 s4.6). The leaf bytes are
/// passed through from the backend unmodified, whether or not they parse as a
/// `MerkleTreeLeaf`.
#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct LeafEntry {
    #[serde_as(as = "Base64")]
    pub leaf_input: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub extra_data: Vec<u8>,
}

/// Get-entries response (RFC 6962 s4.6).
#[derive(Serialize, Deserialize)]
pub struct GetEntriesResponse {
    pub entries: Vec<LeafEntry>,
}

/// Get-roots response (RFC 6962 s4.7).
#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct GetRootsResponse {
    #[serde_as(as = "Vec<Base64>")]
    pub certificates: Vec<Vec<u8>>,
}

/// Get-entry-and-proof response (RFC 6962 s4.8).
#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct GetEntryAndProofResponse {
    #[serde_as(as = "Base64")]
    pub leaf_input: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub extra_data: Vec<u8>,
    #[serde_as(as = "Vec<Base64>")]
    pub audit_path: Vec<Vec<u8>>,
}

/// The precertificate-specific parts of a pending log entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecertData {
    /// SHA-256 over the `SubjectPublicKeyInfo` of the real issuing CA.
    pub issuer_key_hash: [u8; 32],
    /// The submitted precertificate, DER-encoded.
    pub pre_certificate: Vec<u8>,
}

/// A validated submission, ready to be turned into a `MerkleTreeLeaf` and
/// queued at the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingLogEntry {
    /// The leaf certificate DER for X.509 entries, or the reconstructed
    /// `TBSCertificate` for precertificate entries.
    pub certificate: Vec<u8>,
    /// Present iff this is a precertificate entry.
    pub precert: Option<PrecertData>,
    /// DER of the issuer chain: everything after the leaf, including the
    /// accepted root when one had to be appended.
    pub chain: Vec<Vec<u8>>,
}

impl PendingLogEntry {
    pub fn is_precert(&self) -> bool {
        self.precert.is_some()
    }
}

/// Validates a certificate chain according to RFC 6962 for one of the two
/// submission endpoints and returns a [`PendingLogEntry`].
///
/// The leaf is classified as a precertificate iff it carries the critical CT
/// poison extension; a classification that disagrees with
/// `expect_precert` is rejected. For precertificates, the entry's
/// `issuer_key_hash` and logged `TBSCertificate` account for an optional
/// Precertificate Signing Certificate as the direct issuer.
///
/// # Errors
///
/// Returns an `Rfc6962Error` if the chain fails to validate or does not match
/// the endpoint.
pub fn validate_chain(
    raw_chain: &[Vec<u8>],
    roots: &CertPool,
    expect_precert: bool,
) -> Result<PendingLogEntry, Rfc6962Error> {
    let chain = x509_util::validate_chain(raw_chain, roots)?;
    let certs = chain.certs();
    let leaf = &certs[0];

    // Reject mismatched signature algorithms on the submitted certificates:
    // https://github.com/google/certificate-transparency-go/pull/702.
    for cert in &certs[..raw_chain.len()] {
        if cert.signature_algorithm != cert.tbs_certificate.signature {
            return Err(Rfc6962Error::MismatchingSigAlg);
        }
    }

    let is_leaf_precert = is_precert(leaf)?;
    if is_leaf_precert != expect_precert {
        return Err(Rfc6962Error::EndpointMismatch {
            is_precert: is_leaf_precert,
        });
    }

    let certificate: Vec<u8>;
    let precert: Option<PrecertData>;
    if is_leaf_precert {
        let issuer = certs.get(1).ok_or(Rfc6962Error::MissingPrecertIssuer)?;
        let (issuer_key_hash, pre_issuer) = if is_pre_issuer(issuer)? {
            // The direct issuer is a Precertificate Signing Certificate; the
            // key hash must name the CA one step further up the chain.
            let real_issuer = certs
                .get(2)
                .ok_or(Rfc6962Error::MissingPrecertSigningCertificateIssuer)?;
            (spki_hash(real_issuer)?, Some(&issuer.tbs_certificate))
        } else {
            (spki_hash(issuer)?, None)
        };
        certificate = build_precert_tbs(&leaf.tbs_certificate, pre_issuer)?;
        precert = Some(PrecertData {
            issuer_key_hash,
            pre_certificate: chain.raw()[0].clone(),
        });
    } else {
        certificate = chain.raw()[0].clone();
        precert = None;
    }

    Ok(PendingLogEntry {
        certificate,
        precert,
        chain: chain.raw()[1..].to_vec(),
    })
}

fn spki_hash(cert: &Certificate) -> Result<[u8; 32], Rfc6962Error> {
    Ok(Sha256::digest(cert.tbs_certificate.subject_public_key_info.to_der()?).into())
}

/// Precertificate poison extension that can be decoded with
/// [`TbsCertificate::get`].
#[derive(Debug)]
struct CTPrecertPoison(Null);

impl AssociatedOid for CTPrecertPoison {
    const OID: ObjectIdentifier = CT_PRECERT_POISON;
}
impl_newtype!(CTPrecertPoison, Null);

/// Returns whether the certificate carries the CT poison extension. The
/// extension must be critical and its value a DER NULL.
pub fn is_precert(cert: &Certificate) -> Result<bool, Rfc6962Error> {
    match cert.tbs_certificate.get::<CTPrecertPoison>() {
        Ok(Some((true, _))) => Ok(true),
        Ok(Some((false, _))) => Err(Rfc6962Error::InvalidCTPoison),
        Ok(None) => Ok(false),
        Err(_) => Err(Rfc6962Error::InvalidCTPoison),
    }
}

/// Returns whether the certificate is a Precertificate Signing Certificate,
/// indicated by the `CertificateTransparency` extended key usage.
fn is_pre_issuer(cert: &Certificate) -> Result<bool, Rfc6962Error> {
    match cert.tbs_certificate.get::<ExtendedKeyUsage>()? {
        Some((_, eku)) => Ok(eku.0.iter().any(|usage| *usage == CT_PRECERT_SIGNING_CERT)),
        None => Ok(false),
    }
}

/// Builds the `TBSCertificate` to be logged for a precertificate (RFC 6962
/// s3.1) from the given `TBSCertificate`, returning it DER-encoded.
///
/// This removes the CT poison extension (there must be exactly one),
/// preserving the order of other extensions.
///
/// If `issuer_opt` is provided, it is the TBS of the Precertificate Signing
/// Certificate that signed the precert, and the issuance information is
/// rewritten to name the next issuer in the chain: the precert's `Issuer`
/// becomes the intermediate's `Issuer`, and its `AuthorityKeyIdentifier`
/// becomes the intermediate's.
pub fn build_precert_tbs(
    tbs: &TbsCertificate,
    issuer_opt: Option<&TbsCertificate>,
) -> Result<Vec<u8>, Rfc6962Error> {
    let mut tbs = tbs.clone();

    let exts = tbs
        .extensions
        .as_mut()
        .ok_or(Rfc6962Error::InvalidCTPoison)?;

    let poison_idx = exts
        .iter()
        .position(|ext| ext.extn_id == CT_PRECERT_POISON)
        .ok_or(Rfc6962Error::InvalidCTPoison)?;
    exts.remove(poison_idx);

    if let Some(issuer) = issuer_opt {
        tbs.issuer = issuer.issuer.clone();

        let issuer_auth_key_id = match issuer.get::<AuthorityKeyIdentifier>()? {
            Some((_, aki)) => Some(OctetString::new(aki.to_der()?)?),
            None => None,
        };

        let aki_idx = exts
            .iter()
            .position(|ext| ext.extn_id == ID_CE_AUTHORITY_KEY_IDENTIFIER);

        match (aki_idx, issuer_auth_key_id) {
            // Replace the precert's auth-key-id with the pre-issuer's.
            (Some(idx), Some(key_id)) => exts[idx].extn_value = key_id,
            // The pre-issuer has no auth-key-id, drop the precert's.
            (Some(idx), None) => {
                exts.remove(idx);
            }
            // The precert had none but the pre-issuer does, add it at the end.
            (None, Some(key_id)) => exts.push(Extension {
                extn_id: ID_CE_AUTHORITY_KEY_IDENTIFIER,
                critical: false,
                extn_value: key_id,
            }),
            (None, None) => {}
        }
    }

    Ok(tbs.to_der()?)
}
