// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Utilities for X.509 operations: a pool of accepted root certificates and
//! validation of submitted certificate chains against it.

use der::{Decode, Encode, Error as DerError};
use sha2::{Digest, Sha256};
use std::collections::{hash_map::Entry, HashMap};
use x509_cert::Certificate;
use x509_verify::VerifyingKey;

/// A `CertPool` is a set of certificates, indexed for issuer lookups.
///
/// The pool preserves insertion order, which callers rely on when enumerating
/// the accepted roots.
#[derive(Default)]
pub struct CertPool {
    // Map from SHA256 fingerprint to index in `certs`.
    by_fingerprint: HashMap<[u8; 32], usize>,
    // Map from subject name to list of indexes of certs with that name.
    by_name: HashMap<String, Vec<usize>>,
    // Certificates in insertion order, with their raw DER alongside.
    certs: Vec<Certificate>,
    raw: Vec<Vec<u8>>,
}

impl CertPool {
    /// Constructs an empty `CertPool`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds certs to the pool from a byte slice assumed to contain PEM
    /// encoded data, skipping over non-certificate blocks. Duplicates (by
    /// raw DER) are silently dropped.
    ///
    /// Returns `false` if any certificate block fails to parse.
    pub fn append_certs_from_pem(&mut self, input: &[u8]) -> bool {
        let Ok(certs) = Certificate::load_pem_chain(input) else {
            return false;
        };
        for cert in certs {
            if self.add_cert(cert).is_err() {
                return false;
            }
        }
        true
    }

    /// Adds a certificate to the pool if it is not already included.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be DER-encoded.
    pub fn add_cert(&mut self, cert: Certificate) -> Result<(), DerError> {
        let der = cert.to_der()?;
        let fingerprint: [u8; 32] = Sha256::digest(&der).into();
        if let Entry::Vacant(e) = self.by_fingerprint.entry(fingerprint) {
            let idx = self.certs.len();
            e.insert(idx);
            self.by_name
                .entry(cert.tbs_certificate.subject.to_string())
                .or_default()
                .push(idx);
            self.certs.push(cert);
            self.raw.push(der);
        }
        Ok(())
    }

    /// Reports whether the pool contains the exact certificate, by full DER
    /// equality.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be DER-encoded.
    pub fn included(&self, cert: &Certificate) -> Result<bool, DerError> {
        let fingerprint: [u8; 32] = Sha256::digest(cert.to_der()?).into();
        Ok(self.by_fingerprint.contains_key(&fingerprint))
    }

    /// Returns the indexes of pool certificates whose subject matches the
    /// issuer of the provided certificate.
    pub fn issuer_candidates(&self, cert: &Certificate) -> &[usize] {
        match self.by_name.get(&cert.tbs_certificate.issuer.to_string()) {
            Some(indexes) => indexes,
            None => &[],
        }
    }

    /// Searches the pool for a certificate that issued `cert`: its subject
    /// matches the issuer of `cert` and its key verifies the signature on
    /// `cert`.
    pub fn find_issuer(&self, cert: &Certificate) -> Option<&Certificate> {
        self.issuer_candidates(cert)
            .iter()
            .map(|&idx| &self.certs[idx])
            .find(|candidate| is_link_valid(cert, candidate))
    }

    /// The certificates in the pool, in insertion order.
    pub fn certs(&self) -> &[Certificate] {
        &self.certs
    }

    /// The raw DER of each certificate in the pool, in insertion order.
    pub fn raw_certificates(&self) -> &[Vec<u8>] {
        &self.raw
    }

    /// Number of certificates in the pool.
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error(transparent)]
    Der(#[from] DerError),
    #[error("empty chain")]
    EmptyChain,
    #[error("invalid link in chain")]
    InvalidLinkInChain,
    #[error("no path to trusted root: {issuer}")]
    NoPathToTrustedRoot { issuer: String },
}

/// A submitted chain that has been parsed and verified, ordered leaf first.
/// If the submission did not terminate at an accepted root, the matching root
/// has been appended.
pub struct ValidatedChain {
    certs: Vec<Certificate>,
    raw: Vec<Vec<u8>>,
}

impl ValidatedChain {
    /// The parsed certificates, leaf first.
    pub fn certs(&self) -> &[Certificate] {
        &self.certs
    }

    /// The raw DER of each certificate, parallel to [`Self::certs`].
    pub fn raw(&self) -> &[Vec<u8>] {
        &self.raw
    }
}

/// Validates a submitted certificate chain against a pool of accepted roots.
///
/// Each certificate must be issued (by name) and signed by the next one in
/// the chain. The final certificate must either be in the pool, or be signed
/// by a pool certificate, in which case that root is appended to the returned
/// chain. [RFC 6962](https://datatracker.ietf.org/doc/html/rfc6962#section-3.1):
/// ```text
/// Logs MUST verify that the submitted end-entity certificate or
/// Precertificate has a valid signature chain leading back to a trusted
/// root CA certificate, using the chain of intermediate CA certificates
/// provided by the submitter.
/// ```
///
/// # Errors
///
/// Returns a `ValidationError` if any certificate fails to parse, any link
/// fails to verify, or the chain does not lead to an accepted root.
pub fn validate_chain(
    raw_chain: &[Vec<u8>],
    roots: &CertPool,
) -> Result<ValidatedChain, ValidationError> {
    if raw_chain.is_empty() {
        return Err(ValidationError::EmptyChain);
    }

    let certs: Vec<Certificate> = raw_chain
        .iter()
        .map(|bytes| Certificate::from_der(bytes))
        .collect::<Result<_, _>>()?;

    // Walk up the chain, ensuring that each certificate names and signs the
    // previous one. This simplified validation is possible due to the
    // constraints laid out in RFC 6962.
    for pair in certs.windows(2) {
        if pair[0].tbs_certificate.issuer != pair[1].tbs_certificate.subject
            || !is_link_valid(&pair[0], &pair[1])
        {
            return Err(ValidationError::InvalidLinkInChain);
        }
    }

    let mut certs = certs;
    let mut raw: Vec<Vec<u8>> = raw_chain.to_vec();

    // The last certificate is either an accepted root itself or must be
    // signed by one, which then completes the returned chain.
    let last = &certs[certs.len() - 1];
    if !roots.included(last)? {
        let Some(&idx) = roots
            .issuer_candidates(last)
            .iter()
            .find(|&&idx| is_link_valid(last, &roots.certs[idx]))
        else {
            return Err(ValidationError::NoPathToTrustedRoot {
                issuer: last.tbs_certificate.issuer.to_string(),
            });
        };
        certs.push(roots.certs[idx].clone());
        raw.push(roots.raw[idx].clone());
    }

    Ok(ValidatedChain { certs, raw })
}

/// Returns whether `issuer`'s key verifies the signature on `child`.
pub fn is_link_valid(child: &Certificate, issuer: &Certificate) -> bool {
    if let Ok(key) = VerifyingKey::try_from(issuer) {
        key.verify_strict(child).is_ok()
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CA_CERT_PEM: &[u8] = include_bytes!("../tests/ca-cert.pem");
    const INTERMEDIATE_CERT_PEM: &[u8] = include_bytes!("../tests/intermediate-cert.pem");

    fn pool_with(pems: &[&[u8]]) -> CertPool {
        let mut pool = CertPool::new();
        for pem in pems {
            assert!(pool.append_certs_from_pem(pem));
        }
        pool
    }

    #[test]
    fn append_rejects_garbage() {
        let mut pool = CertPool::new();
        assert!(!pool.append_certs_from_pem(
            b"-----BEGIN CERTIFICATE-----\naGVsbG8=\n-----END CERTIFICATE-----\n"
        ));
    }

    #[test]
    fn append_skips_duplicates() {
        let mut pool = CertPool::new();
        assert!(pool.append_certs_from_pem(CA_CERT_PEM));
        assert!(pool.append_certs_from_pem(CA_CERT_PEM));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn raw_certificates_preserve_insertion_order() {
        let pool = pool_with(&[CA_CERT_PEM, INTERMEDIATE_CERT_PEM]);
        let ca = Certificate::load_pem_chain(CA_CERT_PEM).unwrap().remove(0);
        let intermediate = Certificate::load_pem_chain(INTERMEDIATE_CERT_PEM)
            .unwrap()
            .remove(0);
        assert_eq!(pool.raw_certificates().len(), 2);
        assert_eq!(pool.raw_certificates()[0], ca.to_der().unwrap());
        assert_eq!(pool.raw_certificates()[1], intermediate.to_der().unwrap());
    }

    #[test]
    fn included_by_der_equality() {
        let pool = pool_with(&[CA_CERT_PEM]);
        let ca = Certificate::load_pem_chain(CA_CERT_PEM).unwrap().remove(0);
        let intermediate = Certificate::load_pem_chain(INTERMEDIATE_CERT_PEM)
            .unwrap()
            .remove(0);
        assert!(pool.included(&ca).unwrap());
        assert!(!pool.included(&intermediate).unwrap());
    }

    #[test]
    fn find_issuer_matches_subject_and_signature() {
        let pool = pool_with(&[CA_CERT_PEM]);
        let ca = Certificate::load_pem_chain(CA_CERT_PEM).unwrap().remove(0);
        let intermediate = Certificate::load_pem_chain(INTERMEDIATE_CERT_PEM)
            .unwrap()
            .remove(0);
        let issuer = pool.find_issuer(&intermediate).expect("issuer in pool");
        assert_eq!(issuer.to_der().unwrap(), ca.to_der().unwrap());
    }

    #[test]
    fn validate_chain_rejects_empty() {
        let pool = pool_with(&[CA_CERT_PEM]);
        assert!(matches!(
            validate_chain(&[], &pool),
            Err(ValidationError::EmptyChain)
        ));
    }

    #[test]
    fn validate_chain_appends_matching_root() {
        let pool = pool_with(&[CA_CERT_PEM]);
        let intermediate = Certificate::load_pem_chain(INTERMEDIATE_CERT_PEM)
            .unwrap()
            .remove(0);
        let chain = validate_chain(&[intermediate.to_der().unwrap()], &pool).unwrap();
        assert_eq!(chain.certs().len(), 2);
        assert_eq!(chain.raw()[1], pool.raw_certificates()[0]);
    }

    #[test]
    fn validate_chain_accepts_chain_ending_at_root() {
        let pool = pool_with(&[CA_CERT_PEM]);
        let ca = Certificate::load_pem_chain(CA_CERT_PEM).unwrap().remove(0);
        let intermediate = Certificate::load_pem_chain(INTERMEDIATE_CERT_PEM)
            .unwrap()
            .remove(0);
        let chain = validate_chain(
            &[intermediate.to_der().unwrap(), ca.to_der().unwrap()],
            &pool,
        )
        .unwrap();
        assert_eq!(chain.certs().len(), 2);
    }

    #[test]
    fn validate_chain_rejects_unknown_root() {
        let pool = pool_with(&[INTERMEDIATE_CERT_PEM]);
        let ca = Certificate::load_pem_chain(CA_CERT_PEM).unwrap().remove(0);
        assert!(matches!(
            validate_chain(&[ca.to_der().unwrap()], &pool),
            Err(ValidationError::NoPathToTrustedRoot { .. })
        ));
    }

    #[test]
    fn validate_chain_rejects_broken_link() {
        let pool = pool_with(&[CA_CERT_PEM]);
        let ca = Certificate::load_pem_chain(CA_CERT_PEM).unwrap().remove(0);
        let intermediate = Certificate::load_pem_chain(INTERMEDIATE_CERT_PEM)
            .unwrap()
            .remove(0);
        // The CA is self-signed, not signed by the intermediate.
        assert!(matches!(
            validate_chain(
                &[ca.to_der().unwrap(), intermediate.to_der().unwrap()],
                &pool,
            ),
            Err(ValidationError::InvalidLinkInChain)
        ));
    }
}
