// Ported from "certificate-transparency-go" (https://github.com/google/certificate-transparency-go)
// Copyright 2016 Google LLC. All Rights Reserved.
// Licensed under Apache-2.0 License found in the LICENSE file or at https://www.apache.org/licenses/LICENSE-2.0
//
// This ports code from the original Go project "certificate-transparency-go" and adapts it to Rust idioms.
//
// Modifications and Rust implementation Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! TLS presentation-language encoding of the [RFC 6962](https://datatracker.ietf.org/doc/html/rfc6962)
//! structures: `MerkleTreeLeaf`, `TimestampedEntry`, the SCT and STH signature
//! inputs, `DigitallySigned`, and the per-leaf extra data
//! (`CertificateChain` / `PrecertChainEntry`).
//!
//! All multi-byte integers are big-endian; variable-length fields carry an
//! explicit length prefix whose width is implied by the maximum declared
//! length (RFC 5246 s4).

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::Rfc6962Error;

/// Unix timestamp, measured since the epoch (January 1, 1970, 00:00),
/// ignoring leap seconds, in milliseconds.
/// This can be unsigned as we never deal with negative timestamps.
pub type UnixTimestamp = u64;

/// CT protocol version v1 (RFC 6962 s3.2).
pub const V1: u8 = 0;

// MerkleLeafType: timestamped_entry(0).
const TIMESTAMPED_ENTRY: u8 = 0;

// LogEntryType values (RFC 6962 s3.1).
const X509_ENTRY: u16 = 0;
const PRECERT_ENTRY: u16 = 1;

// SignatureType values (RFC 6962 s3.2).
const CERTIFICATE_TIMESTAMP: u8 = 0;
const TREE_HASH: u8 = 1;

// HashAlgorithm (RFC 5246 s7.4.1.4.1). SHA-256 is the only hash this log
// signs with.
const HASH_ALGORITHM_SHA256: u8 = 4;

/// TLS `SignatureAlgorithm` codes for the algorithms a log key may use
/// (RFC 5246 s7.4.1.4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Rsa,
    Ecdsa,
}

impl SignatureAlgorithm {
    fn code(self) -> u8 {
        match self {
            SignatureAlgorithm::Rsa => 1,
            SignatureAlgorithm::Ecdsa => 3,
        }
    }
}

/// The entry-type-specific body of a `TimestampedEntry`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignedEntry {
    /// DER-encoded leaf certificate. It must be at most 2^24-1 bytes long.
    X509(Vec<u8>),
    /// `PreCert` body for precertificate entries.
    Precert {
        /// SHA-256 over the issuing CA's `SubjectPublicKeyInfo`.
        issuer_key_hash: [u8; 32],
        /// DER-encoded `TBSCertificate` with the poison extension removed.
        tbs_certificate: Vec<u8>,
    },
}

impl SignedEntry {
    /// The `LogEntryType` discriminant for this entry.
    pub fn entry_type(&self) -> u16 {
        match self {
            SignedEntry::X509(_) => X509_ENTRY,
            SignedEntry::Precert { .. } => PRECERT_ENTRY,
        }
    }
}

/// RFC 6962 s3.4 `TimestampedEntry`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimestampedEntry {
    pub timestamp: UnixTimestamp,
    pub entry: SignedEntry,
    /// Opaque `CtExtensions`; empty for every entry this log issues.
    pub extensions: Vec<u8>,
}

impl TimestampedEntry {
    /// # Panics
    ///
    /// Panics if writing to the internal buffer fails, which should never
    /// happen.
    fn marshal(&self, buffer: &mut Vec<u8>) {
        buffer.write_u64::<BigEndian>(self.timestamp).unwrap();
        buffer.write_u16::<BigEndian>(self.entry.entry_type()).unwrap();
        match &self.entry {
            SignedEntry::X509(cert) => {
                write_length_prefixed(buffer, cert, 3).unwrap();
            }
            SignedEntry::Precert {
                issuer_key_hash,
                tbs_certificate,
            } => {
                buffer.extend_from_slice(issuer_key_hash);
                write_length_prefixed(buffer, tbs_certificate, 3).unwrap();
            }
        }
        write_length_prefixed(buffer, &self.extensions, 2).unwrap();
    }

    fn parse<R: Read>(s: &mut R) -> Result<Self, Rfc6962Error> {
        let timestamp = s.read_u64::<BigEndian>()?;
        let entry = match s.read_u16::<BigEndian>()? {
            X509_ENTRY => SignedEntry::X509(read_length_prefixed(s, 3)?),
            PRECERT_ENTRY => {
                let mut issuer_key_hash = [0; 32];
                s.read_exact(&mut issuer_key_hash)?;
                SignedEntry::Precert {
                    issuer_key_hash,
                    tbs_certificate: read_length_prefixed(s, 3)?,
                }
            }
            _ => return Err(Rfc6962Error::UnknownEntryType),
        };
        let extensions = read_length_prefixed(s, 2)?;
        Ok(Self {
            timestamp,
            entry,
            extensions,
        })
    }
}

/// RFC 6962 s3.4 `MerkleTreeLeaf`. Only v1 timestamped entries exist, so the
/// version and leaf type are implicit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTreeLeaf {
    pub entry: TimestampedEntry,
}

impl MerkleTreeLeaf {
    /// Returns the marshaled leaf.
    ///
    /// # Panics
    ///
    /// Panics if writing to the internal buffer fails, which should never
    /// happen.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = vec![
            V1,                // version = v1 (0)
            TIMESTAMPED_ENTRY, // leaf_type = timestamped_entry (0)
        ];
        self.entry.marshal(&mut buffer);
        buffer
    }

    /// Parses a marshaled leaf, rejecting trailing data.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is truncated, carries an unknown
    /// version, leaf type, or entry type, or has bytes left over.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Rfc6962Error> {
        let mut s = Cursor::new(bytes);
        if s.read_u8()? != V1 {
            return Err(Rfc6962Error::UnsupportedVersion);
        }
        if s.read_u8()? != TIMESTAMPED_ENTRY {
            return Err(Rfc6962Error::UnknownLeafType);
        }
        let entry = TimestampedEntry::parse(&mut s)?;
        if s.position() != bytes.len() as u64 {
            return Err(Rfc6962Error::TrailingData);
        }
        Ok(Self { entry })
    }
}

/// Serializes the digitally-signed input for a Signed Certificate Timestamp
/// according to RFC 6962 s3.2:
/// ```text
/// digitally-signed struct {
///     Version sct_version;
///     SignatureType signature_type = certificate_timestamp;
///     uint64 timestamp;
///     LogEntryType entry_type;
///     select(entry_type) {
///         case x509_entry: ASN.1Cert;
///         case precert_entry: PreCert;
///     } signed_entry;
///     CtExtensions extensions;
/// };
/// ```
///
/// # Panics
///
/// Panics if writing to the internal buffer fails, which should never happen.
pub fn certificate_timestamp_signature_input(entry: &TimestampedEntry) -> Vec<u8> {
    let mut buffer = vec![
        V1,                    // sct_version = v1 (0)
        CERTIFICATE_TIMESTAMP, // signature_type = certificate_timestamp (0)
    ];
    entry.marshal(&mut buffer);
    buffer
}

/// Serializes the digitally-signed input for a Signed Tree Head according to
/// RFC 6962 s3.5:
/// ```text
/// digitally-signed struct {
///     Version version;
///     SignatureType signature_type = tree_hash;
///     uint64 timestamp;
///     uint64 tree_size;
///     opaque sha256_root_hash[32];
/// } TreeHeadSignature;
/// ```
///
/// # Panics
///
/// Panics if writing to the internal buffer fails, which should never happen.
pub fn tree_head_signature_input(
    timestamp: UnixTimestamp,
    tree_size: u64,
    root_hash: &[u8; 32],
) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.write_u8(V1).unwrap();
    buffer.write_u8(TREE_HASH).unwrap();
    buffer.write_u64::<BigEndian>(timestamp).unwrap();
    buffer.write_u64::<BigEndian>(tree_size).unwrap();
    buffer.extend_from_slice(root_hash);
    buffer
}

/// Produces an encoded `DigitallySigned` as defined in RFC 5246 s4.7, with
/// the hash algorithm pinned to SHA-256.
///
/// # Panics
///
/// Panics if writing to the internal buffer fails, which should never happen.
pub fn digitally_signed(algorithm: SignatureAlgorithm, signature: &[u8]) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.push(HASH_ALGORITHM_SHA256);
    buffer.push(algorithm.code());
    write_length_prefixed(&mut buffer, signature, 2).unwrap();
    buffer
}

/// Marshals an `X509ChainEntry.certificate_chain` (RFC 6962 s3.1): the chain
/// of issuer certificates, excluding the leaf.
///
/// # Panics
///
/// Panics if writing to the internal buffer fails, which should never happen.
pub fn certificate_chain(issuers: &[Vec<u8>]) -> Vec<u8> {
    let mut chain = Vec::new();
    for cert in issuers {
        write_length_prefixed(&mut chain, cert, 3).unwrap();
    }
    let mut buffer = Vec::new();
    write_length_prefixed(&mut buffer, &chain, 3).unwrap();
    buffer
}

/// Marshals a `PrecertChainEntry` (RFC 6962 s3.1): the submitted
/// precertificate followed by its issuer chain.
///
/// # Panics
///
/// Panics if writing to the internal buffer fails, which should never happen.
pub fn precert_chain_entry(pre_certificate: &[u8], issuers: &[Vec<u8>]) -> Vec<u8> {
    let mut buffer = Vec::new();
    write_length_prefixed(&mut buffer, pre_certificate, 3).unwrap();
    buffer.extend(certificate_chain(issuers));
    buffer
}

/// Read a length-prefixed value from the passed in reader.
fn read_length_prefixed<R: Read>(
    reader: &mut R,
    length_bytes: usize,
) -> Result<Vec<u8>, std::io::Error> {
    let length = reader.read_uint::<BigEndian>(length_bytes)?;
    let mut buffer = vec![0; usize::try_from(length).unwrap()];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Write length-prefixed data to the passed in writer.
fn write_length_prefixed<W: Write>(
    writer: &mut W,
    data: &[u8],
    length_bytes: usize,
) -> Result<(), std::io::Error> {
    writer.write_uint::<BigEndian>(data.len() as u64, length_bytes)?;
    writer.write_all(data)
}
