// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

pub mod rfc6962;
pub mod wire;

pub use rfc6962::*;
pub use wire::*;

#[derive(thiserror::Error, Debug)]
pub enum Rfc6962Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Der(#[from] der::Error),
    #[error(transparent)]
    Validation(#[from] x509_util::ValidationError),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("unknown leaf type")]
    UnknownLeafType,
    #[error("unknown entry type")]
    UnknownEntryType,
    #[error("trailing data")]
    TrailingData,
    #[error("mismatching signature algorithms")]
    MismatchingSigAlg,
    #[error("CT poison extension is not critical or invalid")]
    InvalidCTPoison,
    #[error("missing precertificate issuer")]
    MissingPrecertIssuer,
    #[error("missing precertificate signing certificate issuer")]
    MissingPrecertSigningCertificateIssuer,
    #[error(
        "{}certificate submitted to add-{}chain", if *.is_precert { "pre-" } else { "final " }, if *.is_precert { "" } else { "pre-" }
    )]
    EndpointMismatch { is_precert: bool },
}
