// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! The key manager capability: each log instance advertises its public key
//! and signature algorithm, and signs the byte sequences handed to it. The
//! rest of the front-end never touches raw private keys.

use p256::ecdsa::{signature::Signer, Signature as EcdsaSignature, SigningKey as EcdsaSigningKey};
use p256::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rfc6962_api::SignatureAlgorithm;
use sha2::{Digest, Sha256};

#[derive(thiserror::Error, Debug)]
pub enum KeyError {
    #[error(transparent)]
    Der(#[from] der::Error),
    #[error(transparent)]
    Pkcs8(#[from] pkcs8::Error),
    #[error(transparent)]
    Spki(#[from] pkcs8::spki::Error),
    #[error("signer: {0}")]
    Signer(String),
}

/// Holds a log's signing capability and its advertised public key.
pub trait KeyManager: Send + Sync {
    /// The DER-encoded `SubjectPublicKeyInfo` of the log's public key.
    fn public_key_der(&self) -> &[u8];

    /// The TLS signature algorithm the key signs with.
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Signs a TLS-serialized signature input, returning the raw signature
    /// bytes (DER for ECDSA).
    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, KeyError>;
}

/// The log ID advertised in SCTs: SHA-256 over the public key DER.
pub fn log_id(key_manager: &dyn KeyManager) -> Vec<u8> {
    Sha256::digest(key_manager.public_key_der()).to_vec()
}

/// A [`KeyManager`] backed by a P-256 key. Signatures are deterministic
/// (RFC 6979), so re-signing identical inputs yields identical SCTs.
pub struct EcdsaKeyManager {
    signing_key: EcdsaSigningKey,
    public_key_der: Vec<u8>,
}

impl EcdsaKeyManager {
    pub fn new(signing_key: EcdsaSigningKey) -> Result<Self, KeyError> {
        let public_key_der = signing_key.verifying_key().to_public_key_der()?.into_vec();
        Ok(Self {
            signing_key,
            public_key_der,
        })
    }

    /// Loads a PKCS#8 private key from PEM. An empty password selects plain
    /// PKCS#8; otherwise the key must be an `EncryptedPrivateKeyInfo`
    /// protected with that password.
    pub fn load_pem(pem: &str, password: &str) -> Result<Self, KeyError> {
        let secret_key = if password.is_empty() {
            p256::SecretKey::from_pkcs8_pem(pem)?
        } else {
            let (_, doc) = der::Document::from_pem(pem)?;
            let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(doc.as_bytes())?;
            let decrypted = encrypted.decrypt(password)?;
            p256::SecretKey::from_pkcs8_der(decrypted.as_bytes())?
        };
        Self::new(EcdsaSigningKey::from(secret_key))
    }
}

impl KeyManager for EcdsaKeyManager {
    fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Ecdsa
    }

    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, KeyError> {
        let signature: EcdsaSignature = self.signing_key.sign(msg);
        Ok(signature.to_der().as_bytes().to_vec())
    }
}
