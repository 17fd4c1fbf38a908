use std::fmt::{Debug, Formatter};

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use data_encoding::BASE64URL_NOPAD;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::TokenError;

/// Prefix of every token. Authenticated as associated data, so a token minted
/// for another format version never opens.
pub const TOKEN_HEADER: &str = "ballot.v1.";

/// Key size of XChaCha20-Poly1305.
pub const KEY_LENGTH: usize = 32;

const NONCE_LENGTH: usize = 24;
const TAG_LENGTH: usize = 16;

/// The configured symmetric key cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("token key must be at least {required} bytes long, but is {actual} bytes")]
pub struct KeyConfigurationError {
    pub required: usize,
    pub actual: usize,
}

/// Authenticated encryption of opaque token strings under a pre-shared key.
///
/// A sealed token is `TOKEN_HEADER` followed by the unpadded base64url encoding
/// of `nonce || ciphertext || tag`.
#[derive(Clone)]
pub struct TokenCodec {
    key: Key,
}

impl TokenCodec {
    /// Build a codec from raw key material.
    ///
    /// Keys shorter than [`KEY_LENGTH`] are rejected; longer keys are reduced to
    /// [`KEY_LENGTH`] bytes with SHA-256.
    pub fn new(key: &[u8]) -> Result<Self, KeyConfigurationError> {
        let key = match key.len() {
            len if len < KEY_LENGTH => {
                return Err(KeyConfigurationError {
                    required: KEY_LENGTH,
                    actual: len,
                })
            }
            KEY_LENGTH => *Key::from_slice(key),
            _ => Sha256::digest(key),
        };
        Ok(Self { key })
    }

    /// Encrypt and authenticate `plaintext` into a token string.
    pub fn seal(&self, plaintext: &[u8]) -> String {
        let mut nonce = [0; NONCE_LENGTH];
        rand::thread_rng().fill_bytes(&mut nonce);

        let payload = Payload {
            msg: plaintext,
            aad: TOKEN_HEADER.as_bytes(),
        };
        let ciphertext = XChaCha20Poly1305::new(&self.key)
            .encrypt(XNonce::from_slice(&nonce), payload)
            .expect("encryption only fails for messages larger than 256 GiB");

        let mut sealed = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        format!("{TOKEN_HEADER}{}", BASE64URL_NOPAD.encode(&sealed))
    }

    /// Decrypt a token string, failing with [`TokenError::Invalid`] on any
    /// encoding or authentication problem.
    pub fn open(&self, token: &str) -> Result<Vec<u8>, TokenError> {
        let encoded = token
            .strip_prefix(TOKEN_HEADER)
            .ok_or(TokenError::Invalid)?;
        let sealed = BASE64URL_NOPAD
            .decode(encoded.as_bytes())
            .map_err(|_| TokenError::Invalid)?;
        if sealed.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(TokenError::Invalid);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LENGTH);
        let payload = Payload {
            msg: ciphertext,
            aad: TOKEN_HEADER.as_bytes(),
        };
        XChaCha20Poly1305::new(&self.key)
            .decrypt(XNonce::from_slice(nonce), payload)
            .map_err(|_| TokenError::Invalid)
    }
}

impl Debug for TokenCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}
