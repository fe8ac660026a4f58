//! Short-lived sales-access tokens embedded in order links.
//!
//! A token is `base64url(iv || tag || ciphertext)` where the ciphertext is the
//! AES-256-GCM encryption of `{"phone": .., "exp": ..}` under a key derived
//! from the configured secret.

use crate::common::errors::BusinessError;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use openssl::symm::{Cipher, decrypt_aead, encrypt_aead};
use serde::{Deserialize, Serialize};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const AAD: &[u8] = b"lims-sales-link";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesTokenClaims {
    pub phone: String,
    /// Expiry as unix seconds
    pub exp: i64,
}

fn key(secret: &str) -> [u8; 32] {
    openssl::sha::sha256(secret.as_bytes())
}

fn internal(err: impl std::fmt::Display) -> BusinessError {
    BusinessError::InternalError {
        message: format!("sales token: {err}"),
    }
}

fn rejected(reason: &str) -> BusinessError {
    BusinessError::Unauthorized {
        message: format!("sales link {reason}"),
    }
}

pub fn mint(
    secret: &str,
    phone: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, BusinessError> {
    let claims = SalesTokenClaims {
        phone: phone.to_string(),
        exp: (now + ttl).timestamp(),
    };
    let plaintext = serde_json::to_vec(&claims).map_err(internal)?;

    let mut iv = [0u8; IV_LEN];
    openssl::rand::rand_bytes(&mut iv).map_err(internal)?;
    let mut tag = [0u8; TAG_LEN];
    let ciphertext = encrypt_aead(
        Cipher::aes_256_gcm(),
        &key(secret),
        Some(&iv),
        AAD,
        &plaintext,
        &mut tag,
    )
    .map_err(internal)?;

    let mut raw = Vec::with_capacity(IV_LEN + TAG_LEN + ciphertext.len());
    raw.extend_from_slice(&iv);
    raw.extend_from_slice(&tag);
    raw.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(raw))
}

pub fn verify(
    secret: &str,
    token: &str,
    now: DateTime<Utc>,
) -> Result<SalesTokenClaims, BusinessError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| rejected("is malformed"))?;
    if raw.len() <= IV_LEN + TAG_LEN {
        return Err(rejected("is malformed"));
    }
    let (iv, rest) = raw.split_at(IV_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let plaintext = decrypt_aead(
        Cipher::aes_256_gcm(),
        &key(secret),
        Some(iv),
        AAD,
        ciphertext,
        tag,
    )
    .map_err(|_| rejected("is invalid"))?;
    let claims: SalesTokenClaims =
        serde_json::from_slice(&plaintext).map_err(|_| rejected("is invalid"))?;

    if claims.exp <= now.timestamp() {
        return Err(rejected("has expired"));
    }
    Ok(claims)
}
