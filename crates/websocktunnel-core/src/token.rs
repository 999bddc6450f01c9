// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

//! Client-side inspection of relay bearer tokens.
//!
//! The relay verifies signatures; the client only peeks at the claims to
//! decide whether a token is still worth presenting, so nothing here checks
//! signatures.

use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

/// Claim decoding only: no signature, audience or time checks.
fn inspection() -> Validation {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation
}

/// Decodes the claims of a JWT without verifying it.
pub fn decode_claims(token: &str) -> Option<Claims> {
    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &inspection())
        .ok()
        .map(|data| data.claims)
}

/// A token is usable when it parses, carries an expiry in the future and is
/// not scheduled to become valid later. Opaque tokens are never usable.
pub fn is_token_usable(token: &str) -> bool {
    is_token_usable_at(token, now_unix())
}

pub fn is_token_usable_at(token: &str, now: i64) -> bool {
    let Some(claims) = decode_claims(token) else {
        return false;
    };

    match claims.exp {
        Some(exp) if exp > now => {}
        _ => return false,
    }

    claims.nbf.map_or(true, |nbf| nbf <= now)
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
