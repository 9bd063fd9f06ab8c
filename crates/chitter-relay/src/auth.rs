// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection tokens.
//!
//! A token is the hex HMAC-SHA256 of the user id under the relay's shared
//! secret. Without a secret the relay runs open and trusts the `user` query
//! parameter.

use chitter_core::UserId;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Default)]
pub struct TokenVerifier {
    secret: Option<String>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("secret", &self.secret.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    /// Accepts any user id. Development only.
    pub fn open() -> Self {
        Self { secret: None }
    }

    pub fn is_open(&self) -> bool {
        self.secret.is_none()
    }

    /// The token `user` must present. `None` in open mode.
    pub fn issue(&self, user: &UserId) -> Option<String> {
        let mac = self.mac(user)?;
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check the credentials presented on upgrade.
    pub fn verify(&self, user: &UserId, token: Option<&str>) -> bool {
        if user.as_str().trim().is_empty() {
            return false;
        }
        let Some(mac) = self.mac(user) else {
            return true;
        };
        let Some(bytes) = token.and_then(|t| hex::decode(t).ok()) else {
            return false;
        };
        mac.verify_slice(&bytes).is_ok()
    }

    fn mac(&self, user: &UserId) -> Option<HmacSha256> {
        let secret = self.secret.as_ref()?;
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(user.as_str().as_bytes());
        Some(mac)
    }
}
