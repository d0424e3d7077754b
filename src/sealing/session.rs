// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Short-lived decrypt session credentials.
//!
//! A session carries an ephemeral public key authorized by the user's wallet
//! signature. Sessions are never persisted; they live only for the duration
//! of a decrypt request.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Upper bound on a requested session lifetime. Longer requests are clamped,
/// not rejected, so stale clients keep working.
pub const MAX_SESSION_TTL_MINUTES: i64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session TTL must be positive")]
    NonPositiveTtl,
    #[error("session already carries a signature")]
    AlreadyBound,
    #[error("session has expired")]
    Expired,
    #[error("session is missing its wallet signature")]
    Unbound,
}

/// Ephemeral credential for threshold decryption.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    user_address: String,
    session_key: Vec<u8>,
    signature: Option<Vec<u8>>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionCredential {
    /// Create a session valid for `ttl_minutes`, clamped to
    /// [`MAX_SESSION_TTL_MINUTES`].
    pub fn new(
        user_address: String,
        session_key: Vec<u8>,
        ttl_minutes: i64,
    ) -> Result<Self, SessionError> {
        if ttl_minutes <= 0 {
            return Err(SessionError::NonPositiveTtl);
        }
        let effective = ttl_minutes.min(MAX_SESSION_TTL_MINUTES);
        let created_at = Utc::now();
        Ok(Self {
            user_address,
            session_key,
            signature: None,
            created_at,
            expires_at: created_at + Duration::minutes(effective),
        })
    }

    /// Attach the wallet signature authorizing this session. At most once.
    pub fn bind_signature(&mut self, signature: Vec<u8>) -> Result<(), SessionError> {
        if self.signature.is_some() {
            return Err(SessionError::AlreadyBound);
        }
        self.signature = Some(signature);
        Ok(())
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Fails unless the session is bound and still live.
    pub fn ensure_usable(&self) -> Result<(), SessionError> {
        if self.is_expired() {
            return Err(SessionError::Expired);
        }
        if self.signature.is_none() {
            return Err(SessionError::Unbound);
        }
        Ok(())
    }

    pub fn user_address(&self) -> &str {
        &self.user_address
    }

    pub fn session_key(&self) -> &[u8] {
        &self.session_key
    }

    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[cfg(test)]
    pub fn expire_now(&mut self) {
        self.expires_at = self.created_at;
    }
}
