// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Entry encryption methods.
//!
//! Two schemes exist: the legacy symmetric path (key derived from the wallet
//! address) and the identity-based threshold path. The method is a closed
//! tagged union decoded once at the API boundary; the threshold side
//! carries its required fields in the variant, so "threshold metadata is
//! present iff the method is threshold" holds at the type level.

pub mod legacy;
pub mod resolver;
pub mod session;

pub use resolver::{DecryptError, DecryptOutcome, MethodResolver, ThresholdDecrypt};
pub use session::{SessionCredential, SessionError, MAX_SESSION_TTL_MINUTES};

use serde::{Deserialize, Serialize};

/// Encryption method tag plus its per-method payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum EncryptionEnvelope {
    /// Deterministic symmetric key derived from the wallet address.
    Legacy,
    /// Identity-based threshold scheme. The threshold recorded here is the
    /// one used at encryption time and must be carried through to decrypt
    /// unchanged.
    Threshold {
        package_id: String,
        identity_id: String,
        threshold: u8,
    },
}

impl EncryptionEnvelope {
    /// Decode the wire representation once, at the boundary.
    ///
    /// Rejects a threshold tag with missing fields and a legacy tag with
    /// stray threshold fields, so downstream code never re-checks.
    pub fn from_request(
        method: &str,
        package_id: Option<String>,
        identity_id: Option<String>,
        threshold: Option<u8>,
    ) -> Result<Self, String> {
        match method {
            "legacy" => {
                if package_id.is_some() || identity_id.is_some() || threshold.is_some() {
                    return Err(
                        "threshold fields are not allowed when encryptionMethod is legacy".into(),
                    );
                }
                Ok(Self::Legacy)
            }
            "threshold" => {
                let package_id =
                    package_id.ok_or("packageId is required when encryptionMethod is threshold")?;
                let identity_id = identity_id
                    .ok_or("identityId is required when encryptionMethod is threshold")?;
                let threshold =
                    threshold.ok_or("threshold is required when encryptionMethod is threshold")?;
                if threshold == 0 {
                    return Err("threshold must be at least 1".into());
                }
                Ok(Self::Threshold {
                    package_id,
                    identity_id,
                    threshold,
                })
            }
            other => Err(format!(
                "unknown encryptionMethod `{other}` (expected `legacy` or `threshold`)"
            )),
        }
    }

    pub fn method_tag(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Threshold { .. } => "threshold",
        }
    }

    pub fn is_threshold(&self) -> bool {
        matches!(self, Self::Threshold { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_decodes_without_threshold_fields() {
        let envelope = EncryptionEnvelope::from_request("legacy", None, None, None).unwrap();
        assert_eq!(envelope, EncryptionEnvelope::Legacy);
    }

    #[test]
    fn legacy_rejects_stray_threshold_fields() {
        let err =
            EncryptionEnvelope::from_request("legacy", Some("0xpkg".into()), None, None)
                .unwrap_err();
        assert!(err.contains("not allowed"));
    }

    #[test]
    fn threshold_requires_all_fields() {
        let err = EncryptionEnvelope::from_request("threshold", Some("0xpkg".into()), None, None)
            .unwrap_err();
        assert!(err.contains("identityId"));

        let ok = EncryptionEnvelope::from_request(
            "threshold",
            Some("0xpkg".into()),
            Some("0xid".into()),
            Some(2),
        )
        .unwrap();
        assert!(ok.is_threshold());
    }

    #[test]
    fn unknown_method_is_rejected() {
        let err = EncryptionEnvelope::from_request("rot13", None, None, None).unwrap_err();
        assert!(err.contains("rot13"));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let err = EncryptionEnvelope::from_request(
            "threshold",
            Some("0xpkg".into()),
            Some("0xid".into()),
            Some(0),
        )
        .unwrap_err();
        assert!(err.contains("at least 1"));
    }
}
