// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Decrypt path resolution.
//!
//! Legacy entries decrypt locally with no credential. Threshold entries need
//! a bound, unexpired session; the authorization transaction forwarded to the
//! key service is built here from the stored envelope and the requesting
//! address, never taken from the request. The threshold used at decrypt time
//! is always the one recorded at encryption time. When the threshold backend
//! fails we attempt the legacy path as a fallback and, if that also fails,
//! report both failures instead of hiding one behind the other.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::ledger::tx::{Operation, TransactionKind};

use super::legacy::{self, LegacyCryptoError};
use super::session::{SessionCredential, SessionError};
use super::EncryptionEnvelope;

#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("threshold decryption requires a session credential")]
    SessionRequired,
    #[error("no threshold key service is configured")]
    ThresholdUnavailable,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Legacy(#[from] LegacyCryptoError),
    #[error("threshold path failed ({threshold}); legacy fallback failed ({legacy})")]
    AllPathsFailed { threshold: String, legacy: String },
}

/// Result of a resolved decrypt, including which path actually produced the
/// plaintext.
#[derive(Debug)]
pub struct DecryptOutcome {
    pub plaintext: Vec<u8>,
    pub method_used: &'static str,
    /// Set when a threshold entry was recovered through the legacy fallback.
    pub fallback_used: bool,
}

/// Backend that evaluates an identity-based decrypt request against the key
/// service quorum.
#[async_trait]
pub trait ThresholdDecrypt: Send + Sync {
    async fn decrypt(
        &self,
        package_id: &str,
        identity_id: &str,
        threshold: u8,
        authorization: &[u8],
        session: &SessionCredential,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, String>;
}

/// HTTP key-service client.
pub struct HttpThresholdDecrypt {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct KeyServiceResponse {
    plaintext: String,
}

impl HttpThresholdDecrypt {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ThresholdDecrypt for HttpThresholdDecrypt {
    async fn decrypt(
        &self,
        package_id: &str,
        identity_id: &str,
        threshold: u8,
        authorization: &[u8],
        session: &SessionCredential,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, String> {
        let body = serde_json::json!({
            "packageId": package_id,
            "identityId": identity_id,
            "threshold": threshold,
            "authorizationTx": hex::encode(authorization),
            "sessionKey": hex::encode(session.session_key()),
            "sessionSignature": session.signature().map(hex::encode),
            "ciphertext": hex::encode(ciphertext),
        });
        let response = self
            .http
            .post(format!("{}/v1/decrypt", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| format!("key service unreachable: {err}"))?;
        if !response.status().is_success() {
            return Err(format!("key service returned {}", response.status()));
        }
        let parsed: KeyServiceResponse = response
            .json()
            .await
            .map_err(|err| format!("malformed key service response: {err}"))?;
        hex::decode(parsed.plaintext)
            .map_err(|err| format!("key service returned non-hex plaintext: {err}"))
    }
}

/// Routes a decrypt request to the path dictated by the stored envelope.
pub struct MethodResolver {
    threshold: Option<Arc<dyn ThresholdDecrypt>>,
}

impl MethodResolver {
    pub fn new(threshold: Option<Arc<dyn ThresholdDecrypt>>) -> Self {
        Self { threshold }
    }

    /// Decrypt `ciphertext` for `address` according to `envelope`.
    ///
    /// `session` is only consulted for threshold entries; legacy entries
    /// ignore it entirely.
    pub async fn decrypt(
        &self,
        envelope: &EncryptionEnvelope,
        address: &str,
        ciphertext: &[u8],
        session: Option<&SessionCredential>,
    ) -> Result<DecryptOutcome, DecryptError> {
        match envelope {
            EncryptionEnvelope::Legacy => {
                let plaintext = legacy::decrypt(address, ciphertext)?;
                Ok(DecryptOutcome {
                    plaintext,
                    method_used: "legacy",
                    fallback_used: false,
                })
            }
            EncryptionEnvelope::Threshold {
                package_id,
                identity_id,
                threshold,
            } => {
                let session = session.ok_or(DecryptError::SessionRequired)?;
                session.ensure_usable()?;
                let backend = self
                    .threshold
                    .as_ref()
                    .ok_or(DecryptError::ThresholdUnavailable)?;

                // The authorization transaction the key service evaluates is
                // derived from the stored envelope, so a caller cannot claim
                // an identity other than the one this entry was sealed under.
                let authorization = TransactionKind {
                    sender: address.to_string(),
                    operation: Operation::AuthorizeDecrypt {
                        package_id: package_id.clone(),
                        identity_id: identity_id.clone(),
                        requester: address.to_string(),
                    },
                }
                .to_kind_bytes();

                match backend
                    .decrypt(
                        package_id,
                        identity_id,
                        *threshold,
                        &authorization,
                        session,
                        ciphertext,
                    )
                    .await
                {
                    Ok(plaintext) => Ok(DecryptOutcome {
                        plaintext,
                        method_used: "threshold",
                        fallback_used: false,
                    }),
                    Err(threshold_err) => {
                        tracing::warn!(
                            error = %threshold_err,
                            "threshold decrypt failed, attempting legacy fallback"
                        );
                        match legacy::decrypt(address, ciphertext) {
                            Ok(plaintext) => Ok(DecryptOutcome {
                                plaintext,
                                method_used: "legacy",
                                fallback_used: true,
                            }),
                            Err(legacy_err) => Err(DecryptError::AllPathsFailed {
                                threshold: threshold_err,
                                legacy: legacy_err.to_string(),
                            }),
                        }
                    }
                }
            }
        }
    }
}
