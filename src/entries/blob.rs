// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! External blob storage client.
//!
//! Blobs hold entry ciphertext off the database. Writes go to the publisher
//! endpoint, reads come back through the aggregator.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob publisher request failed: {0}")]
    Publish(String),
    #[error("blob aggregator request failed: {0}")]
    Fetch(String),
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("malformed blob service response: {0}")]
    Malformed(String),
}

/// Receipt returned by the publisher after a successful store.
#[derive(Debug, Clone)]
pub struct BlobReceipt {
    pub blob_id: String,
    /// Digest of the registration transaction, when the publisher reports
    /// a fresh upload rather than a deduplicated hit.
    pub tx_digest: Option<String>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, payload: &[u8], epochs: u32) -> Result<BlobReceipt, BlobError>;
    async fn fetch(&self, blob_id: &str) -> Result<Vec<u8>, BlobError>;
}

/// HTTP publisher/aggregator pair.
pub struct HttpBlobStore {
    http: reqwest::Client,
    publisher_url: String,
    aggregator_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewlyCreated {
    blob_object: BlobObject,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobObject {
    blob_id: String,
    #[serde(default)]
    tx_digest: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlreadyCertified {
    blob_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
enum PublishResponse {
    NewlyCreated(NewlyCreated),
    AlreadyCertified(AlreadyCertified),
}

impl HttpBlobStore {
    pub fn new(publisher_url: String, aggregator_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            publisher_url: publisher_url.trim_end_matches('/').to_string(),
            aggregator_url: aggregator_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn store(&self, payload: &[u8], epochs: u32) -> Result<BlobReceipt, BlobError> {
        let url = format!("{}/v1/blobs?epochs={epochs}", self.publisher_url);
        let response = self
            .http
            .put(&url)
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|err| BlobError::Publish(err.to_string()))?;
        if !response.status().is_success() {
            return Err(BlobError::Publish(format!(
                "publisher returned {}",
                response.status()
            )));
        }
        let parsed: PublishResponse = response
            .json()
            .await
            .map_err(|err| BlobError::Malformed(err.to_string()))?;
        Ok(match parsed {
            PublishResponse::NewlyCreated(n) => BlobReceipt {
                blob_id: n.blob_object.blob_id,
                tx_digest: n.blob_object.tx_digest,
            },
            PublishResponse::AlreadyCertified(a) => BlobReceipt {
                blob_id: a.blob_id,
                tx_digest: None,
            },
        })
    }

    async fn fetch(&self, blob_id: &str) -> Result<Vec<u8>, BlobError> {
        let url = format!("{}/v1/blobs/{blob_id}", self.aggregator_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| BlobError::Fetch(err.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BlobError::NotFound(blob_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(BlobError::Fetch(format!(
                "aggregator returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| BlobError::Fetch(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}
