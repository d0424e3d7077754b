// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Tiered ciphertext placement.
//!
//! When a blob backend is configured new entries go to blob storage;
//! otherwise ciphertext is stored inline. Exactly one of the two locations
//! is populated per record. A blob write failure fails the whole submission,
//! it is never silently downgraded to inline. An inline copy on a blob
//! record only exists on rows migrated from older deployments; reads may
//! fall back to it but never write one. Reads are side-effect-free: a
//! fallback read does not rewrite the stored record.

use std::sync::Arc;

use thiserror::Error;

use super::blob::{BlobError, BlobStore};
use crate::storage::{EntryContent, EntryRecord};

#[derive(Debug, Error)]
pub enum EntryStoreError {
    #[error(transparent)]
    Blob(#[from] BlobError),
    #[error("entry {entry_id} is unreadable: blob fetch failed ({reason}) and no inline fallback exists")]
    Unreadable { entry_id: String, reason: String },
}

pub struct EntryStore {
    blob: Option<Arc<dyn BlobStore>>,
    epochs: u32,
}

impl EntryStore {
    pub fn new(blob: Option<Arc<dyn BlobStore>>, epochs: u32) -> Self {
        Self { blob, epochs }
    }

    pub fn blob_tier_enabled(&self) -> bool {
        self.blob.is_some()
    }

    /// Place ciphertext according to the configured tier.
    pub async fn write(&self, ciphertext: Vec<u8>) -> Result<EntryContent, EntryStoreError> {
        match &self.blob {
            Some(store) => {
                let receipt = store.store(&ciphertext, self.epochs).await?;
                // Inline copies on blob records are migration artifacts only.
                Ok(EntryContent::Blob {
                    blob_id: receipt.blob_id,
                    blob_tx_digest: receipt.tx_digest,
                    inline_fallback: None,
                })
            }
            None => Ok(EntryContent::Inline { ciphertext }),
        }
    }

    /// Load an entry's ciphertext, falling back to the inline copy when the
    /// blob tier cannot serve it.
    pub async fn read(&self, entry: &EntryRecord) -> Result<Vec<u8>, EntryStoreError> {
        match &entry.content {
            EntryContent::Inline { ciphertext } => Ok(ciphertext.clone()),
            EntryContent::Blob {
                blob_id,
                inline_fallback,
                ..
            } => {
                let fetched = match &self.blob {
                    Some(store) => store.fetch(blob_id).await,
                    None => Err(BlobError::Fetch("no blob backend configured".into())),
                };
                match fetched {
                    Ok(bytes) => Ok(bytes),
                    Err(err) => match inline_fallback {
                        Some(fallback) => {
                            tracing::warn!(
                                entry_id = %entry.id,
                                blob_id = %blob_id,
                                error = %err,
                                "blob fetch failed, serving inline fallback"
                            );
                            Ok(fallback.clone())
                        }
                        None => Err(EntryStoreError::Unreadable {
                            entry_id: entry.id.clone(),
                            reason: err.to_string(),
                        }),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::blob::BlobReceipt;
    use crate::sealing::EncryptionEnvelope;
    use async_trait::async_trait;
    use chrono::Utc;

    struct FakeBlobStore {
        fail_store: bool,
        fail_fetch: bool,
        payload: Vec<u8>,
    }

    #[async_trait]
    impl BlobStore for FakeBlobStore {
        async fn store(&self, _payload: &[u8], _epochs: u32) -> Result<BlobReceipt, BlobError> {
            if self.fail_store {
                return Err(BlobError::Publish("publisher down".into()));
            }
            Ok(BlobReceipt {
                blob_id: "blob-1".into(),
                tx_digest: Some("0xblobtx".into()),
            })
        }

        async fn fetch(&self, blob_id: &str) -> Result<Vec<u8>, BlobError> {
            if self.fail_fetch {
                return Err(BlobError::NotFound(blob_id.to_string()));
            }
            Ok(self.payload.clone())
        }
    }

    fn record(content: EntryContent) -> EntryRecord {
        EntryRecord {
            id: "e1".into(),
            user_address: "0xa1".into(),
            date: chrono::NaiveDate::from_ymd_opt(2026, 8, 30).unwrap(),
            word_count: 1,
            content,
            signature: "sig".into(),
            content_hash: "hash".into(),
            encryption: EncryptionEnvelope::Legacy,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn inline_tier_when_no_blob_backend() {
        let store = EntryStore::new(None, 5);
        let content = store.write(vec![1, 2, 3]).await.unwrap();
        assert!(matches!(content, EntryContent::Inline { .. }));
    }

    #[tokio::test]
    async fn blob_tier_stores_no_inline_copy() {
        let store = EntryStore::new(
            Some(Arc::new(FakeBlobStore {
                fail_store: false,
                fail_fetch: false,
                payload: vec![],
            })),
            5,
        );
        let content = store.write(vec![7, 8]).await.unwrap();
        match content {
            EntryContent::Blob {
                blob_id,
                blob_tx_digest,
                inline_fallback,
            } => {
                assert_eq!(blob_id, "blob-1");
                assert_eq!(blob_tx_digest.as_deref(), Some("0xblobtx"));
                assert!(inline_fallback.is_none());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn blob_write_failure_is_terminal() {
        let store = EntryStore::new(
            Some(Arc::new(FakeBlobStore {
                fail_store: true,
                fail_fetch: false,
                payload: vec![],
            })),
            5,
        );
        let err = store.write(vec![1]).await.unwrap_err();
        assert!(matches!(err, EntryStoreError::Blob(BlobError::Publish(_))));
    }

    #[tokio::test]
    async fn blob_read_prefers_the_blob_tier() {
        let store = EntryStore::new(
            Some(Arc::new(FakeBlobStore {
                fail_store: false,
                fail_fetch: false,
                payload: vec![9, 9],
            })),
            5,
        );
        let entry = record(EntryContent::Blob {
            blob_id: "blob-1".into(),
            blob_tx_digest: None,
            inline_fallback: Some(vec![1, 1]),
        });
        assert_eq!(store.read(&entry).await.unwrap(), vec![9, 9]);
    }

    #[tokio::test]
    async fn failed_fetch_serves_the_fallback() {
        let store = EntryStore::new(
            Some(Arc::new(FakeBlobStore {
                fail_store: false,
                fail_fetch: true,
                payload: vec![],
            })),
            5,
        );
        let entry = record(EntryContent::Blob {
            blob_id: "blob-1".into(),
            blob_tx_digest: None,
            inline_fallback: Some(vec![1, 1]),
        });
        assert_eq!(store.read(&entry).await.unwrap(), vec![1, 1]);
    }

    #[tokio::test]
    async fn failed_fetch_without_fallback_names_the_entry() {
        let store = EntryStore::new(
            Some(Arc::new(FakeBlobStore {
                fail_store: false,
                fail_fetch: true,
                payload: vec![],
            })),
            5,
        );
        let entry = record(EntryContent::Blob {
            blob_id: "blob-1".into(),
            blob_tx_digest: None,
            inline_fallback: None,
        });
        let err = store.read(&entry).await.unwrap_err();
        assert!(err.to_string().contains("e1"));
    }
}
