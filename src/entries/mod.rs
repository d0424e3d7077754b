// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Diary entry ciphertext placement: blob tier and inline tier.

pub mod blob;
pub mod store;

pub use blob::{BlobError, BlobReceipt, BlobStore, HttpBlobStore};
pub use store::{EntryStore, EntryStoreError};
