// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! DiaryBeast Server - Gamified Journaling Backend
//!
//! Settles the token economy of the DiaryBeast journaling app over a
//! coin-object ledger: sponsored (gas-abstracted) transactions, dual-tier
//! encrypted entry storage, and idempotent reward settlement.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `ledger` - Coin-object ledger client, sponsorship protocol, accounting
//! - `entries` - Blob/inline ciphertext placement
//! - `sealing` - Legacy and threshold encryption paths
//! - `economy` - Reward schedule, streaks, settlement
//! - `storage` - Embedded relational store (redb)

pub mod api;
pub mod config;
pub mod economy;
pub mod entries;
pub mod error;
pub mod ledger;
pub mod models;
pub mod sealing;
pub mod state;
pub mod storage;
