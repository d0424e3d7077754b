// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::economy::SettlementEngine;
use crate::entries::EntryStore;
use crate::ledger::accounting::TokenAccounting;
use crate::ledger::client::LedgerClient;
use crate::ledger::sponsor::SponsorService;
use crate::sealing::MethodResolver;
use crate::storage::BeastDatabase;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<BeastDatabase>,
    pub client: Arc<LedgerClient>,
    pub sponsor: Arc<SponsorService>,
    pub token: Arc<TokenAccounting>,
    pub entry_store: Arc<EntryStore>,
    pub resolver: Arc<MethodResolver>,
    pub settlement: Arc<SettlementEngine>,
    /// Cancelled on shutdown; in-flight retry loops observe it.
    pub shutdown: CancellationToken,
}
