// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ApiError,
    models::{
        BalanceResponse, CreateEntryRequest, CreateEntryResponse, DecryptEntryRequest,
        DecryptEntryResponse, EntryView, ListEntriesResponse, PurchaseCompleteRequest,
        PurchaseCompleteResponse, PurchaseCreateRequest, PurchaseCreateResponse,
        RegisterUserRequest, RegisterUserResponse, ShopItem, SponsorCreateRequest,
        SponsorCreateResponse, SponsorExecuteRequest, SponsorExecuteResponse,
        SummaryCompleteRequest, SummaryCompleteResponse, SummaryCreateRequest,
        SummaryCreateResponse, TransactionTemplate, UserAddress,
    },
    state::AppState,
    storage::DbError,
};

pub mod balance;
pub mod entries;
pub mod health;
pub mod purchases;
pub mod sponsor;
pub mod summaries;
pub mod users;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/users", post(users::register_user))
        .route("/users/{address}", get(users::get_user))
        .route("/balance/{address}", get(balance::get_balance))
        .route("/sponsor/create", post(sponsor::create_sponsorship))
        .route("/sponsor/execute", post(sponsor::execute_sponsored))
        .route(
            "/entries",
            get(entries::list_entries).post(entries::create_entry),
        )
        .route("/entries/{entry_id}", get(entries::get_entry))
        .route("/entries/{entry_id}/decrypt", post(entries::decrypt_entry))
        .route("/shop", get(purchases::list_shop))
        .route("/purchases", get(purchases::list_purchases))
        .route("/purchases/create", post(purchases::create_purchase))
        .route("/purchases/complete", post(purchases::complete_purchase))
        .route("/summaries/create", post(summaries::create_summary))
        .route("/summaries/complete", post(summaries::complete_summary))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .with_state(state)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
}

/// Map database failures onto the API error taxonomy.
pub(crate) fn db_error(err: DbError) -> ApiError {
    match err {
        DbError::UserExists(_) => ApiError::conflict("User already registered"),
        DbError::EntryExists { date, .. } => {
            ApiError::conflict("Entry already exists for today").with_details(date)
        }
        DbError::NotFound(what) => ApiError::not_found("Not found").with_details(what),
        other => ApiError::internal("Database failure").with_details(other.to_string()),
    }
}

/// Map ledger failures, keeping the cached-vs-chain distinction visible.
pub(crate) fn ledger_error(err: crate::ledger::types::LedgerError) -> ApiError {
    use crate::ledger::types::LedgerError;
    match err {
        LedgerError::NoCoins { .. } => ApiError::bad_request("No tokens on blockchain"),
        LedgerError::InsufficientOnChain {
            needed,
            available,
            cached_mirror,
        } => {
            let detail = match cached_mirror {
                Some(mirror) if mirror != available => format!(
                    "needed {needed} base units, chain holds {available}, cached mirror believes {mirror}"
                ),
                _ => format!("needed {needed} base units, chain holds {available}"),
            };
            ApiError::bad_request("Insufficient on-chain balance").with_details(detail)
        }
        LedgerError::NoSingleCoinLargeEnough { needed, largest } => {
            ApiError::bad_request("No single coin large enough").with_details(format!(
                "needed {needed} base units in one coin, largest holds {largest}"
            ))
        }
        LedgerError::ExecutionFailed { digest, status } => ApiError::internal("Transaction failed")
            .with_details(format!("digest {digest}: {status}")),
        other => ApiError::internal("Ledger failure").with_details(other.to_string()),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        users::register_user,
        users::get_user,
        balance::get_balance,
        sponsor::create_sponsorship,
        sponsor::execute_sponsored,
        entries::create_entry,
        entries::list_entries,
        entries::get_entry,
        entries::decrypt_entry,
        purchases::list_shop,
        purchases::list_purchases,
        purchases::create_purchase,
        purchases::complete_purchase,
        summaries::create_summary,
        summaries::complete_summary
    ),
    components(
        schemas(
            health::HealthResponse,
            crate::storage::User,
            crate::storage::RewardRecord,
            crate::storage::PurchaseRecord,
            UserAddress,
            RegisterUserRequest,
            RegisterUserResponse,
            BalanceResponse,
            SponsorCreateRequest,
            SponsorCreateResponse,
            SponsorExecuteRequest,
            SponsorExecuteResponse,
            TransactionTemplate,
            CreateEntryRequest,
            CreateEntryResponse,
            EntryView,
            ListEntriesResponse,
            DecryptEntryRequest,
            DecryptEntryResponse,
            ShopItem,
            PurchaseCreateRequest,
            PurchaseCreateResponse,
            PurchaseCompleteRequest,
            PurchaseCompleteResponse,
            SummaryCreateRequest,
            SummaryCreateResponse,
            SummaryCompleteRequest,
            SummaryCompleteResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Users", description = "Registration and lookup"),
        (name = "Balance", description = "Cached vs on-chain balances"),
        (name = "Sponsor", description = "Gas-abstracted transactions"),
        (name = "Entries", description = "Encrypted diary entries"),
        (name = "Shop", description = "Token shop and purchases"),
        (name = "Summaries", description = "Paid summary generation")
    )
)]
pub struct ApiDoc;

// =============================================================================
// Test harness
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::extract::State;
    use axum::Json;
    use tokio_util::sync::CancellationToken;

    use crate::config::Config;
    use crate::economy::SettlementEngine;
    use crate::entries::EntryStore;
    use crate::ledger::accounting::TokenAccounting;
    use crate::ledger::client::LedgerClient;
    use crate::ledger::keys::OperatorKey;
    use crate::ledger::rpc::LedgerRpc;
    use crate::ledger::sponsor::SponsorService;
    use crate::ledger::tx::{FullTransaction, Operation, TransactionKind};
    use crate::ledger::types::{
        CoinObject, ExecutionStatus, LedgerError, LedgerSignature, ObjectRef, TransactionResult,
        LEDGER_TESTNET,
    };
    use crate::models::{RegisterUserRequest, RegisterUserResponse};
    use crate::sealing::MethodResolver;
    use crate::state::AppState;
    use crate::storage::BeastDatabase;

    pub const OPERATOR_HEX: &str =
        "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    pub const USER_KEY_HEX: &str =
        "8f2a559490d8e61c4e42faf3615d8b0f6b42ac5f84bb171c7f5eb2ab1fa2b1f0";
    pub const USER_ADDR: &str =
        "0x00000000000000000000000000000000000000000000000000000000000000a1";
    pub const GAS: &str = "0x2::gas::GAS";
    pub const DIARY: &str = "0x2::diary::DIARY";

    /// In-memory ledger: coins actually move when transactions execute, and
    /// every executed transaction is kept for digest lookups.
    pub struct TestRpc {
        coins: Mutex<HashMap<String, CoinObject>>,
        executed: Mutex<HashMap<String, TransactionResult>>,
        counter: AtomicU64,
    }

    impl TestRpc {
        fn new(operator: &str) -> Self {
            let rpc = Self {
                coins: Mutex::new(HashMap::new()),
                executed: Mutex::new(HashMap::new()),
                counter: AtomicU64::new(0),
            };
            rpc.add_coin(operator, GAS, 1_000_000_000_000);
            rpc.add_coin(operator, DIARY, 1_000_000_000_000_000);
            rpc
        }

        pub fn add_coin(&self, owner: &str, coin_type: &str, balance: u64) -> String {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            let id = format!("0xc{n}");
            self.coins.lock().unwrap().insert(
                id.clone(),
                CoinObject {
                    object_ref: ObjectRef {
                        object_id: id.clone(),
                        version: 1,
                        digest: format!("objd{n}"),
                    },
                    owner: owner.to_string(),
                    coin_type: coin_type.to_string(),
                    balance,
                },
            );
            id
        }

        fn next_digest(&self) -> String {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            format!("0xdigest{n}")
        }

        /// Sum of an owner's on-chain coins of one type.
        pub fn total_balance(&self, owner: &str, coin_type: &str) -> u64 {
            self.coins
                .lock()
                .unwrap()
                .values()
                .filter(|c| c.owner == owner && c.coin_type == coin_type)
                .map(|c| c.balance)
                .sum()
        }
    }

    #[async_trait]
    impl LedgerRpc for TestRpc {
        async fn owned_coins(
            &self,
            owner: &str,
            coin_type: &str,
        ) -> Result<Vec<CoinObject>, LedgerError> {
            Ok(self
                .coins
                .lock()
                .unwrap()
                .values()
                .filter(|c| c.owner == owner && c.coin_type == coin_type)
                .cloned()
                .collect())
        }

        async fn get_object(&self, object_id: &str) -> Result<CoinObject, LedgerError> {
            self.coins
                .lock()
                .unwrap()
                .get(object_id)
                .cloned()
                .ok_or_else(|| LedgerError::Rpc(format!("no object {object_id}")))
        }

        async fn execute(
            &self,
            tx_bytes: &[u8],
            _signatures: &[LedgerSignature],
        ) -> Result<TransactionResult, LedgerError> {
            let full: FullTransaction = serde_json::from_slice(tx_bytes)
                .map_err(|e| LedgerError::MalformedTransaction(e.to_string()))?;
            let mut coins = self.coins.lock().unwrap();
            let status = match &full.kind.operation {
                Operation::TransferCoin {
                    coin,
                    amount,
                    recipient,
                } => {
                    let source = coins
                        .get_mut(&coin.object_id)
                        .ok_or_else(|| LedgerError::Rpc("no such coin".into()))?;
                    if source.balance < *amount {
                        ExecutionStatus::Failure("insufficient balance".into())
                    } else {
                        source.balance -= amount;
                        source.object_ref.version += 1;
                        let coin_type = source.coin_type.clone();
                        let amount = *amount;
                        let recipient = recipient.clone();
                        let n = self.counter.fetch_add(1, Ordering::SeqCst);
                        let id = format!("0xc{n}");
                        coins.insert(
                            id.clone(),
                            CoinObject {
                                object_ref: ObjectRef {
                                    object_id: id,
                                    version: 1,
                                    digest: format!("objd{n}"),
                                },
                                owner: recipient,
                                coin_type,
                                balance: amount,
                            },
                        );
                        ExecutionStatus::Success
                    }
                }
                Operation::BurnCoin { coin, amount } => {
                    let source = coins
                        .get_mut(&coin.object_id)
                        .ok_or_else(|| LedgerError::Rpc("no such coin".into()))?;
                    if source.balance < *amount {
                        ExecutionStatus::Failure("insufficient balance".into())
                    } else {
                        source.balance -= amount;
                        source.object_ref.version += 1;
                        ExecutionStatus::Success
                    }
                }
                Operation::AuthorizeDecrypt { .. } => ExecutionStatus::Success,
            };
            drop(coins);

            let result = TransactionResult {
                digest: self.next_digest(),
                status,
                tx_bytes: Some(hex::encode(tx_bytes)),
            };
            self.executed
                .lock()
                .unwrap()
                .insert(result.digest.clone(), result.clone());
            Ok(TransactionResult {
                tx_bytes: None,
                ..result
            })
        }

        async fn get_transaction(&self, digest: &str) -> Result<TransactionResult, LedgerError> {
            if digest == "0xfailed" {
                return Ok(TransactionResult {
                    digest: digest.to_string(),
                    status: ExecutionStatus::Failure("aborted".into()),
                    tx_bytes: None,
                });
            }
            self.executed
                .lock()
                .unwrap()
                .get(digest)
                .cloned()
                .ok_or_else(|| LedgerError::Rpc(format!("unknown digest {digest}")))
        }
    }

    pub struct Harness {
        pub state: AppState,
        pub ledger: Arc<TestRpc>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        pub async fn register(&self) -> RegisterUserResponse {
            register(&self.state).await
        }

        /// Drop a coin straight into the user's on-chain account, bypassing
        /// the cached mirror.
        pub fn fund_user(&self, balance: u64) -> String {
            self.ledger.add_coin(USER_ADDR, DIARY, balance)
        }

        /// Run a real sponsored burn through the full five-phase flow and
        /// return its digest. The user side is co-signed with the test
        /// wallet key.
        pub async fn settle_burn(&self, amount: u64) -> String {
            let coins = self
                .ledger
                .owned_coins(USER_ADDR, DIARY)
                .await
                .expect("owned coins");
            let coin = coins
                .iter()
                .find(|c| c.balance >= amount)
                .expect("coin large enough")
                .clone();

            let kind = TransactionKind {
                sender: USER_ADDR.to_string(),
                operation: Operation::BurnCoin {
                    coin: coin.object_ref,
                    amount,
                },
            };
            let envelope = self
                .state
                .sponsor
                .sponsor(&kind.to_kind_bytes(), USER_ADDR, &self.state.shutdown)
                .await
                .expect("sponsorship succeeds");
            let user_key = OperatorKey::load(USER_KEY_HEX).expect("test wallet key");
            let user_signature = user_key.sign(envelope.tx_bytes());
            let result = self
                .state
                .sponsor
                .execute(
                    envelope.tx_bytes().to_vec(),
                    user_signature,
                    envelope.sponsor_signature().clone(),
                )
                .await
                .expect("execution succeeds");
            result.digest
        }
    }

    pub async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("beast.redb");

        let operator = OperatorKey::load(OPERATOR_HEX).unwrap();
        let ledger = Arc::new(TestRpc::new(operator.address()));
        let client = Arc::new(LedgerClient::new(LEDGER_TESTNET, ledger.clone()));
        let sponsor = Arc::new(SponsorService::new(
            client.clone(),
            operator,
            GAS,
            10_000_000,
        ));
        let token = Arc::new(TokenAccounting::new(client.clone(), DIARY));
        let settlement = Arc::new(SettlementEngine::new(
            sponsor.clone(),
            token.clone(),
            client.clone(),
        ));

        let config = Config {
            data_dir: db_path.parent().unwrap().display().to_string(),
            host: "127.0.0.1".into(),
            port: 0,
            operator_key: OPERATOR_HEX.to_string(),
            ledger_rpc_url: "http://localhost:9000".into(),
            token_type: DIARY.to_string(),
            gas_token_type: GAS.to_string(),
            gas_budget: 10_000_000,
            blob_publisher_url: None,
            blob_aggregator_url: None,
            blob_epochs: 5,
            key_service_url: None,
            threshold_package_id: None,
        };

        let state = AppState {
            config: Arc::new(config),
            db: Arc::new(BeastDatabase::open(&db_path).unwrap()),
            client,
            sponsor,
            token,
            entry_store: Arc::new(EntryStore::new(None, 5)),
            resolver: Arc::new(MethodResolver::new(None)),
            settlement,
            shutdown: CancellationToken::new(),
        };
        Harness {
            state,
            ledger,
            _dir: dir,
        }
    }

    pub async fn register(state: &AppState) -> RegisterUserResponse {
        super::users::register_user(
            State(state.clone()),
            Json(RegisterUserRequest {
                user_address: USER_ADDR.to_string(),
            }),
        )
        .await
        .expect("registration succeeds")
        .0
    }
}
