// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use diarybeast_server::api::router;
use diarybeast_server::config::Config;
use diarybeast_server::economy::SettlementEngine;
use diarybeast_server::entries::{BlobStore, EntryStore, HttpBlobStore};
use diarybeast_server::ledger::accounting::TokenAccounting;
use diarybeast_server::ledger::client::{ClientCache, LedgerClient};
use diarybeast_server::ledger::keys::OperatorKey;
use diarybeast_server::ledger::rpc::HttpLedgerRpc;
use diarybeast_server::ledger::sponsor::SponsorService;
use diarybeast_server::ledger::types::LEDGER_TESTNET;
use diarybeast_server::sealing::resolver::{HttpThresholdDecrypt, ThresholdDecrypt};
use diarybeast_server::sealing::MethodResolver;
use diarybeast_server::state::AppState;
use diarybeast_server::storage::BeastDatabase;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,diarybeast_server=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = Config::from_env().expect("Failed to load configuration");

    let operator = OperatorKey::load(&config.operator_key).expect("Failed to load operator key");
    tracing::info!(operator = %operator.address(), "Operator key loaded");

    let http = reqwest::Client::new();
    let rpc = Arc::new(
        HttpLedgerRpc::new(&config.ledger_rpc_url, http).expect("Invalid ledger RPC URL"),
    );
    let clients = ClientCache::new(4);
    let client = clients.get_or_create(&config.ledger_rpc_url, &operator.fingerprint(), || {
        LedgerClient::new(LEDGER_TESTNET, rpc)
    });
    let sponsor = Arc::new(SponsorService::new(
        client.clone(),
        operator,
        config.gas_token_type.clone(),
        config.gas_budget,
    ));
    let token = Arc::new(TokenAccounting::new(
        client.clone(),
        config.token_type.clone(),
    ));
    let settlement = Arc::new(SettlementEngine::new(
        sponsor.clone(),
        token.clone(),
        client.clone(),
    ));

    let blob: Option<Arc<dyn BlobStore>> =
        match (&config.blob_publisher_url, &config.blob_aggregator_url) {
            (Some(publisher), Some(aggregator)) => {
                tracing::info!(%publisher, %aggregator, "Blob storage tier enabled");
                Some(Arc::new(HttpBlobStore::new(
                    publisher.clone(),
                    aggregator.clone(),
                )))
            }
            _ => {
                tracing::info!("Blob storage tier not configured, entries stored inline");
                None
            }
        };
    let entry_store = Arc::new(EntryStore::new(blob, config.blob_epochs));

    let threshold: Option<Arc<dyn ThresholdDecrypt>> = config
        .key_service_url
        .as_ref()
        .map(|url| Arc::new(HttpThresholdDecrypt::new(url.clone())) as Arc<dyn ThresholdDecrypt>);
    let resolver = Arc::new(MethodResolver::new(threshold));

    let db_path = Path::new(&config.data_dir).join("diarybeast.redb");
    let db = Arc::new(BeastDatabase::open(&db_path).expect("Failed to open database"));
    tracing::info!(path = %db_path.display(), "Database opened");

    let shutdown = CancellationToken::new();
    let state = AppState {
        config: Arc::new(config.clone()),
        db,
        client,
        sponsor,
        token,
        entry_store,
        resolver,
        settlement,
        shutdown: shutdown.clone(),
    };
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!("DiaryBeast server listening on http://{addr} (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("Server failed");
}

/// Resolve on SIGINT/SIGTERM, cancelling in-flight retry loops first.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(%err, "Failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
