// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup. Missing
//! required values produce an error that names the absent variable, never a
//! generic failure.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory for the embedded database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `OPERATOR_KEY` | Sponsor signing key (hex or PEM) | Required |
//! | `LEDGER_RPC_URL` | Ledger JSON-RPC endpoint | Required |
//! | `TOKEN_TYPE` | Type tag of the DIARY token coin objects | Required |
//! | `GAS_TOKEN_TYPE` | Type tag of the gas-currency coin objects | Required |
//! | `GAS_BUDGET` | Fixed gas budget for sponsored transactions | `10000000` |
//! | `BLOB_PUBLISHER_URL` | Blob-tier write endpoint | Optional (inline tier if unset) |
//! | `BLOB_AGGREGATOR_URL` | Blob-tier read endpoint | Optional |
//! | `BLOB_EPOCHS` | Retention period for stored blobs | `5` |
//! | `KEY_SERVICE_URL` | Threshold-decrypt key service endpoint | Optional |
//! | `THRESHOLD_PACKAGE_ID` | Access-policy package for threshold entries | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;

/// Environment variable name for the embedded database directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the operator (sponsor) signing key.
pub const OPERATOR_KEY_ENV: &str = "OPERATOR_KEY";

/// Environment variable name for the ledger RPC endpoint.
pub const LEDGER_RPC_URL_ENV: &str = "LEDGER_RPC_URL";

/// Environment variable name for the DIARY token type tag.
pub const TOKEN_TYPE_ENV: &str = "TOKEN_TYPE";

/// Environment variable name for the gas-currency type tag.
pub const GAS_TOKEN_TYPE_ENV: &str = "GAS_TOKEN_TYPE";

/// Default fixed gas budget attached by the sponsor (base units).
pub const DEFAULT_GAS_BUDGET: u64 = 10_000_000;

/// Default blob retention period in epochs.
pub const DEFAULT_BLOB_EPOCHS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Loaded runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    pub host: String,
    pub port: u16,
    /// Raw operator key material (hex or PEM); parsed by `ledger::keys`.
    pub operator_key: String,
    pub ledger_rpc_url: String,
    pub token_type: String,
    pub gas_token_type: String,
    pub gas_budget: u64,
    pub blob_publisher_url: Option<String>,
    pub blob_aggregator_url: Option<String>,
    pub blob_epochs: u32,
    pub key_service_url: Option<String>,
    pub threshold_package_id: Option<String>,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let optional = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        let port = optional("PORT")
            .map(|v| {
                v.parse::<u16>().map_err(|e| ConfigError::Invalid {
                    name: "PORT",
                    reason: e.to_string(),
                })
            })
            .transpose()?
            .unwrap_or(8080);

        let gas_budget = optional("GAS_BUDGET")
            .map(|v| {
                v.parse::<u64>().map_err(|e| ConfigError::Invalid {
                    name: "GAS_BUDGET",
                    reason: e.to_string(),
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_GAS_BUDGET);

        let blob_epochs = optional("BLOB_EPOCHS")
            .map(|v| {
                v.parse::<u32>().map_err(|e| ConfigError::Invalid {
                    name: "BLOB_EPOCHS",
                    reason: e.to_string(),
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_BLOB_EPOCHS);

        Ok(Self {
            data_dir: optional(DATA_DIR_ENV).unwrap_or_else(|| "/data".to_string()),
            host: optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            operator_key: required(OPERATOR_KEY_ENV)?,
            ledger_rpc_url: required(LEDGER_RPC_URL_ENV)?,
            token_type: required(TOKEN_TYPE_ENV)?,
            gas_token_type: required(GAS_TOKEN_TYPE_ENV)?,
            gas_budget,
            blob_publisher_url: optional("BLOB_PUBLISHER_URL"),
            blob_aggregator_url: optional("BLOB_AGGREGATOR_URL"),
            blob_epochs,
            key_service_url: optional("KEY_SERVICE_URL"),
            threshold_package_id: optional("THRESHOLD_PACKAGE_ID"),
        })
    }

    /// Whether the blob storage tier is configured for writes.
    pub fn blob_tier_enabled(&self) -> bool {
        self.blob_publisher_url.is_some() && self.blob_aggregator_url.is_some()
    }
}
