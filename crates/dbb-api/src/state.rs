//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! The ledger is synchronous and uses `parking_lot` locks internally.
//! Handlers call it directly; no lock is ever held across an `.await`.

use std::sync::Arc;

use dbb_ledger::{AccountBook, DisputeRaisePolicy, Ledger, LedgerConfig};
use thiserror::Error;

use crate::middleware::metrics::ApiMetrics;

/// Server configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token guarding `/v1`. `None` disables authentication.
    pub auth_token: Option<String>,
    /// Ledger runtime configuration.
    pub ledger: LedgerConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("ledger", &self.ledger)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            ledger: LedgerConfig::default(),
        }
    }
}

/// Invalid environment configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PORT must be a port number, got {0:?}")]
    InvalidPort(String),

    #[error("DBB_DISPUTE_RAISE_POLICY: {0}")]
    InvalidPolicy(String),
}

impl AppConfig {
    /// Read `PORT`, `AUTH_TOKEN` and `DBB_DISPUTE_RAISE_POLICY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset variables take
    /// their defaults; an empty `AUTH_TOKEN` counts as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("PORT") {
            config.port = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?;
        }
        config.auth_token = lookup("AUTH_TOKEN").filter(|t| !t.is_empty());
        if let Some(raw) = lookup("DBB_DISPUTE_RAISE_POLICY") {
            config.ledger.dispute_raise_policy = raw
                .parse::<DisputeRaisePolicy>()
                .map_err(ConfigError::InvalidPolicy)?;
        }
        Ok(config)
    }
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub ledger: Arc<Ledger>,
    /// Recipient balances credited by milestone releases.
    pub accounts: Arc<AccountBook>,
    pub metrics: ApiMetrics,
}

impl AppState {
    /// State with default configuration and an empty ledger.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// State with the given configuration and an empty ledger.
    pub fn with_config(config: AppConfig) -> Self {
        let (ledger, accounts) = Ledger::with_account_book(config.ledger.clone());
        Self {
            config,
            ledger: Arc::new(ledger),
            accounts,
            metrics: ApiMetrics::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
