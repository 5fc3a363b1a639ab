//! # dbb-cli: Command-Line Tool for the Design-Bid-Build Ledger
//!
//! Provides the `dbb` binary.
//!
//! ## Subcommands
//!
//! - `dbb scenario run <file>`: replay a YAML scenario against a fresh
//!   ledger and print the final state as JSON.
//! - `dbb scenario check <file>`: parse and validate a scenario only.
//!
//! ```bash
//! dbb -v --config ledger.yaml scenario run contract.yaml
//! ```

pub mod scenario;

use std::path::Path;

use anyhow::{Context, Result};
use dbb_ledger::LedgerConfig;

/// Load a [`LedgerConfig`] from YAML, or the default when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<LedgerConfig> {
    let Some(path) = path else {
        return Ok(LedgerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: LedgerConfig = serde_yaml::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    tracing::debug!(path = %path.display(), policy = %config.dispute_raise_policy, "loaded config");
    Ok(config)
}
