//! # Ledger Configuration
//!
//! Runtime knobs that change who may do what. Everything else about the
//! ledger is fixed.

use serde::{Deserialize, Serialize};

use dbb_core::Address;
use dbb_state::Project;

/// Who may open a dispute on a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeRaisePolicy {
    /// The project owner, or the selected bidder once one exists.
    #[default]
    OwnerOrSelectedBidder,
    /// Only the selected bidder. Nobody may raise before selection.
    SelectedBidderOnly,
}

impl DisputeRaisePolicy {
    /// Whether `caller` may raise a dispute on `project` under this policy.
    pub fn permits(&self, project: &Project, caller: &Address) -> bool {
        let is_selected = project.selected_bidder() == Some(caller);
        match self {
            Self::OwnerOrSelectedBidder => is_selected || project.owner == *caller,
            Self::SelectedBidderOnly => is_selected,
        }
    }

    /// Human-readable requirement, used in `Unauthorized` reasons.
    pub fn requirement(&self) -> &'static str {
        match self {
            Self::OwnerOrSelectedBidder => "only the project owner or the selected bidder may raise a dispute",
            Self::SelectedBidderOnly => "only the selected bidder may raise a dispute",
        }
    }

    /// The snake_case name used in configuration files and environment variables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OwnerOrSelectedBidder => "owner_or_selected_bidder",
            Self::SelectedBidderOnly => "selected_bidder_only",
        }
    }
}

impl std::fmt::Display for DisputeRaisePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DisputeRaisePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "owner_or_selected_bidder" => Ok(Self::OwnerOrSelectedBidder),
            "selected_bidder_only" => Ok(Self::SelectedBidderOnly),
            other => Err(format!(
                "unknown dispute raise policy {other:?}; expected \
                 owner_or_selected_bidder or selected_bidder_only"
            )),
        }
    }
}

/// Ledger configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub dispute_raise_policy: DisputeRaisePolicy,
}
