//! # Scenario Subcommand
//!
//! Replays a contracting scenario against a fresh in-memory ledger.
//!
//! ## File format
//!
//! ```yaml
//! name: school roof
//! steps:
//!   - op: deposit
//!     from: funder
//!     amount: 1000
//!   - op: post
//!     owner: owner
//!     budget: 600
//!     milestones: [100, 200, 300]
//!   - op: bid
//!     bidder: builder
//!     project: 1
//!     amount: 590
//!     milestones: [90, 200, 300]
//!   - op: select
//!     caller: owner
//!     project: 1
//!     bid: 0
//!   - op: release
//!     caller: mallory
//!     project: 1
//!     milestone: 0
//!     expect_error: unauthorized
//! ```
//!
//! Every step either succeeds or, when it declares `expect_error`, fails
//! with exactly that error kind. The first step that does otherwise stops
//! the run. `refuse` and `accept` toggle whether a recipient account
//! accepts transfers, to exercise the rollback path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dbb_core::{Address, Amount, DisputeId, ErrorKind, EventRecord, LedgerError, ProjectId};
use dbb_ledger::{AccountBook, Ledger, LedgerConfig};
use dbb_state::{Bid, Dispute, Project};

// ── CLI ─────────────────────────────────────────────────────────────────────

/// Arguments for the `dbb scenario` subcommand.
#[derive(Args, Debug)]
pub struct ScenarioArgs {
    #[command(subcommand)]
    pub command: ScenarioCommand,
}

/// Scenario subcommands.
#[derive(Subcommand, Debug)]
pub enum ScenarioCommand {
    /// Replay a scenario and print the final ledger state as JSON.
    Run {
        /// Scenario file (YAML).
        file: PathBuf,
        /// Write the report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Parse and validate a scenario without running it.
    Check {
        /// Scenario file (YAML).
        file: PathBuf,
    },
}

/// Execute the scenario subcommand.
pub fn run_scenario(args: &ScenarioArgs, config: LedgerConfig) -> Result<u8> {
    match &args.command {
        ScenarioCommand::Run { file, output } => cmd_run(file, output.as_deref(), config),
        ScenarioCommand::Check { file } => cmd_check(file),
    }
}

fn cmd_run(file: &Path, output: Option<&Path>, config: LedgerConfig) -> Result<u8> {
    let scenario = Scenario::load(file)?;
    let report = scenario
        .run(config)
        .with_context(|| format!("scenario {} failed", file.display()))?;
    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    match output {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(0)
}

fn cmd_check(file: &Path) -> Result<u8> {
    let scenario = Scenario::load(file)?;
    println!(
        "OK: {} ({} steps)",
        scenario.name.as_deref().unwrap_or("unnamed scenario"),
        scenario.steps.len()
    );
    Ok(0)
}

// ── Scenario model ──────────────────────────────────────────────────────────

/// Scenario failure.
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("invalid scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("scenario has no steps")]
    Empty,

    #[error("step {step} ({op}) failed: {source}")]
    StepFailed {
        step: usize,
        op: &'static str,
        source: LedgerError,
    },

    #[error("step {step} ({op}) succeeded but {expected} was expected")]
    UnexpectedSuccess {
        step: usize,
        op: &'static str,
        expected: ErrorKind,
    },

    #[error("step {step} ({op}) failed with {found} but {expected} was expected: {source}")]
    WrongError {
        step: usize,
        op: &'static str,
        expected: ErrorKind,
        found: ErrorKind,
        source: LedgerError,
    },
}

/// A named list of steps.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<Step>,
}

/// One ledger call and its expected outcome.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    /// The error kind this step must fail with. Absent means it must succeed.
    #[serde(default)]
    pub expect_error: Option<ErrorKind>,
}

/// A ledger call. Ids are the raw numbers the ledger assigned.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Deposit {
        from: Address,
        amount: Amount,
    },
    Post {
        owner: Address,
        #[serde(default)]
        description: String,
        budget: Amount,
        #[serde(default)]
        deadline: u64,
        milestones: Vec<Amount>,
    },
    Bid {
        bidder: Address,
        project: u64,
        amount: Amount,
        #[serde(default)]
        completion_time: u64,
        milestones: Vec<Amount>,
    },
    Select {
        caller: Address,
        project: u64,
        bid: usize,
    },
    Release {
        caller: Address,
        project: u64,
        milestone: usize,
    },
    Raise {
        caller: Address,
        project: u64,
        #[serde(default)]
        reason: String,
    },
    Vote {
        voter: Address,
        dispute: u64,
        vote: bool,
    },
    Refuse {
        address: Address,
    },
    Accept {
        address: Address,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::Post { .. } => "post",
            Self::Bid { .. } => "bid",
            Self::Select { .. } => "select",
            Self::Release { .. } => "release",
            Self::Raise { .. } => "raise",
            Self::Vote { .. } => "vote",
            Self::Refuse { .. } => "refuse",
            Self::Accept { .. } => "accept",
        }
    }

    fn apply(&self, ledger: &Ledger, accounts: &AccountBook) -> Result<(), LedgerError> {
        match self {
            Self::Deposit { from, amount } => ledger.deposit(from, *amount).map(drop),
            Self::Post {
                owner,
                description,
                budget,
                deadline,
                milestones,
            } => ledger
                .post_project(
                    owner.clone(),
                    description.clone(),
                    *budget,
                    *deadline,
                    milestones.clone(),
                )
                .map(drop),
            Self::Bid {
                bidder,
                project,
                amount,
                completion_time,
                milestones,
            } => ledger
                .submit_bid(
                    bidder,
                    ProjectId::new(*project),
                    *amount,
                    *completion_time,
                    milestones.clone(),
                )
                .map(drop),
            Self::Select {
                caller,
                project,
                bid,
            } => ledger.select_bid(caller, ProjectId::new(*project), *bid),
            Self::Release {
                caller,
                project,
                milestone,
            } => ledger
                .release_milestone_payment(caller, ProjectId::new(*project), *milestone)
                .map(drop),
            Self::Raise {
                caller,
                project,
                reason,
            } => ledger
                .raise_dispute(caller, ProjectId::new(*project), reason.clone())
                .map(drop),
            Self::Vote {
                voter,
                dispute,
                vote,
            } => ledger
                .vote_on_dispute(voter, DisputeId::new(*dispute), *vote)
                .map(drop),
            Self::Refuse { address } => {
                accounts.refuse(address.clone());
                Ok(())
            }
            Self::Accept { address } => {
                accounts.accept(address);
                Ok(())
            }
        }
    }
}

/// Final ledger state after a successful run.
#[derive(Debug, Serialize)]
pub struct Report {
    pub name: Option<String>,
    pub steps: usize,
    pub projects: Vec<ProjectReport>,
    pub escrow_balance: Amount,
    pub accounts: BTreeMap<Address, Amount>,
    pub events: Vec<EventRecord>,
}

/// One project with its bids and disputes.
#[derive(Debug, Serialize)]
pub struct ProjectReport {
    pub project: Project,
    pub paid_total: Option<Amount>,
    pub fully_paid: bool,
    pub bids: Vec<Bid>,
    pub disputes: Vec<Dispute>,
}

impl Scenario {
    /// Parse a scenario from YAML text.
    pub fn parse(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = serde_yaml::from_str(text)?;
        if scenario.steps.is_empty() {
            return Err(ScenarioError::Empty);
        }
        Ok(scenario)
    }

    /// Read and parse a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let scenario = Self::parse(&text)
            .with_context(|| format!("failed to load scenario {}", path.display()))?;
        tracing::debug!(path = %path.display(), steps = scenario.steps.len(), "scenario loaded");
        Ok(scenario)
    }

    /// Replay every step against a fresh ledger.
    pub fn run(&self, config: LedgerConfig) -> Result<Report, ScenarioError> {
        let (ledger, accounts) = Ledger::with_account_book(config);

        for (i, step) in self.steps.iter().enumerate() {
            let number = i + 1;
            let op = step.action.name();
            let outcome = step.action.apply(&ledger, &accounts);
            match (outcome, step.expect_error) {
                (Ok(()), None) => {
                    tracing::info!(step = number, op, "step succeeded");
                }
                (Ok(()), Some(expected)) => {
                    return Err(ScenarioError::UnexpectedSuccess {
                        step: number,
                        op,
                        expected,
                    });
                }
                (Err(source), None) => {
                    return Err(ScenarioError::StepFailed {
                        step: number,
                        op,
                        source,
                    });
                }
                (Err(source), Some(expected)) if source.kind() == expected => {
                    tracing::info!(step = number, op, kind = %expected, "step failed as expected");
                }
                (Err(source), Some(expected)) => {
                    return Err(ScenarioError::WrongError {
                        step: number,
                        op,
                        expected,
                        found: source.kind(),
                        source,
                    });
                }
            }
        }

        let projects = ledger
            .projects()
            .into_iter()
            .map(|project| -> Result<ProjectReport, LedgerError> {
                Ok(ProjectReport {
                    bids: ledger.bids(project.id)?,
                    disputes: ledger.disputes_for_project(project.id)?,
                    paid_total: project.paid_total(),
                    fully_paid: project.all_milestones_paid(),
                    project,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| ScenarioError::StepFailed {
                step: self.steps.len(),
                op: "report",
                source,
            })?;

        Ok(Report {
            name: self.name.clone(),
            steps: self.steps.len(),
            projects,
            escrow_balance: ledger.escrow_balance(),
            accounts: accounts.accounts(),
            events: ledger.events(),
        })
    }
}
