//! # Ledger Notifications and the Event Log
//!
//! Every committed ledger operation emits exactly one [`LedgerEvent`]
//! (vote tallies that do not resolve a dispute emit nothing). Events are
//! appended to an [`EventLog`] that an off-chain indexer polls to
//! reconstruct history.
//!
//! ## Chain Construction
//!
//! Emission happens in two steps:
//!
//! 1. [`SealedEvent::seal`] canonicalizes the event (JCS) and computes its
//!    SHA-256 `event_digest`. This is the only fallible step and runs
//!    before the ledger mutates anything.
//! 2. [`EventLog::append`] assigns the next sequence number and the
//!    emission timestamp, then links the record:
//!    `chain_digest = SHA256(previous_chain_digest || seq_be64 || event_digest)`
//!    with an all-zero genesis predecessor. Appending cannot fail.
//!
//! An indexer holding any prefix of the log can re-run
//! [`verify_records`] to detect gaps, reordering or edits.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::canonical::CanonicalBytes;
use crate::digest::{chain_link, sha256_digest, ContentDigest};
use crate::error::{CanonicalizationError, EventChainError};
use crate::identity::{Address, DisputeId, ProjectId};
use crate::temporal::Timestamp;

/// A ledger notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A project was posted and opened for bidding.
    ProjectPosted {
        project_id: ProjectId,
        owner: Address,
        budget: Amount,
        milestone_count: usize,
    },
    /// A bid was appended to a project's bid list.
    BidSubmitted {
        project_id: ProjectId,
        bid_index: usize,
        bidder: Address,
        bid_amount: Amount,
    },
    /// The owner selected a bid; bidding is closed.
    BidSelected {
        project_id: ProjectId,
        bid_index: usize,
        bidder: Address,
    },
    /// A milestone tranche was transferred to the selected bidder.
    MilestonePaid {
        project_id: ProjectId,
        milestone_index: usize,
        recipient: Address,
        amount: Amount,
    },
    /// A dispute was opened; selection and release are frozen.
    DisputeRaised {
        dispute_id: DisputeId,
        project_id: ProjectId,
        disputant: Address,
        reason: String,
    },
    /// A dispute reached a strict majority.
    DisputeResolved {
        dispute_id: DisputeId,
        project_id: ProjectId,
        result: bool,
        yes_votes: u64,
        no_votes: u64,
    },
    /// Value was deposited into the pooled escrow balance.
    FundsReceived { from: Address, amount: Amount },
}

impl LedgerEvent {
    /// Notification name as it appears in the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProjectPosted { .. } => "project_posted",
            Self::BidSubmitted { .. } => "bid_submitted",
            Self::BidSelected { .. } => "bid_selected",
            Self::MilestonePaid { .. } => "milestone_paid",
            Self::DisputeRaised { .. } => "dispute_raised",
            Self::DisputeResolved { .. } => "dispute_resolved",
            Self::FundsReceived { .. } => "funds_received",
        }
    }

    /// The project this notification concerns, if any.
    pub fn project_id(&self) -> Option<ProjectId> {
        match self {
            Self::ProjectPosted { project_id, .. }
            | Self::BidSubmitted { project_id, .. }
            | Self::BidSelected { project_id, .. }
            | Self::MilestonePaid { project_id, .. }
            | Self::DisputeRaised { project_id, .. }
            | Self::DisputeResolved { project_id, .. } => Some(*project_id),
            Self::FundsReceived { .. } => None,
        }
    }
}

impl std::fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An event whose payload digest has already been computed.
#[derive(Debug, Clone)]
pub struct SealedEvent {
    event: LedgerEvent,
    digest: ContentDigest,
}

impl SealedEvent {
    /// Canonicalize and digest an event.
    pub fn seal(event: LedgerEvent) -> Result<Self, CanonicalizationError> {
        let digest = sha256_digest(&CanonicalBytes::new(&event)?);
        Ok(Self { event, digest })
    }

    /// The wrapped event.
    pub fn event(&self) -> &LedgerEvent {
        &self.event
    }

    /// SHA-256 of the event's canonical bytes.
    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }
}

/// One entry of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// 1-based position in the log.
    pub sequence: u64,
    /// When the record was appended.
    pub emitted_at: Timestamp,
    /// The notification.
    pub event: LedgerEvent,
    /// SHA-256 of the notification's canonical bytes.
    pub event_digest: ContentDigest,
    /// Link to the previous record.
    pub chain_digest: ContentDigest,
}

/// Append-only, hash-chained notification log.
#[derive(Debug, Default)]
pub struct EventLog {
    records: Mutex<Vec<EventRecord>>,
}

impl EventLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sealed event and return the stored record.
    pub fn append(&self, sealed: SealedEvent) -> EventRecord {
        let mut records = self.records.lock();
        let previous = records
            .last()
            .map(|r| r.chain_digest)
            .unwrap_or(ContentDigest::GENESIS);
        let sequence = records.len() as u64 + 1;
        let record = EventRecord {
            sequence,
            emitted_at: Timestamp::now(),
            chain_digest: chain_link(&previous, sequence, &sealed.digest),
            event_digest: sealed.digest,
            event: sealed.event,
        };
        records.push(record.clone());
        drop(records);

        tracing::info!(
            sequence,
            event = record.event.name(),
            project_id = ?record.event.project_id().map(|p| p.get()),
            digest = %record.chain_digest,
            "ledger event emitted"
        );
        record
    }

    /// Snapshot of every record.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    /// Records with a sequence number strictly greater than `sequence`.
    pub fn records_since(&self, sequence: u64) -> Vec<EventRecord> {
        let records = self.records.lock();
        let start = usize::try_from(sequence).unwrap_or(usize::MAX).min(records.len());
        records[start..].to_vec()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Chain digest of the newest record, or genesis for an empty log.
    pub fn head(&self) -> ContentDigest {
        self.records
            .lock()
            .last()
            .map(|r| r.chain_digest)
            .unwrap_or(ContentDigest::GENESIS)
    }

    /// Recompute the whole chain.
    pub fn verify_chain(&self) -> Result<(), EventChainError> {
        verify_records(&self.records.lock())
    }
}

/// Verify a contiguous prefix of an event log starting at sequence 1.
pub fn verify_records(records: &[EventRecord]) -> Result<(), EventChainError> {
    let mut previous = ContentDigest::GENESIS;
    for (i, record) in records.iter().enumerate() {
        let expected = i as u64 + 1;
        if record.sequence != expected {
            return Err(EventChainError::SequenceGap {
                expected,
                found: record.sequence,
            });
        }
        let payload = CanonicalBytes::new(&record.event)
            .map(|cb| sha256_digest(&cb))
            .map_err(|_| EventChainError::PayloadMismatch {
                sequence: record.sequence,
            })?;
        if payload != record.event_digest {
            return Err(EventChainError::PayloadMismatch {
                sequence: record.sequence,
            });
        }
        if chain_link(&previous, record.sequence, &record.event_digest) != record.chain_digest {
            return Err(EventChainError::ChainMismatch {
                sequence: record.sequence,
            });
        }
        previous = record.chain_digest;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(log: &EventLog, event: LedgerEvent) -> EventRecord {
        log.append(SealedEvent::seal(event).unwrap())
    }

    fn posted(id: u64) -> LedgerEvent {
        LedgerEvent::ProjectPosted {
            project_id: ProjectId::new(id),
            owner: Address::new("0xowner").unwrap(),
            budget: Amount::new(600),
            milestone_count: 3,
        }
    }

    #[test]
    fn test_append_assigns_contiguous_sequence() {
        let log = EventLog::new();
        assert!(log.is_empty());
        let a = emit(&log, posted(1));
        let b = emit(&log, posted(2));
        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.head(), b.chain_digest);
    }

    #[test]
    fn test_first_record_links_to_genesis() {
        let log = EventLog::new();
        let rec = emit(&log, posted(1));
        assert_eq!(
            rec.chain_digest,
            chain_link(&ContentDigest::GENESIS, 1, &rec.event_digest)
        );
    }

    #[test]
    fn test_records_since() {
        let log = EventLog::new();
        for i in 1..=5 {
            emit(&log, posted(i));
        }
        let tail = log.records_since(3);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence, 4);
        assert!(log.records_since(5).is_empty());
        assert!(log.records_since(u64::MAX).is_empty());
        assert_eq!(log.records_since(0).len(), 5);
    }

    #[test]
    fn test_verify_chain_ok() {
        let log = EventLog::new();
        for i in 1..=4 {
            emit(&log, posted(i));
        }
        assert_eq!(log.verify_chain(), Ok(()));
    }

    #[test]
    fn test_verify_detects_tampered_payload() {
        let log = EventLog::new();
        emit(&log, posted(1));
        emit(&log, posted(2));
        let mut records = log.records();
        records[1].event = posted(99);
        assert_eq!(
            verify_records(&records),
            Err(EventChainError::PayloadMismatch { sequence: 2 })
        );
    }

    #[test]
    fn test_verify_detects_gap() {
        let log = EventLog::new();
        for i in 1..=3 {
            emit(&log, posted(i));
        }
        let mut records = log.records();
        records.remove(1);
        assert_eq!(
            verify_records(&records),
            Err(EventChainError::SequenceGap {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn test_verify_detects_relinked_record() {
        let log = EventLog::new();
        emit(&log, posted(1));
        emit(&log, posted(2));
        let mut records = log.records();
        records[1].chain_digest = records[0].chain_digest;
        assert_eq!(
            verify_records(&records),
            Err(EventChainError::ChainMismatch { sequence: 2 })
        );
    }

    #[test]
    fn test_event_serialization_tag() {
        let json = serde_json::to_value(LedgerEvent::DisputeResolved {
            dispute_id: DisputeId::new(1),
            project_id: ProjectId::new(1),
            result: true,
            yes_votes: 2,
            no_votes: 0,
        })
        .unwrap();
        assert_eq!(json["type"], "dispute_resolved");
        assert_eq!(json["result"], true);
    }

    #[test]
    fn test_name_matches_serde_tag() {
        let ev = LedgerEvent::FundsReceived {
            from: Address::new("0xfunder").unwrap(),
            amount: Amount::new(10),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], ev.name());
        assert_eq!(ev.project_id(), None);
    }

    #[test]
    fn test_seal_is_deterministic() {
        let a = SealedEvent::seal(posted(1)).unwrap();
        let b = SealedEvent::seal(posted(1)).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), SealedEvent::seal(posted(2)).unwrap().digest());
    }
}
