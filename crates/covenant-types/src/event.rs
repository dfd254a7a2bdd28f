//! Events surfaced to external observers
//!
//! Events are recorded only after an operation commits. Each component
//! keeps its own append-only log and broadcasts to live subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{AccountId, AgreementId, AgreementStatus, TokenAmount};

/// Capacity of each component's broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Notifications emitted by the ledger and the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CovenantEvent {
    /// A new agreement was registered
    AgreementCreated {
        id: AgreementId,
        participant1: AccountId,
        participant2: AccountId,
        punishment: TokenAmount,
    },

    /// An agreement was resolved and settled
    AgreementClosed {
        id: AgreementId,
        participant1: AccountId,
        participant2: AccountId,
        status: AgreementStatus,
    },

    /// An agreement was canceled without settlement
    AgreementCanceled {
        id: AgreementId,
        participant1: AccountId,
        participant2: AccountId,
    },

    /// Tokens entered circulation
    TokensMinted { account: AccountId, amount: TokenAmount },

    /// Tokens moved between accounts
    Transferred {
        from: AccountId,
        to: AccountId,
        amount: TokenAmount,
    },

    /// Ledger owner designated a new authorized minter
    AuthorizedMinterSet { minter: AccountId },

    /// Registry owner configured the token provider
    TokenProviderSet { provider: AccountId },
}

/// A committed event with its position in the emitting component's log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Per-component sequence number, starting at 1
    pub sequence: u64,
    /// Component that emitted the event
    pub source: AccountId,
    pub emitted_at: DateTime<Utc>,
    pub event: CovenantEvent,
}

/// Append-only event log with a broadcast fan-out
#[derive(Debug)]
pub struct EventLog {
    source: AccountId,
    records: Vec<EventRecord>,
    sender: broadcast::Sender<EventRecord>,
}

impl EventLog {
    pub fn new(source: AccountId) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            source,
            records: Vec::new(),
            sender,
        }
    }

    /// Record a committed event and notify subscribers
    pub fn emit(&mut self, event: CovenantEvent) -> &EventRecord {
        let record = EventRecord {
            sequence: self.records.len() as u64 + 1,
            source: self.source,
            emitted_at: Utc::now(),
            event,
        };
        // No receivers is not an error; the log is the source of truth.
        let _ = self.sender.send(record.clone());
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }
}
