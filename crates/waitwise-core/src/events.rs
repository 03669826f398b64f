use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::{Countdown, Decision, DecisionStatus, DecisionType};
use crate::engine::Phase;

/// Every state change in the engine produces an Event.
/// The presentation layer renders them; the CLI prints them as JSON.
///
/// `persisted: false` means the store rejected the write and the decision
/// now lives in memory only for this session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    DraftStarted {
        decision_id: Uuid,
        at: DateTime<Utc>,
    },
    DecisionCommitted {
        decision_id: Uuid,
        decision_type: DecisionType,
        duration_minutes: u32,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        persisted: bool,
        at: DateTime<Utc>,
    },
    /// The wait elapsed; the user now has to answer.
    DecisionExpired {
        decision_id: Uuid,
        /// An alert was attempted on this transition.
        notified: bool,
        persisted: bool,
        at: DateTime<Utc>,
    },
    /// The user cut the wait short.
    EmergencyOverride {
        decision_id: Uuid,
        end_time: DateTime<Utc>,
        persisted: bool,
        at: DateTime<Utc>,
    },
    DecisionResolved {
        decision_id: Uuid,
        status: DecisionStatus,
        final_note: Option<String>,
        store_cleared: bool,
        at: DateTime<Utc>,
    },
    /// A snoozed decision started a fresh wait under a new id.
    DecisionRearmed {
        previous_id: Uuid,
        decision_id: Uuid,
        duration_minutes: u32,
        end_time: DateTime<Utc>,
        persisted: bool,
        at: DateTime<Utc>,
    },
    /// A persisted wait was picked up after a restart.
    ///
    /// When it had already expired, `notified` and `persisted` report the
    /// expiry handled during the restore.
    DecisionRestored {
        decision_id: Uuid,
        expired: bool,
        notified: bool,
        persisted: bool,
        at: DateTime<Utc>,
    },
    /// Another session resolved or replaced the record this one held.
    /// `decision_id` is the record now in the store, if any.
    DecisionSuperseded {
        previous_id: Uuid,
        decision_id: Option<Uuid>,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: Phase,
        decision: Option<Decision>,
        countdown: Option<Countdown>,
        storage_degraded: bool,
        at: DateTime<Utc>,
    },
}

