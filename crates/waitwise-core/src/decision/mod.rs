//! The decision record and its vocabulary.
//!
//! A [`Decision`] tracks one impulse-to-outcome cycle. It is the only entity
//! that is ever persisted; the store holds zero or one of them.

mod countdown;

pub use countdown::{remaining, Countdown};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

pub const MIN_DURATION_MINUTES: u32 = 1;
/// One week.
pub const MAX_DURATION_MINUTES: u32 = 7 * 24 * 60;

/// Category of the impulse. Purely descriptive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    Shopping,
    Message,
    Work,
    Feeling,
    Other,
}

impl DecisionType {
    pub const ALL: [DecisionType; 5] = [
        DecisionType::Shopping,
        DecisionType::Message,
        DecisionType::Work,
        DecisionType::Feeling,
        DecisionType::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DecisionType::Shopping => "Shopping",
            DecisionType::Message => "Sending a message",
            DecisionType::Work => "Work",
            DecisionType::Feeling => "Acting on a feeling",
            DecisionType::Other => "Something else",
        }
    }
}

impl Default for DecisionType {
    fn default() -> Self {
        DecisionType::Other
    }
}

impl FromStr for DecisionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shopping" => Ok(DecisionType::Shopping),
            "message" => Ok(DecisionType::Message),
            "work" => Ok(DecisionType::Work),
            "feeling" => Ok(DecisionType::Feeling),
            "other" => Ok(DecisionType::Other),
            _ => Err(ValidationError::UnknownType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStatus {
    Draft,
    Waiting,
    Completed,
    Cancelled,
    Snoozed,
}

/// The user's final answer once the wait is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Proceed with the action.
    Completed,
    /// Abandon the action.
    Cancelled,
    /// Defer the decision.
    Snoozed,
}

impl Outcome {
    pub fn status(self) -> DecisionStatus {
        match self {
            Outcome::Completed => DecisionStatus::Completed,
            Outcome::Cancelled => DecisionStatus::Cancelled,
            Outcome::Snoozed => DecisionStatus::Snoozed,
        }
    }
}

impl FromStr for Outcome {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" | "complete" | "proceed" => Ok(Outcome::Completed),
            "cancelled" | "canceled" | "cancel" | "abandon" => Ok(Outcome::Cancelled),
            "snoozed" | "snooze" | "defer" => Ok(Outcome::Snoozed),
            _ => Err(ValidationError::UnknownOutcome(s.to_string())),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Completed => "completed",
            Outcome::Cancelled => "cancelled",
            Outcome::Snoozed => "snoozed",
        };
        f.write_str(s)
    }
}

/// A quick-pick wait length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurationPreset {
    pub label: &'static str,
    pub minutes: u32,
}

pub const DURATION_PRESETS: [DurationPreset; 7] = [
    DurationPreset { label: "5 minutes", minutes: 5 },
    DurationPreset { label: "15 minutes", minutes: 15 },
    DurationPreset { label: "30 minutes", minutes: 30 },
    DurationPreset { label: "1 hour", minutes: 60 },
    DurationPreset { label: "3 hours", minutes: 180 },
    DurationPreset { label: "1 day", minutes: 24 * 60 },
    DurationPreset { label: "1 week", minutes: MAX_DURATION_MINUTES },
];

/// Everything the user supplies when leaving DRAFT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    pub decision_type: DecisionType,
    pub text: String,
    pub duration_minutes: u32,
    pub reflection: Option<String>,
}

impl Commitment {
    pub fn new(decision_type: DecisionType, text: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            decision_type,
            text: text.into(),
            duration_minutes,
            reflection: None,
        }
    }

    pub fn reflection(mut self, reflection: impl Into<String>) -> Self {
        self.reflection = Some(reflection.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::EmptyText);
        }
        validate_duration(self.duration_minutes)
    }
}

pub fn validate_duration(minutes: u32) -> Result<(), ValidationError> {
    if (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(ValidationError::DurationOutOfRange(minutes))
    }
}

/// One impulse-to-outcome cycle.
///
/// Serialized as camelCase JSON with millisecond-epoch timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: Uuid,
    #[serde(rename = "type", default)]
    pub decision_type: DecisionType,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection_text: Option<String>,
    /// Zero until a draft is committed.
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,
    pub status: DecisionStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_note: Option<String>,
    /// Expiry alert already attempted for this wait.
    #[serde(default)]
    pub expiry_notified: bool,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub emergency_overridden_at: Option<DateTime<Utc>>,
}

impl Decision {
    pub fn draft(created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            decision_type: DecisionType::default(),
            text: String::new(),
            reflection_text: None,
            duration_minutes: 0,
            start_time: None,
            end_time: None,
            status: DecisionStatus::Draft,
            created_at,
            final_note: None,
            expiry_notified: false,
            emergency_overridden_at: None,
        }
    }

    /// Copy the descriptive fields of `commitment` in and start the wait at `now`.
    ///
    /// The caller has already validated `commitment`.
    pub(crate) fn begin_wait(&mut self, commitment: Commitment, now: DateTime<Utc>) {
        self.decision_type = commitment.decision_type;
        self.text = commitment.text.trim().to_string();
        self.reflection_text = commitment
            .reflection
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        self.duration_minutes = commitment.duration_minutes;
        self.start_time = Some(now);
        self.end_time = Some(now + wait_length(commitment.duration_minutes));
        self.status = DecisionStatus::Waiting;
        self.expiry_notified = false;
        self.emergency_overridden_at = None;
        self.final_note = None;
    }

    /// Pull `end_time` in to `now`. Never moves it later.
    pub(crate) fn collapse_end(&mut self, now: DateTime<Utc>) {
        if let Some(end) = self.end_time {
            let start = self.start_time.unwrap_or(end);
            // Keep end >= start even if the clock reads earlier than start.
            self.end_time = Some(end.min(now).max(start));
        }
        self.emergency_overridden_at = Some(now);
    }

    pub(crate) fn close(&mut self, outcome: Outcome, note: Option<String>) {
        self.status = outcome.status();
        self.final_note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    }

    /// A committed wait whose timing is present and ordered.
    pub(crate) fn is_valid_wait(&self) -> bool {
        self.status == DecisionStatus::Waiting
            && matches!(
                (self.start_time, self.end_time),
                (Some(start), Some(end)) if end >= start
            )
    }

    /// True once the wait has elapsed at `now`.
    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        matches!(self.end_time, Some(end) if now >= end)
    }

    /// Planned wait length, `end_time - start_time`.
    pub fn wait_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

fn wait_length(duration_minutes: u32) -> Duration {
    Duration::milliseconds(i64::from(duration_minutes) * 60_000)
}
