//! Decision lifecycle engine.
//!
//! The engine is a clock-driven state machine over a single decision record.
//! It does not use internal threads - the caller is responsible for calling
//! `tick()` periodically (see [`crate::ticker`]).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Draft -> Waiting -> Expired -> (Completed | Cancelled | Snoozed)
//!                     ^                      |
//!                     +---- snooze_and_rearm +
//! ```
//!
//! `Expired` is never written to the store: the persisted record keeps the
//! `WAITING` status and expiry is re-derived from `end_time` on every tick and
//! on restore.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = DecisionEngine::new(store, notifier, SystemClock);
//! engine.restore()?;
//! engine.begin_draft()?;
//! engine.commit(Commitment::new(DecisionType::Shopping, "sneakers", 5))?;
//! // In a loop:
//! engine.tick(); // Returns Some(Event::DecisionExpired) once the wait is over
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::decision::{
    self, remaining, Commitment, Countdown, Decision, DecisionStatus, Outcome,
};
use crate::error::{CoreError, InvalidStateError, Result};
use crate::events::Event;
use crate::notify::Notifier;
use crate::storage::DecisionStore;

/// Where the engine's record currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No record held.
    Idle,
    Draft,
    Waiting,
    /// Wait elapsed, awaiting the user's answer.
    Expired,
    Completed,
    Cancelled,
    Snoozed,
}

impl Phase {
    /// Waiting or Expired: the record is persisted and the ticker should run.
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Waiting | Phase::Expired)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Draft => "draft",
            Phase::Waiting => "waiting",
            Phase::Expired => "expired",
            Phase::Completed => "completed",
            Phase::Cancelled => "cancelled",
            Phase::Snoozed => "snoozed",
        };
        f.write_str(s)
    }
}

/// Owns the single decision record and every transition on it.
pub struct DecisionEngine<S, N, C> {
    store: S,
    notifier: N,
    clock: C,
    current: Option<Decision>,
    /// Set once the wait has elapsed (or was overridden) and cleared on resolve.
    expired: bool,
    /// A store write failed this session; the record is memory-only.
    storage_degraded: bool,
    /// Id of the record last seen in the store, written or loaded by us.
    persisted_id: Option<Uuid>,
}

impl<S: DecisionStore, N: Notifier, C: Clock> DecisionEngine<S, N, C> {
    pub fn new(store: S, notifier: N, clock: C) -> Self {
        Self {
            store,
            notifier,
            clock,
            current: None,
            expired: false,
            storage_degraded: false,
            persisted_id: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        let Some(decision) = &self.current else {
            return Phase::Idle;
        };
        match decision.status {
            DecisionStatus::Draft => Phase::Draft,
            DecisionStatus::Waiting if self.expired => Phase::Expired,
            DecisionStatus::Waiting => Phase::Waiting,
            DecisionStatus::Completed => Phase::Completed,
            DecisionStatus::Cancelled => Phase::Cancelled,
            DecisionStatus::Snoozed => Phase::Snoozed,
        }
    }

    pub fn current(&self) -> Option<&Decision> {
        self.current.as_ref()
    }

    /// Countdown at the current clock reading, while a wait is active.
    pub fn countdown(&self) -> Option<Countdown> {
        if !self.phase().is_active() {
            return None;
        }
        self.current
            .as_ref()
            .map(|d| remaining(self.clock.now(), d))
    }

    pub fn storage_degraded(&self) -> bool {
        self.storage_degraded
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            phase: self.phase(),
            decision: self.current.clone(),
            countdown: self.countdown(),
            storage_degraded: self.storage_degraded,
            at: self.clock.now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Pick up a persisted wait after a restart.
    ///
    /// Returns `Ok(None)` when the store is empty. A wait whose end time has
    /// passed comes back as Expired; the alert fires only if it was not
    /// already attempted before the restart.
    ///
    /// # Errors
    /// `InvalidState` unless the engine is Idle; `Persistence` if the store
    /// cannot be read.
    pub fn restore(&mut self) -> Result<Option<Event>> {
        self.require(Phase::Idle, "restore")?;

        let loaded = self.store.load().map_err(|e| {
            warn!(error = %e, "failed to load persisted decision");
            CoreError::Persistence(e)
        })?;
        let Some(decision) = loaded else {
            return Ok(None);
        };

        if !decision.is_valid_wait() {
            warn!(
                decision_id = %decision.id,
                status = ?decision.status,
                "discarding persisted decision that is not a valid wait"
            );
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "failed to clear invalid persisted decision");
                self.storage_degraded = true;
            }
            return Ok(None);
        }

        let now = self.clock.now();
        let decision_id = decision.id;
        let expired = decision.has_elapsed(now);
        info!(%decision_id, expired, "restored persisted decision");
        self.current = Some(decision);
        self.persisted_id = Some(decision_id);
        self.expired = false;

        let (mut notified, mut persisted) = (false, true);
        if expired {
            if let Some(Event::DecisionExpired {
                notified: n,
                persisted: p,
                ..
            }) = self.expire(now)
            {
                notified = n;
                persisted = p;
            }
        }

        Ok(Some(Event::DecisionRestored {
            decision_id,
            expired,
            notified,
            persisted,
            at: now,
        }))
    }

    /// Start a new draft, replacing any draft or finished record held.
    ///
    /// # Errors
    /// `InvalidState` while a wait is active.
    pub fn begin_draft(&mut self) -> Result<Event> {
        if self.phase().is_active() {
            return Err(InvalidStateError::WaitAlreadyActive.into());
        }
        let now = self.clock.now();
        let draft = Decision::draft(now);
        let decision_id = draft.id;
        debug!(%decision_id, "draft started");
        self.current = Some(draft);
        self.expired = false;
        Ok(Event::DraftStarted {
            decision_id,
            at: now,
        })
    }

    /// Promote the draft to a persisted wait starting now.
    ///
    /// # Errors
    /// `Validation` for empty text or an out-of-range duration (the draft is
    /// left untouched); `InvalidState` when there is no draft, or when another
    /// session already has a wait in the store.
    pub fn commit(&mut self, commitment: Commitment) -> Result<Event> {
        self.require(Phase::Draft, "commit")?;
        commitment.validate()?;
        if let Ok(Some(stored)) = self.store.load() {
            if stored.is_valid_wait() {
                debug!(decision_id = %stored.id, "store already holds a wait");
                return Err(InvalidStateError::WaitAlreadyActive.into());
            }
        }

        let now = self.clock.now();
        let decision = self.current.as_mut().ok_or(InvalidStateError::WrongPhase {
            operation: "commit",
            phase: Phase::Idle,
        })?;
        decision.begin_wait(commitment, now);
        let decision_id = decision.id;
        let decision_type = decision.decision_type;
        let duration_minutes = decision.duration_minutes;
        let end_time = decision.end_time.unwrap_or(now);
        self.expired = false;
        info!(%decision_id, duration_minutes, "decision committed");

        let persisted = self.persist();
        Ok(Event::DecisionCommitted {
            decision_id,
            decision_type,
            duration_minutes,
            start_time: now,
            end_time,
            persisted,
            at: now,
        })
    }

    /// Call periodically. Returns `Some(Event::DecisionExpired)` on the tick
    /// that observes the end of the wait, `None` otherwise.
    ///
    /// Remaining time is re-derived from the clock on every call; nothing is
    /// accumulated between ticks. Changes made to the stored record by another
    /// session are picked up first, and a replaced or resolved record yields
    /// `Some(Event::DecisionSuperseded)`.
    pub fn tick(&mut self) -> Option<Event> {
        let now = self.clock.now();
        if let Some(event) = self.reconcile(now) {
            return Some(event);
        }
        if self.phase() != Phase::Waiting {
            return None;
        }
        if self.current.as_ref()?.has_elapsed(now) {
            self.expire(now)
        } else {
            None
        }
    }

    /// End the wait now.
    ///
    /// Pulls `end_time` in to the current time (never later than it was),
    /// leaves `start_time` alone and moves straight to Expired. The user is
    /// present, so no alert is sent.
    ///
    /// Returns `Ok(None)` if the record is already Expired or finished.
    ///
    /// # Errors
    /// `InvalidState` when there is no wait (Idle or Draft), or the record was
    /// changed by another session.
    pub fn emergency_override(&mut self) -> Result<Option<Event>> {
        let now = self.clock.now();
        self.refresh(now)?;
        match self.phase() {
            Phase::Waiting => {}
            Phase::Expired | Phase::Completed | Phase::Cancelled | Phase::Snoozed => {
                debug!("emergency override ignored, wait already over");
                return Ok(None);
            }
            phase @ (Phase::Idle | Phase::Draft) => {
                return Err(InvalidStateError::WrongPhase {
                    operation: "emergency_override",
                    phase,
                }
                .into());
            }
        }

        let Some(decision) = self.current.as_mut() else {
            return Ok(None);
        };
        decision.collapse_end(now);
        decision.expiry_notified = true;
        let decision_id = decision.id;
        let end_time = decision.end_time.unwrap_or(now);
        self.expired = true;
        info!(%decision_id, "emergency override");

        let persisted = self.persist();
        Ok(Some(Event::EmergencyOverride {
            decision_id,
            end_time,
            persisted,
            at: now,
        }))
    }

    /// Record the user's answer and clear the store.
    ///
    /// A `Snoozed` answer ends the record; starting again takes a new draft.
    /// See [`Self::snooze_and_rearm`] for the variant that restarts the wait.
    ///
    /// # Errors
    /// `InvalidState` unless the wait has expired, or if another session
    /// changed the record.
    pub fn resolve(&mut self, outcome: Outcome, note: Option<String>) -> Result<Event> {
        let now = self.clock.now();
        self.refresh(now)?;
        self.require(Phase::Expired, "resolve")?;

        let decision = self.current.as_mut().ok_or(InvalidStateError::WrongPhase {
            operation: "resolve",
            phase: Phase::Idle,
        })?;
        decision.close(outcome, note);
        let decision_id = decision.id;
        let status = decision.status;
        let final_note = decision.final_note.clone();
        self.expired = false;
        self.notifier.dismiss();
        info!(%decision_id, %outcome, "decision resolved");

        let store_cleared = match self.store.clear() {
            Ok(()) => {
                self.persisted_id = None;
                true
            }
            Err(e) => {
                warn!(%decision_id, error = %e, "failed to clear resolved decision");
                self.storage_degraded = true;
                false
            }
        };

        Ok(Event::DecisionResolved {
            decision_id,
            status,
            final_note,
            store_cleared,
            at: now,
        })
    }

    /// Close the expired decision as Snoozed and immediately start a new wait
    /// for the same impulse.
    ///
    /// The new record gets a fresh id and copies type, text and reflection.
    /// It replaces the old one in the store in a single write.
    ///
    /// # Errors
    /// `Validation` for an out-of-range duration (nothing changes);
    /// `InvalidState` unless the wait has expired, or if another session
    /// changed the record.
    pub fn snooze_and_rearm(&mut self, duration_minutes: u32, note: Option<String>) -> Result<Event> {
        let now = self.clock.now();
        self.refresh(now)?;
        self.require(Phase::Expired, "snooze_and_rearm")?;
        decision::validate_duration(duration_minutes)?;

        let previous = self.current.as_mut().ok_or(InvalidStateError::WrongPhase {
            operation: "snooze_and_rearm",
            phase: Phase::Idle,
        })?;
        previous.close(Outcome::Snoozed, note);
        let previous_id = previous.id;
        let commitment = Commitment {
            decision_type: previous.decision_type,
            text: previous.text.clone(),
            duration_minutes,
            reflection: previous.reflection_text.clone(),
        };
        self.notifier.dismiss();

        let mut next = Decision::draft(now);
        next.begin_wait(commitment, now);
        let decision_id = next.id;
        let end_time = next.end_time.unwrap_or(now);
        self.current = Some(next);
        self.expired = false;
        info!(%previous_id, %decision_id, duration_minutes, "snoozed decision re-armed");

        let persisted = self.persist();
        Ok(Event::DecisionRearmed {
            previous_id,
            decision_id,
            duration_minutes,
            end_time,
            persisted,
            at: now,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn require(&self, expected: Phase, operation: &'static str) -> Result<(), InvalidStateError> {
        let phase = self.phase();
        if phase == expected {
            Ok(())
        } else {
            debug!(operation, %phase, "operation rejected in current phase");
            Err(InvalidStateError::WrongPhase { operation, phase })
        }
    }

    /// Re-read the store before acting on the held wait.
    ///
    /// Another session may have overridden, resolved or replaced the record
    /// since this one loaded it. An earlier `end_time` and the alert flag are
    /// merged in. A different or missing record replaces the held one and
    /// yields `DecisionSuperseded`. Skipped for records this engine never got
    /// into the store, and when the store cannot be read.
    fn reconcile(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let previous_id = self.current.as_ref()?.id;
        if !self.phase().is_active() || self.persisted_id != Some(previous_id) {
            return None;
        }
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                debug!(error = %e, "store unreadable, keeping held decision");
                return None;
            }
        };

        match stored {
            Some(stored) if stored.id == previous_id => {
                let held = self.current.as_mut()?;
                if let (Some(theirs), Some(ours)) = (stored.end_time, held.end_time) {
                    if theirs < ours {
                        debug!(decision_id = %previous_id, "adopting earlier end time from store");
                        held.end_time = Some(theirs);
                        held.emergency_overridden_at =
                            held.emergency_overridden_at.or(stored.emergency_overridden_at);
                    }
                }
                held.expiry_notified |= stored.expiry_notified;
                None
            }
            other => {
                let adopted = other.filter(Decision::is_valid_wait);
                let decision_id = adopted.as_ref().map(|d| d.id);
                warn!(%previous_id, ?decision_id, "held decision superseded by another session");
                self.current = adopted;
                self.persisted_id = decision_id;
                self.expired = false;
                self.notifier.dismiss();
                Some(Event::DecisionSuperseded {
                    previous_id,
                    decision_id,
                    at: now,
                })
            }
        }
    }

    /// Bring the held record up to date before a command acts on it.
    fn refresh(&mut self, now: DateTime<Utc>) -> Result<(), InvalidStateError> {
        if self.reconcile(now).is_some() {
            return Err(InvalidStateError::Superseded);
        }
        let elapsed = self.current.as_ref().is_some_and(|d| d.has_elapsed(now));
        if self.phase() == Phase::Waiting && elapsed {
            self.expire(now);
        }
        Ok(())
    }

    /// Move the held wait to Expired, firing the alert if it has not been
    /// attempted for this wait yet.
    fn expire(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let notifier = &self.notifier;
        let decision = self.current.as_mut()?;
        self.expired = true;

        let mut notified = false;
        if !decision.expiry_notified {
            decision.expiry_notified = true;
            notified = deliver_expiry(notifier, decision);
        }
        let decision_id = decision.id;
        info!(%decision_id, notified, "wait elapsed");

        let persisted = self.persist();
        Some(Event::DecisionExpired {
            decision_id,
            notified,
            persisted,
            at: now,
        })
    }

    /// Write the held record. Failures are logged and mark the session as
    /// storage-degraded.
    fn persist(&mut self) -> bool {
        let Some(decision) = &self.current else {
            return false;
        };
        match self.store.save(decision) {
            Ok(()) => {
                self.persisted_id = Some(decision.id);
                true
            }
            Err(e) => {
                warn!(decision_id = %decision.id, error = %e, "failed to persist decision");
                self.storage_degraded = true;
                false
            }
        }
    }
}

/// Fire-and-forget delivery. Returns whether an attempt was made.
fn deliver_expiry<N: Notifier>(notifier: &N, decision: &Decision) -> bool {
    if !notifier.can_notify() {
        debug!(decision_id = %decision.id, "notifications unavailable, skipping alert");
        return false;
    }
    if let Err(e) = notifier.notify_expired(decision) {
        warn!(decision_id = %decision.id, error = %e, "expiry notification failed");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::decision::DecisionType;
    use crate::error::{PersistenceError, ValidationError};
    use crate::notify::RecordingNotifier;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    const T0_MS: i64 = 1_700_000_000_000;

    type TestEngine = DecisionEngine<MemoryStore, RecordingNotifier, ManualClock>;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(T0_MS).unwrap()
    }

    fn engine() -> (TestEngine, MemoryStore, RecordingNotifier, ManualClock) {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::new();
        let clock = ManualClock::new(t0());
        let engine = DecisionEngine::new(store.clone(), notifier.clone(), clock.clone());
        (engine, store, notifier, clock)
    }

    fn sneakers() -> Commitment {
        Commitment::new(DecisionType::Shopping, "sneakers", 5).reflection("")
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    impl DecisionStore for BrokenStore {
        fn save(&self, _decision: &Decision) -> Result<(), PersistenceError> {
            Err(PersistenceError::Locked)
        }
        fn load(&self) -> Result<Option<Decision>, PersistenceError> {
            Err(PersistenceError::Locked)
        }
        fn clear(&self) -> Result<(), PersistenceError> {
            Err(PersistenceError::Locked)
        }
    }

    #[test]
    fn commit_starts_wait_and_persists() {
        let (mut engine, store, _, _) = engine();
        engine.begin_draft().unwrap();
        let event = engine.commit(sneakers()).unwrap();

        match event {
            Event::DecisionCommitted {
                start_time,
                end_time,
                persisted,
                ..
            } => {
                assert_eq!(start_time, t0());
                assert_eq!(end_time, t0() + Duration::milliseconds(300_000));
                assert!(persisted);
            }
            other => panic!("expected DecisionCommitted, got {other:?}"),
        }
        assert_eq!(engine.phase(), Phase::Waiting);
        assert_eq!(store.load().unwrap().as_ref(), engine.current());
    }

    #[test]
    fn invalid_commit_leaves_draft_untouched() {
        let (mut engine, store, _, _) = engine();
        engine.begin_draft().unwrap();
        let before = engine.current().cloned();

        for bad in [
            Commitment::new(DecisionType::Other, "", 5),
            Commitment::new(DecisionType::Other, "x", 0),
            Commitment::new(DecisionType::Other, "x", 10_081),
        ] {
            let err = engine.commit(bad).unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)), "{err}");
            assert_eq!(engine.phase(), Phase::Draft);
            assert_eq!(engine.current().cloned(), before);
        }
        assert!(store.is_empty());
    }

    #[test]
    fn commit_without_draft_is_invalid_state() {
        let (mut engine, _, _, _) = engine();
        let err = engine.commit(sneakers()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidState(InvalidStateError::WrongPhase {
                operation: "commit",
                phase: Phase::Idle
            })
        ));
    }

    #[test]
    fn tick_before_end_keeps_waiting() {
        let (mut engine, _, notifier, clock) = engine();
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();

        clock.advance(Duration::milliseconds(299_999));
        assert_eq!(engine.tick(), None);
        assert_eq!(engine.phase(), Phase::Waiting);
        assert_eq!(engine.countdown().unwrap().remaining_ms, 1);
        assert_eq!(notifier.delivery_count(), 0);
    }

    #[test]
    fn expiry_notifies_exactly_once() {
        let (mut engine, store, notifier, clock) = engine();
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();

        clock.advance(Duration::minutes(5));
        let event = engine.tick().expect("expiry event");
        assert!(matches!(
            event,
            Event::DecisionExpired {
                notified: true,
                persisted: true,
                ..
            }
        ));
        for _ in 0..10 {
            clock.advance(Duration::seconds(1));
            assert_eq!(engine.tick(), None);
        }
        assert_eq!(engine.phase(), Phase::Expired);
        assert_eq!(notifier.delivery_count(), 1);

        // The record stays persisted as WAITING, with the alert recorded.
        let persisted = store.load().unwrap().unwrap();
        assert_eq!(persisted.status, DecisionStatus::Waiting);
        assert!(persisted.expiry_notified);
    }

    #[test]
    fn notification_failure_does_not_block_expiry() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::new().failing();
        let clock = ManualClock::new(t0());
        let mut engine = DecisionEngine::new(store, notifier.clone(), clock.clone());
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();

        clock.advance(Duration::minutes(6));
        assert!(engine.tick().is_some());
        assert_eq!(engine.phase(), Phase::Expired);
        assert_eq!(notifier.delivery_count(), 1);
    }

    #[test]
    fn missing_capability_skips_delivery() {
        let notifier = RecordingNotifier::new().unavailable();
        let clock = ManualClock::new(t0());
        let mut engine = DecisionEngine::new(MemoryStore::new(), notifier.clone(), clock.clone());
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();

        clock.advance(Duration::minutes(5));
        assert!(matches!(
            engine.tick(),
            Some(Event::DecisionExpired { notified: false, .. })
        ));
        assert_eq!(engine.phase(), Phase::Expired);
        assert_eq!(notifier.delivery_count(), 0);
    }

    #[test]
    fn resolve_cancelled_clears_store() {
        let (mut engine, store, notifier, clock) = engine();
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();
        clock.advance(Duration::minutes(5));
        engine.tick();

        let event = engine
            .resolve(Outcome::Cancelled, Some("didn't need them".into()))
            .unwrap();
        assert!(matches!(
            event,
            Event::DecisionResolved {
                status: DecisionStatus::Cancelled,
                store_cleared: true,
                ..
            }
        ));
        let current = engine.current().unwrap();
        assert_eq!(current.status, DecisionStatus::Cancelled);
        assert_eq!(current.final_note.as_deref(), Some("didn't need them"));
        assert_eq!(engine.phase(), Phase::Cancelled);
        assert!(store.is_empty());
        assert_eq!(notifier.dismissals(), 1);
    }

    #[test]
    fn resolve_while_waiting_is_rejected_without_change() {
        let (mut engine, store, _, _) = engine();
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();

        let err = engine.resolve(Outcome::Completed, None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidState(InvalidStateError::WrongPhase {
                phase: Phase::Waiting,
                ..
            })
        ));
        assert_eq!(engine.phase(), Phase::Waiting);
        assert!(!store.is_empty());
    }

    #[test]
    fn emergency_override_pulls_end_in() {
        let (mut engine, store, notifier, clock) = engine();
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();

        clock.advance(Duration::minutes(1));
        let event = engine.emergency_override().unwrap().expect("override event");
        assert!(matches!(event, Event::EmergencyOverride { persisted: true, .. }));

        let d = engine.current().unwrap();
        assert_eq!(d.start_time, Some(t0()));
        assert_eq!(d.end_time, Some(t0() + Duration::milliseconds(60_000)));
        assert_eq!(engine.phase(), Phase::Expired);
        assert_eq!(engine.tick(), None);
        assert_eq!(engine.phase(), Phase::Expired);
        assert_eq!(notifier.delivery_count(), 0);
        assert_eq!(
            store.load().unwrap().unwrap().end_time,
            Some(t0() + Duration::minutes(1))
        );
    }

    #[test]
    fn emergency_override_is_noop_once_expired_or_resolved() {
        let (mut engine, _, _, clock) = engine();
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();
        clock.advance(Duration::minutes(5));
        engine.tick();
        let end = engine.current().unwrap().end_time;

        clock.advance(Duration::minutes(1));
        assert_eq!(engine.emergency_override().unwrap(), None);
        assert_eq!(engine.current().unwrap().end_time, end);

        engine.resolve(Outcome::Completed, None).unwrap();
        assert_eq!(engine.emergency_override().unwrap(), None);
    }

    #[test]
    fn emergency_override_without_wait_is_invalid_state() {
        let (mut engine, _, _, _) = engine();
        assert!(engine.emergency_override().is_err());
        engine.begin_draft().unwrap();
        assert!(engine.emergency_override().is_err());
        assert_eq!(engine.phase(), Phase::Draft);
    }

    #[test]
    fn begin_draft_refuses_second_wait() {
        let (mut engine, _, _, _) = engine();
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();
        assert!(matches!(
            engine.begin_draft(),
            Err(CoreError::InvalidState(InvalidStateError::WaitAlreadyActive))
        ));
    }

    #[test]
    fn snooze_and_rearm_starts_fresh_wait() {
        let (mut engine, store, notifier, clock) = engine();
        engine.begin_draft().unwrap();
        engine
            .commit(Commitment::new(DecisionType::Message, "reply to boss", 10).reflection("am I calm?"))
            .unwrap();
        let first_id = engine.current().unwrap().id;
        clock.advance(Duration::minutes(10));
        engine.tick();

        assert!(matches!(
            engine.snooze_and_rearm(0, None),
            Err(CoreError::Validation(ValidationError::DurationOutOfRange(0)))
        ));
        assert_eq!(engine.phase(), Phase::Expired);

        let event = engine.snooze_and_rearm(30, Some("still angry".into())).unwrap();
        let Event::DecisionRearmed {
            previous_id,
            decision_id,
            end_time,
            ..
        } = event
        else {
            panic!("expected DecisionRearmed");
        };
        assert_eq!(previous_id, first_id);
        assert_ne!(decision_id, first_id);
        assert_eq!(end_time, clock.now() + Duration::minutes(30));

        let d = engine.current().unwrap();
        assert_eq!(engine.phase(), Phase::Waiting);
        assert_eq!(d.text, "reply to boss");
        assert_eq!(d.reflection_text.as_deref(), Some("am I calm?"));
        assert!(!d.expiry_notified);
        assert_eq!(store.load().unwrap().map(|d| d.id), Some(decision_id));
        assert_eq!(notifier.dismissals(), 1);

        // The new wait gets its own alert.
        clock.advance(Duration::minutes(30));
        engine.tick();
        assert_eq!(notifier.delivery_count(), 2);
    }

    #[test]
    fn resolve_snoozed_requires_new_draft() {
        let (mut engine, store, _, clock) = engine();
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();
        clock.advance(Duration::minutes(5));
        engine.tick();

        engine.resolve(Outcome::Snoozed, Some("ask me tomorrow".into())).unwrap();
        assert_eq!(engine.phase(), Phase::Snoozed);
        assert!(store.is_empty());
        assert!(engine.commit(sneakers()).is_err());
        engine.begin_draft().unwrap();
        assert_eq!(engine.phase(), Phase::Draft);
    }

    #[test]
    fn restore_resumes_pending_wait() {
        let (mut engine, store, notifier, clock) = engine();
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();
        let id = engine.current().unwrap().id;
        drop(engine);

        clock.advance(Duration::minutes(2));
        let mut engine = DecisionEngine::new(store, notifier.clone(), clock.clone());
        let event = engine.restore().unwrap().unwrap();
        assert_eq!(
            event,
            Event::DecisionRestored {
                decision_id: id,
                expired: false,
                notified: false,
                persisted: true,
                at: clock.now()
            }
        );
        assert_eq!(engine.phase(), Phase::Waiting);
        assert_eq!(engine.countdown().unwrap().remaining_ms, 180_000);
        assert_eq!(notifier.delivery_count(), 0);
    }

    #[test]
    fn restore_after_expiry_notifies_once_across_restarts() {
        let (mut engine, store, notifier, clock) = engine();
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();
        drop(engine);

        // Process was down while the wait ran out.
        clock.advance(Duration::hours(1));
        let mut engine = DecisionEngine::new(store.clone(), notifier.clone(), clock.clone());
        assert!(matches!(
            engine.restore().unwrap(),
            Some(Event::DecisionRestored { expired: true, .. })
        ));
        assert_eq!(engine.phase(), Phase::Expired);
        assert_eq!(notifier.delivery_count(), 1);
        drop(engine);

        // Second restart: alert already recorded, not repeated.
        let mut engine = DecisionEngine::new(store, notifier.clone(), clock);
        engine.restore().unwrap();
        assert_eq!(engine.phase(), Phase::Expired);
        assert_eq!(notifier.delivery_count(), 1);
    }

    /// Store that reads from a slot but rejects every write.
    struct ReadOnlyStore(MemoryStore);

    impl DecisionStore for ReadOnlyStore {
        fn save(&self, _decision: &Decision) -> Result<(), PersistenceError> {
            Err(PersistenceError::Locked)
        }
        fn load(&self) -> Result<Option<Decision>, PersistenceError> {
            self.0.load()
        }
        fn clear(&self) -> Result<(), PersistenceError> {
            Err(PersistenceError::Locked)
        }
    }

    #[test]
    fn restore_reports_expiry_alert_and_failed_flag_write() {
        let (mut engine, store, _, clock) = engine();
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();
        drop(engine);

        clock.advance(Duration::minutes(10));
        let notifier = RecordingNotifier::new();
        let mut engine =
            DecisionEngine::new(ReadOnlyStore(store.clone()), notifier.clone(), clock.clone());
        match engine.restore().unwrap() {
            Some(Event::DecisionRestored {
                expired,
                notified,
                persisted,
                ..
            }) => {
                assert!(expired);
                assert!(notified);
                assert!(!persisted);
            }
            other => panic!("expected DecisionRestored, got {other:?}"),
        }
        assert!(engine.storage_degraded());
        assert_eq!(notifier.delivery_count(), 1);
        // The flag never reached the store.
        assert!(!store.load().unwrap().unwrap().expiry_notified);
    }

    #[test]
    fn tick_adopts_override_from_another_session() {
        let (mut watcher, store, notifier, clock) = engine();
        watcher.begin_draft().unwrap();
        watcher.commit(sneakers()).unwrap();

        clock.advance(Duration::minutes(1));
        let mut other = DecisionEngine::new(store.clone(), notifier.clone(), clock.clone());
        other.restore().unwrap();
        other.emergency_override().unwrap();
        let overridden_end = Some(t0() + Duration::minutes(1));

        let event = watcher.tick();
        assert!(matches!(event, Some(Event::DecisionExpired { notified: false, .. })));
        assert_eq!(watcher.phase(), Phase::Expired);
        assert_eq!(watcher.current().unwrap().end_time, overridden_end);

        clock.advance(Duration::minutes(5));
        watcher.tick();
        assert_eq!(store.load().unwrap().unwrap().end_time, overridden_end);
        assert_eq!(notifier.delivery_count(), 0);
    }

    #[test]
    fn tick_drops_record_resolved_elsewhere() {
        let (mut watcher, store, _, clock) = engine();
        watcher.begin_draft().unwrap();
        watcher.commit(sneakers()).unwrap();
        let id = watcher.current().unwrap().id;
        clock.advance(Duration::minutes(5));
        watcher.tick();

        let mut other = DecisionEngine::new(store.clone(), RecordingNotifier::new(), clock.clone());
        other.restore().unwrap();
        other.resolve(Outcome::Completed, None).unwrap();

        assert_eq!(
            watcher.tick(),
            Some(Event::DecisionSuperseded {
                previous_id: id,
                decision_id: None,
                at: clock.now()
            })
        );
        assert_eq!(watcher.phase(), Phase::Idle);
        assert!(store.is_empty());
    }

    #[test]
    fn stale_resolve_keeps_newer_wait() {
        let (mut stale, store, _, clock) = engine();
        stale.begin_draft().unwrap();
        stale.commit(sneakers()).unwrap();
        clock.advance(Duration::minutes(5));
        stale.tick();

        let mut other = DecisionEngine::new(store.clone(), RecordingNotifier::new(), clock.clone());
        other.restore().unwrap();
        other.resolve(Outcome::Cancelled, None).unwrap();
        other.begin_draft().unwrap();
        other
            .commit(Commitment::new(DecisionType::Work, "new wait", 30))
            .unwrap();
        let newer = other.current().unwrap().id;

        assert!(matches!(
            stale.resolve(Outcome::Completed, None),
            Err(CoreError::InvalidState(InvalidStateError::Superseded))
        ));
        assert_eq!(store.load().unwrap().map(|d| d.id), Some(newer));
        assert_eq!(stale.current().map(|d| d.id), Some(newer));
        assert_eq!(stale.phase(), Phase::Waiting);
    }

    #[test]
    fn commit_refuses_when_store_holds_another_wait() {
        let (mut first, store, _, clock) = engine();
        let mut second = DecisionEngine::new(store.clone(), RecordingNotifier::new(), clock);
        first.begin_draft().unwrap();
        second.begin_draft().unwrap();
        first.commit(sneakers()).unwrap();
        let held = store.load().unwrap();

        assert!(matches!(
            second.commit(Commitment::new(DecisionType::Message, "text my ex", 60)),
            Err(CoreError::InvalidState(InvalidStateError::WaitAlreadyActive))
        ));
        assert_eq!(second.phase(), Phase::Draft);
        assert_eq!(store.load().unwrap(), held);
    }

    #[test]
    fn restore_discards_non_waiting_record() {
        let (mut engine, store, _, _) = engine();
        let mut stray = Decision::draft(t0());
        stray.status = DecisionStatus::Completed;
        store.save(&stray).unwrap();

        assert_eq!(engine.restore().unwrap(), None);
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(store.is_empty());
    }

    #[test]
    fn restore_with_empty_store_stays_idle() {
        let (mut engine, _, _, _) = engine();
        assert_eq!(engine.restore().unwrap(), None);
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn broken_store_degrades_to_memory() {
        let clock = ManualClock::new(t0());
        let mut engine = DecisionEngine::new(BrokenStore, RecordingNotifier::new(), clock.clone());
        assert!(matches!(engine.restore(), Err(CoreError::Persistence(_))));

        engine.begin_draft().unwrap();
        let event = engine.commit(sneakers()).unwrap();
        assert!(matches!(event, Event::DecisionCommitted { persisted: false, .. }));
        assert!(engine.storage_degraded());
        assert_eq!(engine.phase(), Phase::Waiting);

        clock.advance(Duration::minutes(5));
        engine.tick();
        let event = engine.resolve(Outcome::Completed, None).unwrap();
        assert!(matches!(event, Event::DecisionResolved { store_cleared: false, .. }));
        assert_eq!(engine.phase(), Phase::Completed);
    }

    #[test]
    fn clock_skew_backwards_does_not_expire_or_lengthen() {
        let (mut engine, _, _, clock) = engine();
        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();
        let end = engine.current().unwrap().end_time;

        clock.set(t0() - Duration::hours(1));
        assert_eq!(engine.tick(), None);
        assert_eq!(engine.current().unwrap().end_time, end);
        assert_eq!(engine.countdown().unwrap().fraction_elapsed, 0.0);
    }

    #[test]
    fn snapshot_reports_phase_and_countdown() {
        let (mut engine, _, _, clock) = engine();
        match engine.snapshot() {
            Event::StateSnapshot { phase, countdown, .. } => {
                assert_eq!(phase, Phase::Idle);
                assert!(countdown.is_none());
            }
            other => panic!("expected StateSnapshot, got {other:?}"),
        }

        engine.begin_draft().unwrap();
        engine.commit(sneakers()).unwrap();
        clock.advance(Duration::seconds(90));
        match engine.snapshot() {
            Event::StateSnapshot {
                phase,
                countdown: Some(countdown),
                storage_degraded,
                ..
            } => {
                assert_eq!(phase, Phase::Waiting);
                assert_eq!(countdown.to_string(), "00:03:30");
                assert!(!storage_degraded);
            }
            other => panic!("expected StateSnapshot, got {other:?}"),
        }
    }
}
