//! Expiry alerts.
//!
//! The engine calls [`Notifier::notify_expired`] at most once per wait and
//! never blocks on it. Delivery errors are returned here only so the engine
//! can log them; they never change the lifecycle.

mod command;
mod terminal;

pub use command::CommandNotifier;
pub use terminal::TerminalNotifier;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::decision::Decision;
use crate::error::NotificationError;
use crate::storage::NotificationsConfig;

/// Delivers the "wait is over" alert.
pub trait Notifier: Send + Sync {
    /// Capability check, queried before every delivery attempt.
    fn can_notify(&self) -> bool {
        true
    }

    /// Fire the alert. Must return promptly.
    fn notify_expired(&self, decision: &Decision) -> Result<(), NotificationError>;

    /// Silence any alert still sounding. Called once the user answers.
    fn dismiss(&self) {}
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn can_notify(&self) -> bool {
        (**self).can_notify()
    }

    fn notify_expired(&self, decision: &Decision) -> Result<(), NotificationError> {
        (**self).notify_expired(decision)
    }

    fn dismiss(&self) {
        (**self).dismiss()
    }
}

/// Never notifies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn can_notify(&self) -> bool {
        false
    }

    fn notify_expired(&self, _decision: &Decision) -> Result<(), NotificationError> {
        Err(NotificationError::Unavailable)
    }
}

/// Delivers to every inner notifier that is able to.
#[derive(Default)]
pub struct FanoutNotifier {
    inner: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: impl Notifier + 'static) -> Self {
        self.inner.push(Box::new(notifier));
        self
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn can_notify(&self) -> bool {
        self.inner.iter().any(|n| n.can_notify())
    }

    /// Tries every channel; reports the first failure after all have run.
    fn notify_expired(&self, decision: &Decision) -> Result<(), NotificationError> {
        let mut first_err = None;
        for notifier in self.inner.iter().filter(|n| n.can_notify()) {
            if let Err(e) = notifier.notify_expired(decision) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn dismiss(&self) {
        for notifier in &self.inner {
            notifier.dismiss();
        }
    }
}

/// Records deliveries instead of alerting anyone.
///
/// Clones share their counters, so a handle kept outside the engine sees
/// every call. Useful for tests and dry runs.
#[derive(Debug, Clone)]
pub struct RecordingNotifier {
    available: bool,
    fail: bool,
    delivered: Arc<Mutex<Vec<Uuid>>>,
    dismissals: Arc<AtomicUsize>,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self {
            available: true,
            fail: false,
            delivered: Arc::default(),
            dismissals: Arc::default(),
        }
    }
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report no notification capability.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Record the call, then fail it.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Ids of the decisions alerted so far, in order.
    pub fn delivered(&self) -> Vec<Uuid> {
        self.delivered.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn delivery_count(&self) -> usize {
        self.delivered.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn dismissals(&self) -> usize {
        self.dismissals.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn can_notify(&self) -> bool {
        self.available
    }

    fn notify_expired(&self, decision: &Decision) -> Result<(), NotificationError> {
        self.delivered
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(decision.id);
        if self.fail {
            Err(NotificationError::Delivery("recording notifier set to fail".into()))
        } else {
            Ok(())
        }
    }

    fn dismiss(&self) {
        self.dismissals.fetch_add(1, Ordering::SeqCst);
    }
}

/// Build the notifier chain described by `config`.
pub fn from_config(config: &NotificationsConfig) -> FanoutNotifier {
    let mut fanout = FanoutNotifier::new();
    if !config.enabled {
        return fanout;
    }
    if config.bell {
        fanout = fanout.with(TerminalNotifier::new(config.alarm_repeat_secs));
    }
    if let Some(program) = config.command.as_deref().filter(|p| !p.trim().is_empty()) {
        fanout = fanout.with(CommandNotifier::new(program, config.args.clone()));
    }
    fanout
}
