//! Periodic driver for [`DecisionEngine::tick`].
//!
//! The engine itself has no timer. `Ticker` is the thin adapter that calls
//! `tick()` on a fixed cadence from a tokio task and forwards the resulting
//! events to the presentation layer. It stops on its own once the record
//! leaves Waiting/Expired, when the receiver goes away, when
//! [`TickerHandle::stop`] is called, or when the handle is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::clock::Clock;
use crate::engine::DecisionEngine;
use crate::events::Event;
use crate::notify::Notifier;
use crate::storage::DecisionStore;

/// Engine behind an async lock. Every operation goes through the lock, so
/// commit, tick, resolve and override never interleave.
pub type SharedEngine<S, N, C> = Arc<Mutex<DecisionEngine<S, N, C>>>;

pub fn shared<S, N, C>(engine: DecisionEngine<S, N, C>) -> SharedEngine<S, N, C> {
    Arc::new(Mutex::new(engine))
}

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct Ticker {
    interval: Duration,
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}

impl Ticker {
    /// A zero interval falls back to the one-second default.
    pub fn new(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            DEFAULT_TICK_INTERVAL
        } else {
            interval
        };
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking. Each tick sends the transition event (if any) followed
    /// by a state snapshot on `frames`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S, N, C>(
        &self,
        engine: SharedEngine<S, N, C>,
        frames: mpsc::UnboundedSender<Event>,
    ) -> TickerHandle
    where
        S: DecisionStore + 'static,
        N: Notifier + 'static,
        C: Clock + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let period = self.interval;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        debug!("ticker stopped by handle");
                        break;
                    }
                    _ = interval.tick() => {
                        let (transition, snapshot, active) = {
                            let mut engine = engine.lock().await;
                            let transition = engine.tick();
                            (transition, engine.snapshot(), engine.phase().is_active())
                        };

                        if let Some(event) = transition {
                            if frames.send(event).is_err() {
                                break;
                            }
                        }
                        if frames.send(snapshot).is_err() {
                            debug!("ticker receiver dropped");
                            break;
                        }
                        if !active {
                            debug!("no active wait, ticker exiting");
                            break;
                        }
                    }
                }
            }
        });

        TickerHandle {
            stop: Some(stop_tx),
            task: Some(task),
        }
    }
}

/// Owner of a running ticker. Dropping it stops the ticks.
pub struct TickerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TickerHandle {
    /// Request the ticker to stop. No tick starts after this returns.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Stop and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
