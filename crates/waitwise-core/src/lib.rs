//! # Waitwise Core Library
//!
//! This library provides the core logic for Waitwise, a tool that puts a
//! timed pause between an impulse and acting on it. All operations are
//! available through the standalone CLI binary, which is a thin presentation
//! layer over this crate.
//!
//! ## Architecture
//!
//! - **Decision Engine**: A clock-driven state machine over a single decision
//!   record that requires the caller to periodically invoke `tick()`
//! - **Countdown**: Pure derivation of the remaining wait from `end_time - now`
//! - **Storage**: SQLite-based single-slot decision store and TOML-based
//!   configuration
//! - **Notifier**: Fire-and-forget expiry alerts (terminal bell, external command)
//! - **Ticker**: Cancellable tokio task that drives the engine once a second
//!
//! ## Key Components
//!
//! - [`DecisionEngine`]: Core lifecycle state machine
//! - [`Database`]: Persistence for the active decision
//! - [`Config`]: Application configuration management
//! - [`Notifier`]: Trait for expiry alert channels

pub mod clock;
pub mod decision;
pub mod engine;
pub mod error;
pub mod events;
pub mod notify;
pub mod storage;
pub mod ticker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{
    remaining, Commitment, Countdown, Decision, DecisionStatus, DecisionType, DurationPreset,
    Outcome, DURATION_PRESETS, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES,
};
pub use engine::{DecisionEngine, Phase};
pub use error::{
    ConfigError, CoreError, InvalidStateError, NotificationError, PersistenceError,
    ValidationError,
};
pub use events::Event;
pub use notify::{FanoutNotifier, Notifier};
pub use storage::{Config, Database, DecisionStore, MemoryStore};
pub use ticker::{SharedEngine, Ticker, TickerHandle};
