//! Engine wiring shared by every command.

use tracing::warn;
use waitwise_core::notify::{self, FanoutNotifier};
use waitwise_core::{
    Config, CoreError, Database, DecisionEngine, DecisionStore, Event, PersistenceError,
    SystemClock,
};

pub type CliEngine = DecisionEngine<Database, FanoutNotifier, SystemClock>;

/// An engine restored from the on-disk store.
pub struct Session {
    pub engine: CliEngine,
    pub config: Config,
    /// Produced by restore, if a wait was picked up.
    pub restored: Option<Event>,
}

impl Session {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let db = Database::open()?;
        let notifier = notify::from_config(&config.notifications);
        let mut engine = DecisionEngine::new(db, notifier, SystemClock);
        let restored = match engine.restore() {
            Ok(restored) => restored,
            // The slot is unusable; start over from empty.
            Err(CoreError::Persistence(PersistenceError::Corrupt(e))) => {
                warn!(error = %e, "discarding unreadable decision record");
                engine.store().clear()?;
                None
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            engine,
            config,
            restored,
        })
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
