mod config;
mod database;
mod memory;

pub use config::{Config, NotificationsConfig, TimerConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::decision::Decision;
use crate::error::PersistenceError;

/// Single-slot repository for the active decision.
///
/// Holds zero or one record. `save` overwrites, `clear` empties the slot and
/// a `load` after `clear` returns `None`. Implementations must make each call
/// atomic for a single writer.
pub trait DecisionStore: Send {
    fn save(&self, decision: &Decision) -> Result<(), PersistenceError>;
    fn load(&self) -> Result<Option<Decision>, PersistenceError>;
    fn clear(&self) -> Result<(), PersistenceError>;
}

impl<S: DecisionStore + ?Sized> DecisionStore for Box<S> {
    fn save(&self, decision: &Decision) -> Result<(), PersistenceError> {
        (**self).save(decision)
    }

    fn load(&self) -> Result<Option<Decision>, PersistenceError> {
        (**self).load()
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        (**self).clear()
    }
}

/// Returns the data directory, creating it if needed.
///
/// `WAITWISE_HOME` overrides the location outright. Otherwise the directory is
/// `~/.config/waitwise`, or `~/.config/waitwise-dev` when `WAITWISE_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("WAITWISE_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("WAITWISE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("waitwise-dev")
            } else {
                base_dir.join("waitwise")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
