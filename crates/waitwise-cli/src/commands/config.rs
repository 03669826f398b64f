use clap::Subcommand;
use serde::Serialize;
use waitwise_core::Config;

use crate::session::print_json;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value by dotted key (e.g. "notifications.bell")
    Get { key: String },
    /// Change one value and save; an empty value unsets optional fields
    Set { key: String, value: String },
    /// Print the whole configuration as JSON
    List,
    /// Overwrite the file with defaults
    Reset,
    /// Print where the file lives
    Path,
}

/// Reported after a successful `set`.
#[derive(Serialize)]
struct Change<'a> {
    key: &'a str,
    previous: Option<String>,
    value: Option<String>,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or_else(|| format!("unknown config key '{key}'"))?;
            println!("{value}");
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            let previous = config.get(&key);
            config.set(&key, &value)?;
            config.save()?;
            print_json(&Change {
                value: config.get(&key),
                key: &key,
                previous,
            })
        }
        ConfigAction::List => print_json(&Config::load()?),
        ConfigAction::Reset => {
            let defaults = Config::default();
            defaults.save()?;
            print_json(&defaults)
        }
        ConfigAction::Path => {
            println!("{}", Config::path()?.display());
            Ok(())
        }
    }
}
