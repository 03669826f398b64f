use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod session;

#[derive(Parser)]
#[command(name = "waitwise", version, about = "Put a pause between an impulse and acting on it")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Commit to waiting before acting on an impulse
    Start(commands::decision::StartArgs),
    /// Print the current decision and countdown as JSON
    Status,
    /// Follow the countdown live and answer when it ends
    Watch,
    /// End the wait right now
    Override,
    /// Record what you decided once the wait is over
    Resolve(commands::decision::ResolveArgs),
    /// Snooze the expired decision and wait again
    Rearm(commands::decision::RearmArgs),
    /// List decision types and duration presets
    Presets,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WAITWISE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Start(args) => commands::decision::start(args),
        Commands::Status => commands::decision::status(),
        Commands::Watch => commands::watch::run(),
        Commands::Override => commands::decision::emergency_override(),
        Commands::Resolve(args) => commands::decision::resolve(args),
        Commands::Rearm(args) => commands::decision::rearm(args),
        Commands::Presets => commands::decision::presets(),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
