use clap::Args;
use serde::Serialize;
use waitwise_core::{Commitment, DecisionType, Outcome, DURATION_PRESETS};

use super::watch;
use crate::session::{print_json, Session};

#[derive(Args)]
pub struct StartArgs {
    /// What you are about to do
    pub text: String,
    /// shopping, message, work, feeling or other
    #[arg(long = "type", short = 't', default_value = "other")]
    pub decision_type: DecisionType,
    /// Minutes to wait (defaults to timer.default_duration_minutes)
    #[arg(long, short = 'm')]
    pub minutes: Option<u32>,
    /// Why you want to do it
    #[arg(long, short = 'r')]
    pub reflection: Option<String>,
    /// Stay attached and follow the countdown
    #[arg(long, short = 'w')]
    pub watch: bool,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// completed, cancelled or snoozed
    pub outcome: Outcome,
    /// Closing note
    #[arg(long, short = 'n')]
    pub note: Option<String>,
}

#[derive(Args)]
pub struct RearmArgs {
    /// Minutes for the new wait
    pub minutes: u32,
    /// Note recorded on the snoozed decision
    #[arg(long, short = 'n')]
    pub note: Option<String>,
}

pub fn start(args: StartArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open()?;
    let minutes = args
        .minutes
        .unwrap_or(session.config.timer.default_duration_minutes);

    let mut commitment = Commitment::new(args.decision_type, args.text, minutes);
    if let Some(reflection) = args.reflection {
        commitment = commitment.reflection(reflection);
    }

    session.engine.begin_draft()?;
    let event = session.engine.commit(commitment)?;
    print_json(&event)?;

    if args.watch {
        watch::attach(session)?;
    }
    Ok(())
}

pub fn status() -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open()?;
    print_json(&session.engine.snapshot())
}

pub fn emergency_override() -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open()?;
    match session.engine.emergency_override()? {
        Some(event) => print_json(&event),
        // Already over: report where things stand.
        None => print_json(&session.engine.snapshot()),
    }
}

pub fn resolve(args: ResolveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open()?;
    let event = session.engine.resolve(args.outcome, args.note)?;
    print_json(&event)
}

pub fn rearm(args: RearmArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open()?;
    let event = session.engine.snooze_and_rearm(args.minutes, args.note)?;
    print_json(&event)
}

#[derive(Serialize)]
struct TypeEntry {
    value: DecisionType,
    label: &'static str,
}

#[derive(Serialize)]
struct Presets {
    types: Vec<TypeEntry>,
    durations: &'static [waitwise_core::DurationPreset],
}

pub fn presets() -> Result<(), Box<dyn std::error::Error>> {
    let presets = Presets {
        types: DecisionType::ALL
            .iter()
            .map(|&value| TypeEntry {
                value,
                label: value.label(),
            })
            .collect(),
        durations: &DURATION_PRESETS,
    };
    print_json(&presets)
}
