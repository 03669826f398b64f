//! Live countdown for the active decision.
//!
//! Ticks the engine from a [`Ticker`], draws the countdown on stderr and
//! prints every transition as a JSON line on stdout. Lines typed on stdin
//! drive the engine while attached:
//!
//! ```text
//! e | emergency              end the wait now
//! completed [note]           resolve (also cancelled, snoozed)
//! rearm <minutes> [note]     snooze and wait again
//! q | quit                   detach, the wait keeps running
//! ```

use std::io::Write;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;
use waitwise_core::ticker::shared;
use waitwise_core::{Countdown, Decision, Event, Outcome, Phase, Ticker};

use crate::session::{print_json, Session};

const BAR_WIDTH: usize = 30;

#[derive(Debug, PartialEq)]
enum WatchCommand {
    Override,
    Resolve(Outcome, Option<String>),
    Rearm(u32, Option<String>),
    Quit,
}

fn parse_command(line: &str) -> Result<WatchCommand, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    let note = |s: &str| (!s.is_empty()).then(|| s.to_string());

    match head.to_ascii_lowercase().as_str() {
        "e" | "emergency" | "override" => Ok(WatchCommand::Override),
        "q" | "quit" | "exit" => Ok(WatchCommand::Quit),
        "rearm" => {
            let (minutes, note_text) = match rest.split_once(char::is_whitespace) {
                Some((m, n)) => (m, n.trim()),
                None => (rest, ""),
            };
            let minutes = minutes
                .parse::<u32>()
                .map_err(|_| format!("rearm needs a number of minutes, got '{minutes}'"))?;
            Ok(WatchCommand::Rearm(minutes, note(note_text)))
        }
        "" => Err("empty command".into()),
        other => other
            .parse::<Outcome>()
            .map(|outcome| WatchCommand::Resolve(outcome, note(rest)))
            .map_err(|e| e.to_string()),
    }
}

fn progress_bar(fraction: f64) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

fn render_line(decision: &Decision, countdown: &Countdown) -> String {
    format!(
        "{} | {}  {} {} {:>3.0}%",
        decision.decision_type.label(),
        decision.text,
        countdown,
        progress_bar(countdown.fraction_elapsed),
        countdown.fraction_elapsed * 100.0,
    )
}

fn draw(line: &str) {
    let mut err = std::io::stderr().lock();
    let _ = write!(err, "\r\x1b[2K{line}");
    let _ = err.flush();
}

fn announce(line: &str) {
    eprintln!("\r\x1b[2K{line}");
}

/// Entry point for `waitwise watch`.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::open()?;
    attach(session)
}

/// Follow the countdown of an already opened session until it is resolved,
/// the user quits, or ctrl-c.
pub fn attach(session: Session) -> Result<(), Box<dyn std::error::Error>> {
    if !session.engine.phase().is_active() {
        announce("No active wait.");
        return print_json(&session.engine.snapshot());
    }
    if let Some(event) = &session.restored {
        print_json(event)?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(watch_loop(session));
    // A pending stdin read would otherwise hold the runtime open.
    runtime.shutdown_background();
    result
}

async fn watch_loop(session: Session) -> Result<(), Box<dyn std::error::Error>> {
    let interval = Duration::from_millis(session.config.timer.tick_interval_ms);
    if session.engine.phase() == Phase::Expired {
        announce_expired();
    }
    let engine = shared(session.engine);

    let (tx, mut frames) = mpsc::unbounded_channel();
    let handle = Ticker::new(interval).spawn(engine.clone(), tx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                match &frame {
                    Event::StateSnapshot { phase, decision, countdown, .. } => {
                        if let (Some(d), Some(c)) = (decision, countdown) {
                            if phase.is_active() {
                                draw(&render_line(d, c));
                            }
                        }
                    }
                    Event::DecisionExpired { .. } => {
                        announce_expired();
                        print_json(&frame)?;
                    }
                    Event::DecisionSuperseded { decision_id, .. } => {
                        let note = match decision_id {
                            Some(_) => "Another session started a new wait; following that one.",
                            None => "Resolved in another session.",
                        };
                        announce(note);
                        print_json(&frame)?;
                    }
                    _ => print_json(&frame)?,
                }
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) | Err(_) => {
                        debug!("stdin closed, watching without input");
                        stdin_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(message) => {
                        announce(&format!("error: {message}"));
                        continue;
                    }
                };
                if command == WatchCommand::Quit {
                    announce("Detached. The wait keeps running.");
                    break;
                }

                let mut engine = engine.lock().await;
                let outcome = match command {
                    WatchCommand::Override => engine.emergency_override(),
                    WatchCommand::Resolve(outcome, note) => engine.resolve(outcome, note).map(Some),
                    WatchCommand::Rearm(minutes, note) => {
                        engine.snooze_and_rearm(minutes, note).map(Some)
                    }
                    WatchCommand::Quit => Ok(None),
                };
                match outcome {
                    Ok(Some(event)) => {
                        announce("");
                        print_json(&event)?;
                        if matches!(event, Event::EmergencyOverride { .. }) {
                            announce_expired();
                        }
                    }
                    Ok(None) => announce("The wait is already over."),
                    Err(e) => announce(&format!("error: {e}")),
                }
            }
            _ = &mut ctrl_c => {
                announce("Interrupted. The wait keeps running.");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn announce_expired() {
    announce("Time's up. What did you decide?");
    announce("  completed | cancelled | snoozed [note], or rearm <minutes> [note]");
}
