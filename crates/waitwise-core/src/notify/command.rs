use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use tracing::debug;

use super::Notifier;
use crate::decision::Decision;
use crate::error::NotificationError;

/// Launches an external program on expiry, e.g. `notify-send` or a sound player.
///
/// The child is not awaited. If it is still running when the user answers,
/// `dismiss` kills it, which stops a looping alarm sound.
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            child: Mutex::new(None),
        }
    }

    /// Arguments with `{text}` and `{type}` filled in from `decision`.
    fn render_args(&self, decision: &Decision) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{text}", &decision.text)
                    .replace("{type}", decision.decision_type.label())
            })
            .collect()
    }
}

impl Notifier for CommandNotifier {
    fn can_notify(&self) -> bool {
        !self.program.trim().is_empty()
    }

    fn notify_expired(&self, decision: &Decision) -> Result<(), NotificationError> {
        let child = Command::new(&self.program)
            .args(self.render_args(decision))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| NotificationError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        debug!(program = %self.program, pid = child.id(), "notification command launched");

        let previous = self
            .child
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(child);
        if let Some(mut old) = previous {
            let _ = old.kill();
            let _ = old.wait();
        }
        Ok(())
    }

    fn dismiss(&self) {
        let child = self.child.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(mut child) = child {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}
