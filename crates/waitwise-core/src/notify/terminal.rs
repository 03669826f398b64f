use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::Notifier;
use crate::decision::Decision;
use crate::error::NotificationError;

const BELL: &str = "\x07";

/// Rings the terminal bell and prints a banner on stderr.
///
/// With a non-zero repeat interval the bell keeps ringing from a background
/// thread until [`Notifier::dismiss`] is called.
pub struct TerminalNotifier {
    repeat: Option<Duration>,
    alarm: Mutex<Option<Alarm>>,
}

struct Alarm {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl TerminalNotifier {
    pub fn new(repeat_secs: u64) -> Self {
        Self {
            repeat: (repeat_secs > 0).then(|| Duration::from_secs(repeat_secs)),
            alarm: Mutex::new(None),
        }
    }

    fn start_alarm(&self, every: Duration) -> Result<(), NotificationError> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("waitwise-alarm".into())
            .spawn(move || {
                // Sleep in short slices so dismiss takes effect quickly.
                let slice = Duration::from_millis(100);
                let mut waited = Duration::ZERO;
                while !flag.load(Ordering::SeqCst) {
                    std::thread::sleep(slice);
                    waited += slice;
                    if waited >= every {
                        waited = Duration::ZERO;
                        let _ = write!(std::io::stderr(), "{BELL}");
                    }
                }
            })
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        let previous = self
            .alarm
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(Alarm { stop, handle });
        if let Some(old) = previous {
            old.stop.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Notifier for TerminalNotifier {
    fn can_notify(&self) -> bool {
        std::io::stderr().is_terminal()
    }

    fn notify_expired(&self, decision: &Decision) -> Result<(), NotificationError> {
        let mut err = std::io::stderr().lock();
        writeln!(
            err,
            "{BELL}\nTime's up. You waited on: {} ({})",
            decision.text,
            decision.decision_type.label()
        )
        .map_err(|e| NotificationError::Delivery(e.to_string()))?;
        drop(err);

        if let Some(every) = self.repeat {
            self.start_alarm(every)?;
        }
        Ok(())
    }

    fn dismiss(&self) {
        let alarm = self.alarm.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(alarm) = alarm {
            alarm.stop.store(true, Ordering::SeqCst);
            let _ = alarm.handle.join();
        }
    }
}

impl Drop for TerminalNotifier {
    fn drop(&mut self) {
        self.dismiss();
    }
}
