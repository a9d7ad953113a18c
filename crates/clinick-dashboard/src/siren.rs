//! Alarm playback
//!
//! A [`Siren`] turns a newly alarmed report into a live [`Playback`] that
//! keeps sounding until stopped.

use clinick_core::ReportId;
use std::fmt;
use std::io::Write;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A sounding alarm
pub trait Playback: Send + fmt::Debug {
    /// Silence the alarm; calling it again has no effect
    fn stop(&mut self);

    /// Whether the alarm is still sounding
    fn is_playing(&self) -> bool;
}

/// Source of alarm playbacks
pub trait Siren: Send + Sync {
    /// Start sounding an alarm for one report
    fn sound(&self, report_id: &ReportId, location: &str) -> Box<dyn Playback>;
}

/// Alarm banner text
#[must_use]
pub fn alarm_message(location: &str) -> String {
    format!("EMERGENCY ON {location}")
}

/// Siren that rings the terminal bell and prints a banner on a loop
#[derive(Debug, Clone, Copy)]
pub struct TerminalSiren {
    repeat: Duration,
}

impl TerminalSiren {
    /// Repeat the banner every `repeat`
    #[must_use]
    pub fn new(repeat: Duration) -> Self {
        Self {
            repeat: repeat.max(Duration::from_millis(100)),
        }
    }
}

impl Siren for TerminalSiren {
    fn sound(&self, report_id: &ReportId, location: &str) -> Box<dyn Playback> {
        let message = alarm_message(location);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(report_id = %report_id, "No runtime for siren loop; announcing once");
            ring(&message);
            return Box::new(TerminalPlayback { task: None });
        };

        let repeat = self.repeat;
        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(repeat);
            loop {
                ticker.tick().await;
                ring(&message);
            }
        });

        debug!(report_id = %report_id, "Siren started");
        Box::new(TerminalPlayback { task: Some(task) })
    }
}

fn ring(message: &str) {
    let mut stdout = std::io::stdout().lock();
    // Terminal output is best effort
    let _ = writeln!(stdout, "\x07🚨 {message}");
    let _ = stdout.flush();
}

#[derive(Debug)]
struct TerminalPlayback {
    task: Option<JoinHandle<()>>,
}

impl Playback for TerminalPlayback {
    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn is_playing(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TerminalPlayback {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Siren for headless runs; playbacks only track their own state
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSiren;

impl Siren for SilentSiren {
    fn sound(&self, report_id: &ReportId, location: &str) -> Box<dyn Playback> {
        debug!(report_id = %report_id, location, "Silent alarm raised");
        Box::new(SilentPlayback { playing: true })
    }
}

#[derive(Debug)]
struct SilentPlayback {
    playing: bool,
}

impl Playback for SilentPlayback {
    fn stop(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}
