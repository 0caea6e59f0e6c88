//! Progress reporting for reconciliation runs
//!
//! The reconciler emits one [`ProgressEvent`] per contact handled. Callers
//! pick how to consume them: a console bar, a channel for incremental
//! consumers, a closure, or nothing at all.

use dcombine_common::events::ProgressEvent;
use std::io::Write;
use tokio::sync::mpsc;

const BAR_LENGTH: usize = 20;

/// Receives per-contact progress
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressReporter for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Discards progress
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Redraws a `[####----] 40.00%` bar on stdout
pub struct ConsoleProgress;

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(render_bar(&event).as_bytes());
        let _ = stdout.flush();
    }
}

/// Forwards progress to an unbounded channel
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, event: ProgressEvent) {
        // Receiver gone means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

/// Console bar text for `event`, ending with a newline once complete
pub fn render_bar(event: &ProgressEvent) -> String {
    let fraction = if event.total == 0 {
        1.0
    } else {
        (event.processed as f64 / event.total as f64).min(1.0)
    };
    let block = (BAR_LENGTH as f64 * fraction).round() as usize;
    let end = if fraction >= 1.0 { "\r\n" } else { "" };
    format!(
        "\r[{}{}] {:.2}% {}",
        "#".repeat(block),
        "-".repeat(BAR_LENGTH - block),
        fraction * 100.0,
        end
    )
}
