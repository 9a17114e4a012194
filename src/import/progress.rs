use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// Observer for pipeline progress. Injected into the coordinator by the
/// composition root; there is no global emitter.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, percent: u8, message: &str);
}

/// Discards all progress updates.
#[derive(Debug, Default)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_progress(&self, _percent: u8, _message: &str) {}
}

/// Forwards progress onto an unbounded channel for streaming consumers.
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<(u8, String)>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(u8, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelProgress { tx }, rx)
    }
}

impl ProgressObserver for ChannelProgress {
    fn on_progress(&self, percent: u8, message: &str) {
        let _ = self.tx.send((percent, message.to_string()));
    }
}

/// Per-run wrapper that clamps reported percentages so they never move
/// backwards, whatever the interleaving of the reporting stages.
pub struct ProgressReporter {
    observer: Arc<dyn ProgressObserver>,
    last: AtomicU8,
}

impl ProgressReporter {
    pub fn new(observer: Arc<dyn ProgressObserver>) -> Self {
        ProgressReporter {
            observer,
            last: AtomicU8::new(0),
        }
    }

    pub fn report(&self, percent: u8, message: &str) {
        let capped = percent.min(100);
        let previous = self.last.fetch_max(capped, Ordering::SeqCst);
        self.observer.on_progress(capped.max(previous), message);
    }
}
