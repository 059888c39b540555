use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, warn};

use crate::synth::{CancelEpoch, SharedLevel, SynthCommand};

/// Queue depth between the session and the render worker.
pub const COMMAND_CAPACITY: usize = 1024;

/// Session-side handle to a running synth: a command queue, the cancel epoch
/// and the level meter.
#[derive(Debug, Clone)]
pub struct SynthLink {
    tx: Sender<SynthCommand>,
    level: Arc<SharedLevel>,
    cancel: Arc<CancelEpoch>,
    dropped: Arc<AtomicU64>,
}

impl SynthLink {
    pub fn new(tx: Sender<SynthCommand>, level: Arc<SharedLevel>) -> Self {
        Self {
            tx,
            level,
            cancel: CancelEpoch::new(),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A link and the receiving end the render worker drains.
    pub fn channel() -> (Self, Receiver<SynthCommand>, Arc<SharedLevel>) {
        let (tx, rx) = bounded(COMMAND_CAPACITY);
        let level = SharedLevel::new();
        (Self::new(tx, level.clone()), rx, level)
    }

    /// Queue `cmd` without blocking. A full queue drops the command; returns
    /// `false` only when the synth side is gone.
    pub fn send(&self, cmd: SynthCommand) -> bool {
        match self.tx.try_send(cmd) {
            Ok(()) => true,
            Err(TrySendError::Full(cmd)) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if n.is_power_of_two() {
                    warn!("synth queue full, {n} commands dropped so far");
                } else {
                    debug!("synth queue full, dropped {cmd:?}");
                }
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Cancel every scheduled tone. The epoch bump reaches the engine even
    /// when the queued command is dropped.
    pub fn cancel_scheduled(&self) -> bool {
        self.cancel.bump();
        self.send(SynthCommand::CancelScheduled)
    }

    /// Epoch the render-side engine watches; see [`SynthEngine::with_cancel_epoch`].
    ///
    /// [`SynthEngine::with_cancel_epoch`]: crate::synth::SynthEngine::with_cancel_epoch
    pub fn cancel_epoch(&self) -> Arc<CancelEpoch> {
        self.cancel.clone()
    }

    /// Commands lost to a full queue since the link was created.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn level(&self) -> f32 {
        self.level.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_reports_disconnect() {
        let (link, rx, _) = SynthLink::channel();
        assert!(link.send(SynthCommand::Enable));
        assert_eq!(rx.try_recv().unwrap(), SynthCommand::Enable);
        drop(rx);
        assert!(!link.send(SynthCommand::Disable));
    }

    #[test]
    fn full_queue_drops_without_failing() {
        let (tx, rx) = bounded(1);
        let link = SynthLink::new(tx, SharedLevel::new());
        assert!(link.send(SynthCommand::Enable));
        assert!(link.send(SynthCommand::Disable));
        assert_eq!(rx.len(), 1);
        assert_eq!(link.dropped(), 1);
    }

    #[test]
    fn cancel_survives_a_full_queue() {
        let (tx, rx) = bounded(1);
        let link = SynthLink::new(tx, SharedLevel::new());
        let epoch = link.cancel_epoch();
        assert!(link.send(SynthCommand::Enable));
        assert!(link.cancel_scheduled());
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![SynthCommand::Enable]);
        assert_eq!(epoch.load(), 1);
    }

    #[test]
    fn level_reads_shared_meter() {
        let (link, _rx, level) = SynthLink::channel();
        assert_eq!(link.level(), 0.0);
        level.store(0.42);
        assert_eq!(link.level(), 0.42);
    }
}
