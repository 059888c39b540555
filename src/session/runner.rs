use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded, unbounded};
use tracing::{debug, info, warn};

use super::orchestrator::Session;
use super::snapshot::FieldSnapshot;
use crate::field::Gate;

/// Snapshots the runner may have in flight before it starts skipping them.
pub const SNAPSHOT_CAPACITY: usize = 8;

/// Everything an outer surface can ask of a running session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionCommand {
    /// One extra tick at the given rate.
    Step(f64),
    Pulse,
    Reset,
    Randomize,
    Gate(Gate),
    EnableAudio,
    DisableAudio,
    ToggleAudio,
    SetMasterVolume(f32),
    SetTransitionRate(f64),
    Pause,
    Resume,
    Shutdown,
}

fn apply(session: &mut Session, cmd: SessionCommand) {
    match cmd {
        SessionCommand::Step(rate) => session.step(rate),
        SessionCommand::Pulse => session.pulse(),
        SessionCommand::Reset => session.reset(),
        SessionCommand::Randomize => session.randomize(),
        SessionCommand::Gate(gate) => {
            session.apply_gate(gate);
        }
        SessionCommand::EnableAudio => session.enable_audio(),
        SessionCommand::DisableAudio => session.disable_audio(),
        SessionCommand::ToggleAudio => {
            session.toggle_audio();
        }
        SessionCommand::SetMasterVolume(v) => session.set_master_volume(v),
        SessionCommand::SetTransitionRate(rate) => session.set_transition_rate(rate),
        SessionCommand::Pause => session.pause(),
        SessionCommand::Resume => session.resume(),
        SessionCommand::Shutdown => {}
    }
}

/// Runs a [`Session`] on its own thread at a fixed tick rate.
///
/// Commands are applied between ticks; a snapshot goes out after each one.
pub struct SessionRunner {
    handle: Option<JoinHandle<Session>>,
    commands: Sender<SessionCommand>,
    snapshots: Receiver<FieldSnapshot>,
    stop: Arc<AtomicBool>,
    latest: FieldSnapshot,
}

impl SessionRunner {
    pub fn spawn(session: Session, ticks_per_second: f32) -> std::io::Result<Self> {
        let period = tick_period(ticks_per_second);
        let (cmd_tx, cmd_rx) = unbounded();
        let (snap_tx, snap_rx) = bounded(SNAPSHOT_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_loop = stop.clone();
        let latest = session.snapshot();
        let handle = std::thread::Builder::new()
            .name("session".into())
            .spawn(move || tick_loop(session, period, cmd_rx, snap_tx, stop_loop))?;
        Ok(Self {
            handle: Some(handle),
            commands: cmd_tx,
            snapshots: snap_rx,
            stop,
            latest,
        })
    }

    /// Queue a command for the next gap between ticks. `false` once the loop has ended.
    pub fn send(&self, cmd: SessionCommand) -> bool {
        self.commands.send(cmd).is_ok()
    }

    /// Newest snapshot published so far; older queued ones are discarded.
    pub fn latest(&mut self) -> &FieldSnapshot {
        if let Some(snap) = self.snapshots.try_iter().last() {
            self.latest = snap;
        }
        &self.latest
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// End the loop and hand the session back, scheduled tones cancelled.
    pub fn stop(&mut self) -> Option<Session> {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.commands.send(SessionCommand::Shutdown);
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(session) => Some(session),
            Err(_) => {
                warn!("session thread panicked");
                None
            }
        }
    }
}

impl Drop for SessionRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tick_period(ticks_per_second: f32) -> Duration {
    let tps = if ticks_per_second.is_finite() && ticks_per_second > 0.0 {
        ticks_per_second
    } else {
        30.0
    };
    Duration::from_secs_f32(1.0 / tps)
}

fn tick_loop(
    mut session: Session,
    period: Duration,
    commands: Receiver<SessionCommand>,
    snapshots: Sender<FieldSnapshot>,
    stop: Arc<AtomicBool>,
) -> Session {
    let mut next_deadline = Instant::now();
    info!(
        "session started ({}x{}, {:.1} ticks/s)",
        session.field().width(),
        session.field().height(),
        1.0 / period.as_secs_f32()
    );
    'run: while !stop.load(Ordering::SeqCst) {
        loop {
            match commands.try_recv() {
                Ok(SessionCommand::Shutdown) | Err(TryRecvError::Disconnected) => break 'run,
                Ok(cmd) => {
                    debug!(?cmd, "session command");
                    apply(&mut session, cmd);
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        session.tick();
        match snapshots.try_send(session.snapshot()) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => break,
        }

        next_deadline += period;
        let now = Instant::now();
        if now < next_deadline {
            std::thread::sleep(next_deadline - now);
        } else {
            next_deadline = now;
        }
    }
    session.shutdown();
    info!("session stopped at cycle {}", session.cycle());
    session
}
