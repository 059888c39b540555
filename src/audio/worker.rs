use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use ringbuf::HeapProd;
use tracing::{info, trace, warn};

use super::output::AudioOutput;
use super::output_guard::OutputGuard;
use super::{AudioError, CHANNELS};
use crate::synth::{SynthCommand, SynthEngine};

/// Where rendered blocks go. With a device ring the ring paces rendering;
/// otherwise the worker sleeps to a real-time deadline.
#[derive(Default)]
pub struct AudioSinks {
    pub device: Option<HeapProd<f32>>,
    pub wav: Option<Sender<Arc<[f32]>>>,
}

/// Render thread: drains synth commands, renders blocks, guards and ships them.
pub struct AudioWorker {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl AudioWorker {
    pub fn spawn(
        engine: SynthEngine,
        commands: Receiver<SynthCommand>,
        sinks: AudioSinks,
        guard: OutputGuard,
    ) -> Result<Self, AudioError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_worker = stop.clone();
        let handle = std::thread::Builder::new()
            .name("audio-render".into())
            .spawn(move || render_loop(engine, commands, sinks, guard, stop_worker))
            .map_err(|e| AudioError::Thread(e.to_string()))?;
        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AudioWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn render_loop(
    mut engine: SynthEngine,
    commands: Receiver<SynthCommand>,
    mut sinks: AudioSinks,
    mut guard: OutputGuard,
    stop: Arc<AtomicBool>,
) {
    let time = engine.time();
    let mut block = vec![0.0f32; time.block * CHANNELS];
    let block_duration = time.block_duration();
    let mut next_deadline = Instant::now();
    let mut session_gone = false;

    info!("audio render started ({} frames per block)", time.block);
    while !stop.load(Ordering::SeqCst) {
        loop {
            match commands.try_recv() {
                Ok(cmd) => engine.apply(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    session_gone = true;
                    break;
                }
            }
        }

        engine.render(&mut block);
        guard.process_interleaved(&mut block, CHANNELS);
        let overs = guard.take_overs();
        if overs > 0 {
            trace!("output guard engaged on {overs} samples");
        }

        let wav_failed = sinks
            .wav
            .as_ref()
            .is_some_and(|tx| tx.send(Arc::from(&block[..])).is_err());
        if wav_failed {
            warn!("wav writer stopped; continuing without capture");
            sinks.wav = None;
        }

        if let Some(prod) = sinks.device.as_mut() {
            AudioOutput::push_samples(prod, &block, &stop);
        } else {
            next_deadline += block_duration;
            let now = Instant::now();
            if now < next_deadline {
                std::thread::sleep(next_deadline - now);
            } else {
                next_deadline = now;
                trace!("audio render overrun");
            }
        }

        if session_gone && engine.active_voices() == 0 && engine.scheduled_len() == 0 {
            break;
        }
    }
    info!("audio render stopped at tick {}", engine.now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output_guard::OutputGuardMode;
    use crate::field::TriState;
    use crate::synth::{SynthConfig, ToneEvent};
    use crossbeam_channel::bounded;

    #[test]
    fn renders_commands_into_wav_sink_until_session_drops() {
        let engine = SynthEngine::new(SynthConfig {
            fs: 8_000.0,
            block: 64,
            seed: Some(3),
            ..SynthConfig::default()
        })
        .unwrap();
        let (cmd_tx, cmd_rx) = bounded(16);
        let (wav_tx, wav_rx) = bounded::<Arc<[f32]>>(1024);
        cmd_tx
            .send(SynthCommand::Emit(ToneEvent::new(TriState::Two, 1.0, 0.0, 1.0)))
            .unwrap();
        drop(cmd_tx);

        let mut worker = AudioWorker::spawn(
            engine,
            cmd_rx,
            AudioSinks {
                device: None,
                wav: Some(wav_tx),
            },
            OutputGuard::new(OutputGuardMode::None, 8_000),
        )
        .unwrap();

        // the worker exits by itself once the tone has rung out
        let mut blocks = Vec::new();
        while let Ok(b) = wav_rx.recv_timeout(std::time::Duration::from_secs(5)) {
            blocks.push(b);
        }
        worker.stop();
        assert!(blocks.len() >= (0.35 * 8_000.0 / 64.0) as usize);
        assert!(blocks.iter().all(|b| b.len() == 128));
        assert!(blocks.iter().flat_map(|b| b.iter()).any(|s| s.abs() > 1e-3));
    }
}
