use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::bounded;
use tracing::{info, warn};

use crate::audio::worker::AudioSinks;
use crate::audio::{AudioError, AudioOutput, AudioWorker, OutputGuard, SynthLink, WavOutput};
use crate::config::AppConfig;
use crate::field::Field;
use crate::session::{FieldSnapshot, Session, SessionCommand, SessionConfig, SessionRunner};
use crate::synth::{SynthConfig, SynthEngine};

/// Blocks the render worker may queue ahead of the WAV writer.
const WAV_QUEUE: usize = 64;

/// Wires field, session, synth and outputs together.
///
/// Audio failures never abort the build: the session just runs without
/// a synth and reports level 0.
pub struct App {
    runner: SessionRunner,
    worker: Option<AudioWorker>,
    output: Option<AudioOutput>,
    wav_handle: Option<JoinHandle<Result<u64, AudioError>>>,
}

impl App {
    pub fn build(
        cfg: &AppConfig,
        play: bool,
        wav: Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let field = match cfg.field.seed {
            Some(seed) => Field::with_seed(cfg.field.width, cfg.field.height, seed)?,
            None => Field::new(cfg.field.width, cfg.field.height)?,
        };

        let (output, device) = if play {
            match AudioOutput::new(cfg.audio.latency_ms) {
                Ok((out, prod)) => (Some(out), Some(prod)),
                Err(e) => {
                    warn!("audio output unavailable: {e}");
                    (None, None)
                }
            }
        } else {
            (None, None)
        };
        let sample_rate = output
            .as_ref()
            .map_or(cfg.audio.sample_rate, AudioOutput::sample_rate);

        let mut wav_handle = None;
        let mut wav_tx = None;
        if let Some(path) = wav {
            let (tx, rx) = bounded::<Arc<[f32]>>(WAV_QUEUE);
            match WavOutput::run(rx, path.clone(), sample_rate) {
                Ok(handle) => {
                    info!("capturing to {path}");
                    wav_handle = Some(handle);
                    wav_tx = Some(tx);
                }
                Err(e) => warn!("wav capture unavailable: {e}"),
            }
        }

        let sinks = AudioSinks {
            device,
            wav: wav_tx,
        };
        let (link, worker) = if sinks.device.is_some() || sinks.wav.is_some() {
            match start_synth(cfg, sample_rate, sinks) {
                Ok((link, worker)) => (Some(link), Some(worker)),
                Err(e) => {
                    warn!("synth unavailable: {e}");
                    (None, None)
                }
            }
        } else {
            info!("no audio sink; running silent");
            (None, None)
        };

        let session = Session::new(
            field,
            link,
            SessionConfig {
                transition_rate: cfg.field.transition_rate,
                audio_enabled: cfg.audio.start_enabled,
                master_volume: cfg.audio.master_volume,
                seed: cfg.field.seed.map(|s| s.wrapping_add(1)),
            },
        );
        let runner = SessionRunner::spawn(session, cfg.session.ticks_per_second)?;

        Ok(Self {
            runner,
            worker,
            output,
            wav_handle,
        })
    }

    pub fn send(&self, cmd: SessionCommand) -> bool {
        self.runner.send(cmd)
    }

    pub fn latest(&mut self) -> &FieldSnapshot {
        self.runner.latest()
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_running()
    }

    /// Stop the session, then the render worker, then finalize any capture.
    pub fn shutdown(mut self) {
        if let Some(session) = self.runner.stop() {
            info!(
                "final state: cycle {}, entropy {:.3}",
                session.cycle(),
                session.entropy()
            );
        }
        if let Some(mut worker) = self.worker.take() {
            worker.stop();
        }
        if let Some(mut output) = self.output.take() {
            output.stop();
        }
        if let Some(handle) = self.wav_handle.take() {
            match handle.join() {
                Ok(Ok(frames)) => info!("wav capture finished ({frames} frames)"),
                Ok(Err(e)) => warn!("wav capture failed: {e}"),
                Err(_) => warn!("wav writer panicked"),
            }
        }
    }
}

fn start_synth(
    cfg: &AppConfig,
    sample_rate: u32,
    sinks: AudioSinks,
) -> Result<(SynthLink, AudioWorker), Box<dyn std::error::Error>> {
    let (link, commands, level) = SynthLink::channel();
    let engine = SynthEngine::new(SynthConfig {
        fs: sample_rate as f32,
        max_voices: cfg.audio.max_voices,
        master_volume: cfg.audio.master_volume,
        start_enabled: cfg.audio.start_enabled,
        seed: cfg.field.seed.map(|s| s.wrapping_add(2)),
        ..SynthConfig::default()
    })?
    .with_shared_level(level)
    .with_cancel_epoch(link.cancel_epoch());
    let guard = OutputGuard::new(cfg.audio.output_guard.mode(), sample_rate);
    let worker = AudioWorker::spawn(engine, commands, sinks, guard)?;
    Ok((link, worker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.field.width = 12;
        cfg.field.height = 8;
        cfg.field.seed = Some(4);
        cfg.session.ticks_per_second = 200.0;
        cfg
    }

    #[test]
    fn silent_app_runs_and_shuts_down() {
        let mut app = App::build(&small_config(), false, None).expect("build");
        assert!(app.send(SessionCommand::Pulse));
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while app.latest().cycle < 5 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let snap = app.latest().clone();
        assert!(snap.cycle >= 5);
        assert!(!snap.audio.available);
        assert_eq!(snap.audio.level, 0.0);
        app.shutdown();
    }

    #[test]
    fn bad_dimensions_fail_the_build() {
        let mut cfg = small_config();
        cfg.field.width = 0;
        assert!(App::build(&cfg, false, None).is_err());
    }

    #[test]
    fn wav_only_app_captures_audio() {
        let mut path = std::env::temp_dir();
        path.push(format!("qntoy_app_test_{}.wav", std::process::id()));
        let mut cfg = small_config();
        cfg.audio.start_enabled = true;
        let mut app =
            App::build(&cfg, false, Some(path.to_string_lossy().to_string())).expect("build");
        assert!(app.latest().audio.available);
        app.send(SessionCommand::Randomize);
        std::thread::sleep(std::time::Duration::from_millis(200));
        app.shutdown();

        let reader = hound::WavReader::open(&path).expect("wav");
        assert_eq!(reader.spec().channels, 2);
        assert!(reader.len() > 0);
        let _ = std::fs::remove_file(&path);
    }
}
