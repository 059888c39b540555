use approx::assert_abs_diff_eq;
use qntoy::field::TriState;
use qntoy::synth::{SynthCommand, SynthConfig, SynthEngine, ToneEvent};

fn engine() -> SynthEngine {
    SynthEngine::new(SynthConfig {
        fs: 16_000.0,
        block: 128,
        seed: Some(8),
        ..SynthConfig::default()
    })
    .unwrap()
}

fn peak(buf: &[f32]) -> f32 {
    buf.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

#[test]
fn tone_rings_then_decays_to_silence() {
    let mut synth = engine();
    synth.apply(SynthCommand::ReverbMix(0.0));
    synth.apply(SynthCommand::Emit(ToneEvent::new(TriState::One, 1.0, 0.0, 1.0)));
    let mut first = vec![0.0f32; 2 * 6400];
    synth.render(&mut first);
    assert!(peak(&first) > 0.01);
    assert_eq!(synth.active_voices(), 0);

    let mut tail = vec![0.0f32; 2 * 16_000];
    synth.render(&mut tail);
    assert!(peak(&tail[tail.len() - 2000..]) < 1e-4);
}

#[test]
fn volume_modulation_maps_activity() {
    let mut synth = engine();
    synth.apply(SynthCommand::ModulateVolume(1.0));
    assert_abs_diff_eq!(synth.master_volume(), 0.30, epsilon = 1e-6);
    synth.apply(SynthCommand::ModulateVolume(0.0));
    assert_abs_diff_eq!(synth.master_volume(), 0.05, epsilon = 1e-6);
    synth.apply(SynthCommand::MasterVolume(4.0));
    assert_abs_diff_eq!(synth.master_volume(), 1.0);
}

#[test]
fn cancel_drops_pending_sweep() {
    let mut synth = engine();
    synth.apply(SynthCommand::Pulse {
        intensity: 1.0,
        entropy_bias: 0.5,
    });
    assert!(synth.scheduled_len() > 0);
    synth.apply(SynthCommand::CancelScheduled);
    assert_eq!(synth.scheduled_len(), 0);
}

#[test]
fn disabled_engine_stays_silent() {
    let mut synth = engine();
    synth.apply(SynthCommand::Disable);
    synth.apply(SynthCommand::Emit(ToneEvent::new(TriState::Two, 1.0, 0.0, 1.0)));
    let mut buf = vec![0.0f32; 2 * 1600];
    synth.render(&mut buf);
    assert_eq!(peak(&buf), 0.0);
    assert_eq!(synth.level(), 0.0);
}
