use clap::Parser;

use crate::config::AppConfig;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Play audio in realtime
    #[arg(long, default_value_t = true, num_args = 0..=1, default_missing_value = "true")]
    pub play: bool,

    /// Disable realtime playback (same as --play false)
    #[arg(long, default_value_t = false, conflicts_with = "play")]
    pub no_play: bool,

    /// Write audio to wav file
    #[arg(long)]
    pub wav: Option<String>,

    /// Path to config TOML
    #[arg(long, default_value = "config.toml")]
    pub config: String,

    /// Stop after this many seconds (runs until Ctrl-C otherwise)
    #[arg(long)]
    pub duration: Option<f32>,

    /// Seed the field and emission draws (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Start with tones enabled (overrides config)
    #[arg(long, default_value_t = false)]
    pub audio: bool,

    /// Fire a pulse every N seconds
    #[arg(long, value_name = "SECONDS")]
    pub pulse_every: Option<f32>,
}

impl Args {
    pub fn playback(&self) -> bool {
        self.play && !self.no_play
    }

    /// Fold command-line overrides into the loaded config.
    pub fn apply_to(&self, cfg: &mut AppConfig) {
        if let Some(seed) = self.seed {
            cfg.field.seed = Some(seed);
        }
        if self.audio {
            cfg.audio.start_enabled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_play_without_capture() {
        let args = Args::try_parse_from(["qntoy"]).unwrap();
        assert!(args.playback());
        assert!(args.wav.is_none());
        assert_eq!(args.config, "config.toml");
    }

    #[test]
    fn no_play_and_overrides() {
        let args = Args::try_parse_from([
            "qntoy",
            "--no-play",
            "--wav",
            "out.wav",
            "--seed",
            "42",
            "--audio",
            "--pulse-every",
            "2.5",
        ])
        .unwrap();
        assert!(!args.playback());
        assert_eq!(args.pulse_every, Some(2.5));

        let mut cfg = AppConfig::default();
        args.apply_to(&mut cfg);
        assert_eq!(cfg.field.seed, Some(42));
        assert!(cfg.audio.start_enabled);
    }

    #[test]
    fn play_false_disables_playback() {
        let args = Args::try_parse_from(["qntoy", "--play", "false"]).unwrap();
        assert!(!args.playback());
    }
}
