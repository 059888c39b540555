use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::audio::OutputGuardMode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldConfig {
    #[serde(default = "FieldConfig::default_width")]
    pub width: i64,
    #[serde(default = "FieldConfig::default_height")]
    pub height: i64,
    /// Per-cell advance probability of a regular tick.
    #[serde(default = "FieldConfig::default_transition_rate")]
    pub transition_rate: f64,
    /// Fixed seed for reproducible runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl FieldConfig {
    fn default_width() -> i64 {
        160
    }
    fn default_height() -> i64 {
        120
    }
    fn default_transition_rate() -> f64 {
        0.02
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
            transition_rate: Self::default_transition_rate(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_ticks_per_second")]
    pub ticks_per_second: f32,
}

impl SessionConfig {
    fn default_ticks_per_second() -> f32 {
        30.0
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: Self::default_ticks_per_second(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    #[serde(default = "AudioConfig::default_latency_ms")]
    pub latency_ms: f32,
    /// Render rate when no device dictates one.
    #[serde(default = "AudioConfig::default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default)]
    pub output_guard: OutputGuardSetting,
    #[serde(default = "AudioConfig::default_max_voices")]
    pub max_voices: usize,
    /// Tones sound from the first tick instead of waiting for a toggle.
    #[serde(default)]
    pub start_enabled: bool,
    #[serde(default = "AudioConfig::default_master_volume")]
    pub master_volume: f32,
}

impl AudioConfig {
    fn default_latency_ms() -> f32 {
        50.0
    }
    fn default_sample_rate() -> u32 {
        48_000
    }
    fn default_max_voices() -> usize {
        64
    }
    fn default_master_volume() -> f32 {
        0.15
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            latency_ms: Self::default_latency_ms(),
            sample_rate: Self::default_sample_rate(),
            output_guard: OutputGuardSetting::default(),
            max_voices: Self::default_max_voices(),
            start_enabled: false,
            master_volume: Self::default_master_volume(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputGuardSetting {
    None,
    SoftClip,
    #[default]
    PeakLimiter,
}

impl OutputGuardSetting {
    pub fn mode(self) -> OutputGuardMode {
        match self {
            OutputGuardSetting::None => OutputGuardMode::None,
            OutputGuardSetting::SoftClip => OutputGuardMode::SoftClip(Default::default()),
            OutputGuardSetting::PeakLimiter => OutputGuardMode::PeakLimiter(Default::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub field: FieldConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

impl AppConfig {
    fn round_f32(x: f32) -> f32 {
        (x * 1_000_000.0).round() / 1_000_000.0
    }

    fn format_f32_compact(x: f32) -> String {
        let mut s = format!("{:.6}", x);
        while s.contains('.') && s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        if s.is_empty() { "0".to_string() } else { s }
    }

    fn rounded(mut self) -> Self {
        self.session.ticks_per_second = Self::round_f32(self.session.ticks_per_second);
        self.audio.latency_ms = Self::round_f32(self.audio.latency_ms);
        self.audio.master_volume = Self::round_f32(self.audio.master_volume);
        self
    }

    /// Defaults rendered as TOML with every value commented out.
    fn commented_defaults(cfg: &Self) -> Option<String> {
        let text = toml::to_string_pretty(cfg).ok()?;
        let mut commented = String::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                commented.push('\n');
            } else if trimmed.starts_with('[') && trimmed.ends_with(']') {
                commented.push_str(line);
                commented.push('\n');
            } else {
                let mut out_line = line.to_string();
                if let Some((lhs, rhs)) = line.split_once('=') {
                    let rhs_trim = rhs.trim();
                    let has_decimal = rhs_trim.contains('.');
                    if has_decimal
                        && !rhs_trim.contains('"')
                        && let Ok(val) = rhs_trim.parse::<f32>()
                    {
                        let mut formatted = Self::format_f32_compact(val);
                        if !formatted.contains('.') {
                            formatted.push_str(".0");
                        }
                        out_line = format!("{} = {}", lhs.trim(), formatted);
                    }
                }
                commented.push_str("# ");
                commented.push_str(&out_line);
                commented.push('\n');
            }
        }
        Some(commented)
    }

    /// Read `path`, or create it with commented defaults when missing.
    /// Unreadable or invalid files fall back to defaults with a warning.
    pub fn load_or_default(path: &str) -> Self {
        let path_obj = Path::new(path);
        if path_obj.exists() {
            match fs::read_to_string(path_obj) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(cfg) => return cfg,
                    Err(err) => warn!("failed to parse config {path}: {err}; using defaults"),
                },
                Err(err) => warn!("failed to read config {path}: {err}; using defaults"),
            }
            return Self::default();
        }

        let default_cfg = Self::default().rounded();
        match Self::commented_defaults(&default_cfg) {
            Some(text) => match fs::write(path_obj, text) {
                Ok(()) => info!("wrote default config to {path}"),
                Err(err) => warn!("failed to write default config to {path}: {err}"),
            },
            None => warn!("failed to serialize default config; continuing with defaults"),
        }
        default_cfg
    }
}
