use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::render::RendererKind;

const MIN_FFT_SIZE: usize = 64;
const MAX_FFT_SIZE: usize = 16384;
const MAX_TICK_HZ: u32 = 240;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub visual: VisualConfig,
    #[serde(default)]
    pub playlist: PlaylistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// Transform length in samples; must be a power of two.
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
}

/// What the producer publishes while the transport is paused or stopped.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdlePolicy {
    /// Publish an explicit all-zero frame every tick.
    #[default]
    Silent,
    /// Publish nothing until playback resumes.
    Suspend,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisualConfig {
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default)]
    pub renderer: RendererKind,
    #[serde(default = "default_bar_count")]
    pub bar_count: usize,
    #[serde(default = "default_log_scale")]
    pub log_scale: bool,
    /// EMA decay for spectrum bars: 0 follows input exactly, 1 freezes.
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_spectrogram_history")]
    pub spectrogram_history: usize,
    #[serde(default = "default_flux_history")]
    pub flux_history: usize,
    /// Normalized amount the VU peak-hold falls per tick.
    #[serde(default = "default_vu_decay")]
    pub vu_decay: f32,
    #[serde(default)]
    pub idle: IdlePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaylistConfig {
    #[serde(default = "default_undo_capacity")]
    pub undo_capacity: usize,
    /// Drop entries whose file no longer exists when loading a saved playlist.
    #[serde(default = "default_skip_missing")]
    pub skip_missing: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
        }
    }
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            renderer: RendererKind::default(),
            bar_count: default_bar_count(),
            log_scale: default_log_scale(),
            smoothing: default_smoothing(),
            spectrogram_history: default_spectrogram_history(),
            flux_history: default_flux_history(),
            vu_decay: default_vu_decay(),
            idle: IdlePolicy::default(),
        }
    }
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            undo_capacity: default_undo_capacity(),
            skip_missing: default_skip_missing(),
        }
    }
}

fn default_fft_size() -> usize { 2048 }
fn default_tick_hz() -> u32 { 60 }
fn default_bar_count() -> usize { 64 }
fn default_log_scale() -> bool { true }
fn default_smoothing() -> f32 { 0.5 }
fn default_spectrogram_history() -> usize { 200 }
fn default_flux_history() -> usize { 2000 }
fn default_vu_decay() -> f32 { 0.05 }
fn default_undo_capacity() -> usize { 100 }
fn default_skip_missing() -> bool { true }

impl Settings {
    /// Clamp every option into its usable range, logging each correction.
    pub fn validated(mut self) -> Self {
        let fft = self
            .analysis
            .fft_size
            .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
            .next_power_of_two();
        if fft != self.analysis.fft_size {
            log::warn!(
                "analysis.fft_size {} is not a power of two in {}..={}, using {}",
                self.analysis.fft_size, MIN_FFT_SIZE, MAX_FFT_SIZE, fft
            );
            self.analysis.fft_size = fft;
        }

        let v = &mut self.visual;
        let hz = v.tick_hz.clamp(1, MAX_TICK_HZ);
        if hz != v.tick_hz {
            log::warn!("visual.tick_hz {} out of range, using {}", v.tick_hz, hz);
            v.tick_hz = hz;
        }
        v.smoothing = clamp_unit("visual.smoothing", v.smoothing);
        v.vu_decay = clamp_unit("visual.vu_decay", v.vu_decay);
        v.bar_count = at_least_one("visual.bar_count", v.bar_count);
        v.spectrogram_history = at_least_one("visual.spectrogram_history", v.spectrogram_history);
        v.flux_history = at_least_one("visual.flux_history", v.flux_history);

        self
    }
}

fn clamp_unit(name: &str, value: f32) -> f32 {
    let clamped = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    if clamped != value {
        log::warn!("{} {} out of range, using {}", name, value, clamped);
    }
    clamped
}

fn at_least_one(name: &str, value: usize) -> usize {
    if value == 0 {
        log::warn!("{} must be at least 1", name);
        return 1;
    }
    value
}

pub fn load_config(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let settings: Settings = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(settings.validated())
}

/// Locate a config file: `./scopeplay.toml`, then the XDG-style
/// `~/.config/scopeplay/config.toml`, then the platform config dir.
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from("scopeplay.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("scopeplay").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("scopeplay").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

/// Default location of the saved playlist.
pub fn playlist_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("scopeplay").join("playlist.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.visual.tick_hz, 60);
        assert_eq!(settings.playlist.undo_capacity, 100);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [visual]
            renderer = "vu_meter"
            tick_hz = 30

            [playlist]
            undo_capacity = 5
            "#,
        )
        .unwrap();
        assert_eq!(settings.visual.renderer, RendererKind::VuMeter);
        assert_eq!(settings.visual.tick_hz, 30);
        assert_eq!(settings.visual.bar_count, 64);
        assert_eq!(settings.playlist.undo_capacity, 5);
        assert_eq!(settings.analysis.fft_size, 2048);
    }

    #[test]
    fn validation_rounds_and_clamps() {
        let mut settings = Settings::default();
        settings.analysis.fft_size = 1000;
        settings.visual.tick_hz = 0;
        settings.visual.smoothing = 1.5;
        settings.visual.flux_history = 0;
        let settings = settings.validated();
        assert_eq!(settings.analysis.fft_size, 1024);
        assert_eq!(settings.visual.tick_hz, 1);
        assert_eq!(settings.visual.smoothing, 1.0);
        assert_eq!(settings.visual.flux_history, 1);
    }

    #[test]
    fn tiny_fft_size_is_raised() {
        let mut settings = Settings::default();
        settings.analysis.fft_size = 3;
        assert_eq!(settings.validated().analysis.fft_size, MIN_FFT_SIZE);
    }
}
