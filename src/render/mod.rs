//! Renderer variants: pure mappings from one analysis frame (plus bounded
//! local history) to a drawable description.

pub mod flux;
pub mod meter;
pub mod scope;
pub mod spectrogram;
pub mod spectrum;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::audio::analysis::SpectralFrame;
use crate::audio::window::SampleWindow;
use crate::config::VisualConfig;

pub use flux::FluxRenderer;
pub use meter::{MeterLevel, VuMeterRenderer};
pub use scope::{LissajousRenderer, OscilloscopeRenderer};
pub use spectrogram::SpectrogramRenderer;
pub use spectrum::SpectrumRenderer;

/// Lower bound of the dB mapping used for log-scaled magnitudes.
pub const DB_FLOOR: f32 = -80.0;

/// Maximum number of points in waveform and Lissajous traces.
pub const TRACE_POINTS: usize = 512;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    #[default]
    Spectrum,
    Spectrogram,
    Oscilloscope,
    Lissajous,
    SpectralFlux,
    VuMeter,
}

impl RendererKind {
    pub const ALL: [RendererKind; 6] = [
        RendererKind::Spectrum,
        RendererKind::Spectrogram,
        RendererKind::Oscilloscope,
        RendererKind::Lissajous,
        RendererKind::SpectralFlux,
        RendererKind::VuMeter,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            RendererKind::Spectrum => "Spectrum",
            RendererKind::Spectrogram => "Spectrogram",
            RendererKind::Oscilloscope => "Oscilloscope",
            RendererKind::Lissajous => "Lissajous",
            RendererKind::SpectralFlux => "Spectral Flux",
            RendererKind::VuMeter => "VU Meter",
        }
    }
}

/// What a renderer hands to the UI layer for drawing.
#[derive(Debug, Clone, PartialEq)]
pub enum Drawable {
    /// Bar heights in [0, 1], low to high frequency.
    Bars(Vec<f32>),
    /// Oldest column first; each column is low to high frequency in [0, 1].
    Heatmap {
        columns: Vec<Arc<[f32]>>,
        capacity: usize,
    },
    /// Samples in [-1, 1].
    Waveform(Vec<f32>),
    /// One (x, y) trace per channel pair, coordinates in [-1, 1].
    Traces(Vec<Vec<(f32, f32)>>),
    /// Oldest first.
    FluxHistory {
        values: Vec<f32>,
        capacity: usize,
        peak: f32,
    },
    Meters(Vec<MeterLevel>),
}

impl Drawable {
    /// One-line terminal preview of the drawable, `width` cells wide.
    pub fn sparkline(&self, width: usize) -> String {
        match self {
            Drawable::Bars(bars) => spark(bars, width, 1.0),
            Drawable::Heatmap { columns, .. } => columns
                .last()
                .map(|col| spark(col, width, 1.0))
                .unwrap_or_default(),
            Drawable::Waveform(samples) => {
                let abs: Vec<f32> = samples.iter().map(|s| s.abs()).collect();
                spark(&abs, width, 1.0)
            }
            Drawable::Traces(traces) => {
                let abs: Vec<f32> = traces
                    .first()
                    .map(|t| t.iter().map(|(x, y)| (x - y).abs() * 0.5).collect())
                    .unwrap_or_default();
                spark(&abs, width, 1.0)
            }
            Drawable::FluxHistory { values, peak, .. } => {
                let tail = &values[values.len().saturating_sub(width)..];
                spark(tail, tail.len(), peak.max(f32::EPSILON))
            }
            Drawable::Meters(levels) => levels
                .iter()
                .map(|l| {
                    let filled = (l.rms * width as f32).round() as usize;
                    let hold = ((l.hold * width as f32) as usize).min(width.saturating_sub(1));
                    (0..width)
                        .map(|i| {
                            if i < filled {
                                '█'
                            } else if i == hold {
                                '|'
                            } else {
                                '·'
                            }
                        })
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn spark(values: &[f32], width: usize, scale: f32) -> String {
    if values.is_empty() || width == 0 {
        return String::new();
    }
    (0..width.min(values.len()))
        .map(|cell| {
            let start = cell * values.len() / width.min(values.len());
            let end = ((cell + 1) * values.len() / width.min(values.len())).max(start + 1);
            let v = values[start..end].iter().copied().fold(0.0f32, f32::max) / scale;
            let idx = (v.clamp(0.0, 1.0) * (SPARKS.len() - 1) as f32).round() as usize;
            SPARKS[idx]
        })
        .collect()
}

/// Map a linear magnitude onto [0, 1] over the range `DB_FLOOR..=0` dBFS.
pub fn db_scale(magnitude: f32) -> f32 {
    if magnitude <= 0.0 || !magnitude.is_finite() {
        return 0.0;
    }
    let db = 20.0 * magnitude.log10();
    ((db - DB_FLOOR) / -DB_FLOOR).clamp(0.0, 1.0)
}

/// Evenly pick at most `max` points from `samples`.
pub(crate) fn downsample(samples: &[f32], max: usize) -> Vec<f32> {
    if samples.len() <= max {
        return samples.to_vec();
    }
    (0..max).map(|i| samples[i * samples.len() / max]).collect()
}

/// The closed set of visualizations, dispatched through [`Renderer::render`].
#[derive(Debug, Clone)]
pub enum Renderer {
    Spectrum(SpectrumRenderer),
    Spectrogram(SpectrogramRenderer),
    Oscilloscope(OscilloscopeRenderer),
    Lissajous(LissajousRenderer),
    SpectralFlux(FluxRenderer),
    VuMeter(VuMeterRenderer),
}

impl Renderer {
    pub fn new(kind: RendererKind, config: &VisualConfig) -> Self {
        match kind {
            RendererKind::Spectrum => Renderer::Spectrum(SpectrumRenderer::new(
                config.bar_count,
                config.log_scale,
                config.smoothing,
            )),
            RendererKind::Spectrogram => {
                Renderer::Spectrogram(SpectrogramRenderer::new(config.spectrogram_history))
            }
            RendererKind::Oscilloscope => Renderer::Oscilloscope(OscilloscopeRenderer),
            RendererKind::Lissajous => Renderer::Lissajous(LissajousRenderer),
            RendererKind::SpectralFlux => {
                Renderer::SpectralFlux(FluxRenderer::new(config.flux_history))
            }
            RendererKind::VuMeter => Renderer::VuMeter(VuMeterRenderer::new(config.vu_decay)),
        }
    }

    pub fn kind(&self) -> RendererKind {
        match self {
            Renderer::Spectrum(_) => RendererKind::Spectrum,
            Renderer::Spectrogram(_) => RendererKind::Spectrogram,
            Renderer::Oscilloscope(_) => RendererKind::Oscilloscope,
            Renderer::Lissajous(_) => RendererKind::Lissajous,
            Renderer::SpectralFlux(_) => RendererKind::SpectralFlux,
            Renderer::VuMeter(_) => RendererKind::VuMeter,
        }
    }

    pub fn render(&mut self, frame: &SpectralFrame, window: &SampleWindow) -> Drawable {
        match self {
            Renderer::Spectrum(r) => r.render(frame),
            Renderer::Spectrogram(r) => r.render(frame),
            Renderer::Oscilloscope(r) => r.render(window),
            Renderer::Lissajous(r) => r.render(window),
            Renderer::SpectralFlux(r) => r.render(frame),
            Renderer::VuMeter(r) => r.render(window),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent() -> (SpectralFrame, SampleWindow) {
        (SpectralFrame::silent(0, 512), SampleWindow::silent(1024, 2, 48_000))
    }

    #[test]
    fn every_variant_tolerates_silence() {
        let config = VisualConfig::default();
        let (frame, window) = silent();
        for kind in RendererKind::ALL {
            let mut renderer = Renderer::new(kind, &config);
            assert_eq!(renderer.kind(), kind);
            let drawable = renderer.render(&frame, &window);
            let line = drawable.sparkline(16);
            assert!(!line.contains('█'), "{:?} drew {}", kind, line);
        }
    }

    #[test]
    fn db_scale_spans_floor_to_full_scale() {
        assert_eq!(db_scale(0.0), 0.0);
        assert_eq!(db_scale(1.0), 1.0);
        assert_eq!(db_scale(2.0), 1.0);
        assert!((db_scale(0.01) - 0.5).abs() < 1e-5);
        assert_eq!(db_scale(f32::NAN), 0.0);
    }

    #[test]
    fn sparkline_maps_extremes() {
        let line = Drawable::Bars(vec![0.0, 1.0]).sparkline(2);
        assert_eq!(line, "▁█");
    }

    #[test]
    fn downsample_keeps_short_input() {
        assert_eq!(downsample(&[1.0, 2.0], 4), vec![1.0, 2.0]);
        assert_eq!(downsample(&[0.0, 1.0, 2.0, 3.0], 2), vec![0.0, 2.0]);
    }

    #[test]
    fn kind_round_trips_through_config_names() {
        let kind: RendererKind = serde_json::from_str("\"spectral_flux\"").unwrap();
        assert_eq!(kind, RendererKind::SpectralFlux);
    }
}
