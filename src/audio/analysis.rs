use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Serialize;
use std::sync::Arc;

use super::decode::DecodedAudio;
use super::window::SampleWindow;
use crate::error::Anomaly;

/// Immutable analysis output for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectralFrame {
    pub tick: u64,
    /// N/2 non-negative bin magnitudes; a full-scale sine reads ~1.0.
    pub magnitudes: Vec<f32>,
    /// Sum of positive per-bin increases since the previous frame.
    pub spectral_flux: f32,
}

impl SpectralFrame {
    pub fn silent(tick: u64, bins: usize) -> Self {
        Self {
            tick,
            magnitudes: vec![0.0; bins],
            spectral_flux: 0.0,
        }
    }

    pub fn bins(&self) -> usize {
        self.magnitudes.len()
    }

    /// Index of the loudest bin, if any bin is non-zero.
    pub fn peak_bin(&self) -> Option<usize> {
        self.magnitudes
            .iter()
            .enumerate()
            .filter(|(_, m)| **m > 0.0)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// Windowed FFT over a fixed-size sample window. Holds its plan and scratch
/// buffers, so calls are serialized through `&mut self`.
pub struct SpectralAnalyzer {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    scale: f32,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    non_finite_total: u64,
}

impl SpectralAnalyzer {
    pub fn new(size: usize) -> Self {
        let requested = size;
        let size = size.max(2).next_power_of_two();
        if size != requested {
            log::warn!("FFT size {} is not a power of two, using {}", requested, size);
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let hann = hann_window(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            size,
            scale: magnitude_scale(&hann),
            fft,
            hann,
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
            non_finite_total: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bins(&self) -> usize {
        self.size / 2
    }

    /// Total number of non-finite samples replaced with zero so far.
    pub fn non_finite_samples(&self) -> u64 {
        self.non_finite_total
    }

    /// Transform the mono mix of `window` and derive flux against `previous`.
    /// Non-finite input samples are zeroed per channel before mixing.
    /// Windows longer than the transform use their most recent samples;
    /// shorter ones are zero-padded at the front.
    pub fn analyze(
        &mut self,
        window: &SampleWindow,
        previous: Option<&SpectralFrame>,
        tick: u64,
    ) -> SpectralFrame {
        let (mono, replaced) = window.finite_mono();
        let take = mono.len().min(self.size);
        let pad = self.size - take;
        let recent = &mono[mono.len() - take..];

        for c in &mut self.buffer[..pad] {
            *c = Complex::new(0.0, 0.0);
        }
        for (i, &s) in recent.iter().enumerate() {
            // a sum of finite samples can still overflow
            let s = if s.is_finite() { s } else { 0.0 };
            self.buffer[pad + i] = Complex::new(s * self.hann[pad + i], 0.0);
        }

        if replaced > 0 {
            self.record_non_finite(replaced);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        let magnitudes = magnitudes(&self.buffer, self.scale);
        let spectral_flux = previous.map_or(0.0, |p| spectral_flux(&magnitudes, &p.magnitudes));

        SpectralFrame {
            tick,
            magnitudes,
            spectral_flux,
        }
    }

    fn record_non_finite(&mut self, count: usize) {
        let anomaly = Anomaly::NonFiniteInput { count };
        if self.non_finite_total == 0 {
            log::warn!("Corrupted input: {}", anomaly);
        } else {
            log::debug!("Corrupted input: {}", anomaly);
        }
        self.non_finite_total += count as u64;
    }
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("size", &self.size)
            .field("non_finite_total", &self.non_finite_total)
            .finish()
    }
}

/// Σ max(0, current[i] - previous[i]). Spectra of different lengths have no
/// meaningful difference and yield zero.
pub fn spectral_flux(current: &[f32], previous: &[f32]) -> f32 {
    if current.len() != previous.len() {
        return 0.0;
    }
    current
        .iter()
        .zip(previous.iter())
        .map(|(cur, prev)| (cur - prev).max(0.0))
        .sum()
}

/// Analyze a whole decoded track offline. Spectra are computed in parallel,
/// flux in a sequential pass afterwards.
pub fn analyze_track(audio: &DecodedAudio, fft_size: usize, hop: usize) -> Vec<SpectralFrame> {
    let fft_size = fft_size.max(2).next_power_of_two();
    let hop = hop.max(1);
    let samples = audio.mono();
    if samples.is_empty() {
        return Vec::new();
    }

    let hann = hann_window(fft_size);
    let scale = magnitude_scale(&hann);
    let total_frames = samples.len().div_ceil(hop);

    log::info!("Offline analysis: {} frames of {} samples", total_frames, fft_size);

    let spectra: Vec<Vec<f32>> = (0..total_frames)
        .into_par_iter()
        .map(|frame_idx| {
            let start = frame_idx * hop;
            let end = (start + fft_size).min(samples.len());

            let mut fft_input = vec![Complex::new(0.0, 0.0); fft_size];
            for (i, &s) in samples[start..end].iter().enumerate() {
                let s = if s.is_finite() { s } else { 0.0 };
                fft_input[i] = Complex::new(s * hann[i], 0.0);
            }

            // Per-thread FFT planner (rayon-safe)
            let mut planner = FftPlanner::<f32>::new();
            let fft = planner.plan_fft_forward(fft_size);
            fft.process(&mut fft_input);

            magnitudes(&fft_input, scale)
        })
        .collect();

    let mut frames: Vec<SpectralFrame> = Vec::with_capacity(spectra.len());
    for (i, magnitudes) in spectra.into_iter().enumerate() {
        let spectral_flux = frames
            .last()
            .map_or(0.0, |prev| spectral_flux(&magnitudes, &prev.magnitudes));
        frames.push(SpectralFrame {
            tick: i as u64,
            magnitudes,
            spectral_flux,
        });
    }

    frames
}

fn magnitudes(spectrum: &[Complex<f32>], scale: f32) -> Vec<f32> {
    spectrum[..spectrum.len() / 2]
        .iter()
        .map(|c| {
            let m = c.norm() * scale;
            if m.is_finite() { m.max(0.0) } else { 0.0 }
        })
        .collect()
}

/// Amplitude normalization: a sine of peak `a` centred on a bin reads `a`
/// regardless of transform length.
fn magnitude_scale(window: &[f32]) -> f32 {
    let sum: f32 = window.iter().sum();
    if sum > 0.0 { 2.0 / sum } else { 0.0 }
}

fn hann_window(size: usize) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 48_000;

    fn sine(freq: f32, len: usize, amplitude: f32) -> SampleWindow {
        let samples: Vec<f32> = (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / RATE as f32).sin())
            .collect();
        SampleWindow::from_channels(vec![samples], len, RATE)
    }

    #[test]
    fn sine_peaks_at_its_frequency() {
        let mut analyzer = SpectralAnalyzer::new(2048);
        let bin_hz = RATE as f32 / 2048.0;
        for freq in [440.0f32, 1000.0, 5000.0, 12_345.0] {
            let frame = analyzer.analyze(&sine(freq, 2048, 0.8), None, 0);
            let peak = frame.peak_bin().unwrap() as f32;
            let expected = freq / bin_hz;
            assert!(
                (peak - expected).abs() <= 1.0,
                "{}Hz peaked at bin {} (expected ~{:.1})",
                freq, peak, expected
            );
        }
    }

    #[test]
    fn magnitude_is_independent_of_size() {
        let mut small = SpectralAnalyzer::new(1024);
        let mut large = SpectralAnalyzer::new(4096);
        // 1500Hz is bin-centred for both sizes at 48kHz
        let a = small.analyze(&sine(1500.0, 1024, 0.5), None, 0);
        let b = large.analyze(&sine(1500.0, 4096, 0.5), None, 0);
        let pa = a.magnitudes[a.peak_bin().unwrap()];
        let pb = b.magnitudes[b.peak_bin().unwrap()];
        assert!((pa - 0.5).abs() < 0.05, "small peak {}", pa);
        assert!((pb - 0.5).abs() < 0.05, "large peak {}", pb);
    }

    #[test]
    fn flux_is_zero_without_previous_frame() {
        let mut analyzer = SpectralAnalyzer::new(1024);
        let frame = analyzer.analyze(&sine(440.0, 1024, 1.0), None, 0);
        assert_eq!(frame.spectral_flux, 0.0);
    }

    #[test]
    fn flux_is_zero_for_identical_frames() {
        let mut analyzer = SpectralAnalyzer::new(1024);
        let window = sine(440.0, 1024, 1.0);
        let first = analyzer.analyze(&window, None, 0);
        let second = analyzer.analyze(&window, Some(&first), 1);
        assert_eq!(second.spectral_flux, 0.0);
        assert_eq!(first.magnitudes, second.magnitudes);
    }

    #[test]
    fn flux_is_positive_when_a_bin_rises() {
        let mut analyzer = SpectralAnalyzer::new(1024);
        let quiet = analyzer.analyze(&sine(440.0, 1024, 0.1), None, 0);
        let loud = analyzer.analyze(&sine(440.0, 1024, 0.9), Some(&quiet), 1);
        assert!(loud.spectral_flux > 0.0);

        // falling energy contributes nothing
        let fall = analyzer.analyze(&sine(440.0, 1024, 0.1), Some(&loud), 2);
        assert!(fall.spectral_flux < loud.spectral_flux);
    }

    #[test]
    fn flux_helper_ignores_decreases() {
        assert_eq!(spectral_flux(&[1.0, 0.0, 3.0], &[0.5, 2.0, 1.0]), 2.5);
        assert_eq!(spectral_flux(&[1.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn non_finite_samples_are_clamped() {
        let mut analyzer = SpectralAnalyzer::new(256);
        let mut samples = vec![0.25f32; 256];
        samples[3] = f32::NAN;
        samples[100] = f32::INFINITY;
        samples[200] = f32::NEG_INFINITY;
        let window = SampleWindow::from_channels(vec![samples], 256, RATE);
        let frame = analyzer.analyze(&window, None, 0);
        assert!(frame.magnitudes.iter().all(|m| m.is_finite() && *m >= 0.0));
        assert_eq!(analyzer.non_finite_samples(), 3);
    }

    #[test]
    fn corrupted_channel_does_not_hide_the_other() {
        let mut analyzer = SpectralAnalyzer::new(1024);
        let tone = sine(1500.0, 1024, 0.5);
        let right = tone.channel(0).unwrap().to_vec();

        let clean = SampleWindow::from_channels(vec![vec![0.0; 1024], right.clone()], 1024, RATE);
        let corrupted = SampleWindow::from_channels(vec![vec![f32::NAN; 1024], right], 1024, RATE);
        let a = analyzer.analyze(&clean, None, 0);
        let b = analyzer.analyze(&corrupted, None, 1);

        assert_eq!(a.peak_bin(), Some(32));
        assert_eq!(b.peak_bin(), Some(32));
        assert!((b.magnitudes[32] - 0.25).abs() < 0.02, "peak {}", b.magnitudes[32]);
        assert_eq!(analyzer.non_finite_samples(), 1024);
    }

    #[test]
    fn short_window_is_padded() {
        let mut analyzer = SpectralAnalyzer::new(1024);
        let window = SampleWindow::from_channels(vec![vec![0.5; 100]], 100, RATE);
        let frame = analyzer.analyze(&window, None, 4);
        assert_eq!(frame.bins(), 512);
        assert_eq!(frame.tick, 4);
    }

    #[test]
    fn non_power_of_two_is_rounded_up() {
        assert_eq!(SpectralAnalyzer::new(1000).size(), 1024);
    }

    #[test]
    fn offline_frames_chain_flux() {
        let samples: Vec<f32> = (0..8192)
            .map(|i| if i < 4096 { 0.0 } else { (i as f32 * 0.1).sin() })
            .collect();
        let audio = DecodedAudio {
            samples,
            channels: 1,
            sample_rate: RATE,
        };
        let frames = analyze_track(&audio, 1024, 512);
        assert_eq!(frames.len(), 16);
        assert_eq!(frames[0].spectral_flux, 0.0);
        assert!(frames.iter().any(|f| f.spectral_flux > 0.0));
        assert!(frames.windows(2).all(|w| w[0].tick + 1 == w[1].tick));
    }
}
