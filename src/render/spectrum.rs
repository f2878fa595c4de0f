use super::{db_scale, Drawable};
use crate::audio::analysis::SpectralFrame;

/// Bar spectrum over log-spaced frequency bands with EMA smoothing.
#[derive(Debug, Clone)]
pub struct SpectrumRenderer {
    bar_count: usize,
    log_scale: bool,
    smoothing: f32,
    bars: Vec<f32>,
    edges: Vec<usize>,
}

impl SpectrumRenderer {
    pub fn new(bar_count: usize, log_scale: bool, smoothing: f32) -> Self {
        Self {
            bar_count: bar_count.max(1),
            log_scale,
            smoothing: smoothing.clamp(0.0, 1.0),
            bars: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn render(&mut self, frame: &SpectralFrame) -> Drawable {
        let bins = frame.bins();
        if self.edges.last().copied() != Some(bins) {
            self.edges = band_edges(bins, self.bar_count);
            self.bars = vec![0.0; self.edges.len().saturating_sub(1)];
        }

        for (bar, band) in self.bars.iter_mut().zip(self.edges.windows(2)) {
            let peak = frame.magnitudes[band[0]..band[1]]
                .iter()
                .copied()
                .fold(0.0f32, f32::max);
            let target = if self.log_scale {
                db_scale(peak)
            } else {
                peak.clamp(0.0, 1.0)
            };
            *bar = self.smoothing * *bar + (1.0 - self.smoothing) * target;
        }

        Drawable::Bars(self.bars.clone())
    }
}

/// Boundaries of `bars` log-spaced bands over `bins` FFT bins, skipping DC.
/// Consecutive edges are strictly increasing, so every band has at least one
/// bin; when there are fewer usable bins than bars, fewer bands come back.
fn band_edges(bins: usize, bars: usize) -> Vec<usize> {
    if bins < 2 {
        return vec![0, bins];
    }
    let usable = bins - 1;
    let mut edges = Vec::with_capacity(bars + 1);
    edges.push(1);
    for i in 1..=bars {
        let ideal = (usable as f32).powf(i as f32 / bars as f32).round() as usize + 1;
        let last = *edges.last().unwrap_or(&1);
        let edge = ideal.max(last + 1).min(bins);
        if edge > last {
            edges.push(edge);
        }
    }
    if edges.last().copied() != Some(bins) {
        edges.push(bins);
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(magnitudes: Vec<f32>) -> SpectralFrame {
        SpectralFrame {
            tick: 0,
            magnitudes,
            spectral_flux: 0.0,
        }
    }

    #[test]
    fn edges_cover_all_bins_without_gaps() {
        for (bins, bars) in [(512, 64), (1024, 32), (8, 64), (2, 4)] {
            let edges = band_edges(bins, bars);
            assert_eq!(*edges.first().unwrap(), 1);
            assert_eq!(*edges.last().unwrap(), bins);
            assert!(edges.windows(2).all(|w| w[0] < w[1]), "{:?}", edges);
            assert!(edges.len() - 1 <= bars);
        }
    }

    #[test]
    fn produces_requested_bar_count() {
        let mut r = SpectrumRenderer::new(64, true, 0.0);
        match r.render(&frame(vec![0.0; 1024])) {
            Drawable::Bars(bars) => assert_eq!(bars.len(), 64),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn loud_high_bin_lights_last_bar() {
        let mut r = SpectrumRenderer::new(16, false, 0.0);
        let mut mags = vec![0.0; 512];
        mags[500] = 1.0;
        let Drawable::Bars(bars) = r.render(&frame(mags)) else {
            panic!("expected bars");
        };
        assert_eq!(*bars.last().unwrap(), 1.0);
        assert!(bars[..bars.len() - 1].iter().all(|&b| b == 0.0));
    }

    #[test]
    fn smoothing_eases_toward_target() {
        let mut r = SpectrumRenderer::new(4, false, 0.5);
        let loud = frame(vec![1.0; 64]);
        let Drawable::Bars(first) = r.render(&loud) else { panic!() };
        assert!((first[0] - 0.5).abs() < 1e-6);
        let Drawable::Bars(second) = r.render(&loud) else { panic!() };
        assert!((second[0] - 0.75).abs() < 1e-6);

        let Drawable::Bars(decay) = r.render(&frame(vec![0.0; 64])) else { panic!() };
        assert!(decay[0] > 0.0 && decay[0] < second[0]);
    }
}
