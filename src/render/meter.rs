use super::Drawable;
use crate::audio::window::SampleWindow;

/// Normalized levels for one channel, all in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterLevel {
    pub rms: f32,
    pub peak: f32,
    /// Peak-hold marker: jumps up with the signal, falls by the decay rate.
    pub hold: f32,
}

/// Per-channel VU meter with peak-hold decay.
#[derive(Debug, Clone)]
pub struct VuMeterRenderer {
    decay: f32,
    holds: Vec<f32>,
}

impl VuMeterRenderer {
    pub fn new(decay: f32) -> Self {
        Self {
            decay: decay.clamp(0.0, 1.0),
            holds: Vec::new(),
        }
    }

    pub fn render(&mut self, window: &SampleWindow) -> Drawable {
        if self.holds.len() != window.channel_count() {
            self.holds = vec![0.0; window.channel_count()];
        }

        let levels = window
            .channels()
            .zip(self.holds.iter_mut())
            .map(|(samples, hold)| {
                let (rms, peak) = channel_levels(samples);
                *hold = if peak >= *hold {
                    peak
                } else {
                    (*hold - self.decay).max(peak)
                };
                MeterLevel {
                    rms,
                    peak,
                    hold: *hold,
                }
            })
            .collect();

        Drawable::Meters(levels)
    }
}

fn channel_levels(samples: &[f32]) -> (f32, f32) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let mut sum = 0.0f32;
    let mut peak = 0.0f32;
    for &s in samples {
        let s = if s.is_finite() { s.abs() } else { 0.0 };
        sum += s * s;
        peak = peak.max(s);
    }
    let rms = (sum / samples.len() as f32).sqrt();
    (rms.clamp(0.0, 1.0), peak.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(level: f32) -> SampleWindow {
        SampleWindow::from_channels(vec![vec![level; 64], vec![level * 0.5; 64]], 64, 48_000)
    }

    fn meters(d: Drawable) -> Vec<MeterLevel> {
        match d {
            Drawable::Meters(m) => m,
            other => panic!("expected meters, got {:?}", other),
        }
    }

    #[test]
    fn hold_decays_gradually_after_a_peak() {
        let mut r = VuMeterRenderer::new(0.1);
        let first = meters(r.render(&window(0.8)));
        assert!((first[0].hold - 0.8).abs() < 1e-6);
        assert!((first[1].hold - 0.4).abs() < 1e-6);

        let mut last = first[0].hold;
        for _ in 0..3 {
            let m = meters(r.render(&window(0.0)));
            assert!(m[0].hold < last);
            assert!((last - m[0].hold - 0.1).abs() < 1e-5, "fell more than one step");
            last = m[0].hold;
        }

        for _ in 0..20 {
            r.render(&window(0.0));
        }
        let m = meters(r.render(&window(0.0)));
        assert_eq!(m[0].hold, 0.0);
    }

    #[test]
    fn hold_never_falls_below_current_peak() {
        let mut r = VuMeterRenderer::new(0.5);
        r.render(&window(0.9));
        let m = meters(r.render(&window(0.7)));
        assert!((m[0].hold - 0.7).abs() < 1e-6);
    }

    #[test]
    fn levels_are_clamped() {
        let mut r = VuMeterRenderer::new(0.05);
        let m = meters(r.render(&window(3.0)));
        assert_eq!(m[0].peak, 1.0);
        assert_eq!(m[0].rms, 1.0);
        assert_eq!(m[0].hold, 1.0);
    }

    #[test]
    fn mono_window_has_one_meter() {
        let mut r = VuMeterRenderer::new(0.05);
        let m = meters(r.render(&SampleWindow::silent(32, 1, 44_100)));
        assert_eq!(m.len(), 1);
        assert_eq!(m[0], MeterLevel::default());
    }
}
