use std::collections::VecDeque;

use super::Drawable;
use crate::audio::analysis::SpectralFrame;

/// Rolling time series of the per-frame spectral flux.
#[derive(Debug, Clone)]
pub struct FluxRenderer {
    history: VecDeque<f32>,
    capacity: usize,
}

impl FluxRenderer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn render(&mut self, frame: &SpectralFrame) -> Drawable {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        let flux = if frame.spectral_flux.is_finite() {
            frame.spectral_flux.max(0.0)
        } else {
            0.0
        };
        self.history.push_back(flux);

        let values: Vec<f32> = self.history.iter().copied().collect();
        let peak = values.iter().copied().fold(0.0f32, f32::max);
        Drawable::FluxHistory {
            values,
            capacity: self.capacity,
            peak,
        }
    }
}
