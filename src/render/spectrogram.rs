use std::collections::VecDeque;
use std::sync::Arc;

use super::{db_scale, Drawable};
use crate::audio::analysis::SpectralFrame;

/// Scrolling spectrogram: a ring of the last `capacity` magnitude columns.
#[derive(Debug, Clone)]
pub struct SpectrogramRenderer {
    columns: VecDeque<Arc<[f32]>>,
    capacity: usize,
}

impl SpectrogramRenderer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            columns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn render(&mut self, frame: &SpectralFrame) -> Drawable {
        let column: Arc<[f32]> = frame.magnitudes.iter().map(|&m| db_scale(m)).collect();
        if self.columns.len() == self.capacity {
            self.columns.pop_front();
        }
        self.columns.push_back(column);

        Drawable::Heatmap {
            columns: self.columns.iter().cloned().collect(),
            capacity: self.capacity,
        }
    }
}
