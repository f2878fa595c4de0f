use super::{downsample, Drawable, TRACE_POINTS};
use crate::audio::window::SampleWindow;

/// Time-domain waveform of the mono mix.
#[derive(Debug, Clone, Copy, Default)]
pub struct OscilloscopeRenderer;

impl OscilloscopeRenderer {
    pub fn render(&self, window: &SampleWindow) -> Drawable {
        let mono: Vec<f32> = window
            .mono()
            .into_iter()
            .map(|s| if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 })
            .collect();
        Drawable::Waveform(downsample(&mono, TRACE_POINTS))
    }
}

/// Channel pairs plotted against each other: (0, 1), (2, 3), ...
///
/// A channel without a partner (including plain mono input) is drawn as a
/// flat horizontal line: its samples on x, zero on y.
#[derive(Debug, Clone, Copy, Default)]
pub struct LissajousRenderer;

impl LissajousRenderer {
    pub fn render(&self, window: &SampleWindow) -> Drawable {
        let channels: Vec<Vec<f32>> = window
            .channels()
            .map(|ch| {
                downsample(ch, TRACE_POINTS)
                    .into_iter()
                    .map(|s| if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 })
                    .collect()
            })
            .collect();

        let traces = channels
            .chunks(2)
            .map(|pair| -> Vec<(f32, f32)> {
                match pair {
                    [x, y] => x.iter().copied().zip(y.iter().copied()).collect(),
                    [x] => x.iter().map(|&s| (s, 0.0)).collect(),
                    _ => Vec::new(),
                }
            })
            .collect();

        Drawable::Traces(traces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oscilloscope_downsamples_and_clamps() {
        let samples: Vec<f32> = (0..2048).map(|i| if i % 2 == 0 { 2.0 } else { -2.0 }).collect();
        let window = SampleWindow::from_channels(vec![samples], 2048, 48_000);
        let Drawable::Waveform(points) = OscilloscopeRenderer.render(&window) else {
            panic!("expected waveform");
        };
        assert_eq!(points.len(), TRACE_POINTS);
        assert!(points.iter().all(|p| (-1.0..=1.0).contains(p)));
    }

    #[test]
    fn stereo_pairs_left_against_right() {
        let window =
            SampleWindow::from_channels(vec![vec![0.1, 0.2], vec![-0.1, -0.2]], 2, 48_000);
        let Drawable::Traces(traces) = LissajousRenderer.render(&window) else {
            panic!("expected traces");
        };
        assert_eq!(traces, vec![vec![(0.1, -0.1), (0.2, -0.2)]]);
    }

    #[test]
    fn mono_degrades_to_flat_line() {
        let window = SampleWindow::from_channels(vec![vec![0.5, -0.25, 0.75]], 3, 48_000);
        let Drawable::Traces(traces) = LissajousRenderer.render(&window) else {
            panic!("expected traces");
        };
        assert_eq!(traces.len(), 1);
        assert!(traces[0].iter().all(|&(_, y)| y == 0.0));
        assert_eq!(traces[0][0].0, 0.5);
    }

    #[test]
    fn odd_channel_count_flattens_the_last() {
        let window = SampleWindow::silent(16, 3, 48_000);
        let Drawable::Traces(traces) = LissajousRenderer.render(&window) else {
            panic!("expected traces");
        };
        assert_eq!(traces.len(), 2);
    }
}
