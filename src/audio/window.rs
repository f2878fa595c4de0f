/// The most recent `len` sample frames of the live stream, one buffer per
/// channel. Every channel has exactly `len` samples; when the stream has fewer
/// than that available the oldest positions are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleWindow {
    channels: Vec<Vec<f32>>,
    len: usize,
    sample_rate: u32,
}

impl SampleWindow {
    /// An all-zero window. A channel count of zero is treated as mono.
    pub fn silent(len: usize, channels: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; len]; channels.max(1)],
            len,
            sample_rate,
        }
    }

    /// Build a window from interleaved samples, keeping the last `len`
    /// complete frames and zero-padding the front if there are fewer.
    pub fn from_interleaved(interleaved: &[f32], channels: usize, len: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let frames = interleaved.len() / channels;
        let take = frames.min(len);
        let first = frames - take;
        let pad = len - take;

        let mut out = vec![vec![0.0f32; len]; channels];
        for (i, frame) in interleaved[first * channels..(first + take) * channels]
            .chunks_exact(channels)
            .enumerate()
        {
            for (ch, &s) in frame.iter().enumerate() {
                out[ch][pad + i] = s;
            }
        }

        Self {
            channels: out,
            len,
            sample_rate,
        }
    }

    /// Build a window from per-channel buffers of possibly unequal length.
    /// Each buffer is cut or front-padded to `len`.
    pub fn from_channels(channels: Vec<Vec<f32>>, len: usize, sample_rate: u32) -> Self {
        if channels.is_empty() {
            return Self::silent(len, 1, sample_rate);
        }
        let channels = channels
            .into_iter()
            .map(|ch| {
                if ch.len() >= len {
                    ch[ch.len() - len..].to_vec()
                } else {
                    let mut padded = vec![0.0; len - ch.len()];
                    padded.extend_from_slice(&ch);
                    padded
                }
            })
            .collect();
        Self {
            channels,
            len,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }

    /// Average of all channels.
    pub fn mono(&self) -> Vec<f32> {
        if self.channels.len() == 1 {
            return self.channels[0].clone();
        }
        let scale = 1.0 / self.channels.len() as f32;
        (0..self.len)
            .map(|i| self.channels.iter().map(|ch| ch[i]).sum::<f32>() * scale)
            .collect()
    }

    /// Mono mix with NaN and infinite samples zeroed in each channel before
    /// averaging, so one corrupted channel does not wipe out the others.
    /// Also returns how many input samples were replaced.
    pub fn finite_mono(&self) -> (Vec<f32>, usize) {
        let scale = 1.0 / self.channels.len() as f32;
        let mut replaced = 0;
        let mut mono = Vec::with_capacity(self.len);
        for i in 0..self.len {
            let mut sum = 0.0;
            for ch in &self.channels {
                if ch[i].is_finite() {
                    sum += ch[i];
                } else {
                    replaced += 1;
                }
            }
            mono.push(sum * scale);
        }
        (mono, replaced)
    }

    pub fn is_silent(&self) -> bool {
        self.channels.iter().all(|ch| ch.iter().all(|&s| s == 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_front_padded() {
        let w = SampleWindow::from_interleaved(&[1.0, 2.0, 3.0, 4.0], 2, 4, 48_000);
        assert_eq!(w.len(), 4);
        assert_eq!(w.channel(0).unwrap(), &[0.0, 0.0, 1.0, 3.0]);
        assert_eq!(w.channel(1).unwrap(), &[0.0, 0.0, 2.0, 4.0]);
    }

    #[test]
    fn long_input_keeps_most_recent_frames() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let w = SampleWindow::from_interleaved(&samples, 1, 4, 48_000);
        assert_eq!(w.channel(0).unwrap(), &[6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn trailing_partial_frame_is_ignored() {
        let w = SampleWindow::from_interleaved(&[1.0, 2.0, 3.0], 2, 2, 44_100);
        assert_eq!(w.channel(0).unwrap(), &[0.0, 1.0]);
        assert_eq!(w.channel(1).unwrap(), &[0.0, 2.0]);
    }

    #[test]
    fn mono_averages_channels() {
        let w = SampleWindow::from_channels(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 2, 44_100);
        assert_eq!(w.mono(), vec![0.5, 0.5]);
    }

    #[test]
    fn finite_mono_zeroes_bad_samples_per_channel() {
        let w = SampleWindow::from_channels(
            vec![vec![f32::NAN, 1.0, f32::INFINITY], vec![0.5, 1.0, 0.25]],
            3,
            44_100,
        );
        let (mono, replaced) = w.finite_mono();
        assert_eq!(mono, vec![0.25, 1.0, 0.125]);
        assert_eq!(replaced, 2);
    }

    #[test]
    fn zero_channels_become_silent_mono() {
        let w = SampleWindow::silent(8, 0, 44_100);
        assert_eq!(w.channel_count(), 1);
        assert!(w.is_silent());
    }
}
