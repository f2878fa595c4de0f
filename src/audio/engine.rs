use anyhow::Result;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::decode::{decode_audio, DecodedAudio};
use super::window::SampleWindow;

/// A track decoded ahead of time, ready to be swapped into an engine.
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    pub path: PathBuf,
    pub audio: Arc<DecodedAudio>,
}

/// Decode `path` for playback. This is the slow part of a track change and
/// must run without the engine lock held.
pub fn load_track(path: &Path) -> Result<LoadedTrack> {
    let audio = decode_audio(path)?;
    Ok(LoadedTrack {
        path: path.to_path_buf(),
        audio: Arc::new(audio),
    })
}

/// Produces a [`LoadedTrack`] for a path, usually [`load_track`].
pub type TrackLoader = Box<dyn Fn(&Path) -> Result<LoadedTrack> + Send>;

/// The transport the core drives but does not implement: it owns output and
/// hands out read-only windows of what is currently playing.
pub trait PlaybackEngine: Send {
    /// The most recent `n` frames at the playback position.
    fn current_samples(&self, n: usize) -> SampleWindow;
    fn channel_count(&self) -> usize;
    fn sample_rate(&self) -> u32;
    fn is_playing(&self) -> bool;
    /// True once the loaded track has played to its end.
    fn is_finished(&self) -> bool {
        false
    }
    /// Start playing an already loaded track. Called under the engine lock,
    /// so implementations only swap state here.
    fn play(&mut self, track: LoadedTrack);
    fn stop(&mut self);
}

pub type SharedEngine = Arc<Mutex<dyn PlaybackEngine>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Stopped,
    Playing { started: Instant, offset: usize },
    Paused { at: usize },
}

/// Engine over a fully decoded in-memory track. The position follows the
/// wall clock while playing; nothing is sent to an output device.
#[derive(Debug)]
pub struct DecodedEngine {
    audio: Option<Arc<DecodedAudio>>,
    path: Option<PathBuf>,
    transport: Transport,
}

impl Default for DecodedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodedEngine {
    pub fn new() -> Self {
        Self {
            audio: None,
            path: None,
            transport: Transport::Stopped,
        }
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Playback position in frames, clamped to the track length.
    pub fn position_frames(&self) -> usize {
        let total = self.total_frames();
        let pos = match self.transport {
            Transport::Stopped => 0,
            Transport::Paused { at } => at,
            Transport::Playing { started, offset } => {
                offset + (started.elapsed().as_secs_f64() * self.sample_rate() as f64) as usize
            }
        };
        pos.min(total)
    }

    pub fn position(&self) -> Duration {
        frames_to_duration(self.position_frames(), self.sample_rate())
    }

    pub fn duration(&self) -> Duration {
        self.audio.as_ref().map_or(Duration::ZERO, |a| a.duration())
    }

    pub fn pause(&mut self) {
        if let Transport::Playing { .. } = self.transport {
            self.transport = Transport::Paused {
                at: self.position_frames(),
            };
        }
    }

    pub fn resume(&mut self) {
        if let Transport::Paused { at } = self.transport {
            self.transport = Transport::Playing {
                started: Instant::now(),
                offset: at,
            };
        }
    }

    pub fn seek(&mut self, position: Duration) {
        let frame = ((position.as_secs_f64() * self.sample_rate() as f64) as usize)
            .min(self.total_frames());
        self.transport = match self.transport {
            Transport::Stopped => Transport::Stopped,
            Transport::Paused { .. } => Transport::Paused { at: frame },
            Transport::Playing { .. } => Transport::Playing {
                started: Instant::now(),
                offset: frame,
            },
        };
    }

    fn total_frames(&self) -> usize {
        self.audio.as_ref().map_or(0, |a| a.frames())
    }
}

impl PlaybackEngine for DecodedEngine {
    fn current_samples(&self, n: usize) -> SampleWindow {
        let Some(audio) = self.audio.as_ref() else {
            return SampleWindow::silent(n, 1, 0);
        };
        let end = self.position_frames() * audio.channels;
        SampleWindow::from_interleaved(&audio.samples[..end], audio.channels, n, audio.sample_rate)
    }

    fn channel_count(&self) -> usize {
        self.audio.as_ref().map_or(0, |a| a.channels)
    }

    fn sample_rate(&self) -> u32 {
        self.audio.as_ref().map_or(0, |a| a.sample_rate)
    }

    fn is_playing(&self) -> bool {
        matches!(self.transport, Transport::Playing { .. }) && !self.is_finished()
    }

    fn is_finished(&self) -> bool {
        self.audio.is_some()
            && !matches!(self.transport, Transport::Stopped)
            && self.position_frames() >= self.total_frames()
    }

    fn play(&mut self, track: LoadedTrack) {
        self.audio = Some(track.audio);
        self.path = Some(track.path);
        self.transport = Transport::Playing {
            started: Instant::now(),
            offset: 0,
        };
    }

    fn stop(&mut self) {
        self.transport = Transport::Stopped;
    }
}

fn frames_to_duration(frames: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frames as f64 / sample_rate as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize, channels: usize, sample_rate: u32) -> LoadedTrack {
        LoadedTrack {
            path: PathBuf::from(format!("/ramp/{}x{}.wav", frames, channels)),
            audio: Arc::new(DecodedAudio {
                samples: (0..frames * channels).map(|i| i as f32).collect(),
                channels,
                sample_rate,
            }),
        }
    }

    #[test]
    fn empty_engine_is_silent_and_idle() {
        let engine = DecodedEngine::new();
        assert!(!engine.is_playing());
        assert!(!engine.is_finished());
        assert!(engine.current_samples(64).is_silent());
    }

    #[test]
    fn paused_window_ends_at_position() {
        let mut engine = DecodedEngine::new();
        engine.play(ramp(1000, 2, 1000));
        engine.pause();
        engine.seek(Duration::from_millis(100));
        assert!(!engine.is_playing());
        assert_eq!(engine.position_frames(), 100);

        let window = engine.current_samples(4);
        assert_eq!(window.channel_count(), 2);
        // frames 96..100, left channel holds even interleaved indices
        assert_eq!(window.channel(0).unwrap(), &[192.0, 194.0, 196.0, 198.0]);
    }

    #[test]
    fn start_of_track_is_zero_padded() {
        let mut engine = DecodedEngine::new();
        engine.play(ramp(1000, 1, 1000));
        engine.pause();
        engine.seek(Duration::from_millis(2));
        let window = engine.current_samples(4);
        assert_eq!(window.channel(0).unwrap(), &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn seeking_past_end_finishes() {
        let mut engine = DecodedEngine::new();
        engine.play(ramp(100, 1, 1000));
        engine.seek(Duration::from_secs(10));
        assert!(engine.is_finished());
        assert!(!engine.is_playing());
        engine.stop();
        assert!(!engine.is_finished());
    }

    #[test]
    fn load_reports_decode_failure() {
        assert!(load_track(Path::new("/no/such/file.ogg")).is_err());
    }

    #[test]
    fn play_swaps_in_the_new_track() {
        let mut engine = DecodedEngine::new();
        engine.play(ramp(100, 1, 1000));
        engine.play(ramp(500, 2, 1000));
        assert!(engine.is_playing());
        assert_eq!(engine.channel_count(), 2);
        assert_eq!(engine.duration(), Duration::from_millis(500));
        assert_eq!(engine.current_path(), Some(Path::new("/ramp/500x2.wav")));
    }
}
