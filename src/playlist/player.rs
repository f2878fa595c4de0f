use anyhow::{Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::{EntryId, SharedPlaylist};
use crate::audio::engine::{load_track, LoadedTrack, SharedEngine, TrackLoader};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackMode {
    pub shuffle: bool,
    /// Replay the current track when it ends.
    pub repeat: bool,
}

/// Drives the engine through the playlist: explicit selection, next and
/// previous, and advancing when a track ends.
pub struct Player {
    playlist: SharedPlaylist,
    engine: SharedEngine,
    loader: TrackLoader,
    mode: PlaybackMode,
    current: Option<EntryId>,
    /// Where sequential play resumes when `current` is no longer listed.
    resume_at: usize,
    rng: SmallRng,
}

impl Player {
    pub fn new(playlist: SharedPlaylist, engine: SharedEngine, mode: PlaybackMode) -> Self {
        Self::with_rng(playlist, engine, mode, SmallRng::from_os_rng())
    }

    /// Deterministic shuffle order.
    pub fn with_seed(
        playlist: SharedPlaylist,
        engine: SharedEngine,
        mode: PlaybackMode,
        seed: u64,
    ) -> Self {
        Self::with_rng(playlist, engine, mode, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(
        playlist: SharedPlaylist,
        engine: SharedEngine,
        mode: PlaybackMode,
        rng: SmallRng,
    ) -> Self {
        Self {
            playlist,
            engine,
            loader: Box::new(load_track),
            mode,
            current: None,
            resume_at: 0,
            rng,
        }
    }

    /// Replace how tracks are decoded before they reach the engine.
    pub fn with_loader(
        mut self,
        loader: impl Fn(&Path) -> Result<LoadedTrack> + Send + 'static,
    ) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn current(&self) -> Option<EntryId> {
        self.current
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlaybackMode) {
        self.mode = mode;
    }

    pub fn playlist(&self) -> &SharedPlaylist {
        &self.playlist
    }

    /// Start playing `id`. The track is decoded before the engine lock is
    /// taken. A failure marks the entry unplayable and stops the engine.
    pub fn select(&mut self, id: EntryId) -> Result<()> {
        let (path, index) = {
            let playlist = self.playlist.read();
            let entry = playlist
                .get(id)
                .with_context(|| format!("No playlist entry {}", id))?;
            (entry.path.clone(), playlist.index_of(id).unwrap_or(0))
        };

        match (self.loader)(&path) {
            Ok(track) => {
                self.engine.lock().play(track);
                let _ = self.playlist.set_playable(id, true);
                self.current = Some(id);
                self.resume_at = index;
                log::info!("Now playing {} ({})", id, path.display());
                self.playlist.announce_now_playing(id);
                Ok(())
            }
            Err(e) => {
                self.engine.lock().stop();
                let _ = self.playlist.set_playable(id, false);
                self.current = None;
                self.resume_at = index + 1;
                Err(e).with_context(|| format!("Cannot play {}", path.display()))
            }
        }
    }

    /// Move to the following track, skipping entries that fail to play.
    /// Returns `None` (and stops the engine) at the end of the playlist.
    pub fn next(&mut self) -> Result<Option<EntryId>> {
        let attempts = self.playlist.len() + 1;
        for _ in 0..attempts {
            let candidate = if self.mode.shuffle {
                self.pick_shuffled()
            } else {
                self.pick_forward()
            };
            let Some(id) = candidate else {
                break;
            };
            match self.select(id) {
                Ok(()) => return Ok(Some(id)),
                Err(e) => log::warn!("{:#}", e),
            }
        }

        self.finish();
        Ok(None)
    }

    /// Step back one entry. At the top of the list the first track restarts.
    pub fn previous(&mut self) -> Result<Option<EntryId>> {
        let target = {
            let playlist = self.playlist.read();
            let from = self
                .current
                .and_then(|id| playlist.index_of(id))
                .unwrap_or(self.resume_at);
            (0..from.min(playlist.len()))
                .rev()
                .filter_map(|i| playlist.id_at(i))
                .find(|id| playlist.get(*id).is_some_and(|e| e.playable))
                .or_else(|| playlist.id_at(0))
        };

        match target {
            Some(id) => {
                self.select(id)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Call periodically. When the engine reports the track has ended, replay
    /// it (repeat) or advance; returns the newly started entry if any.
    pub fn poll(&mut self) -> Result<Option<EntryId>> {
        if self.current.is_none() || !self.engine.lock().is_finished() {
            return Ok(None);
        }

        if self.mode.repeat {
            if let Some(id) = self.current {
                if self.select(id).is_ok() {
                    return Ok(Some(id));
                }
            }
        }
        self.next()
    }

    fn pick_forward(&self) -> Option<EntryId> {
        let playlist = self.playlist.read();
        let start = self
            .current
            .and_then(|id| playlist.index_of(id))
            .map(|i| i + 1)
            .unwrap_or(self.resume_at);
        (start..playlist.len())
            .filter_map(|i| playlist.id_at(i))
            .find(|id| playlist.get(*id).is_some_and(|e| e.playable))
    }

    fn pick_shuffled(&mut self) -> Option<EntryId> {
        let candidates: Vec<EntryId> = {
            let playlist = self.playlist.read();
            playlist
                .entries()
                .filter(|e| e.playable && Some(e.id) != self.current)
                .map(|e| e.id)
                .collect()
        };
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[self.rng.random_range(0..candidates.len())])
    }

    fn finish(&mut self) {
        self.engine.lock().stop();
        if self.current.take().is_some() {
            log::info!("End of playlist");
        }
        self.resume_at = self.playlist.len();
    }
}
