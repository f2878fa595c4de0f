use parking_lot::{RwLock, RwLockReadGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{normalize_path, EntryId, NewTrack, Playlist};
use crate::error::{PlaylistError, PlaylistResult};
use crate::events::{EventBus, PlaylistChange, UiEvent};

/// Outcome of a bulk add.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub added: Vec<EntryId>,
    pub duplicates: Vec<PathBuf>,
}

/// Cloneable handle to one playlist. Mutations take the write lock, so
/// concurrent adds of the same path cannot both succeed. Change events are
/// emitted before the lock is released, so subscribers see them in mutation
/// order. Paths are normalized before locking.
#[derive(Debug, Clone)]
pub struct SharedPlaylist {
    inner: Arc<RwLock<Playlist>>,
    events: EventBus,
}

impl SharedPlaylist {
    pub fn new(undo_capacity: usize, events: EventBus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Playlist::new(undo_capacity))),
            events,
        }
    }

    /// Read access for queries and searches. Hold it briefly.
    pub fn read(&self) -> RwLockReadGuard<'_, Playlist> {
        self.inner.read()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let key = normalize_path(path.as_ref());
        self.inner.read().contains_normalized(&key)
    }

    pub fn add(&self, path: impl AsRef<Path>) -> PlaylistResult<EntryId> {
        self.add_track(NewTrack::new(path.as_ref()))
    }

    pub fn add_track(&self, track: NewTrack) -> PlaylistResult<EntryId> {
        let track = normalized(track);
        let mut playlist = self.inner.write();
        let id = playlist.insert_normalized(track)?;
        self.notify(PlaylistChange::Added(vec![id]));
        Ok(id)
    }

    /// Add many tracks under one lock. Duplicates are reported, not fatal.
    pub fn import(&self, tracks: impl IntoIterator<Item = NewTrack>) -> ImportReport {
        let tracks: Vec<NewTrack> = tracks.into_iter().map(normalized).collect();
        let mut report = ImportReport::default();

        let mut playlist = self.inner.write();
        for track in tracks {
            match playlist.insert_normalized(track) {
                Ok(id) => report.added.push(id),
                Err(PlaylistError::DuplicatePath(path)) => report.duplicates.push(path),
                Err(e) => log::warn!("Skipping track: {}", e),
            }
        }
        if !report.added.is_empty() {
            self.notify(PlaylistChange::Added(report.added.clone()));
        }
        drop(playlist);

        log::info!(
            "Imported {} track(s), {} duplicate(s) skipped",
            report.added.len(),
            report.duplicates.len()
        );
        report
    }

    pub fn remove(&self, id: EntryId) -> PlaylistResult<()> {
        let mut playlist = self.inner.write();
        playlist.remove(id)?;
        self.notify(PlaylistChange::Removed(id));
        Ok(())
    }

    pub fn undo(&self) -> PlaylistResult<EntryId> {
        let mut playlist = self.inner.write();
        let id = playlist.undo()?;
        self.notify(PlaylistChange::Restored(id));
        Ok(id)
    }

    pub fn reorder(&self, id: EntryId, new_index: usize) -> PlaylistResult<usize> {
        let mut playlist = self.inner.write();
        let to = playlist.reorder(id, new_index)?;
        self.notify(PlaylistChange::Moved { id, to });
        Ok(to)
    }

    pub fn clear(&self) {
        let mut playlist = self.inner.write();
        playlist.clear();
        self.notify(PlaylistChange::Cleared);
    }

    /// Swap in a whole new list (undo history included).
    pub fn replace_with(&self, replacement: Playlist) {
        let mut playlist = self.inner.write();
        *playlist = replacement;
        self.notify(PlaylistChange::Reloaded);
    }

    pub fn set_playable(&self, id: EntryId, playable: bool) -> PlaylistResult<()> {
        self.inner.write().set_playable(id, playable)
    }

    pub(crate) fn announce_now_playing(&self, id: EntryId) {
        self.notify(PlaylistChange::NowPlaying(id));
    }

    /// Emission never blocks, so it is fine under the write lock.
    fn notify(&self, change: PlaylistChange) {
        self.events.emit(UiEvent::PlaylistChanged(change));
    }
}

fn normalized(track: NewTrack) -> NewTrack {
    NewTrack {
        path: normalize_path(&track.path),
        ..track
    }
}
