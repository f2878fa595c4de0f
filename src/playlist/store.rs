use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::search::{Matcher, Search};
use super::undo::{Removed, UndoStack};
use super::{default_title, normalize_path, EntryId, NewTrack, PlaylistEntry};
use crate::error::{PlaylistError, PlaylistResult};

/// Single-threaded playlist core. See [`super::SharedPlaylist`] for the
/// lock-guarded handle used across UI surfaces.
#[derive(Debug, Clone)]
pub struct Playlist {
    entries: HashMap<EntryId, PlaylistEntry>,
    order: Vec<EntryId>,
    by_path: HashMap<PathBuf, EntryId>,
    undo: UndoStack,
    next_id: u64,
}

impl Default for Playlist {
    fn default() -> Self {
        Self::new(crate::config::PlaylistConfig::default().undo_capacity)
    }
}

impl Playlist {
    pub fn new(undo_capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            by_path: HashMap::new(),
            undo: UndoStack::new(undo_capacity),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.contains_normalized(&normalize_path(path.as_ref()))
    }

    pub(crate) fn contains_normalized(&self, key: &Path) -> bool {
        self.by_path.contains_key(key)
    }

    pub fn id_for_path(&self, path: impl AsRef<Path>) -> Option<EntryId> {
        self.by_path.get(&normalize_path(path.as_ref())).copied()
    }

    pub fn get(&self, id: EntryId) -> Option<&PlaylistEntry> {
        self.entries.get(&id)
    }

    pub fn id_at(&self, index: usize) -> Option<EntryId> {
        self.order.get(index).copied()
    }

    pub fn index_of(&self, id: EntryId) -> Option<usize> {
        self.order.iter().position(|&e| e == id)
    }

    pub fn ids(&self) -> &[EntryId] {
        &self.order
    }

    /// Active entries in play order.
    pub fn entries(&self) -> impl Iterator<Item = &PlaylistEntry> + '_ {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub fn add(&mut self, path: impl AsRef<Path>) -> PlaylistResult<EntryId> {
        self.add_track(NewTrack::new(path.as_ref()))
    }

    pub fn add_track(&mut self, track: NewTrack) -> PlaylistResult<EntryId> {
        let path = normalize_path(&track.path);
        self.insert_normalized(NewTrack { path, ..track })
    }

    /// Add a track whose path already went through [`normalize_path`].
    pub(crate) fn insert_normalized(&mut self, track: NewTrack) -> PlaylistResult<EntryId> {
        let path = track.path;
        if self.by_path.contains_key(&path) {
            return Err(PlaylistError::DuplicatePath(path));
        }

        let id = EntryId(self.next_id);
        self.next_id += 1;

        let entry = PlaylistEntry {
            id,
            title: track.title.unwrap_or_else(|| default_title(&path)),
            path: path.clone(),
            artist: track.artist,
            album: track.album,
            track_number: track.track_number,
            duration: track.duration,
            playable: track.playable,
        };
        self.by_path.insert(path, id);
        self.entries.insert(id, entry);
        self.order.push(id);

        self.check_consistency();
        Ok(id)
    }

    /// Soft-delete `id` onto the undo stack.
    pub fn remove(&mut self, id: EntryId) -> PlaylistResult<()> {
        let index = self.index_of(id).ok_or(PlaylistError::NotFound(id))?;
        let entry = self.entries.remove(&id).ok_or(PlaylistError::NotFound(id))?;
        self.order.remove(index);
        self.by_path.remove(&entry.path);

        if let Some(evicted) = self.undo.push(Removed { entry, index }) {
            log::debug!(
                "Undo history full, dropping {} ({})",
                evicted.entry.id,
                evicted.entry.path.display()
            );
        }

        self.check_consistency();
        Ok(())
    }

    /// Restore the most recent removal at its old index (or the end if the
    /// list has since shrunk). If its path was added again in the meantime
    /// the record is discarded and `DuplicatePath` returned.
    pub fn undo(&mut self) -> PlaylistResult<EntryId> {
        let Removed { entry, index } = self.undo.pop().ok_or(PlaylistError::EmptyStack)?;

        if self.by_path.contains_key(&entry.path) {
            log::debug!(
                "Discarding undo of {}: {} is active again",
                entry.id,
                entry.path.display()
            );
            return Err(PlaylistError::DuplicatePath(entry.path));
        }

        let id = entry.id;
        let index = index.min(self.order.len());
        self.by_path.insert(entry.path.clone(), id);
        self.entries.insert(id, entry);
        self.order.insert(index, id);

        self.check_consistency();
        Ok(id)
    }

    /// Move `id` to `new_index`, clamped to the last position. Returns the
    /// index actually used.
    pub fn reorder(&mut self, id: EntryId, new_index: usize) -> PlaylistResult<usize> {
        let from = self.index_of(id).ok_or(PlaylistError::NotFound(id))?;
        let to = new_index.min(self.order.len() - 1);
        if from != to {
            let moved = self.order.remove(from);
            self.order.insert(to, moved);
        }

        self.check_consistency();
        Ok(to)
    }

    /// Destroy every active entry and the undo history.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.by_path.clear();
        self.undo.clear();
    }

    pub fn set_playable(&mut self, id: EntryId, playable: bool) -> PlaylistResult<()> {
        let entry = self.entries.get_mut(&id).ok_or(PlaylistError::NotFound(id))?;
        entry.playable = playable;
        Ok(())
    }

    /// Case-insensitive substring match over title, artist, album and path,
    /// in play order.
    pub fn search(&self, query: &str) -> Search<'_> {
        Search::new(self, Matcher::substring(query))
    }

    /// Like [`Playlist::search`] but the query only has to appear as a
    /// subsequence ("dsm" finds "Dark Side of the Moon").
    pub fn fuzzy_search(&self, query: &str) -> Search<'_> {
        Search::new(self, Matcher::fuzzy(query))
    }

    /// The path index mirrors the active entries exactly and play order
    /// holds each active id once.
    pub fn is_consistent(&self) -> bool {
        self.order.len() == self.entries.len()
            && self.by_path.len() == self.entries.len()
            && self.order.iter().all(|id| {
                self.entries
                    .get(id)
                    .is_some_and(|e| self.by_path.get(&e.path) == Some(id))
            })
    }

    fn check_consistency(&self) {
        debug_assert!(self.is_consistent(), "playlist index out of sync");
    }
}
