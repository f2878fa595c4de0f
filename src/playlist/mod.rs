//! Ordered playlist with O(1) duplicate detection and undoable removal.
//!
//! Entries live in an arena keyed by [`EntryId`]; play order is a list of
//! ids and a path index maps each active path to its id. The three are kept
//! in lockstep by [`Playlist`], and [`SharedPlaylist`] serializes writers.

pub mod import;
pub mod persist;
pub mod player;
pub mod search;
pub mod shared;
pub mod store;
pub mod undo;

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

pub use player::{PlaybackMode, Player};
pub use search::Search;
pub use shared::{ImportReport, SharedPlaylist};
pub use store::Playlist;
pub use undo::{Removed, UndoStack};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(u64);

impl EntryId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub id: EntryId,
    /// Canonical absolute path; unique among active entries.
    pub path: PathBuf,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    pub duration: Option<Duration>,
    /// Whether the last attempt to play (or probe) this file worked.
    pub playable: bool,
}

/// A track about to be added.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    pub duration: Option<Duration>,
    pub playable: bool,
}

impl NewTrack {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            title: None,
            artist: None,
            album: None,
            track_number: None,
            duration: None,
            playable: true,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Canonical form of `path` used as the duplicate key. Existing files are
/// resolved through the filesystem, symlinks included; other paths are made
/// absolute against the working directory and cleaned of `.` and `..`
/// components without following links.
///
/// A file reached through a symlink therefore keys by its target while it
/// exists and by the link's own path once it is gone. Callers holding a lock
/// should normalize first, since this touches the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut clean = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other.as_os_str()),
        }
    }
    clean
}

fn default_title(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}
