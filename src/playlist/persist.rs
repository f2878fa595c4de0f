use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{NewTrack, Playlist, SharedPlaylist};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistFile {
    pub version: u32,
    pub tracks: Vec<SavedTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTrack {
    pub path: PathBuf,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub track_number: Option<u32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl SavedTrack {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            title: None,
            artist: None,
            album: None,
            track_number: None,
            duration_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Discard the current list and its undo history.
    Replace,
    Append,
}

/// What a load actually did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSummary {
    pub added: usize,
    pub missing: usize,
    pub duplicates: usize,
}

impl PlaylistFile {
    pub fn from_playlist(playlist: &Playlist) -> Self {
        Self {
            version: FORMAT_VERSION,
            tracks: playlist
                .entries()
                .map(|e| SavedTrack {
                    path: e.path.clone(),
                    title: Some(e.title.clone()),
                    artist: e.artist.clone(),
                    album: e.album.clone(),
                    track_number: e.track_number,
                    duration_ms: e.duration.map(|d| d.as_millis() as u64),
                })
                .collect(),
        }
    }
}

pub fn save(playlist: &Playlist, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(&PlaylistFile::from_playlist(playlist))?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write playlist: {}", path.display()))?;
    log::info!("Saved {} track(s) to {}", playlist.len(), path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<PlaylistFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read playlist: {}", path.display()))?;
    let file: PlaylistFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse playlist: {}", path.display()))?;
    if file.version > FORMAT_VERSION {
        bail!(
            "Playlist {} has format version {}, newer than supported ({})",
            path.display(),
            file.version,
            FORMAT_VERSION
        );
    }
    Ok(file)
}

/// Load `path` into `target`. Tracks whose files no longer exist are dropped
/// when `skip_missing` is set; duplicates are always dropped.
pub fn load_into(
    target: &SharedPlaylist,
    path: &Path,
    mode: LoadMode,
    skip_missing: bool,
    undo_capacity: usize,
) -> Result<LoadSummary> {
    let file = load(path)?;
    let mut summary = LoadSummary::default();

    let tracks: Vec<NewTrack> = file
        .tracks
        .into_iter()
        .filter(|t| {
            let keep = !skip_missing || t.path.exists();
            if !keep {
                log::warn!("Skipping missing file: {}", t.path.display());
                summary.missing += 1;
            }
            keep
        })
        .map(|t| NewTrack {
            path: t.path,
            title: t.title,
            artist: t.artist,
            album: t.album,
            track_number: t.track_number,
            duration: t.duration_ms.map(Duration::from_millis),
            playable: true,
        })
        .collect();

    match mode {
        LoadMode::Replace => {
            let mut playlist = Playlist::new(undo_capacity);
            for track in tracks {
                match playlist.add_track(track) {
                    Ok(_) => summary.added += 1,
                    Err(_) => summary.duplicates += 1,
                }
            }
            target.replace_with(playlist);
        }
        LoadMode::Append => {
            let report = target.import(tracks);
            summary.added = report.added.len();
            summary.duplicates = report.duplicates.len();
        }
    }

    log::info!(
        "Loaded {} track(s) from {} ({} missing, {} duplicate)",
        summary.added,
        path.display(),
        summary.missing,
        summary.duplicates
    );
    Ok(summary)
}
