use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use super::NewTrack;
use crate::audio::decode::probe_track;

/// File extensions picked up by folder import.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "wav", "aac", "m4a", "opus", "wma"];

pub fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Audio files directly inside `dir` (no recursion), sorted so that
/// "track2" comes before "track10".
pub fn scan_folder(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read folder: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && is_audio(&path) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    log::debug!("Found {} audio file(s) in {}", files.len(), dir.display());
    Ok(files)
}

/// Expand command-line inputs: folders are scanned, files pass through.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            paths.extend(scan_folder(input)?);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

/// Build a [`NewTrack`] from the file's tags. Unreadable files are still
/// listed but flagged unplayable.
pub fn describe(path: &Path) -> NewTrack {
    let track = NewTrack::new(path);
    match probe_track(path) {
        Ok(info) => NewTrack {
            title: info.title,
            artist: info.artist,
            album: info.album,
            track_number: info.track_number,
            duration: info.duration,
            ..track
        },
        Err(e) => {
            log::warn!("Cannot read {}: {:#}", path.display(), e);
            NewTrack {
                playable: false,
                ..track
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Compare strings treating runs of ASCII digits as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let n = take_number(&mut a);
                let m = take_number(&mut b);
                let ord = n
                    .trim_start_matches('0')
                    .len()
                    .cmp(&m.trim_start_matches('0').len())
                    .then_with(|| n.trim_start_matches('0').cmp(m.trim_start_matches('0')))
                    .then_with(|| n.len().cmp(&m.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}
