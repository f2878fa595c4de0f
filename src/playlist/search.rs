use super::{Playlist, PlaylistEntry};

#[derive(Debug, Clone)]
pub(crate) enum Matcher {
    Substring(String),
    Fuzzy(Vec<char>),
}

impl Matcher {
    pub(crate) fn substring(query: &str) -> Self {
        Matcher::Substring(query.to_lowercase())
    }

    pub(crate) fn fuzzy(query: &str) -> Self {
        Matcher::Fuzzy(
            query
                .to_lowercase()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect(),
        )
    }

    fn matches(&self, entry: &PlaylistEntry) -> bool {
        let path = entry.path.to_string_lossy();
        let fields = [
            Some(entry.title.as_str()),
            entry.artist.as_deref(),
            entry.album.as_deref(),
            Some(path.as_ref()),
        ];
        let matched = fields.into_iter().flatten().any(|field| {
            let field = field.to_lowercase();
            match self {
                Matcher::Substring(q) => field.contains(q.as_str()),
                Matcher::Fuzzy(q) => is_subsequence(q, &field),
            }
        });
        matched
    }
}

fn is_subsequence(needle: &[char], haystack: &str) -> bool {
    let mut wanted = needle.iter().peekable();
    for c in haystack.chars() {
        match wanted.peek() {
            Some(&&w) if w == c => {
                wanted.next();
            }
            Some(_) => {}
            None => break,
        }
    }
    wanted.peek().is_none()
}

/// Lazy iterator over matching entries, in play order. Cloning yields an
/// independent cursor.
#[derive(Debug, Clone)]
pub struct Search<'a> {
    playlist: &'a Playlist,
    matcher: Matcher,
    pos: usize,
}

impl<'a> Search<'a> {
    pub(crate) fn new(playlist: &'a Playlist, matcher: Matcher) -> Self {
        Self {
            playlist,
            matcher,
            pos: 0,
        }
    }

    /// Rewind to the first entry.
    pub fn restart(&mut self) {
        self.pos = 0;
    }
}

impl<'a> Iterator for Search<'a> {
    type Item = &'a PlaylistEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let playlist = self.playlist;
        while let Some(id) = playlist.id_at(self.pos) {
            self.pos += 1;
            if let Some(entry) = playlist.get(id) {
                if self.matcher.matches(entry) {
                    return Some(entry);
                }
            }
        }
        None
    }
}
