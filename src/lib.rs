//! Real-time spectral analysis and visualization frames for a media player,
//! plus the playlist store that feeds the playback engine.

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod playlist;
pub mod render;

pub use error::{Anomaly, PlaylistError, PlaylistResult};
pub use events::{EventBus, PlaylistChange, UiEvent};
