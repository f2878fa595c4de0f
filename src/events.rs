use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::playlist::EntryId;
use crate::render::RendererKind;

/// Notifications for the UI shell.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    RendererChanged(RendererKind),
    PlaylistChanged(PlaylistChange),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistChange {
    Added(Vec<EntryId>),
    Removed(EntryId),
    Restored(EntryId),
    Moved { id: EntryId, to: usize },
    Cleared,
    /// Replaced wholesale, e.g. by loading a saved playlist.
    Reloaded,
    NowPlaying(EntryId),
}

/// Fan-out of [`UiEvent`]s to any number of subscribers. Cloning shares the
/// subscriber list.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<UiEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<UiEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver to every live subscriber; dropped receivers are pruned.
    pub fn emit(&self, event: UiEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives_events() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        bus.emit(UiEvent::RendererChanged(RendererKind::Lissajous));
        assert_eq!(a.try_recv().unwrap(), UiEvent::RendererChanged(RendererKind::Lissajous));
        assert_eq!(b.try_recv().unwrap(), UiEvent::RendererChanged(RendererKind::Lissajous));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        bus.emit(UiEvent::PlaylistChanged(PlaylistChange::Cleared));
        assert_eq!(bus.subscriber_count(), 1);
        assert!(keep.try_recv().is_ok());
    }
}
