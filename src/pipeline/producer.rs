use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::analysis::{SpectralAnalyzer, SpectralFrame};
use crate::audio::engine::SharedEngine;
use crate::audio::window::SampleWindow;
use crate::config::{IdlePolicy, Settings, VisualConfig};
use crate::error::Anomaly;
use crate::events::{EventBus, UiEvent};
use crate::render::{Drawable, Renderer, RendererKind};

/// One tick's output, handed to the UI.
#[derive(Debug, Clone)]
pub struct PublishedFrame {
    pub tick: u64,
    pub renderer: RendererKind,
    pub spectral: Arc<SpectralFrame>,
    pub window: Arc<SampleWindow>,
    pub drawable: Drawable,
    /// The transport was idle and this is the explicit all-zero frame.
    pub silent: bool,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    Published(PublishedFrame),
    /// The tick overran its budget; nothing was published and the previous
    /// frame stays the reference for flux.
    Dropped(Anomaly),
    /// Idle with [`IdlePolicy::Suspend`].
    Suspended,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Frames produced by `tick`, whether or not anyone received them.
    pub rendered: u64,
    pub silent: u64,
    pub dropped: u64,
    /// Scheduled slots that passed while a tick was still running.
    pub skipped: u64,
    pub suspended: u64,
    /// Frames handed to the consumer.
    pub delivered: u64,
    /// Frames the consumer was too slow to take.
    pub undelivered: u64,
    pub non_finite_samples: u64,
}

/// Owns the analyzer and the active renderer, so analyses are serialized
/// and each tick sees exactly the frame published before it.
pub struct FrameProducer {
    engine: SharedEngine,
    analyzer: SpectralAnalyzer,
    renderer: Renderer,
    visual: VisualConfig,
    events: EventBus,
    previous: Option<Arc<SpectralFrame>>,
    next_tick: u64,
    last_published: Option<u64>,
    stats: ProducerStats,
}

impl std::fmt::Debug for FrameProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProducer")
            .field("analyzer", &self.analyzer)
            .field("renderer", &self.renderer.kind())
            .field("next_tick", &self.next_tick)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl FrameProducer {
    pub fn new(engine: SharedEngine, settings: &Settings, events: EventBus) -> Self {
        Self {
            engine,
            analyzer: SpectralAnalyzer::new(settings.analysis.fft_size),
            renderer: Renderer::new(settings.visual.renderer, &settings.visual),
            visual: settings.visual.clone(),
            events,
            previous: None,
            next_tick: 1,
            last_published: None,
            stats: ProducerStats::default(),
        }
    }

    pub fn renderer(&self) -> RendererKind {
        self.renderer.kind()
    }

    /// Switch the active visualization. The new renderer starts with empty
    /// history.
    pub fn set_renderer(&mut self, kind: RendererKind) {
        if kind == self.renderer.kind() {
            return;
        }
        self.renderer = Renderer::new(kind, &self.visual);
        log::info!("Renderer switched to {}", kind.display_name());
        self.events.emit(UiEvent::RendererChanged(kind));
    }

    pub fn stats(&self) -> ProducerStats {
        ProducerStats {
            non_finite_samples: self.analyzer.non_finite_samples(),
            ..self.stats
        }
    }

    /// Run one tick. Work that finishes after `budget` is discarded rather
    /// than published late.
    pub fn tick(&mut self, budget: Duration) -> TickOutcome {
        let tick = self.next_tick;
        self.next_tick += 1;
        let started = Instant::now();

        let size = self.analyzer.size();
        let (playing, window) = {
            let engine = self.engine.lock();
            if engine.is_playing() {
                (true, engine.current_samples(size))
            } else {
                let channels = engine.channel_count().max(1);
                (false, SampleWindow::silent(size, channels, engine.sample_rate()))
            }
        };

        let spectral = if playing {
            self.analyzer.analyze(&window, self.previous.as_deref(), tick)
        } else {
            // Flux starts over when the stream comes back.
            self.previous = None;
            if self.visual.idle == IdlePolicy::Suspend {
                self.stats.suspended += 1;
                return TickOutcome::Suspended;
            }
            SpectralFrame::silent(tick, self.analyzer.bins())
        };

        let elapsed = started.elapsed();
        if elapsed > budget {
            let anomaly = Anomaly::DeadlineMiss {
                tick,
                elapsed,
                budget,
            };
            if self.stats.dropped == 0 {
                log::warn!("Deadline miss: {}", anomaly);
            } else {
                log::debug!("Deadline miss: {}", anomaly);
            }
            self.stats.dropped += 1;
            return TickOutcome::Dropped(anomaly);
        }

        let spectral = Arc::new(spectral);
        let drawable = self.renderer.render(&spectral, &window);

        debug_assert!(
            self.last_published.map_or(true, |last| last < tick),
            "frame {} published after {:?}",
            tick,
            self.last_published
        );
        self.last_published = Some(tick);
        if playing {
            self.previous = Some(spectral.clone());
        } else {
            self.stats.silent += 1;
        }
        self.stats.rendered += 1;

        TickOutcome::Published(PublishedFrame {
            tick,
            renderer: self.renderer.kind(),
            spectral,
            window: Arc::new(window),
            drawable,
            silent: !playing,
        })
    }

    pub(crate) fn record_skipped(&mut self, slots: u64) {
        self.stats.skipped += slots;
    }

    pub(crate) fn record_delivered(&mut self) {
        self.stats.delivered += 1;
    }

    pub(crate) fn record_undelivered(&mut self) {
        self.stats.undelivered += 1;
    }

    pub(crate) fn log_stats(&self) {
        let s = self.stats();
        log::info!(
            "Producer stopped: {} rendered ({} silent), {} delivered, {} undelivered, {} dropped, {} skipped, {} suspended, {} non-finite samples",
            s.rendered,
            s.silent,
            s.delivered,
            s.undelivered,
            s.dropped,
            s.skipped,
            s.suspended,
            s.non_finite_samples
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::engine::{LoadedTrack, PlaybackEngine};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Plays a steady sine and can be told to stall on one tick.
    pub(crate) struct StallingEngine {
        pub playing: bool,
        pub stall_on: Option<u64>,
        pub stall: Duration,
        pub calls: AtomicU64,
        pub frequency: f32,
    }

    impl StallingEngine {
        pub(crate) fn new() -> Self {
            Self {
                playing: true,
                stall_on: None,
                stall: Duration::ZERO,
                calls: AtomicU64::new(0),
                frequency: 440.0,
            }
        }
    }

    impl PlaybackEngine for StallingEngine {
        fn current_samples(&self, n: usize) -> SampleWindow {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.stall_on == Some(call) {
                std::thread::sleep(self.stall);
            }
            let offset = call as usize * n;
            let samples: Vec<f32> = (0..n)
                .map(|i| {
                    let t = (offset + i) as f32 / 44_100.0;
                    (2.0 * std::f32::consts::PI * self.frequency * t).sin() * 0.5
                })
                .collect();
            SampleWindow::from_channels(vec![samples.clone(), samples], n, 44_100)
        }
        fn channel_count(&self) -> usize {
            2
        }
        fn sample_rate(&self) -> u32 {
            44_100
        }
        fn is_playing(&self) -> bool {
            self.playing
        }
        fn play(&mut self, _track: LoadedTrack) {
            self.playing = true;
        }
        fn stop(&mut self) {
            self.playing = false;
        }
    }

    pub(crate) fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.analysis.fft_size = 1024;
        settings
    }

    fn producer(engine: StallingEngine) -> (FrameProducer, Arc<Mutex<StallingEngine>>) {
        let engine = Arc::new(Mutex::new(engine));
        let shared: SharedEngine = engine.clone();
        (FrameProducer::new(shared, &settings(), EventBus::new()), engine)
    }

    fn published(outcome: TickOutcome) -> PublishedFrame {
        match outcome {
            TickOutcome::Published(frame) => frame,
            other => panic!("expected a frame, got {:?}", other),
        }
    }

    #[test]
    fn stalled_tick_is_dropped_and_order_holds() {
        let mut engine = StallingEngine::new();
        engine.stall_on = Some(3);
        engine.stall = Duration::from_millis(60);
        let (mut producer, _) = producer(engine);

        let budget = Duration::from_millis(20);
        let mut ticks = Vec::new();
        let mut dropped = Vec::new();
        for _ in 0..6 {
            match producer.tick(budget) {
                TickOutcome::Published(f) => ticks.push(f.tick),
                TickOutcome::Dropped(Anomaly::DeadlineMiss { tick, .. }) => dropped.push(tick),
                other => panic!("unexpected {:?}", other),
            }
        }

        assert_eq!(dropped, vec![3]);
        assert!(!ticks.contains(&3));
        assert!(ticks.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(producer.stats().dropped, 1);
        assert_eq!(producer.stats().rendered, 5);
    }

    #[test]
    fn first_frame_has_zero_flux_and_later_frames_chain() {
        let (mut producer, _) = producer(StallingEngine::new());
        let first = published(producer.tick(Duration::from_secs(1)));
        assert_eq!(first.spectral.spectral_flux, 0.0);
        assert!(!first.silent);
        assert_eq!(first.spectral.bins(), 512);

        let second = published(producer.tick(Duration::from_secs(1)));
        assert!(second.spectral.spectral_flux >= 0.0);
        assert!(second.tick > first.tick);
    }

    #[test]
    fn paused_transport_publishes_silence_and_resets_flux() {
        let (mut producer, engine) = producer(StallingEngine::new());
        published(producer.tick(Duration::from_secs(1)));

        engine.lock().playing = false;
        let idle = published(producer.tick(Duration::from_secs(1)));
        assert!(idle.silent);
        assert!(idle.spectral.magnitudes.iter().all(|&m| m == 0.0));
        assert_eq!(idle.window.channel_count(), 2);

        engine.lock().playing = true;
        let resumed = published(producer.tick(Duration::from_secs(1)));
        assert_eq!(resumed.spectral.spectral_flux, 0.0);
        assert_eq!(producer.stats().silent, 1);
    }

    #[test]
    fn suspend_policy_publishes_nothing_while_idle() {
        let mut engine = StallingEngine::new();
        engine.playing = false;
        let engine = Arc::new(Mutex::new(engine));
        let shared: SharedEngine = engine.clone();
        let mut settings = settings();
        settings.visual.idle = IdlePolicy::Suspend;
        let mut producer = FrameProducer::new(shared, &settings, EventBus::new());

        assert!(matches!(producer.tick(Duration::from_secs(1)), TickOutcome::Suspended));
        assert_eq!(producer.stats().suspended, 1);
        assert_eq!(producer.stats().rendered, 0);
    }

    #[test]
    fn renderer_switch_is_announced_once() {
        let engine: SharedEngine = Arc::new(Mutex::new(StallingEngine::new()));
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut producer = FrameProducer::new(engine, &settings(), bus);

        producer.set_renderer(RendererKind::VuMeter);
        producer.set_renderer(RendererKind::VuMeter);
        assert_eq!(rx.try_iter().count(), 1);

        let frame = published(producer.tick(Duration::from_secs(1)));
        assert_eq!(frame.renderer, RendererKind::VuMeter);
        assert!(matches!(frame.drawable, Drawable::Meters(ref m) if m.len() == 2));
    }
}
