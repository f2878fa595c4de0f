use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::producer::{FrameProducer, PublishedFrame, TickOutcome};
use crate::render::RendererKind;

/// Frames waiting for the consumer. Anything beyond this is lost, not queued.
const FRAME_CHANNEL_BOUND: usize = 2;

/// Commands for the tick thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// New rate in ticks per second; applies from the next scheduled tick.
    SetCadence(u32),
    SetRenderer(RendererKind),
    Stop,
}

/// Drives a [`FrameProducer`] at a fixed cadence on a dedicated thread.
pub struct TickScheduler;

impl TickScheduler {
    pub fn spawn(producer: FrameProducer, tick_hz: u32) -> Result<SchedulerHandle> {
        let (control_tx, control_rx) = unbounded::<Control>();
        let (frame_tx, frame_rx) = bounded::<PublishedFrame>(FRAME_CHANNEL_BOUND);

        let thread = thread::Builder::new()
            .name("scopeplay-tick".into())
            .spawn(move || run(producer, tick_hz, control_rx, frame_tx))
            .context("Failed to spawn tick thread")?;

        Ok(SchedulerHandle {
            control: control_tx,
            frames: frame_rx,
            thread: Some(thread),
        })
    }
}

pub struct SchedulerHandle {
    control: Sender<Control>,
    frames: Receiver<PublishedFrame>,
    thread: Option<JoinHandle<FrameProducer>>,
}

impl SchedulerHandle {
    /// Published frames in strictly increasing tick order.
    pub fn frames(&self) -> &Receiver<PublishedFrame> {
        &self.frames
    }

    pub fn set_cadence(&self, tick_hz: u32) {
        let _ = self.control.send(Control::SetCadence(tick_hz));
    }

    pub fn set_renderer(&self, kind: RendererKind) {
        let _ = self.control.send(Control::SetRenderer(kind));
    }

    /// Cancel future ticks and wait for the thread. A tick already running
    /// completes but its frame is discarded.
    pub fn stop(mut self) -> Result<FrameProducer> {
        let _ = self.control.send(Control::Stop);
        let thread = self
            .thread
            .take()
            .ok_or_else(|| anyhow!("tick thread already joined"))?;
        thread
            .join()
            .map_err(|_| anyhow!("tick thread panicked"))
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        let _ = self.control.send(Control::Stop);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn period_for(tick_hz: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(tick_hz.clamp(1, 1000)))
}

fn run(
    mut producer: FrameProducer,
    tick_hz: u32,
    control: Receiver<Control>,
    frames: Sender<PublishedFrame>,
) -> FrameProducer {
    let mut period = period_for(tick_hz);
    let mut deadline = Instant::now();
    log::debug!("Tick thread started at {} Hz", tick_hz);

    'ticks: loop {
        // Sleep until the slot, serving control messages meanwhile.
        loop {
            match control.recv_deadline(deadline) {
                Ok(Control::Stop) | Err(RecvTimeoutError::Disconnected) => break 'ticks,
                Ok(Control::SetCadence(hz)) => period = period_for(hz),
                Ok(Control::SetRenderer(kind)) => producer.set_renderer(kind),
                Err(RecvTimeoutError::Timeout) => break,
            }
        }

        let slot = deadline;
        let outcome = producer.tick(period);

        // Stop raised while the tick ran wins over delivering its frame.
        for message in control.try_iter() {
            match message {
                Control::Stop => break 'ticks,
                Control::SetCadence(hz) => period = period_for(hz),
                Control::SetRenderer(kind) => producer.set_renderer(kind),
            }
        }

        if let TickOutcome::Published(frame) = outcome {
            match frames.try_send(frame) {
                Ok(()) => producer.record_delivered(),
                Err(TrySendError::Full(_)) => producer.record_undelivered(),
                Err(TrySendError::Disconnected(_)) => break 'ticks,
            }
        }

        deadline = slot + period;
        let now = Instant::now();
        let mut missed = 0u64;
        while deadline <= now {
            deadline += period;
            missed += 1;
        }
        if missed > 0 {
            log::debug!("Skipped {} tick slot(s)", missed);
            producer.record_skipped(missed);
        }
    }

    producer.log_stats();
    producer
}
