//! Tick-driven analysis: the producer turns engine samples into published
//! frames; the scheduler drives it on its own thread.

pub mod producer;
pub mod scheduler;

pub use producer::{FrameProducer, ProducerStats, PublishedFrame, TickOutcome};
pub use scheduler::{Control, SchedulerHandle, TickScheduler};
