//! Real-time coefficient pipeline
//!
//! The concurrency machinery between the control surface and the audio
//! thread:
//! - `bounded_channel`: lock-free SPSC ring for cross-thread handoff
//! - `worker`: per-band background coefficient computation
//! - `reclaim`: deferred release of shared coefficient objects
//! - `stage`: per-band orchestration (ramps, requests, installs)
//! - `chain`: the multi-band signal path driven by the audio callback

pub mod bounded_channel;
pub mod chain;
pub mod reclaim;
pub mod stage;
pub mod worker;

pub use bounded_channel::BoundedChannel;
pub use chain::{ChainError, FilterChain, DEFAULT_INNER_CHUNK};
pub use reclaim::{ReclaimPool, ReclaimSweeper, DEFAULT_SWEEP_INTERVAL};
pub use stage::{FilterStage, SmoothingState};
pub use worker::CoefficientWorker;
