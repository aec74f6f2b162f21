//! Madrigal infra: the real-time coefficient pipeline
//!
//! Everything that crosses threads lives here: the lock-free bounded
//! channel, the per-band coefficient workers, the deferred reclaim pool,
//! and the filter stages/chain that the audio callback drives. The pure
//! domain types and DSP math live in `madrigal-core`.

pub mod rt;
