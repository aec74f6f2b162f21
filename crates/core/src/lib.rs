//! Madrigal core: domain model for the equalizer signal path
//!
//! Platform-independent types and pure DSP math: band parameters, filter
//! coefficient design (including the Butterworth cut cascades), smoothing
//! ramps, the live filter runtime, and TOML preset management. The
//! concurrency machinery that moves coefficients between threads lives in
//! the `madrigal-infra` crate.

pub mod domain;
