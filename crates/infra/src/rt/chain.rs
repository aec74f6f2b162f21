//! Multi-band filter chain
//!
//! Owns the band stages, the shared reclaim pool with its sweeper, and the
//! inner-chunk granularity the audio loop uses. The host audio callback
//! hands whole blocks to `process_block`; the chain splits them into small
//! chunks so parameter smoothing stays fine-grained without per-sample
//! bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use madrigal_core::domain::coeffs::CoeffError;
use madrigal_core::domain::config::EqPreset;
use madrigal_core::domain::params::BandParams;
use thiserror::Error;
use tracing::info;

use super::reclaim::{ReclaimPool, ReclaimSweeper, DEFAULT_SWEEP_INTERVAL};
use super::stage::FilterStage;

pub type Result<T> = std::result::Result<T, ChainError>;

/// Errors from chain construction and control
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("coefficient design failed: {0}")]
    Coeff(#[from] CoeffError),

    #[error("band index {0} out of range ({1} bands)")]
    BandOutOfRange(usize, usize),
}

/// Default sub-block update granularity in samples
///
/// Small enough that smoothing updates land many times per block, large
/// enough that per-chunk overhead stays negligible.
pub const DEFAULT_INNER_CHUNK: usize = 32;

/// The equalizer signal path: an ordered chain of filter stages
pub struct FilterChain {
    stages: Vec<FilterStage>,
    pool: Arc<ReclaimPool>,
    _sweeper: ReclaimSweeper,
    inner_chunk: usize,
    sample_rate: f32,
}

impl FilterChain {
    /// Build a chain with one stage per parameter set
    pub fn new(bands: &[BandParams], ramp_seconds: f32, sample_rate: f32) -> Result<Self> {
        Self::with_options(
            bands,
            ramp_seconds,
            sample_rate,
            DEFAULT_INNER_CHUNK,
            DEFAULT_SWEEP_INTERVAL,
        )
    }

    /// Build a chain with explicit chunking and sweep cadence
    pub fn with_options(
        bands: &[BandParams],
        ramp_seconds: f32,
        sample_rate: f32,
        inner_chunk: usize,
        sweep_interval: Duration,
    ) -> Result<Self> {
        let pool = Arc::new(ReclaimPool::new());

        let stages = bands
            .iter()
            .map(|params| FilterStage::new(*params, ramp_seconds, sample_rate, Arc::clone(&pool)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let sweeper = ReclaimSweeper::spawn(Arc::clone(&pool), sweep_interval);

        info!(
            bands = stages.len(),
            sample_rate, inner_chunk, "filter chain ready"
        );

        Ok(Self {
            stages,
            pool,
            _sweeper: sweeper,
            inner_chunk: inner_chunk.max(1),
            sample_rate,
        })
    }

    /// Build a chain from a preset
    pub fn from_preset(preset: &EqPreset, sample_rate: f32) -> Result<Self> {
        Self::new(&preset.band_params(), preset.ramp_seconds(), sample_rate)
    }

    /// Apply a control-surface edit to one band
    pub fn update_band(&mut self, band: usize, params: BandParams) -> Result<()> {
        let count = self.stages.len();
        let stage = self
            .stages
            .get_mut(band)
            .ok_or(ChainError::BandOutOfRange(band, count))?;
        stage.update_params(params);
        Ok(())
    }

    /// Apply a whole preset, band by band, in chain order
    ///
    /// Extra preset bands beyond the chain's band count are ignored.
    pub fn update_from_preset(&mut self, preset: &EqPreset) {
        for (stage, params) in self.stages.iter_mut().zip(preset.band_params()) {
            stage.update_params(params);
        }
    }

    /// Process one audio block on the realtime thread
    ///
    /// Splits the block into inner chunks; each chunk first ticks every
    /// stage's pipeline maintenance, then runs the samples through the
    /// stages in band order.
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for chunk in buffer.chunks_mut(self.inner_chunk) {
            let samples = chunk.len() as u32;
            for stage in &mut self.stages {
                stage.inner_loop_update(true, samples);
            }
            for stage in &mut self.stages {
                stage.process(chunk);
            }
        }
    }

    /// Re-establish every stage for a new sample rate (prepare-to-play)
    pub fn initialize(&mut self, sample_rate: f32, ramp_seconds: f32) -> Result<()> {
        for stage in &mut self.stages {
            let params = *stage.params();
            stage.initialize(params, ramp_seconds, false, sample_rate)?;
        }
        self.sample_rate = sample_rate;
        Ok(())
    }

    pub fn band_count(&self) -> usize {
        self.stages.len()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn stage(&self, band: usize) -> Option<&FilterStage> {
        self.stages.get(band)
    }

    /// Shared reclaim pool (diagnostics; the sweeper drives it already)
    pub fn pool(&self) -> &Arc<ReclaimPool> {
        &self.pool
    }
}
