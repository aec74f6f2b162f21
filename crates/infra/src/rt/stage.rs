//! Per-band filter stage
//!
//! Composes the band's current parameters, the smoothing ramps, the live
//! filter, the coefficient worker and the reclaim pool into the state
//! machine the audio thread actually drives. The stage is Settled until a
//! control-surface edit moves a continuous parameter, Smoothing while the
//! ramps run, and back to Settled once the final target coefficients have
//! been requested.

use std::sync::Arc;

use madrigal_core::domain::coeffs::{design, CoeffError, CoefficientSet};
use madrigal_core::domain::filter::BandFilter;
use madrigal_core::domain::params::BandParams;
use madrigal_core::domain::ramp::LinearRamp;
use tracing::trace;

use super::reclaim::ReclaimPool;
use super::worker::CoefficientWorker;

/// Smoothing state of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothingState {
    Settled,
    Smoothing,
}

/// One band of the equalizer chain
///
/// `update_params` is the control-thread surface; `inner_loop_update` and
/// `process` are the audio-thread surface. The audio-thread methods never
/// block, never allocate and never free: coefficients arrive through the
/// worker's lock-free channel and displaced ones leave through the reclaim
/// pool's lock-free deposit path.
pub struct FilterStage {
    params: BandParams,
    sample_rate: f32,
    ramp_seconds: f32,

    freq_ramp: LinearRamp,
    q_ramp: LinearRamp,
    gain_ramp: LinearRamp,

    /// A coefficient request is owed for the current ramp position
    dirty: bool,
    smoothing: bool,

    filter: BandFilter,
    worker: CoefficientWorker,
    pool: Arc<ReclaimPool>,

    /// Donated storage for exchange-pops from the worker; lives here so
    /// the audio thread never constructs or destroys container storage
    scratch: Option<CoefficientSet>,
}

impl FilterStage {
    /// Build a stage and synchronously install its first coefficients
    ///
    /// Bring-up path: the factory runs directly on the calling thread
    /// (bypassing the worker) so the filter is valid before the first
    /// audio block, and all ramps snap to their targets so a restart never
    /// sweeps audibly.
    pub fn new(
        params: BandParams,
        ramp_seconds: f32,
        sample_rate: f32,
        pool: Arc<ReclaimPool>,
    ) -> Result<Self, CoeffError> {
        let mut stage = Self {
            params,
            sample_rate,
            ramp_seconds,
            freq_ramp: LinearRamp::new(params.frequency(), ramp_seconds, sample_rate),
            q_ramp: LinearRamp::new(params.quality(), ramp_seconds, sample_rate),
            gain_ramp: LinearRamp::new(params.gain_db(), ramp_seconds, sample_rate),
            dirty: false,
            smoothing: false,
            filter: BandFilter::new(),
            worker: CoefficientWorker::spawn(sample_rate),
            pool,
            scratch: None,
        };
        stage.install_direct(false)?;
        Ok(stage)
    }

    /// Re-establish the stage for a (possibly new) sample rate
    ///
    /// Called at prepare-to-play, never during steady-state audio. Resets
    /// parameters, respawns the worker when the rate changed, designs and
    /// installs coefficients synchronously, and zeroes all ramp distances.
    pub fn initialize(
        &mut self,
        params: BandParams,
        ramp_seconds: f32,
        on_realtime_thread: bool,
        sample_rate: f32,
    ) -> Result<(), CoeffError> {
        if sample_rate != self.sample_rate {
            self.worker = CoefficientWorker::spawn(sample_rate);
            self.sample_rate = sample_rate;
        }

        self.params = params;
        self.ramp_seconds = ramp_seconds;
        self.freq_ramp = LinearRamp::new(params.frequency(), ramp_seconds, sample_rate);
        self.q_ramp = LinearRamp::new(params.quality(), ramp_seconds, sample_rate);
        self.gain_ramp = LinearRamp::new(params.gain_db(), ramp_seconds, sample_rate);
        self.dirty = false;
        self.smoothing = false;
        self.filter.reset();

        self.install_direct(on_realtime_thread)
    }

    fn install_direct(&mut self, on_realtime_thread: bool) -> Result<(), CoeffError> {
        let set = design(&self.params, self.sample_rate)?;
        if let Some(displaced) = self.filter.install(set) {
            self.retire(displaced, on_realtime_thread);
        }
        Ok(())
    }

    /// Apply a control-surface edit
    ///
    /// Idempotent: an identical parameter set produces no request and no
    /// coefficient churn. Continuous fields are handed to the ramps;
    /// topology fields (shape, cut kind, order, bypass) take effect on the
    /// next requested set without smoothing.
    pub fn update_params(&mut self, new_params: BandParams) {
        if new_params == self.params {
            return;
        }

        let continuous_changed = self.params.continuous_fields_differ(&new_params);
        self.params = new_params;

        self.freq_ramp.retarget(new_params.frequency());
        self.q_ramp.retarget(new_params.quality());
        self.gain_ramp.retarget(new_params.gain_db());

        self.dirty = true;
        if continuous_changed {
            self.smoothing = true;
        }
        trace!(?new_params, smoothing = self.smoothing, "params updated");
    }

    /// Per-tick pipeline maintenance, called once per inner chunk
    ///
    /// Drives the three phases of the coefficient pipeline: request a set
    /// for the current ramp position when one is owed, install whatever
    /// the worker has finished, then advance the ramps. While smoothing is
    /// active every tick re-arms the request so the audible sweep tracks
    /// the ramps; the last request lands exactly on the settled target.
    pub fn inner_loop_update(&mut self, on_realtime_thread: bool, samples_elapsed: u32) {
        if self.params.bypassed() {
            return;
        }

        if self.dirty {
            let snapshot = self.smoothed_snapshot();
            if self.worker.request(snapshot) {
                self.dirty = false;
            }
            // A full input channel keeps the stage dirty; retry next tick
        }

        while self.worker.collect(&mut self.scratch) {
            if let Some(fresh) = self.scratch.take() {
                if let Some(displaced) = self.filter.install(fresh) {
                    self.retire(displaced, on_realtime_thread);
                }
            }
        }

        if self.smoothing {
            self.freq_ramp.advance(samples_elapsed);
            self.q_ramp.advance(samples_elapsed);
            self.gain_ramp.advance(samples_elapsed);
            // Owe a request for the new ramp position (or the exact target
            // on the settling tick)
            self.dirty = true;
            if self.ramps_settled() {
                self.smoothing = false;
            }
        }
    }

    /// Run a block of samples through the live filter
    pub fn process(&mut self, buffer: &mut [f32]) {
        if self.params.bypassed() {
            return;
        }
        self.filter.process(buffer);
    }

    fn smoothed_snapshot(&self) -> BandParams {
        self.params.with_continuous(
            self.freq_ramp.current(),
            self.q_ramp.current(),
            self.gain_ramp.current(),
        )
    }

    fn ramps_settled(&self) -> bool {
        self.freq_ramp.is_settled() && self.q_ramp.is_settled() && self.gain_ramp.is_settled()
    }

    fn retire(&self, displaced: CoefficientSet, on_realtime_thread: bool) {
        displaced.into_shared(|obj| self.pool.deposit(obj, on_realtime_thread));
    }

    pub fn smoothing_state(&self) -> SmoothingState {
        if self.smoothing {
            SmoothingState::Smoothing
        } else {
            SmoothingState::Settled
        }
    }

    pub fn params(&self) -> &BandParams {
        &self.params
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Ramp duration applied to continuous parameter changes
    pub fn ramp_seconds(&self) -> f32 {
        self.ramp_seconds
    }

    /// Currently installed coefficients (diagnostics and tests)
    pub fn installed_coeffs(&self) -> Option<&CoefficientSet> {
        self.filter.coeffs()
    }
}
