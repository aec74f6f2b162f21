//! Live filter runtime
//!
//! The audio-thread half of a band: biquad delay-line state plus whatever
//! coefficient set is currently installed. Coefficients arrive as shared
//! immutable objects and are swapped in whole; the delay lines stay local
//! and mutable. Nothing here allocates, frees, or locks.

use crate::domain::coeffs::{BiquadCoeffs, CoefficientSet, MAX_CASCADE_SECTIONS};

/// Delay-line state for one biquad section, Direct Form I
///
/// Direct Form I is chosen over Transposed Direct Form II for:
/// - Better numerical stability with low-frequency filters
/// - Artifact-free coefficient swaps mid-stream
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    // Previous input samples (x[n-1], x[n-2])
    x1: f32,
    x2: f32,
    // Previous output samples (y[n-1], y[n-2])
    y1: f32,
    y2: f32,
}

impl BiquadState {
    /// Process a single sample through the given coefficients
    #[inline]
    pub fn run(&mut self, coeffs: &BiquadCoeffs, x: f32) -> f32 {
        // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                        - a1*y[n-1] - a2*y[n-2]
        let y = coeffs.b0 * x + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Clear the delay line
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The live filter for one band: installed coefficients plus section states
///
/// Invariant: once initialized, the filter always holds a complete, valid
/// coefficient set. Installs replace the whole set atomically from the
/// audio thread's point of view and hand the displaced set back to the
/// caller, which retires it into the reclaim pool. A half-written set is
/// never observable because sets are immutable after construction.
#[derive(Debug, Default)]
pub struct BandFilter {
    coeffs: Option<CoefficientSet>,
    states: [BiquadState; MAX_CASCADE_SECTIONS],
}

impl BandFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new coefficient set, returning the displaced one
    ///
    /// The caller owns the returned set and must deposit its shared objects
    /// into the reclaim pool; dropping it on the audio thread could free.
    #[must_use]
    pub fn install(&mut self, set: CoefficientSet) -> Option<CoefficientSet> {
        self.coeffs.replace(set)
    }

    /// Currently installed coefficients, if any
    pub fn coeffs(&self) -> Option<&CoefficientSet> {
        self.coeffs.as_ref()
    }

    /// Process a buffer of samples in place
    ///
    /// Identity until the first install. No allocations, no syscalls.
    #[inline]
    pub fn process(&mut self, buffer: &mut [f32]) {
        match &self.coeffs {
            None => {}
            Some(CoefficientSet::Single(coeffs)) => {
                let state = &mut self.states[0];
                for sample in buffer.iter_mut() {
                    *sample = state.run(coeffs, *sample);
                }
            }
            Some(CoefficientSet::Cascade(cascade)) => {
                for (i, section) in cascade.sections().enumerate() {
                    let state = &mut self.states[i];
                    for sample in buffer.iter_mut() {
                        *sample = state.run(section, *sample);
                    }
                }
            }
        }
    }

    /// Clear all delay lines (e.g. on transport stop or source switch)
    pub fn reset(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
    }
}
