//! Linear parameter smoothing
//!
//! Continuous band parameters (frequency, quality, gain) are never jumped;
//! they ramp linearly from the current value to the target over a fixed
//! duration so coefficient updates stay inaudible. The ramp counts whole
//! samples, which makes the settling point exact: a 50 ms ramp at 44.1 kHz
//! settles after precisely 2205 samples.

/// Linear ramp between a current and a target value
///
/// Advanced in block-sized steps by the filter stage's inner loop. Snaps to
/// the exact target on the final step so repeated retargeting cannot
/// accumulate floating-point drift.
#[derive(Debug, Clone)]
pub struct LinearRamp {
    current: f32,
    target: f32,
    /// Per-sample increment while the ramp is active
    step: f32,
    /// Samples left until the target is reached
    remaining: u32,
    /// Full ramp length in samples, recomputed on sample-rate change
    duration_samples: u32,
}

impl LinearRamp {
    /// Default ramp duration in seconds
    pub const DEFAULT_DURATION_SECS: f32 = 0.05;

    pub fn new(initial: f32, duration_secs: f32, sample_rate: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            duration_samples: Self::duration_in_samples(duration_secs, sample_rate),
        }
    }

    fn duration_in_samples(duration_secs: f32, sample_rate: f32) -> u32 {
        (duration_secs.max(0.0) * sample_rate).round() as u32
    }

    /// Update the ramp duration, e.g. when the sample rate changes
    ///
    /// Affects subsequent retargets; a ramp already in motion keeps its
    /// original step and deadline.
    pub fn set_duration(&mut self, duration_secs: f32, sample_rate: f32) {
        self.duration_samples = Self::duration_in_samples(duration_secs, sample_rate);
    }

    /// Start ramping from the current value toward a new target
    pub fn retarget(&mut self, target: f32) {
        self.target = target;
        if self.duration_samples == 0 || target == self.current {
            self.current = target;
            self.step = 0.0;
            self.remaining = 0;
        } else {
            self.step = (target - self.current) / self.duration_samples as f32;
            self.remaining = self.duration_samples;
        }
    }

    /// Jump to a value immediately, cancelling any active ramp
    pub fn snap_to(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Advance the ramp by a block of samples, returning the new value
    #[inline]
    pub fn advance(&mut self, samples: u32) -> f32 {
        if self.remaining > 0 {
            let n = samples.min(self.remaining);
            self.current += self.step * n as f32;
            self.remaining -= n;
            if self.remaining == 0 {
                // Snap to the exact target to shed accumulated rounding
                self.current = self.target;
            }
        }
        self.current
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True once the ramp has reached its target
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.remaining == 0
    }

    /// Samples left until the ramp settles
    pub fn remaining_samples(&self) -> u32 {
        self.remaining
    }
}
