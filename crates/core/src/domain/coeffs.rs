//! Filter coefficient design
//!
//! This module is the pure, stateless half of the coefficient pipeline:
//! - Biquad coefficient structs with RBJ (Robert Bristow-Johnson) Audio EQ
//!   Cookbook designs for shelf/peaking/lowpass/highpass sections
//! - Butterworth maximally-flat cascade construction for higher-order cuts
//! - The shared-ownership `CoefficientSet` handed across threads
//!
//! Everything here is callable concurrently from any thread; nothing holds
//! state between calls.

use std::f32::consts::PI;
use std::sync::Arc;

use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::params::{limits, BandParams, CutKind, ShelfShape};

pub type Result<T> = std::result::Result<T, CoeffError>;

/// Errors from the coefficient factory
///
/// Parameters are validated upstream; the audio path never sees these.
#[derive(Debug, Error, PartialEq)]
pub enum CoeffError {
    #[error("invalid band parameters: {0}")]
    InvalidParams(#[from] crate::domain::params::ParamError),
}

/// Maximum number of cascaded sections a cut band can produce
///
/// Order 8 decomposes into 4 second-order sections; order 7 into one
/// first-order plus 3 second-order. Either way the cascade never exceeds 4.
pub const MAX_CASCADE_SECTIONS: usize = 4;

/// Biquad filter coefficients
///
/// Direct Form I layout with `a0` normalized to 1.0. Coefficients are
/// pre-computed off the audio thread and never mutated after publication:
/// parameter changes always swap in a whole new object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// Calculate coefficients for a low shelf filter
    ///
    /// Boosts or cuts frequencies below the corner frequency.
    #[must_use]
    pub fn low_shelf(sample_rate: f32, freq: f32, gain_db: f32, q: f32) -> Self {
        let gain_db = gain_db.clamp(limits::GAIN_MIN_DB, limits::GAIN_MAX_DB);
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let b0 = a * ((a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha);

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0);
        let a2 = (a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha;

        // Normalize by a0
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Calculate coefficients for a high shelf filter
    ///
    /// Boosts or cuts frequencies above the corner frequency.
    #[must_use]
    pub fn high_shelf(sample_rate: f32, freq: f32, gain_db: f32, q: f32) -> Self {
        let gain_db = gain_db.clamp(limits::GAIN_MIN_DB, limits::GAIN_MAX_DB);
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let b0 = a * ((a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0);
        let b2 = a * ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha);

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha;
        let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos_w0);
        let a2 = (a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Calculate coefficients for a peaking EQ filter
    ///
    /// Boosts or cuts frequencies around a center frequency.
    #[must_use]
    pub fn peaking(sample_rate: f32, freq: f32, gain_db: f32, q: f32) -> Self {
        let gain_db = gain_db.clamp(limits::GAIN_MIN_DB, limits::GAIN_MAX_DB);
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0 - alpha * a;

        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha / a;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Second-order lowpass section
    #[must_use]
    pub fn low_pass(sample_rate: f32, freq: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let b1 = 1.0 - cos_w0;
        let b0 = b1 / 2.0;
        let b2 = b0;

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Second-order highpass section
    #[must_use]
    pub fn high_pass(sample_rate: f32, freq: f32, q: f32) -> Self {
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let b1 = -(1.0 + cos_w0);
        let b0 = (1.0 + cos_w0) / 2.0;
        let b2 = b0;

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// First-order lowpass section (6 dB/octave), bilinear transform
    ///
    /// Expressed as a degenerate biquad (b2 = a2 = 0) so cascades stay
    /// homogeneous.
    #[must_use]
    pub fn low_pass_first_order(sample_rate: f32, freq: f32) -> Self {
        let k = (PI * freq / sample_rate).tan();
        let norm = 1.0 / (k + 1.0);

        Self {
            b0: k * norm,
            b1: k * norm,
            b2: 0.0,
            a1: (k - 1.0) * norm,
            a2: 0.0,
        }
    }

    /// First-order highpass section (6 dB/octave), bilinear transform
    #[must_use]
    pub fn high_pass_first_order(sample_rate: f32, freq: f32) -> Self {
        let k = (PI * freq / sample_rate).tan();
        let norm = 1.0 / (k + 1.0);

        Self {
            b0: norm,
            b1: -norm,
            b2: 0.0,
            a1: (k - 1.0) * norm,
            a2: 0.0,
        }
    }

    /// Magnitude response |H(e^jw)| at a given frequency
    pub fn magnitude_at(&self, freq: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex32::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let num = Complex32::new(self.b0, 0.0) + z1 * self.b1 + z2 * self.b2;
        let den = Complex32::new(1.0, 0.0) + z1 * self.a1 + z2 * self.a2;
        (num / den).norm()
    }
}

/// Shared-ownership handle to an immutable coefficient object
///
/// Held simultaneously by the live filter, in-flight channel slots, and the
/// reclaim pool during swaps. The object is freed only once the pool is the
/// sole remaining owner, and only off the audio thread.
pub type SharedCoeffs = Arc<BiquadCoeffs>;

/// Ordered cascade of up to four shared coefficient sections
///
/// Fixed-size storage: no heap container crosses the audio thread when a
/// cascade is installed or retired.
#[derive(Debug, Clone, Default)]
pub struct CoeffCascade {
    sections: [Option<SharedCoeffs>; MAX_CASCADE_SECTIONS],
    len: usize,
}

impl CoeffCascade {
    fn push(&mut self, coeffs: SharedCoeffs) {
        debug_assert!(self.len < MAX_CASCADE_SECTIONS);
        self.sections[self.len] = Some(coeffs);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn section(&self, index: usize) -> Option<&SharedCoeffs> {
        self.sections.get(index).and_then(|s| s.as_ref())
    }

    pub fn sections(&self) -> impl Iterator<Item = &SharedCoeffs> {
        self.sections.iter().filter_map(|s| s.as_ref())
    }

    /// Consume the cascade, handing each shared section to `f`
    pub fn into_sections(self, mut f: impl FnMut(SharedCoeffs)) {
        for slot in self.sections {
            if let Some(coeffs) = slot {
                f(coeffs);
            }
        }
    }
}

/// Coefficients for one band: a single biquad or a cut cascade
///
/// The shape tag picks the install strategy in the live filter; both shapes
/// share the same whole-object swap discipline.
#[derive(Debug, Clone)]
pub enum CoefficientSet {
    Single(SharedCoeffs),
    Cascade(CoeffCascade),
}

impl CoefficientSet {
    /// Number of biquad sections in this set
    pub fn section_count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Cascade(cascade) => cascade.len(),
        }
    }

    /// Combined magnitude response of all sections at a given frequency
    pub fn magnitude_at(&self, freq: f32, sample_rate: f32) -> f32 {
        match self {
            Self::Single(coeffs) => coeffs.magnitude_at(freq, sample_rate),
            Self::Cascade(cascade) => cascade
                .sections()
                .map(|c| c.magnitude_at(freq, sample_rate))
                .product(),
        }
    }

    /// Consume the set, handing each shared coefficient object to `f`
    ///
    /// Used when retiring a displaced set into the reclaim pool: every
    /// `Arc` is moved out by value, so nothing is dropped here.
    pub fn into_shared(self, mut f: impl FnMut(SharedCoeffs)) {
        match self {
            Self::Single(coeffs) => f(coeffs),
            Self::Cascade(cascade) => cascade.into_sections(&mut f),
        }
    }
}

/// Design a coefficient set for a band parameter set
///
/// Pure function of `(params, sample_rate)`; safe to call concurrently.
/// Allocates the shared objects, so it runs on the worker (or another
/// non-realtime thread), never in the audio callback.
pub fn design(params: &BandParams, sample_rate: f32) -> Result<CoefficientSet> {
    params.validate(sample_rate)?;

    match *params {
        BandParams::Peaking {
            frequency,
            quality,
            gain_db,
            shape,
            ..
        } => {
            let coeffs = match shape {
                ShelfShape::LowShelf => {
                    BiquadCoeffs::low_shelf(sample_rate, frequency, gain_db, quality)
                }
                ShelfShape::Peak => BiquadCoeffs::peaking(sample_rate, frequency, gain_db, quality),
                ShelfShape::HighShelf => {
                    BiquadCoeffs::high_shelf(sample_rate, frequency, gain_db, quality)
                }
            };
            Ok(CoefficientSet::Single(Arc::new(coeffs)))
        }
        BandParams::CutSlope {
            frequency,
            quality,
            order,
            kind,
            ..
        } => Ok(CoefficientSet::Cascade(design_cut_cascade(
            sample_rate,
            frequency,
            quality,
            order,
            kind,
        ))),
    }
}

/// Butterworth maximally-flat cascade for an order-N cut filter
///
/// An odd order contributes one leading first-order section; the remaining
/// N/2 second-order sections take their Q from the Butterworth pole angles.
/// With `a = (q * sqrt(2))^(1/n)` spread across the n second-order sections,
/// section i uses `Q_i = a / (2 * cos(theta_i))` where
/// `theta_i = (i+1) * pi / N` for odd N and `theta_i = (2i+1) * pi / (2N)`
/// for even N. The asymmetric angle spacing between odd and even orders is
/// what keeps the overall response maximally flat.
fn design_cut_cascade(
    sample_rate: f32,
    frequency: f32,
    quality: f32,
    order: u8,
    kind: CutKind,
) -> CoeffCascade {
    let mut cascade = CoeffCascade::default();
    let order_is_odd = order % 2 == 1;

    if order_is_odd {
        let first = match kind {
            // A lowcut removes lows: highpass sections
            CutKind::LowCut => BiquadCoeffs::high_pass_first_order(sample_rate, frequency),
            CutKind::HighCut => BiquadCoeffs::low_pass_first_order(sample_rate, frequency),
        };
        cascade.push(Arc::new(first));
    }

    let second_order_sections = usize::from(order / 2);
    if second_order_sections == 0 {
        return cascade;
    }

    let a = (quality * std::f32::consts::SQRT_2).powf(1.0 / second_order_sections as f32);
    let order_f = f32::from(order);

    for i in 0..second_order_sections {
        let theta = if order_is_odd {
            (i as f32 + 1.0) * PI / order_f
        } else {
            (2.0 * i as f32 + 1.0) * PI / (2.0 * order_f)
        };
        let section_q = a / (2.0 * theta.cos());

        let coeffs = match kind {
            CutKind::LowCut => BiquadCoeffs::high_pass(sample_rate, frequency, section_q),
            CutKind::HighCut => BiquadCoeffs::low_pass(sample_rate, frequency, section_q),
        };
        cascade.push(Arc::new(coeffs));
    }

    cascade
}
