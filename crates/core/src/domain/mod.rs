//! Domain entities and business rules

pub mod coeffs;
pub mod config;
pub mod filter;
pub mod params;
pub mod ramp;

// Re-export specific items to avoid ambiguous glob imports
pub use coeffs::{
    design, BiquadCoeffs, CoeffCascade, CoeffError, CoefficientSet, SharedCoeffs,
    MAX_CASCADE_SECTIONS,
};
pub use config::{
    default_preset_dir, BandConfig, BandMode, ConfigError, EqPreset, PresetManager, PresetWatcher,
};
pub use filter::{BandFilter, BiquadState};
pub use params::{BandParams, CutKind, ParamError, ShelfShape};
pub use ramp::LinearRamp;
