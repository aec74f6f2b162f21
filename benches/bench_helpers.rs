//! Shared helpers for the madrigal benchmarks

/// Generate a sine wave test signal
pub fn generate_sine(frequency: f32, sample_rate: f32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate).sin())
        .collect()
}

/// Generate deterministic broadband noise in [-1, 1]
///
/// Plain LCG so benchmark inputs are reproducible without an RNG crate.
pub fn generate_noise(num_samples: usize) -> Vec<f32> {
    let mut state = 0x2545_f491_u32;
    (0..num_samples)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) as f32 / (1 << 23) as f32 - 1.0
        })
        .collect()
}
