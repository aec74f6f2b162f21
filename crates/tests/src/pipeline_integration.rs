//! Integration tests for the coefficient pipeline
//!
//! These tests drive the complete path a real host would: control-surface
//! edits on one side, block-sized audio processing on the other, with the
//! coefficient workers and the reclaim sweeper running in between.

use madrigal_core::domain::coeffs::{design, CoefficientSet};
use madrigal_core::domain::config::EqPreset;
use madrigal_core::domain::params::{BandParams, CutKind, ShelfShape};
use madrigal_infra::rt::{FilterChain, FilterStage, ReclaimPool, SmoothingState};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SAMPLE_RATE: f32 = 44_100.0;
const RAMP_SECS: f32 = 0.05;
const CHUNK: u32 = 32;

fn generate_sine_wave(frequency: f32, sample_rate: f32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| 2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate)
        .map(|phase| phase.sin())
        .collect()
}

fn response_at(set: &CoefficientSet, freq: f32) -> f32 {
    set.magnitude_at(freq, SAMPLE_RATE)
}

/// Tick a stage until its installed coefficients match `target` at `freq`
fn drive_to_convergence(stage: &mut FilterStage, target: &CoefficientSet, freq: f32) {
    let wanted = response_at(target, freq);
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        stage.inner_loop_update(true, CHUNK);
        let installed = response_at(stage.installed_coeffs().unwrap(), freq);
        if stage.smoothing_state() == SmoothingState::Settled && (installed - wanted).abs() < 1e-4 {
            return;
        }
        assert!(Instant::now() < deadline, "pipeline never converged");
        thread::sleep(Duration::from_millis(1));
    }
}

// ============================================================================
// BRING-UP AND CONVERGENCE
// ============================================================================

#[test]
fn test_initialize_installs_factory_coefficients_immediately() {
    // 44.1 kHz, peaking, 1 kHz, Q 1, 0 dB: coefficients must be valid
    // before the first audio block, with zero ramp distance
    let params = BandParams::peaking(1_000.0, 1.0, 0.0, ShelfShape::Peak);
    let pool = Arc::new(ReclaimPool::new());
    let stage = FilterStage::new(params, RAMP_SECS, SAMPLE_RATE, pool).unwrap();

    let expected = design(&params, SAMPLE_RATE).unwrap();
    let installed = stage.installed_coeffs().expect("no coefficients installed");
    for freq in [50.0, 1_000.0, 15_000.0] {
        assert!((response_at(installed, freq) - response_at(&expected, freq)).abs() < 1e-6);
    }
    assert_eq!(stage.smoothing_state(), SmoothingState::Settled);
}

#[test]
fn test_update_converges_to_factory_output() {
    // For P1 != P2: after update_params(P2) and enough ticks, the live
    // coefficients equal design(P2)
    let p1 = BandParams::peaking(1_000.0, 1.0, 0.0, ShelfShape::Peak);
    let p2 = BandParams::peaking(3_000.0, 2.0, -9.0, ShelfShape::Peak);

    let pool = Arc::new(ReclaimPool::new());
    let mut stage = FilterStage::new(p1, RAMP_SECS, SAMPLE_RATE, pool).unwrap();

    stage.update_params(p2);
    let expected = design(&p2, SAMPLE_RATE).unwrap();
    drive_to_convergence(&mut stage, &expected, 3_000.0);

    // Compare across the spectrum, not just at the center
    let installed = stage.installed_coeffs().unwrap();
    for freq in [100.0, 1_000.0, 3_000.0, 10_000.0] {
        assert!(
            (response_at(installed, freq) - response_at(&expected, freq)).abs() < 1e-3,
            "mismatch at {freq} Hz"
        );
    }
}

#[test]
fn test_frequency_move_settles_after_2205_samples() {
    // 1 kHz → 2 kHz with a 50 ms ramp at 44.1 kHz is exactly 2205 samples
    let p1 = BandParams::peaking(1_000.0, 1.0, 0.0, ShelfShape::Peak);
    let p2 = BandParams::peaking(2_000.0, 1.0, 0.0, ShelfShape::Peak);

    let pool = Arc::new(ReclaimPool::new());
    let mut stage = FilterStage::new(p1, RAMP_SECS, SAMPLE_RATE, pool).unwrap();
    stage.update_params(p2);

    let mut ticked: u32 = 0;
    while ticked < 2205 {
        assert_eq!(
            stage.smoothing_state(),
            SmoothingState::Smoothing,
            "settled early at {ticked} samples"
        );
        let step = CHUNK.min(2205 - ticked);
        stage.inner_loop_update(true, step);
        ticked += step;
    }
    assert_eq!(stage.smoothing_state(), SmoothingState::Settled);

    // After settling, the pipeline converges on design(P2)
    let expected = design(&p2, SAMPLE_RATE).unwrap();
    drive_to_convergence(&mut stage, &expected, 2_000.0);
}

#[test]
fn test_butterworth_topology_round_trip_through_pipeline() {
    let p1 = BandParams::cut(200.0, 0.707, 2, CutKind::LowCut);
    let p2 = BandParams::cut(200.0, 0.707, 7, CutKind::LowCut);

    let pool = Arc::new(ReclaimPool::new());
    let mut stage = FilterStage::new(p1, RAMP_SECS, SAMPLE_RATE, pool).unwrap();
    assert_eq!(stage.installed_coeffs().unwrap().section_count(), 1);

    stage.update_params(p2);
    let expected = design(&p2, SAMPLE_RATE).unwrap();
    drive_to_convergence(&mut stage, &expected, 100.0);

    // Order 7: one first-order section plus three second-order sections
    assert_eq!(stage.installed_coeffs().unwrap().section_count(), 4);
}

// ============================================================================
// AUDIO-SIDE BEHAVIOR
// ============================================================================

#[test]
fn test_chain_applies_boost_to_audio() {
    let bands = [BandParams::peaking(1_000.0, 1.0, 0.0, ShelfShape::Peak)];
    let mut chain = FilterChain::new(&bands, RAMP_SECS, SAMPLE_RATE).unwrap();

    chain
        .update_band(0, BandParams::peaking(1_000.0, 1.0, 12.0, ShelfShape::Peak))
        .unwrap();

    // Run well past the ramp plus worker latency, then measure
    let signal = generate_sine_wave(1_000.0, SAMPLE_RATE, 512);
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        let mut block = signal.clone();
        chain.process_block(&mut block);
        let peak = block.iter().map(|s| s.abs()).fold(0.0_f32, f32::max);
        if peak > 2.0 {
            break; // +12 dB ≈ 4x; past 2x proves the boost installed
        }
        assert!(Instant::now() < deadline, "boost never became audible");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_bypass_is_bit_exact_passthrough() {
    let mut params = BandParams::peaking(1_000.0, 1.0, 12.0, ShelfShape::Peak);
    params.set_bypassed(true);
    let mut chain = FilterChain::new(&[params], RAMP_SECS, SAMPLE_RATE).unwrap();

    let signal = generate_sine_wave(440.0, SAMPLE_RATE, 1_024);
    let mut block = signal.clone();
    chain.process_block(&mut block);
    assert_eq!(block, signal);
}

#[test]
fn test_rapid_churn_never_corrupts_audio() {
    // Hammer the control surface while audio keeps running; output must
    // stay finite and the pipeline must converge on the final edit
    let bands = [BandParams::peaking(500.0, 1.0, 0.0, ShelfShape::Peak)];
    let mut chain = FilterChain::new(&bands, RAMP_SECS, SAMPLE_RATE).unwrap();

    let mut block = vec![0.1_f32; 256];
    let mut final_params = bands[0];
    for i in 0..50 {
        let gain = (i % 13) as f32 - 6.0;
        let freq = 200.0 + (i as f32) * 50.0;
        final_params = BandParams::peaking(freq, 1.0, gain, ShelfShape::Peak);
        chain.update_band(0, final_params).unwrap();
        chain.process_block(&mut block);
        assert!(block.iter().all(|s| s.is_finite()), "audio corrupted");
    }

    let expected = design(&final_params, SAMPLE_RATE).unwrap();
    let wanted = expected.magnitude_at(final_params.frequency(), SAMPLE_RATE);
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        chain.process_block(&mut block);
        let installed = chain
            .stage(0)
            .unwrap()
            .installed_coeffs()
            .unwrap()
            .magnitude_at(final_params.frequency(), SAMPLE_RATE);
        if (installed - wanted).abs() < 1e-3 {
            break;
        }
        assert!(
            Instant::now() < deadline,
            "did not converge on the final edit"
        );
        thread::sleep(Duration::from_millis(1));
    }
}

// ============================================================================
// RECLAMATION
// ============================================================================

#[test]
fn test_churn_is_fully_reclaimed() {
    let bands = [BandParams::peaking(1_000.0, 1.0, 0.0, ShelfShape::Peak)];
    let mut chain = FilterChain::with_options(
        &bands,
        RAMP_SECS,
        SAMPLE_RATE,
        32,
        Duration::from_millis(25),
    )
    .unwrap();

    let mut block = vec![0.0_f32; 256];
    for gain in 1..=10 {
        chain
            .update_band(
                0,
                BandParams::peaking(1_000.0, 1.0, gain as f32, ShelfShape::Peak),
            )
            .unwrap();
        for _ in 0..20 {
            chain.process_block(&mut block);
        }
    }

    // Keep ticking so late worker results get installed and retired, and
    // wait for the sweeper to drain everything
    let deadline = Instant::now() + Duration::from_secs(4);
    loop {
        chain.process_block(&mut block);
        if !chain.pool().pending() && chain.pool().retained_len() == 0 {
            break;
        }
        assert!(Instant::now() < deadline, "reclaim pool still holds objects");
        thread::sleep(Duration::from_millis(10));
    }
}

// ============================================================================
// PRESET-DRIVEN FLOW
// ============================================================================

#[tokio::test]
async fn test_preset_round_trip_drives_chain() {
    let preset = EqPreset::factory_default();

    let dir = std::env::temp_dir().join(format!("madrigal-it-{}", std::process::id()));
    let path = dir.join("default.toml");
    preset.save_to_file(&path).await.unwrap();
    let loaded = EqPreset::load_from_file(&path).await.unwrap();
    std::fs::remove_dir_all(&dir).unwrap();

    let mut chain = FilterChain::from_preset(&loaded, 48_000.0).unwrap();
    assert_eq!(chain.band_count(), preset.bands.len());

    let mut block = generate_sine_wave(440.0, 48_000.0, 512);
    chain.process_block(&mut block);
    assert!(block.iter().all(|s| s.is_finite()));
}
