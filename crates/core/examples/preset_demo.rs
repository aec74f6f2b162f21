//! Example demonstrating the preset management system
//!
//! Run with: cargo run --package madrigal-core --example preset_demo

use madrigal_core::domain::coeffs::design;
use madrigal_core::domain::config::{EqPreset, PresetManager};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("madrigal_core=debug,info")
        .init();

    println!("=== Madrigal Preset Demo ===\n");

    // 1. Create factory default preset
    println!("1. Creating factory default preset...");
    let preset = EqPreset::factory_default();
    println!("   ✓ Created preset '{}' with {} bands", preset.name, preset.bands.len());

    // 2. Save preset to file
    println!("\n2. Saving preset to file...");
    let preset_path = "demo_preset.toml";
    preset.save_to_file(preset_path).await?;
    println!("   ✓ Preset saved to {}", preset_path);

    // 3. Load preset from file
    println!("\n3. Loading preset from file...");
    let loaded = EqPreset::load_from_file(preset_path).await?;
    println!("   ✓ Loaded preset with {} bands", loaded.bands.len());

    // 4. Display band information
    println!("\n4. Band configuration:");
    for (i, band) in loaded.bands.iter().enumerate() {
        println!(
            "   {}. {:?} - {} Hz, Q {}, gain {} dB, bypassed: {}",
            i + 1,
            band.mode,
            band.frequency,
            band.quality,
            band.gain_db,
            band.bypassed
        );
    }

    // 5. Design coefficients for every band
    println!("\n5. Designing coefficients:");
    let sample_rate = 48_000.0;
    for (band, params) in loaded.bands.iter().zip(loaded.band_params()) {
        let set = design(&params, sample_rate)?;
        println!(
            "   {:?} @ {} Hz → {} biquad section(s), |H| at band freq = {:.3}",
            band.mode,
            band.frequency,
            set.section_count(),
            set.magnitude_at(band.frequency, sample_rate)
        );
    }

    // 6. Preset management
    println!("\n6. Preset management:");
    let preset_dir = std::path::PathBuf::from("demo_presets");
    let manager = PresetManager::new(preset_dir.clone());

    println!("   Saving preset 'my_curve'...");
    manager.save_preset("my_curve", &loaded).await?;
    println!("   ✓ Preset saved");

    println!("   Listing available presets...");
    for name in manager.list_presets().await? {
        println!("   - {}", name);
    }

    println!("   Loading preset 'my_curve'...");
    let reloaded = manager.load_preset("my_curve").await?;
    println!("   ✓ Loaded preset with {} bands", reloaded.bands.len());

    println!("\n=== Demo Complete ===");

    // Cleanup
    std::fs::remove_file(preset_path)?;
    std::fs::remove_dir_all(preset_dir)?;

    Ok(())
}
