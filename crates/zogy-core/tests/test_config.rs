use zogy_core::catalog::MatchPolicy;
use zogy_core::error::ZogyError;
use zogy_core::pipeline::config::{BackgroundMode, SubtractionConfig};
use zogy_core::pipeline::SubtractionStage;

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[test]
fn test_background_mode_display() {
    assert_eq!(format!("{}", BackgroundMode::Median), "Tile median");
    assert_eq!(format!("{}", BackgroundMode::Measured), "Measured raster");
}

#[test]
fn test_match_policy_display() {
    assert_eq!(format!("{}", MatchPolicy::Greedy), "Greedy");
    assert_eq!(format!("{}", MatchPolicy::MutualNearest), "Mutual nearest");
}

#[test]
fn test_stage_display() {
    assert_eq!(format!("{}", SubtractionStage::Subtracting), "Subtracting tiles");
}

// ---------------------------------------------------------------------------
// Defaults and validation
// ---------------------------------------------------------------------------

#[test]
fn test_defaults() {
    let config = SubtractionConfig::default();
    assert_eq!(config.tile_size, 1024);
    assert_eq!(config.tile_border, 28);
    assert_eq!(config.padded_size(), 1080);
    assert_eq!(config.background, BackgroundMode::Median);
    assert!(config.flux_ratio_local);
    assert!(config.offset_local);
    assert_eq!(config.offset_fallback_factor, 2.0);
    assert_eq!(config.matching.radius_arcsec, 1.0);
    assert_eq!(config.matching.policy, MatchPolicy::Greedy);
    assert!(config.pixel_scale.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_odd_padded_size_invalid() {
    let config = SubtractionConfig {
        tile_size: 1023,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ZogyError::OddDimension { height: 1079, .. })
    ));
}

#[test]
fn test_zero_tile_size_invalid() {
    let config = SubtractionConfig {
        tile_size: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ZogyError::InvalidConfig(_))));
}

#[test]
fn test_non_positive_values_invalid() {
    let mut config = SubtractionConfig {
        offset_fallback_factor: f64::NAN,
        ..Default::default()
    };
    assert!(config.validate().is_err());

    config.offset_fallback_factor = 2.0;
    config.matching.radius_arcsec = 0.0;
    assert!(config.validate().is_err());

    config.matching.radius_arcsec = 1.0;
    config.pixel_scale = Some(-0.4);
    assert!(config.validate().is_err());
}

// ---------------------------------------------------------------------------
// TOML
// ---------------------------------------------------------------------------

#[test]
fn test_toml_roundtrip() {
    let config = SubtractionConfig {
        tile_size: 512,
        tile_border: 32,
        background: BackgroundMode::Measured,
        offset_local: false,
        pixel_scale: Some(0.25),
        ..Default::default()
    };
    let text = toml::to_string_pretty(&config).unwrap();
    let back: SubtractionConfig = toml::from_str(&text).unwrap();
    assert_eq!(back.tile_size, 512);
    assert_eq!(back.tile_border, 32);
    assert_eq!(back.background, BackgroundMode::Measured);
    assert!(!back.offset_local);
    assert!(back.flux_ratio_local);
    assert_eq!(back.pixel_scale, Some(0.25));
}

#[test]
fn test_partial_toml_uses_defaults() {
    let text = r#"
        tile_size = 256
        background = "Measured"

        [matching]
        radius_arcsec = 1.5
        policy = "MutualNearest"
    "#;
    let config: SubtractionConfig = toml::from_str(text).unwrap();
    assert_eq!(config.tile_size, 256);
    assert_eq!(config.tile_border, 28);
    assert_eq!(config.background, BackgroundMode::Measured);
    assert_eq!(config.matching.radius_arcsec, 1.5);
    assert_eq!(config.matching.policy, MatchPolicy::MutualNearest);
    assert!(config.validate().is_ok());
}
