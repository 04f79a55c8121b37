//! Configuration Integration Tests

use std::io::Write;

use idea_impact::{AppConfig, ConfigService};
use idea_impact_llm::ModelPricing;

#[test]
fn test_pricing_overrides_survive_reload() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("config.json");

    let mut service = ConfigService::load(&path).unwrap();
    let mut config = service.get_config().clone();
    config.pricing = vec![ModelPricing::new("local-llm", 0, 0)];
    config.pipeline.extract = config.pipeline.extract.with_fallbacks(["local-llm"]);
    service.set_config(config.clone()).unwrap();

    let reloaded = ConfigService::load(&path).unwrap();
    assert_eq!(reloaded.get_config().pricing.len(), 1);
    assert_eq!(reloaded.get_config(), &config);
}

#[test]
fn test_hand_written_file_is_validated() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        br#"{"pipeline":{"extract":{"primary_model":"","fallback_models":[],"temperature":0.0}}}"#,
    )
    .unwrap();

    assert!(ConfigService::load(file.path()).is_err());
}

#[test]
fn test_defaults_route_every_stage_with_a_fallback() {
    let config = AppConfig::default();
    for (site, policy) in config.pipeline.call_sites() {
        assert!(!policy.fallback_models.is_empty(), "{site} has no fallback");
        assert_eq!(policy.max_retries, 3);
    }
}
