use anyhow::Result;

use crate::config::{ConfigError, RunConfig};
use crate::service::TerminationPolicy;

#[test]
fn an_empty_config_file_gets_all_the_defaults() -> Result<()> {
    let config: RunConfig = serde_json::from_str("{}")?;
    config.validate()?;

    assert!(matches!(
        config.mode,
        TerminationPolicy::Unbounded {
            stock: 30,
            max_unsold_streak: 3,
        }
    ));
    assert_eq!(config.pricing.start, 30);
    assert_eq!(config.pricing.floor, 10);
    assert_eq!(config.pricing.decrement, 2);
    assert_eq!(config.tick_interval_ms, 1000);
    assert!(!config.quality_lots);
    assert!(!config.coalitions);
    Ok(())
}

#[test]
fn a_full_config_file_parses() -> Result<()> {
    let config: RunConfig = serde_json::from_str(
        r#"{
            "mode": { "finite": { "target": 5 } },
            "quality_lots": true,
            "pricing": { "start": 40, "floor": 8, "decrement": 4 },
            "tick_interval_ms": 250,
            "buyers": { "aggressive": 2, "typical": 3, "frugal": 1 },
            "coalitions": true,
            "seed": 42
        }"#,
    )?;
    config.validate()?;

    assert!(matches!(config.mode, TerminationPolicy::Finite { target: 5 }));
    assert_eq!(config.buyers.total(), 6);
    assert_eq!(config.seed, Some(42));
    Ok(())
}

#[test]
fn nonsense_pricing_is_rejected() {
    let mut config = RunConfig::default();
    config.pricing.floor = 50;
    assert_eq!(
        config.validate(),
        Err(ConfigError::FloorAboveStart {
            start: 30,
            floor: 50,
        })
    );

    let mut config = RunConfig::default();
    config.pricing.decrement = 0;
    assert_eq!(config.validate(), Err(ConfigError::ZeroDecrement));
}

#[test]
fn an_empty_population_is_rejected() {
    let mut config = RunConfig::default();
    config.buyers.aggressive = 0;
    config.buyers.typical = 0;
    config.buyers.frugal = 0;
    assert_eq!(config.validate(), Err(ConfigError::NoBuyers));
}
