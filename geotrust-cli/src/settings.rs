use std::fs;
use std::path::Path;

use anyhow::Context;
use geotrust_core::EngineConfig;

/// Load the engine configuration from `path`, or defaults when none is given
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let Some(path) = path else {
        log::debug!("No configuration file, using defaults");
        return Ok(EngineConfig::default());
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration {}", path.display()))?;
    let config = EngineConfig::from_json_str(&text)
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    log::info!(
        "Loaded configuration {}: attendance radius {} m, checkpoint radius {} m",
        path.display(),
        config.attendance.radius_meters,
        config.trip.checkpoint_radius_meters
    );
    Ok(config)
}
