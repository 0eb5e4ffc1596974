use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{ClassifierError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| ClassifierError::Config(format!("failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| ClassifierError::Config(format!("failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.interfaces.is_empty() {
        return Err(ClassifierError::Config("at least one interface is required".to_string()));
    }

    if !(0.0..=8.0).contains(&cfg.entropy_threshold) {
        return Err(ClassifierError::Config(format!(
            "entropy_threshold must be within [0.0, 8.0], got {}",
            cfg.entropy_threshold
        )));
    }

    if cfg.blocklist_capacity == 0 {
        return Err(ClassifierError::Config("blocklist_capacity must be > 0".to_string()));
    }

    if cfg.cleanup_interval_secs == 0 {
        return Err(ClassifierError::Config("cleanup_interval_secs must be > 0".to_string()));
    }

    Ok(())
}
