// src/config.rs
//
// YAML config loading. Every section is optional; missing sections fall
// back to the defaults in types.rs.

use crate::types::Config;
use anyhow::{ensure, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.navigation.waypoint_limit >= 1,
            "navigation.waypoint_limit must be at least 1"
        );
        ensure!(
            self.polling.traffic_interval_secs >= 1,
            "polling.traffic_interval_secs must be at least 1"
        );
        Ok(())
    }
}
