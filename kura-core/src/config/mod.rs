pub mod persistence;
pub mod telemetry;

use serde::Deserialize;
use std::{env, path::Path};

use crate::constants::Constants;

use self::{persistence::Persistence, telemetry::Telemetry};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub persistence: Persistence,
    #[serde(default)]
    pub telemetry: Telemetry,
}

impl Config {
    pub(crate) fn get_config_dir() -> anyhow::Result<String> {
        if let Ok(dir) = env::var(Constants::ConfigDirEnv.to_string()) {
            return Ok(dir);
        }

        let mut path = env::current_exe()?;
        path.pop();
        path.push("config");

        if !path.is_dir() {
            if Path::new("kura-runtime/config").is_dir() {
                return Ok("kura-runtime/config".into());
            }

            if Path::new("config").is_dir() {
                return Ok("config".into());
            }

            return Err(anyhow::anyhow!("default config dir was not found"));
        }

        match path.to_str() {
            Some(v) => Ok(v.into()),
            _ => Err(anyhow::anyhow!("failed to get default config dir")),
        }
    }

    pub fn custom(run_mode: String, config_dir: String) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name(&format!("{}/default", config_dir)))
            // Add in the current environment file, this file is _optional_
            .add_source(
                config::File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false),
            )
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name(&format!("{}/local", config_dir)).required(false))
            // Eg.. `KURA_PERSISTENCE__DATA_SERVICE_PORT=15008` overrides the data service port
            .add_source(
                config::Environment::with_prefix(&Constants::EnvironmentPrefix.to_string())
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.persistence.validate()?;

        Ok(config)
    }

    pub fn custom_run_mode(run_mode: String) -> anyhow::Result<Self> {
        let config_dir = Self::get_config_dir()?;

        Self::custom(run_mode, config_dir)
    }

    pub fn new() -> anyhow::Result<Self> {
        let run_mode = env::var(Constants::RunModeEnv.to_string())
            .unwrap_or_else(|_| "development".into());
        Self::custom_run_mode(run_mode)
    }
}
