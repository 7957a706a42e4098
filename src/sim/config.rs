use std::path::PathBuf;

use anyhow::{Context, Result};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::Value;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    pub log_level: u64,
    pub timeout: u64,
    pub results_json: Option<PathBuf>,
}

pub trait Config: DeserializeOwned + Default {
    fn try_from_section(name: &str, section: Option<&Value>) -> Result<Self> {
        match section {
            Some(value) => value
                .clone()
                .try_into()
                .with_context(|| format!("cannot deserialize [{}] section", name)),
            None => {
                warn!("config section [{}] not found, using defaults", name);
                Ok(Self::default())
            }
        }
    }
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            log_level: 0,
            timeout: 100_000,
            results_json: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, SimConfig};

    #[test]
    fn missing_section_uses_defaults() {
        let config = SimConfig::try_from_section("sim", None).unwrap();
        assert_eq!(100_000, config.timeout);
        assert!(config.results_json.is_none());
    }

    #[test]
    fn bad_section_reports_its_name() {
        let table: toml::Table = toml::from_str("[sim]\ntimeout = \"soon\"\n").unwrap();
        let err = SimConfig::try_from_section("sim", table.get("sim")).unwrap_err();
        assert!(err.to_string().contains("[sim]"));
    }
}
