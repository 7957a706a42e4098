use anyhow::{bail, Result};
use serde::Deserialize;

use crate::sim::config::Config;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct UncacheConfig {
    /// Outstanding transactions tracked at once.
    pub num_slots: usize,
    /// Producer lanes that can submit each cycle.
    pub num_lanes: usize,
    /// Writeback ports: one for ordered completions, the rest shared by unordered ones.
    pub num_wb_ports: usize,
    /// Slots the free list can take back per cycle.
    pub free_width: usize,
}

impl Config for UncacheConfig {}

impl Default for UncacheConfig {
    fn default() -> Self {
        Self {
            num_slots: 8,
            num_lanes: 3,
            num_wb_ports: 4,
            free_width: 4,
        }
    }
}

impl UncacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_slots == 0 {
            bail!("num_slots must be > 0");
        }
        if self.num_lanes == 0 {
            bail!("num_lanes must be > 0");
        }
        if self.free_width == 0 {
            bail!("free_width must be > 0");
        }
        if self.num_wb_ports < 2 {
            bail!(
                "num_wb_ports is {}, need one ordered port and at least one unordered port",
                self.num_wb_ports
            );
        }
        if self.num_wb_ports >= self.num_slots {
            bail!(
                "num_wb_ports ({}) must be smaller than num_slots ({})",
                self.num_wb_ports,
                self.num_slots
            );
        }
        Ok(())
    }

    pub fn unordered_ports(&self) -> usize {
        self.num_wb_ports - 1
    }
}

#[cfg(test)]
mod tests {
    use super::UncacheConfig;
    use crate::sim::config::Config;

    #[test]
    fn default_config_is_valid() {
        assert!(UncacheConfig::default().validate().is_ok());
        assert_eq!(3, UncacheConfig::default().unordered_ports());
    }

    #[test]
    fn rejects_too_few_ports() {
        let config = UncacheConfig { num_wb_ports: 1, ..UncacheConfig::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("num_wb_ports"));
    }

    #[test]
    fn rejects_more_ports_than_slots() {
        let config = UncacheConfig { num_slots: 2, num_wb_ports: 3, ..UncacheConfig::default() };
        assert!(config.validate().is_err());
        let config = UncacheConfig { num_slots: 4, num_wb_ports: 4, ..UncacheConfig::default() };
        assert!(config.validate().is_err());
        let config = UncacheConfig { num_slots: 3, num_wb_ports: 2, ..UncacheConfig::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn section_overrides_defaults() {
        let table: toml::Table = toml::from_str("[uncache]\nnum_slots = 16\nfree_width = 2\n").unwrap();
        let config = UncacheConfig::try_from_section("uncache", table.get("uncache")).unwrap();
        assert_eq!(16, config.num_slots);
        assert_eq!(2, config.free_width);
        assert_eq!(3, config.num_lanes);
    }
}
