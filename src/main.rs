use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use toml::Table;
use uncache::sim::backend::BackendConfig;
use uncache::sim::config::{Config, SimConfig};
use uncache::sim::top::Sim;
use uncache::traffic::config::TrafficConfig;
use uncache::uncache::UncacheConfig;

#[derive(Parser)]
#[command(version, about)]
struct UncacheArgs {
    #[arg(help="Path to config.toml")]
    config_path: PathBuf,
    #[arg(long, help="Enable log at level (0:none, 1:info, 2:debug)")]
    log: Option<u64>,
    #[arg(long, help="Override cycle limit")]
    timeout: Option<u64>,
    #[arg(long, help="Override traffic and backend seed")]
    seed: Option<u64>,
    #[arg(long, help="Override number of transaction slots")]
    num_slots: Option<usize>,
    #[arg(long, help="Override number of producer lanes")]
    num_lanes: Option<usize>,
}

pub fn main() -> Result<()> {
    env_logger::init();

    let argv = UncacheArgs::parse();
    let config = fs::read_to_string(&argv.config_path)
        .with_context(|| format!("failed to read config file {}", argv.config_path.display()))?;

    let config_table: Table = toml::from_str(&config).context("cannot parse config toml")?;
    let section = |name: &str| config_table.get(name);
    let mut sim_config = SimConfig::try_from_section("sim", section("sim"))?;
    let mut uncache_config = UncacheConfig::try_from_section("uncache", section("uncache"))?;
    let mut backend_config = BackendConfig::try_from_section("backend", section("backend"))?;
    let mut traffic_config = TrafficConfig::try_from_section("traffic", section("traffic"))?;

    // override toml configs with argv
    sim_config.log_level = argv.log.unwrap_or(sim_config.log_level);
    sim_config.timeout = argv.timeout.unwrap_or(sim_config.timeout);
    uncache_config.num_slots = argv.num_slots.unwrap_or(uncache_config.num_slots);
    uncache_config.num_lanes = argv.num_lanes.unwrap_or(uncache_config.num_lanes);
    if let Some(seed) = argv.seed {
        traffic_config.seed = seed;
        backend_config.seed = seed.wrapping_add(1);
    }
    uncache_config.validate()?;

    let results_json = sim_config.results_json.clone();
    let mut sim = Sim::new(sim_config, uncache_config, backend_config, traffic_config)?;
    let summary = sim.simulate()?;

    let json = serde_json::to_string_pretty(&summary)?;
    println!("{}", json);
    if let Some(path) = results_json {
        fs::write(&path, json)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
    }
    Ok(())
}
