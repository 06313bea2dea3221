//! Daemon configuration.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use serde::Deserialize;

use bitmark_chain::parameters::Network;

/// Daemon configuration, loaded from a TOML file.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// chain to participate in
    pub network: Network,
    /// directory holding the pool database
    pub data_dir: PathBuf,
    /// hours an unpaid transaction may wait before it expires
    pub expiry_hours: i64,
    /// minutes between expiry sweeps
    pub sweep_minutes: u64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            network: Network::Live,
            data_dir: PathBuf::from("data"),
            expiry_hours: 72,
            sweep_minutes: 10,
        }
    }
}

impl Config {
    /// Read a configuration file; no path means the defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        match path {
            None => Ok(Config::default()),
            Some(path) => {
                let text = fs::read_to_string(path)
                    .wrap_err_with(|| format!("cannot read configuration: {}", path.display()))?;
                let config = toml::from_str(&text)
                    .wrap_err_with(|| format!("cannot parse configuration: {}", path.display()))?;
                Ok(config)
            }
        }
    }
}
