use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use strongbox_storage::KdfParams;

/// User-level configuration loaded from `~/.config/strongbox/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the container file.
    pub container: Option<PathBuf>,
    /// Argon2id cost for newly created containers.
    pub kdf: Option<KdfConfig>,
    /// Read the passphrase from the OS keychain instead of prompting.
    pub keyring: Option<KeyringConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct KdfConfig {
    pub mem_cost_kib: Option<u32>,
    pub time_cost: Option<u32>,
    pub parallelism: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct KeyringConfig {
    pub service: String,
    pub account: String,
}

impl Config {
    /// KDF params for new containers: config overrides on top of the defaults.
    pub fn kdf_params(&self) -> KdfParams {
        let defaults = KdfParams::default();
        match &self.kdf {
            Some(kdf) => KdfParams {
                mem_cost_kib: kdf.mem_cost_kib.unwrap_or(defaults.mem_cost_kib),
                time_cost: kdf.time_cost.unwrap_or(defaults.time_cost),
                parallelism: kdf.parallelism.unwrap_or(defaults.parallelism),
            },
            None => defaults,
        }
    }

    /// Reject settings that would only fail later, when a container is created
    /// or the keychain is queried.
    pub fn validate(&self) -> Result<()> {
        self.kdf_params()
            .validate()
            .map_err(|e| eyre!("[kdf] section: {e}"))?;
        if let Some(keyring) = &self.keyring {
            if keyring.service.trim().is_empty() || keyring.account.trim().is_empty() {
                return Err(eyre!("[keyring] service and account must not be empty"));
            }
        }
        Ok(())
    }
}

impl From<KdfParams> for KdfConfig {
    fn from(params: KdfParams) -> Self {
        Self {
            mem_cost_kib: Some(params.mem_cost_kib),
            time_cost: Some(params.time_cost),
            parallelism: Some(params.parallelism),
        }
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load and validate config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)
        .wrap_err_with(|| format!("malformed config at {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid config at {}", path.display()))?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| eyre!("no config dir available"))?;
    Ok(base.join("strongbox").join("config.toml"))
}

/// Write the given config to disk unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_to_path_if_missing(config, &default_path()?)
}

/// The written `[kdf]` section always spells out the effective Argon2id costs.
fn write_to_path_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    config.validate()?;
    let starter = Config {
        kdf: Some(KdfConfig::from(config.kdf_params())),
        ..config.clone()
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(&starter)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}
