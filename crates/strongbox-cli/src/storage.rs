use std::path::PathBuf;

use color_eyre::Result;
use dirs::data_dir;
use secrecy::SecretString;
use strongbox_storage::{
    key_provider::KeyError, KeyringPassphraseProvider, PassphraseProvider, SecureFileSystem,
    StaticPassphrase,
};
use tracing::debug;

use crate::config::Config;

/// Environment variable checked before the keychain or an interactive prompt.
pub const PASSPHRASE_ENV: &str = "STRONGBOX_PASSPHRASE";

/// Resolve the default data directory for Strongbox.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("strongbox"))
}

/// Container path: CLI flag, then config, then the platform data dir.
pub fn container_path(config: &Config, flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = flag.or_else(|| config.container.clone()) {
        return Ok(path);
    }
    Ok(default_data_dir()?.join("store.sbx"))
}

/// Asks on the terminal without echo.
struct PromptPassphrase;

impl PassphraseProvider for PromptPassphrase {
    fn passphrase(&self) -> Result<SecretString, KeyError> {
        rpassword::prompt_password("Passphrase: ")
            .map(SecretString::from)
            .map_err(|e| KeyError::Missing(format!("prompt failed: {e}")))
    }
}

/// Pick where the passphrase comes from: environment, keychain, or prompt.
pub fn passphrase_provider(config: &Config) -> Box<dyn PassphraseProvider> {
    if let Ok(secret) = std::env::var(PASSPHRASE_ENV) {
        debug!("using passphrase from environment");
        return Box::new(StaticPassphrase::new(secret));
    }
    if let Some(keyring) = &config.keyring {
        debug!(service = %keyring.service, account = %keyring.account, "using keyring passphrase");
        return Box::new(KeyringPassphraseProvider::new(
            keyring.service.clone(),
            keyring.account.clone(),
        ));
    }
    Box::new(PromptPassphrase)
}

/// Open (or create) the configured container.
pub fn open_store(config: &Config, flag: Option<PathBuf>) -> Result<SecureFileSystem> {
    let path = container_path(config, flag)?;
    debug!(?path, "opening container");
    let provider = passphrase_provider(config);
    let sfs = SecureFileSystem::open_with_params(path, provider.as_ref(), config.kdf_params())?;
    Ok(sfs)
}
