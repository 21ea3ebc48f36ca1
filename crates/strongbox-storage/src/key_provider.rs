use secrecy::{ExposeSecret, SecretString};
use strongbox_core::storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("no passphrase available: {0}")]
    Missing(String),
}

impl From<KeyError> for StoreError {
    fn from(err: KeyError) -> Self {
        StoreError::Passphrase {
            reason: err.to_string(),
        }
    }
}

/// Supplies the container passphrase on demand (OS keychain, prompt, or memory in tests).
/// The engine asks exactly once per open and never stores the answer.
pub trait PassphraseProvider: Send + Sync {
    fn passphrase(&self) -> Result<SecretString, KeyError>;
}

impl<F> PassphraseProvider for F
where
    F: Fn() -> SecretString + Send + Sync,
{
    fn passphrase(&self) -> Result<SecretString, KeyError> {
        Ok(self())
    }
}

/// Fixed passphrase held in secret memory, for tests and scripted use.
pub struct StaticPassphrase {
    secret: SecretString,
}

impl StaticPassphrase {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(passphrase.into()),
        }
    }
}

impl std::fmt::Debug for StaticPassphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticPassphrase")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl PassphraseProvider for StaticPassphrase {
    fn passphrase(&self) -> Result<SecretString, KeyError> {
        Ok(SecretString::from(self.secret.expose_secret().to_owned()))
    }
}

/// OS keyring-backed provider. Uses the `keyring` crate to look up the passphrase.
pub struct KeyringPassphraseProvider {
    service: String,
    account: String,
}

impl KeyringPassphraseProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    /// Save a passphrase so later opens can run unattended.
    pub fn store(&self, passphrase: &SecretString) -> Result<(), KeyError> {
        self.entry()?
            .set_password(passphrase.expose_secret())
            .map_err(|e| KeyError::Keyring(e.to_string()))
    }

    fn entry(&self) -> Result<keyring::Entry, KeyError> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))
    }
}

impl PassphraseProvider for KeyringPassphraseProvider {
    fn passphrase(&self) -> Result<SecretString, KeyError> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(SecretString::from(secret)),
            Err(keyring::Error::NoEntry) => Err(KeyError::Missing(format!(
                "no keyring entry for {}/{}",
                self.service, self.account
            ))),
            Err(err) => Err(KeyError::Keyring(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_returns_same_passphrase() {
        let provider = StaticPassphrase::new("password");
        let first = provider.passphrase().unwrap();
        let second = provider.passphrase().unwrap();

        assert_eq!(first.expose_secret(), second.expose_secret());
        assert!(!format!("{provider:?}").contains("password"));
    }

    #[test]
    fn closures_act_as_providers() {
        let provider = || SecretString::from("from-closure");
        let secret = provider.passphrase().unwrap();
        assert_eq!(secret.expose_secret(), "from-closure");
    }

    #[test]
    fn key_errors_map_to_passphrase_failures() {
        let err: StoreError = KeyError::Missing("nothing configured".into()).into();
        assert!(matches!(err, StoreError::Passphrase { .. }));
    }
}
