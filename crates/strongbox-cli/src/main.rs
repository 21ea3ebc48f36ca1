mod cli;
mod commands;
mod config;
mod storage;

use std::io;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use secrecy::{ExposeSecret, SecretString};
use strongbox_interactor::SecureFileSystemInteractor;
use strongbox_storage::KeyringPassphraseProvider;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand, KeyringCommand};

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    let command = cli.command.unwrap_or(Command::List { category: None });

    match command {
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        Command::Keyring(KeyringCommand::Store) => store_keyring_passphrase(&config)?,
        Command::Init => {
            let sfs = storage::open_store(&config, cli.container)?;
            println!("Container ready at {}", sfs.path().display());
        }
        store_command => {
            let sut = SecureFileSystemInteractor::new(storage::open_store(&config, cli.container)?);
            run_store_command(store_command, &sut)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters; logs go to stderr so stdout stays scriptable.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn run_store_command<S>(command: Command, sut: &SecureFileSystemInteractor<S>) -> Result<()>
where
    S: strongbox_core::storage::SecureFileStore,
{
    let mut out = io::stdout().lock();
    match command {
        Command::Import {
            source,
            name,
            image,
        } => commands::import(sut, &source, name, image, &mut out),
        Command::Export { name, dest } => commands::export(sut, &name, &dest, &mut out),
        Command::List { category } => commands::list(sut, category, &mut out),
        Command::Info { name } => commands::info(sut, &name, &mut out),
        Command::Rename { old, new } => commands::rename(sut, &old, &new, &mut out),
        Command::Touch { name } => commands::touch(sut, &name, &mut out),
        Command::Delete { name } => commands::delete(sut, &name, &mut out),
        Command::Verify => commands::verify(sut, &mut out),
        other => Err(eyre!("{other:?} does not operate on the container")),
    }
}

fn print_version() {
    println!("strongbox {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

fn store_keyring_passphrase(config: &config::Config) -> Result<()> {
    let keyring = config
        .keyring
        .as_ref()
        .ok_or_else(|| eyre!("no [keyring] section in config; set service and account"))?;
    let first = SecretString::from(rpassword::prompt_password("New passphrase: ")?);
    let second = SecretString::from(rpassword::prompt_password("Repeat passphrase: ")?);
    if first.expose_secret() != second.expose_secret() {
        return Err(eyre!("passphrases do not match"));
    }
    KeyringPassphraseProvider::new(keyring.service.clone(), keyring.account.clone())
        .store(&first)?;
    println!(
        "Passphrase stored for {}/{}",
        keyring.service, keyring.account
    );
    Ok(())
}
