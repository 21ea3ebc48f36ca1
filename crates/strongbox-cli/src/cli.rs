use std::path::PathBuf;

use clap::{Parser, Subcommand};
use strongbox_core::FileCategory;

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "strongbox",
    about = "Password-protected encrypted file store",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Container file to use instead of the configured one.
    #[arg(long, global = true, env = "STRONGBOX_CONTAINER")]
    pub container: Option<PathBuf>,
    /// Optional subcommand; defaults to listing entries when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the container if it does not exist yet.
    Init,
    /// Copy an external file into the container. Refuses to overwrite.
    Import {
        source: PathBuf,
        /// Entry name; defaults to the source file name.
        #[arg(long)]
        name: Option<String>,
        /// Store as an image regardless of the extension.
        #[arg(long)]
        image: bool,
    },
    /// Decrypt an entry and write it to `dest`.
    Export { name: String, dest: PathBuf },
    /// List entry names in insertion order.
    List {
        #[arg(long)]
        category: Option<FileCategory>,
    },
    /// Show size and creation date of an entry.
    Info { name: String },
    /// Rename an entry, keeping its payload and creation date.
    Rename { old: String, new: String },
    /// Create an empty entry if the name is free.
    Touch { name: String },
    /// Remove an entry. Deleting a missing name is not an error.
    Delete { name: String },
    /// Decrypt every entry to check the container is intact.
    Verify,
    /// Manage the keychain passphrase.
    #[command(subcommand)]
    Keyring(KeyringCommand),
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version and exit.
    Version,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum KeyringCommand {
    /// Prompt for the passphrase and save it in the OS keychain.
    Store,
}
