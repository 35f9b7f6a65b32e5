//! Keyring command line
//!
//! Restores a keyring from a JSON options file (or starts empty), optionally
//! derives more accounts, and prints the serialized keyring with its accounts.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use hd_keyring::{Keyring, KeyringOptions};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "keyring")]
#[command(about = "HD Key Tree keyring: restore, derive accounts, print state")]
#[command(version)]
struct Cli {
    /// JSON file with `mnemonic`, `numberOfAccounts` and `hdPath`
    options: Option<PathBuf>,

    /// Number of accounts to derive after restoring
    count: Option<usize>,

    /// Enable debug logging when RUST_LOG is unset
    #[arg(short, long)]
    verbose: bool,
}

fn load_options(path: Option<&PathBuf>) -> anyhow::Result<KeyringOptions> {
    let Some(path) = path else {
        return Ok(KeyringOptions::default());
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read options file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid keyring options in {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let keyring = Keyring::new(load_options(cli.options.as_ref())?)?;

    if let Some(count) = cli.count {
        let added = keyring.add_accounts(count)?;
        tracing::info!(added = added.len(), "derived accounts");
    }

    let output = json!({
        "type": keyring.keyring_type(),
        "keyring": keyring.serialize()?,
        "accounts": keyring.get_accounts()?,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
