//! `idseal` CLI tool for key bootstrap and envelope processing.

#![warn(clippy::pedantic, clippy::nursery)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use idseal::client::seal_envelope;
use idseal::prelude::*;
use idseal_key_file::FileKeySource;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "idseal")]
#[command(about = "Key bootstrap and envelope processing for sensitive identity values", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file; `IDSEAL_*` variables override its values
    #[arg(short, long, global = true, env = "IDSEAL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new RSA private key file
    Keygen {
        /// Output path for the PEM file
        #[arg(short, long, default_value = "private_key.pem")]
        output: PathBuf,
        /// Modulus size in bits
        #[arg(long, default_value_t = 2048)]
        bits: usize,
    },
    /// Print the public key PEM for client distribution
    PublicKey,
    /// Generate a fresh blind index secret and storage key
    Secrets,
    /// Build a client envelope for a value (for testing)
    Envelope {
        /// Value to encrypt
        value: String,
        /// Public key PEM file; defaults to the configured key pair
        #[arg(long)]
        public_key: Option<PathBuf>,
    },
    /// Decrypt an envelope (JSON from a file or stdin)
    Decrypt {
        /// Envelope JSON file; `-` reads stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// Compute the blind index of a value
    Index {
        /// Value to index
        value: String,
    },
    /// Seal a value for storage
    Seal {
        /// Value to encrypt
        value: String,
    },
    /// Open a storage blob
    Open {
        /// Blob produced by `seal`
        blob: String,
    },
    /// Decrypt an envelope and print its blind index and storage blob
    Ingest {
        /// Envelope JSON file; `-` reads stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },
}

#[derive(Serialize)]
struct IngestOutput {
    blind_index: String,
    blob: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { output, bits } => keygen(&output, bits),
        Commands::PublicKey => {
            let keys = load_keys(&load_config(cli.config.as_deref())?)?;
            print!("{}", keys.public_key_pem());
            Ok(())
        }
        Commands::Secrets => {
            println!("IDSEAL_BLIND_INDEX_SECRET={}", IndexKey::generate().to_hex());
            println!("IDSEAL_STORAGE_KEY={}", StorageKey::generate().to_base64());
            Ok(())
        }
        Commands::Envelope { value, public_key } => {
            let pem = match public_key {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("cannot read {}", path.display()))?,
                None => load_keys(&load_config(cli.config.as_deref())?)?.public_key_pem().to_string(),
            };
            let envelope = seal_envelope(&pem, value.as_bytes())?;
            println!("{}", serde_json::to_string_pretty(&EncodedEnvelope::from(&envelope))?);
            Ok(())
        }
        Commands::Decrypt { input } => {
            let keys = load_keys(&load_config(cli.config.as_deref())?)?;
            let envelope = read_envelope(&input)?;
            let record = EnvelopeDecryptor::new(Arc::new(keys))
                .decrypt(&envelope)
                .context("envelope rejected")?;
            println!("{}", record.expose());
            Ok(())
        }
        Commands::Index { value } => {
            let indexer = load_config(cli.config.as_deref())?.blind_indexer()?;
            println!("{}", indexer.index(&value));
            Ok(())
        }
        Commands::Seal { value } => {
            let cipher = load_config(cli.config.as_deref())?.storage_cipher()?;
            println!("{}", cipher.seal(&value)?);
            Ok(())
        }
        Commands::Open { blob } => {
            let cipher = load_config(cli.config.as_deref())?.storage_cipher()?;
            let record = cipher.open(&StorageBlob::from(blob)).context("blob rejected")?;
            println!("{}", record.expose());
            Ok(())
        }
        Commands::Ingest { input } => {
            let config = load_config(cli.config.as_deref())?;
            let context = SecureContext::from_config(&config, key_source(&config).as_ref())?;
            let envelope = read_envelope(&input)?;
            let record = context.ingest(&envelope).context("envelope rejected")?;
            let output = IngestOutput {
                blind_index: record.blind_index.into_string(),
                blob: record.blob.into_string(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}

fn keygen(output: &Path, bits: usize) -> Result<()> {
    if output.exists() {
        bail!("{} already exists; refusing to replace an existing key", output.display());
    }
    let keys = KeyStore::load_or_generate(&FileKeySource::new(output).with_key_bits(bits))?;
    info!(path = %output.display(), bits = keys.modulus_bits(), "key pair written");
    print!("{}", keys.public_key_pem());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?.with_env()?,
        None => Config::from_env()?,
    };
    Ok(config)
}

/// Inline PEM wins over the key file.
fn key_source(config: &Config) -> Box<dyn KeySource> {
    match &config.keys.private_key_pem {
        Some(pem) => Box::new(PemKeySource::new(pem.clone())),
        None => Box::new(
            FileKeySource::new(&config.keys.private_key_path).with_key_bits(config.keys.key_bits),
        ),
    }
}

fn load_keys(config: &Config) -> Result<KeyStore> {
    Ok(KeyStore::load_or_generate(key_source(config).as_ref())?)
}

fn read_envelope(input: &Path) -> Result<Envelope> {
    let mut json = String::new();
    if input == Path::new("-") {
        std::io::stdin().read_to_string(&mut json).context("cannot read stdin")?;
    } else {
        json = std::fs::read_to_string(input)
            .with_context(|| format!("cannot read {}", input.display()))?;
    }
    let encoded: EncodedEnvelope = serde_json::from_str(&json).context("invalid envelope JSON")?;
    Ok(encoded.decode()?)
}
