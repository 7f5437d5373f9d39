//! Basic usage example for `idseal`.

use idseal::client::seal_envelope;
use idseal::config::{ENV_BLIND_INDEX_SECRET, ENV_STORAGE_KEY};
use idseal::prelude::*;
use idseal_key_file::FileKeySource;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("idseal Basic Usage Example");
    println!("==========================\n");

    // Secrets normally come from the environment; fresh ones keep the example self-contained
    let index_secret = IndexKey::generate().to_hex();
    let storage_key = StorageKey::generate().to_base64();
    let config = Config::default().with_overrides(|name| match name {
        ENV_BLIND_INDEX_SECRET => Some(index_secret.clone()),
        ENV_STORAGE_KEY => Some(storage_key.clone()),
        _ => None,
    })?;

    // Load the key pair, generating it on first run
    let source = FileKeySource::new("./example_private_key.pem");
    let context = SecureContext::from_config(&config, &source)?;
    println!("✓ Secure context ready ({})\n", source.describe());

    println!("Public key for clients:\n{}", context.public_key_pem());

    // What a browser would send
    let envelope = seal_envelope(context.public_key_pem(), b"AB1234567")?;
    let json = serde_json::to_string_pretty(&EncodedEnvelope::from(&envelope))?;
    println!("Client envelope:\n{json}\n");

    // Server side
    let record = context.ingest(&envelope)?;
    println!("✓ Blind index: {}", record.blind_index);
    println!("✓ Storage blob: {}\n", record.blob);

    // Lookup by value without decrypting anything
    assert_eq!(context.index("AB1234567"), record.blind_index);
    println!("✓ Blind index lookup matches");

    let opened = context.open(&record.blob)?;
    assert_eq!(opened.expose(), "AB1234567");
    println!("✓ Storage blob opens to the original value");

    // Tampering is rejected with one opaque error
    let tampered = Envelope::new(envelope.wrapped_key().to_vec(), envelope.iv().to_vec(), b"junk".to_vec());
    match context.ingest(&tampered) {
        Err(e) => println!("✓ Tampered envelope rejected: {e}"),
        Ok(_) => println!("✗ Tampered envelope accepted"),
    }

    Ok(())
}
