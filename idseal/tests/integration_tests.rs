//! Integration tests for idseal with `FileKeySource`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use idseal::client::seal_envelope;
use idseal::config::{ENV_BLIND_INDEX_SECRET, ENV_STORAGE_KEY};
use idseal::prelude::*;
use idseal_key_file::FileKeySource;
use std::path::Path;
use tempfile::TempDir;

const INDEX_SECRET: &str = "integration-test-blind-index-secret";
const STORAGE_KEY_B64: &str = "KioqKioqKioqKioqKioqKioqKioqKioqKioqKioqKio=";

fn config() -> Config {
    Config::default()
        .with_overrides(|name| match name {
            ENV_BLIND_INDEX_SECRET => Some(INDEX_SECRET.to_string()),
            ENV_STORAGE_KEY => Some(STORAGE_KEY_B64.to_string()),
            _ => None,
        })
        .expect("Failed to build config")
}

fn context_at(path: &Path) -> SecureContext {
    SecureContext::from_config(&config(), &FileKeySource::new(path))
        .expect("Failed to build secure context")
}

#[test]
fn test_end_to_end_ingest_with_file_source() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let context = context_at(&temp_dir.path().join("private_key.pem"));

    // Client side: encrypt the same value twice under the published key
    let first = seal_envelope(context.public_key_pem(), b"AB1234567").expect("Sealing failed");
    let second = seal_envelope(context.public_key_pem(), b"AB1234567").expect("Sealing failed");

    let first = context.ingest(&first).expect("Ingest failed");
    let second = context.ingest(&second).expect("Ingest failed");

    // Index is stable, lowercase hex, 64 characters
    assert_eq!(first.blind_index, second.blind_index);
    assert_eq!(first.blind_index.as_str().len(), 64);
    assert!(first
        .blind_index
        .as_str()
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));

    // Storage is randomized but both blobs open to the value
    assert_ne!(first.blob, second.blob);
    assert_eq!(context.open(&first.blob).expect("Open failed").expose(), "AB1234567");
    assert_eq!(context.open(&second.blob).expect("Open failed").expose(), "AB1234567");

    // Searching by index finds the record without decrypting anything
    assert_eq!(context.index("AB1234567"), first.blind_index);
    assert_ne!(context.index("AB1234568"), first.blind_index);
}

#[test]
fn test_key_pair_survives_restart() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("private_key.pem");

    let first_start = context_at(&path);
    assert!(path.exists());
    let envelope = seal_envelope(first_start.public_key_pem(), b"AB1234567").expect("Sealing failed");
    let record = first_start.ingest(&envelope).expect("Ingest failed");
    let published_key = first_start.public_key_pem().to_string();
    drop(first_start);

    let restart = context_at(&path);
    assert_eq!(restart.public_key_pem(), published_key);

    // Envelopes built against the old public key still decrypt
    assert_eq!(restart.decrypt(&envelope).expect("Decryption failed").expose(), "AB1234567");
    assert_eq!(restart.open(&record.blob).expect("Open failed").expose(), "AB1234567");
    assert_eq!(restart.index("AB1234567"), record.blind_index);
}

#[test]
fn test_blind_index_independent_of_key_pair() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let a = context_at(&temp_dir.path().join("a.pem"));
    let b = context_at(&temp_dir.path().join("b.pem"));

    assert_ne!(a.public_key_pem(), b.public_key_pem());
    assert_eq!(a.index("AB1234567"), b.index("AB1234567"));
}

#[test]
fn test_corrupt_key_file_prevents_startup() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("private_key.pem");
    std::fs::write(&path, "not a pem file").expect("Failed to write key file");

    let error = SecureContext::from_config(&config(), &FileKeySource::new(&path))
        .expect_err("Corrupt key file must be fatal");

    assert!(matches!(error, Error::KeySource(KeySourceError::Malformed(_))));
    assert_eq!(error.kind(), ErrorKind::Configuration);
    assert_eq!(std::fs::read_to_string(&path).expect("Key file vanished"), "not a pem file");
}

#[test]
fn test_missing_secrets_prevent_startup() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("private_key.pem");

    let result = SecureContext::from_config(&Config::default(), &FileKeySource::new(&path));

    assert!(matches!(result, Err(Error::Configuration(_))));
    assert!(!path.exists(), "no key may be generated for a misconfigured process");
}

#[test]
fn test_rejections_are_indistinguishable() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let context = context_at(&temp_dir.path().join("server.pem"));
    let other = context_at(&temp_dir.path().join("other.pem"));

    let good = seal_envelope(context.public_key_pem(), b"AB1234567").expect("Sealing failed");
    let wrong_recipient = seal_envelope(other.public_key_pem(), b"AB1234567").expect("Sealing failed");

    let mut flipped_key = good.wrapped_key().to_vec();
    flipped_key[0] ^= 0x01;
    let mut flipped_tag = good.tag().expect("Envelope has a tag").to_vec();
    flipped_tag[15] ^= 0x80;
    let mut flipped_data = good.ciphertext().to_vec();
    flipped_data[0] ^= 0x01;

    let rejected = [
        wrong_recipient,
        Envelope::new(flipped_key, good.iv().to_vec(), good.ciphertext().to_vec())
            .with_tag(good.tag().expect("Envelope has a tag").to_vec()),
        Envelope::new(good.wrapped_key().to_vec(), good.iv().to_vec(), good.ciphertext().to_vec())
            .with_tag(flipped_tag),
        Envelope::new(good.wrapped_key().to_vec(), good.iv().to_vec(), flipped_data)
            .with_tag(good.tag().expect("Envelope has a tag").to_vec()),
        Envelope::new(good.wrapped_key().to_vec(), vec![0u8; 8], good.ciphertext().to_vec()),
        Envelope::new(Vec::new(), Vec::new(), Vec::new()),
    ];

    let messages: Vec<String> = rejected
        .iter()
        .map(|envelope| {
            let error = context.ingest(envelope).expect_err("Envelope must be rejected");
            assert!(error.is_decryption_failure());
            error.to_string()
        })
        .collect();

    assert!(messages.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_browser_json_envelope_with_appended_tag() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let context = context_at(&temp_dir.path().join("private_key.pem"));
    let envelope = seal_envelope(context.public_key_pem(), b"AB1234567").expect("Sealing failed");

    // WebCrypto appends the tag to the ciphertext instead of sending it apart
    let mut data = envelope.ciphertext().to_vec();
    data.extend_from_slice(envelope.tag().expect("Envelope has a tag"));
    let json = serde_json::json!({
        "encrypted_key": STANDARD.encode(envelope.wrapped_key()),
        "iv": STANDARD.encode(envelope.iv()),
        "encrypted_data": STANDARD.encode(&data),
    });

    let encoded: EncodedEnvelope = serde_json::from_value(json).expect("Invalid envelope JSON");
    let record = context.ingest(&encoded.decode().expect("Invalid base64")).expect("Ingest failed");
    assert_eq!(context.open(&record.blob).expect("Open failed").expose(), "AB1234567");
}

#[test]
fn test_tampered_storage_blob_is_rejected() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let context = context_at(&temp_dir.path().join("private_key.pem"));
    let blob = context.seal("AB1234567").expect("Sealing failed");

    // Replace a character inside the ciphertext region
    let mut chars: Vec<char> = blob.into_string().chars().collect();
    chars[24] = if chars[24] == 'A' { 'B' } else { 'A' };
    let text: String = chars.into_iter().collect();

    let error = context.open(&StorageBlob::from(text)).expect_err("Tampered blob must be rejected");
    assert!(error.is_decryption_failure());
}
