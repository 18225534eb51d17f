//! On-disk keypair storage. Plaintext hex JSON — passphrase-based
//! encryption is out of scope here; operators are expected to protect the
//! file with filesystem permissions, the same trust boundary the CLI's
//! `keygen` subcommand assumes.

use crate::error::Result;
use crate::keypair::Keypair;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize)]
struct KeystoreFile {
    address: String,
    secret_hex: String,
}

pub fn save(keypair: &Keypair, path: impl AsRef<Path>) -> Result<()> {
    let file = KeystoreFile {
        address: keypair.address().to_hex(),
        secret_hex: keypair.secret_hex(),
    };
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<Keypair> {
    let json = std::fs::read_to_string(path)?;
    let file: KeystoreFile = serde_json::from_str(&json)?;
    let bytes = hex::decode(&file.secret_hex).map_err(|err| crate::error::WalletError::InvalidKey(err.to_string()))?;
    Keypair::from_secret_bytes(&bytes)
}
