//! # Node Identity
//!
//! Persistent Ed25519 identity for the storage node. The keypair lives at
//! `<blockstore_dir>/node_identity.key` (raw 32-byte secret, mode `0600`);
//! on first start a fresh key is generated and written, and every later
//! start loads the same key so the node keeps one peer identifier for its
//! whole on-chain life.
//!
//! The peer identifier is the lowercase hex encoding of the Ed25519
//! verifying key. Registration, checkpoints, and the p2p stack all use
//! this single identity.
//!
//! ## Determinism
//!
//! - `load_or_generate` is deterministic once a key file exists.
//! - Ed25519 signing is deterministic (RFC 8032), so the same identity
//!   always produces the same signature over the same bytes.

use std::fs;
use std::path::{Path, PathBuf};

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use tracing::info;

use crate::error::IdentityError;

/// File name of the persisted secret key inside the blockstore directory.
pub const IDENTITY_FILE: &str = "node_identity.key";

/// The node's Ed25519 keypair and derived peer identifier.
pub struct NodeIdentity {
    signing_key: SigningKey,
    peer_id: String,
}

impl std::fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}

impl NodeIdentity {
    /// Load the identity from `<blockstore_dir>/node_identity.key`, or
    /// generate and persist a new one if the file does not exist yet.
    /// Creates the blockstore directory if needed.
    pub fn load_or_generate(blockstore_dir: &Path) -> Result<Self, IdentityError> {
        let path = blockstore_dir.join(IDENTITY_FILE);

        if path.exists() {
            let bytes = fs::read(&path).map_err(|e| IdentityError::Read {
                path: display_path(&path),
                source: e,
            })?;
            let secret: [u8; 32] =
                bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| IdentityError::Corrupt {
                        path: display_path(&path),
                        len: bytes.len(),
                    })?;
            let identity = Self::from_secret(secret);
            info!(peer_id = %identity.peer_id, "loaded node identity");
            return Ok(identity);
        }

        fs::create_dir_all(blockstore_dir).map_err(|e| IdentityError::Write {
            path: display_path(blockstore_dir),
            source: e,
        })?;

        let signing_key = SigningKey::generate(&mut OsRng);
        write_secret(&path, signing_key.to_bytes())?;

        let identity = Self::from_signing_key(signing_key);
        info!(peer_id = %identity.peer_id, path = %display_path(&path), "generated node identity");
        Ok(identity)
    }

    /// Build an identity from a raw 32-byte secret. Deterministic.
    pub fn from_secret(secret: [u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(&secret))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let peer_id = hex::encode(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            peer_id,
        }
    }

    /// Stable peer identifier: lowercase hex of the verifying key.
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Public half of the keypair.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Signing half, for transports that authenticate with the node key.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(unix)]
fn write_secret(path: &PathBuf, secret: [u8; 32]) -> Result<(), IdentityError> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .map_err(|e| IdentityError::Write {
            path: display_path(path),
            source: e,
        })?;
    file.write_all(&secret).map_err(|e| IdentityError::Write {
        path: display_path(path),
        source: e,
    })
}

#[cfg(not(unix))]
fn write_secret(path: &PathBuf, secret: [u8; 32]) -> Result<(), IdentityError> {
    fs::write(path, secret).map_err(|e| IdentityError::Write {
        path: display_path(path),
        source: e,
    })
}
