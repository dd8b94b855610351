// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Encrypted credential store — the username/password pair is serialised to
// JSON and encrypted with `age` to a per-installation X25519 identity.
//
// Layout inside the store directory:
//   master.key        age identity (AGE-SECRET-KEY-1...), mode 0600
//   credentials.age   age ciphertext of {"username": .., "password": ..}
//
// The identity is created on first save. Losing or replacing it makes the
// stored record unreadable, which `get_credentials` reports as "nothing
// stored" rather than an error.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use age::secrecy::ExposeSecret;
use age::x25519;
use tracing::{debug, info, instrument, warn};

use sharespool_core::credentials::CredentialProvider;
use sharespool_core::error::{Result, SpoolError};
use sharespool_core::types::Credentials;

const KEY_FILE: &str = "master.key";
const CREDENTIALS_FILE: &str = "credentials.age";

/// File-backed [`CredentialProvider`] with encryption at rest.
///
/// Every call re-reads the files, so several processes (or jobs) can share
/// one store directory.
pub struct EncryptedCredentialStore {
    dir: PathBuf,
}

impl EncryptedCredentialStore {
    /// Open the store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn key_path(&self) -> PathBuf {
        self.dir.join(KEY_FILE)
    }

    fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    fn load_identity(&self) -> Result<Option<x25519::Identity>> {
        let encoded = match fs::read_to_string(self.key_path()) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let identity = encoded
            .trim()
            .parse::<x25519::Identity>()
            .map_err(|e| SpoolError::Decryption(format!("master key: {e}")))?;
        Ok(Some(identity))
    }

    fn load_or_create_identity(&self) -> Result<x25519::Identity> {
        if let Some(identity) = self.load_identity()? {
            return Ok(identity);
        }
        let identity = x25519::Identity::generate();
        write_private(&self.key_path(), identity.to_string().expose_secret().as_bytes())?;
        info!(dir = %self.dir.display(), "created credential store master key");
        Ok(identity)
    }

    fn read_credentials(&self) -> Result<Option<Credentials>> {
        let ciphertext = match fs::read(self.credentials_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Some(identity) = self.load_identity()? else {
            return Err(SpoolError::Decryption("master key missing".into()));
        };
        let plaintext = decrypt(&identity, &ciphertext)?;
        let credentials: Credentials = serde_json::from_slice(&plaintext)?;
        Ok(Some(credentials))
    }
}

impl CredentialProvider for EncryptedCredentialStore {
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    fn get_credentials(&self) -> Option<Credentials> {
        match self.read_credentials() {
            Ok(found) => {
                debug!(present = found.is_some(), "credential lookup");
                found
            }
            Err(e) => {
                warn!(error = %e, "stored credentials unreadable, treating as absent");
                None
            }
        }
    }

    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    fn save_credentials(&self, username: &str, password: &str) -> Result<()> {
        let identity = self.load_or_create_identity()?;
        let plaintext = serde_json::to_vec(&Credentials::new(username, password))?;
        let ciphertext = encrypt(&identity.to_public(), &plaintext)?;
        write_private(&self.credentials_path(), &ciphertext)?;
        info!("credentials saved");
        Ok(())
    }

    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    fn clear_credentials(&self) -> Result<()> {
        match fs::remove_file(self.credentials_path()) {
            Ok(()) => info!("credentials cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no credentials to clear");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

fn encrypt(recipient: &x25519::Recipient, plaintext: &[u8]) -> Result<Vec<u8>> {
    let encryptor =
        age::Encryptor::with_recipients(std::iter::once(recipient as &dyn age::Recipient))
            .map_err(|e| SpoolError::Encryption(e.to_string()))?;

    let mut ciphertext = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut ciphertext)
        .map_err(|e| SpoolError::Encryption(e.to_string()))?;
    writer
        .write_all(plaintext)
        .map_err(|e| SpoolError::Encryption(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| SpoolError::Encryption(e.to_string()))?;

    Ok(ciphertext)
}

fn decrypt(identity: &x25519::Identity, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let decryptor =
        age::Decryptor::new(ciphertext).map_err(|e| SpoolError::Decryption(e.to_string()))?;

    let mut reader = decryptor
        .decrypt(std::iter::once(identity as &dyn age::Identity))
        .map_err(|e| SpoolError::Decryption(e.to_string()))?;

    let mut plaintext = Vec::new();
    reader
        .read_to_end(&mut plaintext)
        .map_err(|e| SpoolError::Decryption(e.to_string()))?;
    Ok(plaintext)
}

/// Write `data` to `path` via a sibling temp file, readable only by the owner.
fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
