// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secure cipher engine: key provisioning plus string-in, envelope-out
// authenticated encryption over a `SecureKeyStore`.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use tracing::{debug, instrument};

use vigil_bridge::SecureKeyStore;
use vigil_core::error::{Result, VigilError};
use vigil_core::{KeyHandle, KeyUsage};

use crate::envelope;

/// Provisioning locks, one per alias, shared by every engine in the
/// process. Held across the store's look-up-or-generate.
static PROVISIONING: LazyLock<Mutex<HashMap<String, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn alias_lock(alias: &str) -> Arc<Mutex<()>> {
    let mut locks = PROVISIONING.lock().unwrap_or_else(PoisonError::into_inner);
    locks.entry(alias.to_owned()).or_default().clone()
}

/// Encrypts and decrypts UTF-8 strings under one key alias.
pub struct SecureCipherEngine {
    store: Arc<dyn SecureKeyStore>,
    alias: String,
}

impl SecureCipherEngine {
    pub fn new(store: Arc<dyn SecureKeyStore>, alias: impl Into<String>) -> Self {
        Self {
            store,
            alias: alias.into(),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Return the key under `alias`, generating it on first use.
    ///
    /// Concurrent callers for the same alias are serialized, so exactly one
    /// key is ever generated per alias.
    #[instrument(skip_all, fields(alias = %alias))]
    pub fn get_or_create_key(&self, alias: &str) -> Result<KeyHandle> {
        if alias.trim().is_empty() {
            return Err(VigilError::InvalidArgument("key alias must not be empty".into()));
        }
        let lock = alias_lock(alias);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.get_or_create(alias, &KeyUsage::ENCRYPT_DECRYPT)
    }

    /// Seal `plaintext` and return the base64 envelope.
    #[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let handle = self.get_or_create_key(&self.alias)?;
        let sealed = self.store.encrypt(&handle, plaintext.as_bytes())?;

        let expected = self.store.nonce_len();
        if sealed.nonce.len() != expected {
            return Err(VigilError::EncryptionFailed(format!(
                "store returned a {}-byte nonce, expected {expected}",
                sealed.nonce.len()
            )));
        }

        let framed = envelope::frame(&sealed);
        debug!(envelope_len = framed.len(), "encryption complete");
        Ok(framed)
    }

    /// Open a base64 envelope produced by [`Self::encrypt`].
    #[instrument(skip_all, fields(envelope_len = envelope.len()))]
    pub fn decrypt(&self, envelope: &str) -> Result<String> {
        let sealed = envelope::parse(envelope, self.store.nonce_len())?;
        let handle = self.get_or_create_key(&self.alias)?;
        let plaintext = self
            .store
            .decrypt(&handle, &sealed.nonce, &sealed.ciphertext)?;

        let text = String::from_utf8(plaintext).map_err(|_| VigilError::DecodingFailed)?;
        debug!(plaintext_len = text.len(), "decryption complete");
        Ok(text)
    }
}
