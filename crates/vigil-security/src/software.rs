// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory AES-256-GCM key store (ring).
//
// Keys live in process memory and vanish with it. Used on desktop and in
// tests; mobile builds use the platform store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, info};

use vigil_bridge::SecureKeyStore;
use vigil_core::error::{Result, VigilError};
use vigil_core::{KeyBacking, KeyHandle, KeyUsage, SealedMessage};

const KEY_LEN: usize = 32;

/// Software key store backed by `ring`.
pub struct SoftwareKeyStore {
    rng: SystemRandom,
    keys: Mutex<HashMap<String, Arc<LessSafeKey>>>,
    generated: AtomicUsize,
}

impl SoftwareKeyStore {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
            keys: Mutex::new(HashMap::new()),
            generated: AtomicUsize::new(0),
        }
    }

    /// Number of keys generated since construction.
    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.lock().contains_key(alias)
    }

    /// Generate a fresh key under `alias`, replacing any existing one.
    /// Test stores use it to split look-up from generation.
    #[cfg(test)]
    pub(crate) fn generate(&self, alias: &str) -> Result<KeyHandle> {
        let key = self.random_key()?;
        self.lock().insert(alias.to_owned(), Arc::new(key));
        self.generated.fetch_add(1, Ordering::SeqCst);
        info!(alias, "software key generated");
        Ok(handle(alias))
    }

    fn random_key(&self) -> Result<LessSafeKey> {
        let mut bytes = [0u8; KEY_LEN];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| VigilError::KeyProvisioningFailed("system RNG failure".into()))?;
        let unbound = UnboundKey::new(&AES_256_GCM, &bytes)
            .map_err(|_| VigilError::KeyProvisioningFailed("AES-256-GCM key rejected".into()))?;
        Ok(LessSafeKey::new(unbound))
    }

    fn key(&self, handle: &KeyHandle) -> Result<Arc<LessSafeKey>> {
        self.lock().get(handle.alias()).cloned().ok_or_else(|| {
            VigilError::KeyStoreUnavailable(format!("no key under alias {}", handle.alias()))
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<LessSafeKey>>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SoftwareKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn handle(alias: &str) -> KeyHandle {
    KeyHandle::new(alias, KeyBacking::Software)
}

impl SecureKeyStore for SoftwareKeyStore {
    fn nonce_len(&self) -> usize {
        NONCE_LEN
    }

    fn get_or_create(&self, alias: &str, usage: &[KeyUsage]) -> Result<KeyHandle> {
        if !KeyUsage::ENCRYPT_DECRYPT.iter().all(|u| usage.contains(u)) {
            return Err(VigilError::KeyProvisioningFailed(
                "software keys are provisioned for encrypt and decrypt only".into(),
            ));
        }

        // Look-up and insert under one guard: concurrent callers get the
        // same key.
        let mut keys = self.lock();
        if keys.contains_key(alias) {
            debug!(alias, "software key found");
            return Ok(handle(alias));
        }
        keys.insert(alias.to_owned(), Arc::new(self.random_key()?));
        self.generated.fetch_add(1, Ordering::SeqCst);
        info!(alias, "software key generated");
        Ok(handle(alias))
    }

    fn encrypt(&self, handle: &KeyHandle, plaintext: &[u8]) -> Result<SealedMessage> {
        let key = self.key(handle)?;

        let mut nonce = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| VigilError::EncryptionFailed("system RNG failure".into()))?;

        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| VigilError::EncryptionFailed("AES-GCM seal failed".into()))?;

        Ok(SealedMessage {
            nonce: nonce.to_vec(),
            ciphertext: in_out,
        })
    }

    fn decrypt(&self, handle: &KeyHandle, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let key = self.key(handle)?;
        let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|_| VigilError::InvalidEnvelope)?;

        let mut in_out = ciphertext.to_vec();
        let len = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| VigilError::AuthenticationFailed)?
            .len();
        in_out.truncate(len);
        Ok(in_out)
    }
}
