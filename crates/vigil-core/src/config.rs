// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kit configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};

/// Alias of the single long-lived encryption key.
pub const DEFAULT_KEY_ALIAS: &str = "VigilKey";

/// Which key store backs the cipher engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStoreBackend {
    /// Hardware-backed store of the running platform.
    Platform,
    /// In-memory software keys. Keys vanish with the process.
    Software,
}

/// Runtime settings for a `SecurityKit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KitConfig {
    /// Alias the encryption key is provisioned under.
    pub key_alias: String,
    /// Upper bound for the privileged-command probe's child process.
    pub command_timeout_ms: u64,
    /// Initial value of the screen-security flag.
    pub screen_security_enabled: bool,
    /// Key store selection.
    pub key_store: KeyStoreBackend,
}

impl Default for KitConfig {
    fn default() -> Self {
        Self {
            key_alias: DEFAULT_KEY_ALIAS.to_owned(),
            command_timeout_ms: 2_000,
            screen_security_enabled: false,
            key_store: KeyStoreBackend::Platform,
        }
    }
}

impl KitConfig {
    /// Load a JSON config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<Self>(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engines cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.key_alias.trim().is_empty() {
            return Err(VigilError::Config("key_alias must not be empty".into()));
        }
        if self.command_timeout_ms == 0 {
            return Err(VigilError::Config("command_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}
