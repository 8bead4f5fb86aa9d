// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SecurityKit: one object owning both engines plus the screen-security flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use vigil_bridge::{PlatformBridge, SecureKeyStore};
use vigil_core::error::Result;
use vigil_core::{KeyStoreBackend, KitConfig, Verdict};
use vigil_integrity::{IntegrityEngine, ProbeReport, TrustReport};
use vigil_security::{SecureCipherEngine, SoftwareKeyStore};

/// Integrity verdicts and string encryption behind one handle.
pub struct SecurityKit {
    integrity: IntegrityEngine,
    cipher: SecureCipherEngine,
    screen_security: AtomicBool,
}

impl SecurityKit {
    pub fn new(
        bridge: Arc<dyn PlatformBridge>,
        store: Arc<dyn SecureKeyStore>,
        config: &KitConfig,
    ) -> Self {
        Self {
            integrity: IntegrityEngine::new(bridge, config.command_timeout()),
            cipher: SecureCipherEngine::new(store, config.key_alias.clone()),
            screen_security: AtomicBool::new(config.screen_security_enabled),
        }
    }

    /// Kit wired to the running platform's bridge and the configured store.
    pub fn from_config(config: &KitConfig) -> Result<Self> {
        config.validate()?;

        let bridge: Arc<dyn PlatformBridge> = Arc::from(vigil_bridge::platform_bridge());
        let store: Arc<dyn SecureKeyStore> = match config.key_store {
            KeyStoreBackend::Platform => Arc::from(vigil_bridge::platform_key_store()),
            KeyStoreBackend::Software => Arc::new(SoftwareKeyStore::new()),
        };
        info!(
            platform = bridge.platform_name(),
            key_store = ?config.key_store,
            alias = %config.key_alias,
            "security kit ready"
        );
        Ok(Self::new(bridge, store, config))
    }

    pub fn is_device_compromised(&self) -> bool {
        self.integrity.evaluate(Verdict::DeviceCompromised)
    }

    pub fn is_emulated(&self) -> bool {
        self.integrity.evaluate(Verdict::Emulator)
    }

    pub fn is_debugger_attached(&self) -> bool {
        self.integrity.evaluate(Verdict::DebuggerAttached)
    }

    pub fn is_vpn_active(&self) -> bool {
        self.integrity.evaluate(Verdict::VpnActive)
    }

    pub fn is_proxy_active(&self) -> bool {
        self.integrity.evaluate(Verdict::ProxyActive)
    }

    pub fn is_external_display_connected(&self) -> bool {
        self.integrity.evaluate(Verdict::ExternalDisplay)
    }

    pub fn is_usb_debugging_enabled(&self) -> bool {
        self.integrity.evaluate(Verdict::UsbDebugging)
    }

    pub fn install_source(&self) -> Option<String> {
        self.integrity.install_source()
    }

    pub fn app_signature_hash(&self) -> Option<String> {
        self.integrity.app_signature_hash()
    }

    pub fn report(&self) -> TrustReport {
        self.integrity.evaluate_all()
    }

    pub fn explain(&self, verdict: Verdict) -> Vec<ProbeReport> {
        self.integrity.explain(verdict)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        self.cipher.encrypt(plaintext)
    }

    pub fn decrypt(&self, envelope: &str) -> Result<String> {
        self.cipher.decrypt(envelope)
    }

    /// Set the flag. Nothing else happens; the host UI reads it back.
    pub fn set_screen_security(&self, enabled: bool) {
        self.screen_security.store(enabled, Ordering::SeqCst);
    }

    pub fn is_screen_security_enabled(&self) -> bool {
        self.screen_security.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_bridge::fake::FakeBridge;
    use vigil_core::{PlatformKind, VigilError};

    fn kit(bridge: FakeBridge) -> SecurityKit {
        let config = KitConfig {
            key_alias: "kit-tests".into(),
            ..KitConfig::default()
        };
        SecurityKit::new(Arc::new(bridge), Arc::new(SoftwareKeyStore::new()), &config)
    }

    #[test]
    fn verdict_accessors_follow_the_bridge() {
        let kit = kit(FakeBridge::new(PlatformKind::Android).with(|s| {
            s.paths.insert("/system/bin/su".into());
            s.proxy_host = Some("10.0.0.2".into());
        }));
        assert!(kit.is_device_compromised());
        assert!(kit.is_proxy_active());
        assert!(!kit.is_emulated());
        assert!(!kit.is_debugger_attached());
        assert!(!kit.is_vpn_active());
        assert!(!kit.is_external_display_connected());
        assert!(!kit.is_usb_debugging_enabled());
    }

    #[test]
    fn encrypt_round_trip() {
        let kit = kit(FakeBridge::new(PlatformKind::Android));
        let envelope = kit.encrypt("hello world").expect("encrypt");
        assert_eq!(kit.decrypt(&envelope).expect("decrypt"), "hello world");
    }

    #[test]
    fn screen_security_flag() {
        let kit = kit(FakeBridge::new(PlatformKind::Ios));
        assert!(!kit.is_screen_security_enabled());
        kit.set_screen_security(true);
        assert!(kit.is_screen_security_enabled());
        kit.set_screen_security(false);
        assert!(!kit.is_screen_security_enabled());
    }

    #[test]
    fn configured_initial_screen_security() {
        let config = KitConfig {
            screen_security_enabled: true,
            ..KitConfig::default()
        };
        let kit = SecurityKit::new(
            Arc::new(FakeBridge::new(PlatformKind::Android)),
            Arc::new(SoftwareKeyStore::new()),
            &config,
        );
        assert!(kit.is_screen_security_enabled());
    }

    #[test]
    fn from_config_rejects_invalid_settings() {
        let config = KitConfig {
            command_timeout_ms: 0,
            ..KitConfig::default()
        };
        assert!(matches!(SecurityKit::from_config(&config), Err(VigilError::Config(_))));
    }

    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    #[test]
    fn desktop_kit_with_software_store() {
        let config = KitConfig {
            key_alias: "kit-desktop".into(),
            key_store: KeyStoreBackend::Software,
            ..KitConfig::default()
        };
        let kit = SecurityKit::from_config(&config).expect("kit");
        assert!(!kit.is_device_compromised());
        assert!(!kit.is_usb_debugging_enabled());

        let envelope = kit.encrypt("desktop").expect("encrypt");
        assert_eq!(kit.decrypt(&envelope).expect("decrypt"), "desktop");
    }

    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    #[test]
    fn desktop_platform_store_is_unavailable() {
        let kit = SecurityKit::from_config(&KitConfig::default()).expect("kit");
        let err = kit.encrypt("x").expect_err("no hardware store");
        assert!(matches!(err, VigilError::KeyStoreUnavailable(_)));
    }
}
