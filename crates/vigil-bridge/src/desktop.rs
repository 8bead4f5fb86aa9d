// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Desktop/CI bridge.
//
// Answers what a workstation can answer through std and procfs/sysfs. Facts
// that only exist on mobile (system properties, adb, URL schemes, install
// provenance) return `PlatformUnavailable` and the probes read them as "not
// detected". There is no hardware key store on desktop; `DesktopKeyStore`
// refuses every request.

use std::path::Path;
use std::time::Duration;

use vigil_core::error::{Result, VigilError};
use vigil_core::{BuildMetadata, KeyHandle, KeyUsage, PlatformKind, SealedMessage};

use crate::process;
use crate::traits::*;

/// Proxy environment variables, in lookup order.
const PROXY_ENV_VARS: [&str; 4] = ["http_proxy", "HTTP_PROXY", "https_proxy", "HTTPS_PROXY"];

#[cfg(target_os = "linux")]
const DMI_DIR: &str = "/sys/class/dmi/id";

#[cfg(target_os = "linux")]
const NET_CLASS_DIR: &str = "/sys/class/net";

#[cfg(target_os = "linux")]
const DRM_CLASS_DIR: &str = "/sys/class/drm";

/// Bridge for Linux, macOS and Windows hosts.
pub struct DesktopBridge;

impl DesktopBridge {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBridge for DesktopBridge {
    fn platform_name(&self) -> &str {
        "Desktop"
    }

    fn platform_kind(&self) -> PlatformKind {
        PlatformKind::Desktop
    }
}

impl PlatformPropertyReader for DesktopBridge {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(VigilError::PlatformUnavailable)
    }
}

impl NativeBuildInfo for DesktopBridge {
    #[cfg(target_os = "linux")]
    fn build_metadata(&self) -> Result<BuildMetadata> {
        let read = |name: &str| read_trimmed(&Path::new(DMI_DIR).join(name)).unwrap_or_default();
        Ok(BuildMetadata {
            model: read("product_name"),
            manufacturer: read("sys_vendor"),
            board: read("board_name"),
            bootloader: read("bios_version"),
            ..Default::default()
        })
    }

    #[cfg(target_os = "macos")]
    fn build_metadata(&self) -> Result<BuildMetadata> {
        Ok(BuildMetadata {
            model: crate::darwin::sysctl_string("hw.model")?.unwrap_or_default(),
            manufacturer: "Apple".into(),
            ..Default::default()
        })
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    fn build_metadata(&self) -> Result<BuildMetadata> {
        Err(VigilError::PlatformUnavailable)
    }
}

impl NativeFilesystem for DesktopBridge {
    fn exists(&self, path: &str) -> Result<bool> {
        Ok(Path::new(path).try_exists()?)
    }

    fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        Ok(std::fs::write(path, contents)?)
    }

    fn remove_file(&self, path: &str) -> Result<()> {
        Ok(std::fs::remove_file(path)?)
    }
}

impl NativeProcess for DesktopBridge {
    fn run_command(&self, program: &str, args: &[&str], timeout: Duration) -> Result<Vec<String>> {
        process::run_with_timeout(program, args, timeout)
    }
}

impl NativeDebug for DesktopBridge {
    fn debugger_connected(&self) -> Result<bool> {
        #[cfg(target_os = "linux")]
        {
            process::procfs_traced()
        }
        #[cfg(target_os = "macos")]
        {
            crate::darwin::process_traced()
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            Err(VigilError::PlatformUnavailable)
        }
    }

    fn waiting_for_debugger(&self) -> Result<bool> {
        Err(VigilError::PlatformUnavailable)
    }
}

impl NativeNetwork for DesktopBridge {
    fn vpn_transport_active(&self) -> Result<bool> {
        Err(VigilError::PlatformUnavailable)
    }

    #[cfg(target_os = "linux")]
    fn network_service_keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(NET_CLASS_DIR)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    #[cfg(not(target_os = "linux"))]
    fn network_service_keys(&self) -> Result<Vec<String>> {
        Err(VigilError::PlatformUnavailable)
    }

    fn http_proxy_host(&self) -> Result<Option<String>> {
        Ok(PROXY_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.trim().is_empty()))
    }

    fn proxy_enabled(&self) -> Result<bool> {
        Err(VigilError::PlatformUnavailable)
    }
}

impl NativeDisplay for DesktopBridge {
    /// Counts DRM connectors whose status is `connected`.
    #[cfg(target_os = "linux")]
    fn display_count(&self) -> Result<usize> {
        let mut count = 0;
        for entry in std::fs::read_dir(DRM_CLASS_DIR)? {
            let entry = entry?;
            let name = entry.file_name();
            // Connectors look like `card0-HDMI-A-1`; bare `card0` is the device.
            if !name.to_string_lossy().contains('-') {
                continue;
            }
            if read_trimmed(&entry.path().join("status")).as_deref() == Some("connected") {
                count += 1;
            }
        }
        Ok(count)
    }

    #[cfg(not(target_os = "linux"))]
    fn display_count(&self) -> Result<usize> {
        Err(VigilError::PlatformUnavailable)
    }
}

impl NativeInstaller for DesktopBridge {
    fn installer_package(&self) -> Result<Option<String>> {
        Ok(None)
    }

    fn signing_certificate(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

impl NativeUrlSchemes for DesktopBridge {
    fn can_open_url(&self, _url: &str) -> Result<bool> {
        Err(VigilError::PlatformUnavailable)
    }
}

impl NativeDeveloperSettings for DesktopBridge {
    fn usb_debugging_enabled(&self) -> Result<bool> {
        Err(VigilError::PlatformUnavailable)
    }
}

#[cfg(target_os = "linux")]
fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_owned())
}

/// Key store placeholder for hosts without a hardware store.
pub struct DesktopKeyStore;

impl SecureKeyStore for DesktopKeyStore {
    fn nonce_len(&self) -> usize {
        12
    }

    fn get_or_create(&self, alias: &str, _usage: &[KeyUsage]) -> Result<KeyHandle> {
        tracing::warn!(alias, "no hardware key store on desktop");
        Err(VigilError::KeyStoreUnavailable(
            "no hardware-backed key store on this platform".into(),
        ))
    }

    fn encrypt(&self, _handle: &KeyHandle, _plaintext: &[u8]) -> Result<SealedMessage> {
        Err(VigilError::KeyStoreUnavailable(
            "no hardware-backed key store on this platform".into(),
        ))
    }

    fn decrypt(&self, _handle: &KeyHandle, _nonce: &[u8], _ciphertext: &[u8]) -> Result<Vec<u8>> {
        Err(VigilError::KeyStoreUnavailable(
            "no hardware-backed key store on this platform".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("probe.txt");
        let path = path.to_str().expect("utf-8 path");
        let bridge = DesktopBridge::new();

        assert!(!bridge.exists(path).expect("exists"));
        bridge.write_file(path, b"Jailbreak Test").expect("write");
        assert!(bridge.exists(path).expect("exists"));
        bridge.remove_file(path).expect("remove");
        assert!(!bridge.exists(path).expect("exists"));
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("no/such/dir/file.txt");
        let bridge = DesktopBridge::new();
        assert!(bridge.write_file(path.to_str().expect("utf-8 path"), b"x").is_err());
    }

    #[test]
    fn mobile_only_facts_are_unavailable() {
        let bridge = DesktopBridge::new();
        assert_eq!(bridge.platform_kind(), PlatformKind::Desktop);
        assert!(matches!(bridge.get("ro.kernel.qemu"), Err(VigilError::PlatformUnavailable)));
        assert!(matches!(bridge.can_open_url("cydia://"), Err(VigilError::PlatformUnavailable)));
        assert!(matches!(
            bridge.usb_debugging_enabled(),
            Err(VigilError::PlatformUnavailable)
        ));
        assert_eq!(bridge.installer_package().expect("installer"), None);
    }

    #[test]
    fn desktop_key_store_is_unavailable() {
        let store = DesktopKeyStore;
        let err = store
            .get_or_create("VigilKey", &KeyUsage::ENCRYPT_DECRYPT)
            .expect_err("desktop has no hardware store");
        assert!(matches!(err, VigilError::KeyStoreUnavailable(_)));
    }
}
