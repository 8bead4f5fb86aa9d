// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native capabilities.
//
// Each trait exposes raw facts only. Interpreting those facts (denylists,
// substrings, sentinels) is the probe library's job, so every platform
// shares the same heuristics and tests can swap the bridge for a fake.

use std::time::Duration;

use vigil_core::error::Result;
use vigil_core::{BuildMetadata, KeyHandle, KeyUsage, PlatformKind, SealedMessage};

/// Unified bridge that groups all environment-observing capabilities.
///
/// Platforms that cannot answer a question return
/// `VigilError::PlatformUnavailable`; probes treat that as "not detected".
pub trait PlatformBridge:
    PlatformPropertyReader
    + NativeBuildInfo
    + NativeFilesystem
    + NativeProcess
    + NativeDebug
    + NativeNetwork
    + NativeDisplay
    + NativeInstaller
    + NativeUrlSchemes
    + NativeDeveloperSettings
    + Send
    + Sync
{
    /// Human-readable platform name (e.g. "Android", "iOS").
    fn platform_name(&self) -> &str;

    /// Which verdict table applies to this environment.
    fn platform_kind(&self) -> PlatformKind;
}

/// Low-level system properties not exposed through a stable API
/// (Android `SystemProperties`, iOS simulator environment, ...).
pub trait PlatformPropertyReader {
    /// Read a property. `Ok(None)` when the property is unset.
    fn get(&self, key: &str) -> Result<Option<String>>;
}

/// Device/build metadata strings.
pub trait NativeBuildInfo {
    fn build_metadata(&self) -> Result<BuildMetadata>;
}

/// Filesystem access used by path and write probes.
pub trait NativeFilesystem {
    /// Whether anything exists at `path`.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Create or truncate `path` and write `contents`.
    fn write_file(&self, path: &str, contents: &[u8]) -> Result<()>;

    /// Remove the file at `path`.
    fn remove_file(&self, path: &str) -> Result<()>;
}

/// External process execution.
pub trait NativeProcess {
    /// Run `program` with `args` and return its stdout lines.
    ///
    /// The child is killed if it has not exited within `timeout`, in which
    /// case an error is returned.
    fn run_command(&self, program: &str, args: &[&str], timeout: Duration) -> Result<Vec<String>>;
}

/// Debugger state of the current process.
pub trait NativeDebug {
    /// The OS-reported trace/debug flag.
    fn debugger_connected(&self) -> Result<bool>;

    /// Whether the process is blocked waiting for a debugger to attach.
    fn waiting_for_debugger(&self) -> Result<bool>;
}

/// Network posture.
pub trait NativeNetwork {
    /// Whether any active network advertises VPN transport capability.
    fn vpn_transport_active(&self) -> Result<bool>;

    /// Names of configured network services / interfaces.
    fn network_service_keys(&self) -> Result<Vec<String>>;

    /// Configured HTTP proxy host, if any.
    fn http_proxy_host(&self) -> Result<Option<String>>;

    /// The system proxy-enable flag.
    fn proxy_enabled(&self) -> Result<bool>;
}

/// Display enumeration.
pub trait NativeDisplay {
    /// Number of active displays, including the built-in one.
    fn display_count(&self) -> Result<usize>;
}

/// Application install provenance.
pub trait NativeInstaller {
    /// Identifier of the package/channel that installed this app.
    fn installer_package(&self) -> Result<Option<String>>;

    /// DER bytes of the first certificate the app was signed with.
    fn signing_certificate(&self) -> Result<Option<Vec<u8>>>;
}

/// URL scheme resolution.
pub trait NativeUrlSchemes {
    /// Whether some installed app can handle `url`.
    fn can_open_url(&self, url: &str) -> Result<bool>;
}

/// Developer options.
pub trait NativeDeveloperSettings {
    /// Whether USB (adb) debugging is switched on.
    fn usb_debugging_enabled(&self) -> Result<bool>;
}

/// Hardware-backed key store.
///
/// Implementations must never hand raw key bytes to the caller: keys are
/// generated inside the store and used only through `encrypt`/`decrypt`.
pub trait SecureKeyStore: Send + Sync {
    /// Length of the nonce prefix this store emits in `SealedMessage::nonce`.
    fn nonce_len(&self) -> usize;

    /// Look up the key under `alias`, generating it with `usage` if absent.
    ///
    /// Must return the existing key when one is present; regenerating would
    /// orphan every ciphertext produced so far.
    fn get_or_create(&self, alias: &str, usage: &[KeyUsage]) -> Result<KeyHandle>;

    /// Authenticated encryption with a fresh random nonce.
    fn encrypt(&self, handle: &KeyHandle, plaintext: &[u8]) -> Result<SealedMessage>;

    /// Authenticated decryption. Tag mismatch is `AuthenticationFailed`.
    fn decrypt(&self, handle: &KeyHandle, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;
}
