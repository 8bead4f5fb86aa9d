// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Vigil.

use serde::{Deserialize, Serialize};

/// A named boolean trust signal.
///
/// Rooted (Android) and jailbroken (iOS) share the single
/// [`Verdict::DeviceCompromised`] signal; the platform decides which probes
/// feed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    DeviceCompromised,
    Emulator,
    DebuggerAttached,
    VpnActive,
    ProxyActive,
    ExternalDisplay,
    UsbDebugging,
}

impl Verdict {
    /// Every verdict, in reporting order.
    pub const ALL: [Verdict; 7] = [
        Self::DeviceCompromised,
        Self::Emulator,
        Self::DebuggerAttached,
        Self::VpnActive,
        Self::ProxyActive,
        Self::ExternalDisplay,
        Self::UsbDebugging,
    ];

    /// Canonical camelCase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DeviceCompromised => "deviceCompromised",
            Self::Emulator => "emulator",
            Self::DebuggerAttached => "debuggerAttached",
            Self::VpnActive => "vpnActive",
            Self::ProxyActive => "proxyActive",
            Self::ExternalDisplay => "externalDisplay",
            Self::UsbDebugging => "usbDebugging",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Verdict {
    type Err = crate::VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| crate::VigilError::InvalidArgument(format!("unknown verdict: {s}")))
    }
}

/// What kind of fact a probe observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeCategory {
    Filesystem,
    Property,
    Process,
    Network,
    Display,
    /// Resolution of an external name (URL scheme, package, ...).
    Lookup,
}

/// The operating environment the bridge is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformKind {
    Android,
    Ios,
    IosSimulator,
    Desktop,
}

/// Build/device metadata strings as reported by the OS.
///
/// Fields the platform does not expose are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub fingerprint: String,
    pub device: String,
    pub model: String,
    pub brand: String,
    pub product: String,
    pub manufacturer: String,
    pub hardware: String,
    pub board: String,
    pub bootloader: String,
    pub tags: String,
}

impl BuildMetadata {
    /// Lowercase concatenation of the identifying fields (tags excluded).
    pub fn signature(&self) -> String {
        [
            &self.fingerprint,
            &self.device,
            &self.model,
            &self.brand,
            &self.product,
            &self.manufacturer,
            &self.hardware,
            &self.board,
            &self.bootloader,
        ]
        .into_iter()
        .map(String::as_str)
        .collect::<String>()
        .to_lowercase()
    }
}

/// Operations a provisioned key may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyUsage {
    Encrypt,
    Decrypt,
}

impl KeyUsage {
    /// The only usage set Vigil ever provisions.
    pub const ENCRYPT_DECRYPT: [KeyUsage; 2] = [Self::Encrypt, Self::Decrypt];
}

/// Where the key material behind a handle lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyBacking {
    /// Android Keystore (TEE or StrongBox).
    AndroidKeystore,
    /// Apple Secure Enclave.
    SecureEnclave,
    /// Process memory. Tests and desktop diagnostics only.
    Software,
}

/// Opaque reference to a key held inside a key store.
///
/// Never contains key bytes; stores resolve the handle back to their own
/// key object by alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHandle {
    alias: String,
    backing: KeyBacking,
}

impl KeyHandle {
    pub fn new(alias: impl Into<String>, backing: KeyBacking) -> Self {
        Self {
            alias: alias.into(),
            backing,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn backing(&self) -> KeyBacking {
        self.backing
    }
}

/// Raw output of an authenticated encryption before envelope framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedMessage {
    /// Per-message nonce/IV (may be empty when the primitive embeds it).
    pub nonce: Vec<u8>,
    /// Ciphertext including the authentication tag.
    pub ciphertext: Vec<u8>,
}

/// Distribution channel an application was installed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallChannel {
    PlayStore,
    AmazonAppstore,
    GalaxyStore,
    HuaweiAppGallery,
    AppStore,
    TestFlight,
    AdHoc,
    /// Installed by the package installer, adb or a file manager.
    Sideload,
    Other(String),
}

impl InstallChannel {
    /// Classify a raw installer identifier as reported by the platform.
    pub fn classify(installer: &str) -> Self {
        match installer {
            "com.android.vending" | "com.google.android.feedback" => Self::PlayStore,
            "com.amazon.venezia" => Self::AmazonAppstore,
            "com.sec.android.app.samsungapps" => Self::GalaxyStore,
            "com.huawei.appmarket" => Self::HuaweiAppGallery,
            "appstore" => Self::AppStore,
            "testflight" => Self::TestFlight,
            "adhoc" => Self::AdHoc,
            "com.google.android.packageinstaller"
            | "com.android.packageinstaller"
            | "com.android.shell" => Self::Sideload,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Whether the channel is a curated store.
    pub fn is_store(&self) -> bool {
        matches!(
            self,
            Self::PlayStore
                | Self::AmazonAppstore
                | Self::GalaxyStore
                | Self::HuaweiAppGallery
                | Self::AppStore
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_names_round_trip() {
        for verdict in Verdict::ALL {
            let parsed: Verdict = verdict.name().parse().expect("parse");
            assert_eq!(parsed, verdict);
        }
        assert!("rooted".parse::<Verdict>().is_err());
    }

    #[test]
    fn verdict_serializes_camel_case() {
        let json = serde_json::to_string(&Verdict::DeviceCompromised).expect("serialize");
        assert_eq!(json, "\"deviceCompromised\"");
    }

    #[test]
    fn build_signature_is_lowercase_concatenation() {
        let meta = BuildMetadata {
            fingerprint: "Google/SDK_gphone".into(),
            brand: "Google".into(),
            tags: "release-keys".into(),
            ..Default::default()
        };
        assert_eq!(meta.signature(), "google/sdk_gphonegoogle");
    }

    #[test]
    fn install_channel_classification() {
        assert_eq!(InstallChannel::classify("com.android.vending"), InstallChannel::PlayStore);
        assert_eq!(
            InstallChannel::classify("com.google.android.packageinstaller"),
            InstallChannel::Sideload
        );
        assert_eq!(
            InstallChannel::classify("org.fdroid.fdroid"),
            InstallChannel::Other("org.fdroid.fdroid".into())
        );
        assert!(InstallChannel::AppStore.is_store());
        assert!(!InstallChannel::TestFlight.is_store());
    }
}
