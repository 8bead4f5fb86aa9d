// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Vigil: Native platform bridge abstractions.
//!
//! The traits in [`traits`] expose raw environment facts (file existence,
//! system properties, debugger flags, network posture) and the hardware key
//! store. Each target OS gets one implementation, selected at compile time
//! by [`platform_bridge`] and [`platform_key_store`].

pub mod traits;

mod process;

#[cfg(any(target_os = "ios", target_os = "macos"))]
mod darwin;

#[cfg(target_os = "ios")]
pub mod ios;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod desktop;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

pub use traits::*;

/// Bridge implementation for the operating system this binary targets.
pub fn platform_bridge() -> Box<dyn traits::PlatformBridge> {
    #[cfg(target_os = "ios")]
    {
        Box::new(ios::IosBridge::new())
    }
    #[cfg(target_os = "android")]
    {
        Box::new(android::AndroidBridge::new())
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        Box::new(desktop::DesktopBridge::new())
    }
}

/// Hardware-backed key store for the target operating system.
///
/// Desktop builds have no hardware store; the returned store reports
/// `KeyStoreUnavailable` and callers select the software store explicitly.
pub fn platform_key_store() -> Box<dyn traits::SecureKeyStore> {
    #[cfg(target_os = "ios")]
    {
        Box::new(ios::keystore::SecureEnclaveKeyStore::new())
    }
    #[cfg(target_os = "android")]
    {
        Box::new(android::keystore::AndroidKeyStore::new())
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        Box::new(desktop::DesktopKeyStore)
    }
}
