// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// iOS platform bridge via objc2 and system C APIs.
//
// Three FFI mechanisms are used here:
//
// 1. **ObjC message sends** (`msg_send!`) for Foundation and UIKit
//    (NSProcessInfo, NSBundle, UIScreen, UIApplication).
// 2. **C functions** for kernel and network state (`sysctl`,
//    `CFNetworkCopySystemProxySettings`).
// 3. **std** for the filesystem probes.
//
// UIKit queries (screens, URL schemes) must run on the main thread. Off the
// main thread they return `VigilError::Bridge` and the probe reads that as
// "not detected".

#![cfg(target_os = "ios")]

pub mod keystore;

use std::ffi::c_void;
use std::path::Path;
use std::time::Duration;

use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2::{MainThreadMarker, class, msg_send};
use objc2_foundation::{NSNumber, NSString};
use objc2_ui_kit::UIApplication;

use vigil_core::error::{Result, VigilError};
use vigil_core::{BuildMetadata, PlatformKind};

use crate::darwin;
use crate::traits::*;

// ---------------------------------------------------------------------------
// CFNetwork FFI
// ---------------------------------------------------------------------------

#[link(name = "CFNetwork", kind = "framework")]
unsafe extern "C" {
    /// Returns a +1 retained CFDictionaryRef (Create/Copy rule).
    fn CFNetworkCopySystemProxySettings() -> *mut c_void;
}

/// Key under which per-interface proxy settings are listed. VPN services
/// register their interfaces here.
const SCOPED_KEY: &str = "__SCOPED__";

/// Whether this binary was built for the simulator.
const IS_SIMULATOR: bool = cfg!(any(target_abi = "sim", target_arch = "x86_64"));

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_main_thread() -> Result<MainThreadMarker> {
    MainThreadMarker::new()
        .ok_or_else(|| VigilError::Bridge("must be called from the main thread".into()))
}

/// `[dict objectForKey:key]` on any NSDictionary-like object.
fn dict_get(dict: &AnyObject, key: &str) -> Option<Retained<AnyObject>> {
    let key = NSString::from_str(key);
    // SAFETY: `dict` is an NSDictionary (or toll-free bridged CFDictionary);
    // objectForKey: returns nil or an autoreleased object.
    unsafe { msg_send![dict, objectForKey: &*key] }
}

fn as_string(obj: &AnyObject) -> Option<String> {
    obj.downcast_ref::<NSString>().map(|s| s.to_string())
}

/// The system proxy dictionary (`CFNetworkCopySystemProxySettings`).
fn proxy_settings() -> Result<Retained<AnyObject>> {
    // SAFETY: CFNetwork C function with no preconditions.
    let raw = unsafe { CFNetworkCopySystemProxySettings() };
    // SAFETY: the Copy rule hands us ownership of a CFDictionary, which is
    // toll-free bridged with NSDictionary.
    unsafe { Retained::from_raw(raw.cast::<AnyObject>()) }
        .ok_or_else(|| VigilError::Bridge("CFNetworkCopySystemProxySettings returned NULL".into()))
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// iOS implementation of the Vigil platform bridge.
pub struct IosBridge;

impl IosBridge {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IosBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBridge for IosBridge {
    fn platform_name(&self) -> &str {
        if IS_SIMULATOR { "iOS Simulator" } else { "iOS" }
    }

    fn platform_kind(&self) -> PlatformKind {
        if IS_SIMULATOR {
            PlatformKind::IosSimulator
        } else {
            PlatformKind::Ios
        }
    }
}

/// Properties are the process environment (`SIMULATOR_DEVICE_NAME` and
/// friends are injected by the simulator runtime).
impl PlatformPropertyReader for IosBridge {
    fn get(&self, key: &str) -> Result<Option<String>> {
        // SAFETY: NSProcessInfo class methods; `environment` is an
        // NSDictionary<NSString, NSString>.
        let environment: Retained<AnyObject> = unsafe {
            let info: Retained<AnyObject> = msg_send![class!(NSProcessInfo), processInfo];
            msg_send![&*info, environment]
        };
        Ok(dict_get(&environment, key).and_then(|v| as_string(&v)))
    }
}

impl NativeBuildInfo for IosBridge {
    fn build_metadata(&self) -> Result<BuildMetadata> {
        Ok(BuildMetadata {
            hardware: darwin::sysctl_string("hw.machine")?.unwrap_or_default(),
            model: darwin::sysctl_string("hw.model")?.unwrap_or_default(),
            manufacturer: "Apple".into(),
            ..Default::default()
        })
    }
}

impl NativeFilesystem for IosBridge {
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

impl NativeProcess for IosBridge {
    fn run_command(&self, _program: &str, _args: &[&str], _timeout: Duration) -> Result<Vec<String>> {
        // The sandbox forbids spawning.
        Err(VigilError::PlatformUnavailable)
    }
}

impl NativeDebug for IosBridge {
    fn debugger_connected(&self) -> Result<bool> {
        darwin::process_traced()
    }

    fn waiting_for_debugger(&self) -> Result<bool> {
        Err(VigilError::PlatformUnavailable)
    }
}

impl NativeNetwork for IosBridge {
    fn vpn_transport_active(&self) -> Result<bool> {
        Err(VigilError::PlatformUnavailable)
    }

    fn network_service_keys(&self) -> Result<Vec<String>> {
        let settings = proxy_settings()?;
        let Some(scoped) = dict_get(&settings, SCOPED_KEY) else {
            return Ok(Vec::new());
        };

        // SAFETY: `__SCOPED__` maps interface names to dictionaries;
        // allKeys/count/objectAtIndex: are NSDictionary/NSArray selectors.
        let keys: Retained<AnyObject> = unsafe { msg_send![&*scoped, allKeys] };
        let count: usize = unsafe { msg_send![&*keys, count] };
        let mut names = Vec::with_capacity(count);
        for i in 0..count {
            let key: Retained<AnyObject> = unsafe { msg_send![&*keys, objectAtIndex: i] };
            if let Some(name) = as_string(&key) {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn http_proxy_host(&self) -> Result<Option<String>> {
        let settings = proxy_settings()?;
        Ok(dict_get(&settings, "HTTPProxy").and_then(|v| as_string(&v)))
    }

    fn proxy_enabled(&self) -> Result<bool> {
        let settings = proxy_settings()?;
        Ok(dict_get(&settings, "HTTPEnable")
            .and_then(|v| v.downcast_ref::<NSNumber>().map(|n| n.as_i64() != 0))
            .unwrap_or(false))
    }
}

impl NativeDisplay for IosBridge {
    fn display_count(&self) -> Result<usize> {
        require_main_thread()?;
        // SAFETY: `+[UIScreen screens]` on the main thread returns an NSArray.
        let count: usize = unsafe {
            let screens: Retained<AnyObject> = msg_send![class!(UIScreen), screens];
            msg_send![&*screens, count]
        };
        Ok(count)
    }
}

/// Distribution channel from the bundle layout: a sandbox receipt means
/// TestFlight, an embedded provisioning profile means ad hoc/enterprise.
impl NativeInstaller for IosBridge {
    fn installer_package(&self) -> Result<Option<String>> {
        if IS_SIMULATOR {
            return Ok(None);
        }
        let name = NSString::from_str("embedded");
        let ext = NSString::from_str("mobileprovision");

        // SAFETY: NSBundle selectors returning nullable objects.
        let (receipt, profile) = unsafe {
            let bundle: Retained<AnyObject> = msg_send![class!(NSBundle), mainBundle];
            let url: Option<Retained<AnyObject>> = msg_send![&*bundle, appStoreReceiptURL];
            let receipt: Option<Retained<NSString>> = match url {
                Some(url) => msg_send![&*url, lastPathComponent],
                None => None,
            };
            let profile: Option<Retained<NSString>> =
                msg_send![&*bundle, pathForResource: &*name, ofType: &*ext];
            (receipt, profile)
        };

        let channel = if receipt.is_some_and(|r| r.to_string() == "sandboxReceipt") {
            "testflight"
        } else if profile.is_some() {
            "adhoc"
        } else {
            "appstore"
        };
        Ok(Some(channel.to_owned()))
    }

    fn signing_certificate(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

impl NativeUrlSchemes for IosBridge {
    fn can_open_url(&self, url: &str) -> Result<bool> {
        let mtm = require_main_thread()?;
        let ns_url = NSString::from_str(url);
        // SAFETY: `+[NSURL URLWithString:]` returns nil for malformed input.
        let url: Option<Retained<AnyObject>> =
            unsafe { msg_send![class!(NSURL), URLWithString: &*ns_url] };
        let Some(url) = url else {
            return Ok(false);
        };
        let app = UIApplication::sharedApplication(mtm);
        // SAFETY: canOpenURL: on the shared application, main thread held.
        let can_open: bool = unsafe { msg_send![&app, canOpenURL: &*url] };
        Ok(can_open)
    }
}

impl NativeDeveloperSettings for IosBridge {
    fn usb_debugging_enabled(&self) -> Result<bool> {
        Err(VigilError::PlatformUnavailable)
    }
}
