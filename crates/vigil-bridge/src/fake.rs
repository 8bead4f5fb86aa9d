// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory bridge for tests.
//
// Every fact is a plain field on `FakeState`. Individual capabilities can be
// told to fail or panic so callers can exercise their degradation paths.
// Every call is recorded in `FakeState::calls`.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use vigil_core::error::{Result, VigilError};
use vigil_core::{BuildMetadata, PlatformKind};

use crate::traits::*;

/// Observable environment of a [`FakeBridge`].
#[derive(Debug, Clone)]
pub struct FakeState {
    pub properties: HashMap<String, String>,
    pub build: BuildMetadata,
    /// Paths that exist.
    pub paths: HashSet<String>,
    /// Paths a write may create. Writes elsewhere fail with permission denied.
    pub writable: HashSet<String>,
    /// Paths whose removal fails.
    pub undeletable: HashSet<String>,
    /// Contents of files created through `write_file`.
    pub files: HashMap<String, Vec<u8>>,
    /// `"program arg1 arg2"` → stdout lines. Unlisted commands fail to spawn.
    pub commands: HashMap<String, Vec<String>>,
    pub debugger_connected: bool,
    pub waiting_for_debugger: bool,
    pub vpn_transport: bool,
    pub service_keys: Vec<String>,
    pub proxy_host: Option<String>,
    pub proxy_enabled: bool,
    pub displays: usize,
    pub installer: Option<String>,
    pub certificate: Option<Vec<u8>>,
    pub openable_urls: HashSet<String>,
    pub usb_debugging: bool,
    /// Capability names (e.g. `"exists"`) that return a bridge error.
    pub failing: HashSet<&'static str>,
    /// Capability names that panic when called.
    pub panicking: HashSet<&'static str>,
    /// Capability names in call order.
    pub calls: Vec<&'static str>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            properties: HashMap::new(),
            build: BuildMetadata::default(),
            paths: HashSet::new(),
            writable: HashSet::new(),
            undeletable: HashSet::new(),
            files: HashMap::new(),
            commands: HashMap::new(),
            debugger_connected: false,
            waiting_for_debugger: false,
            vpn_transport: false,
            service_keys: Vec::new(),
            proxy_host: None,
            proxy_enabled: false,
            displays: 1,
            installer: None,
            certificate: None,
            openable_urls: HashSet::new(),
            usb_debugging: false,
            failing: HashSet::new(),
            panicking: HashSet::new(),
            calls: Vec::new(),
        }
    }
}

/// Bridge whose answers come from a mutable [`FakeState`].
pub struct FakeBridge {
    kind: PlatformKind,
    state: Mutex<FakeState>,
}

impl FakeBridge {
    /// A clean environment: nothing suspicious, one display.
    pub fn new(kind: PlatformKind) -> Self {
        Self {
            kind,
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Builder-style mutation.
    pub fn with(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.lock());
        self
    }

    /// Mutate the environment between queries.
    pub fn update(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.lock());
    }

    /// Copy of the current state, including the call log.
    pub fn snapshot(&self) -> FakeState {
        self.lock().clone()
    }

    /// Capability names called so far.
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `call`, apply its failure mode, then answer from the state.
    ///
    /// The lock is released before panicking so a configured panic never
    /// poisons the state for later assertions.
    fn answer<T>(&self, call: &'static str, f: impl FnOnce(&mut FakeState) -> Result<T>) -> Result<T> {
        let (fail, panic) = {
            let mut state = self.lock();
            state.calls.push(call);
            (state.failing.contains(call), state.panicking.contains(call))
        };
        if panic {
            panic!("fake bridge: {call} configured to panic");
        }
        if fail {
            return Err(VigilError::Bridge(format!("fake bridge: {call} configured to fail")));
        }
        f(&mut self.lock())
    }
}

impl PlatformBridge for FakeBridge {
    fn platform_name(&self) -> &str {
        "Fake"
    }

    fn platform_kind(&self) -> PlatformKind {
        self.kind
    }
}

impl PlatformPropertyReader for FakeBridge {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.answer("get", |s| Ok(s.properties.get(key).cloned()))
    }
}

impl NativeBuildInfo for FakeBridge {
    fn build_metadata(&self) -> Result<BuildMetadata> {
        self.answer("build_metadata", |s| Ok(s.build.clone()))
    }
}

impl NativeFilesystem for FakeBridge {
    fn exists(&self, path: &str) -> Result<bool> {
        self.answer("exists", |s| {
            Ok(s.paths.contains(path) || s.files.contains_key(path))
        })
    }

    fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        self.answer("write_file", |s| {
            if !s.writable.contains(path) {
                return Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied).into());
            }
            s.files.insert(path.to_owned(), contents.to_vec());
            Ok(())
        })
    }

    fn remove_file(&self, path: &str) -> Result<()> {
        self.answer("remove_file", |s| {
            if s.undeletable.contains(path) {
                return Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied).into());
            }
            match s.files.remove(path) {
                Some(_) => Ok(()),
                None => Err(std::io::Error::from(std::io::ErrorKind::NotFound).into()),
            }
        })
    }
}

impl NativeProcess for FakeBridge {
    fn run_command(&self, program: &str, args: &[&str], _timeout: Duration) -> Result<Vec<String>> {
        let key = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.answer("run_command", |s| {
            s.commands
                .get(&key)
                .cloned()
                .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound).into())
        })
    }
}

impl NativeDebug for FakeBridge {
    fn debugger_connected(&self) -> Result<bool> {
        self.answer("debugger_connected", |s| Ok(s.debugger_connected))
    }

    fn waiting_for_debugger(&self) -> Result<bool> {
        self.answer("waiting_for_debugger", |s| Ok(s.waiting_for_debugger))
    }
}

impl NativeNetwork for FakeBridge {
    fn vpn_transport_active(&self) -> Result<bool> {
        self.answer("vpn_transport_active", |s| Ok(s.vpn_transport))
    }

    fn network_service_keys(&self) -> Result<Vec<String>> {
        self.answer("network_service_keys", |s| Ok(s.service_keys.clone()))
    }

    fn http_proxy_host(&self) -> Result<Option<String>> {
        self.answer("http_proxy_host", |s| Ok(s.proxy_host.clone()))
    }

    fn proxy_enabled(&self) -> Result<bool> {
        self.answer("proxy_enabled", |s| Ok(s.proxy_enabled))
    }
}

impl NativeDisplay for FakeBridge {
    fn display_count(&self) -> Result<usize> {
        self.answer("display_count", |s| Ok(s.displays))
    }
}

impl NativeInstaller for FakeBridge {
    fn installer_package(&self) -> Result<Option<String>> {
        self.answer("installer_package", |s| Ok(s.installer.clone()))
    }

    fn signing_certificate(&self) -> Result<Option<Vec<u8>>> {
        self.answer("signing_certificate", |s| Ok(s.certificate.clone()))
    }
}

impl NativeUrlSchemes for FakeBridge {
    fn can_open_url(&self, url: &str) -> Result<bool> {
        self.answer("can_open_url", |s| Ok(s.openable_urls.contains(url)))
    }
}

impl NativeDeveloperSettings for FakeBridge {
    fn usb_debugging_enabled(&self) -> Result<bool> {
        self.answer("usb_debugging_enabled", |s| Ok(s.usb_debugging))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_respect_writable_set() {
        let bridge = FakeBridge::new(PlatformKind::Ios).with(|s| {
            s.writable.insert("/private/jailbreak.txt".into());
        });

        assert!(bridge.write_file("/private/other.txt", b"x").is_err());
        bridge
            .write_file("/private/jailbreak.txt", b"Jailbreak Test")
            .expect("writable path");
        assert!(bridge.exists("/private/jailbreak.txt").expect("exists"));
        bridge.remove_file("/private/jailbreak.txt").expect("remove");
        assert!(bridge.snapshot().files.is_empty());
    }

    #[test]
    fn failure_modes_apply_per_capability() {
        let bridge = FakeBridge::new(PlatformKind::Android).with(|s| {
            s.failing.insert("exists");
            s.paths.insert("/sbin/su".into());
        });

        assert!(matches!(bridge.exists("/sbin/su"), Err(VigilError::Bridge(_))));
        assert!(!bridge.debugger_connected().expect("debugger flag"));
        assert_eq!(bridge.calls(), vec!["exists", "debugger_connected"]);
    }

    #[test]
    fn configured_panic_does_not_poison_state() {
        let bridge = FakeBridge::new(PlatformKind::Android).with(|s| {
            s.panicking.insert("display_count");
        });

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = bridge.display_count();
        }));
        assert!(outcome.is_err());
        assert_eq!(bridge.calls(), vec!["display_count"]);
    }

    #[test]
    fn unknown_command_fails_to_spawn() {
        let bridge = FakeBridge::new(PlatformKind::Android).with(|s| {
            s.commands
                .insert("/system/xbin/which su".into(), vec!["/system/xbin/su".into()]);
        });

        let lines = bridge
            .run_command("/system/xbin/which", &["su"], Duration::from_secs(2))
            .expect("listed command");
        assert_eq!(lines, vec!["/system/xbin/su".to_owned()]);
        assert!(bridge.run_command("/bin/false", &[], Duration::from_secs(2)).is_err());
    }
}
