// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Probe library.
//
// Every heuristic (denylists, substrings, sentinel values) lives here and
// is expressed against the bridge traits, so one list serves every
// platform and tests run against `FakeBridge`.

use std::time::Duration;

use vigil_bridge::traits::*;
use vigil_core::error::VigilError;
use vigil_core::{InstallChannel, ProbeCategory};

use crate::probe::Probe;

/// su binaries and the legacy Superuser APK.
pub const ANDROID_SU_PATHS: [&str; 10] = [
    "/system/app/Superuser.apk",
    "/sbin/su",
    "/system/bin/su",
    "/system/xbin/su",
    "/data/local/xbin/su",
    "/data/local/bin/su",
    "/system/sd/xbin/su",
    "/system/bin/failsafe/su",
    "/data/local/su",
    "/su/bin/su",
];

/// Magisk and Xposed artifacts.
pub const ANDROID_ROOT_MANAGER_PATHS: [&str; 6] = [
    "/data/adb/magisk",
    "/sbin/.magisk",
    "/cache/.disable_magisk",
    "/dev/.magisk.unblock",
    "/system/xposed.prop",
    "/system/framework/XposedBridge.jar",
];

pub const IOS_JAILBREAK_PATHS: [&str; 7] = [
    "/Applications/Cydia.app",
    "/Library/MobileSubstrate/MobileSubstrate.dylib",
    "/bin/bash",
    "/usr/sbin/sshd",
    "/etc/apt",
    "/private/var/lib/apt/",
    "/usr/bin/ssh",
];

/// Substrings of the lowercased build signature seen on emulators.
pub const EMULATOR_MARKERS: [&str; 10] = [
    "generic",
    "unknown",
    "emulator",
    "sdk",
    "google_sdk",
    "genymotion",
    "goldfish",
    "ranchu",
    "vbox",
    "android_x86",
];

/// Substrings of DMI strings reported by hypervisors.
pub const VM_MARKERS: [&str; 9] = [
    "virtualbox",
    "vmware",
    "kvm",
    "qemu",
    "hyper-v",
    "virtual machine",
    "xen",
    "parallels",
    "innotek",
];

/// `hw.machine` values that only a simulator reports on iOS.
pub const SIMULATOR_MACHINES: [&str; 3] = ["x86_64", "i386", "arm64"];

/// Interface/service name fragments of tunnelling adapters.
pub const TUNNEL_MARKERS: [&str; 4] = ["tap", "tun", "ppp", "ipsec"];

pub const PRIVILEGED_COMMAND: &str = "/system/xbin/which";
pub const PRIVILEGED_COMMAND_ARGS: [&str; 1] = ["su"];

pub const RESTRICTED_WRITE_PATH: &str = "/private/jailbreak.txt";
pub const RESTRICTED_WRITE_CONTENTS: &[u8] = b"Jailbreak Test";

pub const JAILBREAK_URL: &str = "cydia://";

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// True if any of `paths` exists.
pub fn known_paths(name: &'static str, paths: &'static [&'static str]) -> Probe {
    Probe::new(name, ProbeCategory::Filesystem, move |bridge| {
        for path in paths {
            if bridge.exists(path)? {
                tracing::debug!(path, "denylisted path present");
                return Ok(true);
            }
        }
        Ok(false)
    })
}

pub fn su_binaries() -> Probe {
    known_paths("su_binaries", &ANDROID_SU_PATHS)
}

pub fn root_managers() -> Probe {
    known_paths("root_managers", &ANDROID_ROOT_MANAGER_PATHS)
}

pub fn jailbreak_paths() -> Probe {
    known_paths("jailbreak_paths", &IOS_JAILBREAK_PATHS)
}

/// Write outside the sandbox. Success means the sandbox is broken; the
/// artifact is removed afterwards and a failed removal is ignored.
pub fn restricted_write_at(path: impl Into<String>) -> Probe {
    let path = path.into();
    Probe::new("restricted_write", ProbeCategory::Filesystem, move |bridge| {
        if bridge.write_file(&path, RESTRICTED_WRITE_CONTENTS).is_err() {
            return Ok(false);
        }
        if let Err(e) = bridge.remove_file(&path) {
            tracing::debug!(path = %path, error = %e, "restricted-write cleanup failed");
        }
        Ok(true)
    })
}

pub fn restricted_write() -> Probe {
    restricted_write_at(RESTRICTED_WRITE_PATH)
}

// ---------------------------------------------------------------------------
// Build metadata and properties
// ---------------------------------------------------------------------------

pub fn test_keys() -> Probe {
    Probe::new("test_keys", ProbeCategory::Property, |bridge| {
        Ok(bridge.build_metadata()?.tags.contains("test-keys"))
    })
}

fn signature_contains(bridge: &dyn PlatformBridge, markers: &[&str]) -> vigil_core::Result<bool> {
    let signature = bridge.build_metadata()?.signature();
    Ok(markers.iter().any(|m| signature.contains(m)))
}

pub fn emulator_build_signature() -> Probe {
    Probe::new("emulator_build_signature", ProbeCategory::Property, |bridge| {
        signature_contains(bridge, &EMULATOR_MARKERS)
    })
}

pub fn qemu_properties() -> Probe {
    Probe::new("qemu_properties", ProbeCategory::Property, |bridge| {
        for key in ["ro.kernel.qemu", "ro.boot.qemu"] {
            if bridge.get(key)?.as_deref() == Some("1") {
                return Ok(true);
            }
        }
        Ok(false)
    })
}

pub fn emulator_hardware() -> Probe {
    Probe::new("emulator_hardware", ProbeCategory::Property, |bridge| {
        Ok(bridge
            .get("ro.hardware")?
            .is_some_and(|hw| hw.contains("goldfish") || hw.contains("ranchu")))
    })
}

pub fn simulator_hardware() -> Probe {
    Probe::new("simulator_hardware", ProbeCategory::Property, |bridge| {
        let machine = bridge.build_metadata()?.hardware;
        Ok(SIMULATOR_MACHINES.contains(&machine.as_str()))
    })
}

pub fn simulator_property() -> Probe {
    Probe::new("simulator_property", ProbeCategory::Property, |bridge| {
        Ok(bridge
            .get("SIMULATOR_DEVICE_NAME")?
            .is_some_and(|name| !name.is_empty()))
    })
}

pub fn virtual_machine() -> Probe {
    Probe::new("virtual_machine", ProbeCategory::Property, |bridge| {
        signature_contains(bridge, &VM_MARKERS)
    })
}

// ---------------------------------------------------------------------------
// Process
// ---------------------------------------------------------------------------

/// `which su` resolving to anything. Spawn failure, permission denial and
/// timeout all mean "not detected".
pub fn privileged_command(timeout: Duration) -> Probe {
    Probe::new("privileged_command", ProbeCategory::Process, move |bridge| {
        match bridge.run_command(PRIVILEGED_COMMAND, &PRIVILEGED_COMMAND_ARGS, timeout) {
            Ok(lines) => Ok(!lines.is_empty()),
            Err(VigilError::Io(e)) => {
                tracing::debug!(error = %e, "privileged command did not run");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    })
}

pub fn debugger_flag() -> Probe {
    Probe::new("debugger_flag", ProbeCategory::Process, |bridge| {
        bridge.debugger_connected()
    })
}

pub fn debugger_wait() -> Probe {
    Probe::new("debugger_wait", ProbeCategory::Process, |bridge| {
        bridge.waiting_for_debugger()
    })
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

pub fn vpn_transport() -> Probe {
    Probe::new("vpn_transport", ProbeCategory::Network, |bridge| {
        bridge.vpn_transport_active()
    })
}

pub fn tunnel_interfaces() -> Probe {
    Probe::new("tunnel_interfaces", ProbeCategory::Network, |bridge| {
        Ok(bridge.network_service_keys()?.iter().any(|key| {
            let key = key.to_lowercase();
            TUNNEL_MARKERS.iter().any(|m| key.contains(m))
        }))
    })
}

pub fn proxy_host() -> Probe {
    Probe::new("proxy_host", ProbeCategory::Network, |bridge| {
        Ok(bridge
            .http_proxy_host()?
            .is_some_and(|host| !host.trim().is_empty()))
    })
}

pub fn proxy_flag() -> Probe {
    Probe::new("proxy_flag", ProbeCategory::Network, |bridge| {
        bridge.proxy_enabled()
    })
}

// ---------------------------------------------------------------------------
// Display, lookups, developer settings
// ---------------------------------------------------------------------------

pub fn multiple_displays() -> Probe {
    Probe::new("multiple_displays", ProbeCategory::Display, |bridge| {
        Ok(bridge.display_count()? > 1)
    })
}

pub fn jailbreak_scheme() -> Probe {
    Probe::new("jailbreak_scheme", ProbeCategory::Lookup, |bridge| {
        bridge.can_open_url(JAILBREAK_URL)
    })
}

pub fn adb_enabled() -> Probe {
    Probe::new("adb_enabled", ProbeCategory::Property, |bridge| {
        bridge.usb_debugging_enabled()
    })
}

// ---------------------------------------------------------------------------
// Informational
// ---------------------------------------------------------------------------

/// Identifier of the installing package/channel, or `None`.
pub fn install_source(bridge: &dyn PlatformBridge) -> Option<String> {
    match bridge.installer_package() {
        Ok(source) => source.filter(|s| !s.is_empty()),
        Err(e) => {
            tracing::debug!(error = %e, "installer source unavailable");
            None
        }
    }
}

pub fn install_channel(bridge: &dyn PlatformBridge) -> Option<InstallChannel> {
    install_source(bridge).map(|s| InstallChannel::classify(&s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use vigil_bridge::fake::FakeBridge;
    use vigil_core::{BuildMetadata, PlatformKind};

    fn android() -> FakeBridge {
        FakeBridge::new(PlatformKind::Android)
    }

    #[test]
    fn each_su_path_triggers() {
        for path in ANDROID_SU_PATHS {
            let bridge = android().with(|s| {
                s.paths.insert(path.into());
            });
            assert!(su_binaries().run(&bridge).detected(), "{path}");
        }
        assert!(!su_binaries().run(&android()).detected());
    }

    #[test]
    fn path_scan_stops_at_first_hit() {
        let bridge = android().with(|s| {
            s.paths.insert("/system/app/Superuser.apk".into());
        });
        su_binaries().run(&bridge);
        assert_eq!(bridge.calls(), vec!["exists"]);
    }

    #[test]
    fn restricted_write_cleans_up() {
        let bridge = FakeBridge::new(PlatformKind::Ios).with(|s| {
            s.writable.insert(RESTRICTED_WRITE_PATH.into());
        });
        assert!(restricted_write().run(&bridge).detected());
        assert!(bridge.snapshot().files.is_empty());
    }

    #[test]
    fn restricted_write_ignores_cleanup_failure() {
        let bridge = FakeBridge::new(PlatformKind::Ios).with(|s| {
            s.writable.insert(RESTRICTED_WRITE_PATH.into());
            s.undeletable.insert(RESTRICTED_WRITE_PATH.into());
        });
        assert_eq!(restricted_write().run(&bridge), ProbeOutcome::Detected);
        assert!(bridge.snapshot().files.contains_key(RESTRICTED_WRITE_PATH));
    }

    #[test]
    fn denied_write_is_clear() {
        let bridge = FakeBridge::new(PlatformKind::Ios);
        assert_eq!(restricted_write().run(&bridge), ProbeOutcome::Clear);
        assert!(!bridge.calls().contains(&"remove_file"));
    }

    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    #[test]
    fn restricted_write_against_real_filesystem() {
        use vigil_bridge::desktop::DesktopBridge;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jailbreak.txt");
        let bridge = DesktopBridge::new();

        assert!(restricted_write_at(path.to_string_lossy()).run(&bridge).detected());
        assert!(!path.exists());

        let missing = dir.path().join("missing/dir/jailbreak.txt");
        assert!(!restricted_write_at(missing.to_string_lossy()).run(&bridge).detected());
    }

    #[test]
    fn test_keys_only_from_tags() {
        let bridge = android().with(|s| {
            s.build = BuildMetadata {
                tags: "release-keys,test-keys".into(),
                ..Default::default()
            };
        });
        assert!(test_keys().run(&bridge).detected());

        let bridge = android().with(|s| {
            s.build = BuildMetadata {
                fingerprint: "vendor/test-keys".into(),
                tags: "release-keys".into(),
                ..Default::default()
            };
        });
        assert!(!test_keys().run(&bridge).detected());
    }

    #[test]
    fn emulator_signature_is_case_insensitive() {
        let bridge = android().with(|s| {
            s.build = BuildMetadata {
                manufacturer: "Genymotion".into(),
                ..Default::default()
            };
        });
        assert!(emulator_build_signature().run(&bridge).detected());

        let bridge = android().with(|s| {
            s.build = BuildMetadata {
                fingerprint: "samsung/beyond1lteeea/beyond1:12/SP1A/G973FXXU:user/release-keys".into(),
                brand: "samsung".into(),
                manufacturer: "samsung".into(),
                hardware: "exynos9820".into(),
                ..Default::default()
            };
        });
        assert!(!emulator_build_signature().run(&bridge).detected());
    }

    #[test]
    fn qemu_property_must_equal_one() {
        let bridge = android().with(|s| {
            s.properties.insert("ro.kernel.qemu".into(), "0".into());
            s.properties.insert("ro.boot.qemu".into(), "1".into());
        });
        assert!(qemu_properties().run(&bridge).detected());

        let bridge = android().with(|s| {
            s.properties.insert("ro.kernel.qemu".into(), "0".into());
        });
        assert!(!qemu_properties().run(&bridge).detected());
    }

    #[test]
    fn hardware_property_markers() {
        let bridge = android().with(|s| {
            s.properties.insert("ro.hardware".into(), "ranchu".into());
        });
        assert!(emulator_hardware().run(&bridge).detected());
        assert!(!emulator_hardware().run(&android()).detected());
    }

    #[test]
    fn simulator_detection() {
        let bridge = FakeBridge::new(PlatformKind::IosSimulator).with(|s| {
            s.build.hardware = "arm64".into();
        });
        assert!(simulator_hardware().run(&bridge).detected());

        let device = FakeBridge::new(PlatformKind::Ios).with(|s| {
            s.build.hardware = "iPhone15,2".into();
        });
        assert!(!simulator_hardware().run(&device).detected());

        let bridge = FakeBridge::new(PlatformKind::IosSimulator).with(|s| {
            s.properties
                .insert("SIMULATOR_DEVICE_NAME".into(), "iPhone 15".into());
        });
        assert!(simulator_property().run(&bridge).detected());

        let bridge = FakeBridge::new(PlatformKind::IosSimulator).with(|s| {
            s.properties.insert("SIMULATOR_DEVICE_NAME".into(), String::new());
        });
        assert!(!simulator_property().run(&bridge).detected());
    }

    #[test]
    fn virtual_machine_markers() {
        let bridge = FakeBridge::new(PlatformKind::Desktop).with(|s| {
            s.build.model = "VirtualBox".into();
            s.build.manufacturer = "innotek GmbH".into();
        });
        assert!(virtual_machine().run(&bridge).detected());

        let bridge = FakeBridge::new(PlatformKind::Desktop).with(|s| {
            s.build.model = "ThinkPad X1 Carbon Gen 11".into();
            s.build.manufacturer = "LENOVO".into();
        });
        assert!(!virtual_machine().run(&bridge).detected());
    }

    #[test]
    fn privileged_command_needs_output() {
        let timeout = Duration::from_millis(50);
        let rooted = android().with(|s| {
            s.commands
                .insert("/system/xbin/which su".into(), vec!["/system/xbin/su".into()]);
        });
        assert!(privileged_command(timeout).run(&rooted).detected());

        let empty = android().with(|s| {
            s.commands.insert("/system/xbin/which su".into(), Vec::new());
        });
        assert!(!privileged_command(timeout).run(&empty).detected());

        // Spawn failure (command not present) is a clean negative.
        assert_eq!(privileged_command(timeout).run(&android()), ProbeOutcome::Clear);
    }

    #[test]
    fn tunnel_markers_match_case_insensitively() {
        let bridge = android().with(|s| {
            s.service_keys = vec!["wlan0".into(), "IPSec0".into()];
        });
        assert!(tunnel_interfaces().run(&bridge).detected());

        let bridge = android().with(|s| {
            s.service_keys = vec!["wlan0".into(), "rmnet_data0".into(), "lo".into()];
        });
        assert!(!tunnel_interfaces().run(&bridge).detected());
    }

    #[test]
    fn blank_proxy_host_is_clear() {
        let bridge = android().with(|s| s.proxy_host = Some("   ".into()));
        assert!(!proxy_host().run(&bridge).detected());

        let bridge = android().with(|s| s.proxy_host = Some("10.0.0.1".into()));
        assert!(proxy_host().run(&bridge).detected());
    }

    #[test]
    fn display_count_threshold() {
        let bridge = android();
        assert!(!multiple_displays().run(&bridge).detected());
        bridge.update(|s| s.displays = 2);
        assert!(multiple_displays().run(&bridge).detected());
    }

    #[test]
    fn jailbreak_scheme_lookup() {
        let bridge = FakeBridge::new(PlatformKind::Ios).with(|s| {
            s.openable_urls.insert(JAILBREAK_URL.into());
        });
        assert!(jailbreak_scheme().run(&bridge).detected());
    }

    #[test]
    fn install_source_is_informational() {
        let bridge = android().with(|s| s.installer = Some("com.android.vending".into()));
        assert_eq!(install_source(&bridge).as_deref(), Some("com.android.vending"));
        assert_eq!(install_channel(&bridge), Some(InstallChannel::PlayStore));

        bridge.update(|s| {
            s.failing.insert("installer_package");
        });
        assert_eq!(install_source(&bridge), None);

        let blank = android().with(|s| s.installer = Some(String::new()));
        assert_eq!(install_source(&blank), None);
    }
}
