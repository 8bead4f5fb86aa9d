// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Integrity signal engine.
//
// A verdict is the OR of its probes, re-evaluated on every query. Probes
// run in table order and evaluation stops at the first positive. A probe
// that errors or panics is logged and counts as negative; the remaining
// probes still run.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use vigil_bridge::PlatformBridge;
use vigil_core::{InstallChannel, PlatformKind, ProbeCategory, Verdict};

use crate::fingerprint;
use crate::probe::{Probe, ProbeOutcome};
use crate::probes;

/// Probes feeding each verdict, in evaluation order.
#[derive(Debug, Default)]
pub struct VerdictTable {
    entries: BTreeMap<Verdict, Vec<Probe>>,
}

impl VerdictTable {
    /// An empty table: every verdict evaluates to false.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `probe` to `verdict`'s list.
    pub fn with(mut self, verdict: Verdict, probe: Probe) -> Self {
        self.entries.entry(verdict).or_default().push(probe);
        self
    }

    pub fn probes(&self, verdict: Verdict) -> &[Probe] {
        self.entries.get(&verdict).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The standard table for `kind`.
    pub fn for_platform(kind: PlatformKind, command_timeout: Duration) -> Self {
        use Verdict::*;

        match kind {
            PlatformKind::Android => Self::new()
                .with(DeviceCompromised, probes::test_keys())
                .with(DeviceCompromised, probes::su_binaries())
                .with(DeviceCompromised, probes::root_managers())
                .with(DeviceCompromised, probes::privileged_command(command_timeout))
                .with(Emulator, probes::emulator_build_signature())
                .with(Emulator, probes::qemu_properties())
                .with(Emulator, probes::emulator_hardware())
                .with(DebuggerAttached, probes::debugger_flag())
                .with(DebuggerAttached, probes::debugger_wait())
                .with(VpnActive, probes::vpn_transport())
                .with(VpnActive, probes::tunnel_interfaces())
                .with(ProxyActive, probes::proxy_host())
                .with(ProxyActive, probes::proxy_flag())
                .with(ExternalDisplay, probes::multiple_displays())
                .with(UsbDebugging, probes::adb_enabled()),
            PlatformKind::Ios => Self::new()
                .with(DeviceCompromised, probes::jailbreak_paths())
                .with(DeviceCompromised, probes::restricted_write())
                .with(DeviceCompromised, probes::jailbreak_scheme())
                .with(Emulator, probes::simulator_hardware())
                .with(Emulator, probes::simulator_property())
                .with(DebuggerAttached, probes::debugger_flag())
                .with(VpnActive, probes::tunnel_interfaces())
                .with(ProxyActive, probes::proxy_host())
                .with(ProxyActive, probes::proxy_flag())
                .with(ExternalDisplay, probes::multiple_displays()),
            // The simulator filesystem is the host's; jailbreak paths would
            // match a developer's Mac.
            PlatformKind::IosSimulator => Self::new()
                .with(Emulator, probes::simulator_hardware())
                .with(Emulator, probes::simulator_property())
                .with(DebuggerAttached, probes::debugger_flag())
                .with(VpnActive, probes::tunnel_interfaces())
                .with(ProxyActive, probes::proxy_host())
                .with(ProxyActive, probes::proxy_flag())
                .with(ExternalDisplay, probes::multiple_displays()),
            PlatformKind::Desktop => Self::new()
                .with(Emulator, probes::virtual_machine())
                .with(DebuggerAttached, probes::debugger_flag())
                .with(VpnActive, probes::tunnel_interfaces())
                .with(ProxyActive, probes::proxy_host())
                .with(ExternalDisplay, probes::multiple_displays()),
        }
    }
}

/// One probe's contribution to a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub probe: &'static str,
    pub category: ProbeCategory,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

/// Snapshot of every verdict plus the informational probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustReport {
    pub platform: String,
    pub verdicts: BTreeMap<Verdict, bool>,
    pub install_source: Option<String>,
    pub install_channel: Option<InstallChannel>,
    pub app_signature_hash: Option<String>,
}

/// Evaluates verdicts against a platform bridge. Holds no results between
/// calls.
pub struct IntegrityEngine {
    bridge: Arc<dyn PlatformBridge>,
    table: VerdictTable,
}

impl IntegrityEngine {
    /// Engine with the standard table for the bridge's platform.
    pub fn new(bridge: Arc<dyn PlatformBridge>, command_timeout: Duration) -> Self {
        let table = VerdictTable::for_platform(bridge.platform_kind(), command_timeout);
        Self::with_table(bridge, table)
    }

    pub fn with_table(bridge: Arc<dyn PlatformBridge>, table: VerdictTable) -> Self {
        Self { bridge, table }
    }

    pub fn bridge(&self) -> &dyn PlatformBridge {
        self.bridge.as_ref()
    }

    /// OR of `verdict`'s probes, short-circuiting at the first positive.
    #[instrument(skip_all, fields(verdict = %verdict))]
    pub fn evaluate(&self, verdict: Verdict) -> bool {
        let detected = self
            .table
            .probes(verdict)
            .iter()
            .any(|probe| self.run(verdict, probe).detected());
        debug!(detected, "verdict evaluated");
        detected
    }

    /// Run every probe of `verdict` without short-circuiting.
    pub fn explain(&self, verdict: Verdict) -> Vec<ProbeReport> {
        self.table
            .probes(verdict)
            .iter()
            .map(|probe| ProbeReport {
                probe: probe.name(),
                category: probe.category(),
                outcome: self.run(verdict, probe),
            })
            .collect()
    }

    pub fn evaluate_all(&self) -> TrustReport {
        TrustReport {
            platform: self.bridge.platform_name().to_owned(),
            verdicts: Verdict::ALL
                .into_iter()
                .map(|v| (v, self.evaluate(v)))
                .collect(),
            install_source: self.install_source(),
            install_channel: probes::install_channel(self.bridge()),
            app_signature_hash: self.app_signature_hash(),
        }
    }

    pub fn install_source(&self) -> Option<String> {
        probes::install_source(self.bridge())
    }

    pub fn app_signature_hash(&self) -> Option<String> {
        fingerprint::signing_fingerprint(self.bridge())
    }

    fn run(&self, verdict: Verdict, probe: &Probe) -> ProbeOutcome {
        let outcome = probe.run(self.bridge());
        match &outcome {
            ProbeOutcome::Detected | ProbeOutcome::Clear => {
                debug!(%verdict, probe = probe.name(), detected = outcome.detected(), "probe ran");
            }
            ProbeOutcome::Failed(error) => {
                warn!(%verdict, probe = probe.name(), %error, "probe failed; treating as not detected");
            }
            ProbeOutcome::Panicked(message) => {
                warn!(%verdict, probe = probe.name(), %message, "probe panicked; treating as not detected");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_bridge::fake::{FakeBridge, FakeState};

    const TIMEOUT: Duration = Duration::from_millis(50);

    fn engine(bridge: &Arc<FakeBridge>) -> IntegrityEngine {
        IntegrityEngine::new(bridge.clone(), TIMEOUT)
    }

    fn fake(kind: PlatformKind, f: impl FnOnce(&mut FakeState)) -> Arc<FakeBridge> {
        Arc::new(FakeBridge::new(kind).with(f))
    }

    #[test]
    fn clean_android_device_is_trusted() {
        let bridge = fake(PlatformKind::Android, |_| {});
        let engine = engine(&bridge);
        for verdict in Verdict::ALL {
            assert!(!engine.evaluate(verdict), "{verdict}");
        }
    }

    #[test]
    fn su_binary_marks_device_compromised() {
        let bridge = fake(PlatformKind::Android, |s| {
            s.paths.insert("/system/xbin/su".into());
        });
        let engine = engine(&bridge);
        assert!(engine.evaluate(Verdict::DeviceCompromised));
        assert!(!engine.evaluate(Verdict::Emulator));
    }

    #[test]
    fn verdicts_are_recomputed_every_call() {
        let bridge = fake(PlatformKind::Android, |_| {});
        let engine = engine(&bridge);
        assert!(!engine.evaluate(Verdict::DeviceCompromised));

        bridge.update(|s| {
            s.paths.insert("/sbin/su".into());
        });
        assert!(engine.evaluate(Verdict::DeviceCompromised));

        bridge.update(|s| s.paths.clear());
        assert!(!engine.evaluate(Verdict::DeviceCompromised));
    }

    #[test]
    fn first_positive_short_circuits() {
        let bridge = fake(PlatformKind::Android, |s| {
            s.build.tags = "test-keys".into();
            s.paths.insert("/sbin/su".into());
        });
        assert!(engine(&bridge).evaluate(Verdict::DeviceCompromised));
        assert_eq!(bridge.calls(), vec!["build_metadata"]);
    }

    #[test]
    fn adding_signals_never_clears_a_verdict() {
        let signals: Vec<Box<dyn Fn(&mut FakeState)>> = vec![
            Box::new(|s| s.build.tags = "test-keys".into()),
            Box::new(|s| {
                s.paths.insert("/su/bin/su".into());
            }),
            Box::new(|s| {
                s.paths.insert("/data/adb/magisk".into());
            }),
            Box::new(|s| {
                s.commands
                    .insert("/system/xbin/which su".into(), vec!["/sbin/su".into()]);
            }),
        ];

        // Each signal alone fires; every superset still fires.
        for (i, signal) in signals.iter().enumerate() {
            let bridge = Arc::new(FakeBridge::new(PlatformKind::Android));
            bridge.update(|s| signal(s));
            let engine = engine(&bridge);
            assert!(engine.evaluate(Verdict::DeviceCompromised), "signal {i}");
            for other in &signals {
                bridge.update(|s| other(s));
                assert!(engine.evaluate(Verdict::DeviceCompromised), "signal {i} + more");
            }
        }
    }

    #[test]
    fn failing_probe_does_not_stop_evaluation() {
        let bridge = fake(PlatformKind::Android, |s| {
            s.failing.insert("build_metadata");
            s.failing.insert("exists");
            s.commands
                .insert("/system/xbin/which su".into(), vec!["/system/xbin/su".into()]);
        });
        assert!(engine(&bridge).evaluate(Verdict::DeviceCompromised));
    }

    #[test]
    fn panicking_probe_is_contained() {
        let bridge = fake(PlatformKind::Android, |s| {
            s.panicking.insert("exists");
        });
        let engine = engine(&bridge);
        assert!(!engine.evaluate(Verdict::DeviceCompromised));

        bridge.update(|s| {
            s.commands
                .insert("/system/xbin/which su".into(), vec!["/system/xbin/su".into()]);
        });
        assert!(engine.evaluate(Verdict::DeviceCompromised));
    }

    #[test]
    fn every_probe_failing_yields_false() {
        let bridge = fake(PlatformKind::Android, |s| {
            s.failing.extend([
                "build_metadata",
                "exists",
                "run_command",
                "get",
                "debugger_connected",
                "waiting_for_debugger",
                "vpn_transport_active",
                "network_service_keys",
                "http_proxy_host",
                "proxy_enabled",
                "display_count",
                "usb_debugging_enabled",
            ]);
        });
        let engine = engine(&bridge);
        for verdict in Verdict::ALL {
            assert!(!engine.evaluate(verdict), "{verdict}");
        }
    }

    #[test]
    fn ios_jailbreak_signals() {
        let bridge = fake(PlatformKind::Ios, |s| {
            s.openable_urls.insert("cydia://".into());
        });
        assert!(engine(&bridge).evaluate(Verdict::DeviceCompromised));

        let bridge = fake(PlatformKind::Ios, |s| {
            s.writable.insert("/private/jailbreak.txt".into());
        });
        assert!(engine(&bridge).evaluate(Verdict::DeviceCompromised));
        assert!(bridge.snapshot().files.is_empty());
    }

    #[test]
    fn platform_tables_scope_probes() {
        // Android-only facts have no effect elsewhere.
        let bridge = fake(PlatformKind::Ios, |s| {
            s.usb_debugging = true;
            s.build.tags = "test-keys".into();
        });
        let ios = engine(&bridge);
        assert!(!ios.evaluate(Verdict::UsbDebugging));
        assert!(!ios.evaluate(Verdict::DeviceCompromised));

        // A workstation with /bin/bash is not jailbroken.
        let bridge = fake(PlatformKind::Desktop, |s| {
            s.paths.insert("/bin/bash".into());
            s.paths.insert("/sbin/su".into());
        });
        assert!(!engine(&bridge).evaluate(Verdict::DeviceCompromised));

        let bridge = fake(PlatformKind::IosSimulator, |s| {
            s.build.hardware = "arm64".into();
            s.paths.insert("/bin/bash".into());
        });
        let simulator = engine(&bridge);
        assert!(simulator.evaluate(Verdict::Emulator));
        assert!(!simulator.evaluate(Verdict::DeviceCompromised));
    }

    #[test]
    fn network_and_display_verdicts() {
        let bridge = fake(PlatformKind::Android, |s| {
            s.vpn_transport = true;
            s.proxy_enabled = true;
            s.displays = 2;
            s.usb_debugging = true;
            s.debugger_connected = true;
        });
        let engine = engine(&bridge);
        assert!(engine.evaluate(Verdict::VpnActive));
        assert!(engine.evaluate(Verdict::ProxyActive));
        assert!(engine.evaluate(Verdict::ExternalDisplay));
        assert!(engine.evaluate(Verdict::UsbDebugging));
        assert!(engine.evaluate(Verdict::DebuggerAttached));
    }

    #[test]
    fn empty_table_is_all_false() {
        let bridge = fake(PlatformKind::Android, |s| {
            s.paths.insert("/sbin/su".into());
        });
        let engine = IntegrityEngine::with_table(bridge, VerdictTable::new());
        assert!(!engine.evaluate(Verdict::DeviceCompromised));
        assert!(engine.explain(Verdict::DeviceCompromised).is_empty());
    }

    #[test]
    fn custom_table() {
        let bridge = fake(PlatformKind::Desktop, |_| {});
        let table = VerdictTable::new().with(
            Verdict::Emulator,
            Probe::new("always", ProbeCategory::Property, |_| Ok(true)),
        );
        let engine = IntegrityEngine::with_table(bridge, table);
        assert!(engine.evaluate(Verdict::Emulator));
        assert!(!engine.evaluate(Verdict::VpnActive));
    }

    #[test]
    fn explain_runs_every_probe() {
        let bridge = fake(PlatformKind::Android, |s| {
            s.build.tags = "test-keys".into();
            s.failing.insert("exists");
        });
        let report = engine(&bridge).explain(Verdict::DeviceCompromised);

        let names: Vec<_> = report.iter().map(|r| r.probe).collect();
        assert_eq!(
            names,
            vec!["test_keys", "su_binaries", "root_managers", "privileged_command"]
        );
        assert_eq!(report[0].outcome, ProbeOutcome::Detected);
        assert!(matches!(report[1].outcome, ProbeOutcome::Failed(_)));
        assert!(matches!(report[2].outcome, ProbeOutcome::Failed(_)));
        assert_eq!(report[3].outcome, ProbeOutcome::Clear);
    }

    #[test]
    fn trust_report_serializes() {
        let bridge = fake(PlatformKind::Android, |s| {
            s.installer = Some("com.android.vending".into());
            s.displays = 3;
        });
        let report = engine(&bridge).evaluate_all();
        assert_eq!(report.platform, "Fake");
        assert_eq!(report.verdicts.len(), Verdict::ALL.len());
        assert!(report.verdicts[&Verdict::ExternalDisplay]);
        assert_eq!(report.install_channel, Some(InstallChannel::PlayStore));

        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["verdicts"]["externalDisplay"], true);
        assert_eq!(json["verdicts"]["deviceCompromised"], false);
        assert_eq!(json["installSource"], "com.android.vending");
        assert!(json["appSignatureHash"].is_null());
    }
}
