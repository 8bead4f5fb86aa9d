// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Vigil: Environment probes and trust verdicts.

pub mod engine;
pub mod fingerprint;
pub mod probe;
pub mod probes;

pub use engine::{IntegrityEngine, ProbeReport, TrustReport, VerdictTable};
pub use probe::{Probe, ProbeOutcome};
