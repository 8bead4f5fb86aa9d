// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A probe: one named check of one environment fact.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;

use vigil_bridge::PlatformBridge;
use vigil_core::ProbeCategory;
use vigil_core::error::Result;

type Check = dyn Fn(&dyn PlatformBridge) -> Result<bool> + Send + Sync;

/// Named, parameterless check evaluated against a bridge.
pub struct Probe {
    name: &'static str,
    category: ProbeCategory,
    check: Box<Check>,
}

impl Probe {
    pub fn new(
        name: &'static str,
        category: ProbeCategory,
        check: impl Fn(&dyn PlatformBridge) -> Result<bool> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            category,
            check: Box::new(check),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn category(&self) -> ProbeCategory {
        self.category
    }

    /// Run the check. Errors and panics become [`ProbeOutcome`] values;
    /// nothing propagates to the caller.
    pub fn run(&self, bridge: &dyn PlatformBridge) -> ProbeOutcome {
        match catch_unwind(AssertUnwindSafe(|| (self.check)(bridge))) {
            Ok(Ok(true)) => ProbeOutcome::Detected,
            Ok(Ok(false)) => ProbeOutcome::Clear,
            Ok(Err(e)) => ProbeOutcome::Failed(e.to_string()),
            Err(payload) => ProbeOutcome::Panicked(panic_message(payload.as_ref())),
        }
    }
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probe")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Result of one probe run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "lowercase")]
pub enum ProbeOutcome {
    Detected,
    Clear,
    /// The platform could not answer. Counts as not detected.
    Failed(String),
    /// The check panicked. Counts as not detected.
    Panicked(String),
}

impl ProbeOutcome {
    /// Only a positive observation counts; inconclusive runs are false.
    pub fn detected(&self) -> bool {
        matches!(self, Self::Detected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_bridge::fake::FakeBridge;
    use vigil_core::{PlatformKind, VigilError};

    #[test]
    fn outcomes_map_from_check_results() {
        let bridge = FakeBridge::new(PlatformKind::Android);

        let yes = Probe::new("yes", ProbeCategory::Property, |_| Ok(true));
        let no = Probe::new("no", ProbeCategory::Property, |_| Ok(false));
        let err = Probe::new("err", ProbeCategory::Property, |_| {
            Err(VigilError::PlatformUnavailable)
        });

        assert_eq!(yes.run(&bridge), ProbeOutcome::Detected);
        assert_eq!(no.run(&bridge), ProbeOutcome::Clear);
        assert!(matches!(err.run(&bridge), ProbeOutcome::Failed(_)));
        assert!(!err.run(&bridge).detected());
    }

    #[test]
    fn panics_are_contained() {
        let bridge = FakeBridge::new(PlatformKind::Android);
        let probe = Probe::new("boom", ProbeCategory::Process, |_| panic!("probe exploded"));

        assert_eq!(
            probe.run(&bridge),
            ProbeOutcome::Panicked("probe exploded".into())
        );
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_string(&ProbeOutcome::Failed("denied".into())).expect("json");
        assert_eq!(json, r#"{"outcome":"failed","detail":"denied"}"#);
        let json = serde_json::to_string(&ProbeOutcome::Detected).expect("json");
        assert_eq!(json, r#"{"outcome":"detected"}"#);
    }
}
