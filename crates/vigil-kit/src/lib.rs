// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! vigil-kit: The host-facing surface of Vigil.
//!
//! [`SecurityKit`] bundles the integrity engine, the cipher engine and the
//! screen-security flag. [`dispatch`] exposes them as named commands with
//! JSON arguments, the shape a mobile plugin bridge or the `vigil` CLI calls.

pub mod command;
pub mod kit;

pub use command::{Command, CommandError, dispatch};
pub use kit::SecurityKit;
