// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! vigil-security: Key provisioning and authenticated string encryption.
//!
//! [`SecureCipherEngine`] turns UTF-8 strings into base64 envelopes
//! (`nonce ‖ ciphertext ‖ tag`) using whichever [`vigil_bridge::SecureKeyStore`]
//! it is given. [`SoftwareKeyStore`] is the in-memory store used on desktop
//! and in tests.

pub mod cipher;
pub mod envelope;
pub mod software;

pub use cipher::SecureCipherEngine;
pub use software::SoftwareKeyStore;
