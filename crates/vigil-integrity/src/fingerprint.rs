// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signing-certificate fingerprints: SHA-256, base64-encoded.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use vigil_bridge::traits::*;

/// SHA-256 of `data`, standard base64 with padding.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    STANDARD.encode(hasher.finalize())
}

/// Fingerprint of the first certificate the app was signed with.
///
/// Informational only: `None` when the platform exposes no certificate or
/// the query fails.
pub fn signing_fingerprint(bridge: &dyn PlatformBridge) -> Option<String> {
    match bridge.signing_certificate() {
        Ok(Some(der)) => Some(hash_bytes(&der)),
        Ok(None) => None,
        Err(e) => {
            tracing::debug!(error = %e, "signing certificate unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_bridge::fake::FakeBridge;
    use vigil_core::PlatformKind;

    #[test]
    fn hash_empty_input() {
        assert_eq!(hash_bytes(b""), "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
    }

    #[test]
    fn hash_known_value() {
        // SHA-256("hello") = 2cf24dba...9824, base64-encoded.
        assert_eq!(hash_bytes(b"hello"), "LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ=");
    }

    #[test]
    fn fingerprint_of_first_signer() {
        let bridge = FakeBridge::new(PlatformKind::Android).with(|s| {
            s.certificate = Some(b"vigil-signing-cert".to_vec());
        });
        assert_eq!(
            signing_fingerprint(&bridge).as_deref(),
            Some("1dgPQ2k24fYtpNj4kN6tTig/Nb9EZ4dqvJYFRZZz8o8=")
        );
    }

    #[test]
    fn failure_yields_absent() {
        let bridge = FakeBridge::new(PlatformKind::Android).with(|s| {
            s.certificate = Some(vec![1, 2, 3]);
            s.failing.insert("signing_certificate");
        });
        assert_eq!(signing_fingerprint(&bridge), None);
        assert_eq!(signing_fingerprint(&FakeBridge::new(PlatformKind::Ios)), None);
    }
}
