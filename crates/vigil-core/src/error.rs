// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Vigil.
//
// Cryptographic variants deliberately carry no detail about which byte or
// field failed. Callers see the kind, never the position.

use thiserror::Error;

/// Top-level error type for all Vigil operations.
#[derive(Debug, Error)]
pub enum VigilError {
    // -- Argument errors --
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // -- Key store errors --
    #[error("secure key store unavailable: {0}")]
    KeyStoreUnavailable(String),

    #[error("key provisioning failed: {0}")]
    KeyProvisioningFailed(String),

    // -- Cryptographic errors --
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("invalid cipher envelope")]
    InvalidEnvelope,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("decrypted payload is not valid UTF-8")]
    DecodingFailed,

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, VigilError>;

/// How a caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The store was busy or briefly unreachable; retrying may succeed.
    Transient,
    /// Retrying will not help (unsupported algorithm, tampered data, ...).
    Permanent,
    /// The caller supplied bad input.
    Caller,
}

impl VigilError {
    /// Classify the error for retry decisions made outside the core.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidArgument(_) | Self::Config(_) => ErrorClass::Caller,
            Self::KeyStoreUnavailable(_) | Self::Bridge(_) => ErrorClass::Transient,
            Self::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
                | std::io::ErrorKind::WouldBlock => ErrorClass::Transient,
                _ => ErrorClass::Permanent,
            },
            Self::KeyProvisioningFailed(_)
            | Self::EncryptionFailed(_)
            | Self::InvalidEnvelope
            | Self::AuthenticationFailed
            | Self::DecodingFailed
            | Self::Serialization(_)
            | Self::PlatformUnavailable => ErrorClass::Permanent,
        }
    }

    /// Stable error code reported across the command boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::KeyStoreUnavailable(_) => "KEY_STORE_UNAVAILABLE",
            Self::KeyProvisioningFailed(_) => "KEY_PROVISIONING_FAILED",
            Self::EncryptionFailed(_) => "ENCRYPTION_FAILED",
            Self::InvalidEnvelope => "INVALID_ENVELOPE",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::DecodingFailed => "DECODING_FAILED",
            Self::Config(_) => "INVALID_CONFIGURATION",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Bridge(_) => "PLATFORM_ERROR",
            Self::PlatformUnavailable => "PLATFORM_UNAVAILABLE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_store_errors_are_distinguishable() {
        let busy = VigilError::KeyStoreUnavailable("keystore locked".into());
        let unsupported = VigilError::KeyProvisioningFailed("AES unsupported".into());

        assert_eq!(busy.class(), ErrorClass::Transient);
        assert_eq!(unsupported.class(), ErrorClass::Permanent);
        assert_ne!(busy.code(), unsupported.code());
    }

    #[test]
    fn crypto_errors_have_constant_shape() {
        assert_eq!(VigilError::AuthenticationFailed.to_string(), "authentication failed");
        assert_eq!(VigilError::InvalidEnvelope.to_string(), "invalid cipher envelope");
        assert_eq!(VigilError::AuthenticationFailed.class(), ErrorClass::Permanent);
    }

    #[test]
    fn argument_errors_are_caller_class() {
        let err = VigilError::InvalidArgument("data cannot be null".into());
        assert_eq!(err.class(), ErrorClass::Caller);
        assert_eq!(err.code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn io_timeout_is_transient() {
        let err = VigilError::from(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert_eq!(err.class(), ErrorClass::Transient);
        let err = VigilError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(err.class(), ErrorClass::Permanent);
    }
}
