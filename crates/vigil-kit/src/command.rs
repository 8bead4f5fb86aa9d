// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command boundary: named commands with JSON arguments and JSON replies.
//
// Hosts (a plugin bridge, the CLI) call `dispatch` with a command name and an
// argument object. Verdict commands take no arguments and never fail.

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use vigil_core::VigilError;

use crate::kit::SecurityKit;

/// A named operation on the [`SecurityKit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    IsDeviceCompromised,
    IsEmulated,
    IsDebuggerAttached,
    IsVpnActive,
    IsProxyActive,
    IsExternalDisplayConnected,
    IsUsbDebuggingEnabled,
    InstallSource,
    AppSignatureHash,
    Encrypt,
    Decrypt,
    ToggleScreenSecurity,
    IsScreenSecurityEnabled,
}

impl Command {
    pub const ALL: [Command; 13] = [
        Self::IsDeviceCompromised,
        Self::IsEmulated,
        Self::IsDebuggerAttached,
        Self::IsVpnActive,
        Self::IsProxyActive,
        Self::IsExternalDisplayConnected,
        Self::IsUsbDebuggingEnabled,
        Self::InstallSource,
        Self::AppSignatureHash,
        Self::Encrypt,
        Self::Decrypt,
        Self::ToggleScreenSecurity,
        Self::IsScreenSecurityEnabled,
    ];

    /// Resolve a canonical name or one of its legacy aliases.
    pub fn lookup(name: &str) -> Option<Self> {
        let command = match name {
            "isDeviceCompromised" | "isDeviceRooted" | "isDeviceJailbroken" => {
                Self::IsDeviceCompromised
            }
            "isEmulated" | "isRunningOnEmulator" => Self::IsEmulated,
            "isDebuggerAttached" => Self::IsDebuggerAttached,
            "isVpnActive" => Self::IsVpnActive,
            "isProxyActive" | "isProxyDetected" => Self::IsProxyActive,
            "isExternalDisplayConnected" => Self::IsExternalDisplayConnected,
            "isUsbDebuggingEnabled" => Self::IsUsbDebuggingEnabled,
            "installSource" | "getInstallerSource" => Self::InstallSource,
            "appSignatureHash" | "getAppSignatureHash" => Self::AppSignatureHash,
            "encrypt" => Self::Encrypt,
            "decrypt" => Self::Decrypt,
            "toggleScreenSecurity" => Self::ToggleScreenSecurity,
            "isScreenSecurityEnabled" => Self::IsScreenSecurityEnabled,
            _ => return None,
        };
        Some(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::IsDeviceCompromised => "isDeviceCompromised",
            Self::IsEmulated => "isEmulated",
            Self::IsDebuggerAttached => "isDebuggerAttached",
            Self::IsVpnActive => "isVpnActive",
            Self::IsProxyActive => "isProxyActive",
            Self::IsExternalDisplayConnected => "isExternalDisplayConnected",
            Self::IsUsbDebuggingEnabled => "isUsbDebuggingEnabled",
            Self::InstallSource => "installSource",
            Self::AppSignatureHash => "appSignatureHash",
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::ToggleScreenSecurity => "toggleScreenSecurity",
            Self::IsScreenSecurityEnabled => "isScreenSecurityEnabled",
        }
    }
}

/// Error reply: a stable code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct CommandError {
    pub code: &'static str,
    pub message: String,
}

impl CommandError {
    pub const NOT_IMPLEMENTED: &'static str = "NOT_IMPLEMENTED";

    fn not_implemented(name: &str) -> Self {
        Self {
            code: Self::NOT_IMPLEMENTED,
            message: format!("unknown command: {name}"),
        }
    }
}

impl From<VigilError> for CommandError {
    fn from(e: VigilError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

/// Execute `name` with `args` (a JSON object; anything else counts as no
/// arguments).
pub fn dispatch(kit: &SecurityKit, name: &str, args: &Value) -> Result<Value, CommandError> {
    let Some(command) = Command::lookup(name) else {
        warn!(command = name, "unknown command");
        return Err(CommandError::not_implemented(name));
    };
    debug!(command = command.name(), "dispatching");

    let reply = match command {
        Command::IsDeviceCompromised => json!(kit.is_device_compromised()),
        Command::IsEmulated => json!(kit.is_emulated()),
        Command::IsDebuggerAttached => json!(kit.is_debugger_attached()),
        Command::IsVpnActive => json!(kit.is_vpn_active()),
        Command::IsProxyActive => json!(kit.is_proxy_active()),
        Command::IsExternalDisplayConnected => json!(kit.is_external_display_connected()),
        Command::IsUsbDebuggingEnabled => json!(kit.is_usb_debugging_enabled()),
        Command::InstallSource => json!(kit.install_source()),
        Command::AppSignatureHash => json!(kit.app_signature_hash()),
        Command::Encrypt => json!(kit.encrypt(required_string(args, "data")?)?),
        Command::Decrypt => json!(kit.decrypt(required_string(args, "data")?)?),
        Command::ToggleScreenSecurity => {
            kit.set_screen_security(optional_bool(args, "enabled")?);
            Value::Null
        }
        Command::IsScreenSecurityEnabled => json!(kit.is_screen_security_enabled()),
    };
    Ok(reply)
}

fn required_string<'a>(args: &'a Value, key: &str) -> Result<&'a str, VigilError> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(Value::Null) | None => Err(VigilError::InvalidArgument(format!("{key} cannot be null"))),
        Some(_) => Err(VigilError::InvalidArgument(format!("{key} must be a string"))),
    }
}

fn optional_bool(args: &Value, key: &str) -> Result<bool, VigilError> {
    match args.get(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Null) | None => Ok(false),
        Some(_) => Err(VigilError::InvalidArgument(format!("{key} must be a boolean"))),
    }
}
