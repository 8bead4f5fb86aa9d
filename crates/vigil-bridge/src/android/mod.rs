// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android platform bridge via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. SDK facts (Build, Debug, ConnectivityManager,
// DisplayManager, PackageManager, Settings) are read through JNI calls into
// the ART runtime. System properties come straight from bionic's
// `__system_property_get`, and filesystem/process probes use std.
//
// Any pending Java exception is cleared before an error is returned, so a
// failed probe never leaves the thread in an exceptional state.

#![cfg(target_os = "android")]

pub mod keystore;

use std::ffi::{CStr, CString};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use jni::objects::{JByteArray, JObject, JObjectArray, JString, JValue};
use jni::{JNIEnv, JavaVM};

use vigil_core::error::{Result, VigilError};
use vigil_core::{BuildMetadata, PlatformKind};

use crate::process;
use crate::traits::*;

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// `NetworkCapabilities.TRANSPORT_VPN`.
const TRANSPORT_VPN: i32 = 4;

/// `PackageManager.GET_SIGNATURES`.
const GET_SIGNATURES: i32 = 0x0000_0040;

/// `PackageManager.GET_SIGNING_CERTIFICATES`.
const GET_SIGNING_CERTIFICATES: i32 = 0x0800_0000;

/// `Build.VERSION_CODES.P`.
const SDK_P: i32 = 28;

/// `Build.VERSION_CODES.R`.
const SDK_R: i32 = 30;

/// `PROP_VALUE_MAX` from <sys/system_properties.h>.
const PROP_VALUE_MAX: usize = 92;

static JAVA_VM: OnceLock<JavaVM> = OnceLock::new();

/// The process-wide `JavaVM`, wrapped once from the NDK context.
fn java_vm() -> Result<&'static JavaVM> {
    if let Some(vm) = JAVA_VM.get() {
        return Ok(vm);
    }
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| VigilError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    Ok(JAVA_VM.get_or_init(|| vm))
}

/// Run `f` with an attached `JNIEnv` and the application `Context`.
///
/// The thread is detached again on return if this call attached it.
pub(crate) fn with_env<T>(f: impl FnOnce(&mut JNIEnv<'_>, &JObject<'_>) -> Result<T>) -> Result<T> {
    let vm = java_vm()?;
    let mut env = vm
        .attach_current_thread()
        .map_err(|e| VigilError::Bridge(format!("failed to attach JNI thread: {e}")))?;

    let ptr = ndk_context::android_context().context();
    if ptr.is_null() {
        return Err(VigilError::Bridge(
            "Android context is null; native activity not initialised".into(),
        ));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting Activity.
    let context = unsafe { JObject::from_raw(ptr.cast()) };

    let result = f(&mut env, &context);
    if result.is_err() && env.exception_check().unwrap_or(false) {
        let _ = env.exception_clear();
    }
    result
}

/// Map any `jni::errors::Error` into `VigilError::Bridge`.
pub(crate) fn jni_err(context: &str, e: jni::errors::Error) -> VigilError {
    VigilError::Bridge(format!("{context}: {e}"))
}

/// Convert a possibly-null `java.lang.String` reference.
fn opt_string(env: &mut JNIEnv<'_>, obj: JObject<'_>) -> Result<Option<String>> {
    if obj.is_null() {
        return Ok(None);
    }
    let jstr = JString::from(obj);
    let value: String = env
        .get_string(&jstr)
        .map_err(|e| jni_err("get_string", e))?
        .into();
    let _ = env.delete_local_ref(jstr);
    Ok(Some(value))
}

/// Read a static `String` field of `android.os.Build`.
fn build_field(env: &mut JNIEnv<'_>, field: &str) -> Result<String> {
    let obj = env
        .get_static_field("android/os/Build", field, "Ljava/lang/String;")
        .map_err(|e| jni_err(field, e))?
        .l()
        .map_err(|e| jni_err(field, e))?;
    Ok(opt_string(env, obj)?.unwrap_or_default())
}

/// `Build.VERSION.SDK_INT`.
fn sdk_int(env: &mut JNIEnv<'_>) -> Result<i32> {
    env.get_static_field("android/os/Build$VERSION", "SDK_INT", "I")
        .map_err(|e| jni_err("SDK_INT", e))?
        .i()
        .map_err(|e| jni_err("SDK_INT->i", e))
}

/// `context.getSystemService(name)`.
fn system_service<'local>(
    env: &mut JNIEnv<'local>,
    context: &JObject<'_>,
    name: &str,
) -> Result<JObject<'local>> {
    let j_name = env
        .new_string(name)
        .map_err(|e| jni_err("new_string(service)", e))?;
    let service = env
        .call_method(
            context,
            "getSystemService",
            "(Ljava/lang/String;)Ljava/lang/Object;",
            &[JValue::Object(&j_name)],
        )
        .map_err(|e| jni_err("getSystemService", e))?
        .l()
        .map_err(|e| jni_err("getSystemService->l", e))?;
    if service.is_null() {
        return Err(VigilError::Bridge(format!("system service {name} unavailable")));
    }
    Ok(service)
}

fn content_resolver<'local>(env: &mut JNIEnv<'local>, context: &JObject<'_>) -> Result<JObject<'local>> {
    env.call_method(context, "getContentResolver", "()Landroid/content/ContentResolver;", &[])
        .map_err(|e| jni_err("getContentResolver", e))?
        .l()
        .map_err(|e| jni_err("getContentResolver->l", e))
}

fn package_name<'local>(env: &mut JNIEnv<'local>, context: &JObject<'_>) -> Result<JObject<'local>> {
    env.call_method(context, "getPackageName", "()Ljava/lang/String;", &[])
        .map_err(|e| jni_err("getPackageName", e))?
        .l()
        .map_err(|e| jni_err("getPackageName->l", e))
}

fn package_manager<'local>(env: &mut JNIEnv<'local>, context: &JObject<'_>) -> Result<JObject<'local>> {
    env.call_method(
        context,
        "getPackageManager",
        "()Landroid/content/pm/PackageManager;",
        &[],
    )
    .map_err(|e| jni_err("getPackageManager", e))?
    .l()
    .map_err(|e| jni_err("getPackageManager->l", e))
}

/// `System.getProperty(key)` on the Java side.
fn java_system_property(env: &mut JNIEnv<'_>, key: &str) -> Result<Option<String>> {
    let j_key = env
        .new_string(key)
        .map_err(|e| jni_err("new_string(property)", e))?;
    let value = env
        .call_static_method(
            "java/lang/System",
            "getProperty",
            "(Ljava/lang/String;)Ljava/lang/String;",
            &[JValue::Object(&j_key)],
        )
        .map_err(|e| jni_err("System.getProperty", e))?
        .l()
        .map_err(|e| jni_err("System.getProperty->l", e))?;
    opt_string(env, value)
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// Android implementation of the Vigil platform bridge.
///
/// The struct is zero-sized; all state lives on the Java side.
pub struct AndroidBridge;

impl AndroidBridge {
    /// Create a new Android bridge.
    ///
    /// This does **not** touch JNI. The first JNI call happens lazily when
    /// a trait method is invoked.
    pub fn new() -> Self {
        Self
    }
}

impl Default for AndroidBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBridge for AndroidBridge {
    fn platform_name(&self) -> &str {
        "Android"
    }

    fn platform_kind(&self) -> PlatformKind {
        PlatformKind::Android
    }
}

// ---------------------------------------------------------------------------
// PlatformPropertyReader: bionic system properties
// ---------------------------------------------------------------------------

impl PlatformPropertyReader for AndroidBridge {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let c_key = CString::new(key)
            .map_err(|_| VigilError::InvalidArgument(format!("property key contains NUL: {key}")))?;
        let mut buf = [0 as libc::c_char; PROP_VALUE_MAX];
        // SAFETY: `buf` holds PROP_VALUE_MAX bytes, the documented maximum
        // the call writes including the terminator.
        let len = unsafe { libc::__system_property_get(c_key.as_ptr(), buf.as_mut_ptr()) };
        if len <= 0 {
            return Ok(None);
        }
        // SAFETY: bionic NUL-terminates the value within PROP_VALUE_MAX.
        let value = unsafe { CStr::from_ptr(buf.as_ptr()) };
        Ok(Some(value.to_string_lossy().into_owned()))
    }
}

// ---------------------------------------------------------------------------
// NativeBuildInfo: android.os.Build
// ---------------------------------------------------------------------------

impl NativeBuildInfo for AndroidBridge {
    fn build_metadata(&self) -> Result<BuildMetadata> {
        with_env(|env, _| {
            Ok(BuildMetadata {
                fingerprint: build_field(env, "FINGERPRINT")?,
                device: build_field(env, "DEVICE")?,
                model: build_field(env, "MODEL")?,
                brand: build_field(env, "BRAND")?,
                product: build_field(env, "PRODUCT")?,
                manufacturer: build_field(env, "MANUFACTURER")?,
                hardware: build_field(env, "HARDWARE")?,
                board: build_field(env, "BOARD")?,
                bootloader: build_field(env, "BOOTLOADER")?,
                tags: build_field(env, "TAGS")?,
            })
        })
    }
}

// ---------------------------------------------------------------------------
// NativeFilesystem / NativeProcess: std
// ---------------------------------------------------------------------------

impl NativeFilesystem for AndroidBridge {
    fn exists(&self, path: &str) -> Result<bool> {
        Ok(Path::new(path).try_exists()?)
    }

    fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        Ok(std::fs::write(path, contents)?)
    }

    fn remove_file(&self, path: &str) -> Result<()> {
        Ok(std::fs::remove_file(path)?)
    }
}

impl NativeProcess for AndroidBridge {
    fn run_command(&self, program: &str, args: &[&str], timeout: Duration) -> Result<Vec<String>> {
        process::run_with_timeout(program, args, timeout)
    }
}

// ---------------------------------------------------------------------------
// NativeDebug: android.os.Debug
// ---------------------------------------------------------------------------

impl NativeDebug for AndroidBridge {
    fn debugger_connected(&self) -> Result<bool> {
        let jdwp = with_env(|env, _| {
            env.call_static_method("android/os/Debug", "isDebuggerConnected", "()Z", &[])
                .map_err(|e| jni_err("Debug.isDebuggerConnected", e))?
                .z()
                .map_err(|e| jni_err("Debug.isDebuggerConnected->z", e))
        })?;
        // A native tracer (gdb, frida) does not show up in the JDWP flag.
        Ok(jdwp || process::procfs_traced().unwrap_or(false))
    }

    fn waiting_for_debugger(&self) -> Result<bool> {
        with_env(|env, _| {
            env.call_static_method("android/os/Debug", "waitingForDebugger", "()Z", &[])
                .map_err(|e| jni_err("Debug.waitingForDebugger", e))?
                .z()
                .map_err(|e| jni_err("Debug.waitingForDebugger->z", e))
        })
    }
}

// ---------------------------------------------------------------------------
// NativeNetwork: ConnectivityManager, NetworkInterface, proxy settings
// ---------------------------------------------------------------------------

impl NativeNetwork for AndroidBridge {
    /// Whether any network known to `ConnectivityManager` carries
    /// `TRANSPORT_VPN`.
    fn vpn_transport_active(&self) -> Result<bool> {
        with_env(|env, context| {
            let cm = system_service(env, context, "connectivity")?;
            let networks = JObjectArray::from(
                env.call_method(&cm, "getAllNetworks", "()[Landroid/net/Network;", &[])
                    .map_err(|e| jni_err("getAllNetworks", e))?
                    .l()
                    .map_err(|e| jni_err("getAllNetworks->l", e))?,
            );
            if networks.is_null() {
                return Ok(false);
            }
            let count = env
                .get_array_length(&networks)
                .map_err(|e| jni_err("getAllNetworks length", e))?;

            for i in 0..count {
                let network = env
                    .get_object_array_element(&networks, i)
                    .map_err(|e| jni_err("getAllNetworks[i]", e))?;
                let caps = env
                    .call_method(
                        &cm,
                        "getNetworkCapabilities",
                        "(Landroid/net/Network;)Landroid/net/NetworkCapabilities;",
                        &[JValue::Object(&network)],
                    )
                    .map_err(|e| jni_err("getNetworkCapabilities", e))?
                    .l()
                    .map_err(|e| jni_err("getNetworkCapabilities->l", e))?;
                // Free per-element refs; the caller's frame may be long-lived.
                let _ = env.delete_local_ref(network);
                if caps.is_null() {
                    continue;
                }
                let vpn = env
                    .call_method(&caps, "hasTransport", "(I)Z", &[JValue::Int(TRANSPORT_VPN)])
                    .map_err(|e| jni_err("hasTransport", e))?
                    .z()
                    .map_err(|e| jni_err("hasTransport->z", e))?;
                let _ = env.delete_local_ref(caps);
                if vpn {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    /// Names of interfaces that are up, via `java.net.NetworkInterface`.
    fn network_service_keys(&self) -> Result<Vec<String>> {
        with_env(|env, _| {
            let interfaces = env
                .call_static_method(
                    "java/net/NetworkInterface",
                    "getNetworkInterfaces",
                    "()Ljava/util/Enumeration;",
                    &[],
                )
                .map_err(|e| jni_err("getNetworkInterfaces", e))?
                .l()
                .map_err(|e| jni_err("getNetworkInterfaces->l", e))?;
            let mut names = Vec::new();
            if interfaces.is_null() {
                return Ok(names);
            }

            loop {
                let more = env
                    .call_method(&interfaces, "hasMoreElements", "()Z", &[])
                    .map_err(|e| jni_err("hasMoreElements", e))?
                    .z()
                    .map_err(|e| jni_err("hasMoreElements->z", e))?;
                if !more {
                    break;
                }
                let iface = env
                    .call_method(&interfaces, "nextElement", "()Ljava/lang/Object;", &[])
                    .map_err(|e| jni_err("nextElement", e))?
                    .l()
                    .map_err(|e| jni_err("nextElement->l", e))?;
                let up = env
                    .call_method(&iface, "isUp", "()Z", &[])
                    .map_err(|e| jni_err("isUp", e))?
                    .z()
                    .map_err(|e| jni_err("isUp->z", e))?;
                if up {
                    let name = env
                        .call_method(&iface, "getName", "()Ljava/lang/String;", &[])
                        .map_err(|e| jni_err("getName", e))?
                        .l()
                        .map_err(|e| jni_err("getName->l", e))?;
                    if let Some(name) = opt_string(env, name)? {
                        names.push(name);
                    }
                }
                let _ = env.delete_local_ref(iface);
            }
            Ok(names)
        })
    }

    fn http_proxy_host(&self) -> Result<Option<String>> {
        with_env(|env, _| java_system_property(env, "http.proxyHost"))
    }

    /// `Settings.Global.HTTP_PROXY` holds `host:port` while a global proxy
    /// is configured; `:0` means cleared.
    fn proxy_enabled(&self) -> Result<bool> {
        with_env(|env, context| {
            let resolver = content_resolver(env, context)?;
            let j_name = env
                .new_string("http_proxy")
                .map_err(|e| jni_err("new_string(http_proxy)", e))?;
            let value = env
                .call_static_method(
                    "android/provider/Settings$Global",
                    "getString",
                    "(Landroid/content/ContentResolver;Ljava/lang/String;)Ljava/lang/String;",
                    &[JValue::Object(&resolver), JValue::Object(&j_name)],
                )
                .map_err(|e| jni_err("Settings.Global.getString", e))?
                .l()
                .map_err(|e| jni_err("Settings.Global.getString->l", e))?;
            Ok(opt_string(env, value)?
                .map(|v| !v.trim().is_empty() && v.trim() != ":0")
                .unwrap_or(false))
        })
    }
}

// ---------------------------------------------------------------------------
// NativeDisplay: android.hardware.display.DisplayManager
// ---------------------------------------------------------------------------

impl NativeDisplay for AndroidBridge {
    fn display_count(&self) -> Result<usize> {
        with_env(|env, context| {
            let dm = system_service(env, context, "display")?;
            let displays = JObjectArray::from(
                env.call_method(&dm, "getDisplays", "()[Landroid/view/Display;", &[])
                    .map_err(|e| jni_err("getDisplays", e))?
                    .l()
                    .map_err(|e| jni_err("getDisplays->l", e))?,
            );
            if displays.is_null() {
                return Ok(0);
            }
            let count = env
                .get_array_length(&displays)
                .map_err(|e| jni_err("getDisplays length", e))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }
}

// ---------------------------------------------------------------------------
// NativeInstaller: PackageManager
// ---------------------------------------------------------------------------

impl NativeInstaller for AndroidBridge {
    fn installer_package(&self) -> Result<Option<String>> {
        with_env(|env, context| {
            let pm = package_manager(env, context)?;
            let pkg = package_name(env, context)?;

            let installer = if sdk_int(env)? >= SDK_R {
                let info = env
                    .call_method(
                        &pm,
                        "getInstallSourceInfo",
                        "(Ljava/lang/String;)Landroid/content/pm/InstallSourceInfo;",
                        &[JValue::Object(&pkg)],
                    )
                    .map_err(|e| jni_err("getInstallSourceInfo", e))?
                    .l()
                    .map_err(|e| jni_err("getInstallSourceInfo->l", e))?;
                if info.is_null() {
                    return Ok(None);
                }
                env.call_method(&info, "getInstallingPackageName", "()Ljava/lang/String;", &[])
                    .map_err(|e| jni_err("getInstallingPackageName", e))?
                    .l()
                    .map_err(|e| jni_err("getInstallingPackageName->l", e))?
            } else {
                env.call_method(
                    &pm,
                    "getInstallerPackageName",
                    "(Ljava/lang/String;)Ljava/lang/String;",
                    &[JValue::Object(&pkg)],
                )
                .map_err(|e| jni_err("getInstallerPackageName", e))?
                .l()
                .map_err(|e| jni_err("getInstallerPackageName->l", e))?
            };
            opt_string(env, installer)
        })
    }

    fn signing_certificate(&self) -> Result<Option<Vec<u8>>> {
        with_env(|env, context| {
            let pm = package_manager(env, context)?;
            let pkg = package_name(env, context)?;
            let modern = sdk_int(env)? >= SDK_P;
            let flags = if modern { GET_SIGNING_CERTIFICATES } else { GET_SIGNATURES };

            let info = env
                .call_method(
                    &pm,
                    "getPackageInfo",
                    "(Ljava/lang/String;I)Landroid/content/pm/PackageInfo;",
                    &[JValue::Object(&pkg), JValue::Int(flags)],
                )
                .map_err(|e| jni_err("getPackageInfo", e))?
                .l()
                .map_err(|e| jni_err("getPackageInfo->l", e))?;

            let signers = if modern {
                let signing_info = env
                    .get_field(&info, "signingInfo", "Landroid/content/pm/SigningInfo;")
                    .map_err(|e| jni_err("signingInfo", e))?
                    .l()
                    .map_err(|e| jni_err("signingInfo->l", e))?;
                if signing_info.is_null() {
                    return Ok(None);
                }
                env.call_method(
                    &signing_info,
                    "getApkContentsSigners",
                    "()[Landroid/content/pm/Signature;",
                    &[],
                )
                .map_err(|e| jni_err("getApkContentsSigners", e))?
                .l()
                .map_err(|e| jni_err("getApkContentsSigners->l", e))?
            } else {
                env.get_field(&info, "signatures", "[Landroid/content/pm/Signature;")
                    .map_err(|e| jni_err("signatures", e))?
                    .l()
                    .map_err(|e| jni_err("signatures->l", e))?
            };

            let signers = JObjectArray::from(signers);
            if signers.is_null() {
                return Ok(None);
            }
            let len = env
                .get_array_length(&signers)
                .map_err(|e| jni_err("signers length", e))?;
            if len == 0 {
                return Ok(None);
            }
            let first = env
                .get_object_array_element(&signers, 0)
                .map_err(|e| jni_err("signers[0]", e))?;
            let bytes = JByteArray::from(
                env.call_method(&first, "toByteArray", "()[B", &[])
                    .map_err(|e| jni_err("Signature.toByteArray", e))?
                    .l()
                    .map_err(|e| jni_err("Signature.toByteArray->l", e))?,
            );
            let der = env
                .convert_byte_array(&bytes)
                .map_err(|e| jni_err("convert_byte_array", e))?;
            Ok(Some(der))
        })
    }
}

// ---------------------------------------------------------------------------
// NativeUrlSchemes / NativeDeveloperSettings
// ---------------------------------------------------------------------------

impl NativeUrlSchemes for AndroidBridge {
    fn can_open_url(&self, _url: &str) -> Result<bool> {
        Err(VigilError::PlatformUnavailable)
    }
}

impl NativeDeveloperSettings for AndroidBridge {
    /// `Settings.Global.ADB_ENABLED != 0`.
    fn usb_debugging_enabled(&self) -> Result<bool> {
        with_env(|env, context| {
            let resolver = content_resolver(env, context)?;
            let j_name = env
                .new_string("adb_enabled")
                .map_err(|e| jni_err("new_string(adb_enabled)", e))?;
            let value = env
                .call_static_method(
                    "android/provider/Settings$Global",
                    "getInt",
                    "(Landroid/content/ContentResolver;Ljava/lang/String;I)I",
                    &[JValue::Object(&resolver), JValue::Object(&j_name), JValue::Int(0)],
                )
                .map_err(|e| jni_err("Settings.Global.getInt", e))?
                .i()
                .map_err(|e| jni_err("Settings.Global.getInt->i", e))?;
            Ok(value != 0)
        })
    }
}
