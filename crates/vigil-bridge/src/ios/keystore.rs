// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secure Enclave key store.
//
// A P-256 private key is generated inside the Secure Enclave and tagged
// with the alias. Encryption uses ECIES
// (`eciesEncryptionCofactorVariableIVX963SHA256AESGCM`): the ephemeral
// public key and the AES-GCM IV are derived inside the blob, so this store
// reports a nonce length of zero and hands back one opaque ciphertext.
//
// The simulator has no Secure Enclave; there the key lives in the regular
// keychain, still non-exportable.

use std::ffi::c_void;

use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2_foundation::{NSData, NSDictionary, NSNumber, NSString};

use vigil_core::error::{Result, VigilError};
use vigil_core::{KeyBacking, KeyHandle, KeyUsage, SealedMessage};

use crate::traits::SecureKeyStore;

// ---------------------------------------------------------------------------
// Security.framework / CoreFoundation FFI
// ---------------------------------------------------------------------------

#[link(name = "Security", kind = "framework")]
unsafe extern "C" {
    fn SecItemCopyMatching(query: *const c_void, result: *mut *const c_void) -> i32;
    fn SecKeyCreateRandomKey(parameters: *const c_void, error: *mut *const c_void) -> *const c_void;
    fn SecKeyCopyPublicKey(key: *const c_void) -> *const c_void;
    fn SecKeyIsAlgorithmSupported(key: *const c_void, operation: isize, algorithm: *const c_void) -> u8;
    fn SecKeyCreateEncryptedData(
        key: *const c_void,
        algorithm: *const c_void,
        plaintext: *const c_void,
        error: *mut *const c_void,
    ) -> *const c_void;
    fn SecKeyCreateDecryptedData(
        key: *const c_void,
        algorithm: *const c_void,
        ciphertext: *const c_void,
        error: *mut *const c_void,
    ) -> *const c_void;
    fn SecAccessControlCreateWithFlags(
        allocator: *const c_void,
        protection: *const c_void,
        flags: usize,
        error: *mut *const c_void,
    ) -> *const c_void;

    static kSecClass: &'static NSString;
    static kSecClassKey: &'static NSString;
    static kSecAttrApplicationTag: &'static NSString;
    static kSecAttrKeyType: &'static NSString;
    static kSecAttrKeyTypeECSECPrimeRandom: &'static NSString;
    static kSecAttrKeySizeInBits: &'static NSString;
    static kSecAttrTokenID: &'static NSString;
    static kSecAttrTokenIDSecureEnclave: &'static NSString;
    static kSecAttrIsPermanent: &'static NSString;
    static kSecAttrAccessControl: &'static NSString;
    static kSecAttrAccessibleWhenUnlockedThisDeviceOnly: &'static NSString;
    static kSecPrivateKeyAttrs: &'static NSString;
    static kSecReturnRef: &'static NSString;
    static kSecKeyAlgorithmECIESEncryptionCofactorVariableIVX963SHA256AESGCM: &'static NSString;
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFRelease(cf: *const c_void);
    fn CFErrorGetCode(err: *const c_void) -> isize;
}

const ERR_SEC_SUCCESS: i32 = 0;
const ERR_SEC_ITEM_NOT_FOUND: i32 = -25300;

/// `kSecKeyOperationTypeEncrypt` / `kSecKeyOperationTypeDecrypt`.
const OPERATION_ENCRYPT: isize = 2;
const OPERATION_DECRYPT: isize = 3;

/// `kSecAccessControlPrivateKeyUsage`.
const ACCESS_PRIVATE_KEY_USAGE: usize = 1 << 30;

const IS_SIMULATOR: bool = cfg!(any(target_abi = "sim", target_arch = "x86_64"));

// ---------------------------------------------------------------------------
// Owned CF references
// ---------------------------------------------------------------------------

/// A +1 retained CoreFoundation object, released on drop.
struct CfOwned(*const c_void);

impl CfOwned {
    /// Take ownership of a Create/Copy result. `None` for NULL.
    fn new(ptr: *const c_void) -> Option<Self> {
        (!ptr.is_null()).then_some(Self(ptr))
    }

    fn as_ptr(&self) -> *const c_void {
        self.0
    }

    /// View as an ObjC object (CF types are toll-free bridged).
    fn as_obj(&self) -> &AnyObject {
        // SAFETY: every CF object is a valid ObjC object pointer.
        unsafe { &*(self.0 as *const AnyObject) }
    }
}

impl Drop for CfOwned {
    fn drop(&mut self) {
        // SAFETY: we hold exactly one retain on a non-null CF object.
        unsafe { CFRelease(self.0) }
    }
}

/// Consume a `CFErrorRef` out-parameter into its numeric code.
fn take_error(err: *const c_void) -> Option<isize> {
    let err = CfOwned::new(err)?;
    // SAFETY: `err` is a valid CFError.
    Some(unsafe { CFErrorGetCode(err.as_ptr()) })
}

/// Cast `NSDictionary` to a `*const c_void` for Security.framework calls.
fn dict_as_cf(dict: &NSDictionary<NSString, AnyObject>) -> *const c_void {
    dict as *const NSDictionary<NSString, AnyObject> as *const c_void
}

fn obj<T: objc2::Message>(value: &T) -> &AnyObject {
    // SAFETY: every Message type is an ObjC object; same pointer, same layout.
    unsafe { &*(value as *const T as *const AnyObject) }
}

fn algorithm() -> *const c_void {
    // SAFETY: process-lifetime constant CFStringRef from Security.framework.
    unsafe { kSecKeyAlgorithmECIESEncryptionCofactorVariableIVX963SHA256AESGCM as *const NSString as *const c_void }
}

// ---------------------------------------------------------------------------
// Key lookup and generation
// ---------------------------------------------------------------------------

/// Look up the private key tagged `alias`.
fn find_key(alias: &str) -> Result<Option<CfOwned>> {
    let tag = NSData::with_bytes(alias.as_bytes());
    let yes = NSNumber::new_bool(true);

    // SAFETY: Security.framework extern statics are process-lifetime constants.
    let keys: Vec<&NSString> =
        unsafe { vec![kSecClass, kSecAttrApplicationTag, kSecAttrKeyType, kSecReturnRef] };
    let values: Vec<&AnyObject> = unsafe {
        vec![
            obj(kSecClassKey),
            obj(&*tag),
            obj(kSecAttrKeyTypeECSECPrimeRandom),
            obj(&*yes),
        ]
    };
    let query = NSDictionary::from_slices(&keys, &values);

    let mut result: *const c_void = std::ptr::null();
    // SAFETY: toll-free bridged query; on success `result` receives a +1 SecKeyRef.
    let status = unsafe { SecItemCopyMatching(dict_as_cf(&query), &mut result) };
    match status {
        ERR_SEC_SUCCESS => Ok(CfOwned::new(result)),
        ERR_SEC_ITEM_NOT_FOUND => Ok(None),
        code => Err(VigilError::KeyStoreUnavailable(format!(
            "SecItemCopyMatching failed with OSStatus {code}"
        ))),
    }
}

fn generate_key(alias: &str) -> Result<CfOwned> {
    let mut err: *const c_void = std::ptr::null();
    // SAFETY: NULL allocator selects the default; protection is a constant CFString.
    let access = unsafe {
        SecAccessControlCreateWithFlags(
            std::ptr::null(),
            kSecAttrAccessibleWhenUnlockedThisDeviceOnly as *const NSString as *const c_void,
            ACCESS_PRIVATE_KEY_USAGE,
            &mut err,
        )
    };
    let access = CfOwned::new(access).ok_or_else(|| {
        VigilError::KeyProvisioningFailed(format!(
            "SecAccessControlCreateWithFlags failed ({:?})",
            take_error(err)
        ))
    })?;

    let tag = NSData::with_bytes(alias.as_bytes());
    let yes = NSNumber::new_bool(true);
    let bits = NSNumber::new_i32(256);

    // SAFETY: extern statics are process-lifetime constants.
    let private_keys: Vec<&NSString> =
        unsafe { vec![kSecAttrIsPermanent, kSecAttrApplicationTag, kSecAttrAccessControl] };
    let private_values: Vec<&AnyObject> = vec![obj(&*yes), obj(&*tag), access.as_obj()];
    let private_attrs = NSDictionary::from_slices(&private_keys, &private_values);

    let mut keys: Vec<&NSString> =
        unsafe { vec![kSecAttrKeyType, kSecAttrKeySizeInBits, kSecPrivateKeyAttrs] };
    let mut values: Vec<&AnyObject> = unsafe {
        vec![
            obj(kSecAttrKeyTypeECSECPrimeRandom),
            obj(&*bits),
            obj(&*private_attrs),
        ]
    };
    if !IS_SIMULATOR {
        // SAFETY: extern statics.
        unsafe {
            keys.push(kSecAttrTokenID);
            values.push(obj(kSecAttrTokenIDSecureEnclave));
        }
    }
    let params = NSDictionary::from_slices(&keys, &values);

    let mut err: *const c_void = std::ptr::null();
    // SAFETY: toll-free bridged parameter dictionary; returns +1 SecKeyRef or NULL.
    let key = unsafe { SecKeyCreateRandomKey(dict_as_cf(&params), &mut err) };
    CfOwned::new(key).ok_or_else(|| {
        VigilError::KeyProvisioningFailed(format!(
            "SecKeyCreateRandomKey failed ({:?})",
            take_error(err)
        ))
    })
}

fn require_key(handle: &KeyHandle) -> Result<CfOwned> {
    find_key(handle.alias())?.ok_or_else(|| {
        VigilError::KeyStoreUnavailable(format!("no key under alias {}", handle.alias()))
    })
}

/// Copy a +1 CFData result into a Vec.
fn take_data(data: *const c_void) -> Option<Vec<u8>> {
    // SAFETY: CFData is toll-free bridged with NSData and we own the +1.
    let data = unsafe { Retained::from_raw(data as *mut NSData) }?;
    Some(data.to_vec())
}

// ---------------------------------------------------------------------------
// SecureKeyStore
// ---------------------------------------------------------------------------

/// ECIES key store backed by the Secure Enclave.
pub struct SecureEnclaveKeyStore;

impl SecureEnclaveKeyStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SecureEnclaveKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureKeyStore for SecureEnclaveKeyStore {
    fn nonce_len(&self) -> usize {
        0
    }

    /// Usage is fixed by the key type: EC keys here serve only ECIES
    /// encrypt (public half) and decrypt (private half).
    fn get_or_create(&self, alias: &str, _usage: &[KeyUsage]) -> Result<KeyHandle> {
        if find_key(alias)?.is_none() {
            tracing::info!(alias, simulator = IS_SIMULATOR, "generating Secure Enclave P-256 key");
            generate_key(alias)?;
        }
        Ok(KeyHandle::new(alias, KeyBacking::SecureEnclave))
    }

    fn encrypt(&self, handle: &KeyHandle, plaintext: &[u8]) -> Result<SealedMessage> {
        let private = require_key(handle)?;
        // SAFETY: valid SecKeyRef; returns +1 public key or NULL.
        let public = CfOwned::new(unsafe { SecKeyCopyPublicKey(private.as_ptr()) })
            .ok_or_else(|| VigilError::EncryptionFailed("public key unavailable".into()))?;

        // SAFETY: valid key and constant algorithm.
        if unsafe { SecKeyIsAlgorithmSupported(public.as_ptr(), OPERATION_ENCRYPT, algorithm()) } == 0 {
            return Err(VigilError::EncryptionFailed("ECIES algorithm not supported".into()));
        }

        let input = NSData::with_bytes(plaintext);
        let mut err: *const c_void = std::ptr::null();
        // SAFETY: NSData is toll-free bridged with CFData.
        let blob = unsafe {
            SecKeyCreateEncryptedData(
                public.as_ptr(),
                algorithm(),
                &*input as *const NSData as *const c_void,
                &mut err,
            )
        };
        let ciphertext = take_data(blob).ok_or_else(|| {
            VigilError::EncryptionFailed(format!("SecKeyCreateEncryptedData failed ({:?})", take_error(err)))
        })?;

        Ok(SealedMessage {
            nonce: Vec::new(),
            ciphertext,
        })
    }

    fn decrypt(&self, handle: &KeyHandle, _nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let private = require_key(handle)?;

        // SAFETY: valid key and constant algorithm.
        if unsafe { SecKeyIsAlgorithmSupported(private.as_ptr(), OPERATION_DECRYPT, algorithm()) } == 0 {
            return Err(VigilError::KeyStoreUnavailable("ECIES algorithm not supported".into()));
        }

        let input = NSData::with_bytes(ciphertext);
        let mut err: *const c_void = std::ptr::null();
        // SAFETY: NSData is toll-free bridged with CFData.
        let clear = unsafe {
            SecKeyCreateDecryptedData(
                private.as_ptr(),
                algorithm(),
                &*input as *const NSData as *const c_void,
                &mut err,
            )
        };
        match take_data(clear) {
            Some(plaintext) => Ok(plaintext),
            None => {
                // The error text can describe where verification failed;
                // only the shape is reported.
                let _ = take_error(err);
                Err(VigilError::AuthenticationFailed)
            }
        }
    }
}
