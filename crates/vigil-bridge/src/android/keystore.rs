// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// AES-256-GCM keys held by the `AndroidKeyStore` provider.
//
// Keys are generated inside the keystore (TEE or StrongBox) and never
// leave it; Rust only sees the alias. The provider chooses the 12-byte IV
// on encrypt (randomized encryption is mandatory for GCM keys).

use jni::objects::{JByteArray, JObject, JObjectArray, JValue};
use jni::JNIEnv;

use vigil_core::error::{Result, VigilError};
use vigil_core::{KeyBacking, KeyHandle, KeyUsage, SealedMessage};

use super::{jni_err, with_env};
use crate::traits::SecureKeyStore;

const PROVIDER: &str = "AndroidKeyStore";
const TRANSFORMATION: &str = "AES/GCM/NoPadding";
const GCM_IV_LEN: usize = 12;
const GCM_TAG_BITS: i32 = 128;

/// `KeyProperties.PURPOSE_ENCRYPT`.
const PURPOSE_ENCRYPT: i32 = 1;
/// `KeyProperties.PURPOSE_DECRYPT`.
const PURPOSE_DECRYPT: i32 = 2;

/// `Cipher.ENCRYPT_MODE` / `Cipher.DECRYPT_MODE`.
const ENCRYPT_MODE: i32 = 1;
const DECRYPT_MODE: i32 = 2;

const BUILDER_SIG: &str = "Landroid/security/keystore/KeyGenParameterSpec$Builder;";

/// Hardware-backed key store on Android.
pub struct AndroidKeyStore;

impl AndroidKeyStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AndroidKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn unavailable(context: &str, e: jni::errors::Error) -> VigilError {
    VigilError::KeyStoreUnavailable(format!("{context}: {e}"))
}

fn provisioning(context: &str, e: jni::errors::Error) -> VigilError {
    VigilError::KeyProvisioningFailed(format!("{context}: {e}"))
}

/// Clear the pending exception; true if it was a GCM tag mismatch.
fn take_bad_tag(env: &mut JNIEnv<'_>) -> bool {
    // Only exception functions are legal while one is pending.
    let thrown = env.exception_occurred();
    let _ = env.exception_clear();
    match thrown {
        Ok(ex) if !ex.is_null() => env
            .is_instance_of(&ex, "javax/crypto/AEADBadTagException")
            .unwrap_or(false),
        _ => false,
    }
}

/// Error for an exception thrown by `Cipher.doFinal` during decrypt. A tag
/// mismatch is reported without the provider's message.
fn final_failure(bad_tag: bool) -> VigilError {
    if bad_tag {
        VigilError::AuthenticationFailed
    } else {
        VigilError::KeyStoreUnavailable("Cipher.doFinal threw".into())
    }
}

/// `KeyStore.getInstance("AndroidKeyStore")`, loaded.
fn load_keystore<'local>(env: &mut JNIEnv<'local>) -> Result<JObject<'local>> {
    let provider = env
        .new_string(PROVIDER)
        .map_err(|e| unavailable("new_string(provider)", e))?;
    let keystore = env
        .call_static_method(
            "java/security/KeyStore",
            "getInstance",
            "(Ljava/lang/String;)Ljava/security/KeyStore;",
            &[JValue::Object(&provider)],
        )
        .map_err(|e| unavailable("KeyStore.getInstance", e))?
        .l()
        .map_err(|e| unavailable("KeyStore.getInstance->l", e))?;
    env.call_method(
        &keystore,
        "load",
        "(Ljava/security/KeyStore$LoadStoreParameter;)V",
        &[JValue::Object(&JObject::null())],
    )
    .map_err(|e| unavailable("KeyStore.load", e))?;
    Ok(keystore)
}

fn contains_alias(env: &mut JNIEnv<'_>, keystore: &JObject<'_>, alias: &str) -> Result<bool> {
    let j_alias = env
        .new_string(alias)
        .map_err(|e| unavailable("new_string(alias)", e))?;
    env.call_method(
        keystore,
        "containsAlias",
        "(Ljava/lang/String;)Z",
        &[JValue::Object(&j_alias)],
    )
    .map_err(|e| unavailable("containsAlias", e))?
    .z()
    .map_err(|e| unavailable("containsAlias->z", e))
}

/// `keystore.getKey(alias, null)`.
fn secret_key<'local>(env: &mut JNIEnv<'local>, alias: &str) -> Result<JObject<'local>> {
    let keystore = load_keystore(env)?;
    let j_alias = env
        .new_string(alias)
        .map_err(|e| unavailable("new_string(alias)", e))?;
    let key = env
        .call_method(
            &keystore,
            "getKey",
            "(Ljava/lang/String;[C)Ljava/security/Key;",
            &[JValue::Object(&j_alias), JValue::Object(&JObject::null())],
        )
        .map_err(|e| unavailable("KeyStore.getKey", e))?
        .l()
        .map_err(|e| unavailable("KeyStore.getKey->l", e))?;
    if key.is_null() {
        return Err(VigilError::KeyStoreUnavailable(format!(
            "no key under alias {alias}"
        )));
    }
    Ok(key)
}

/// One-element `String[]`.
fn string_array<'local>(env: &mut JNIEnv<'local>, value: &str) -> Result<JObjectArray<'local>> {
    let item = env
        .new_string(value)
        .map_err(|e| provisioning("new_string", e))?;
    env.new_object_array(1, "java/lang/String", &item)
        .map_err(|e| provisioning("new_object_array", e))
}

fn generate_key(env: &mut JNIEnv<'_>, alias: &str, usage: &[KeyUsage]) -> Result<()> {
    let purposes = usage.iter().fold(0, |acc, u| {
        acc | match u {
            KeyUsage::Encrypt => PURPOSE_ENCRYPT,
            KeyUsage::Decrypt => PURPOSE_DECRYPT,
        }
    });

    let j_alias = env
        .new_string(alias)
        .map_err(|e| provisioning("new_string(alias)", e))?;
    let builder = env
        .new_object(
            "android/security/keystore/KeyGenParameterSpec$Builder",
            "(Ljava/lang/String;I)V",
            &[JValue::Object(&j_alias), JValue::Int(purposes)],
        )
        .map_err(|e| provisioning("KeyGenParameterSpec.Builder", e))?;

    env.call_method(
        &builder,
        "setKeySize",
        &format!("(I){BUILDER_SIG}"),
        &[JValue::Int(256)],
    )
    .map_err(|e| provisioning("setKeySize", e))?;

    let modes = string_array(env, "GCM")?;
    env.call_method(
        &builder,
        "setBlockModes",
        &format!("([Ljava/lang/String;){BUILDER_SIG}"),
        &[JValue::Object(&modes)],
    )
    .map_err(|e| provisioning("setBlockModes", e))?;

    let paddings = string_array(env, "NoPadding")?;
    env.call_method(
        &builder,
        "setEncryptionPaddings",
        &format!("([Ljava/lang/String;){BUILDER_SIG}"),
        &[JValue::Object(&paddings)],
    )
    .map_err(|e| provisioning("setEncryptionPaddings", e))?;

    let spec = env
        .call_method(
            &builder,
            "build",
            "()Landroid/security/keystore/KeyGenParameterSpec;",
            &[],
        )
        .map_err(|e| provisioning("Builder.build", e))?
        .l()
        .map_err(|e| provisioning("Builder.build->l", e))?;

    let algorithm = env
        .new_string("AES")
        .map_err(|e| provisioning("new_string(AES)", e))?;
    let provider = env
        .new_string(PROVIDER)
        .map_err(|e| provisioning("new_string(provider)", e))?;
    let generator = env
        .call_static_method(
            "javax/crypto/KeyGenerator",
            "getInstance",
            "(Ljava/lang/String;Ljava/lang/String;)Ljavax/crypto/KeyGenerator;",
            &[JValue::Object(&algorithm), JValue::Object(&provider)],
        )
        .map_err(|e| provisioning("KeyGenerator.getInstance", e))?
        .l()
        .map_err(|e| provisioning("KeyGenerator.getInstance->l", e))?;

    env.call_method(
        &generator,
        "init",
        "(Ljava/security/spec/AlgorithmParameterSpec;)V",
        &[JValue::Object(&spec)],
    )
    .map_err(|e| provisioning("KeyGenerator.init", e))?;
    env.call_method(&generator, "generateKey", "()Ljavax/crypto/SecretKey;", &[])
        .map_err(|e| provisioning("generateKey", e))?;
    Ok(())
}

fn new_cipher<'local>(env: &mut JNIEnv<'local>) -> std::result::Result<JObject<'local>, jni::errors::Error> {
    let transformation = env.new_string(TRANSFORMATION)?;
    env.call_static_method(
        "javax/crypto/Cipher",
        "getInstance",
        "(Ljava/lang/String;)Ljavax/crypto/Cipher;",
        &[JValue::Object(&transformation)],
    )?
    .l()
}

fn to_bytes(env: &mut JNIEnv<'_>, obj: JObject<'_>) -> std::result::Result<Vec<u8>, jni::errors::Error> {
    env.convert_byte_array(JByteArray::from(obj))
}

impl SecureKeyStore for AndroidKeyStore {
    fn nonce_len(&self) -> usize {
        GCM_IV_LEN
    }

    fn get_or_create(&self, alias: &str, usage: &[KeyUsage]) -> Result<KeyHandle> {
        with_env(|env, _| {
            let keystore = load_keystore(env)?;
            if !contains_alias(env, &keystore, alias)? {
                tracing::info!(alias, "generating AES-256-GCM key in AndroidKeyStore");
                generate_key(env, alias, usage)?;
            }
            Ok(KeyHandle::new(alias, KeyBacking::AndroidKeystore))
        })
    }

    fn encrypt(&self, handle: &KeyHandle, plaintext: &[u8]) -> Result<SealedMessage> {
        with_env(|env, _| {
            let key = secret_key(env, handle.alias())?;
            let sealed = (|| {
                let cipher = new_cipher(env)?;
                env.call_method(
                    &cipher,
                    "init",
                    "(ILjava/security/Key;)V",
                    &[JValue::Int(ENCRYPT_MODE), JValue::Object(&key)],
                )?;
                let iv = env.call_method(&cipher, "getIV", "()[B", &[])?.l()?;
                let nonce = to_bytes(env, iv)?;
                let input = env.byte_array_from_slice(plaintext)?;
                let output = env
                    .call_method(&cipher, "doFinal", "([B)[B", &[JValue::Object(&input)])?
                    .l()?;
                let ciphertext = to_bytes(env, output)?;
                Ok::<_, jni::errors::Error>(SealedMessage { nonce, ciphertext })
            })()
            .map_err(|e| VigilError::EncryptionFailed(format!("AES/GCM encrypt: {e}")))?;

            if sealed.nonce.len() != GCM_IV_LEN {
                return Err(VigilError::EncryptionFailed(format!(
                    "provider returned a {}-byte IV",
                    sealed.nonce.len()
                )));
            }
            Ok(sealed)
        })
    }

    fn decrypt(&self, handle: &KeyHandle, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        with_env(|env, _| {
            let key = secret_key(env, handle.alias())?;
            let cipher = new_cipher(env).map_err(|e| unavailable("Cipher.getInstance", e))?;

            let iv = env
                .byte_array_from_slice(nonce)
                .map_err(|e| jni_err("byte_array_from_slice(iv)", e))?;
            let spec = env
                .new_object(
                    "javax/crypto/spec/GCMParameterSpec",
                    "(I[B)V",
                    &[JValue::Int(GCM_TAG_BITS), JValue::Object(&iv)],
                )
                .map_err(|e| unavailable("GCMParameterSpec", e))?;
            env.call_method(
                &cipher,
                "init",
                "(ILjava/security/Key;Ljava/security/spec/AlgorithmParameterSpec;)V",
                &[JValue::Int(DECRYPT_MODE), JValue::Object(&key), JValue::Object(&spec)],
            )
            .map_err(|e| unavailable("Cipher.init", e))?;

            let input = env
                .byte_array_from_slice(ciphertext)
                .map_err(|e| jni_err("byte_array_from_slice(ciphertext)", e))?;
            let output = env.call_method(&cipher, "doFinal", "([B)[B", &[JValue::Object(&input)]);

            match output.and_then(|v| v.l()) {
                Ok(obj) => to_bytes(env, obj).map_err(|e| jni_err("convert_byte_array", e)),
                Err(jni::errors::Error::JavaException) => {
                    let bad_tag = take_bad_tag(env);
                    Err(final_failure(bad_tag))
                }
                Err(e) => Err(unavailable("Cipher.doFinal", e)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_a_bad_tag_is_an_authentication_failure() {
        assert!(matches!(final_failure(true), VigilError::AuthenticationFailed));
        assert!(matches!(
            final_failure(false),
            VigilError::KeyStoreUnavailable(_)
        ));
    }
}
