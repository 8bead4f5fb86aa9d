// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cipher envelope framing: base64(nonce ‖ ciphertext ‖ tag).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use vigil_core::SealedMessage;
use vigil_core::error::{Result, VigilError};

/// Concatenate nonce and ciphertext and encode as padded standard base64.
pub fn frame(sealed: &SealedMessage) -> String {
    let mut bytes = Vec::with_capacity(sealed.nonce.len() + sealed.ciphertext.len());
    bytes.extend_from_slice(&sealed.nonce);
    bytes.extend_from_slice(&sealed.ciphertext);
    STANDARD.encode(bytes)
}

/// Decode an envelope and split off the leading `nonce_len` bytes.
///
/// ASCII whitespace is skipped so line-wrapped encodings are accepted.
/// Undecodable input and input shorter than the nonce are both
/// [`VigilError::InvalidEnvelope`].
pub fn parse(envelope: &str, nonce_len: usize) -> Result<SealedMessage> {
    let compact: String = envelope
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let mut bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|_| VigilError::InvalidEnvelope)?;
    if bytes.len() < nonce_len {
        return Err(VigilError::InvalidEnvelope);
    }
    let ciphertext = bytes.split_off(nonce_len);
    Ok(SealedMessage {
        nonce: bytes,
        ciphertext,
    })
}
