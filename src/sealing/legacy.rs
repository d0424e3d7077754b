// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Legacy symmetric encryption.
//!
//! The key is derived deterministically from the wallet address, so the
//! server can decrypt without any per-request credential. Ciphertext layout
//! is `nonce (12 bytes) || ciphertext+tag`.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum LegacyCryptoError {
    #[error("ciphertext too short to contain a nonce")]
    TooShort,
    #[error("decryption failed (wrong key or corrupted ciphertext)")]
    Decrypt,
    #[error("encryption failed")]
    Encrypt,
}

fn derive_key(address: &str) -> Key {
    let digest = Sha256::digest(address.as_bytes());
    Key::clone_from_slice(&digest)
}

/// Decrypt a legacy-sealed payload for the given wallet address.
pub fn decrypt(address: &str, sealed: &[u8]) -> Result<Vec<u8>, LegacyCryptoError> {
    if sealed.len() < NONCE_LEN {
        return Err(LegacyCryptoError::TooShort);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(&derive_key(address));
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| LegacyCryptoError::Decrypt)
}

/// Seal a payload under the address-derived key.
pub fn encrypt(address: &str, plaintext: &[u8]) -> Result<Vec<u8>, LegacyCryptoError> {
    let cipher = ChaCha20Poly1305::new(&derive_key(address));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| LegacyCryptoError::Encrypt)?;
    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}
