//! Credential encryption for the external session store.
//!
//! AES-256-GCM with an HKDF-derived per-account key. The session layer
//! keeps only ciphertext; passwords are decrypted just before a request
//! and handed to [`crate::CredentialContext`] fully formed.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{OdataError, OdataResult};

/// Length of an AES-256 key in bytes.
const KEY_LENGTH: usize = 32;

/// Length of a GCM nonce in bytes.
const NONCE_LENGTH: usize = 12;

/// Length of the GCM authentication tag in bytes.
const TAG_LENGTH: usize = 16;

/// Context string for HKDF key derivation.
const HKDF_INFO: &[u8] = b"peyk-credential-cipher-v1";

/// Encrypts and decrypts stored credential payloads.
///
/// Keys are derived per account name, so a ciphertext copied between
/// accounts fails authentication instead of decrypting silently.
#[derive(Clone)]
pub struct CredentialCipher {
    master_key: [u8; KEY_LENGTH],
}

impl CredentialCipher {
    /// Creates a cipher from a 32-byte master key.
    #[must_use]
    pub fn new(master_key: [u8; KEY_LENGTH]) -> Self {
        Self { master_key }
    }

    /// Creates a cipher from a hex-encoded master key.
    pub fn from_hex(hex_key: &str) -> OdataResult<Self> {
        let bytes = hex::decode(hex_key)
            .map_err(|e| OdataError::Encryption(format!("invalid hex key: {e}")))?;
        if bytes.len() != KEY_LENGTH {
            return Err(OdataError::Encryption(format!(
                "key must be {KEY_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }

    /// Derives the per-account key with HKDF-SHA256.
    fn derive_key(&self, account: &str) -> [u8; KEY_LENGTH] {
        let hkdf = Hkdf::<Sha256>::new(Some(account.as_bytes()), &self.master_key);
        let mut derived = [0u8; KEY_LENGTH];
        // 32 bytes is always a valid HKDF-SHA256 output length.
        hkdf.expand(HKDF_INFO, &mut derived)
            .expect("HKDF-SHA256 supports 32-byte output");
        derived
    }

    /// Encrypts a payload for the given account name.
    ///
    /// Returns `nonce || ciphertext || tag`.
    pub fn encrypt(&self, account: &str, plaintext: &[u8]) -> OdataResult<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.derive_key(account))
            .map_err(|e| OdataError::Encryption(format!("failed to create cipher: {e}")))?;

        use rand::rngs::OsRng;
        use rand::RngCore;
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| OdataError::Encryption(format!("encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypts a payload produced by [`CredentialCipher::encrypt`].
    pub fn decrypt(&self, account: &str, ciphertext: &[u8]) -> OdataResult<Vec<u8>> {
        if ciphertext.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(OdataError::Decryption("ciphertext too short".into()));
        }
        let cipher = Aes256Gcm::new_from_slice(&self.derive_key(account))
            .map_err(|e| OdataError::Decryption(format!("failed to create cipher: {e}")))?;

        let (nonce_bytes, encrypted) = ciphertext.split_at(NONCE_LENGTH);
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), encrypted)
            .map_err(|e| OdataError::Decryption(format!("decryption failed: {e}")))
    }

    /// Encrypts a string password.
    pub fn encrypt_str(&self, account: &str, plaintext: &str) -> OdataResult<Vec<u8>> {
        self.encrypt(account, plaintext.as_bytes())
    }

    /// Decrypts back to a string password.
    pub fn decrypt_str(&self, account: &str, ciphertext: &[u8]) -> OdataResult<String> {
        let plaintext = self.decrypt(account, ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|e| OdataError::Decryption(format!("not valid UTF-8: {e}")))
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher")
            .field("master_key", &"[REDACTED]")
            .finish()
    }
}

/// Generates a random master key from the OS CSPRNG.
///
/// Intended for initial setup and tests.
#[must_use]
pub fn generate_master_key() -> [u8; KEY_LENGTH] {
    use rand::rngs::OsRng;
    use rand::RngCore;
    let mut key = [0u8; KEY_LENGTH];
    OsRng.fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> CredentialCipher {
        CredentialCipher::new([0x42u8; KEY_LENGTH])
    }

    #[test]
    fn roundtrip() {
        let c = cipher();
        let ciphertext = c.encrypt_str("CORP\\jdoe", "s3cret!").unwrap();
        assert_eq!(c.decrypt_str("CORP\\jdoe", &ciphertext).unwrap(), "s3cret!");
    }

    #[test]
    fn roundtrip_with_generated_key() {
        let c = CredentialCipher::new(generate_master_key());
        let ciphertext = c.encrypt_str("CORP\\jdoe", "s3cret!").unwrap();
        assert_eq!(c.decrypt_str("CORP\\jdoe", &ciphertext).unwrap(), "s3cret!");
    }

    #[test]
    fn roundtrip_empty_and_binary() {
        let c = cipher();
        for payload in [&b""[..], &[0u8, 255, 1, 128][..]] {
            let ciphertext = c.encrypt("acct", payload).unwrap();
            assert_eq!(c.decrypt("acct", &ciphertext).unwrap(), payload);
        }
    }

    #[test]
    fn cross_account_decryption_fails() {
        let c = cipher();
        let ciphertext = c.encrypt_str("CORP\\a", "pw").unwrap();
        assert!(c.decrypt_str("CORP\\b", &ciphertext).is_err());
    }

    #[test]
    fn corrupted_ciphertext_fails() {
        let c = cipher();
        let mut ciphertext = c.encrypt_str("acct", "pw").unwrap();
        ciphertext[NONCE_LENGTH] ^= 0xFF;
        assert!(c.decrypt_str("acct", &ciphertext).is_err());
    }

    #[test]
    fn short_ciphertext_fails() {
        assert!(cipher().decrypt("acct", &[0u8; 10]).is_err());
    }

    #[test]
    fn from_hex_validates_length() {
        assert!(CredentialCipher::from_hex(&"0".repeat(64)).is_ok());
        assert!(CredentialCipher::from_hex("00112233").is_err());
        assert!(CredentialCipher::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let rendered = format!("{:?}", cipher());
        assert!(rendered.contains("[REDACTED]"));
    }
}
