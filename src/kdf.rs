//! Symmetric key derivation from verification tokens.
//!
//! Uses HKDF-SHA256 with:
//! - IKM: the 32-byte token
//! - salt: caller supplied
//! - info: `"transcrypt-key-v1"` followed by caller context

use crate::token::VerificationToken;
use hkdf::Hkdf;
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const KEY_LEN: usize = 32;

const INFO_PREFIX: &[u8] = b"transcrypt-key-v1";

/// A derived 256-bit symmetric key, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

pub fn derive_symmetric_key(token: &VerificationToken, salt: &[u8], info: &[u8]) -> SymmetricKey {
    let hk = Hkdf::<Sha256>::new(Some(salt), token.as_bytes());

    let mut context = Vec::with_capacity(INFO_PREFIX.len() + info.len());
    context.extend_from_slice(INFO_PREFIX);
    context.extend_from_slice(info);

    let mut key = [0u8; KEY_LEN];
    hk.expand(&context, &mut key)
        .expect("32 bytes is valid output length");
    SymmetricKey(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{derive, TokenHash};

    fn token(positions: &[u64]) -> VerificationToken {
        derive(positions, b"salt", TokenHash::default()).unwrap()
    }

    #[test]
    fn test_same_inputs_same_key() {
        let a = derive_symmetric_key(&token(&[1, 2, 3]), b"s", b"file");
        let b = derive_symmetric_key(&token(&[1, 2, 3]), b"s", b"file");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_every_input_separates_keys() {
        let base = derive_symmetric_key(&token(&[1, 2, 3]), b"s", b"file");
        let other_token = derive_symmetric_key(&token(&[1, 2, 4]), b"s", b"file");
        let other_salt = derive_symmetric_key(&token(&[1, 2, 3]), b"t", b"file");
        let other_info = derive_symmetric_key(&token(&[1, 2, 3]), b"s", b"message");

        assert_ne!(base.as_bytes(), other_token.as_bytes());
        assert_ne!(base.as_bytes(), other_salt.as_bytes());
        assert_ne!(base.as_bytes(), other_info.as_bytes());
        assert_ne!(base.as_bytes(), token(&[1, 2, 3]).as_bytes());
    }

    #[test]
    fn test_debug_hides_key() {
        let key = derive_symmetric_key(&token(&[9]), b"", b"");
        assert_eq!(format!("{:?}", key), "SymmetricKey(..)");
    }
}
