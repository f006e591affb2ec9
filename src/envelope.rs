//! Authenticated encryption under a token-derived key.
//!
//! ```text
//! token + random salt → HKDF-SHA256 → ChaCha20-Poly1305(nonce, data, aad = version ‖ commitment)
//! ```
//!
//! The sender needs a token-form public key. The receiver regenerates the
//! token from the private key, checks it against the envelope's commitment
//! and decrypts.

use crate::engine::Engine;
use crate::error::{Result, TranscryptError};
use crate::kdf::derive_symmetric_key;
use crate::keys::{hex_bytes, PrivateKey, PublicKey};
use crate::token::{constant_time_compare, VerificationToken};
use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

pub const ENVELOPE_VERSION: u8 = 1;
pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;

const KDF_INFO: &[u8] = b"envelope";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u8,
    #[serde(with = "hex_bytes")]
    pub salt: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub commitment: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let envelope: Self = serde_json::from_str(s)?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(TranscryptError::UnsupportedAlgorithm(format!(
                "envelope version {}",
                envelope.version
            )));
        }
        if envelope.salt.len() != SALT_LEN || envelope.nonce.len() != NONCE_LEN {
            return Err(TranscryptError::IntegrityError(
                "malformed envelope salt or nonce".into(),
            ));
        }
        Ok(envelope)
    }

    fn aad(&self) -> Vec<u8> {
        let mut aad = Vec::with_capacity(1 + self.commitment.len());
        aad.push(self.version);
        aad.extend_from_slice(&self.commitment);
        aad
    }
}

/// Encrypt with fresh OS randomness
pub fn seal(data: &[u8], public: &PublicKey) -> Result<Envelope> {
    seal_with_rng(data, public, &mut OsRng)
}

pub fn seal_with_rng<R: RngCore + CryptoRng>(
    data: &[u8],
    public: &PublicKey,
    rng: &mut R,
) -> Result<Envelope> {
    let token = public.token().ok_or_else(|| {
        TranscryptError::Encryption("public key publishes a commitment, not a token".into())
    })?;
    seal_with_token(data, &token, rng)
}

fn seal_with_token<R: RngCore + CryptoRng>(
    data: &[u8],
    token: &VerificationToken,
    rng: &mut R,
) -> Result<Envelope> {
    let mut salt = vec![0u8; SALT_LEN];
    let mut nonce = vec![0u8; NONCE_LEN];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let mut envelope = Envelope {
        version: ENVELOPE_VERSION,
        salt,
        nonce,
        commitment: token.commitment().to_vec(),
        ciphertext: Vec::new(),
    };

    let key = derive_symmetric_key(token, &envelope.salt, KDF_INFO);
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| TranscryptError::Encryption(e.to_string()))?;
    let aad = envelope.aad();
    envelope.ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&envelope.nonce),
            Payload {
                msg: data,
                aad: &aad,
            },
        )
        .map_err(|e| TranscryptError::Encryption(e.to_string()))?;
    Ok(envelope)
}

/// Regenerate the token, check the commitment, decrypt
pub fn open(envelope: &Envelope, private: &PrivateKey, engine: &Engine) -> Result<Vec<u8>> {
    let token = private.token(engine)?;
    open_with_token(envelope, &token)
}

fn open_with_token(envelope: &Envelope, token: &VerificationToken) -> Result<Vec<u8>> {
    if !constant_time_compare(&token.commitment(), &envelope.commitment) {
        return Err(TranscryptError::VerificationMismatch);
    }
    let key = derive_symmetric_key(token, &envelope.salt, KDF_INFO);
    let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|e| TranscryptError::Encryption(e.to_string()))?;
    cipher
        .decrypt(
            Nonce::from_slice(&envelope.nonce),
            Payload {
                msg: &envelope.ciphertext,
                aad: &envelope.aad(),
            },
        )
        .map_err(|_| TranscryptError::IntegrityError("authentication failed".into()))
}

pub fn encrypt_file(public: &PublicKey, input: &Path, output: &Path) -> Result<Envelope> {
    let data = fs::read(input)?;
    let envelope = seal(&data, public)?;
    fs::write(output, envelope.to_json()?)?;
    info!(input = %input.display(), output = %output.display(), bytes = data.len(), "encrypted file");
    Ok(envelope)
}

pub fn decrypt_file(
    private: &PrivateKey,
    engine: &Engine,
    input: &Path,
    output: &Path,
) -> Result<usize> {
    let envelope = Envelope::from_json(&fs::read_to_string(input)?)?;
    let data = open(&envelope, private, engine)?;
    fs::write(output, &data)?;
    info!(input = %input.display(), output = %output.display(), bytes = data.len(), "decrypted file");
    Ok(data.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{derive, TokenHash};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn token(positions: &[u64]) -> VerificationToken {
        derive(positions, b"salt", TokenHash::default()).unwrap()
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let mut rng = StdRng::seed_from_u64(1);
        let token = token(&[4, 8, 15, 16, 23]);
        let envelope = seal_with_token(b"attack at dawn", &token, &mut rng).unwrap();

        assert_ne!(envelope.ciphertext, b"attack at dawn");
        assert_eq!(open_with_token(&envelope, &token).unwrap(), b"attack at dawn");
    }

    #[test]
    fn test_wrong_token_is_mismatch() {
        let mut rng = StdRng::seed_from_u64(2);
        let envelope = seal_with_token(b"data", &token(&[1, 2]), &mut rng).unwrap();
        assert!(matches!(
            open_with_token(&envelope, &token(&[1, 3])),
            Err(TranscryptError::VerificationMismatch)
        ));
    }

    #[test]
    fn test_tampering_is_detected() {
        let mut rng = StdRng::seed_from_u64(3);
        let token = token(&[42]);
        let envelope = seal_with_token(b"payload", &token, &mut rng).unwrap();

        let mut flipped = envelope.clone();
        flipped.ciphertext[0] ^= 1;
        assert!(matches!(
            open_with_token(&flipped, &token),
            Err(TranscryptError::IntegrityError(_))
        ));

        let mut resalted = envelope;
        resalted.salt[0] ^= 1;
        assert!(matches!(
            open_with_token(&resalted, &token),
            Err(TranscryptError::IntegrityError(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_and_validation() {
        let mut rng = StdRng::seed_from_u64(4);
        let token = token(&[7, 9]);
        let envelope = seal_with_token(b"", &token, &mut rng).unwrap();

        let json = envelope.to_json().unwrap();
        let back = Envelope::from_json(&json).unwrap();
        assert_eq!(back, envelope);
        assert!(open_with_token(&back, &token).unwrap().is_empty());

        let mut future = envelope.clone();
        future.version = 9;
        assert!(Envelope::from_json(&future.to_json().unwrap()).is_err());

        let mut short = envelope;
        short.nonce.truncate(4);
        assert!(Envelope::from_json(&short.to_json().unwrap()).is_err());
    }

    #[test]
    fn test_fresh_randomness_per_seal() {
        let mut rng = StdRng::seed_from_u64(5);
        let token = token(&[3]);
        let a = seal_with_token(b"same", &token, &mut rng).unwrap();
        let b = seal_with_token(b"same", &token, &mut rng).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
