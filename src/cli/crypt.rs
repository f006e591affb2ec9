use crate::engine::Engine;
use crate::envelope::{decrypt_file, encrypt_file};
use crate::error::Result;
use crate::keys::{PrivateKey, PublicKey};
use std::path::Path;

/// Encrypt a file for the holder of the matching private key.
/// Returns the ciphertext size.
pub fn encrypt(public_path: &Path, input: &Path, output: &Path) -> Result<usize> {
    let public = PublicKey::load(public_path)?;
    let envelope = encrypt_file(&public, input, output)?;
    Ok(envelope.ciphertext.len())
}

/// Decrypt an envelope by regenerating the token. Returns the plaintext size.
pub fn decrypt(engine: &Engine, private_path: &Path, input: &Path, output: &Path) -> Result<usize> {
    let private = PrivateKey::load(private_path)?;
    decrypt_file(&private, engine, input, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::keygen::{keygen, KeygenOptions};
    use crate::cli::testing::{small_config, test_engine};
    use crate::error::TranscryptError;
    use crate::keys::PublicForm;
    use tempfile::tempdir;

    #[test]
    fn test_encrypt_decrypt_file() {
        let engine = test_engine();
        let dir = tempdir().unwrap();
        let (private_path, public_path) = (dir.path().join("k.key"), dir.path().join("k.pub"));
        let options = KeygenOptions {
            config: small_config(),
            ..Default::default()
        };
        keygen(&engine, &private_path, &public_path, &options).unwrap();

        let plain = dir.path().join("plain.txt");
        let sealed = dir.path().join("plain.env");
        let opened = dir.path().join("plain.out");
        std::fs::write(&plain, b"meet me by the transcendental numbers").unwrap();

        encrypt(&public_path, &plain, &sealed).unwrap();
        let n = decrypt(&engine, &private_path, &sealed, &opened).unwrap();
        assert_eq!(n, 37);
        assert_eq!(std::fs::read(&opened).unwrap(), std::fs::read(&plain).unwrap());

        // Another key cannot open it
        let other = dir.path().join("other.key");
        keygen(&engine, &other, &dir.path().join("other.pub"), &options).unwrap();
        assert!(matches!(
            decrypt(&engine, &other, &sealed, &opened),
            Err(TranscryptError::VerificationMismatch)
        ));
    }

    #[test]
    fn test_commitment_key_cannot_encrypt() {
        let engine = test_engine();
        let dir = tempdir().unwrap();
        let public_path = dir.path().join("k.pub");
        let mut options = KeygenOptions {
            config: small_config(),
            ..Default::default()
        };
        options.config.form = PublicForm::Commitment;
        keygen(&engine, &dir.path().join("k.key"), &public_path, &options).unwrap();

        let plain = dir.path().join("plain.txt");
        std::fs::write(&plain, b"x").unwrap();
        assert!(matches!(
            encrypt(&public_path, &plain, &dir.path().join("out")),
            Err(TranscryptError::Encryption(_))
        ));
    }
}
