use crate::engine::Engine;
use crate::error::Result;
use crate::keys::{self, PrivateKey, PublicKey};
use std::path::Path;

/// Check that a private key file regenerates a public key file
pub fn verify_key_files(engine: &Engine, private_path: &Path, public_path: &Path) -> Result<bool> {
    let private = PrivateKey::load(private_path)?;
    let public = PublicKey::load(public_path)?;
    keys::verify(engine, &private, &public)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::keygen::{keygen, KeygenOptions};
    use crate::cli::testing::{small_config, test_engine};
    use tempfile::tempdir;

    #[test]
    fn test_verify_key_files() {
        let engine = test_engine();
        let dir = tempdir().unwrap();
        let options = KeygenOptions {
            config: small_config(),
            ..Default::default()
        };

        let (a_priv, a_pub) = (dir.path().join("a.key"), dir.path().join("a.pub"));
        let (b_priv, b_pub) = (dir.path().join("b.key"), dir.path().join("b.pub"));
        keygen(&engine, &a_priv, &a_pub, &options).unwrap();
        keygen(&engine, &b_priv, &b_pub, &options).unwrap();

        assert!(verify_key_files(&engine, &a_priv, &a_pub).unwrap());
        assert!(verify_key_files(&engine, &b_priv, &b_pub).unwrap());
        assert!(!verify_key_files(&engine, &a_priv, &b_pub).unwrap());
        assert!(verify_key_files(&engine, &a_priv, &dir.path().join("missing")).is_err());
    }
}
