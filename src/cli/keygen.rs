use crate::engine::Engine;
use crate::error::{Result, TranscryptError};
use crate::keys::{KeyConfig, PrivateKey, PublicKey};
use rand::rngs::OsRng;
use std::path::Path;
use tracing::{info, warn};

/// Options for the keygen command
#[derive(Debug, Clone)]
pub struct KeygenOptions {
    pub config: KeyConfig,
    /// Derive offsets from `(pi_seed, e_seed)` instead of drawing them
    pub seeds: Option<(u64, u64)>,
    /// Fresh recipes to try when the pattern occurs fewer than K times
    pub attempts: usize,
}

impl Default for KeygenOptions {
    fn default() -> Self {
        Self {
            config: KeyConfig::default(),
            seeds: None,
            attempts: 10,
        }
    }
}

/// Generate a key pair, retrying with new recipes when the search comes up short
pub fn generate_key_pair(engine: &Engine, options: &KeygenOptions) -> Result<(PrivateKey, PublicKey)> {
    let attempts = options.attempts.max(1);
    let mut rng = OsRng;

    let mut attempt = 1;
    loop {
        let private = match options.seeds {
            Some((pi_seed, e_seed)) => {
                PrivateKey::from_seeds(pi_seed, e_seed, &options.config, engine.store(), &mut rng)?
            }
            None => PrivateKey::generate(&options.config, engine.store(), &mut rng)?,
        };

        match private.public_key(engine) {
            Ok(public) => {
                info!(attempt, "key pair generated");
                return Ok((private, public));
            }
            Err(TranscryptError::PatternNotFound {
                found,
                required,
                searched,
            }) if attempt < attempts => {
                warn!(attempt, found, required, searched, "pattern too rare, retrying with a new recipe");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Generate a key pair and write both halves
pub fn keygen(
    engine: &Engine,
    private_path: &Path,
    public_path: &Path,
    options: &KeygenOptions,
) -> Result<String> {
    let (private, public) = generate_key_pair(engine, options)?;
    private.save(private_path)?;
    public.save(public_path)?;

    let mut output = String::new();
    output.push_str(&format!("Private key: {}\n", private_path.display()));
    output.push_str(&format!("Public key:  {}\n", public_path.display()));
    output.push_str(&format!("Pattern:     {}\n", private.pattern()));
    output.push_str(&format!("Matches (K): {}\n", private.matches()));
    output.push_str(&format!("Form:        {}\n", public.form()));
    Ok(output)
}

/// Recompute the public half of a stored private key
pub fn write_public_key(engine: &Engine, private_path: &Path, public_path: &Path) -> Result<PublicKey> {
    let private = PrivateKey::load(private_path)?;
    let public = private.public_key(engine)?;
    public.save(public_path)?;
    Ok(public)
}
