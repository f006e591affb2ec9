//! Transcrypt - key derivation from pattern positions in the digits of pi and e
//!
//! A key holder picks secret offsets into the digit expansions of π and e,
//! combines them into one synthetic stream, and searches that stream for a
//! pattern under a spacing rule. The positions of the first K matches are
//! hashed into a verification token, which HKDF turns into a symmetric key.
//!
//! ## Pipeline
//!
//! ```text
//! Offsets → Synthesize → Match → Token → HKDF → ChaCha20-Poly1305
//! ```
//!
//! - **Synthesize**: interleave or add the digit slices at each offset
//! - **Match**: find the first K occurrences, in parallel chunks if configured
//! - **Token**: hash of the big-endian positions plus salt (SHA-256, SHA3 or BLAKE3)
//! - **HKDF**: 32-byte symmetric key from the token
//!
//! ## Example
//!
//! ```no_run
//! use transcrypt::{keys, Engine, EngineConfig, KeyConfig, PrivateKey};
//! use rand::rngs::OsRng;
//!
//! let engine = Engine::open(&EngineConfig::from_env()?)?;
//! let private = PrivateKey::generate(&KeyConfig::default(), engine.store(), &mut OsRng)?;
//! let public = private.public_key(&engine)?;
//! assert!(keys::verify(&engine, &private, &public)?);
//! # Ok::<(), transcrypt::TranscryptError>(())
//! ```

pub mod cli;
pub mod config;
pub mod digits;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod matcher;
pub mod pattern;
pub mod stats;
pub mod stream;
pub mod token;

pub use config::EngineConfig;
pub use digits::{Alphabet, Constant, DigitSource, DigitStore};
pub use engine::Engine;
pub use error::{Result, TranscryptError};
pub use keys::{KeyConfig, PrivateKey, PublicForm, PublicKey};
pub use matcher::{MatchPosition, Matcher};
pub use pattern::{GapRule, Overlap, Pattern, SpacingRule};
pub use stream::{CombinationRule, Offset, StreamRecipe, Synthesizer};
pub use token::{TokenHash, VerificationToken};
