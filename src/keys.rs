//! Key material: the secret recipe and the public token derived from it.

use crate::digits::{Constant, DigitStore};
use crate::engine::Engine;
use crate::error::{Result, TranscryptError};
use crate::pattern::{Overlap, Pattern};
use crate::stream::{max_start, CombinationRule, Offset, StreamRecipe};
use crate::token::{self, constant_time_compare, TokenHash, VerificationToken, TOKEN_LEN};
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use zeroize::Zeroize;

/// Which value a public key publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublicForm {
    /// The verification token itself; enough to derive the symmetric key
    #[default]
    Token,
    /// SHA3-256 commitment to the token
    Commitment,
}

impl std::str::FromStr for PublicForm {
    type Err = TranscryptError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "token" => Ok(Self::Token),
            "commitment" => Ok(Self::Commitment),
            _ => Err(TranscryptError::UnsupportedAlgorithm(format!(
                "public form: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for PublicForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => f.write_str("token"),
            Self::Commitment => f.write_str("commitment"),
        }
    }
}

/// Fixed pattern, or parameters for drawing one at random
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternChoice {
    Fixed(Pattern),
    Random {
        length: usize,
        max_gap: u32,
        use_spacing: bool,
        overlap: Overlap,
    },
}

impl Default for PatternChoice {
    fn default() -> Self {
        Self::Random {
            length: 3,
            max_gap: 10,
            use_spacing: true,
            overlap: Overlap::Allowed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaltChoice {
    Fixed(Vec<u8>),
    /// Draw this many random bytes
    Random(usize),
}

impl Default for SaltChoice {
    fn default() -> Self {
        Self::Random(16)
    }
}

/// Parameters for generating a private key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConfig {
    pub pattern: PatternChoice,
    pub salt: SaltChoice,
    /// Offsets drawn into pi
    pub pi_offsets: usize,
    /// Offsets drawn into e
    pub e_offsets: usize,
    /// Stream length, which also bounds the search
    pub length: u64,
    pub rule: CombinationRule,
    /// Number of leading matches hashed into the token (K)
    pub matches: usize,
    pub hash: TokenHash,
    pub form: PublicForm,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            pattern: PatternChoice::default(),
            salt: SaltChoice::default(),
            pi_offsets: 100,
            e_offsets: 100,
            length: 10_000,
            rule: CombinationRule::default(),
            matches: 5,
            hash: TokenHash::default(),
            form: PublicForm::default(),
        }
    }
}

impl KeyConfig {
    fn check(&self) -> Result<()> {
        if self.matches == 0 {
            return Err(TranscryptError::InvalidConfig(
                "match count must be at least 1".into(),
            ));
        }
        if self.pi_offsets + self.e_offsets == 0 {
            return Err(TranscryptError::InvalidConfig("no offsets requested".into()));
        }
        Ok(())
    }

    fn choose_pattern<R: RngCore>(&self, rng: &mut R, symbol_count: u16) -> Result<Pattern> {
        let pattern = match &self.pattern {
            PatternChoice::Fixed(pattern) => pattern.clone(),
            PatternChoice::Random {
                length,
                max_gap,
                use_spacing,
                overlap,
            } => Pattern::random(rng, *length, symbol_count, *max_gap, *use_spacing)?
                .with_overlap(*overlap),
        };
        if let Some(&symbol) = pattern
            .symbols()
            .iter()
            .find(|&&s| u16::from(s) >= symbol_count)
        {
            return Err(TranscryptError::InvalidPattern(format!(
                "symbol {} can never occur in a stream of {} symbols",
                symbol, symbol_count
            )));
        }
        Ok(pattern)
    }

    fn choose_salt<R: RngCore>(&self, rng: &mut R) -> Vec<u8> {
        match &self.salt {
            SaltChoice::Fixed(salt) => salt.clone(),
            SaltChoice::Random(n) => {
                let mut salt = vec![0u8; *n];
                rng.fill_bytes(&mut salt);
                salt
            }
        }
    }
}

/// Number of distinct symbols a rule can produce over the store
pub fn stream_symbol_count(rule: CombinationRule, store: &DigitStore) -> u16 {
    match rule {
        CombinationRule::Additive { modulus } => modulus,
        CombinationRule::Interleave => Constant::ALL
            .iter()
            .filter_map(|&c| store.source(c).ok())
            .map(|s| s.alphabet().symbol_count())
            .max()
            .unwrap_or(10),
    }
}

/// The secret recipe. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKey {
    recipe: StreamRecipe,
    pattern: Pattern,
    matches: usize,
    #[serde(with = "hex_bytes")]
    salt: Vec<u8>,
    hash: TokenHash,
    #[serde(default)]
    form: PublicForm,
}

impl PrivateKey {
    /// Assemble a key from explicit parts
    pub fn new(
        recipe: StreamRecipe,
        pattern: Pattern,
        matches: usize,
        salt: Vec<u8>,
        hash: TokenHash,
        form: PublicForm,
    ) -> Result<Self> {
        if matches == 0 {
            return Err(TranscryptError::InvalidConfig(
                "match count must be at least 1".into(),
            ));
        }
        Ok(Self {
            recipe,
            pattern,
            matches,
            salt,
            hash,
            form,
        })
    }

    /// Random offsets, uniformly drawn inside the bounds of each source
    pub fn generate<R: RngCore + CryptoRng>(
        config: &KeyConfig,
        store: &DigitStore,
        rng: &mut R,
    ) -> Result<Self> {
        config.check()?;
        let count = config.pi_offsets + config.e_offsets;
        let mut offsets = Vec::with_capacity(count);
        for (constant, n) in [(Constant::Pi, config.pi_offsets), (Constant::E, config.e_offsets)] {
            if n == 0 {
                continue;
            }
            let available = store.source(constant)?.len();
            for _ in 0..n {
                let k = offsets.len();
                let bound = max_start(constant, available, config.rule.extent(config.length, count, k))?;
                offsets.push(Offset::new(constant, rng.gen_range(0..=bound)));
            }
        }
        let recipe = StreamRecipe::new(offsets, config.length, config.rule)?;
        let key = Self::finish(config, recipe, store, rng)?;
        debug!(offsets = count, pattern_len = key.pattern.len(), "generated private key");
        Ok(key)
    }

    /// Offsets derived deterministically from two seeds
    pub fn from_seeds<R: RngCore>(
        pi_seed: u64,
        e_seed: u64,
        config: &KeyConfig,
        store: &DigitStore,
        rng: &mut R,
    ) -> Result<Self> {
        config.check()?;
        if config.pi_offsets != config.e_offsets {
            return Err(TranscryptError::InvalidConfig(
                "seeded keys draw the same number of offsets from each constant".into(),
            ));
        }
        let recipe = StreamRecipe::from_seeds(
            pi_seed,
            e_seed,
            config.pi_offsets,
            config.length,
            config.rule,
            store,
        )?;
        Self::finish(config, recipe, store, rng)
    }

    fn finish<R: RngCore>(
        config: &KeyConfig,
        recipe: StreamRecipe,
        store: &DigitStore,
        rng: &mut R,
    ) -> Result<Self> {
        let pattern = config.choose_pattern(rng, stream_symbol_count(config.rule, store))?;
        let salt = config.choose_salt(rng);
        Self::new(recipe, pattern, config.matches, salt, config.hash, config.form)
    }

    pub fn recipe(&self) -> &StreamRecipe {
        &self.recipe
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn matches(&self) -> usize {
        self.matches
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn hash(&self) -> TokenHash {
        self.hash
    }

    pub fn form(&self) -> PublicForm {
        self.form
    }

    /// Ordered positions of the first K matches
    pub fn positions(&self, engine: &Engine) -> Result<Vec<u64>> {
        engine.find_matches(&self.recipe, &self.pattern, self.matches)
    }

    /// Synthesize, search and hash
    pub fn token(&self, engine: &Engine) -> Result<VerificationToken> {
        let positions = self.positions(engine)?;
        token::derive(&positions, &self.salt, self.hash)
    }

    /// The only way to produce a public key
    pub fn public_key(&self, engine: &Engine) -> Result<PublicKey> {
        let token = self.token(engine)?;
        Ok(PublicKey::from_token(&token, self.matches, self.hash, self.form))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "saved private key");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let key: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        key.check_loaded()?;
        Ok(key)
    }

    fn check_loaded(&self) -> Result<()> {
        if self.matches == 0 {
            return Err(TranscryptError::InvalidConfig(
                "match count must be at least 1".into(),
            ));
        }
        // Deserialization bypasses the constructors
        Pattern::new(self.pattern.symbols().to_vec(), self.pattern.spacing().clone())?;
        StreamRecipe::new(self.recipe.offsets().to_vec(), self.recipe.length(), self.recipe.rule())?;
        Ok(())
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.recipe.zeroize();
        self.pattern.zeroize();
        self.salt.zeroize();
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("offsets", &self.recipe.offsets().len())
            .field("length", &self.recipe.length())
            .field("matches", &self.matches)
            .field("hash", &self.hash)
            .field("form", &self.form)
            .finish_non_exhaustive()
    }
}

/// The shareable half: token or commitment, plus how it was derived
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    form: PublicForm,
    #[serde(with = "hex_bytes")]
    value: Vec<u8>,
    matches: usize,
    hash: TokenHash,
}

impl PublicKey {
    fn from_token(token: &VerificationToken, matches: usize, hash: TokenHash, form: PublicForm) -> Self {
        let value = match form {
            PublicForm::Token => token.as_bytes().to_vec(),
            PublicForm::Commitment => token.commitment().to_vec(),
        };
        Self {
            form,
            value,
            matches,
            hash,
        }
    }

    pub fn form(&self) -> PublicForm {
        self.form
    }

    pub fn matches(&self) -> usize {
        self.matches
    }

    pub fn hash(&self) -> TokenHash {
        self.hash
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The token, if this key publishes it
    pub fn token(&self) -> Option<VerificationToken> {
        if self.form != PublicForm::Token {
            return None;
        }
        let bytes: [u8; TOKEN_LEN] = self.value.as_slice().try_into().ok()?;
        Some(VerificationToken::from_bytes(bytes))
    }

    /// Commitment to the token, for either form
    pub fn commitment(&self) -> Option<[u8; TOKEN_LEN]> {
        match self.form {
            PublicForm::Token => self.token().map(|t| t.commitment()),
            PublicForm::Commitment => self.value.as_slice().try_into().ok(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "saved public key");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let key: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        if key.value.len() != TOKEN_LEN {
            return Err(TranscryptError::InvalidConfig(format!(
                "public key value must be {} bytes, got {}",
                TOKEN_LEN,
                key.value.len()
            )));
        }
        Ok(key)
    }
}

/// Regenerate the public half and compare in constant time.
///
/// Differing K, hash or form is a mismatch. Engine failures propagate.
pub fn verify(engine: &Engine, private: &PrivateKey, public: &PublicKey) -> Result<bool> {
    if private.matches != public.matches || private.hash != public.hash || private.form != public.form {
        debug!("key parameters disagree");
        return Ok(false);
    }
    let expected = private.public_key(engine)?;
    Ok(constant_time_compare(&expected.value, &public.value))
}

/// [`verify`], with a mismatch reported as [`TranscryptError::VerificationMismatch`]
pub fn verify_strict(engine: &Engine, private: &PrivateKey, public: &PublicKey) -> Result<()> {
    if verify(engine, private, public)? {
        Ok(())
    } else {
        Err(TranscryptError::VerificationMismatch)
    }
}

/// Hex encoding for byte fields in JSON
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
