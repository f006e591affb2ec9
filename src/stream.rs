//! Stream synthesis: combine offsets into one deterministic symbol stream.
//!
//! The stream is a pure function of the recipe and the digit sources. A
//! recipe is validated against the sources once, after which every symbol
//! can be produced without failure, lazily or by window.

use crate::digits::{Constant, DigitStore};
use crate::error::{Result, TranscryptError};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha3::Sha3_256;
use std::fmt;
use zeroize::Zeroize;

type HmacSha3_256 = Hmac<Sha3_256>;

/// Upper bound on offsets per recipe; keeps additive sums inside `u32`
pub const MAX_OFFSETS: usize = 65_536;

/// Symbols produced per refill of a [`SymbolStream`]
const STREAM_BLOCK: u64 = 4096;

/// Starting index into one constant's digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offset {
    pub constant: Constant,
    pub index: u64,
}

impl Offset {
    pub fn new(constant: Constant, index: u64) -> Self {
        Self { constant, index }
    }
}

/// How per-offset digit slices become one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CombinationRule {
    /// Round-robin across offsets, each advancing its own cursor
    Interleave,
    /// Sum of all offsets' digits at the same position, modulo `modulus`
    Additive { modulus: u16 },
}

impl Default for CombinationRule {
    fn default() -> Self {
        Self::Additive { modulus: 10 }
    }
}

impl fmt::Display for CombinationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interleave => write!(f, "interleave"),
            Self::Additive { modulus } => write!(f, "additive:{}", modulus),
        }
    }
}

impl std::str::FromStr for CombinationRule {
    type Err = TranscryptError;
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        let (name, arg) = match lower.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (lower.as_str(), None),
        };
        match (name, arg) {
            ("interleave" | "round-robin" | "roundrobin", None) => Ok(Self::Interleave),
            ("additive", None) => Ok(Self::default()),
            ("additive", Some(m)) => m
                .parse()
                .map(|modulus| Self::Additive { modulus })
                .map_err(|_| TranscryptError::InvalidRecipe(format!("bad modulus: {}", m))),
            _ => Err(TranscryptError::UnsupportedAlgorithm(format!(
                "combination rule: {}",
                s
            ))),
        }
    }
}

impl CombinationRule {
    /// Number of symbols drawn from offset `k` of `count` for a stream of `length`
    pub fn extent(&self, length: u64, count: usize, k: usize) -> u64 {
        match self {
            Self::Additive { .. } => length,
            Self::Interleave => {
                let n = count as u64;
                length / n + u64::from((k as u64) < length % n)
            }
        }
    }
}

/// Offsets, combination rule and length of a synthesized stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecipe {
    offsets: Vec<Offset>,
    length: u64,
    rule: CombinationRule,
}

impl StreamRecipe {
    pub fn new(offsets: Vec<Offset>, length: u64, rule: CombinationRule) -> Result<Self> {
        let recipe = Self {
            offsets,
            length,
            rule,
        };
        recipe.check_shape()?;
        Ok(recipe)
    }

    /// Derive offsets from two integer seeds.
    ///
    /// Pi offsets come first, then e offsets. Each index is drawn from an
    /// HMAC-SHA3-256 keyed by the seed over a per-constant counter, reduced
    /// into the range that keeps every cursor inside the source.
    pub fn from_seeds(
        pi_seed: u64,
        e_seed: u64,
        per_constant: usize,
        length: u64,
        rule: CombinationRule,
        store: &DigitStore,
    ) -> Result<Self> {
        if per_constant == 0 {
            return Err(TranscryptError::InvalidRecipe(
                "at least one offset per constant required".into(),
            ));
        }
        let count = per_constant * 2;
        let mut offsets = Vec::with_capacity(count);
        for (constant, seed) in [(Constant::Pi, pi_seed), (Constant::E, e_seed)] {
            let available = store.source(constant)?.len();
            for j in 0..per_constant {
                let k = offsets.len();
                let bound = max_start(constant, available, rule.extent(length, count, k))?;
                let index = seeded_index(seed, constant, j as u64, bound);
                offsets.push(Offset::new(constant, index));
            }
        }
        Self::new(offsets, length, rule)
    }

    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn rule(&self) -> CombinationRule {
        self.rule
    }

    /// Copy of this recipe with a different stream length
    pub fn with_length(&self, length: u64) -> Result<Self> {
        Self::new(self.offsets.clone(), length, self.rule)
    }

    fn check_shape(&self) -> Result<()> {
        if self.offsets.is_empty() {
            return Err(TranscryptError::InvalidRecipe("no offsets".into()));
        }
        if self.offsets.len() > MAX_OFFSETS {
            return Err(TranscryptError::InvalidRecipe(format!(
                "{} offsets exceeds maximum of {}",
                self.offsets.len(),
                MAX_OFFSETS
            )));
        }
        if self.length == 0 {
            return Err(TranscryptError::InvalidRecipe("stream length is zero".into()));
        }
        if let CombinationRule::Additive { modulus } = self.rule {
            if !(2..=256).contains(&modulus) {
                return Err(TranscryptError::InvalidRecipe(format!(
                    "modulus {} must be between 2 and 256",
                    modulus
                )));
            }
        }
        Ok(())
    }
}

impl Zeroize for StreamRecipe {
    fn zeroize(&mut self) {
        for offset in self.offsets.iter_mut() {
            offset.index.zeroize();
        }
        self.length.zeroize();
    }
}

/// Largest start index that leaves room for `extent` symbols
pub(crate) fn max_start(constant: Constant, available: u64, extent: u64) -> Result<u64> {
    available
        .checked_sub(extent)
        .ok_or(TranscryptError::OutOfRange {
            constant,
            start: 0,
            length: extent,
            available,
        })
}

fn seeded_index(seed: u64, constant: Constant, counter: u64, bound: u64) -> u64 {
    let mut mac =
        HmacSha3_256::new_from_slice(&seed.to_be_bytes()).expect("HMAC can take key of any size");
    mac.update(b"transcrypt_offset_v1");
    mac.update(constant.to_string().as_bytes());
    mac.update(&counter.to_be_bytes());
    let out = mac.finalize().into_bytes();

    let mut wide = [0u8; 16];
    wide.copy_from_slice(&out[..16]);
    (u128::from_be_bytes(wide) % (u128::from(bound) + 1)) as u64
}

/// Produces streams from recipes over an injected digit store
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer<'a> {
    store: &'a DigitStore,
}

impl<'a> Synthesizer<'a> {
    pub fn new(store: &'a DigitStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'a DigitStore {
        self.store
    }

    /// Check that every cursor the recipe will touch lies inside its source
    pub fn validate(&self, recipe: &StreamRecipe) -> Result<()> {
        recipe.check_shape()?;
        let count = recipe.offsets.len();
        for (k, offset) in recipe.offsets.iter().enumerate() {
            let source = self.store.source(offset.constant)?;
            source.check_range(offset.index, recipe.rule.extent(recipe.length, count, k))?;
        }
        Ok(())
    }

    /// The whole stream, materialized
    pub fn synthesize(&self, recipe: &StreamRecipe) -> Result<Vec<u8>> {
        self.window(recipe, 0, recipe.length)
    }

    /// Symbols `[start, start + len)`, truncated at the end of the stream
    pub fn window(&self, recipe: &StreamRecipe, start: u64, len: u64) -> Result<Vec<u8>> {
        self.validate(recipe)?;
        Ok(self.window_unchecked(recipe, start, len))
    }

    /// Lazy, restartable iterator over the stream
    pub fn stream<'r>(&self, recipe: &'r StreamRecipe) -> Result<SymbolStream<'r>>
    where
        'a: 'r,
    {
        self.validate(recipe)?;
        Ok(SymbolStream {
            synth: Synthesizer { store: self.store },
            recipe,
            next_fill: 0,
            buf: Vec::new(),
            buf_pos: 0,
        })
    }

    /// Window of a recipe that already passed [`Synthesizer::validate`]
    pub(crate) fn window_unchecked(&self, recipe: &StreamRecipe, start: u64, len: u64) -> Vec<u8> {
        let end = start.saturating_add(len).min(recipe.length);
        if start >= end {
            return Vec::new();
        }
        let n = (end - start) as usize;

        match recipe.rule {
            CombinationRule::Interleave => {
                let count = recipe.offsets.len() as u64;
                (start..end)
                    .map(|i| {
                        let offset = recipe.offsets[(i % count) as usize];
                        self.source_symbol(offset.constant, offset.index + i / count)
                    })
                    .collect()
            }
            CombinationRule::Additive { modulus } => {
                let mut acc = vec![0u32; n];
                for offset in &recipe.offsets {
                    let base = offset.index + start;
                    for (i, slot) in acc.iter_mut().enumerate() {
                        *slot += u32::from(self.source_symbol(offset.constant, base + i as u64));
                    }
                }
                let m = u32::from(modulus);
                acc.into_iter().map(|sum| (sum % m) as u8).collect()
            }
        }
    }

    fn source_symbol(&self, constant: Constant, index: u64) -> u8 {
        self.store
            .source(constant)
            .expect("recipe validated against store")
            .symbol(index)
    }
}

/// Lazy view of a validated stream, refilled block by block
#[derive(Debug, Clone)]
pub struct SymbolStream<'r> {
    synth: Synthesizer<'r>,
    recipe: &'r StreamRecipe,
    next_fill: u64,
    buf: Vec<u8>,
    buf_pos: usize,
}

impl SymbolStream<'_> {
    /// Stream position of the next symbol
    pub fn position(&self) -> u64 {
        self.next_fill - (self.buf.len() - self.buf_pos) as u64
    }

    /// Rewind to the beginning of the stream
    pub fn restart(&mut self) {
        self.next_fill = 0;
        self.buf.clear();
        self.buf_pos = 0;
    }
}

impl Iterator for SymbolStream<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.buf_pos == self.buf.len() {
            if self.next_fill >= self.recipe.length {
                return None;
            }
            self.buf = self
                .synth
                .window_unchecked(self.recipe, self.next_fill, STREAM_BLOCK);
            self.next_fill += self.buf.len() as u64;
            self.buf_pos = 0;
        }
        let symbol = self.buf[self.buf_pos];
        self.buf_pos += 1;
        Some(symbol)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.recipe.length - self.position();
        let hint = usize::try_from(remaining).unwrap_or(usize::MAX);
        (hint, usize::try_from(remaining).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digits::{Alphabet, DigitSource};
    use proptest::prelude::*;

    fn store() -> DigitStore {
        DigitStore::new()
            .with_source(
                DigitSource::from_symbols(
                    Constant::Pi,
                    Alphabet::Decimal,
                    vec![3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5, 8, 9, 7, 9],
                )
                .unwrap(),
            )
            .with_source(
                DigitSource::from_symbols(
                    Constant::E,
                    Alphabet::Decimal,
                    vec![2, 7, 1, 8, 2, 8, 1, 8, 2, 8, 4, 5, 9, 0, 4],
                )
                .unwrap(),
            )
    }

    #[test]
    fn test_interleave_round_robin() {
        let store = store();
        let synth = Synthesizer::new(&store);
        let recipe = StreamRecipe::new(
            vec![Offset::new(Constant::Pi, 0), Offset::new(Constant::E, 2)],
            6,
            CombinationRule::Interleave,
        )
        .unwrap();

        // pi[0], e[2], pi[1], e[3], pi[2], e[4]
        assert_eq!(synth.synthesize(&recipe).unwrap(), vec![3, 1, 1, 8, 4, 2]);
    }

    #[test]
    fn test_additive_modular_sum() {
        let store = store();
        let synth = Synthesizer::new(&store);
        let recipe = StreamRecipe::new(
            vec![Offset::new(Constant::Pi, 0), Offset::new(Constant::E, 0)],
            4,
            CombinationRule::Additive { modulus: 10 },
        )
        .unwrap();

        // 3+2, 1+7, 4+1, 1+8
        assert_eq!(synth.synthesize(&recipe).unwrap(), vec![5, 8, 5, 9]);
    }

    #[test]
    fn test_single_offset_additive_is_identity() {
        let store = store();
        let synth = Synthesizer::new(&store);
        let recipe = StreamRecipe::new(
            vec![Offset::new(Constant::Pi, 3)],
            5,
            CombinationRule::default(),
        )
        .unwrap();
        assert_eq!(synth.synthesize(&recipe).unwrap(), vec![1, 5, 9, 2, 6]);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let store = store();
        let synth = Synthesizer::new(&store);
        let recipe = StreamRecipe::new(
            vec![
                Offset::new(Constant::Pi, 1),
                Offset::new(Constant::E, 4),
                Offset::new(Constant::Pi, 6),
            ],
            9,
            CombinationRule::Additive { modulus: 7 },
        )
        .unwrap();

        let first = synth.synthesize(&recipe).unwrap();
        let second = synth.synthesize(&recipe).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|&s| s < 7));
    }

    #[test]
    fn test_out_of_range_recipe_fails_before_output() {
        let store = store();
        let synth = Synthesizer::new(&store);
        let recipe = StreamRecipe::new(
            vec![Offset::new(Constant::Pi, 10)],
            6,
            CombinationRule::default(),
        )
        .unwrap();

        assert!(matches!(
            synth.synthesize(&recipe),
            Err(TranscryptError::OutOfRange { .. })
        ));
        assert!(synth.stream(&recipe).is_err());

        // Exactly reaching the end is fine
        let edge = recipe.with_length(5).unwrap();
        assert_eq!(synth.synthesize(&edge).unwrap().len(), 5);
    }

    #[test]
    fn test_interleave_extent_per_offset() {
        let rule = CombinationRule::Interleave;
        assert_eq!(rule.extent(7, 3, 0), 3);
        assert_eq!(rule.extent(7, 3, 1), 2);
        assert_eq!(rule.extent(7, 3, 2), 2);
        assert_eq!(CombinationRule::default().extent(7, 3, 2), 7);

        // e has 15 digits; offset 13 with two cursors over a length-4 stream needs 2
        let store = store();
        let synth = Synthesizer::new(&store);
        let recipe = StreamRecipe::new(
            vec![Offset::new(Constant::Pi, 0), Offset::new(Constant::E, 13)],
            4,
            rule,
        )
        .unwrap();
        assert_eq!(synth.synthesize(&recipe).unwrap(), vec![3, 0, 1, 4]);
    }

    #[test]
    fn test_stream_matches_synthesize_and_restarts() {
        let store = store();
        let synth = Synthesizer::new(&store);
        let recipe = StreamRecipe::new(
            vec![Offset::new(Constant::Pi, 2), Offset::new(Constant::E, 1)],
            12,
            CombinationRule::Interleave,
        )
        .unwrap();

        let full = synth.synthesize(&recipe).unwrap();
        let mut stream = synth.stream(&recipe).unwrap();
        let head: Vec<u8> = stream.by_ref().take(5).collect();
        assert_eq!(head, full[..5]);
        assert_eq!(stream.position(), 5);

        stream.restart();
        let again: Vec<u8> = stream.collect();
        assert_eq!(again, full);
    }

    #[test]
    fn test_window_truncates_at_stream_end() {
        let store = store();
        let synth = Synthesizer::new(&store);
        let recipe = StreamRecipe::new(
            vec![Offset::new(Constant::E, 0)],
            10,
            CombinationRule::default(),
        )
        .unwrap();

        let full = synth.synthesize(&recipe).unwrap();
        assert_eq!(synth.window(&recipe, 8, 5).unwrap(), full[8..]);
        assert!(synth.window(&recipe, 10, 5).unwrap().is_empty());
    }

    #[test]
    fn test_recipe_shape_validation() {
        assert!(StreamRecipe::new(Vec::new(), 5, CombinationRule::default()).is_err());
        assert!(StreamRecipe::new(
            vec![Offset::new(Constant::Pi, 0)],
            0,
            CombinationRule::default()
        )
        .is_err());
        assert!(StreamRecipe::new(
            vec![Offset::new(Constant::Pi, 0)],
            5,
            CombinationRule::Additive { modulus: 1 }
        )
        .is_err());
        assert!(StreamRecipe::new(
            vec![Offset::new(Constant::Pi, 0)],
            5,
            CombinationRule::Additive { modulus: 300 }
        )
        .is_err());
    }

    #[test]
    fn test_seeded_offsets_are_deterministic_and_bounded() {
        let store = store();
        let a = StreamRecipe::from_seeds(12345, 67890, 3, 8, CombinationRule::default(), &store)
            .unwrap();
        let b = StreamRecipe::from_seeds(12345, 67890, 3, 8, CombinationRule::default(), &store)
            .unwrap();
        let c = StreamRecipe::from_seeds(12346, 67890, 3, 8, CombinationRule::default(), &store)
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a.offsets().len(), 6);
        assert!(a.offsets()[..3].iter().all(|o| o.constant == Constant::Pi));
        assert!(a.offsets()[3..].iter().all(|o| o.constant == Constant::E));
        assert!(a.offsets().iter().all(|o| o.index <= 15 - 8));
        assert_eq!(a.offsets()[3..], c.offsets()[3..]);

        let synth = Synthesizer::new(&store);
        assert!(synth.synthesize(&a).is_ok());
    }

    #[test]
    fn test_seeded_offsets_reject_oversized_stream() {
        let store = store();
        let err =
            StreamRecipe::from_seeds(1, 2, 1, 16, CombinationRule::default(), &store).unwrap_err();
        assert!(matches!(err, TranscryptError::OutOfRange { .. }));
    }

    #[test]
    fn test_rule_parsing() {
        assert_eq!(
            "interleave".parse::<CombinationRule>().unwrap(),
            CombinationRule::Interleave
        );
        assert_eq!(
            "additive".parse::<CombinationRule>().unwrap(),
            CombinationRule::Additive { modulus: 10 }
        );
        assert_eq!(
            "additive:256".parse::<CombinationRule>().unwrap(),
            CombinationRule::Additive { modulus: 256 }
        );
        assert!("xor".parse::<CombinationRule>().is_err());
        assert_eq!(CombinationRule::Additive { modulus: 10 }.to_string(), "additive:10");
    }

    fn long_store() -> DigitStore {
        let pi = (0..1000u32).map(|i| ((i * 37 + i / 7) % 256) as u8).collect();
        let e = (0..1000u32).map(|i| ((i * 101 + i / 3) % 256) as u8).collect();
        DigitStore::new()
            .with_source(DigitSource::from_symbols(Constant::Pi, Alphabet::Raw, pi).unwrap())
            .with_source(DigitSource::from_symbols(Constant::E, Alphabet::Raw, e).unwrap())
    }

    fn recipe_strategy() -> impl Strategy<Value = StreamRecipe> {
        let rule = prop_oneof![
            Just(CombinationRule::Interleave),
            (2u16..=256).prop_map(|modulus| CombinationRule::Additive { modulus }),
        ];
        let offsets = proptest::collection::vec((any::<bool>(), 0u64..500), 1..8);
        (rule, offsets, 1u64..500).prop_map(|(rule, offsets, length)| {
            let offsets = offsets
                .into_iter()
                .map(|(pi, index)| {
                    Offset::new(if pi { Constant::Pi } else { Constant::E }, index)
                })
                .collect();
            StreamRecipe::new(offsets, length, rule).unwrap()
        })
    }

    proptest! {
        #[test]
        fn prop_every_view_of_a_recipe_agrees(
            recipe in recipe_strategy(),
            step in 1u64..64,
        ) {
            let store = long_store();
            let synth = Synthesizer::new(&store);

            let full = synth.synthesize(&recipe).unwrap();
            prop_assert_eq!(full.len() as u64, recipe.length());
            prop_assert_eq!(&synth.synthesize(&recipe).unwrap(), &full);

            let streamed: Vec<u8> = synth.stream(&recipe).unwrap().collect();
            prop_assert_eq!(&streamed, &full);

            let mut pieces = Vec::new();
            let mut start = 0;
            while start < recipe.length() {
                pieces.extend(synth.window(&recipe, start, step).unwrap());
                start += step;
            }
            prop_assert_eq!(&pieces, &full);

            if let CombinationRule::Additive { modulus } = recipe.rule() {
                prop_assert!(full.iter().all(|&s| u16::from(s) < modulus));
            }
        }
    }
}
