//! The engine: digit store plus matcher, shared by every key operation.

use crate::config::EngineConfig;
use crate::digits::DigitStore;
use crate::error::Result;
use crate::matcher::{MatchPosition, MatchSpan, Matcher};
use crate::pattern::Pattern;
use crate::stream::{StreamRecipe, Synthesizer};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Engine {
    store: Arc<DigitStore>,
    matcher: Matcher,
}

impl Engine {
    pub fn new(store: Arc<DigitStore>, matcher: Matcher) -> Self {
        Self { store, matcher }
    }

    /// Open the digit files named by the config
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let store = DigitStore::open_dir(&config.data_dir, config.alphabet)?;
        info!(
            data_dir = %config.data_dir.display(),
            alphabet = ?config.alphabet,
            digits = store.min_len(),
            "opened digit store"
        );
        Ok(Self::new(
            Arc::new(store),
            Matcher::new(config.workers, config.chunk_size),
        ))
    }

    pub fn store(&self) -> &DigitStore {
        &self.store
    }

    pub fn matcher(&self) -> Matcher {
        self.matcher
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn synthesizer(&self) -> Synthesizer<'_> {
        Synthesizer::new(&self.store)
    }

    pub fn synthesize(&self, recipe: &StreamRecipe) -> Result<Vec<u8>> {
        self.synthesizer().synthesize(recipe)
    }

    pub fn find_matches(
        &self,
        recipe: &StreamRecipe,
        pattern: &Pattern,
        k: usize,
    ) -> Result<Vec<MatchPosition>> {
        self.matcher
            .find_matches(&self.synthesizer(), recipe, pattern, k)
    }

    pub fn find_spans(
        &self,
        recipe: &StreamRecipe,
        pattern: &Pattern,
        k: usize,
    ) -> Result<Vec<MatchSpan>> {
        self.matcher
            .find_spans(&self.synthesizer(), recipe, pattern, k)
    }
}
