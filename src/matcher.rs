//! Pattern search over synthesized streams.
//!
//! The sequential scan slides a buffer of `span` symbols over the lazy
//! stream. The parallel scan splits the candidate starts into chunks that
//! workers claim in ascending order; the coordinator merges finished chunks
//! in chunk order, so both paths accept exactly the same matches.

use crate::error::{Result, TranscryptError};
use crate::pattern::{Overlap, Pattern};
use crate::stream::{StreamRecipe, Synthesizer};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, info};

/// Stream offset at which an accepted match begins
pub type MatchPosition = u64;

pub const DEFAULT_CHUNK_SIZE: usize = 65_536;

/// Starts scanned between cancellation checks inside a chunk
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// First and last stream positions used by one match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: u64,
    pub end: u64,
}

/// Applies the overlap policy to candidates offered in ascending start order
struct Acceptor {
    overlap: Overlap,
    required: usize,
    last_end: Option<u64>,
    accepted: Vec<MatchSpan>,
}

impl Acceptor {
    fn new(overlap: Overlap, required: usize) -> Self {
        Self {
            overlap,
            required,
            last_end: None,
            accepted: Vec::with_capacity(required.min(1024)),
        }
    }

    /// Returns true once `required` matches are accepted
    fn offer(&mut self, candidate: MatchSpan) -> bool {
        let fits = match (self.overlap, self.last_end) {
            (Overlap::Disjoint, Some(end)) => candidate.start > end,
            _ => true,
        };
        if fits {
            self.last_end = Some(candidate.end);
            self.accepted.push(candidate);
        }
        self.is_full()
    }

    fn is_full(&self) -> bool {
        self.accepted.len() >= self.required
    }

    fn finish(self, searched: u64) -> Result<Vec<MatchSpan>> {
        if self.is_full() {
            Ok(self.accepted)
        } else {
            Err(TranscryptError::PatternNotFound {
                found: self.accepted.len(),
                required: self.required,
                searched,
            })
        }
    }
}

/// Scan configuration: worker threads and starts per chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matcher {
    workers: usize,
    chunk_size: usize,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(default_workers(), DEFAULT_CHUNK_SIZE)
    }
}

/// Available parallelism minus one, at least one
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

impl Matcher {
    pub fn new(workers: usize, chunk_size: usize) -> Self {
        Self {
            workers: workers.max(1),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn sequential() -> Self {
        Self::new(1, DEFAULT_CHUNK_SIZE)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// First `k` accepted match positions, ascending
    pub fn find_matches(
        &self,
        synth: &Synthesizer<'_>,
        recipe: &StreamRecipe,
        pattern: &Pattern,
        k: usize,
    ) -> Result<Vec<MatchPosition>> {
        Ok(self
            .find_spans(synth, recipe, pattern, k)?
            .into_iter()
            .map(|m| m.start)
            .collect())
    }

    /// First `k` accepted matches with the last position each one consumed
    pub fn find_spans(
        &self,
        synth: &Synthesizer<'_>,
        recipe: &StreamRecipe,
        pattern: &Pattern,
        k: usize,
    ) -> Result<Vec<MatchSpan>> {
        if k == 0 {
            return Err(TranscryptError::InvalidConfig(
                "match count must be at least 1".into(),
            ));
        }
        synth.validate(recipe)?;

        let chunks = recipe.length().div_ceil(self.chunk_size as u64);
        if self.workers <= 1 || chunks <= 1 {
            scan_sequential(synth, recipe, pattern, k)
        } else {
            self.scan_parallel(synth, recipe, pattern, k, chunks as usize)
        }
    }

    fn scan_parallel(
        &self,
        synth: &Synthesizer<'_>,
        recipe: &StreamRecipe,
        pattern: &Pattern,
        k: usize,
        chunks: usize,
    ) -> Result<Vec<MatchSpan>> {
        let length = recipe.length();
        let chunk_size = self.chunk_size as u64;
        let workers = self.workers.min(chunks);
        let next_chunk = AtomicUsize::new(0);
        let cutoff = AtomicUsize::new(usize::MAX);

        debug!(workers, chunks, chunk_size, "dispatching parallel scan");

        let mut acceptor = Acceptor::new(pattern.overlap(), k);
        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel::<(usize, Vec<MatchSpan>)>();

            for _ in 0..workers {
                let tx = tx.clone();
                let next_chunk = &next_chunk;
                let cutoff = &cutoff;
                scope.spawn(move || loop {
                    let index = next_chunk.fetch_add(1, Ordering::SeqCst);
                    if index >= chunks || index > cutoff.load(Ordering::SeqCst) {
                        break;
                    }
                    let start = index as u64 * chunk_size;
                    let end = (start + chunk_size).min(length);
                    let cancelled = || index > cutoff.load(Ordering::Relaxed);
                    if let Some(found) =
                        scan_chunk(synth, recipe, pattern, k, start, end, cancelled)
                    {
                        if tx.send((index, found)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            let mut pending = BTreeMap::new();
            let mut next_merge = 0usize;
            for (index, found) in rx {
                pending.insert(index, found);
                while let Some(found) = pending.remove(&next_merge) {
                    let done = found.into_iter().any(|m| acceptor.offer(m));
                    if done {
                        cutoff.store(next_merge, Ordering::SeqCst);
                        info!(chunk = next_merge, matches = k, "match quota reached, cancelling later chunks");
                        return;
                    }
                    next_merge += 1;
                }
            }
        });

        acceptor.finish(length)
    }
}

/// Every candidate with a start in `[start, end)`, or `None` if cancelled
fn scan_chunk(
    synth: &Synthesizer<'_>,
    recipe: &StreamRecipe,
    pattern: &Pattern,
    k: usize,
    start: u64,
    end: u64,
    cancelled: impl Fn() -> bool,
) -> Option<Vec<MatchSpan>> {
    let span = pattern.span();
    let window = synth.window_unchecked(recipe, start, end - start + span as u64 - 1);
    let mut found = Vec::new();

    for s in start..end {
        if (s - start) % CANCEL_CHECK_INTERVAL == 0 && cancelled() {
            return None;
        }
        let rel = (s - start) as usize;
        let view = &window[rel..(rel + span).min(window.len())];
        if let Some(last) = pattern.match_at(view) {
            found.push(MatchSpan {
                start: s,
                end: s + last as u64,
            });
            // Overlapping matches are all accepted, so this chunk alone can satisfy k
            if pattern.overlap() == Overlap::Allowed && found.len() >= k {
                break;
            }
        }
    }
    Some(found)
}

fn scan_sequential(
    synth: &Synthesizer<'_>,
    recipe: &StreamRecipe,
    pattern: &Pattern,
    k: usize,
) -> Result<Vec<MatchSpan>> {
    let span = pattern.span();
    let mut symbols = synth.stream(recipe)?;
    let mut acceptor = Acceptor::new(pattern.overlap(), k);

    // Sliding buffer: buf[head..] holds stream[s..s + span], compacted as it drains
    let mut buf: Vec<u8> = symbols.by_ref().take(span).collect();
    let mut head = 0usize;

    for s in 0..recipe.length() {
        if let Some(last) = pattern.match_at(&buf[head..]) {
            let candidate = MatchSpan {
                start: s,
                end: s + last as u64,
            };
            if acceptor.offer(candidate) {
                break;
            }
        }
        head += 1;
        if let Some(symbol) = symbols.next() {
            buf.push(symbol);
        }
        if head >= span {
            buf.drain(..head);
            head = 0;
        }
    }

    acceptor.finish(recipe.length())
}
