//! Patterns and spacing rules.
//!
//! A pattern is a symbol sequence whose consecutive symbols must sit at
//! positions allowed by its [`GapRule`]. [`Pattern::match_at`] decides a
//! single candidate start; scanning lives in [`crate::matcher`].

use crate::error::{Result, TranscryptError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use zeroize::Zeroize;

/// Largest span a pattern may cover, in stream positions
pub const MAX_SPAN: usize = 1 << 20;

/// Most symbols a pattern may hold
pub const MAX_PATTERN_LEN: usize = 256;

/// Gap constraint between consecutive pattern symbols
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GapRule {
    /// Symbol `j + 1` sits exactly `gaps[j] + 1` positions after symbol `j`
    Exact { gaps: Vec<u32> },
    /// Any gap in `min..=max`; the smallest satisfying positions win
    Window { min: u32, max: u32 },
}

/// Whether one match may reuse positions of the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Overlap {
    #[default]
    Allowed,
    /// A match must start after the last position of the previously accepted match
    Disjoint,
}

impl std::str::FromStr for Overlap {
    type Err = TranscryptError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "allowed" | "overlapping" => Ok(Self::Allowed),
            "disjoint" | "none" => Ok(Self::Disjoint),
            _ => Err(TranscryptError::InvalidPattern(format!(
                "unknown overlap policy: {}",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpacingRule {
    pub gap: GapRule,
    #[serde(default)]
    pub overlap: Overlap,
}

impl SpacingRule {
    /// No gaps, overlapping matches allowed
    pub fn contiguous(symbol_count: usize) -> Self {
        Self::exact(vec![0; symbol_count.saturating_sub(1)])
    }

    pub fn exact(gaps: Vec<u32>) -> Self {
        Self {
            gap: GapRule::Exact { gaps },
            overlap: Overlap::Allowed,
        }
    }

    pub fn window(min: u32, max: u32) -> Self {
        Self {
            gap: GapRule::Window { min, max },
            overlap: Overlap::Allowed,
        }
    }

    pub fn with_overlap(mut self, overlap: Overlap) -> Self {
        self.overlap = overlap;
        self
    }
}

/// Symbol sequence plus the spacing rule that defines a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    symbols: Vec<u8>,
    spacing: SpacingRule,
}

impl Pattern {
    pub fn new(symbols: Vec<u8>, spacing: SpacingRule) -> Result<Self> {
        if symbols.is_empty() {
            return Err(TranscryptError::InvalidPattern("pattern is empty".into()));
        }
        if symbols.len() > MAX_PATTERN_LEN {
            return Err(TranscryptError::InvalidPattern(format!(
                "{} symbols exceeds maximum of {}",
                symbols.len(),
                MAX_PATTERN_LEN
            )));
        }
        match &spacing.gap {
            GapRule::Exact { gaps } if gaps.len() != symbols.len() - 1 => {
                return Err(TranscryptError::InvalidPattern(format!(
                    "spacing list must have {} entries, got {}",
                    symbols.len() - 1,
                    gaps.len()
                )));
            }
            GapRule::Window { min, max } if min > max => {
                return Err(TranscryptError::InvalidPattern(format!(
                    "window minimum {} exceeds maximum {}",
                    min, max
                )));
            }
            _ => {}
        }

        let pattern = Self { symbols, spacing };
        match pattern.span_u64() {
            Some(span) if span <= MAX_SPAN as u64 => Ok(pattern),
            _ => Err(TranscryptError::InvalidPattern(format!(
                "pattern span exceeds {} positions",
                MAX_SPAN
            ))),
        }
    }

    pub fn contiguous(symbols: Vec<u8>) -> Result<Self> {
        let spacing = SpacingRule::contiguous(symbols.len());
        Self::new(symbols, spacing)
    }

    /// Parse `"3,1,4"` or `"314"` plus an optional gap list such as `"5,2"`
    pub fn parse(symbols: &str, gaps: Option<&str>) -> Result<Self> {
        let symbols = parse_symbols(symbols)?;
        let spacing = match gaps {
            Some(list) => SpacingRule::exact(parse_list(list, "spacing")?),
            None => SpacingRule::contiguous(symbols.len()),
        };
        Self::new(symbols, spacing)
    }

    /// Random pattern: symbols below `symbol_count`, exact gaps in `0..=max_gap`
    pub fn random<R: Rng>(
        rng: &mut R,
        length: usize,
        symbol_count: u16,
        max_gap: u32,
        use_spacing: bool,
    ) -> Result<Self> {
        if length == 0 || symbol_count == 0 {
            return Err(TranscryptError::InvalidPattern(
                "random pattern needs a length and an alphabet".into(),
            ));
        }
        let symbols: Vec<u8> = (0..length)
            .map(|_| rng.gen_range(0..symbol_count) as u8)
            .collect();
        let spacing = if use_spacing {
            SpacingRule::exact((1..length).map(|_| rng.gen_range(0..=max_gap)).collect())
        } else {
            SpacingRule::contiguous(length)
        };
        Self::new(symbols, spacing)
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    pub fn spacing(&self) -> &SpacingRule {
        &self.spacing
    }

    pub fn overlap(&self) -> Overlap {
        self.spacing.overlap
    }

    pub fn with_overlap(mut self, overlap: Overlap) -> Self {
        self.spacing.overlap = overlap;
        self
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn is_contiguous(&self) -> bool {
        match &self.spacing.gap {
            GapRule::Exact { gaps } => gaps.iter().all(|&g| g == 0),
            GapRule::Window { max, .. } => *max == 0,
        }
    }

    /// Largest number of stream positions one match can cover
    pub fn span(&self) -> usize {
        // Bounded by MAX_SPAN at construction
        self.span_u64().map_or(MAX_SPAN, |s| s as usize)
    }

    fn span_u64(&self) -> Option<u64> {
        let steps = (self.symbols.len() - 1) as u64;
        let gap_total = match &self.spacing.gap {
            GapRule::Exact { gaps } => gaps.iter().map(|&g| u64::from(g) + 1).sum::<u64>(),
            GapRule::Window { max, .. } => steps.checked_mul(u64::from(*max) + 1)?,
        };
        gap_total.checked_add(1)
    }

    /// Try a match whose first symbol is `window[0]`.
    ///
    /// `window` holds the stream from the candidate start onward and may be
    /// shorter than [`Pattern::span`] near the end of the stream. Returns the
    /// offset within `window` of the last symbol consumed by the match.
    pub fn match_at(&self, window: &[u8]) -> Option<usize> {
        if window.first() != self.symbols.first() {
            return None;
        }
        match &self.spacing.gap {
            GapRule::Exact { gaps } => {
                let mut pos = 0usize;
                for (gap, &symbol) in gaps.iter().zip(&self.symbols[1..]) {
                    pos += *gap as usize + 1;
                    if window.get(pos) != Some(&symbol) {
                        return None;
                    }
                }
                Some(pos)
            }
            GapRule::Window { min, max } => {
                smallest_placement(&self.symbols, window, *min as usize, *max as usize)
            }
        }
    }
}

impl Zeroize for Pattern {
    fn zeroize(&mut self) {
        self.symbols.zeroize();
        match &mut self.spacing.gap {
            GapRule::Exact { gaps } => gaps.zeroize(),
            GapRule::Window { min, max } => {
                min.zeroize();
                max.zeroize();
            }
        }
    }
}

/// Cursor of one placed symbol: its position and the next position to try
/// for the symbol after it
struct Placement {
    pos: usize,
    next: usize,
}

/// Depth-first search, with an explicit stack, for the lexicographically
/// smallest placement of `symbols` whose first symbol sits at `window[0]`.
/// Returns the position of the last symbol. `dead` holds the `(j, pos)`
/// placements already shown to be impossible to complete.
fn smallest_placement(symbols: &[u8], window: &[u8], min: usize, max: usize) -> Option<usize> {
    let mut dead: HashSet<(usize, usize)> = HashSet::new();
    let mut stack = vec![Placement {
        pos: 0,
        next: 1 + min,
    }];

    loop {
        let j = stack.len();
        if j == symbols.len() {
            return stack.last().map(|p| p.pos);
        }
        let top = stack.last_mut()?;
        let hi = (top.pos + 1 + max).min(window.len() - 1);

        let mut placed = None;
        while top.next <= hi {
            let p = top.next;
            top.next += 1;
            if window[p] == symbols[j] && !dead.contains(&(j, p)) {
                placed = Some(p);
                break;
            }
        }

        match placed {
            Some(pos) => stack.push(Placement {
                pos,
                next: pos + 1 + min,
            }),
            None => {
                let exhausted = stack.pop()?;
                if stack.is_empty() {
                    return None;
                }
                dead.insert((j - 1, exhausted.pos));
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wide = self.symbols.iter().any(|&s| s > 9);
        for (i, symbol) in self.symbols.iter().enumerate() {
            if i > 0 {
                match &self.spacing.gap {
                    GapRule::Exact { gaps } if gaps[i - 1] > 0 => write!(f, "[{}]", gaps[i - 1])?,
                    GapRule::Window { min, max } => write!(f, "[{}..{}]", min, max)?,
                    _ if wide => write!(f, ",")?,
                    _ => {}
                }
            }
            write!(f, "{}", symbol)?;
        }
        Ok(())
    }
}

fn parse_symbols(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    if s.contains(',') {
        return parse_list(s, "pattern");
    }
    s.chars()
        .map(|c| {
            c.to_digit(10).map(|d| d as u8).ok_or_else(|| {
                TranscryptError::InvalidPattern(format!("not a digit: {:?}", c))
            })
        })
        .collect()
}

fn parse_list<T: std::str::FromStr>(s: &str, what: &str) -> Result<Vec<T>> {
    s.split(',')
        .map(|part| {
            part.trim().parse().map_err(|_| {
                TranscryptError::InvalidPattern(format!("invalid {} entry: {:?}", what, part))
            })
        })
        .collect()
}

/// Parse a gap window written as `MIN:MAX`
pub fn parse_window(s: &str) -> Result<(u32, u32)> {
    let (min, max) = s
        .split_once(':')
        .ok_or_else(|| TranscryptError::InvalidPattern(format!("expected MIN:MAX, got {}", s)))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|_| TranscryptError::InvalidPattern(format!("invalid gap: {}", v)))
    };
    Ok((parse(min)?, parse(max)?))
}
