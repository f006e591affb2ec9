//! Digit sources for the transcendental constants.
//!
//! A [`DigitSource`] is a read-only, randomly addressable view of one
//! constant's precomputed expansion. Files are memory mapped once and shared
//! between threads through an `Arc`; nothing is mutated after open.
//!
//! Decimal files hold the ASCII expansion (`3.14159...`). Every digit is a
//! symbol, including the integer part, so index 0 of pi is `3`. The single
//! `.` separator and trailing whitespace are skipped. Line-wrapped files are
//! accepted too; their digits are decoded into memory once at open. Raw files
//! hold one pre-converted symbol per byte.

use crate::error::{Result, TranscryptError};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// First 100 digits of pi, integer part included
pub const PI_PREFIX: &str =
    "3141592653589793238462643383279502884197169399375105820974944592307816406286208998628034825342117067";

/// First 100 digits of e, integer part included
pub const E_PREFIX: &str =
    "2718281828459045235360287471352662497757247093699959574966967627724076630353547594571382178525166427";

/// Minimum number of leading symbols compared by [`DigitSource::matches_known_prefix`]
const MIN_PREFIX_CHECK: usize = 10;

/// How far into a decimal file the `.` separator may appear
const POINT_SEARCH_WINDOW: usize = 64;

/// The transcendental constants a source can expand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub const ALL: [Constant; 2] = [Constant::Pi, Constant::E];

    /// Known leading digits used to sanity check digit files
    pub fn known_prefix(&self) -> &'static str {
        match self {
            Self::Pi => PI_PREFIX,
            Self::E => E_PREFIX,
        }
    }

    fn stem(&self) -> &'static str {
        match self {
            Self::Pi => "pi",
            Self::E => "e",
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

impl std::str::FromStr for Constant {
    type Err = TranscryptError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pi" | "π" => Ok(Self::Pi),
            "e" => Ok(Self::E),
            _ => Err(TranscryptError::InvalidConfig(format!(
                "unknown constant: {}",
                s
            ))),
        }
    }
}

/// Symbol alphabet of the precomputed files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Alphabet {
    /// ASCII decimal expansion, symbols 0..=9
    #[default]
    Decimal,
    /// Pre-converted bytes, symbols 0..=255
    Raw,
}

impl Alphabet {
    /// Number of distinct symbols
    pub fn symbol_count(&self) -> u16 {
        match self {
            Self::Decimal => 10,
            Self::Raw => 256,
        }
    }

    /// Conventional file name for a constant in the data directory
    pub fn file_name(&self, constant: Constant) -> String {
        match self {
            Self::Decimal => format!("{}_1m.txt", constant.stem()),
            Self::Raw => format!("{}_1m.bin", constant.stem()),
        }
    }
}

impl std::str::FromStr for Alphabet {
    type Err = TranscryptError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "decimal" | "digits" => Ok(Self::Decimal),
            "raw" | "bytes" => Ok(Self::Raw),
            _ => Err(TranscryptError::UnsupportedAlgorithm(format!(
                "alphabet: {}",
                s
            ))),
        }
    }
}

enum Backing {
    Mapped(Mmap),
    Memory(Vec<u8>),
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Memory(bytes) => bytes,
        }
    }
}

/// Where the symbols sit inside the backing bytes
#[derive(Debug, Clone, Copy)]
struct Layout {
    /// Byte position of the decimal point, skipped when addressing
    point: Option<usize>,
    /// Whether bytes are ASCII digits that still need decoding
    ascii: bool,
    len: u64,
}

impl Layout {
    /// One already decoded symbol per byte
    fn decoded(len: usize) -> Self {
        Self {
            point: None,
            ascii: false,
            len: len as u64,
        }
    }
}

/// Outcome of validating a decimal expansion
enum DecimalScan {
    /// A single digit run, addressed in place
    Contiguous(Layout),
    /// Digits split by interior whitespace, decoded into a fresh buffer
    Wrapped(Vec<u8>),
}

/// Read-only provider of one constant's digits
#[derive(Clone)]
pub struct DigitSource {
    constant: Constant,
    alphabet: Alphabet,
    data: Arc<Backing>,
    layout: Layout,
}

impl DigitSource {
    /// Memory-map a precomputed digit file
    pub fn open(constant: Constant, path: &Path, alphabet: Alphabet) -> Result<Self> {
        let invalid = |reason: &str| TranscryptError::InvalidDigitFile {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        if !path.exists() {
            return Err(invalid("file not found"));
        }
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(invalid("file is empty"));
        }

        // The mapping is read-only and the file is treated as immutable for the
        // lifetime of the process.
        let mmap = unsafe { Mmap::map(&file)? };
        let (data, layout) = match alphabet {
            Alphabet::Decimal => {
                let scan = scan_decimal(&mmap).map_err(|reason| invalid(&reason))?;
                match scan {
                    DecimalScan::Contiguous(layout) => (Backing::Mapped(mmap), layout),
                    DecimalScan::Wrapped(symbols) => {
                        tracing::debug!(path = %path.display(), "decimal file is line-wrapped");
                        let layout = Layout::decoded(symbols.len());
                        (Backing::Memory(symbols), layout)
                    }
                }
            }
            Alphabet::Raw => {
                let layout = Layout::decoded(mmap.len());
                (Backing::Mapped(mmap), layout)
            }
        };

        tracing::info!(
            constant = %constant,
            path = %path.display(),
            digits = layout.len,
            "opened digit source"
        );

        Ok(Self {
            constant,
            alphabet,
            data: Arc::new(data),
            layout,
        })
    }

    /// Build a source from already decoded symbols
    pub fn from_symbols(constant: Constant, alphabet: Alphabet, symbols: Vec<u8>) -> Result<Self> {
        if symbols.is_empty() {
            return Err(TranscryptError::InvalidConfig(format!(
                "empty symbol source for {}",
                constant
            )));
        }
        let limit = alphabet.symbol_count();
        if let Some(bad) = symbols.iter().find(|&&s| u16::from(s) >= limit) {
            return Err(TranscryptError::InvalidConfig(format!(
                "symbol {} outside {:?} alphabet",
                bad, alphabet
            )));
        }
        let layout = Layout::decoded(symbols.len());
        Ok(Self {
            constant,
            alphabet,
            data: Arc::new(Backing::Memory(symbols)),
            layout,
        })
    }

    /// Build a decimal source from expansion text such as `"3.14159"`
    pub fn from_decimal_text(constant: Constant, text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        let scan = scan_decimal(bytes).map_err(|reason| TranscryptError::InvalidDigitFile {
            path: "<memory>".into(),
            reason,
        })?;
        let (data, layout) = match scan {
            DecimalScan::Contiguous(layout) => (bytes.to_vec(), layout),
            DecimalScan::Wrapped(symbols) => {
                let layout = Layout::decoded(symbols.len());
                (symbols, layout)
            }
        };
        Ok(Self {
            constant,
            alphabet: Alphabet::Decimal,
            data: Arc::new(Backing::Memory(data)),
            layout,
        })
    }

    pub fn constant(&self) -> Constant {
        self.constant
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Number of addressable symbols
    pub fn len(&self) -> u64 {
        self.layout.len
    }

    pub fn is_empty(&self) -> bool {
        self.layout.len == 0
    }

    /// Fail with `OutOfRange` unless `[start, start + length)` is available
    pub fn check_range(&self, start: u64, length: u64) -> Result<()> {
        match start.checked_add(length) {
            Some(end) if end <= self.layout.len => Ok(()),
            _ => Err(TranscryptError::OutOfRange {
                constant: self.constant,
                start,
                length,
                available: self.layout.len,
            }),
        }
    }

    /// Symbol at `index`
    pub fn digit_at(&self, index: u64) -> Result<u8> {
        self.check_range(index, 1)?;
        Ok(self.symbol(index))
    }

    /// Copy `length` symbols starting at `start`
    pub fn range(&self, start: u64, length: u64) -> Result<Vec<u8>> {
        self.check_range(start, length)?;
        let mut out = vec![0u8; length as usize];
        self.copy_unchecked(start, &mut out);
        Ok(out)
    }

    /// Fill `buf` with the symbols starting at `start`
    pub fn read_into(&self, start: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(start, buf.len() as u64)?;
        self.copy_unchecked(start, buf);
        Ok(())
    }

    /// Whether the leading symbols agree with the constant's known digits.
    /// Sources shorter than ten symbols never pass.
    pub fn matches_known_prefix(&self) -> bool {
        let prefix = self.constant.known_prefix().as_bytes();
        let n = prefix.len().min(self.layout.len as usize);
        if n < MIN_PREFIX_CHECK {
            return false;
        }
        (0..n).all(|i| self.symbol(i as u64) == prefix[i] - b'0')
    }

    /// Symbol at an index already known to be in range
    pub(crate) fn symbol(&self, index: u64) -> u8 {
        let bytes = self.data.bytes();
        let mut pos = index as usize;
        if let Some(point) = self.layout.point {
            if pos >= point {
                pos += 1;
            }
        }
        let raw = bytes[pos];
        if self.layout.ascii {
            raw - b'0'
        } else {
            raw
        }
    }

    fn copy_unchecked(&self, start: u64, out: &mut [u8]) {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.symbol(start + i as u64);
        }
    }
}

impl fmt::Debug for DigitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitSource")
            .field("constant", &self.constant)
            .field("alphabet", &self.alphabet)
            .field("len", &self.layout.len)
            .finish()
    }
}

/// Locate the decimal point and validate the digit run
fn scan_decimal(bytes: &[u8]) -> std::result::Result<DecimalScan, String> {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|p| p + 1)
        .ok_or_else(|| "no digits".to_string())?;
    let body = &bytes[..end];

    let head = &body[..end.min(POINT_SEARCH_WINDOW)];
    let point = head.iter().position(|&b| b == b'.');

    let mut wrapped = false;
    for (pos, &b) in body.iter().enumerate() {
        if Some(pos) == point || b.is_ascii_digit() {
            continue;
        }
        if b.is_ascii_whitespace() {
            wrapped = true;
            continue;
        }
        return Err(format!("unexpected byte 0x{:02x} at offset {}", b, pos));
    }

    if wrapped {
        let symbols: Vec<u8> = body
            .iter()
            .filter(|b| b.is_ascii_digit())
            .map(|b| b - b'0')
            .collect();
        if symbols.is_empty() {
            return Err("no digits".to_string());
        }
        return Ok(DecimalScan::Wrapped(symbols));
    }

    let len = (end - usize::from(point.is_some())) as u64;
    if len == 0 {
        return Err("no digits".to_string());
    }

    Ok(DecimalScan::Contiguous(Layout {
        point,
        ascii: true,
        len,
    }))
}

/// Explicit handle over the open digit sources, one per constant
#[derive(Debug, Clone, Default)]
pub struct DigitStore {
    sources: BTreeMap<Constant, DigitSource>,
}

impl DigitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the source for its constant
    pub fn with_source(mut self, source: DigitSource) -> Self {
        self.insert(source);
        self
    }

    pub fn insert(&mut self, source: DigitSource) {
        self.sources.insert(source.constant(), source);
    }

    /// Open `pi_1m.*` and `e_1m.*` from a data directory
    pub fn open_dir(dir: &Path, alphabet: Alphabet) -> Result<Self> {
        let mut store = Self::new();
        for constant in Constant::ALL {
            let path = dir.join(alphabet.file_name(constant));
            store.insert(DigitSource::open(constant, &path, alphabet)?);
        }
        Ok(store)
    }

    pub fn source(&self, constant: Constant) -> Result<&DigitSource> {
        self.sources
            .get(&constant)
            .ok_or(TranscryptError::SourceMissing(constant))
    }

    pub fn constants(&self) -> impl Iterator<Item = Constant> + '_ {
        self.sources.keys().copied()
    }

    /// Length of the shortest loaded source
    pub fn min_len(&self) -> u64 {
        self.sources.values().map(DigitSource::len).min().unwrap_or(0)
    }

    /// Prefix check for every loaded source
    pub fn verify(&self) -> Vec<(Constant, bool)> {
        self.sources
            .values()
            .map(|s| (s.constant(), s.matches_known_prefix()))
            .collect()
    }
}
