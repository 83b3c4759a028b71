//! The token vocabulary maps each phoneme (a single unicode scalar value) to the integer ID
//! the synthesis model was trained on. The file format is one entry per line, `<symbol> <id>`,
//! with a bare `<id>` standing for the space character. The table is loaded once at startup and
//! is read-only afterwards so it can be shared between threads freely.
//!
//! Bad vocabulary files are a setup mistake that would corrupt everything downstream, so every
//! malformed line refuses to construct the table rather than being skipped.
use anyhow::{bail, Context};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

/// Blank-token placeholder used by some external phoneme vocabularies. It doesn't correspond to
/// a single codepoint so lines carrying it produce no entry.
const BLANK_MARKER: &str = "<BLNK>";

/// Phoneme to model ID mapping, the underlying store is backed by a `BTreeMap`
#[derive(Debug, Default, Clone)]
pub struct VocabularyTable {
    entries: BTreeMap<char, i64>,
}

impl VocabularyTable {
    /// Opens a vocabulary from a file
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let file = fs::File::open(&path)
            .with_context(|| format!("opening vocabulary {}", path.as_ref().display()))?;
        Self::from_reader(io::BufReader::new(file))
    }

    /// A function that abstracts away the file and works from a reader, letting tests use
    /// in-memory representations of the data instead of fixture files.
    pub fn from_reader(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line.context("reading vocabulary line")?;
            let mut fields = line.split_whitespace();

            let (symbol, id) = match (fields.next(), fields.next()) {
                (Some(id), None) => (" ", id),
                (Some(symbol), Some(id)) => (symbol, id),
                (None, _) => continue,
            };
            if let Some(extra) = fields.next() {
                bail!(
                    "line {}: unexpected trailing field {:?} in {:?}",
                    index + 1,
                    extra,
                    line
                );
            }

            let id: i64 = id
                .parse()
                .with_context(|| format!("line {}: invalid id in {:?}", index + 1, line))?;
            if id < 0 {
                bail!("line {}: negative id {} in {:?}", index + 1, id, line);
            }

            let mut codepoints = symbol.chars();
            let symbol_char = match (codepoints.next(), codepoints.next()) {
                (Some(c), None) => c,
                _ if symbol == BLANK_MARKER => continue,
                _ => bail!(
                    "line {}: symbol {:?} is not a single codepoint",
                    index + 1,
                    symbol
                ),
            };

            if let Some(existing) = entries.insert(symbol_char, id) {
                bail!(
                    "line {}: duplicate entry for {:?}, already mapped to {}",
                    index + 1,
                    symbol_char,
                    existing
                );
            }
        }

        Ok(Self { entries })
    }

    /// Looks up the model ID for a phoneme
    pub fn id(&self, symbol: char) -> Option<i64> {
        self.entries.get(&symbol).copied()
    }

    /// Number of symbols in the table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
