//! Turns one sentence of phonemes into the ID sequence the synthesis model consumes. The model
//! expects the sequence bracketed by beginning/end markers with a pad ID interleaved after every
//! real phoneme, so for `k` recognised phonemes the output is always `2k + 2` IDs long.
use crate::vocab::VocabularyTable;
use anyhow::Context;
use tracing::warn;

/// Pad symbol interleaved between phoneme IDs
pub const PAD: char = '_';
/// Beginning of sequence marker
pub const BOS: char = '^';
/// End of sequence marker
pub const EOS: char = '$';

/// Encodes a sentence of phonemes as model IDs. The reserved pad/bos/eos symbols must be present
/// in the vocabulary, that's a broken setup otherwise. Phonemes missing from the vocabulary are
/// rare enough that dropping them with a warning beats aborting the whole utterance.
pub fn phonemes_to_ids(table: &VocabularyTable, phonemes: &[char]) -> anyhow::Result<Vec<i64>> {
    let pad = table
        .id(PAD)
        .with_context(|| format!("vocabulary has no pad symbol {PAD:?}"))?;
    let bos = table
        .id(BOS)
        .with_context(|| format!("vocabulary has no beginning-of-sequence symbol {BOS:?}"))?;
    let eos = table
        .id(EOS)
        .with_context(|| format!("vocabulary has no end-of-sequence symbol {EOS:?}"))?;

    let mut ids = Vec::with_capacity(2 * phonemes.len() + 2);
    ids.push(bos);
    for &phoneme in phonemes {
        match table.id(phoneme) {
            Some(id) => {
                ids.push(id);
                ids.push(pad);
            }
            None => warn!("phoneme {:?} not in vocabulary, dropping it", phoneme),
        }
    }
    ids.push(eos);
    Ok(ids)
}
