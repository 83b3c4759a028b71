//! Drives a clause engine over some input text and assembles per-sentence phoneme sequences.
//! Phonemes here are unicode scalar values, the engine's raw output is decomposed (NFD) first so
//! a composed character arrives as its base character plus combining marks and each scalar can
//! be looked up in the vocabulary on its own.
//!
//! Three transformations happen on the way from clause to sentence: an optional per-voice
//! phoneme substitution map, stripping of inline language-switch markers like `(en)` that
//! espeak-ng injects when a voice falls back to another language mid-text, and punctuation
//! injection driven by the clause terminator. Sentence-ending punctuation appends just the
//! punctuation phoneme, clause-internal punctuation appends the punctuation phoneme and then a
//! space since the sentence keeps going.
use crate::engine::{ClauseEngine, ClausePunctuation};
use anyhow::Result;
use std::collections::BTreeMap;
use unicode_normalization::UnicodeNormalization;

/// A phoneme is one unicode scalar value
pub type Phoneme = char;

/// Substitution table replacing one phoneme with zero or more others
pub type PhonemeMap = BTreeMap<Phoneme, Vec<Phoneme>>;

/// Per-call phonemisation settings
#[derive(Clone, Debug)]
pub struct PhonemizeConfig {
    /// Voice identifier handed to the engine
    pub voice: String,
    pub period: Phoneme,
    pub comma: Phoneme,
    pub question: Phoneme,
    pub exclamation: Phoneme,
    pub colon: Phoneme,
    pub semicolon: Phoneme,
    pub space: Phoneme,
    /// Keep inline language-switch markers like `(en)` instead of stripping them
    pub keep_language_flags: bool,
    /// Overrides the built-in per-voice substitution table when set
    pub phoneme_map: Option<PhonemeMap>,
}

impl Default for PhonemizeConfig {
    fn default() -> Self {
        Self {
            voice: "en-us".to_string(),
            period: '.',
            comma: ',',
            question: '?',
            exclamation: '!',
            colon: ':',
            semicolon: ';',
            space: ' ',
            keep_language_flags: false,
            phoneme_map: None,
        }
    }
}

/// Built-in substitutions for voices whose espeak output doesn't line up with the trained
/// vocabulary. Brazilian Portuguese emits a "c" the models were never trained on.
fn default_phoneme_map(voice: &str) -> Option<PhonemeMap> {
    match voice {
        "pt-br" => {
            let mut map = PhonemeMap::new();
            map.insert('c', vec!['k']);
            Some(map)
        }
        _ => None,
    }
}

/// Phonemises `text`, returning one phoneme sequence per detected sentence. Clauses accumulate
/// into the same sentence until a terminator with the sentence bit arrives, so a comma-separated
/// list stays one sentence while "Hello. Bye." becomes two.
pub fn phonemize<E: ClauseEngine>(
    engine: &mut E,
    text: &str,
    config: &PhonemizeConfig,
) -> Result<Vec<Vec<Phoneme>>> {
    let map = config
        .phoneme_map
        .clone()
        .or_else(|| default_phoneme_map(&config.voice));

    engine.set_voice(&config.voice)?;
    engine.set_text(text);

    let mut sentences = Vec::new();
    let mut current: Vec<Phoneme> = Vec::new();
    // Not reset at sentence boundaries, a language switch can span clauses
    let mut in_language_flag = false;

    while let Some(clause) = engine.next_clause()? {
        for phoneme in clause.phonemes.nfd() {
            match map.as_ref().and_then(|m| m.get(&phoneme)) {
                Some(replacements) => {
                    for &replacement in replacements {
                        push_phoneme(&mut current, replacement, config, &mut in_language_flag);
                    }
                }
                None => push_phoneme(&mut current, phoneme, config, &mut in_language_flag),
            }
        }

        match clause.terminator.punctuation() {
            ClausePunctuation::Period => current.push(config.period),
            ClausePunctuation::Question => current.push(config.question),
            ClausePunctuation::Exclamation => current.push(config.exclamation),
            ClausePunctuation::Comma => {
                current.push(config.comma);
                current.push(config.space);
            }
            ClausePunctuation::Colon => {
                current.push(config.colon);
                current.push(config.space);
            }
            ClausePunctuation::SemiColon => {
                current.push(config.semicolon);
                current.push(config.space);
            }
            ClausePunctuation::None => {}
        }

        if clause.terminator.is_sentence_end() && !current.is_empty() {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }

    Ok(sentences)
}

/// Appends a phoneme to the sentence buffer, running the language-flag state machine on the way.
/// `(` opens a flag and everything up to the matching `)` is suppressed.
fn push_phoneme(
    buffer: &mut Vec<Phoneme>,
    phoneme: Phoneme,
    config: &PhonemizeConfig,
    in_language_flag: &mut bool,
) {
    if config.keep_language_flags {
        buffer.push(phoneme);
        return;
    }
    match phoneme {
        '(' if !*in_language_flag => *in_language_flag = true,
        ')' if *in_language_flag => *in_language_flag = false,
        _ if *in_language_flag => {}
        _ => buffer.push(phoneme),
    }
}
