//! The clause engine capability. espeak-ng works clause at a time: every call hands back the
//! phonemes for the next clause plus a terminator code describing the punctuation that ended it
//! and whether the sentence is over. The engine lives behind a trait so the phonemiser can be
//! driven by an in-memory engine in tests and by espeak-ng in production.
//!
//! espeak-ng is a single-instance C library with process-global state. It gets initialised once
//! per process and every call into it is serialised through one mutex, callers never see the
//! lock.
use anyhow::{bail, Result};
use std::collections::VecDeque;

// Clause codes as defined by espeak-ng's translate.h. The low bits carry a pause length, the
// 0x1000 nibble the intonation and the 0x40000/0x80000 bits whether the clause closes a clause
// or a whole sentence.
pub const CLAUSE_INTONATION_FULL_STOP: u32 = 0x0000_0000;
pub const CLAUSE_INTONATION_COMMA: u32 = 0x0000_1000;
pub const CLAUSE_INTONATION_QUESTION: u32 = 0x0000_2000;
pub const CLAUSE_INTONATION_EXCLAMATION: u32 = 0x0000_3000;
pub const CLAUSE_TYPE_CLAUSE: u32 = 0x0004_0000;
pub const CLAUSE_TYPE_SENTENCE: u32 = 0x0008_0000;

pub const CLAUSE_PERIOD: u32 = 40 | CLAUSE_INTONATION_FULL_STOP | CLAUSE_TYPE_SENTENCE;
pub const CLAUSE_COMMA: u32 = 20 | CLAUSE_INTONATION_COMMA | CLAUSE_TYPE_CLAUSE;
pub const CLAUSE_QUESTION: u32 = 40 | CLAUSE_INTONATION_QUESTION | CLAUSE_TYPE_SENTENCE;
pub const CLAUSE_EXCLAMATION: u32 = 45 | CLAUSE_INTONATION_EXCLAMATION | CLAUSE_TYPE_SENTENCE;
pub const CLAUSE_COLON: u32 = 30 | CLAUSE_INTONATION_FULL_STOP | CLAUSE_TYPE_CLAUSE;
pub const CLAUSE_SEMICOLON: u32 = 30 | CLAUSE_INTONATION_COMMA | CLAUSE_TYPE_CLAUSE;
/// Text ran out without trailing punctuation. No punctuation class but it still closes the
/// sentence.
pub const CLAUSE_END_OF_TEXT: u32 = CLAUSE_TYPE_SENTENCE;

/// Opaque terminator code attached to each clause by the engine
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClauseTerminator(pub u32);

/// Punctuation class decoded from a terminator
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClausePunctuation {
    Period,
    Comma,
    Question,
    Exclamation,
    Colon,
    SemiColon,
    None,
}

impl ClauseTerminator {
    /// The punctuation class lives in the low 20 bits of the code
    pub fn punctuation(self) -> ClausePunctuation {
        match self.0 & 0x000f_ffff {
            CLAUSE_PERIOD => ClausePunctuation::Period,
            CLAUSE_COMMA => ClausePunctuation::Comma,
            CLAUSE_QUESTION => ClausePunctuation::Question,
            CLAUSE_EXCLAMATION => ClausePunctuation::Exclamation,
            CLAUSE_COLON => ClausePunctuation::Colon,
            CLAUSE_SEMICOLON => ClausePunctuation::SemiColon,
            _ => ClausePunctuation::None,
        }
    }

    /// Whether the clause also finishes the sentence it belongs to
    pub fn is_sentence_end(self) -> bool {
        self.0 & CLAUSE_TYPE_SENTENCE != 0
    }
}

/// One clause worth of engine output
#[derive(Clone, Debug)]
pub struct Clause {
    /// Raw phoneme text for the clause, still undecomposed
    pub phonemes: String,
    pub terminator: ClauseTerminator,
}

/// The capability the phonemiser needs from a phoneme engine: pick a voice, hand it some text,
/// then pull clauses until the text is exhausted. `set_text` resets the internal cursor that
/// `next_clause` advances.
pub trait ClauseEngine {
    fn set_voice(&mut self, voice: &str) -> Result<()>;
    fn set_text(&mut self, text: &str);
    fn next_clause(&mut self) -> Result<Option<Clause>>;
}

/// Splits text into clauses at punctuation boundaries, attaching the matching terminator code to
/// each. Runs of punctuation collapse into the first mark, and a trailing clause without
/// punctuation gets the end-of-text terminator.
pub fn split_clauses(text: &str) -> Vec<(String, ClauseTerminator)> {
    let mut clauses = Vec::new();
    let mut buffer = String::new();

    for c in text.chars() {
        let code = match c {
            '.' => CLAUSE_PERIOD,
            ',' => CLAUSE_COMMA,
            '?' => CLAUSE_QUESTION,
            '!' => CLAUSE_EXCLAMATION,
            ':' => CLAUSE_COLON,
            ';' => CLAUSE_SEMICOLON,
            _ => {
                buffer.push(c);
                continue;
            }
        };
        if !buffer.trim().is_empty() {
            clauses.push((buffer.trim().to_string(), ClauseTerminator(code)));
        }
        buffer.clear();
    }
    if !buffer.trim().is_empty() {
        clauses.push((
            buffer.trim().to_string(),
            ClauseTerminator(CLAUSE_END_OF_TEXT),
        ));
    }
    clauses
}

/// In-memory engine whose "phonemes" are the clause text itself. Used by the tests and handy for
/// exercising the pipeline on machines without espeak-ng.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    queue: VecDeque<Clause>,
    known_voices: Option<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the voices `set_voice` will accept, any voice is selectable otherwise
    pub fn with_voices(voices: &[&str]) -> Self {
        Self {
            queue: VecDeque::new(),
            known_voices: Some(voices.iter().map(|v| v.to_string()).collect()),
        }
    }
}

impl ClauseEngine for ScriptedEngine {
    fn set_voice(&mut self, voice: &str) -> Result<()> {
        match &self.known_voices {
            Some(known) if !known.iter().any(|v| v == voice) => {
                bail!("voice {voice:?} not found")
            }
            _ => Ok(()),
        }
    }

    fn set_text(&mut self, text: &str) {
        self.queue = split_clauses(text)
            .into_iter()
            .map(|(phonemes, terminator)| Clause {
                phonemes,
                terminator,
            })
            .collect();
    }

    fn next_clause(&mut self) -> Result<Option<Clause>> {
        Ok(self.queue.pop_front())
    }
}

#[cfg(feature = "espeak")]
mod espeak {
    use super::*;
    use anyhow::anyhow;
    use once_cell::sync::{Lazy, OnceCell};
    use std::path::Path;
    use std::sync::Mutex;

    /// espeak-ng holds non-reentrant global state, every call into it goes through here
    static ESPEAK_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
    static ESPEAK_INIT: OnceCell<()> = OnceCell::new();

    /// One-time process-wide engine initialisation. Runs a probe phonemisation so a missing or
    /// broken espeak-ng install is caught at startup instead of on the first real utterance.
    pub fn init_espeak(data_dir: Option<&Path>) -> Result<()> {
        ESPEAK_INIT
            .get_or_try_init(|| {
                if let Some(dir) = data_dir {
                    std::env::set_var("ESPEAK_DATA_PATH", dir);
                }
                let _guard = ESPEAK_MUTEX
                    .lock()
                    .map_err(|_| anyhow!("espeak mutex poisoned"))?;
                espeak_rs::text_to_phonemes("init", "en-us", None, true, false)
                    .map_err(|e| anyhow!("failed to initialise espeak-ng: {e}"))?;
                Ok(())
            })
            .map(|_| ())
    }

    /// Clause engine backed by espeak-ng. Clause boundaries are found on the text side and each
    /// clause is phonemised separately so the terminator codes stay attached to their clauses.
    pub struct EspeakClauseEngine {
        voice: String,
        queue: VecDeque<(String, ClauseTerminator)>,
    }

    impl EspeakClauseEngine {
        pub fn new() -> Result<Self> {
            init_espeak(None)?;
            Ok(Self {
                voice: "en-us".to_string(),
                queue: VecDeque::new(),
            })
        }
    }

    impl ClauseEngine for EspeakClauseEngine {
        fn set_voice(&mut self, voice: &str) -> Result<()> {
            let _guard = ESPEAK_MUTEX
                .lock()
                .map_err(|_| anyhow!("espeak mutex poisoned"))?;
            // Probe with a throwaway phonemisation, it's the only way espeak-rs reports an
            // unknown voice.
            espeak_rs::text_to_phonemes("a", voice, None, true, false)
                .map_err(|e| anyhow!("voice {voice:?} not found: {e}"))?;
            self.voice = voice.to_string();
            Ok(())
        }

        fn set_text(&mut self, text: &str) {
            self.queue = split_clauses(text).into();
        }

        fn next_clause(&mut self) -> Result<Option<Clause>> {
            let (text, terminator) = match self.queue.pop_front() {
                Some(clause) => clause,
                None => return Ok(None),
            };
            let _guard = ESPEAK_MUTEX
                .lock()
                .map_err(|_| anyhow!("espeak mutex poisoned"))?;
            let phonemes = espeak_rs::text_to_phonemes(&text, &self.voice, None, true, false)
                .map_err(|e| anyhow!("espeak-ng failed on clause {text:?}: {e}"))?
                .join("");
            Ok(Some(Clause {
                phonemes,
                terminator,
            }))
        }
    }
}

#[cfg(feature = "espeak")]
pub use espeak::{init_espeak, EspeakClauseEngine};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_decodes_punctuation_class() {
        assert_eq!(
            ClauseTerminator(CLAUSE_PERIOD).punctuation(),
            ClausePunctuation::Period
        );
        assert_eq!(
            ClauseTerminator(CLAUSE_COMMA).punctuation(),
            ClausePunctuation::Comma
        );
        assert_eq!(
            ClauseTerminator(CLAUSE_QUESTION).punctuation(),
            ClausePunctuation::Question
        );
        assert_eq!(
            ClauseTerminator(CLAUSE_EXCLAMATION).punctuation(),
            ClausePunctuation::Exclamation
        );
        assert_eq!(
            ClauseTerminator(CLAUSE_COLON).punctuation(),
            ClausePunctuation::Colon
        );
        assert_eq!(
            ClauseTerminator(CLAUSE_SEMICOLON).punctuation(),
            ClausePunctuation::SemiColon
        );
        assert_eq!(
            ClauseTerminator(CLAUSE_END_OF_TEXT).punctuation(),
            ClausePunctuation::None
        );
    }

    #[test]
    fn terminator_only_looks_at_low_bits() {
        // High bits carry unrelated engine state and must not change the class
        let code = ClauseTerminator(CLAUSE_QUESTION | 0xfff0_0000);
        assert_eq!(code.punctuation(), ClausePunctuation::Question);
        assert!(code.is_sentence_end());
    }

    #[test]
    fn sentence_bit() {
        assert!(ClauseTerminator(CLAUSE_PERIOD).is_sentence_end());
        assert!(ClauseTerminator(CLAUSE_EXCLAMATION).is_sentence_end());
        assert!(!ClauseTerminator(CLAUSE_COMMA).is_sentence_end());
        assert!(!ClauseTerminator(CLAUSE_SEMICOLON).is_sentence_end());
    }

    #[test]
    fn clause_splitting() {
        let clauses = split_clauses("Hello. How are you?");
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].0, "Hello");
        assert_eq!(clauses[0].1, ClauseTerminator(CLAUSE_PERIOD));
        assert_eq!(clauses[1].0, "How are you");
        assert_eq!(clauses[1].1, ClauseTerminator(CLAUSE_QUESTION));
    }

    #[test]
    fn unpunctuated_tail_closes_the_sentence() {
        let clauses = split_clauses("red, green");
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].1, ClauseTerminator(CLAUSE_COMMA));
        assert_eq!(clauses[1].0, "green");
        assert!(clauses[1].1.is_sentence_end());
        assert_eq!(clauses[1].1.punctuation(), ClausePunctuation::None);
    }

    #[test]
    fn punctuation_runs_collapse() {
        let clauses = split_clauses("Wow!! Really?");
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].0, "Wow");
        assert_eq!(clauses[0].1, ClauseTerminator(CLAUSE_EXCLAMATION));
        assert_eq!(clauses[1].0, "Really");
    }

    #[test]
    fn empty_text_yields_no_clauses() {
        assert!(split_clauses("").is_empty());
        assert!(split_clauses("   ").is_empty());
    }

    #[test]
    fn scripted_engine_respects_known_voices() {
        let mut engine = ScriptedEngine::with_voices(&["en-us"]);
        assert!(engine.set_voice("en-us").is_ok());
        assert!(engine.set_voice("xx").is_err());
    }
}
