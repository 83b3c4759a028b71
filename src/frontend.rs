//! The caller-facing boundary of the crate: load resources once, then turn text into
//! per-sentence token ID sequences. The vocabulary table and any loaded rule automata are
//! read-only after construction so a `TtsFrontend` can be shared between threads, the engine
//! serialises itself internally.
use crate::engine::ClauseEngine;
use crate::ids::phonemes_to_ids;
use crate::phonemiser::{phonemize, PhonemizeConfig};
use crate::vocab::VocabularyTable;
use std::path::Path;
use tracing::info;

pub struct TtsFrontend {
    vocab: VocabularyTable,
}

impl TtsFrontend {
    /// Loads the vocabulary and, when the `espeak` feature is on, initialises the phoneme engine
    /// once for the process. `espeak_data_dir` points the engine at a bundled data directory,
    /// `None` uses the system install.
    pub fn initialize(
        vocab_path: impl AsRef<Path>,
        espeak_data_dir: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let vocab = VocabularyTable::open(vocab_path)?;
        info!("vocabulary loaded with {} symbols", vocab.len());

        #[cfg(feature = "espeak")]
        crate::engine::init_espeak(espeak_data_dir)?;
        #[cfg(not(feature = "espeak"))]
        let _ = espeak_data_dir;

        Ok(Self { vocab })
    }

    pub fn vocab(&self) -> &VocabularyTable {
        &self.vocab
    }

    /// Runs the whole pipeline with a caller-provided clause engine
    pub fn text_to_token_ids_with<E: ClauseEngine>(
        &self,
        engine: &mut E,
        text: &str,
        config: &PhonemizeConfig,
    ) -> anyhow::Result<Vec<Vec<i64>>> {
        let sentences = phonemize(engine, text, config)?;
        sentences
            .iter()
            .map(|sentence| phonemes_to_ids(&self.vocab, sentence))
            .collect()
    }

    /// Runs the whole pipeline with the espeak-ng engine and default settings for `voice`
    #[cfg(feature = "espeak")]
    pub fn text_to_token_ids(&self, text: &str, voice: &str) -> anyhow::Result<Vec<Vec<i64>>> {
        let mut engine = crate::engine::EspeakClauseEngine::new()?;
        let config = PhonemizeConfig {
            voice: voice.to_string(),
            ..Default::default()
        };
        self.text_to_token_ids_with(&mut engine, text, &config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedEngine;
    use std::io;

    fn frontend() -> TtsFrontend {
        let vocab = VocabularyTable::from_reader(io::Cursor::new(
            "_ 0\n^ 1\n$ 2\nh 3\ni 4\n. 5\n? 6\n",
        ))
        .unwrap();
        TtsFrontend { vocab }
    }

    #[test]
    fn pipeline_produces_one_id_sequence_per_sentence() {
        let frontend = frontend();
        let mut engine = ScriptedEngine::new();
        let ids = frontend
            .text_to_token_ids_with(&mut engine, "hi. hi?", &PhonemizeConfig::default())
            .unwrap();

        // bos, h, pad, i, pad, punct, pad, eos
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], vec![1, 3, 0, 4, 0, 5, 0, 2]);
        assert_eq!(ids[1], vec![1, 3, 0, 4, 0, 6, 0, 2]);
    }

    #[test]
    fn every_sequence_is_bracketed() {
        let frontend = frontend();
        let mut engine = ScriptedEngine::new();
        let ids = frontend
            .text_to_token_ids_with(&mut engine, "hi there. hi.", &PhonemizeConfig::default())
            .unwrap();
        for sentence in &ids {
            assert_eq!(sentence[0], 1);
            assert_eq!(*sentence.last().unwrap(), 2);
            assert_eq!(sentence.len() % 2, 0);
        }
    }
}
