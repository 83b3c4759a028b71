//! Text normalisation via weighted finite-state transducers. Each rule automaton encodes one
//! independently authored transformation stage (tokenize-and-classify, verbalize, post-process
//! and so on) and a cascade chains them, each stage's output feeding the next stage's input.
//! Keeping the stages as a list means they can be added, reordered or dropped without touching
//! this code.
//!
//! A stage runs in three steps: the input string's bytes become a linear acceptor (n+1 states
//! for n bytes), that acceptor is composed against the rule, and the lowest-weight accepting
//! path of the result is decoded back into bytes. Output labels of zero are how rules delete
//! symbols, so they're dropped during decoding. Anything structurally off, no start state, no
//! path reaching a final state, a branching best path, resolves to the empty string rather than
//! an error, callers must treat the empty string as a valid if degenerate result.
use anyhow::Context;
use rustfst::algorithms::compose::compose;
use rustfst::algorithms::tr_compares::ILabelCompare;
use rustfst::algorithms::{shortest_path, tr_sort};
use rustfst::prelude::*;
use std::fs;
use std::path::Path;
use tracing::warn;

/// A single normalisation stage wrapping one rule automaton
pub struct TextNormaliser {
    rule: VectorFst<TropicalWeight>,
}

impl TextNormaliser {
    pub fn new(mut rule: VectorFst<TropicalWeight>) -> Self {
        // Composition wants one side sorted, the linear acceptor is trivially sorted already so
        // sort the rule by input label once at load time.
        tr_sort(&mut rule, ILabelCompare {});
        Self { rule }
    }

    /// Loads a rule automaton from a serialized FST file (OpenFST binary format)
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let rule = VectorFst::<TropicalWeight>::read(&path)
            .with_context(|| format!("reading rule automaton {}", path.as_ref().display()))?;
        Ok(Self::new(rule))
    }

    /// Runs the rule over `text`. Structural failures degrade to the empty string.
    pub fn normalise(&self, text: &str) -> String {
        match self.best_path(text) {
            Ok(best) => decode_linear(&best, true),
            Err(e) => {
                warn!("normalisation stage failed: {e}");
                String::new()
            }
        }
    }

    fn best_path(&self, text: &str) -> anyhow::Result<VectorFst<TropicalWeight>> {
        let acceptor = byte_acceptor(text)?;
        let composed: VectorFst<TropicalWeight> = compose(acceptor, self.rule.clone())?;
        let best: VectorFst<TropicalWeight> = shortest_path(&composed)?;
        Ok(best)
    }
}

/// Builds the linear acceptor for a string, one arc per byte with identity labels and unit
/// weights.
fn byte_acceptor(text: &str) -> anyhow::Result<VectorFst<TropicalWeight>> {
    let mut fst = VectorFst::new();
    let mut state = fst.add_state();
    fst.set_start(state)?;
    for byte in text.bytes() {
        let next = fst.add_state();
        fst.add_tr(
            state,
            Tr::new(
                byte as Label,
                byte as Label,
                TropicalWeight::one(),
                next,
            ),
        )?;
        state = next;
    }
    fst.set_final(state, TropicalWeight::one())?;
    Ok(fst)
}

/// Walks a best-path automaton from the start state to a final state collecting output labels as
/// bytes. Returns the empty string if the walk ever leaves the single linear chain this should
/// be, or if the collected bytes aren't UTF-8.
fn decode_linear(fst: &VectorFst<TropicalWeight>, remove_output_zero: bool) -> String {
    let mut state = match fst.start() {
        Some(s) => s,
        None => return String::new(),
    };
    let mut bytes = Vec::new();

    loop {
        match fst.final_weight(state) {
            Ok(Some(_)) => break,
            Ok(None) => {}
            Err(_) => return String::new(),
        }
        let trs = match fst.get_trs(state) {
            Ok(trs) => trs,
            Err(_) => return String::new(),
        };
        let trs = trs.trs();
        if trs.len() != 1 {
            // Dead end or a branch, either way not the single linear chain we expect
            return String::new();
        }
        let tr = &trs[0];
        if tr.olabel != 0 || !remove_output_zero {
            bytes.push(tr.olabel as u8);
        }
        state = tr.nextstate;
    }

    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(_) => {
            warn!("rule produced invalid utf-8, dropping stage output");
            String::new()
        }
    }
}

/// An ordered list of normalisation stages
#[derive(Default)]
pub struct NormaliserCascade {
    stages: Vec<TextNormaliser>,
}

impl NormaliserCascade {
    pub fn new(stages: Vec<TextNormaliser>) -> Self {
        Self { stages }
    }

    /// Builds a cascade from a comma-separated list of resource paths. Each entry is either a
    /// serialized FST file or a directory whose `*.fst` files are loaded in lexicographic
    /// order, the order in the string is the cascade order.
    pub fn from_rule_list(rule_list: &str) -> anyhow::Result<Self> {
        let mut stages = Vec::new();
        for entry in rule_list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let path = Path::new(entry);
            if path.is_dir() {
                let mut files: Vec<_> = fs::read_dir(path)
                    .with_context(|| format!("reading rule directory {entry}"))?
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|ext| ext == "fst"))
                    .collect();
                files.sort();
                for file in files {
                    stages.push(TextNormaliser::open(file)?);
                }
            } else {
                stages.push(TextNormaliser::open(path)?);
            }
        }
        Ok(Self { stages })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Chains every stage over `text`. An empty cascade is the identity.
    pub fn normalise(&self, text: &str) -> String {
        let mut text = text.to_string();
        for stage in &self.stages {
            text = stage.normalise(&text);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cyclic single-state rule applying a byte-to-byte mapping over any input
    fn byte_map_rule(map: impl Fn(u8) -> u8) -> VectorFst<TropicalWeight> {
        let mut fst = VectorFst::new();
        let state = fst.add_state();
        fst.set_start(state).unwrap();
        fst.set_final(state, TropicalWeight::one()).unwrap();
        for byte in 1..=255u8 {
            fst.add_tr(
                state,
                Tr::new(
                    byte as Label,
                    map(byte) as Label,
                    TropicalWeight::one(),
                    state,
                ),
            )
            .unwrap();
        }
        fst
    }

    /// Like `byte_map_rule` but mapped-to-zero bytes become epsilon outputs (deletions)
    fn deletion_rule(delete: u8) -> VectorFst<TropicalWeight> {
        let mut fst = VectorFst::new();
        let state = fst.add_state();
        fst.set_start(state).unwrap();
        fst.set_final(state, TropicalWeight::one()).unwrap();
        for byte in 1..=255u8 {
            let olabel = if byte == delete { 0 } else { byte as Label };
            fst.add_tr(
                state,
                Tr::new(byte as Label, olabel, TropicalWeight::one(), state),
            )
            .unwrap();
        }
        fst
    }

    fn uppercase_rule() -> VectorFst<TropicalWeight> {
        byte_map_rule(|b| b.to_ascii_uppercase())
    }

    #[test]
    fn empty_cascade_is_identity() {
        let cascade = NormaliserCascade::default();
        assert_eq!(cascade.normalise("2 plus 2"), "2 plus 2");
        assert!(cascade.is_empty());
    }

    #[test]
    fn rule_rewrites_text() {
        let stage = TextNormaliser::new(uppercase_rule());
        assert_eq!(stage.normalise("hello"), "HELLO");
    }

    #[test]
    fn zero_output_labels_are_deleted() {
        let stage = TextNormaliser::new(deletion_rule(b'x'));
        assert_eq!(stage.normalise("axbxc"), "abc");
    }

    #[test]
    fn no_accepting_path_yields_empty_string() {
        // A rule that only accepts the single byte 'x'
        let mut rule = VectorFst::<TropicalWeight>::new();
        let start = rule.add_state();
        let end = rule.add_state();
        rule.set_start(start).unwrap();
        rule.set_final(end, TropicalWeight::one()).unwrap();
        rule.add_tr(
            start,
            Tr::new(b'x' as Label, b'x' as Label, TropicalWeight::one(), end),
        )
        .unwrap();

        let stage = TextNormaliser::new(rule);
        assert_eq!(stage.normalise("y"), "");
        assert_eq!(stage.normalise("x"), "x");
    }

    #[test]
    fn best_path_picks_the_lowest_weight() {
        let mut rule = VectorFst::<TropicalWeight>::new();
        let start = rule.add_state();
        let end = rule.add_state();
        rule.set_start(start).unwrap();
        rule.set_final(end, TropicalWeight::one()).unwrap();
        rule.add_tr(start, Tr::new(b'a' as Label, b'x' as Label, 1.0, end))
            .unwrap();
        rule.add_tr(start, Tr::new(b'a' as Label, b'y' as Label, 0.5, end))
            .unwrap();

        let stage = TextNormaliser::new(rule);
        assert_eq!(stage.normalise("a"), "y");
    }

    #[test]
    fn cascade_equals_chaining_stages() {
        let r1 = uppercase_rule();
        let r2 = byte_map_rule(|b| if b == b'A' { b'B' } else { b });

        let chained = TextNormaliser::new(r2.clone())
            .normalise(&TextNormaliser::new(r1.clone()).normalise("aba"));
        let cascade = NormaliserCascade::new(vec![TextNormaliser::new(r1), TextNormaliser::new(r2)]);
        assert_eq!(cascade.normalise("aba"), chained);
        assert_eq!(cascade.normalise("aba"), "BBB");
    }

    #[test]
    fn empty_stage_output_propagates() {
        // First stage rejects everything but 'x', second would uppercase. "y" dies at stage one
        // and the empty string flows through untouched.
        let mut strict = VectorFst::<TropicalWeight>::new();
        let start = strict.add_state();
        strict.set_start(start).unwrap();
        strict.set_final(start, TropicalWeight::one()).unwrap();
        strict
            .add_tr(
                start,
                Tr::new(b'x' as Label, b'x' as Label, TropicalWeight::one(), start),
            )
            .unwrap();

        let cascade = NormaliserCascade::new(vec![
            TextNormaliser::new(strict),
            TextNormaliser::new(uppercase_rule()),
        ]);
        assert_eq!(cascade.normalise("y"), "");
    }

    #[test]
    fn rules_survive_a_serialisation_round_trip() {
        let dir = std::env::temp_dir().join("tts-frontend-rule-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("upper.fst");
        uppercase_rule().write(&path).unwrap();

        let cascade = NormaliserCascade::from_rule_list(path.to_str().unwrap()).unwrap();
        assert_eq!(cascade.len(), 1);
        assert_eq!(cascade.normalise("abc"), "ABC");
        fs::remove_dir_all(&dir).ok();
    }
}
