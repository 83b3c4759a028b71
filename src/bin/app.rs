use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tts_frontend::frontend::TtsFrontend;
use tts_frontend::normaliser::NormaliserCascade;
#[cfg(not(feature = "espeak"))]
use tts_frontend::phonemiser::PhonemizeConfig;

#[derive(Parser, Debug)]
pub struct Args {
    /// Text to turn into synthesis-ready token IDs
    #[clap(long, short)]
    input: String,
    /// Voice passed to the phoneme engine
    #[clap(long, default_value = "en-us")]
    voice: String,
    /// Path to the token vocabulary file
    #[clap(long, default_value = "./models/tokens.txt")]
    vocab: PathBuf,
    /// espeak-ng data directory, uses the system install when unset
    #[clap(long)]
    espeak_data: Option<PathBuf>,
    /// Comma separated list of serialized rule automata to normalise with before phonemising
    #[clap(long)]
    rules: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tts_frontend::setup_logging();
    let args = Args::parse();

    let text = match &args.rules {
        Some(rules) => {
            let cascade = NormaliserCascade::from_rule_list(rules)?;
            let normalised = cascade.normalise(&args.input);
            info!("normalised text: {:?}", normalised);
            normalised
        }
        None => args.input.clone(),
    };

    let frontend = TtsFrontend::initialize(&args.vocab, args.espeak_data.as_deref())?;

    #[cfg(feature = "espeak")]
    let token_ids = frontend.text_to_token_ids(&text, &args.voice)?;

    #[cfg(not(feature = "espeak"))]
    let token_ids = {
        // No engine built in, fall back to the scripted one so the pipeline can still be poked
        // at. Rebuild with --features espeak for real phonemes.
        let mut engine = tts_frontend::engine::ScriptedEngine::new();
        let config = PhonemizeConfig {
            voice: args.voice.clone(),
            ..Default::default()
        };
        frontend.text_to_token_ids_with(&mut engine, &text, &config)?
    };

    for (i, sentence) in token_ids.iter().enumerate() {
        println!("sentence {}: {:?}", i, sentence);
    }
    Ok(())
}
