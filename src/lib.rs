//! Text front-end for speech synthesis: normalises raw text through a cascade of weighted
//! finite-state transducers, phonemises it clause by clause and encodes each sentence's
//! phonemes as the token IDs a synthesis model consumes.
use std::env;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::{Layer, Registry};

pub mod engine;
pub mod frontend;
pub mod ids;
pub mod normaliser;
pub mod phonemiser;
pub mod vocab;

pub fn setup_logging() {
    let filter = match env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_env("RUST_LOG"),
        _ => EnvFilter::new("tts_frontend=info,app=info"),
    };

    let fmt = tracing_subscriber::fmt::Layer::default();

    let subscriber = filter.and_then(fmt).with_subscriber(Registry::default());

    tracing::subscriber::set_global_default(subscriber).unwrap();
}
