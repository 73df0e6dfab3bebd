//! Text-to-speech engine abstraction.
//!
//! Engines synthesize one text chunk into one MP3 file; stitching the
//! chunks into the dialogue track is the synthesize stage's job.

mod edge;
mod volc;

pub use edge::EdgeTts;
pub use volc::VolcTts;

use crate::config::{Settings, TtsEngine};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Trait for text-to-speech engines.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text` with the given voice into an MP3 at `output`.
    ///
    /// `rate` is a speed multiplier (1.0 = normal).
    async fn synthesize(&self, text: &str, voice: &str, rate: f32, output: &Path) -> Result<()>;
}

/// Build the engine named by the selector from settings.
pub fn create_engine(engine: TtsEngine, settings: &Settings) -> Result<Arc<dyn TextToSpeech>> {
    match engine {
        TtsEngine::Edge => Ok(Arc::new(EdgeTts::new())),
        TtsEngine::Volc => Ok(Arc::new(VolcTts::new(&settings.volc)?)),
    }
}
