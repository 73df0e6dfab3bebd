//! Speech-to-text engine abstraction.
//!
//! Two engines are supported: Alibaba DashScope (synchronous,
//! OpenAI-compatible chat API with inline audio) and Volcengine
//! (asynchronous submit-then-poll). The engine is selected once at task
//! submission and stored on the task.
//!
//! Submission and retrieval are separate calls so the remote task id of
//! an asynchronous engine can be persisted before polling starts; an
//! interrupted poll then resumes the same remote task instead of paying
//! for a second submission.

mod dashscope;
mod volc;

pub use dashscope::DashScopeAsr;
pub use volc::VolcAsr;

use crate::config::{AsrEngine, Settings};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Trait for speech-to-text engines.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Start transcription.
    ///
    /// Returns the remote task id for engines that run asynchronously;
    /// synchronous engines return `None` and do all their work in
    /// [`SpeechToText::fetch`].
    async fn submit(&self, audio_path: &Path) -> Result<Option<String>>;

    /// Produce the transcript.
    ///
    /// `remote_task_id` continues an already-submitted remote task;
    /// synchronous engines ignore it.
    async fn fetch(&self, audio_path: &Path, remote_task_id: Option<&str>) -> Result<String>;
}

/// Build the engine named by the selector from settings.
pub fn create_engine(engine: AsrEngine, settings: &Settings) -> Result<Arc<dyn SpeechToText>> {
    match engine {
        AsrEngine::DashScope => Ok(Arc::new(DashScopeAsr::new(&settings.transcribe)?)),
        AsrEngine::Volc => Ok(Arc::new(VolcAsr::new(
            &settings.volc,
            &settings.transcribe,
        )?)),
    }
}
