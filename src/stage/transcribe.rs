//! Transcribe stage: turn the downloaded audio into raw text.

use super::{retry_transient, StageAdapter};
use crate::asr;
use crate::config::Settings;
use crate::error::{RecastError, Result};
use crate::task::{Stage, StageOutput, Task};
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, instrument};

/// Runs the ASR engine recorded on the task against its media file.
///
/// Submission happens in [`StageAdapter::prepare`] so the remote task id
/// is saved before polling starts; a poll interrupted by a crash or
/// timeout resumes the same remote task on the next attempt.
pub struct TranscribeAdapter {
    settings: Settings,
}

impl TranscribeAdapter {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    fn media_path<'t>(&self, task: &'t Task) -> Result<&'t Path> {
        let media_path = task.media_path.as_deref().ok_or_else(|| {
            RecastError::Unrecoverable("Transcribe stage requires a downloaded media file".into())
        })?;
        if !media_path.exists() {
            return Err(RecastError::Unrecoverable(format!(
                "Media file missing from disk: {}",
                media_path.display()
            )));
        }
        Ok(media_path)
    }
}

#[async_trait]
impl StageAdapter for TranscribeAdapter {
    fn stage(&self) -> Stage {
        Stage::Transcribed
    }

    /// Submit the remote transcription task, if one is not already
    /// running. The returned id is checkpointed by the controller.
    async fn prepare(&self, task: &Task) -> Result<StageOutput> {
        if task.asr_task_id.is_some() {
            return Ok(StageOutput::default());
        }

        let media_path = self.media_path(task)?;
        let engine = asr::create_engine(task.asr_engine, &self.settings)?;
        let remote_task_id =
            retry_transient(&self.settings.retry, || engine.submit(media_path)).await?;

        Ok(StageOutput {
            asr_task_id: remote_task_id,
            ..Default::default()
        })
    }

    #[instrument(skip_all, fields(task_id = %task.id, engine = %task.asr_engine))]
    async fn run(&self, task: &Task) -> Result<StageOutput> {
        let media_path = self.media_path(task)?;
        let engine = asr::create_engine(task.asr_engine, &self.settings)?;
        let resume_id = task.asr_task_id.as_deref();

        let text = retry_transient(&self.settings.retry, || {
            engine.fetch(media_path, resume_id)
        })
        .await?;

        if text.trim().is_empty() {
            return Err(RecastError::InvalidInput(
                "Transcription produced no text (silent or unintelligible audio)".into(),
            ));
        }

        info!("Transcribed {} characters", text.chars().count());

        Ok(StageOutput {
            transcript: Some(text),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AsrEngine, RenderEngine};

    #[tokio::test]
    async fn test_requires_media_path() {
        let adapter = TranscribeAdapter::new(Settings::default());
        let task = Task::new("src.mp4", "t", AsrEngine::DashScope, RenderEngine::Mux);
        let err = adapter.run(&task).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Unrecoverable);
    }

    #[tokio::test]
    async fn test_prepare_skips_resubmission_when_id_present() {
        let adapter = TranscribeAdapter::new(Settings::default());
        let mut task = Task::new("src.mp4", "t", AsrEngine::Volc, RenderEngine::Mux);
        task.asr_task_id = Some("req-1|log-1".into());

        // No media file and no credentials are needed: an existing remote
        // task id short-circuits submission entirely.
        let output = adapter.prepare(&task).await.unwrap();
        assert!(output.is_empty());
    }
}
