//! Download stage: acquire the source media as a local audio file.

use super::{retry_transient, StageAdapter};
use crate::config::Settings;
use crate::error::{RecastError, Result};
use crate::media;
use crate::task::{Stage, StageOutput, Task};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, instrument};
use url::Url;

/// Fetches the task's source (remote URL via yt-dlp, or local file) and
/// normalizes it to an MP3 under the task's artifact directory.
pub struct DownloadAdapter {
    settings: Settings,
}

impl DownloadAdapter {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    fn task_dir(&self, task: &Task) -> PathBuf {
        self.settings.data_dir().join("tasks").join(task.id.to_string())
    }

    fn is_remote(source: &str) -> bool {
        Url::parse(source)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    async fn fetch_remote(&self, task: &Task) -> Result<PathBuf> {
        let dir = self.task_dir(task);
        retry_transient(&self.settings.retry, || {
            media::download_audio(&task.source, "source_audio", &dir)
        })
        .await
    }

    async fn import_local(&self, task: &Task) -> Result<PathBuf> {
        let source = PathBuf::from(&task.source);
        if !source.exists() {
            return Err(RecastError::InvalidInput(format!(
                "Source file not found: {}",
                source.display()
            )));
        }
        if !media::has_audio_stream(&source).await? {
            return Err(RecastError::InvalidInput(format!(
                "Source has no audio stream: {}",
                source.display()
            )));
        }

        let dir = self.task_dir(task);
        std::fs::create_dir_all(&dir)?;
        let dest = dir.join("source_audio.mp3");
        media::extract_audio(&source, &dest).await?;
        Ok(dest)
    }
}

#[async_trait]
impl StageAdapter for DownloadAdapter {
    fn stage(&self) -> Stage {
        Stage::Downloaded
    }

    #[instrument(skip_all, fields(task_id = %task.id))]
    async fn run(&self, task: &Task) -> Result<StageOutput> {
        let media_path = if Self::is_remote(&task.source) {
            self.fetch_remote(task).await?
        } else {
            self.import_local(task).await?
        };

        let duration = media::probe_duration(&media_path).await?;
        let max = self.settings.download.max_duration_seconds as f64;
        if duration > max {
            return Err(RecastError::InvalidInput(format!(
                "Media is {:.0}s long, exceeding the {:.0}s limit",
                duration, max
            )));
        }

        info!("Acquired {:.0}s of audio at {:?}", duration, media_path);

        Ok(StageOutput {
            media_path: Some(media_path),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_detection() {
        assert!(DownloadAdapter::is_remote("https://www.bilibili.com/video/BV1x"));
        assert!(DownloadAdapter::is_remote("http://example.com/a.mp4"));
        assert!(!DownloadAdapter::is_remote("/home/user/lecture.mp4"));
        assert!(!DownloadAdapter::is_remote("relative/clip.mov"));
        // file:// is not a download source
        assert!(!DownloadAdapter::is_remote("file:///tmp/a.mp4"));
    }

    #[tokio::test]
    async fn test_missing_local_file_is_invalid_input() {
        let adapter = DownloadAdapter::new(Settings::default());
        let task = Task::new(
            "/nonexistent/clip.mp4",
            "missing",
            crate::config::AsrEngine::DashScope,
            crate::config::RenderEngine::Mux,
        );
        let err = adapter.run(&task).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }
}
