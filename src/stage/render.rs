//! Render stage: dialogue audio to the final video.
//!
//! Two engines: a fast ffmpeg mux (still cover image, burned-in
//! subtitles) and an animated Remotion render driven by the caption
//! track JSON written during synthesis.

use super::StageAdapter;
use crate::config::{RenderEngine, Settings};
use crate::error::{RecastError, Result};
use crate::media;
use crate::task::{Stage, StageOutput, Task};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, instrument};

pub struct RenderAdapter {
    settings: Settings,
}

impl RenderAdapter {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    async fn render_mux(&self, audio: &Path, dest: &Path) -> Result<()> {
        let cover = self
            .settings
            .render
            .cover_image
            .as_deref()
            .map(Settings::expand_path);
        if let Some(img) = &cover {
            if !img.exists() {
                return Err(RecastError::InvalidInput(format!(
                    "Cover image not found: {}",
                    img.display()
                )));
            }
        }

        let srt = audio.with_extension("srt");
        let subtitles = srt.exists().then_some(srt.as_path());

        media::mux_still_video(cover.as_deref(), audio, subtitles, dest).await
    }

    async fn render_animated(&self, audio: &Path, dest: &Path) -> Result<()> {
        let captions = audio.with_extension("captions.json");
        if !captions.exists() {
            return Err(RecastError::Unrecoverable(format!(
                "Caption track missing: {}",
                captions.display()
            )));
        }

        let project = Settings::expand_path(&self.settings.render.remotion_project);
        if !project.exists() {
            return Err(RecastError::Config(format!(
                "Remotion project directory not found: {}",
                project.display()
            )));
        }

        let props = serde_json::json!({
            "audioPath": audio.to_string_lossy(),
            "captionsPath": captions.to_string_lossy(),
        });

        let result = Command::new("npx")
            .arg("remotion")
            .arg("render")
            .arg(&self.settings.render.composition)
            .arg("--props").arg(props.to_string())
            .arg("--output").arg(dest)
            .current_dir(&project)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let out = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RecastError::ToolNotFound("npx".into()));
            }
            Err(e) => {
                return Err(RecastError::Unrecoverable(format!(
                    "Remotion render failed to start: {e}"
                )));
            }
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(RecastError::Unrecoverable(format!(
                "Remotion render failed: {stderr}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StageAdapter for RenderAdapter {
    fn stage(&self) -> Stage {
        Stage::Rendered
    }

    #[instrument(skip_all, fields(task_id = %task.id, engine = %task.render_engine))]
    async fn run(&self, task: &Task) -> Result<StageOutput> {
        let audio = task.audio_path.as_deref().ok_or_else(|| {
            RecastError::Unrecoverable("Render stage requires a synthesized audio track".into())
        })?;
        if !audio.exists() {
            return Err(RecastError::Unrecoverable(format!(
                "Audio track missing from disk: {}",
                audio.display()
            )));
        }

        let out_dir: PathBuf = self.settings.data_dir().join("tasks").join(task.id.to_string());
        std::fs::create_dir_all(&out_dir)?;
        let video_path = out_dir.join("podcast_video.mp4");

        match task.render_engine {
            RenderEngine::Mux => self.render_mux(audio, &video_path).await?,
            RenderEngine::Animated => self.render_animated(audio, &video_path).await?,
        }

        info!("Rendered video at {:?}", video_path);

        Ok(StageOutput {
            video_path: Some(video_path),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AsrEngine, RenderEngine};

    #[tokio::test]
    async fn test_requires_audio_path() {
        let adapter = RenderAdapter::new(Settings::default());
        let task = Task::new("src", "t", AsrEngine::DashScope, RenderEngine::Mux);
        let err = adapter.run(&task).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Unrecoverable);
    }
}
