//! Synthesize stage: dialogue script to a stitched audio track.
//!
//! Each script line is cleaned, split at sentence boundaries, and sent
//! to the TTS engine assigned to its role. Segments are synthesized
//! concurrently, then stitched in order with a fixed pause between them.
//! Segment durations drive the caption timeline, so the SRT and caption
//! JSON written next to the audio stay in sync with what was spoken.

use super::{retry_transient, StageAdapter};
use crate::config::{RoleVoice, Settings};
use crate::error::{RecastError, Result};
use crate::media;
use crate::script::{
    build_srt, clean_for_tts, is_speakable, parse_script, split_sentences, Caption, CaptionTrack,
    Role,
};
use crate::task::{Stage, StageOutput, Task};
use crate::tts::{self, TextToSpeech};
use async_trait::async_trait;
use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

/// One sentence-level chunk queued for synthesis.
struct Segment {
    role: Role,
    text: String,
}

/// Converts the dialogue script into the final podcast audio plus
/// subtitle artifacts.
pub struct SynthesizeAdapter {
    settings: Settings,
}

impl SynthesizeAdapter {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    fn role_voice(&self, role: Role) -> &RoleVoice {
        match role {
            Role::Host => &self.settings.synthesize.host,
            Role::Guest => &self.settings.synthesize.guest,
        }
    }

    fn segments(script: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        for line in parse_script(script) {
            let cleaned = clean_for_tts(&line.content);
            for sentence in split_sentences(&cleaned) {
                if is_speakable(&sentence) {
                    segments.push(Segment {
                        role: line.role,
                        text: sentence,
                    });
                }
            }
        }
        segments
    }

    /// Build one TTS engine per role.
    fn engines(&self) -> Result<(Arc<dyn TextToSpeech>, Arc<dyn TextToSpeech>)> {
        let host = tts::create_engine(self.settings.synthesize.host.engine, &self.settings)?;
        let guest = tts::create_engine(self.settings.synthesize.guest.engine, &self.settings)?;
        Ok((host, guest))
    }

    async fn synthesize_segments(
        &self,
        segments: &[Segment],
        work_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let (host_engine, guest_engine) = self.engines()?;

        let pb = ProgressBar::new(segments.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message("Synthesizing dialogue");

        let mut stream = stream::iter(segments.iter().enumerate())
            .map(|(idx, segment)| {
                let engine = match segment.role {
                    Role::Host => host_engine.clone(),
                    Role::Guest => guest_engine.clone(),
                };
                let voice = self.role_voice(segment.role).clone();
                let path = work_dir.join(format!("seg_{:04}.mp3", idx));
                let retry = self.settings.retry;
                async move {
                    let result = retry_transient(&retry, || {
                        engine.synthesize(&segment.text, &voice.voice, voice.rate, &path)
                    })
                    .await;
                    (idx, path, result)
                }
                .boxed()
            })
            .buffer_unordered(self.settings.synthesize.max_concurrent)
            .boxed();

        let mut paths: Vec<(usize, PathBuf)> = Vec::with_capacity(segments.len());
        while let Some((idx, path, result)) = stream.next().await {
            pb.inc(1);
            if let Err(e) = result {
                pb.finish_and_clear();
                return Err(e);
            }
            paths.push((idx, path));
        }
        pb.finish_and_clear();

        // Restore script order after unordered completion.
        paths.sort_by_key(|(idx, _)| *idx);
        Ok(paths.into_iter().map(|(_, p)| p).collect())
    }

    /// Measure each segment and lay the caption timeline, inserting the
    /// configured pause between segments.
    async fn build_timeline(
        &self,
        segments: &[Segment],
        paths: &[PathBuf],
    ) -> Result<Vec<Caption>> {
        let pause = self.settings.synthesize.pause_ms;
        let mut captions = Vec::with_capacity(segments.len());
        let mut clock_ms: u64 = 0;

        for (segment, path) in segments.iter().zip(paths) {
            let duration_ms = (media::probe_duration(path).await? * 1000.0).round() as u64;
            captions.push(Caption {
                start: clock_ms,
                end: clock_ms + duration_ms,
                content: segment.text.clone(),
                role: segment.role,
            });
            clock_ms += duration_ms + pause;
        }

        Ok(captions)
    }
}

#[async_trait]
impl StageAdapter for SynthesizeAdapter {
    fn stage(&self) -> Stage {
        Stage::Synthesized
    }

    #[instrument(skip_all, fields(task_id = %task.id))]
    async fn run(&self, task: &Task) -> Result<StageOutput> {
        let script = task.script.as_deref().ok_or_else(|| {
            RecastError::Unrecoverable("Synthesize stage requires a dialogue script".into())
        })?;

        let segments = Self::segments(script);
        if segments.is_empty() {
            return Err(RecastError::InvalidInput(
                "Script contains no speakable lines".into(),
            ));
        }
        info!("Synthesizing {} dialogue segments", segments.len());

        std::fs::create_dir_all(self.settings.temp_dir())?;
        let work_dir = tempfile::tempdir_in(self.settings.temp_dir())?;

        let paths = self.synthesize_segments(&segments, work_dir.path()).await?;
        let captions = self.build_timeline(&segments, &paths).await?;

        // Interleave a shared silence file between the spoken segments.
        let pause = self.settings.synthesize.pause_ms;
        let mut parts = Vec::with_capacity(paths.len() * 2);
        let silence = work_dir.path().join("pause.mp3");
        if pause > 0 && paths.len() > 1 {
            media::make_silence(&silence, pause).await?;
        }
        for (i, path) in paths.iter().enumerate() {
            if i > 0 && pause > 0 {
                parts.push(silence.clone());
            }
            parts.push(path.clone());
        }

        let out_dir = self.settings.data_dir().join("tasks").join(task.id.to_string());
        std::fs::create_dir_all(&out_dir)?;
        let audio_path = out_dir.join("podcast_audio.mp3");
        media::concat_audio(&parts, &audio_path).await?;

        let total_seconds = captions.last().map(|c| c.end as f64 / 1000.0).unwrap_or(0.0);
        std::fs::write(audio_path.with_extension("srt"), build_srt(&captions))?;
        let track = CaptionTrack {
            captions,
            duration_in_seconds: total_seconds,
        };
        std::fs::write(
            audio_path.with_extension("captions.json"),
            serde_json::to_string_pretty(&track)?,
        )?;

        drop(work_dir);

        info!("Stitched {:.1}s dialogue track at {:?}", total_seconds, audio_path);

        Ok(StageOutput {
            audio_path: Some(audio_path),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AsrEngine, RenderEngine};

    #[test]
    fn test_segments_split_and_filter() {
        let script = "Host: 大家好。欢迎收听！\nGuest: (clears throat) Thanks!\nGuest: (笑)";
        let segments = SynthesizeAdapter::segments(script);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].role, Role::Host);
        assert_eq!(segments[0].text, "大家好。");
        assert_eq!(segments[1].text, "欢迎收听！");
        assert_eq!(segments[2].role, Role::Guest);
        assert_eq!(segments[2].text, "Thanks!");
    }

    #[tokio::test]
    async fn test_empty_script_is_invalid_input() {
        let adapter = SynthesizeAdapter::new(Settings::default());
        let mut task = Task::new("src", "t", AsrEngine::DashScope, RenderEngine::Mux);
        task.script = Some("(笑)\n(pause)".to_string());
        let err = adapter.run(&task).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }
}
