//! Generate command implementation.

use crate::cli::Output;
use crate::config::{AsrEngine, RenderEngine, Settings};
use crate::pipeline::Pipeline;
use crate::task::NewTask;
use anyhow::Result;

/// Run the generate command: create a task and drive it to completion.
pub async fn run_generate(
    source: &str,
    name: Option<String>,
    asr_engine: Option<AsrEngine>,
    render_engine: Option<RenderEngine>,
    settings: Settings,
) -> Result<()> {
    let pipeline = Pipeline::new(&settings)?;

    let name = name.unwrap_or_else(|| derive_name(source));
    let new = NewTask {
        source: source.to_string(),
        name: name.clone(),
        asr_engine: asr_engine.unwrap_or(settings.transcribe.engine),
        render_engine: render_engine.unwrap_or(settings.render.engine),
    };

    let mut task = pipeline.submit(new).await?;
    Output::info(&format!("Created task {} ('{}')", task.id, name));

    match pipeline.run_to_completion(&mut task).await {
        Ok(()) => {
            Output::success("Podcast generated.");
            if let Some(audio) = &task.audio_path {
                Output::kv("Audio", &audio.display().to_string());
            }
            if let Some(video) = &task.video_path {
                Output::kv("Video", &video.display().to_string());
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Task failed: {}", e));
            Output::info(&format!("Resume with: recast resume {}", task.id));
            Err(e.into())
        }
    }
}

/// Derive a display name from the source: file stem for local paths,
/// last path segment for URLs.
fn derive_name(source: &str) -> String {
    let trimmed = source.trim_end_matches('/');
    let tail = trimmed
        .rsplit('/')
        .next()
        .unwrap_or(trimmed)
        .split(['?', '#'])
        .next()
        .unwrap_or(trimmed);
    let stem = tail.rsplit_once('.').map(|(s, _)| s).unwrap_or(tail);
    if stem.is_empty() {
        "task".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_name() {
        assert_eq!(derive_name("/home/u/My Lecture.mp4"), "My Lecture");
        assert_eq!(
            derive_name("https://www.bilibili.com/video/BV1xx411c7mD?p=2"),
            "BV1xx411c7mD"
        );
        assert_eq!(derive_name("https://example.com/talks/"), "talks");
        assert_eq!(derive_name(""), "task");
    }
}
