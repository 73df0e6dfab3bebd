//! Show command implementation.

use super::open_store;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use uuid::Uuid;

/// Run the show command.
pub async fn run_show(id: Uuid, settings: Settings) -> Result<()> {
    let store = open_store(&settings)?;
    let task = store.load(id).await?;

    Output::header(&task.name);
    Output::kv("Id", &task.id.to_string());
    Output::kv("Stage", &task.stage.to_string());
    Output::kv("Source", &task.source);
    Output::kv("ASR engine", &task.asr_engine.to_string());
    Output::kv("Render engine", &task.render_engine.to_string());
    Output::kv("Created", &task.created_at.to_rfc3339());
    Output::kv("Updated", &task.updated_at.to_rfc3339());

    if let Some(path) = &task.media_path {
        Output::kv("Media", &path.display().to_string());
    }
    if let Some(transcript) = &task.transcript {
        Output::kv("Transcript", &format!("{} chars", transcript.chars().count()));
    }
    if let Some(script) = &task.script {
        let lines = script.lines().filter(|l| !l.trim().is_empty()).count();
        Output::kv("Script", &format!("{} lines", lines));
    }
    if let Some(path) = &task.audio_path {
        Output::kv("Audio", &path.display().to_string());
    }
    if let Some(path) = &task.video_path {
        Output::kv("Video", &path.display().to_string());
    }
    if let Some(error) = &task.error {
        Output::kv("Error", &format!("[{}] {}", error.kind, error.message));
    }

    Ok(())
}
