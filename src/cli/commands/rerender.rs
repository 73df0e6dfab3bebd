//! Rerender command implementation.

use crate::cli::Output;
use crate::config::{RenderEngine, Settings};
use crate::pipeline::Pipeline;
use anyhow::Result;
use uuid::Uuid;

/// Run the rerender command: redo just the video of a task.
pub async fn run_rerender(id: Uuid, engine: Option<RenderEngine>, settings: Settings) -> Result<()> {
    let pipeline = Pipeline::new(&settings)?;

    let task = pipeline.rerender(id, engine).await?;
    Output::success(&format!("Re-rendered '{}'.", task.name));
    if let Some(video) = &task.video_path {
        Output::kv("Video", &video.display().to_string());
    }

    Ok(())
}
