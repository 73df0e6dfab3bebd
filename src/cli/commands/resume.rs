//! Resume command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use anyhow::Result;
use uuid::Uuid;

/// Run the resume command: continue a task from its last completed stage.
pub async fn run_resume(id: Uuid, settings: Settings) -> Result<()> {
    let pipeline = Pipeline::new(&settings)?;

    let stored = pipeline.store().load(id).await?;
    if let Some(stage) = stored.next_stage() {
        Output::info(&format!("Resuming '{}' at stage {}", stored.name, stage));
    }

    match pipeline.resume(id).await {
        Ok(task) => {
            Output::success(&format!("Task '{}' complete.", task.name));
            if let Some(video) = &task.video_path {
                Output::kv("Video", &video.display().to_string());
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Resume failed: {}", e));
            Err(e.into())
        }
    }
}
