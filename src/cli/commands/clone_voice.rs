//! Clone-voice command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::voice::VoiceCloner;
use anyhow::Result;
use std::path::Path;

/// Run the clone-voice command: upload a sample and wait for training.
pub async fn run_clone_voice(sample: &str, voice_id: &str, settings: Settings) -> Result<()> {
    let cloner = VoiceCloner::new(&settings.volc, &settings.voice_clone)?;

    let spinner = Output::spinner(&format!("Training voice {}...", voice_id));
    let result = cloner.train(Path::new(sample), voice_id).await;
    spinner.finish_and_clear();

    match result {
        Ok(()) => {
            Output::success(&format!("Voice {} is ready.", voice_id));
            Output::info(
                "Set it as synthesize.host.voice or synthesize.guest.voice \
                 with engine = \"volc\" to use it.",
            );
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Voice cloning failed: {}", e));
            Err(e.into())
        }
    }
}
