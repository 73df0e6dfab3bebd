//! Microsoft Edge TTS via the edge-tts command line tool.

use super::TextToSpeech;
use crate::error::{RecastError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Edge neural voice synthesizer (free, no credentials).
pub struct EdgeTts;

impl EdgeTts {
    pub fn new() -> Self {
        Self
    }

    /// Convert a speed multiplier to the edge-tts rate string
    /// (1.2 -> "+20%", 0.8 -> "-20%").
    fn rate_string(rate: f32) -> String {
        let percent = ((rate - 1.0) * 100.0).round() as i32;
        if percent >= 0 {
            format!("+{}%", percent)
        } else {
            format!("{}%", percent)
        }
    }
}

impl Default for EdgeTts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextToSpeech for EdgeTts {
    #[instrument(skip(self, text), fields(voice = %voice))]
    async fn synthesize(&self, text: &str, voice: &str, rate: f32, output: &Path) -> Result<()> {
        let rate_str = Self::rate_string(rate);
        debug!("Edge TTS rate {}", rate_str);

        let result = Command::new("edge-tts")
            .arg("--voice").arg(voice)
            .arg("--rate").arg(&rate_str)
            .arg("--text").arg(text)
            .arg("--write-media").arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        let out = match result {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RecastError::ToolNotFound("edge-tts".into()));
            }
            Err(e) => {
                return Err(RecastError::Transient(format!(
                    "edge-tts execution failed: {e}"
                )));
            }
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            // edge-tts failures are almost always the remote service
            return Err(RecastError::Transient(format!(
                "edge-tts failed: {stderr}"
            )));
        }

        if !output.exists() {
            return Err(RecastError::Transient(
                "edge-tts produced no output file".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_string() {
        assert_eq!(EdgeTts::rate_string(1.0), "+0%");
        assert_eq!(EdgeTts::rate_string(1.3), "+30%");
        assert_eq!(EdgeTts::rate_string(0.8), "-20%");
    }
}
