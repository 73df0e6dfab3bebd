//! Volcengine (ByteDance) TTS.
//!
//! Synchronous JSON API: the response carries the whole MP3 as base64.
//! Cloned voices (ids starting with `S_`) live on a separate cluster
//! from the standard catalogue voices.

use super::TextToSpeech;
use crate::config::VolcSettings;
use crate::error::{RecastError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

const TTS_URL: &str = "https://openspeech.bytedance.com/api/v1/tts";
const STANDARD_CLUSTER: &str = "volcano_tts";
const CLONED_CLUSTER: &str = "volcano_icl";

/// Volcengine TTS engine (standard and cloned voices).
pub struct VolcTts {
    client: reqwest::Client,
    appid: String,
    token: String,
}

impl VolcTts {
    pub fn new(settings: &VolcSettings) -> Result<Self> {
        let (appid, token) = settings.resolve()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            appid,
            token,
        })
    }

    fn cluster_for(voice: &str) -> &'static str {
        if voice.starts_with("S_") {
            CLONED_CLUSTER
        } else {
            STANDARD_CLUSTER
        }
    }
}

#[async_trait]
impl TextToSpeech for VolcTts {
    #[instrument(skip(self, text), fields(voice = %voice))]
    async fn synthesize(&self, text: &str, voice: &str, rate: f32, output: &Path) -> Result<()> {
        let cluster = Self::cluster_for(voice);
        debug!("Volcengine TTS on cluster {}", cluster);

        let body = serde_json::json!({
            "app": {
                "appid": self.appid,
                "token": self.token,
                "cluster": cluster,
            },
            "user": { "uid": "recast" },
            "audio": {
                "voice_type": voice,
                "encoding": "mp3",
                "speed_ratio": rate,
                "volume_ratio": 1.0,
                "pitch_ratio": 1.0,
            },
            "request": {
                "reqid": Uuid::new_v4().to_string(),
                "text": text,
                "text_type": "plain",
                "operation": "query",
            }
        });

        let resp = self
            .client
            .post(TTS_URL)
            .header("Authorization", format!("Bearer;{}", self.token))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            let msg = format!("Volcengine TTS returned {}: {}", status, detail);
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(RecastError::Transient(msg))
            } else {
                Err(RecastError::Unrecoverable(msg))
            };
        }

        let data: serde_json::Value = resp.json().await?;
        let Some(encoded) = data["data"].as_str() else {
            let message = data["message"].as_str().unwrap_or("unknown error");
            // The service reports unknown voice ids in the message body
            return if message.to_lowercase().contains("voice") {
                Err(RecastError::InvalidInput(format!(
                    "Volcengine TTS rejected voice '{}': {}",
                    voice, message
                )))
            } else {
                Err(RecastError::Unrecoverable(format!(
                    "Volcengine TTS error: {}",
                    message
                )))
            };
        };

        let audio = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| {
                RecastError::Unrecoverable(format!("Volcengine TTS returned invalid audio: {e}"))
            })?;
        tokio::fs::write(output, audio).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_routing() {
        assert_eq!(VolcTts::cluster_for("BV001_streaming"), STANDARD_CLUSTER);
        assert_eq!(VolcTts::cluster_for("S_0VWdKj6T1"), CLONED_CLUSTER);
    }
}
