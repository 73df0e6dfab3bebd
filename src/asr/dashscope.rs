//! DashScope (Alibaba) transcription via the OpenAI-compatible API.
//!
//! qwen3-asr-flash takes the audio inline as a base64 data URL inside a
//! chat message and answers with the transcript as the completion text.

use super::SpeechToText;
use crate::config::TranscribeSettings;
use crate::error::{RecastError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

const DASHSCOPE_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Request timeout; transcription of long clips can take a while.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// DashScope qwen3-asr transcriber.
pub struct DashScopeAsr {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl DashScopeAsr {
    pub fn new(settings: &TranscribeSettings) -> Result<Self> {
        let api_key = settings.resolve_api_key()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: settings.model.clone(),
        })
    }
}

#[async_trait]
impl SpeechToText for DashScopeAsr {
    /// Synchronous engine: there is nothing to submit ahead of time.
    async fn submit(&self, _audio_path: &Path) -> Result<Option<String>> {
        Ok(None)
    }

    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn fetch(&self, audio_path: &Path, _remote_task_id: Option<&str>) -> Result<String> {
        if !audio_path.exists() {
            return Err(RecastError::InvalidInput(format!(
                "Audio file not found: {}",
                audio_path.display()
            )));
        }

        info!("Transcribing with DashScope ({})", self.model);

        let audio_bytes = tokio::fs::read(audio_path).await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&audio_bytes);

        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [{
                    "type": "input_audio",
                    "input_audio": {
                        "data": format!("data:audio/mp3;base64,{}", encoded),
                        "format": "mp3"
                    }
                }]
            }],
            "asr_options": {
                "enable_itn": false
            }
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", DASHSCOPE_BASE_URL))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            let msg = format!("DashScope ASR returned {}: {}", status, detail);
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(RecastError::Transient(msg))
            } else if status.as_u16() == 401 || status.as_u16() == 403 {
                Err(RecastError::Unrecoverable(msg))
            } else {
                Err(RecastError::InvalidInput(msg))
            };
        }

        let data: serde_json::Value = resp.json().await?;
        let text = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                RecastError::Unrecoverable(format!("Unexpected DashScope response: {}", data))
            })?
            .trim()
            .to_string();

        debug!("Transcript length: {} chars", text.len());
        Ok(text)
    }
}
