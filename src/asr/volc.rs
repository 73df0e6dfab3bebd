//! Volcengine (ByteDance) asynchronous transcription.
//!
//! The bigmodel AUC API is submit-then-poll: the submit call returns a
//! request id plus a routing log id (both are needed to query), and the
//! poll status lives in response headers. Audio is sent inline as base64.

use super::SpeechToText;
use crate::config::{TranscribeSettings, VolcSettings};
use crate::error::{RecastError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const SUBMIT_URL: &str = "https://openspeech-direct.zijieapi.com/api/v3/auc/bigmodel/submit";
const QUERY_URL: &str = "https://openspeech-direct.zijieapi.com/api/v3/auc/bigmodel/query";
const RESOURCE_ID: &str = "volc.bigasr.auc";

const STATUS_OK: &str = "20000000";
const STATUS_PROCESSING: &str = "20000001";
const STATUS_QUEUED: &str = "20000002";
const STATUS_SILENT_AUDIO: &str = "20000003";

/// Volcengine bigmodel ASR engine.
pub struct VolcAsr {
    client: reqwest::Client,
    appid: String,
    token: String,
    language: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

/// One poll result.
enum PollState {
    Running,
    Done(String),
}

impl VolcAsr {
    pub fn new(volc: &VolcSettings, settings: &TranscribeSettings) -> Result<Self> {
        let (appid, token) = volc.resolve()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            appid,
            token,
            language: settings.language.clone(),
            poll_interval: Duration::from_secs(settings.poll_interval_seconds),
            poll_timeout: Duration::from_secs(settings.poll_timeout_seconds),
        })
    }

    fn header_str(resp: &reqwest::Response, name: &str) -> String {
        resp.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    /// Submit the audio and return the composite task id (`uuid|logid`).
    async fn submit_task(&self, audio_path: &Path) -> Result<String> {
        let audio_bytes = tokio::fs::read(audio_path).await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&audio_bytes);
        let request_id = Uuid::new_v4().to_string();

        let body = serde_json::json!({
            "user": { "uid": "recast" },
            "audio": { "data": encoded, "format": "mp3" },
            "request": {
                "model_name": "bigmodel",
                "enable_itn": true,
                "enable_punc": true,
                "language": self.language,
            }
        });

        let resp = self
            .client
            .post(SUBMIT_URL)
            .header("X-Api-App-Key", &self.appid)
            .header("X-Api-Access-Key", &self.token)
            .header("X-Api-Resource-Id", RESOURCE_ID)
            .header("X-Api-Request-Id", &request_id)
            .header("X-Api-Sequence", "-1")
            .json(&body)
            .send()
            .await?;

        let status_code = Self::header_str(&resp, "X-Api-Status-Code");
        if status_code != STATUS_OK {
            let msg = Self::header_str(&resp, "X-Api-Message");
            return Err(RecastError::Unrecoverable(format!(
                "Volcengine ASR submit failed: {} - {}",
                status_code, msg
            )));
        }

        let logid = Self::header_str(&resp, "X-Tt-Logid");
        let composite_id = format!("{}|{}", request_id, logid);
        info!("ASR task submitted: {}", composite_id);
        Ok(composite_id)
    }

    /// Query one poll iteration for a composite task id.
    async fn query(&self, composite_id: &str) -> Result<PollState> {
        let (request_id, logid) = composite_id.split_once('|').ok_or_else(|| {
            RecastError::InvalidInput(format!("Malformed ASR task id: {}", composite_id))
        })?;

        let resp = self
            .client
            .post(QUERY_URL)
            .header("X-Api-App-Key", &self.appid)
            .header("X-Api-Access-Key", &self.token)
            .header("X-Api-Resource-Id", RESOURCE_ID)
            .header("X-Api-Request-Id", request_id)
            .header("X-Tt-Logid", logid)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status_code = Self::header_str(&resp, "X-Api-Status-Code");

        match status_code.as_str() {
            STATUS_OK => {
                let data: serde_json::Value = resp.json().await?;
                match data["result"]["text"].as_str() {
                    Some(text) => Ok(PollState::Done(text.to_string())),
                    // A success status without a result body: still settling.
                    None => Ok(PollState::Running),
                }
            }
            STATUS_PROCESSING | STATUS_QUEUED => Ok(PollState::Running),
            STATUS_SILENT_AUDIO => Err(RecastError::InvalidInput(
                "Silent audio detected by ASR service".into(),
            )),
            other => {
                let msg = Self::header_str(&resp, "X-Api-Message");
                Err(RecastError::Unrecoverable(format!(
                    "Volcengine ASR query failed: {} - {}",
                    other, msg
                )))
            }
        }
    }
}

/// Poll `query` until it reports a transcript, sleeping `interval`
/// between iterations; an expired `timeout` surfaces as a transient
/// failure so the task can be resumed against the same remote id.
async fn poll_transcript<F, Fut>(
    interval: Duration,
    timeout: Duration,
    mut query: F,
) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<PollState>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if tokio::time::Instant::now() >= deadline {
            warn!("ASR poll timed out after {:?}", timeout);
            return Err(RecastError::Transient(format!(
                "ASR task did not finish within {:?}",
                timeout
            )));
        }

        match query().await? {
            PollState::Done(text) => return Ok(text),
            PollState::Running => {
                tokio::time::sleep(interval).await;
            }
        }
    }
}

#[async_trait]
impl SpeechToText for VolcAsr {
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn submit(&self, audio_path: &Path) -> Result<Option<String>> {
        if !audio_path.exists() {
            return Err(RecastError::InvalidInput(format!(
                "Audio file not found: {}",
                audio_path.display()
            )));
        }
        Ok(Some(self.submit_task(audio_path).await?))
    }

    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn fetch(&self, audio_path: &Path, remote_task_id: Option<&str>) -> Result<String> {
        let task_id = match remote_task_id {
            Some(id) => {
                info!("Resuming ASR task {}", id);
                id.to_string()
            }
            None => self.submit_task(audio_path).await?,
        };

        let text = poll_transcript(self.poll_interval, self.poll_timeout, || {
            self.query(&task_id)
        })
        .await?;

        debug!("Transcript length: {} chars", text.len());
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_poll_timeout_is_transient() {
        let result = poll_transcript(
            Duration::from_millis(1),
            Duration::from_millis(10),
            || async { Ok(PollState::Running) },
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_poll_returns_transcript_once_done() {
        let mut remaining = 2u32;
        let text = poll_transcript(Duration::from_millis(1), Duration::from_secs(5), || {
            let state = if remaining == 0 {
                PollState::Done("你好".into())
            } else {
                remaining -= 1;
                PollState::Running
            };
            async move { Ok(state) }
        })
        .await
        .unwrap();

        assert_eq!(text, "你好");
    }

    #[tokio::test]
    async fn test_poll_propagates_query_errors() {
        let result = poll_transcript(
            Duration::from_millis(1),
            Duration::from_secs(5),
            || async {
                Err(RecastError::InvalidInput(
                    "Silent audio detected by ASR service".into(),
                ))
            },
        )
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidInput);
    }
}
