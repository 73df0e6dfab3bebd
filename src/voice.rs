//! Voice cloning via the Volcengine mega-TTS API.
//!
//! Training is asynchronous: upload a sample under a chosen speaker id,
//! then poll until the voice is ready. A ready voice is referenced at
//! synthesis time by its `S_...` id.

use crate::config::{VoiceCloneSettings, VolcSettings};
use crate::error::{RecastError, Result};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const HOST: &str = "https://openspeech.bytedance.com";

/// Training state of a cloned voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneStatus {
    /// Not yet trained, or training in progress.
    Pending,
    /// Trained and usable for synthesis.
    Ready,
    /// Training failed; the sample must be re-uploaded.
    Failed,
}

/// Volcengine voice cloning client.
pub struct VoiceCloner {
    client: reqwest::Client,
    appid: String,
    token: String,
    model_type: u8,
    language: u8,
    poll_interval: Duration,
    timeout: Duration,
}

impl VoiceCloner {
    pub fn new(volc: &VolcSettings, settings: &VoiceCloneSettings) -> Result<Self> {
        let (appid, token) = volc.resolve()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            appid,
            token,
            model_type: settings.model_type,
            language: settings.language,
            poll_interval: Duration::from_secs(settings.poll_interval_seconds),
            timeout: Duration::from_secs(settings.timeout_seconds),
        })
    }

    /// Resource id for the configured cloning model (ICL 1.0 vs 2.0).
    fn resource_id(&self) -> &'static str {
        if self.model_type == 4 {
            "seed-icl-2.0"
        } else {
            "seed-icl-1.0"
        }
    }

    /// Upload a sample audio file to start training `voice_id`.
    #[instrument(skip(self), fields(voice_id = %voice_id))]
    pub async fn upload_sample(&self, sample: &Path, voice_id: &str) -> Result<()> {
        if !sample.exists() {
            return Err(RecastError::InvalidInput(format!(
                "Sample audio not found: {}",
                sample.display()
            )));
        }

        let audio_bytes = tokio::fs::read(sample).await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&audio_bytes);
        let format = sample
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3")
            .to_lowercase();

        let body = serde_json::json!({
            "appid": self.appid,
            "speaker_id": voice_id,
            "audios": [{
                "audio_bytes": encoded,
                "audio_format": format,
            }],
            "source": 2,
            "language": self.language,
            "model_type": self.model_type,
            "extra_params": "{}",
        });

        info!("Uploading voice sample for {}", voice_id);

        let resp = self
            .client
            .post(format!("{}/api/v1/mega_tts/audio/upload", HOST))
            .header("Authorization", format!("Bearer;{}", self.token))
            .header("Resource-Id", self.resource_id())
            .json(&body)
            .send()
            .await?;

        let data: serde_json::Value = resp.json().await?;
        let code = data["BaseResp"]["StatusCode"].as_i64();
        if code != Some(0) {
            let msg = data["BaseResp"]["StatusMessage"]
                .as_str()
                .unwrap_or("unknown error");
            return Err(RecastError::Unrecoverable(format!(
                "Voice sample upload failed (code {:?}): {}",
                code, msg
            )));
        }

        info!("Voice sample accepted for {}", voice_id);
        Ok(())
    }

    /// Query the training status of a cloned voice.
    #[instrument(skip(self), fields(voice_id = %voice_id))]
    pub async fn status(&self, voice_id: &str) -> Result<CloneStatus> {
        let body = serde_json::json!({
            "appid": self.appid,
            "speaker_id": voice_id,
        });

        let resp = self
            .client
            .post(format!("{}/api/v1/mega_tts/status", HOST))
            .header("Authorization", format!("Bearer;{}", self.token))
            .header("Resource-Id", self.resource_id())
            .json(&body)
            .send()
            .await?;

        let data: serde_json::Value = resp.json().await?;
        let code = data["BaseResp"]["StatusCode"].as_i64();
        if code != Some(0) {
            return Err(RecastError::Unrecoverable(format!(
                "Voice status query failed: {}",
                data["BaseResp"]["StatusMessage"]
                    .as_str()
                    .unwrap_or("unknown error")
            )));
        }

        // 0 = not found, 1 = training, 2 = trained, 3 = failed, 4 = active
        let status = match data["status"].as_i64() {
            Some(2) | Some(4) => CloneStatus::Ready,
            Some(3) => CloneStatus::Failed,
            _ => CloneStatus::Pending,
        };
        debug!("Voice {} status: {:?}", voice_id, status);
        Ok(status)
    }

    /// Poll until the voice is ready, or fail on training failure/timeout.
    #[instrument(skip(self), fields(voice_id = %voice_id))]
    pub async fn wait_for_ready(&self, voice_id: &str) -> Result<()> {
        poll_ready(self.poll_interval, self.timeout, voice_id, || {
            self.status(voice_id)
        })
        .await
    }

    /// Upload a sample and block until the cloned voice is usable.
    pub async fn train(&self, sample: &Path, voice_id: &str) -> Result<()> {
        self.upload_sample(sample, voice_id).await?;
        self.wait_for_ready(voice_id).await
    }
}

/// Poll `status` until it reports ready, sleeping `interval` between
/// iterations. Training failure is unrecoverable; an expired `timeout`
/// surfaces as a transient error since training continues server-side.
async fn poll_ready<F, Fut>(
    interval: Duration,
    timeout: Duration,
    voice_id: &str,
    mut status: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<CloneStatus>>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match status().await? {
            CloneStatus::Ready => {
                info!("Voice {} is ready", voice_id);
                return Ok(());
            }
            CloneStatus::Failed => {
                return Err(RecastError::Unrecoverable(format!(
                    "Voice training failed for {}",
                    voice_id
                )));
            }
            CloneStatus::Pending => {}
        }

        if tokio::time::Instant::now() >= deadline {
            warn!("Voice training for {} timed out", voice_id);
            return Err(RecastError::Transient(format!(
                "Voice training for {} did not finish within {:?}",
                voice_id, timeout
            )));
        }

        tokio::time::sleep(interval).await;
    }
}
