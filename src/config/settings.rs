//! Configuration settings for Recast.

use crate::error::{RecastError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub store: StoreSettings,
    pub download: DownloadSettings,
    pub transcribe: TranscribeSettings,
    pub rewrite: RewriteSettings,
    pub synthesize: SynthesizeSettings,
    pub render: RenderSettings,
    pub voice_clone: VoiceCloneSettings,
    pub volc: VolcSettings,
    pub retry: RetrySettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data (task artifacts live here).
    pub data_dir: String,
    /// Directory for temporary files.
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.recast".to_string(),
            temp_dir: "/tmp/recast".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Task store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite task database.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.recast/tasks.db".to_string(),
        }
    }
}

/// Download stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Maximum media duration to accept (in seconds).
    pub max_duration_seconds: u32,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            max_duration_seconds: 7200, // 2 hours
        }
    }
}

/// Speech-to-text engine selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AsrEngine {
    /// Alibaba DashScope qwen3-asr-flash via the OpenAI-compatible API.
    #[default]
    DashScope,
    /// Volcengine (ByteDance) asynchronous ASR.
    Volc,
}

impl std::str::FromStr for AsrEngine {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dashscope" | "qwen" => Ok(AsrEngine::DashScope),
            "volc" | "volcengine" => Ok(AsrEngine::Volc),
            _ => Err(format!("Unknown ASR engine: {}", s)),
        }
    }
}

impl std::fmt::Display for AsrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsrEngine::DashScope => write!(f, "dashscope"),
            AsrEngine::Volc => write!(f, "volc"),
        }
    }
}

/// Transcription stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeSettings {
    /// ASR engine (dashscope, volc).
    pub engine: AsrEngine,
    /// DashScope model name.
    pub model: String,
    /// DashScope API key. Falls back to DASHSCOPE_API_KEY.
    pub api_key: Option<String>,
    /// Recognition language hint.
    pub language: String,
    /// Poll interval for the Volcengine async task (seconds).
    pub poll_interval_seconds: u64,
    /// Maximum time to wait for a Volcengine transcript (seconds).
    pub poll_timeout_seconds: u64,
}

impl Default for TranscribeSettings {
    fn default() -> Self {
        Self {
            engine: AsrEngine::DashScope,
            model: "qwen3-asr-flash".to_string(),
            api_key: None,
            language: "zh-CN".to_string(),
            poll_interval_seconds: 2,
            poll_timeout_seconds: 600,
        }
    }
}

impl TranscribeSettings {
    /// Resolve the DashScope API key from config or environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("DASHSCOPE_API_KEY").ok())
            .ok_or_else(|| {
                RecastError::Config(
                    "DashScope API key not set (transcribe.api_key or DASHSCOPE_API_KEY)".into(),
                )
            })
    }
}

/// Rewrite stage settings (DeepSeek or any OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteSettings {
    /// Chat model used for the rewrite.
    pub model: String,
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// API key. Falls back to DEEPSEEK_API_KEY.
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for RewriteSettings {
    fn default() -> Self {
        Self {
            model: "deepseek-chat".to_string(),
            base_url: "https://api.deepseek.com/v1".to_string(),
            api_key: None,
            temperature: 0.3,
        }
    }
}

impl RewriteSettings {
    /// Resolve the rewrite API key from config or environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
            .ok_or_else(|| {
                RecastError::Config(
                    "DeepSeek API key not set (rewrite.api_key or DEEPSEEK_API_KEY)".into(),
                )
            })
    }
}

/// Text-to-speech engine selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TtsEngine {
    /// Microsoft Edge neural voices via the edge-tts CLI.
    #[default]
    Edge,
    /// Volcengine TTS (standard and cloned voices).
    Volc,
}

impl std::str::FromStr for TtsEngine {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "edge" => Ok(TtsEngine::Edge),
            "volc" | "volcengine" => Ok(TtsEngine::Volc),
            _ => Err(format!("Unknown TTS engine: {}", s)),
        }
    }
}

impl std::fmt::Display for TtsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TtsEngine::Edge => write!(f, "edge"),
            TtsEngine::Volc => write!(f, "volc"),
        }
    }
}

/// Voice assignment for one dialogue role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleVoice {
    /// Voice identifier (Edge voice name, Volcengine voice_type,
    /// or a cloned `S_...` speaker id).
    pub voice: String,
    /// TTS engine for this role.
    pub engine: TtsEngine,
    /// Speech speed multiplier (1.0 = normal).
    pub rate: f32,
}

impl Default for RoleVoice {
    fn default() -> Self {
        Self {
            voice: "zh-CN-YunxiNeural".to_string(),
            engine: TtsEngine::Edge,
            rate: 1.3,
        }
    }
}

/// Synthesis stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizeSettings {
    /// Host voice assignment.
    pub host: RoleVoice,
    /// Guest voice assignment.
    pub guest: RoleVoice,
    /// Silence inserted between stitched segments (milliseconds).
    pub pause_ms: u64,
    /// Maximum concurrent TTS requests.
    pub max_concurrent: usize,
}

impl Default for SynthesizeSettings {
    fn default() -> Self {
        Self {
            host: RoleVoice::default(),
            guest: RoleVoice {
                voice: "zh-CN-YunjianNeural".to_string(),
                engine: TtsEngine::Edge,
                rate: 1.3,
            },
            pause_ms: 300,
            max_concurrent: 3,
        }
    }
}

/// Video render engine selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RenderEngine {
    /// Fast ffmpeg mux: still cover image + audio + burned-in subtitles.
    #[default]
    Mux,
    /// Animated render via Remotion.
    Animated,
}

impl std::str::FromStr for RenderEngine {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mux" | "ffmpeg" | "fast" => Ok(RenderEngine::Mux),
            "animated" | "remotion" => Ok(RenderEngine::Animated),
            _ => Err(format!("Unknown render engine: {}", s)),
        }
    }
}

impl std::fmt::Display for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderEngine::Mux => write!(f, "mux"),
            RenderEngine::Animated => write!(f, "animated"),
        }
    }
}

/// Render stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Render engine (mux, animated).
    pub engine: RenderEngine,
    /// Cover image shown behind the dialogue audio.
    pub cover_image: Option<String>,
    /// Remotion project directory (animated engine only).
    pub remotion_project: String,
    /// Remotion composition id to render.
    pub composition: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            engine: RenderEngine::Mux,
            cover_image: None,
            remotion_project: "remotion".to_string(),
            composition: "Podcast".to_string(),
        }
    }
}

/// Voice cloning settings (Volcengine mega-TTS).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceCloneSettings {
    /// Cloning model version: 1 = ICL 1.0, 4 = ICL 2.0.
    pub model_type: u8,
    /// Sample language: 0 = Chinese, 1 = English.
    pub language: u8,
    /// Poll interval while training (seconds).
    pub poll_interval_seconds: u64,
    /// Maximum time to wait for training (seconds).
    pub timeout_seconds: u64,
}

impl Default for VoiceCloneSettings {
    fn default() -> Self {
        Self {
            model_type: 1,
            language: 0,
            poll_interval_seconds: 2,
            timeout_seconds: 120,
        }
    }
}

/// Volcengine credentials, shared by the ASR, TTS and voice-clone clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct VolcSettings {
    /// Application id. Falls back to VOLC_APPID.
    pub appid: Option<String>,
    /// Access token. Falls back to VOLC_ACCESS_TOKEN.
    pub access_token: Option<String>,
}

impl VolcSettings {
    /// Resolve (appid, access_token) from config or environment.
    pub fn resolve(&self) -> Result<(String, String)> {
        let appid = self
            .appid
            .clone()
            .or_else(|| std::env::var("VOLC_APPID").ok());
        let token = self
            .access_token
            .clone()
            .or_else(|| std::env::var("VOLC_ACCESS_TOKEN").ok());
        match (appid, token) {
            (Some(a), Some(t)) => Ok((a, t)),
            _ => Err(RecastError::Config(
                "Volcengine credentials not set (volc.appid/volc.access_token or VOLC_APPID/VOLC_ACCESS_TOKEN)".into(),
            )),
        }
    }
}

/// Retry policy for transient external-service failures.
///
/// Applied inside stage adapters; the pipeline controller itself never
/// retries automatically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per external call (1 = no retry).
    pub max_attempts: u32,
    /// Initial backoff, doubled after each failed attempt (milliseconds).
    pub initial_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RecastError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recast")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded SQLite task database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.transcribe.engine, AsrEngine::DashScope);
        assert_eq!(s.synthesize.pause_ms, 300);
        assert_eq!(s.retry.max_attempts, 3);
        assert_eq!(s.render.engine, RenderEngine::Mux);
    }

    #[test]
    fn test_engine_parsing() {
        assert_eq!("volcengine".parse::<AsrEngine>().unwrap(), AsrEngine::Volc);
        assert_eq!("edge".parse::<TtsEngine>().unwrap(), TtsEngine::Edge);
        assert_eq!(
            "remotion".parse::<RenderEngine>().unwrap(),
            RenderEngine::Animated
        );
        assert!("whisper".parse::<AsrEngine>().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let s = Settings::default();
        let text = toml::to_string_pretty(&s).unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed.rewrite.model, s.rewrite.model);
        assert_eq!(parsed.synthesize.guest.voice, s.synthesize.guest.voice);
    }
}
