//! Configuration management for Recast.

mod settings;

pub use settings::{
    AsrEngine, DownloadSettings, GeneralSettings, RenderEngine, RenderSettings, RetrySettings,
    RewriteSettings, RoleVoice, Settings, StoreSettings, SynthesizeSettings, TranscribeSettings,
    TtsEngine, VoiceCloneSettings, VolcSettings,
};
