//! Recast - Video to Podcast Converter
//!
//! Turns a video (local file or URL) into a two-host dialogue podcast.
//!
//! # Overview
//!
//! Recast runs a fixed five-stage pipeline per task:
//! - Download the source and extract its audio
//! - Transcribe the audio to text
//! - Rewrite the transcript into a Host/Guest dialogue
//! - Synthesize each line with per-role voices and stitch the track
//! - Render the final video with subtitles
//!
//! Every stage result is persisted, so an interrupted or failed task can
//! be resumed from its last completed stage.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `task` - Task model and SQLite-backed store
//! - `media` - yt-dlp/ffmpeg wrappers
//! - `asr` - Speech-to-text engines
//! - `script` - Dialogue script parsing and subtitle building
//! - `tts` - Text-to-speech engines
//! - `voice` - Voice cloning client
//! - `stage` - One adapter per pipeline stage
//! - `pipeline` - Pipeline controller
//!
//! # Example
//!
//! ```rust,no_run
//! use recast::config::Settings;
//! use recast::pipeline::Pipeline;
//! use recast::task::NewTask;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(&settings)?;
//!
//!     let mut task = pipeline
//!         .submit(NewTask {
//!             source: "https://www.bilibili.com/video/BV1xx411c7mD".into(),
//!             name: "demo".into(),
//!             asr_engine: settings.transcribe.engine,
//!             render_engine: settings.render.engine,
//!         })
//!         .await?;
//!     pipeline.run_to_completion(&mut task).await?;
//!     println!("Video at {:?}", task.video_path);
//!
//!     Ok(())
//! }
//! ```

pub mod asr;
pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod script;
pub mod stage;
pub mod task;
pub mod tts;
pub mod voice;

pub use error::{RecastError, Result};
