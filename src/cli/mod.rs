//! CLI module for Recast.

pub mod commands;
mod output;

pub use output::Output;

use crate::config::{AsrEngine, RenderEngine};
use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Recast - Video to Podcast Converter
///
/// Turns a video (local file or URL) into a two-host dialogue podcast:
/// download, transcribe, rewrite, synthesize, render.
#[derive(Parser, Debug)]
#[command(name = "recast")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a video into a podcast, running the full pipeline
    Generate {
        /// Video URL (Bilibili, YouTube, ...) or local file path
        source: String,

        /// Display name for the task (defaults to the source name)
        #[arg(short, long)]
        name: Option<String>,

        /// ASR engine (dashscope, volc)
        #[arg(long)]
        asr_engine: Option<AsrEngine>,

        /// Render engine (mux, animated)
        #[arg(long)]
        render_engine: Option<RenderEngine>,
    },

    /// Resume a failed or interrupted task from its last completed stage
    Resume {
        /// Task id
        id: Uuid,
    },

    /// List all tasks, newest first
    List,

    /// Show the full record of one task
    Show {
        /// Task id
        id: Uuid,
    },

    /// Delete a task record
    Delete {
        /// Task id
        id: Uuid,
    },

    /// Re-render the video of a completed task, keeping its audio
    Rerender {
        /// Task id
        id: Uuid,

        /// Render engine override (mux, animated)
        #[arg(long)]
        engine: Option<RenderEngine>,
    },

    /// Train a cloned voice from a sample recording (Volcengine)
    CloneVoice {
        /// Sample audio file (10s to 60s of clean speech)
        sample: String,

        /// Speaker id to train (S_... slot from the Volcengine console)
        voice_id: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
