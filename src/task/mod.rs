//! Task data model for Recast.
//!
//! A [`Task`] is the persisted record of one end-to-end pipeline run:
//! which stage it has reached, the artifacts produced so far, and the
//! last failure if it stopped. Stages advance monotonically along the
//! fixed order; any non-terminal stage may transition to `Failed`.

mod store;

pub use store::{NewTask, SqliteTaskStore, TaskStore};

use crate::config::{AsrEngine, RenderEngine};
use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Pipeline stage a task has reached.
///
/// `Created` through `Rendered` form a linear order; `Failed` is
/// reachable from any non-terminal stage and carries no position of its
/// own (the last completed stage is derived from which artifact fields
/// are populated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Created,
    Downloaded,
    Transcribed,
    Rewritten,
    Synthesized,
    Rendered,
    Failed,
}

impl Stage {
    /// The stages a task passes through after creation, in order.
    pub const PIPELINE: [Stage; 5] = [
        Stage::Downloaded,
        Stage::Transcribed,
        Stage::Rewritten,
        Stage::Synthesized,
        Stage::Rendered,
    ];

    /// Position in the linear order. `Failed` has no position.
    pub fn position(&self) -> Option<usize> {
        match self {
            Stage::Created => Some(0),
            Stage::Downloaded => Some(1),
            Stage::Transcribed => Some(2),
            Stage::Rewritten => Some(3),
            Stage::Synthesized => Some(4),
            Stage::Rendered => Some(5),
            Stage::Failed => None,
        }
    }

    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<Stage> {
        // Created sits at position 0, so PIPELINE[position] is always
        // the stage after this one.
        let pos = self.position()?;
        Self::PIPELINE.get(pos).copied()
    }

    /// Whether the pipeline has run to completion.
    pub fn is_complete(&self) -> bool {
        matches!(self, Stage::Rendered)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Created => "created",
            Stage::Downloaded => "downloaded",
            Stage::Transcribed => "transcribed",
            Stage::Rewritten => "rewritten",
            Stage::Synthesized => "synthesized",
            Stage::Rendered => "rendered",
            Stage::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "created" => Ok(Stage::Created),
            "downloaded" => Ok(Stage::Downloaded),
            "transcribed" => Ok(Stage::Transcribed),
            "rewritten" => Ok(Stage::Rewritten),
            "synthesized" => Ok(Stage::Synthesized),
            "rendered" => Ok(Stage::Rendered),
            "failed" => Ok(Stage::Failed),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}

/// Last failure recorded on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    /// Classification (decides whether a retry makes sense).
    pub kind: ErrorKind,
    /// Human-readable description from the failing adapter.
    pub message: String,
}

/// The persisted record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, immutable after creation.
    pub id: Uuid,
    /// Human-readable name, used for display only.
    pub name: String,
    /// Stage reached so far.
    pub stage: Stage,
    /// Original input reference (file path or remote URL).
    pub source: String,
    /// ASR engine selected at submission time.
    pub asr_engine: AsrEngine,
    /// Render engine selected at submission time.
    pub render_engine: RenderEngine,
    /// Local media/audio file produced by the download stage.
    pub media_path: Option<PathBuf>,
    /// Raw ASR transcript.
    pub transcript: Option<String>,
    /// Remote ASR task id (Volcengine), kept so an interrupted poll can resume.
    pub asr_task_id: Option<String>,
    /// Rewritten two-speaker dialogue script.
    pub script: Option<String>,
    /// Synthesized dialogue audio.
    pub audio_path: Option<PathBuf>,
    /// Final rendered video.
    pub video_path: Option<PathBuf>,
    /// Last failure; present only when `stage == Failed`.
    pub error: Option<TaskError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial field set produced by one stage adapter on success.
///
/// Only the fields belonging to the completed stage are set; the
/// controller merges them into the task and advances the stage.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub media_path: Option<PathBuf>,
    pub transcript: Option<String>,
    pub asr_task_id: Option<String>,
    pub script: Option<String>,
    pub audio_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
}

impl StageOutput {
    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.media_path.is_none()
            && self.transcript.is_none()
            && self.asr_task_id.is_none()
            && self.script.is_none()
            && self.audio_path.is_none()
            && self.video_path.is_none()
    }
}

impl Task {
    /// Create a fresh task at `Created`.
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
        asr_engine: AsrEngine,
        render_engine: RenderEngine,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            stage: Stage::Created,
            source: source.into(),
            asr_engine,
            render_engine,
            media_path: None,
            transcript: None,
            asr_task_id: None,
            script: None,
            audio_path: None,
            video_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The last stage whose output is durably present.
    ///
    /// Derived from the artifact fields rather than `stage`, so it stays
    /// correct when the task is `Failed`: completed fields survive a
    /// failure and tell us where to resume.
    pub fn last_completed(&self) -> Stage {
        if self.video_path.is_some() {
            Stage::Rendered
        } else if self.audio_path.is_some() {
            Stage::Synthesized
        } else if self.script.is_some() {
            Stage::Rewritten
        } else if self.transcript.is_some() {
            Stage::Transcribed
        } else if self.media_path.is_some() {
            Stage::Downloaded
        } else {
            Stage::Created
        }
    }

    /// The stage that should run next, or None if the task is complete.
    pub fn next_stage(&self) -> Option<Stage> {
        self.last_completed().next()
    }

    fn merge(&mut self, output: StageOutput) {
        if let Some(p) = output.media_path {
            self.media_path = Some(p);
        }
        if let Some(t) = output.transcript {
            self.transcript = Some(t);
        }
        if let Some(id) = output.asr_task_id {
            self.asr_task_id = Some(id);
        }
        if let Some(s) = output.script {
            self.script = Some(s);
        }
        if let Some(p) = output.audio_path {
            self.audio_path = Some(p);
        }
        if let Some(p) = output.video_path {
            self.video_path = Some(p);
        }
    }

    /// Merge a stage's output, advance to `stage`, and clear any prior error.
    pub fn advance(&mut self, stage: Stage, output: StageOutput) {
        self.merge(output);
        self.stage = stage;
        self.error = None;
        self.updated_at = Utc::now();
    }

    /// Merge a stage's partial output without advancing the stage.
    ///
    /// Used for progress that must survive a crash mid-stage, such as a
    /// remote ASR task id recorded before polling starts.
    pub fn checkpoint(&mut self, output: StageOutput) {
        self.merge(output);
        self.updated_at = Utc::now();
    }

    /// Record a failure; completed fields are left untouched.
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.stage = Stage::Failed;
        self.error = Some(TaskError {
            kind,
            message: message.into(),
        });
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(
            "https://example.com/v.mp4",
            "Demo",
            AsrEngine::DashScope,
            RenderEngine::Mux,
        )
    }

    #[test]
    fn test_stage_order() {
        let mut stage = Stage::Created;
        for expected in Stage::PIPELINE {
            stage = stage.next().unwrap();
            assert_eq!(stage, expected);
        }
        assert_eq!(stage.next(), None);
        assert_eq!(Stage::Failed.next(), None);
        assert!(Stage::Rendered.is_complete());
    }

    #[test]
    fn test_stage_string_round_trip() {
        for stage in [
            Stage::Created,
            Stage::Downloaded,
            Stage::Transcribed,
            Stage::Rewritten,
            Stage::Synthesized,
            Stage::Rendered,
            Stage::Failed,
        ] {
            let parsed: Stage = stage.to_string().parse().unwrap();
            assert_eq!(parsed, stage);
        }
    }

    #[test]
    fn test_advance_merges_output() {
        let mut t = task();
        t.advance(
            Stage::Downloaded,
            StageOutput {
                media_path: Some(PathBuf::from("audio.mp3")),
                ..Default::default()
            },
        );
        assert_eq!(t.stage, Stage::Downloaded);
        assert_eq!(t.media_path.as_deref(), Some(std::path::Path::new("audio.mp3")));
        assert_eq!(t.last_completed(), Stage::Downloaded);
        assert_eq!(t.next_stage(), Some(Stage::Transcribed));
    }

    #[test]
    fn test_failure_preserves_completed_fields() {
        let mut t = task();
        t.advance(
            Stage::Transcribed,
            StageOutput {
                media_path: Some(PathBuf::from("audio.mp3")),
                transcript: Some("hello".into()),
                ..Default::default()
            },
        );
        t.fail(ErrorKind::Transient, "rate limited");

        assert_eq!(t.stage, Stage::Failed);
        assert_eq!(t.transcript.as_deref(), Some("hello"));
        // Resume should re-run the stage after the last completed one.
        assert_eq!(t.last_completed(), Stage::Transcribed);
        assert_eq!(t.next_stage(), Some(Stage::Rewritten));
    }

    #[test]
    fn test_checkpoint_does_not_advance_stage() {
        let mut t = task();
        t.advance(
            Stage::Downloaded,
            StageOutput {
                media_path: Some(PathBuf::from("audio.mp3")),
                ..Default::default()
            },
        );
        t.checkpoint(StageOutput {
            asr_task_id: Some("req-1|log-1".into()),
            ..Default::default()
        });

        assert_eq!(t.stage, Stage::Downloaded);
        assert_eq!(t.asr_task_id.as_deref(), Some("req-1|log-1"));
        // The id is durable, but does not count as stage completion.
        assert_eq!(t.last_completed(), Stage::Downloaded);
        assert!(StageOutput::default().is_empty());
    }

    #[test]
    fn test_advance_clears_error() {
        let mut t = task();
        t.fail(ErrorKind::Transient, "boom");
        t.advance(
            Stage::Downloaded,
            StageOutput {
                media_path: Some(PathBuf::from("a.mp3")),
                ..Default::default()
            },
        );
        assert!(t.error.is_none());
        assert_eq!(t.stage, Stage::Downloaded);
    }
}
