//! Pipeline controller.
//!
//! Drives a task through the stage adapters in order. The controller
//! owns sequencing and persistence only: each adapter result is saved
//! before the next stage starts, failures are recorded on the task with
//! their classification, and retry decisions are left to the adapters
//! (transient retries) and the caller (resume).

use crate::config::{RenderEngine, Settings};
use crate::error::{RecastError, Result};
use crate::stage::{
    DownloadAdapter, RenderAdapter, RewriteAdapter, StageAdapter, SynthesizeAdapter,
    TranscribeAdapter,
};
use crate::task::{NewTask, SqliteTaskStore, Stage, Task, TaskStore};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

pub struct Pipeline {
    store: Arc<dyn TaskStore>,
    adapters: Vec<Arc<dyn StageAdapter>>,
}

impl Pipeline {
    /// Build the full pipeline from settings, with the real adapters and
    /// the on-disk SQLite store.
    pub fn new(settings: &Settings) -> Result<Self> {
        let store = Arc::new(SqliteTaskStore::new(&settings.sqlite_path())?);
        let adapters: Vec<Arc<dyn StageAdapter>> = vec![
            Arc::new(DownloadAdapter::new(settings.clone())),
            Arc::new(TranscribeAdapter::new(settings.clone())),
            Arc::new(RewriteAdapter::new(settings.rewrite.clone(), settings.retry)),
            Arc::new(SynthesizeAdapter::new(settings.clone())),
            Arc::new(RenderAdapter::new(settings.clone())),
        ];
        Ok(Self { store, adapters })
    }

    /// Assemble a pipeline from explicit parts.
    pub fn with_components(
        store: Arc<dyn TaskStore>,
        adapters: Vec<Arc<dyn StageAdapter>>,
    ) -> Self {
        Self { store, adapters }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    fn adapter_for(&self, stage: Stage) -> Result<&Arc<dyn StageAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.stage() == stage)
            .ok_or_else(|| {
                RecastError::Unrecoverable(format!("No adapter registered for stage {}", stage))
            })
    }

    /// Create and persist a fresh task.
    pub async fn submit(&self, new: NewTask) -> Result<Task> {
        self.store.create(new).await
    }

    /// Run the next pending stage.
    ///
    /// On success the task is advanced and saved; on failure the task is
    /// marked `Failed` with the error's classification and saved, and the
    /// error is returned to the caller.
    #[instrument(skip_all, fields(task_id = %task.id))]
    pub async fn advance(&self, task: &mut Task) -> Result<Stage> {
        let stage = task.next_stage().ok_or_else(|| {
            RecastError::InvalidInput(format!("Task {} is already complete", task.id))
        })?;

        info!("Running stage {} for task '{}'", stage, task.name);
        let adapter = self.adapter_for(stage)?;

        // Persist any durable preparation before the stage proper runs,
        // so it survives a failure of the long-running part.
        match adapter.prepare(task).await {
            Ok(output) if !output.is_empty() => {
                task.checkpoint(output);
                self.store.save(task).await?;
            }
            Ok(_) => {}
            Err(e) => {
                error!("Stage {} preparation failed: {}", stage, e);
                task.fail(e.kind(), e.to_string());
                self.store.save(task).await?;
                return Err(e);
            }
        }

        match adapter.run(task).await {
            Ok(output) => {
                task.advance(stage, output);
                self.store.save(task).await?;
                Ok(stage)
            }
            Err(e) => {
                error!("Stage {} failed: {}", stage, e);
                task.fail(e.kind(), e.to_string());
                self.store.save(task).await?;
                Err(e)
            }
        }
    }

    /// Run all remaining stages in order.
    pub async fn run_to_completion(&self, task: &mut Task) -> Result<()> {
        while task.next_stage().is_some() {
            self.advance(task).await?;
        }
        info!("Task '{}' complete", task.name);
        Ok(())
    }

    /// Resume a stored task from its last completed stage.
    ///
    /// Completed artifacts are kept; the first missing one decides where
    /// work restarts, so a failed task re-runs only the stage that broke.
    pub async fn resume(&self, id: Uuid) -> Result<Task> {
        let mut task = self.store.load(id).await?;
        if task.next_stage().is_none() {
            return Err(RecastError::InvalidInput(format!(
                "Task {} is already complete",
                id
            )));
        }
        self.run_to_completion(&mut task).await?;
        Ok(task)
    }

    /// Re-run just the render stage of a completed task, optionally with
    /// a different render engine.
    pub async fn rerender(&self, id: Uuid, engine: Option<RenderEngine>) -> Result<Task> {
        let mut task = self.store.load(id).await?;
        if task.audio_path.is_none() {
            return Err(RecastError::InvalidInput(format!(
                "Task {} has no synthesized audio to render",
                id
            )));
        }
        if let Some(engine) = engine {
            task.render_engine = engine;
        }
        task.video_path = None;
        self.advance(&mut task).await?;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AsrEngine;
    use crate::error::ErrorKind;
    use crate::task::StageOutput;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Scripted adapter: produces a fixed output shape, optionally
    /// failing the next invocation, optionally with a prepare step.
    struct StubAdapter {
        stage: Stage,
        make: fn(&Task) -> StageOutput,
        prepare_make: Option<fn(&Task) -> StageOutput>,
        fail_next: AtomicBool,
    }

    impl StubAdapter {
        fn new(stage: Stage, make: fn(&Task) -> StageOutput) -> Arc<Self> {
            Arc::new(Self {
                stage,
                make,
                prepare_make: None,
                fail_next: AtomicBool::new(false),
            })
        }

        fn with_prepare(
            stage: Stage,
            prepare_make: fn(&Task) -> StageOutput,
            make: fn(&Task) -> StageOutput,
        ) -> Arc<Self> {
            Arc::new(Self {
                stage,
                make,
                prepare_make: Some(prepare_make),
                fail_next: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl StageAdapter for StubAdapter {
        fn stage(&self) -> Stage {
            self.stage
        }

        async fn prepare(&self, task: &Task) -> Result<StageOutput> {
            match self.prepare_make {
                Some(make) => Ok(make(task)),
                None => Ok(StageOutput::default()),
            }
        }

        async fn run(&self, task: &Task) -> Result<StageOutput> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(RecastError::Transient("service unavailable".into()));
            }
            Ok((self.make)(task))
        }
    }

    fn stub_adapters() -> (Vec<Arc<dyn StageAdapter>>, Arc<StubAdapter>) {
        let synthesize = StubAdapter::new(Stage::Synthesized, |t| StageOutput {
            audio_path: Some(PathBuf::from(format!("{}-mix.wav", t.id))),
            ..Default::default()
        });
        let adapters: Vec<Arc<dyn StageAdapter>> = vec![
            StubAdapter::new(Stage::Downloaded, |t| StageOutput {
                media_path: Some(PathBuf::from(format!("{}-audio.wav", t.id))),
                ..Default::default()
            }),
            StubAdapter::new(Stage::Transcribed, |_| StageOutput {
                transcript: Some("hello world".into()),
                ..Default::default()
            }),
            StubAdapter::new(Stage::Rewritten, |_| StageOutput {
                script: Some("Host: Hello!\nGuest: Hi there.".into()),
                ..Default::default()
            }),
            synthesize.clone(),
            StubAdapter::new(Stage::Rendered, |t| StageOutput {
                video_path: Some(PathBuf::from(format!("{}-final.mp4", t.id))),
                ..Default::default()
            }),
        ];
        (adapters, synthesize)
    }

    fn pipeline() -> (Pipeline, Arc<StubAdapter>) {
        let store = Arc::new(SqliteTaskStore::in_memory().unwrap());
        let (adapters, synthesize) = stub_adapters();
        (Pipeline::with_components(store, adapters), synthesize)
    }

    fn new_task(name: &str) -> NewTask {
        NewTask {
            source: "https://example.com/v".into(),
            name: name.into(),
            asr_engine: AsrEngine::DashScope,
            render_engine: RenderEngine::Mux,
        }
    }

    #[tokio::test]
    async fn test_full_run_reaches_rendered() {
        let (pipeline, _) = pipeline();
        let mut task = pipeline.submit(new_task("demo")).await.unwrap();

        pipeline.run_to_completion(&mut task).await.unwrap();

        assert_eq!(task.stage, Stage::Rendered);
        assert!(task.error.is_none());
        assert_eq!(task.transcript.as_deref(), Some("hello world"));
        assert_eq!(
            task.video_path,
            Some(PathBuf::from(format!("{}-final.mp4", task.id)))
        );

        // Persisted record matches the in-memory one.
        let stored = pipeline.store().load(task.id).await.unwrap();
        assert_eq!(stored.stage, Stage::Rendered);
        assert_eq!(stored.video_path, task.video_path);
    }

    #[tokio::test]
    async fn test_stage_order_is_monotonic() {
        let (pipeline, _) = pipeline();
        let mut task = pipeline.submit(new_task("order")).await.unwrap();

        let mut last = task.stage.position().unwrap();
        while task.next_stage().is_some() {
            let stage = pipeline.advance(&mut task).await.unwrap();
            let pos = stage.position().unwrap();
            assert!(pos > last);
            last = pos;
        }
    }

    #[tokio::test]
    async fn test_failure_then_resume_reruns_only_broken_stage() {
        let (pipeline, synthesize) = pipeline();
        let mut task = pipeline.submit(new_task("flaky")).await.unwrap();
        synthesize.fail_next.store(true, Ordering::SeqCst);

        let err = pipeline.run_to_completion(&mut task).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);

        let stored = pipeline.store().load(task.id).await.unwrap();
        assert_eq!(stored.stage, Stage::Failed);
        assert_eq!(stored.error.as_ref().unwrap().kind, ErrorKind::Transient);
        // Earlier artifacts survive the failure.
        assert_eq!(stored.transcript.as_deref(), Some("hello world"));
        assert!(stored.script.is_some());
        assert!(stored.audio_path.is_none());
        assert_eq!(stored.next_stage(), Some(Stage::Synthesized));

        let resumed = pipeline.resume(task.id).await.unwrap();
        assert_eq!(resumed.stage, Stage::Rendered);
        assert!(resumed.error.is_none());
        assert_eq!(resumed.transcript, stored.transcript);
        assert_eq!(resumed.script, stored.script);
    }

    #[tokio::test]
    async fn test_prepare_checkpoint_survives_stage_failure() {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteTaskStore::in_memory().unwrap());
        // Transcribe-like adapter: records a remote task id in prepare,
        // then the long-running part fails.
        let transcribe = StubAdapter::with_prepare(
            Stage::Transcribed,
            |t| {
                if t.asr_task_id.is_none() {
                    StageOutput {
                        asr_task_id: Some("req-9|log-9".into()),
                        ..Default::default()
                    }
                } else {
                    StageOutput::default()
                }
            },
            |_| StageOutput {
                transcript: Some("hello world".into()),
                ..Default::default()
            },
        );
        let adapters: Vec<Arc<dyn StageAdapter>> = vec![
            StubAdapter::new(Stage::Downloaded, |_| StageOutput {
                media_path: Some(PathBuf::from("audio.wav")),
                ..Default::default()
            }),
            transcribe.clone(),
        ];
        let pipeline = Pipeline::with_components(store, adapters);

        let mut task = pipeline.submit(new_task("poll")).await.unwrap();
        pipeline.advance(&mut task).await.unwrap();

        transcribe.fail_next.store(true, Ordering::SeqCst);
        let err = pipeline.advance(&mut task).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);

        // The submitted remote id was saved before the failure.
        let mut stored = pipeline.store().load(task.id).await.unwrap();
        assert_eq!(stored.stage, Stage::Failed);
        assert_eq!(stored.asr_task_id.as_deref(), Some("req-9|log-9"));
        assert!(stored.transcript.is_none());

        // The retry keeps the recorded id instead of resubmitting.
        pipeline.advance(&mut stored).await.unwrap();
        assert_eq!(stored.stage, Stage::Transcribed);
        assert_eq!(stored.transcript.as_deref(), Some("hello world"));
        assert_eq!(stored.asr_task_id.as_deref(), Some("req-9|log-9"));
    }

    #[tokio::test]
    async fn test_pipeline_builds_without_credentials() {
        std::env::remove_var("DEEPSEEK_API_KEY");

        let dir = tempfile::tempdir().unwrap();
        let mut settings = crate::config::Settings::default();
        settings.store.sqlite_path = dir
            .path()
            .join("tasks.db")
            .to_string_lossy()
            .into_owned();

        assert!(Pipeline::new(&settings).is_ok());
    }

    #[tokio::test]
    async fn test_resume_of_complete_task_is_rejected() {
        let (pipeline, _) = pipeline();
        let mut task = pipeline.submit(new_task("done")).await.unwrap();
        pipeline.run_to_completion(&mut task).await.unwrap();

        let err = pipeline.resume(task.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_rerender_requires_audio() {
        let (pipeline, _) = pipeline();
        let task = pipeline.submit(new_task("fresh")).await.unwrap();

        let err = pipeline.rerender(task.id, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_rerender_overrides_engine() {
        let (pipeline, _) = pipeline();
        let mut task = pipeline.submit(new_task("again")).await.unwrap();
        pipeline.run_to_completion(&mut task).await.unwrap();

        let rerendered = pipeline
            .rerender(task.id, Some(RenderEngine::Animated))
            .await
            .unwrap();
        assert_eq!(rerendered.stage, Stage::Rendered);
        assert_eq!(rerendered.render_engine, RenderEngine::Animated);
        assert!(rerendered.video_path.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_tasks_do_not_interfere() {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteTaskStore::in_memory().unwrap());
        let (adapters_a, _) = stub_adapters();
        let (adapters_b, _) = stub_adapters();
        let a = Arc::new(Pipeline::with_components(store.clone(), adapters_a));
        let b = Arc::new(Pipeline::with_components(store.clone(), adapters_b));

        let mut task_a = a.submit(new_task("a")).await.unwrap();
        let mut task_b = b.submit(new_task("b")).await.unwrap();

        let (ra, rb) = tokio::join!(
            async { a.run_to_completion(&mut task_a).await },
            async { b.run_to_completion(&mut task_b).await },
        );
        ra.unwrap();
        rb.unwrap();

        let stored_a = store.load(task_a.id).await.unwrap();
        let stored_b = store.load(task_b.id).await.unwrap();
        assert_eq!(
            stored_a.video_path,
            Some(PathBuf::from(format!("{}-final.mp4", task_a.id)))
        );
        assert_eq!(
            stored_b.video_path,
            Some(PathBuf::from(format!("{}-final.mp4", task_b.id)))
        );
    }
}
