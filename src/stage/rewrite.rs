//! Rewrite stage: transcript to two-host dialogue script.

use super::{retry_transient, StageAdapter};
use crate::config::{RewriteSettings, RetrySettings};
use crate::error::{RecastError, Result};
use crate::task::{Stage, StageOutput, Task};
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{info, instrument};

const SYSTEM_PROMPT: &str = "\
You rewrite raw transcripts into a lively two-person podcast dialogue.

Rules:
- Exactly two speakers: a Host who leads and summarizes, and a Guest who \
explains and adds depth.
- Output one line per utterance, prefixed with \"Host:\" or \"Guest:\" and \
nothing else. No titles, no markdown, no closing remarks outside the dialogue.
- Cover every substantive point of the transcript; do not invent facts.
- Keep the language of the transcript (Chinese stays Chinese).
- Write for the ear: short sentences, natural transitions, occasional \
spoken interjections such as \"嗯\" or \"right\".
- Never use bracketed stage directions like (laughs); express emotion \
through the words themselves.";

/// Rewrites the transcript into a Host/Guest dialogue via an
/// OpenAI-compatible chat API (DeepSeek by default).
///
/// The API key is resolved per call, not at construction, so building
/// the pipeline for stages that never rewrite needs no credential.
pub struct RewriteAdapter {
    rewrite: RewriteSettings,
    retry: RetrySettings,
}

impl RewriteAdapter {
    pub fn new(rewrite: RewriteSettings, retry: RetrySettings) -> Self {
        Self { rewrite, retry }
    }

    fn client(&self) -> Result<Client<OpenAIConfig>> {
        let api_key = self.rewrite.resolve_api_key()?;
        let config = OpenAIConfig::new()
            .with_api_base(&self.rewrite.base_url)
            .with_api_key(api_key);
        Ok(Client::with_config(config))
    }

    fn classify(e: OpenAIError) -> RecastError {
        match e {
            OpenAIError::Reqwest(inner) => {
                RecastError::Transient(format!("Rewrite request failed: {}", inner))
            }
            OpenAIError::ApiError(api) => {
                let msg = api.message.to_lowercase();
                if msg.contains("rate limit") || msg.contains("overloaded") {
                    RecastError::Transient(format!("Rewrite API throttled: {}", api.message))
                } else {
                    RecastError::Unrecoverable(format!("Rewrite API error: {}", api.message))
                }
            }
            other => RecastError::Unrecoverable(format!("Rewrite failed: {}", other)),
        }
    }

    async fn complete(&self, transcript: &str) -> Result<String> {
        let client = self.client()?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.rewrite.model)
            .temperature(self.rewrite.temperature)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(Self::classify)?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(transcript)
                    .build()
                    .map_err(Self::classify)?
                    .into(),
            ])
            .build()
            .map_err(Self::classify)?;

        let response = client
            .chat()
            .create(request)
            .await
            .map_err(Self::classify)?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RecastError::Unrecoverable("Rewrite returned an empty script".into()))
    }
}

#[async_trait]
impl StageAdapter for RewriteAdapter {
    fn stage(&self) -> Stage {
        Stage::Rewritten
    }

    #[instrument(skip_all, fields(task_id = %task.id))]
    async fn run(&self, task: &Task) -> Result<StageOutput> {
        let transcript = task.transcript.as_deref().ok_or_else(|| {
            RecastError::Unrecoverable("Rewrite stage requires a transcript".into())
        })?;

        let script = retry_transient(&self.retry, || self.complete(transcript)).await?;

        let line_count = script.lines().filter(|l| !l.trim().is_empty()).count();
        info!("Rewrote transcript into {} dialogue lines", line_count);

        Ok(StageOutput {
            script: Some(script),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AsrEngine, RenderEngine};
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_missing_key_surfaces_at_run_time_not_construction() {
        std::env::remove_var("DEEPSEEK_API_KEY");

        // Construction must succeed without a credential.
        let adapter = RewriteAdapter::new(RewriteSettings::default(), RetrySettings::default());

        let mut task = Task::new("src", "t", AsrEngine::DashScope, RenderEngine::Mux);
        task.transcript = Some("hello".into());

        let err = adapter.run(&task).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unrecoverable);
    }
}
