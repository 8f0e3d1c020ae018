//! Replay and recording oracles
//!
//! A run is reproducible from (scenario, seed, transcript). `RecordingOracle`
//! captures a transcript from any oracle; `ReplayOracle` plays one back.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::ports::{
    ChatMessage, CompletionOptions, CompletionResponse, LlmOracle, OraclePurpose, TokenUsage,
};

/// What happened on one oracle call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReplayOutcome {
    Response { content: String },
    Error { message: String },
    /// The call never completed; replay blocks until the caller gives up
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Entries without a purpose answer any call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<OraclePurpose>,
    #[serde(flatten)]
    pub outcome: ReplayOutcome,
}

impl TranscriptEntry {
    pub fn response(content: impl Into<String>) -> Self {
        Self {
            purpose: None,
            outcome: ReplayOutcome::Response {
                content: content.into(),
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            purpose: None,
            outcome: ReplayOutcome::Error {
                message: message.into(),
            },
        }
    }

    pub fn timeout() -> Self {
        Self {
            purpose: None,
            outcome: ReplayOutcome::Timeout,
        }
    }

    pub fn for_purpose(mut self, purpose: OraclePurpose) -> Self {
        self.purpose = Some(purpose);
        self
    }
}

/// Parse a transcript file (a JSON array of entries)
pub fn parse_transcript(json: &str) -> Result<Vec<TranscriptEntry>, DomainError> {
    Ok(serde_json::from_str(json)?)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct ReplayQueues {
    by_purpose: HashMap<OraclePurpose, VecDeque<ReplayOutcome>>,
    shared: VecDeque<ReplayOutcome>,
}

/// Oracle that answers from a fixed transcript, in order
#[derive(Debug)]
pub struct ReplayOracle {
    queues: Mutex<ReplayQueues>,
    /// Hang instead of failing once the transcript runs out
    hang_when_exhausted: bool,
}

impl ReplayOracle {
    pub fn new(entries: Vec<TranscriptEntry>) -> Self {
        let mut queues = ReplayQueues::default();
        for entry in entries {
            match entry.purpose {
                Some(purpose) => queues
                    .by_purpose
                    .entry(purpose)
                    .or_default()
                    .push_back(entry.outcome),
                None => queues.shared.push_back(entry.outcome),
            }
        }
        Self {
            queues: Mutex::new(queues),
            hang_when_exhausted: false,
        }
    }

    /// Oracle whose every call hangs until the caller's timeout
    pub fn always_timeout() -> Self {
        Self {
            hang_when_exhausted: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn remaining(&self) -> usize {
        let queues = lock(&self.queues);
        queues.shared.len() + queues.by_purpose.values().map(VecDeque::len).sum::<usize>()
    }

    fn next(&self, purpose: OraclePurpose) -> Option<ReplayOutcome> {
        let mut queues = lock(&self.queues);
        if let Some(outcome) = queues
            .by_purpose
            .get_mut(&purpose)
            .and_then(VecDeque::pop_front)
        {
            return Some(outcome);
        }
        queues.shared.pop_front()
    }
}

#[async_trait]
impl LlmOracle for ReplayOracle {
    async fn complete(
        &self,
        purpose: OraclePurpose,
        _messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, DomainError> {
        match self.next(purpose) {
            Some(ReplayOutcome::Response { content }) => Ok(CompletionResponse {
                content,
                model: self.model_id().to_string(),
                usage: TokenUsage::default(),
            }),
            Some(ReplayOutcome::Error { message }) => Err(DomainError::ExternalService(message)),
            Some(ReplayOutcome::Timeout) => std::future::pending().await,
            None if self.hang_when_exhausted => std::future::pending().await,
            None => Err(DomainError::ExternalService(format!(
                "transcript exhausted for {:?}",
                purpose
            ))),
        }
    }

    fn provider_name(&self) -> &str {
        "replay"
    }

    fn model_id(&self) -> &str {
        "transcript"
    }
}

/// Oracle wrapper that records every outcome of the inner oracle
pub struct RecordingOracle {
    inner: Arc<dyn LlmOracle>,
    transcript: Arc<Mutex<Vec<TranscriptEntry>>>,
}

impl RecordingOracle {
    pub fn new(inner: Arc<dyn LlmOracle>) -> Self {
        Self {
            inner,
            transcript: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Entries recorded so far, in call order
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        lock(&self.transcript).clone()
    }

    pub fn transcript_json(&self) -> Result<String, DomainError> {
        Ok(serde_json::to_string_pretty(&self.transcript())?)
    }
}

/// Records a timeout if the call is dropped before it completes
struct PendingCall {
    purpose: OraclePurpose,
    transcript: Arc<Mutex<Vec<TranscriptEntry>>>,
    outcome: Option<ReplayOutcome>,
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or(ReplayOutcome::Timeout);
        lock(&self.transcript).push(TranscriptEntry {
            purpose: Some(self.purpose),
            outcome,
        });
    }
}

#[async_trait]
impl LlmOracle for RecordingOracle {
    async fn complete(
        &self,
        purpose: OraclePurpose,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, DomainError> {
        let mut pending = PendingCall {
            purpose,
            transcript: Arc::clone(&self.transcript),
            outcome: None,
        };
        let result = self.inner.complete(purpose, messages, options).await;
        pending.outcome = Some(match &result {
            Ok(response) => ReplayOutcome::Response {
                content: response.content.clone(),
            },
            Err(e) => ReplayOutcome::Error {
                message: e.to_string(),
            },
        });
        result
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn ask(oracle: &dyn LlmOracle, purpose: OraclePurpose) -> Result<String, DomainError> {
        oracle
            .complete_simple(purpose, "system", "prompt", &CompletionOptions::default())
            .await
    }

    #[tokio::test]
    async fn test_replay_in_order_with_purpose_queues() {
        let oracle = ReplayOracle::new(vec![
            TranscriptEntry::response("shared-1"),
            TranscriptEntry::response("analysis").for_purpose(OraclePurpose::Analysis),
            TranscriptEntry::error("boom"),
        ]);
        assert_eq!(ask(&oracle, OraclePurpose::Analysis).await.unwrap(), "analysis");
        assert_eq!(ask(&oracle, OraclePurpose::Assessment).await.unwrap(), "shared-1");
        assert!(ask(&oracle, OraclePurpose::Assessment).await.is_err());
        assert_eq!(oracle.remaining(), 0);
        assert!(ask(&oracle, OraclePurpose::Assessment).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_entry_hangs() {
        let oracle = ReplayOracle::new(vec![TranscriptEntry::timeout()]);
        let call = ask(&oracle, OraclePurpose::Assessment);
        let result = tokio::time::timeout(Duration::from_secs(20), call).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_captures_timeouts() {
        let inner = Arc::new(ReplayOracle::new(vec![
            TranscriptEntry::response("ok"),
            TranscriptEntry::timeout(),
        ]));
        let recorder = RecordingOracle::new(inner);
        assert_eq!(ask(&recorder, OraclePurpose::Assessment).await.unwrap(), "ok");
        let call = ask(&recorder, OraclePurpose::Assessment);
        let timed_out = tokio::time::timeout(Duration::from_secs(5), call).await;
        assert!(timed_out.is_err());

        let transcript = recorder.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].outcome, ReplayOutcome::Timeout);

        let json = recorder.transcript_json().unwrap();
        assert_eq!(parse_transcript(&json).unwrap(), transcript);
    }
}
