use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bestroute_core::CompletionRequest;
use parking_lot::Mutex;

use crate::{CompletionError, CompletionService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Text(String),
    Fail(String),
}

/// Deterministic stand-in for a completion service.
///
/// Queued replies are consumed in order; once the queue is empty the fallback
/// reply (if any) is returned for every call. Calls are always counted, but
/// request bodies are kept only after [`ScriptedCompletion::recording`].
#[derive(Clone, Default)]
pub struct ScriptedCompletion {
    queue: Arc<Mutex<VecDeque<ScriptedReply>>>,
    fallback: Option<ScriptedReply>,
    calls: Arc<AtomicUsize>,
    requests: Option<Arc<Mutex<Vec<CompletionRequest>>>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(ScriptedReply::Text(text.into())),
            ..Self::default()
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fallback: Some(ScriptedReply::Fail(reason.into())),
            ..Self::default()
        }
    }

    pub fn recording(mut self) -> Self {
        self.requests = Some(Arc::default());
        self
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.queue.lock().push_back(reply);
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push(ScriptedReply::Text(text.into()));
    }

    /// Empty unless the stub was built with `recording()`.
    pub fn recorded_prompts(&self) -> Vec<String> {
        self.requests
            .as_ref()
            .map(|requests| {
                requests
                    .lock()
                    .iter()
                    .map(|request| request.prompt.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        self.queue
            .lock()
            .pop_front()
            .or_else(|| self.fallback.clone())
    }
}

impl CompletionService for ScriptedCompletion {
    fn backend_name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(requests) = &self.requests {
            requests.lock().push(request.clone());
        }

        match self.next_reply() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Fail(reason)) => Err(CompletionError::Unavailable(reason)),
            None => Err(CompletionError::EmptyOutput {
                reason: "scripted queue exhausted".to_string(),
            }),
        }
    }
}
