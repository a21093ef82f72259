//! Deterministic completion provider for tests and offline runs.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use policyqa_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&LlmRequest) -> AppResult<String> + Send + Sync>;

/// Replays canned completions.
///
/// Either pops from a queue of replies (in call order) or computes the reply
/// from the request with a closure. Every prompt seen is recorded.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<AppResult<String>>>,
    responder: Option<Responder>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    /// Replies returned one per call, in order.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            responder: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Reply computed from each request.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&LlmRequest) -> AppResult<String> + Send + Sync + 'static,
    {
        Self {
            replies: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(responder)),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A client whose every call fails with a transport error.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::with_responder(move |_| Err(AppError::Llm(message.clone())))
    }

    /// Queue a transport failure as the next reply.
    pub fn push_error(&self, message: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(AppError::Llm(message.into())));
        }
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of completions requested.
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }

        let queued = self
            .replies
            .lock()
            .map_err(|_| AppError::Llm("scripted client lock poisoned".to_string()))?
            .pop_front();

        let content = match (queued, &self.responder) {
            (Some(reply), _) => reply?,
            (None, Some(responder)) => responder(request)?,
            (None, None) => {
                return Err(AppError::Llm("scripted client has no replies left".to_string()))
            }
        };

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}
