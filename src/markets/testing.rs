//! Shared fakes for unit tests.

use crate::error::MarketGenError;
use crate::markets::client::{Completion, CompletionBackend, CompletionRequest};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;

/// Replays canned replies in order and records every request it receives.
/// Once the script runs out it answers with `EmptyBackendOutput`.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: RefCell<VecDeque<Result<Completion, MarketGenError>>>,
    seen: RefCell<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<Completion, MarketGenError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            seen: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.borrow().clone()
    }
}

impl CompletionBackend for ScriptedBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, MarketGenError> {
        self.seen.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(MarketGenError::EmptyBackendOutput))
    }
}

pub fn reply(
    content: impl Into<String>,
    reasoning: Option<Value>,
) -> Result<Completion, MarketGenError> {
    Ok(Completion {
        content: content.into(),
        reasoning_details: reasoning,
    })
}

/// The provider error a too-long prompt produces.
pub fn overflow() -> Result<Completion, MarketGenError> {
    Err(MarketGenError::BackendHttp {
        status: 400,
        message: "Provider returned error | context_length_exceeded".to_string(),
    })
}
