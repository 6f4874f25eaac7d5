//! Scripted in-memory model for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::engine::TextModel;
use crate::error::InvocationError;
use crate::prompt::PromptRequest;

pub enum Reply {
    Now(Result<String, InvocationError>),
    /// Resolves when the test sends on the paired channel.
    Later(oneshot::Receiver<Result<String, InvocationError>>),
}

pub struct ScriptedModel {
    requests: Mutex<Vec<PromptRequest>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, InvocationError>>) -> Self {
        Self::with_replies(replies.into_iter().map(Reply::Now).collect())
    }

    pub fn with_replies(replies: Vec<Reply>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            replies: Mutex::new(replies.into()),
        }
    }

    pub fn requests(&self) -> Vec<PromptRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn complete(&self, request: &PromptRequest) -> Result<String, InvocationError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Now(result)) => result,
            Some(Reply::Later(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(InvocationError::Request("reply dropped".into()))),
            None => Err(InvocationError::Request("no scripted reply".into())),
        }
    }
}

pub fn network_failure() -> InvocationError {
    InvocationError::Request("connection reset by peer".into())
}
