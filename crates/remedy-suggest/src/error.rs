use remedy_core::SchemaError;
use thiserror::Error;

/// Failure of a single template invocation.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] SchemaError),

    #[error("AI provider is not configured")]
    NotConfigured,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("build LLM: {0}")]
    Build(String),

    #[error("chat: {0}")]
    Request(String),

    #[error("LLM returned no text")]
    EmptyResponse,

    #[error("response does not match the output schema: {0}")]
    Schema(String),
}
