//! Orchestration boundary: no invocation error crosses it in raw form.

use remedy_core::{AnalyzeCodeInput, AnalyzeCodeOutput, SuggestFixesInput, SuggestFixesOutput};
use serde::{Deserialize, Serialize};

use crate::engine::TextModel;
use crate::flows;

pub const ANALYSIS_FAILED: &str = "Failed to analyze code. Please try again.";
pub const SUGGESTIONS_FAILED: &str = "Failed to suggest fixes. Please try again.";

/// Either the operation's output record or `{ "error": "..." }` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionResult<T> {
    Failure { error: String },
    Success(T),
}

impl<T> ActionResult<T> {
    pub fn into_result(self) -> Result<T, String> {
        match self {
            ActionResult::Success(value) => Ok(value),
            ActionResult::Failure { error } => Err(error),
        }
    }
}

pub async fn perform_code_analysis(
    model: &dyn TextModel,
    input: &AnalyzeCodeInput,
) -> ActionResult<AnalyzeCodeOutput> {
    match flows::analyze_code(model, input).await {
        Ok(output) => ActionResult::Success(output),
        Err(e) => {
            log::error!("error in perform_code_analysis: {}", e);
            ActionResult::Failure {
                error: ANALYSIS_FAILED.to_string(),
            }
        }
    }
}

pub async fn perform_suggest_fixes(
    model: &dyn TextModel,
    input: &SuggestFixesInput,
) -> ActionResult<SuggestFixesOutput> {
    match flows::suggest_fixes(model, input).await {
        Ok(output) => ActionResult::Success(output),
        Err(e) => {
            log::error!("error in perform_suggest_fixes: {}", e);
            ActionResult::Failure {
                error: SUGGESTIONS_FAILED.to_string(),
            }
        }
    }
}
