pub mod actions;
pub mod engine;
mod error;
pub mod flow;
pub mod flows;
mod parse;
pub mod prompt;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use actions::{perform_code_analysis, perform_suggest_fixes, ActionResult};
pub use engine::{LlmModel, TextModel};
pub use error::InvocationError;
pub use flow::{
    DisplayField, FlowController, FlowState, Notice, Phase, Stage, StageError, SubmissionOutcome,
};

/// Build the production model for the given settings.
pub fn model_from_settings(settings: &remedy_core::AiSettings) -> Arc<dyn TextModel> {
    log::info!(
        "using {} ({})",
        if settings.provider.is_empty() { "<unset>" } else { settings.provider.as_str() },
        if settings.model.is_empty() { "<unset>" } else { settings.model.as_str() }
    );
    Arc::new(LlmModel::new(settings.clone()))
}
