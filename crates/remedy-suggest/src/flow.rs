//! Two-stage flow controller.
//!
//! One submission runs analysis, then feeds the analysis text into the
//! suggestion stage. State lives in a `watch` channel so any number of views
//! can observe both in-flight flags. Every submission bumps a generation
//! counter; a stage result whose generation is no longer current is dropped.

use std::sync::{Arc, PoisonError, RwLock};

use remedy_core::{AnalyzeCodeOutput, CodeInputForm, CodeSubmission, FormErrors, SuggestFixesOutput};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::actions::{self, ActionResult};
use crate::engine::TextModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Analysis,
    Suggestion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    Analyzing,
    AnalysisFailed,
    Suggesting,
    SuggestionFailed,
    Completed,
}

/// Values the page displays that can be copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplayField {
    OriginalCode,
    Analysis,
    ImprovedCode,
    Suggestions,
}

impl DisplayField {
    /// Name used in copy feedback, e.g. "Suggested code has been copied."
    pub fn label(self) -> &'static str {
        match self {
            DisplayField::OriginalCode => "Original code",
            DisplayField::Analysis => "Analysis",
            DisplayField::ImprovedCode => "Suggested code",
            DisplayField::Suggestions => "Suggestions",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowState {
    pub generation: u64,
    pub submission: Option<CodeSubmission>,
    pub analysis_result: Option<AnalyzeCodeOutput>,
    pub suggestion_result: Option<SuggestFixesOutput>,
    pub is_loading_analysis: bool,
    pub is_loading_suggestions: bool,
    pub error: Option<StageError>,
}

impl FlowState {
    fn started(generation: u64, submission: CodeSubmission) -> Self {
        Self {
            generation,
            submission: Some(submission),
            is_loading_analysis: true,
            ..Self::default()
        }
    }

    /// True while either stage is in flight; the submit action is disabled.
    pub fn is_busy(&self) -> bool {
        self.is_loading_analysis || self.is_loading_suggestions
    }

    pub fn phase(&self) -> Phase {
        if self.is_loading_analysis {
            return Phase::Analyzing;
        }
        if self.is_loading_suggestions {
            return Phase::Suggesting;
        }
        match (&self.error, &self.suggestion_result) {
            (Some(StageError { stage: Stage::Analysis, .. }), _) => Phase::AnalysisFailed,
            (Some(StageError { stage: Stage::Suggestion, .. }), _) => Phase::SuggestionFailed,
            (None, Some(_)) => Phase::Completed,
            (None, None) => Phase::Idle,
        }
    }

    /// The text currently displayed for `field`, if any.
    pub fn display_text(&self, field: DisplayField) -> Option<String> {
        match field {
            DisplayField::OriginalCode => self.submission.as_ref().map(|s| s.code().to_string()),
            DisplayField::Analysis => self.analysis_result.as_ref().map(|a| a.analysis.clone()),
            DisplayField::ImprovedCode => self
                .suggestion_result
                .as_ref()
                .map(|s| s.improved_code.clone()),
            DisplayField::Suggestions => self
                .suggestion_result
                .as_ref()
                .map(|s| s.suggestions.join("\n")),
        }
    }
}

/// Transient failure notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub generation: u64,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SubmissionOutcome {
    AnalysisFailed {
        error: String,
    },
    SuggestionFailed {
        analysis: AnalyzeCodeOutput,
        error: String,
    },
    Completed {
        analysis: AnalyzeCodeOutput,
        suggestions: SuggestFixesOutput,
    },
    /// A newer submission started before this one resolved; its results were dropped.
    Superseded,
}

pub struct FlowController {
    model: RwLock<Arc<dyn TextModel>>,
    state: watch::Sender<FlowState>,
    notices: broadcast::Sender<Notice>,
}

impl FlowController {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        let (state, _) = watch::channel(FlowState::default());
        let (notices, _) = broadcast::channel(16);
        Self {
            model: RwLock::new(model),
            state,
            notices,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Swap the model used by later submissions, e.g. after settings change.
    /// Chains already in flight keep the model they started with.
    pub fn set_model(&self, model: Arc<dyn TextModel>) {
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = model;
    }

    fn current_model(&self) -> Arc<dyn TextModel> {
        let guard = self.model.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Run one submission through both stages.
    ///
    /// Field errors return before any model call and leave state untouched.
    pub async fn submit(&self, form: &CodeInputForm) -> Result<SubmissionOutcome, FormErrors> {
        let submission = form.validate()?;
        let model = self.current_model();

        let mut generation = 0;
        self.state.send_modify(|s| {
            generation = s.generation + 1;
            *s = FlowState::started(generation, submission.clone());
        });
        log::info!(
            "submission {} started ({}, {} chars)",
            generation,
            submission.language(),
            submission.code().chars().count()
        );

        let analysis =
            match actions::perform_code_analysis(model.as_ref(), &submission.analyze_input()).await
            {
                ActionResult::Success(analysis) => analysis,
                ActionResult::Failure { error } => {
                    let applied = self.apply(generation, |s| {
                        s.is_loading_analysis = false;
                        s.error = Some(StageError {
                            stage: Stage::Analysis,
                            message: error.clone(),
                        });
                    });
                    if !applied {
                        return Ok(self.superseded(generation));
                    }
                    self.notify(generation, "Analysis Failed", &error);
                    return Ok(SubmissionOutcome::AnalysisFailed { error });
                }
            };

        let applied = self.apply(generation, |s| {
            s.analysis_result = Some(analysis.clone());
            s.is_loading_analysis = false;
            s.is_loading_suggestions = true;
        });
        if !applied {
            return Ok(self.superseded(generation));
        }

        let suggest_input = submission.suggest_input(&analysis.analysis);
        match actions::perform_suggest_fixes(model.as_ref(), &suggest_input).await {
            ActionResult::Success(suggestions) => {
                let applied = self.apply(generation, |s| {
                    s.suggestion_result = Some(suggestions.clone());
                    s.is_loading_suggestions = false;
                });
                if !applied {
                    return Ok(self.superseded(generation));
                }
                log::info!(
                    "submission {} completed with {} suggestions",
                    generation,
                    suggestions.suggestions.len()
                );
                Ok(SubmissionOutcome::Completed {
                    analysis,
                    suggestions,
                })
            }
            ActionResult::Failure { error } => {
                let applied = self.apply(generation, |s| {
                    s.is_loading_suggestions = false;
                    s.error = Some(StageError {
                        stage: Stage::Suggestion,
                        message: error.clone(),
                    });
                });
                if !applied {
                    return Ok(self.superseded(generation));
                }
                self.notify(generation, "Suggestion Failed", &error);
                Ok(SubmissionOutcome::SuggestionFailed { analysis, error })
            }
        }
    }

    /// Mutate state only if `generation` is still current.
    fn apply(&self, generation: u64, f: impl FnOnce(&mut FlowState)) -> bool {
        self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            f(s);
            true
        })
    }

    fn superseded(&self, generation: u64) -> SubmissionOutcome {
        log::debug!("dropping stale result for submission {}", generation);
        SubmissionOutcome::Superseded
    }

    fn notify(&self, generation: u64, title: &str, description: &str) {
        // No subscribers is fine.
        let _ = self.notices.send(Notice {
            generation,
            title: title.to_string(),
            description: description.to_string(),
        });
    }
}
