use std::sync::Arc;

use remedy_core::{AnalyzeCodeInput, CodeInputForm, Language, SuggestFixesInput};
use remedy_suggest::{ActionResult, FlowController, SubmissionOutcome, TextModel};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AnalyzeCodeRequest {
    /// The code snippet to analyze
    code: String,
    /// Programming language of the snippet, e.g. "python"
    language: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SuggestFixesRequest {
    /// The code snippet that needs improvement
    code: String,
    /// Programming language of the snippet
    language: String,
    /// Known problems to fix, e.g. the output of analyze_code
    #[serde(default)]
    errors: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ReviewCodeRequest {
    /// The code snippet, 10 to 10,000 characters
    code: String,
    /// One of the ids returned by list_languages. Defaults to javascript.
    #[serde(default)]
    language: Option<String>,
}

#[derive(Clone)]
pub struct RemedyServer {
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl RemedyServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    /// Settings are re-read per call so edits made in the desktop app apply immediately.
    fn model(&self) -> Arc<dyn TextModel> {
        remedy_suggest::model_from_settings(&remedy_core::read_settings())
    }

    #[tool(description = "List the language ids accepted by review_code")]
    fn list_languages(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            format_languages(),
        )]))
    }

    #[tool(
        description = "Analyze a code snippet for potential errors, bugs, and areas for improvement. Returns {analysis} or {error}."
    )]
    async fn analyze_code(
        &self,
        Parameters(req): Parameters<AnalyzeCodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let input = AnalyzeCodeInput {
            code: req.code,
            language: req.language,
        };
        let result = remedy_suggest::perform_code_analysis(self.model().as_ref(), &input).await;
        Ok(action_to_tool_result(result))
    }

    #[tool(
        description = "Produce improved code plus one suggestion per change. Pass known problems in `errors`. Returns {improvedCode, suggestions} or {error}."
    )]
    async fn suggest_fixes(
        &self,
        Parameters(req): Parameters<SuggestFixesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let input = SuggestFixesInput {
            code: req.code,
            language: req.language,
            errors: req.errors,
        };
        let result = remedy_suggest::perform_suggest_fixes(self.model().as_ref(), &input).await;
        Ok(action_to_tool_result(result))
    }

    #[tool(
        description = "Full review: validates the snippet, analyzes it, then feeds the analysis into suggest_fixes. Returns the analysis even when the suggestion stage fails."
    )]
    async fn review_code(
        &self,
        Parameters(req): Parameters<ReviewCodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        match run_review(self.model(), req).await {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e)])),
        }
    }
}

#[tool_handler]
impl ServerHandler for RemedyServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = "Code Remedy reviews code snippets with a language model. \
Prefer `review_code` for a one-shot review: it returns the analysis, the improved code and \
a list of suggestions. Use `analyze_code` and `suggest_fixes` to run the stages separately. \
Results are model output and may differ between calls.";

// --- Helpers ---

fn action_to_tool_result<T: serde::Serialize>(result: ActionResult<T>) -> CallToolResult {
    let failed = matches!(result, ActionResult::Failure { .. });
    let json = serde_json::to_string_pretty(&result)
        .unwrap_or_else(|e| format!("{{\"error\": \"Serialization error: {}\"}}", e));
    if failed {
        CallToolResult::error(vec![Content::text(json)])
    } else {
        CallToolResult::success(vec![Content::text(json)])
    }
}

fn format_languages() -> String {
    Language::ALL
        .iter()
        .map(|l| format!("{} ({})", l.id(), l.label()))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn run_review(model: Arc<dyn TextModel>, req: ReviewCodeRequest) -> Result<String, String> {
    let mut form = CodeInputForm::default();
    form.code = req.code;
    if let Some(language) = req.language {
        form.language = language;
    }

    let flow = FlowController::new(model);
    let outcome = flow.submit(&form).await.map_err(|e| e.to_string())?;
    match outcome {
        SubmissionOutcome::AnalysisFailed { error } => Err(error),
        SubmissionOutcome::Superseded => Err("Review was superseded.".to_string()),
        other => Ok(format_review(&form.language, &other)),
    }
}

fn format_review(language: &str, outcome: &SubmissionOutcome) -> String {
    let mut out = String::new();
    match outcome {
        SubmissionOutcome::Completed {
            analysis,
            suggestions,
        } => {
            out.push_str("## Analysis\n\n");
            out.push_str(analysis.analysis.trim());
            out.push_str("\n\n## Improved code\n\n```");
            out.push_str(&language.to_ascii_lowercase());
            out.push('\n');
            out.push_str(suggestions.improved_code.trim_end());
            out.push_str("\n```\n\n## Suggestions\n\n");
            if suggestions.suggestions.is_empty() {
                out.push_str("No changes suggested.\n");
            }
            for (i, s) in suggestions.suggestions.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, s));
            }
        }
        SubmissionOutcome::SuggestionFailed { analysis, error } => {
            out.push_str("## Analysis\n\n");
            out.push_str(analysis.analysis.trim());
            out.push_str("\n\n## Suggestions\n\n");
            out.push_str(error);
            out.push('\n');
        }
        SubmissionOutcome::AnalysisFailed { error } => out.push_str(error),
        SubmissionOutcome::Superseded => {}
    }
    out
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol; env_logger writes to stderr
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let service = RemedyServer::new()
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| log::error!("MCP server error: {}", e))?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedy_core::{AnalyzeCodeOutput, SuggestFixesOutput};
    use remedy_suggest::prompt::{PromptRequest, Template};
    use remedy_suggest::InvocationError;

    /// Answers each template with a fixed body.
    struct FixedModel {
        analysis: Result<String, ()>,
        suggestions: Result<String, ()>,
    }

    #[async_trait::async_trait]
    impl TextModel for FixedModel {
        async fn complete(&self, request: &PromptRequest) -> Result<String, InvocationError> {
            let reply = match request.template {
                Template::AnalyzeCode => &self.analysis,
                Template::SuggestFixes => &self.suggestions,
            };
            reply
                .clone()
                .map_err(|_| InvocationError::Request("offline".into()))
        }
    }

    fn model(analysis: Result<&str, ()>, suggestions: Result<&str, ()>) -> Arc<dyn TextModel> {
        Arc::new(FixedModel {
            analysis: analysis.map(str::to_string),
            suggestions: suggestions.map(str::to_string),
        })
    }

    fn review(code: &str) -> ReviewCodeRequest {
        ReviewCodeRequest {
            code: code.to_string(),
            language: Some("rust".to_string()),
        }
    }

    #[tokio::test]
    async fn review_renders_all_sections() {
        let m = model(
            Ok(r#"{"analysis":"Unused variable."}"#),
            Ok(r#"{"improvedCode":"fn main() {}","suggestions":["Remove x","Drop mut"]}"#),
        );
        let text = run_review(m, review("fn main() { let mut x = 1; }"))
            .await
            .unwrap();
        assert!(text.contains("## Analysis\n\nUnused variable."));
        assert!(text.contains("```rust\nfn main() {}\n```"));
        assert!(text.contains("1. Remove x\n2. Drop mut\n"));
    }

    #[tokio::test]
    async fn review_keeps_analysis_when_suggestions_fail() {
        let m = model(Ok(r#"{"analysis":"Unused variable."}"#), Err(()));
        let text = run_review(m, review("fn main() { let mut x = 1; }"))
            .await
            .unwrap();
        assert!(text.contains("Unused variable."));
        assert!(text.contains("Failed to suggest fixes. Please try again."));
    }

    #[tokio::test]
    async fn review_rejects_short_code_before_calling_the_model() {
        let m = model(Err(()), Err(()));
        let err = run_review(m, review("fn f(){}")).await.unwrap_err();
        assert_eq!(err, "Code must be at least 10 characters.");
    }

    #[tokio::test]
    async fn review_surfaces_analysis_failure() {
        let m = model(Err(()), Err(()));
        let err = run_review(m, review("fn main() { println!(\"hi\"); }"))
            .await
            .unwrap_err();
        assert_eq!(err, "Failed to analyze code. Please try again.");
    }

    #[test]
    fn review_of_empty_suggestions_says_so() {
        let outcome = SubmissionOutcome::Completed {
            analysis: AnalyzeCodeOutput {
                analysis: "Fine.".into(),
            },
            suggestions: SuggestFixesOutput {
                improved_code: "x".into(),
                suggestions: vec![],
            },
        };
        assert!(format_review("python", &outcome).contains("No changes suggested."));
    }

    #[test]
    fn languages_list_every_id() {
        let text = format_languages();
        assert_eq!(text.lines().count(), Language::ALL.len());
        assert!(text.contains("csharp (C#)"));
    }
}
