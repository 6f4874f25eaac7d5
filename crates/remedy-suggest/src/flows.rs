//! Template invocations: validate, render, one model call, parse.

use remedy_core::{AnalyzeCodeInput, AnalyzeCodeOutput, SuggestFixesInput, SuggestFixesOutput};

use crate::engine::TextModel;
use crate::error::InvocationError;
use crate::parse::parse_output;
use crate::prompt;

pub async fn analyze_code(
    model: &dyn TextModel,
    input: &AnalyzeCodeInput,
) -> Result<AnalyzeCodeOutput, InvocationError> {
    input.validate()?;
    let request = prompt::analyze_request(input);
    let raw = model.complete(&request).await?;
    parse_output(&raw)
}

pub async fn suggest_fixes(
    model: &dyn TextModel,
    input: &SuggestFixesInput,
) -> Result<SuggestFixesOutput, InvocationError> {
    input.validate()?;
    let request = prompt::suggest_request(input);
    let raw = model.complete(&request).await?;
    parse_output(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    #[tokio::test]
    async fn invalid_input_never_reaches_the_model() {
        let model = ScriptedModel::new(vec![]);
        let err = analyze_code(
            &model,
            &AnalyzeCodeInput {
                code: String::new(),
                language: "go".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InvocationError::InvalidInput(_)));
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn one_request_per_invocation() {
        let model = ScriptedModel::new(vec![Ok(
            r#"{"improvedCode":"package main","suggestions":["Declare the package"]}"#.into(),
        )]);
        let out = suggest_fixes(
            &model,
            &SuggestFixesInput {
                code: "func main() {}".into(),
                language: "go".into(),
                errors: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(out.suggestions.len(), 1);
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_output_is_a_failure_not_an_empty_success() {
        let model = ScriptedModel::new(vec![Ok("I could not analyze this.".into())]);
        let err = analyze_code(
            &model,
            &AnalyzeCodeInput {
                code: "SELECT * FROM t".into(),
                language: "sql".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InvocationError::Schema(_)));
    }
}
