use remedy_core::{
    output_schema, AnalyzeCodeInput, AnalyzeCodeOutput, SuggestFixesInput, SuggestFixesOutput,
};
use serde::Serialize;

/// The two fixed instruction templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Template {
    AnalyzeCode,
    SuggestFixes,
}

impl Template {
    pub fn id(self) -> &'static str {
        match self {
            Template::AnalyzeCode => "analyzeCodePrompt",
            Template::SuggestFixes => "suggestFixesPrompt",
        }
    }

    /// Name of the structured-output record the template asks for.
    pub fn output_name(self) -> &'static str {
        match self {
            Template::AnalyzeCode => "AnalyzeCodeOutput",
            Template::SuggestFixes => "SuggestFixesOutput",
        }
    }
}

/// A template bound to one input record, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub template: Template,
    /// The input record the template was rendered from.
    pub input: serde_json::Value,
    pub system: String,
    pub user: String,
    /// JSON Schema the response must satisfy.
    pub schema: serde_json::Value,
}

fn output_instructions(schema: &serde_json::Value) -> String {
    format!(
        "Output ONLY a JSON object matching this JSON Schema, with no prose and no code fences:\n{}",
        serde_json::to_string_pretty(schema).unwrap_or_default()
    )
}

pub fn analyze_request(input: &AnalyzeCodeInput) -> PromptRequest {
    let schema = output_schema::<AnalyzeCodeOutput>();
    let system = format!(
        "You are an expert code analyst. Analyze the following code snippet for potential errors, \
bugs, and areas for improvement. Provide suggestions for fixing the issues.\n\n\
Put the whole analysis as readable text in the \"analysis\" field.\n\n{}",
        output_instructions(&schema)
    );
    let user = format!("Language: {}\nCode:\n{}\n", input.language, input.code);

    PromptRequest {
        template: Template::AnalyzeCode,
        input: serde_json::to_value(input).unwrap_or_default(),
        system,
        user,
        schema,
    }
}

pub fn suggest_request(input: &SuggestFixesInput) -> PromptRequest {
    let schema = output_schema::<SuggestFixesOutput>();
    let system = format!(
        "You are an expert software developer specializing in debugging and improving code.\n\n\
You will use this information to improve the code, and suggest fixes. You will provide the \
improved code and an array of suggestions that explains the changes made.\n\n\
Use the following as the primary source of information about the code.\n\n\
\"improvedCode\" holds the complete corrected code only. \"suggestions\" holds one entry per \
change, each a short explanation; use an empty array if nothing needs to change.\n\n{}",
        output_instructions(&schema)
    );
    let user = format!(
        "Language: {}\nCode: {}\nErrors: {}\n\nRespond with the improved code and suggestions array.",
        input.language,
        input.code,
        input.errors.as_deref().unwrap_or("")
    );

    PromptRequest {
        template: Template::SuggestFixes,
        input: serde_json::to_value(input).unwrap_or_default(),
        system,
        user,
        schema,
    }
}
