pub mod form;
pub mod language;

use std::fs;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use form::{
    read_code_file, CodeInputForm, CodeSubmission, FieldError, FormErrors, UploadError,
    UPLOAD_EXTENSIONS,
};
pub use language::{Language, DEFAULT_LANGUAGE};

// --- Schemas ---

/// Structural violation of an operation's input record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeCodeInput {
    /// The code snippet to analyze.
    pub code: String,
    /// The programming language of the code snippet.
    pub language: String,
}

impl AnalyzeCodeInput {
    pub fn validate(&self) -> Result<(), SchemaError> {
        require_text("code", &self.code)?;
        require_text("language", &self.language)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeCodeOutput {
    /// The analysis of the code snippet, including potential errors and suggestions.
    pub analysis: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestFixesInput {
    /// The user's code snippet that needs improvement.
    pub code: String,
    /// The programming language of the code.
    pub language: String,
    /// The errors found in the code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

impl SuggestFixesInput {
    pub fn validate(&self) -> Result<(), SchemaError> {
        require_text("code", &self.code)?;
        require_text("language", &self.language)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestFixesOutput {
    /// The improved code with suggestions.
    pub improved_code: String,
    /// The array of suggestions to fix the code.
    pub suggestions: Vec<String>,
}

fn require_text(field: &'static str, value: &str) -> Result<(), SchemaError> {
    if value.is_empty() {
        Err(SchemaError::EmptyField(field))
    } else {
        Ok(())
    }
}

/// JSON Schema for an output record, shaped for strict structured-output modes:
/// no `$schema` key and no additional properties.
pub fn output_schema<T: JsonSchema>() -> serde_json::Value {
    let mut val = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
    if let Some(map) = val.as_object_mut() {
        map.remove("$schema");
        map.insert(
            "additionalProperties".to_string(),
            serde_json::Value::Bool(false),
        );
    }
    val
}

// --- AI Settings ---

pub const PROVIDERS: &[&str] = &[
    "openai", "anthropic", "google", "ollama", "groq", "mistral", "deepseek",
];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings encoding: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
}

/// Resolve the global config directory (~/.code-remedy/).
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".code-remedy")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Read settings from the config dir, then apply `REMEDY_*` environment overrides.
pub fn read_settings() -> AiSettings {
    let mut settings = read_settings_from(&settings_path());
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Missing or unreadable files yield defaults.
pub fn read_settings_from(path: &Path) -> AiSettings {
    if !path.exists() {
        return AiSettings::default();
    }
    match fs::read_to_string(path).map(|s| serde_json::from_str(&s)) {
        Ok(Ok(settings)) => settings,
        Ok(Err(e)) => {
            log::warn!("ignoring malformed settings at {}: {}", path.display(), e);
            AiSettings::default()
        }
        Err(e) => {
            log::warn!("cannot read settings at {}: {}", path.display(), e);
            AiSettings::default()
        }
    }
}

pub fn write_settings(settings: &AiSettings) -> Result<(), SettingsError> {
    write_settings_to(&settings_path(), settings)
}

/// Atomic write (temp file + rename) so a crash never leaves half a file behind.
pub fn write_settings_to(path: &Path, settings: &AiSettings) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn apply_env_overrides(settings: &mut AiSettings, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    if let Some(provider) = var("REMEDY_PROVIDER") {
        settings.provider = provider.to_ascii_lowercase();
    }
    if let Some(model) = var("REMEDY_MODEL") {
        settings.model = model;
    }
    if let Some(key) = var("REMEDY_API_KEY") {
        settings.api_key = key;
    }
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn suggest_fixes_input_omits_absent_errors() {
        let input = SuggestFixesInput {
            code: "fn main() {}".into(),
            language: "rust".into(),
            errors: None,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json, serde_json::json!({"code": "fn main() {}", "language": "rust"}));
    }

    #[test]
    fn output_records_use_camel_case() {
        let out: SuggestFixesOutput = serde_json::from_str(
            r#"{"improvedCode":"let x = 1;","suggestions":[]}"#,
        )
        .unwrap();
        assert_eq!(out.improved_code, "let x = 1;");
        assert!(out.suggestions.is_empty());
    }

    #[test]
    fn input_validation_rejects_empty_fields_only() {
        let input = AnalyzeCodeInput {
            code: String::new(),
            language: "python".into(),
        };
        assert_eq!(input.validate(), Err(SchemaError::EmptyField("code")));

        let input = AnalyzeCodeInput {
            code: "   ".into(),
            language: "python".into(),
        };
        assert_eq!(input.validate(), Ok(()));

        let input = SuggestFixesInput {
            code: "print(1)".into(),
            language: "".into(),
            errors: Some("none".into()),
        };
        assert_eq!(input.validate(), Err(SchemaError::EmptyField("language")));
    }

    #[test]
    fn output_schema_lists_required_fields_and_is_closed() {
        let schema = output_schema::<SuggestFixesOutput>();
        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["additionalProperties"], serde_json::json!(false));
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"improvedCode"));
        assert!(required.contains(&"suggestions"));
        assert_eq!(schema["properties"]["suggestions"]["type"], "array");
    }

    #[test]
    fn settings_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = AiSettings {
            provider: "anthropic".into(),
            api_key: "sk-test".into(),
            model: "claude-sonnet".into(),
        };
        write_settings_to(&path, &settings).unwrap();
        assert_eq!(read_settings_from(&path), settings);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn malformed_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(read_settings_from(&path), AiSettings::default());
        assert_eq!(read_settings_from(&dir.path().join("missing.json")), AiSettings::default());
    }

    #[test]
    fn env_overrides_skip_blank_values() {
        let env: HashMap<&str, &str> = [
            ("REMEDY_PROVIDER", " OpenAI "),
            ("REMEDY_MODEL", "   "),
            ("REMEDY_API_KEY", "sk-env"),
        ]
        .into_iter()
        .collect();
        let mut settings = AiSettings {
            provider: "ollama".into(),
            api_key: String::new(),
            model: "llama3".into(),
        };
        apply_env_overrides(&mut settings, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.provider, "openai");
        assert_eq!(settings.model, "llama3");
        assert_eq!(settings.api_key, "sk-env");
    }

    #[test]
    fn ollama_needs_no_api_key() {
        let mut settings = AiSettings {
            provider: "ollama".into(),
            api_key: String::new(),
            model: "llama3".into(),
        };
        assert!(ai_configured(&settings));
        settings.provider = "openai".into();
        assert!(!ai_configured(&settings));
        settings.api_key = "sk".into();
        assert!(ai_configured(&settings));
    }
}
