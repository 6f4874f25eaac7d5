//! Submission form state: field validation and file upload.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::language::{Language, DEFAULT_LANGUAGE};
use crate::{AnalyzeCodeInput, SuggestFixesInput};

pub const MIN_CODE_CHARS: usize = 10;
pub const MAX_CODE_CHARS: usize = 10_000;

/// File extensions offered by the upload picker, without the leading dot.
pub const UPLOAD_EXTENSIONS: &[&str] = &["js", "ts", "py", "java", "cs", "txt"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeInputForm {
    pub code: String,
    pub language: String,
}

impl Default for CodeInputForm {
    fn default() -> Self {
        Self {
            code: String::new(),
            language: DEFAULT_LANGUAGE.id().to_string(),
        }
    }
}

/// A validated form submission. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSubmission {
    code: String,
    language: Language,
}

impl CodeSubmission {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn analyze_input(&self) -> AnalyzeCodeInput {
        AnalyzeCodeInput {
            code: self.code.clone(),
            language: self.language.id().to_string(),
        }
    }

    /// The analysis text is passed verbatim as the known-problems context.
    pub fn suggest_input(&self, errors: &str) -> SuggestFixesInput {
        SuggestFixesInput {
            code: self.code.clone(),
            language: self.language.id().to_string(),
            errors: Some(errors.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(pub Vec<FieldError>);

impl FormErrors {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == name)
            .map(|e| e.message.as_str())
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msgs: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&msgs.join(" "))
    }
}

impl std::error::Error for FormErrors {}

impl CodeInputForm {
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
        }
    }

    /// Check field constraints. Length is counted in characters, not bytes.
    pub fn validate(&self) -> Result<CodeSubmission, FormErrors> {
        let mut errors = Vec::new();

        let len = self.code.chars().count();
        if len < MIN_CODE_CHARS {
            errors.push(FieldError {
                field: "code",
                message: "Code must be at least 10 characters.".to_string(),
            });
        } else if len > MAX_CODE_CHARS {
            errors.push(FieldError {
                field: "code",
                message: "Code must be less than 10,000 characters.".to_string(),
            });
        }

        let language = match self.language.parse::<Language>() {
            Ok(l) => Some(l),
            Err(_) => {
                errors.push(FieldError {
                    field: "language",
                    message: "Select a supported language.".to_string(),
                });
                None
            }
        };

        match language {
            Some(language) if errors.is_empty() => Ok(CodeSubmission {
                code: self.code.clone(),
                language,
            }),
            _ => Err(FormErrors(errors)),
        }
    }

    /// Placeholder shown while a chosen file is being read.
    pub fn begin_file_load(&mut self, file_name: &str) {
        self.code = format!("// Loading file: {}...", file_name);
    }

    pub fn finish_file_load(&mut self, text: String) {
        self.code = text;
    }

    /// Read `path` into the code field. On failure the field keeps its previous value.
    pub fn load_file(&mut self, path: &Path) -> Result<(), UploadError> {
        let previous = std::mem::take(&mut self.code);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        self.begin_file_load(&name);
        match read_code_file(path) {
            Ok(text) => {
                self.finish_file_load(text);
                Ok(())
            }
            Err(e) => {
                self.code = previous;
                Err(e)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a text file")]
    NotText(PathBuf),
}

/// Read a file's full contents as text, verbatim.
pub fn read_code_file(path: &Path) -> Result<String, UploadError> {
    let bytes = fs::read(path).map_err(|source| UploadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|_| UploadError::NotText(path.to_path_buf()))?;
    if text.contains('\0') {
        return Err(UploadError::NotText(path.to_path_buf()));
    }
    Ok(text)
}
