use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Languages offered in the submission form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Java,
    CSharp,
    Cpp,
    C,
    Go,
    Rust,
    Ruby,
    Php,
    Swift,
    Kotlin,
    Sql,
    Html,
    Css,
    Shell,
}

pub const DEFAULT_LANGUAGE: Language = Language::JavaScript;

impl Language {
    pub const ALL: [Language; 17] = [
        Language::JavaScript,
        Language::TypeScript,
        Language::Python,
        Language::Java,
        Language::CSharp,
        Language::Cpp,
        Language::C,
        Language::Go,
        Language::Rust,
        Language::Ruby,
        Language::Php,
        Language::Swift,
        Language::Kotlin,
        Language::Sql,
        Language::Html,
        Language::Css,
        Language::Shell,
    ];

    /// Wire value, as sent to the prompt templates.
    pub fn id(self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Sql => "sql",
            Language::Html => "html",
            Language::Css => "css",
            Language::Shell => "shell",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Python => "Python",
            Language::Java => "Java",
            Language::CSharp => "C#",
            Language::Cpp => "C++",
            Language::C => "C",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Ruby => "Ruby",
            Language::Php => "PHP",
            Language::Swift => "Swift",
            Language::Kotlin => "Kotlin",
            Language::Sql => "SQL",
            Language::Html => "HTML",
            Language::Css => "CSS",
            Language::Shell => "Shell",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        DEFAULT_LANGUAGE
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|l| l.id() == needle)
            .ok_or_else(|| format!("unsupported language: {}", s.trim()))
    }
}
