//! Source files and the languages the runner knows how to launch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A single file belonging to a sheet, in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub filename: String,
    pub code: String,
    /// Declared language tag, e.g. `"python"`. Compared case-insensitively.
    #[serde(default)]
    pub language: String,
}

impl SourceFile {
    pub fn new(
        filename: impl Into<String>,
        code: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        SourceFile {
            filename: filename.into(),
            code: code.into(),
            language: language.into(),
        }
    }
}

/// Languages a sheet can be executed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
}

impl Language {
    /// Conventional entry filename, used when present among the files.
    pub fn default_entry(self) -> &'static str {
        match self {
            Language::Python => "main.py",
            Language::JavaScript => "index.js",
        }
    }

    /// Whether sources in this language get graph extraction.
    pub fn extracts_graph(self) -> bool {
        matches!(self, Language::Python)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::JavaScript => write!(f, "javascript"),
        }
    }
}

impl FromStr for Language {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" => Ok(Language::Python),
            "javascript" => Ok(Language::JavaScript),
            _ => Err(CoreError::UnsupportedLanguage {
                language: s.to_string(),
            }),
        }
    }
}

/// Picks the entry file: the language's conventional filename when present,
/// otherwise the first file. Returns `None` only for an empty slice.
pub fn select_entry(files: &[SourceFile], language: Language) -> Option<&SourceFile> {
    files
        .iter()
        .find(|f| f.filename == language.default_entry())
        .or_else(|| files.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_parse_is_case_insensitive() {
        assert_eq!("Python".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("JAVASCRIPT".parse::<Language>().unwrap(), Language::JavaScript);
        let err = "ruby".parse::<Language>().unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedLanguage { .. }));
    }

    #[test]
    fn entry_prefers_conventional_name() {
        let files = vec![
            SourceFile::new("helpers.py", "", "python"),
            SourceFile::new("main.py", "", "python"),
        ];
        assert_eq!(select_entry(&files, Language::Python).unwrap().filename, "main.py");
    }

    #[test]
    fn entry_falls_back_to_first_file() {
        let files = vec![
            SourceFile::new("app.js", "", "javascript"),
            SourceFile::new("util.js", "", "javascript"),
        ];
        assert_eq!(select_entry(&files, Language::JavaScript).unwrap().filename, "app.js");
        assert!(select_entry(&[], Language::Python).is_none());
    }
}
