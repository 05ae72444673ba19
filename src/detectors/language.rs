//! detectors/language.rs
//!
//! Source language detection from file extensions.

use std::path::Path;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Language {
    Python,
    Rust,
    Unknown,
}

impl Language {
    pub fn from_path(path: &str) -> Self {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some("py") => Language::Python,
            Some("rs") => Language::Rust,
            _ => Language::Unknown,
        }
    }

    /// Line comment token, used for section markers in test files.
    pub fn comment_token(self) -> &'static str {
        match self {
            Language::Rust => "//",
            Language::Python | Language::Unknown => "#",
        }
    }

    pub fn fence_tag(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Rust => "rust",
            Language::Unknown => "",
        }
    }

    pub fn test_framework(self) -> &'static str {
        match self {
            Language::Python => "pytest",
            Language::Rust => "Rust's built-in test harness (#[test])",
            Language::Unknown => "the project's test framework",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_extension() {
        assert_eq!(Language::from_path("app/models.py"), Language::Python);
        assert_eq!(Language::from_path("src/lib.rs"), Language::Rust);
        assert_eq!(Language::from_path("Makefile"), Language::Unknown);
    }
}
