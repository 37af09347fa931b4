//! Diagnostics reported to the user.

use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A message tied to a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: Option<usize>,
    pub file: Option<PathBuf>,
    pub code: Option<&'static str>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, line: usize) -> Self {
        Self::new(Severity::Error, message, Some(line))
    }

    pub fn warning(message: impl Into<String>, line: Option<usize>) -> Self {
        Self::new(Severity::Warning, message, line)
    }

    fn new(severity: Severity, message: impl Into<String>, line: Option<usize>) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
            line,
            file: None,
            code: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_file(mut self, file: &Path) -> Self {
        self.file = Some(file.to_path_buf());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:", file.display())?;
        }
        if let Some(line) = self.line {
            write!(f, "{line}: ")?;
        } else if self.file.is_some() {
            write!(f, " ")?;
        }
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match self.code {
            Some(code) => write!(f, "{label}[{code}]: {}", self.message),
            None => write!(f, "{label}: {}", self.message),
        }
    }
}
