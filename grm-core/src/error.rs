use std::path::{Path, PathBuf};

use grm_fst::FstError;
use thiserror::Error;

use crate::labels::LabelError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read {path}: {source}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    OutputIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("library directory was not found at {0}")]
    MissingStdlib(PathBuf),
    #[error("lex error at line {line}: {message}")]
    LexError { line: usize, message: String },
    #[error("parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },
    #[error("line {line}: cannot find imported file '{path}'")]
    MissingImport { line: usize, path: String },
    #[error("cannot reuse the same alias for two files: {alias} in {file}")]
    DuplicateAlias { alias: String, file: String },
    #[error("cyclic import of {0}")]
    ImportCycle(PathBuf),
    #[error("line {line}: undefined identifier '{name}'")]
    UnresolvedIdentifier { line: usize, name: String },
    #[error("line {line}: {source}")]
    Function {
        line: usize,
        #[source]
        source: FunctionError,
    },
    #[error("line {line}: {message}")]
    SemanticError { line: usize, message: String },
    #[error("unsupported arc type: {0}")]
    UnsupportedArcType(String),
    #[error("archive holds {found} arcs but {expected} arcs were requested")]
    ArcTypeMismatch { expected: String, found: String },
    #[error("malformed archive {path}: {source}")]
    MalformedArchive {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("archive has no rule named '{0}'")]
    MissingRule(String),
    #[error(transparent)]
    Fst(#[from] FstError),
    #[error("{}: {error}", file.display())]
    InFile { file: PathBuf, error: Box<CoreError> },
}

impl CoreError {
    /// Fatal errors abort a compilation regardless of the failure policy.
    pub fn is_fatal(&self) -> bool {
        match self {
            CoreError::DuplicateAlias { .. } | CoreError::ImportCycle(_) => true,
            CoreError::Function { source, .. } => source.is_fatal(),
            CoreError::InFile { error, .. } => error.is_fatal(),
            _ => false,
        }
    }

    /// Source line the error points at, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            CoreError::LexError { line, .. }
            | CoreError::ParseError { line, .. }
            | CoreError::MissingImport { line, .. }
            | CoreError::UnresolvedIdentifier { line, .. }
            | CoreError::Function { line, .. }
            | CoreError::SemanticError { line, .. } => Some(*line),
            CoreError::InFile { error, .. } => error.line(),
            _ => None,
        }
    }

    /// Attributes the error to `file` unless it already names one.
    pub fn in_file(self, file: &Path) -> Self {
        match self {
            CoreError::InFile { .. } => self,
            error => CoreError::InFile {
                file: file.to_path_buf(),
                error: Box::new(error),
            },
        }
    }
}

/// Failure of a single built-in function call.
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("{name}: Expected {expected} arguments but got {got}")]
    Arity {
        name: &'static str,
        expected: String,
        got: usize,
    },
    #[error("{name}: Expected {expected} for argument {index}, got {got}")]
    ArgumentType {
        name: &'static str,
        expected: &'static str,
        index: usize,
        got: &'static str,
    },
    #[error("{name}: {message}")]
    Invalid { name: &'static str, message: String },
    #[error("{name}: {source}")]
    Fst {
        name: &'static str,
        #[source]
        source: FstError,
    },
    #[error("{name}: {source}")]
    Labels {
        name: &'static str,
        #[source]
        source: LabelError,
    },
    #[error("{name}: failed to read {path}: {source}")]
    Io {
        name: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{name}: {source}")]
    Archive {
        name: &'static str,
        #[source]
        source: Box<CoreError>,
    },
}

impl FunctionError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FunctionError::Labels {
                source: LabelError::Exhausted,
                ..
            }
        )
    }

    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        FunctionError::Invalid {
            name,
            message: message.into(),
        }
    }
}
