use thiserror::Error;

use crate::fst::Label;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FstError {
    #[error("operation requires an acceptor")]
    NotAcceptor,
    #[error("operation requires an unweighted acceptor")]
    NotUnweightedAcceptor,
    #[error("invalid UTF-8 in string literal")]
    InvalidUtf8,
    #[error("label {0} is not a valid code point")]
    InvalidCodePoint(Label),
    #[error("symbol '{0}' is missing from the symbol table")]
    MissingSymbol(String),
    #[error("label {0} is missing from the symbol table")]
    MissingLabel(Label),
    #[error("malformed symbol table line {line}: {text}")]
    MalformedSymbolTable { line: usize, text: String },
    #[error("automaton has no start state")]
    NoStart,
}
