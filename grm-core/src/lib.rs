//! Core of the grammar compiler.
//!
//! Grammar files are compiled to weighted transducers through these
//! stages:
//!
//!   source .grm
//!     -> lexer     (tokens)
//!     -> parser    (AST, operators desugared to calls)
//!     -> evaluator (namespaces, values, built-in functions)
//!     -> archive   (exported rules + generated labels, as JSON)
//!
//! The CLI and other tools should drive compilation through
//! [`compile_grammar`] or [`compile_to_archive`] rather than wiring the
//! stages themselves.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing, parsing and AST dumps
// ---------------------------------------------------------------------

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;

// ---------------------------------------------------------------------
// Evaluation state: values, scopes and generated labels
// ---------------------------------------------------------------------

pub mod labels;
pub mod namespace;
pub mod resource_map;
pub mod value;

// ---------------------------------------------------------------------
// Built-in functions and the algorithms behind them
// ---------------------------------------------------------------------

pub mod functions;
pub mod prefix_tree;

// ---------------------------------------------------------------------
// Driver: evaluation, archives and the grammar library
// ---------------------------------------------------------------------

pub mod archive;
pub mod compiler;
mod evaluator;
pub mod stdlib;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use archive::{Archive, peek_arc_type, read_fst, write_fst};
pub use compiler::{Compilation, CompilerOptions, FailurePolicy, compile_grammar, compile_to_archive, emit_ast};
pub use diagnostic::{Diagnostic, Severity};
pub use error::{CoreError, FunctionError};
pub use evaluator::MAX_CALL_DEPTH;
pub use labels::LabelManager;
pub use value::{ArcKind, FstWeight, Value};

/// The automaton crate, re-exported for callers that inspect results.
pub use grm_fst as fst;
