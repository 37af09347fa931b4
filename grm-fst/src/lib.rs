//! Weighted finite-state transducers for the grammar compiler.
//!
//! The crate provides the automaton algebra the grammar evaluator is
//! built on:
//!
//!   semiring      (tropical, log, log64 weights)
//!     -> fst      (mutable machines and delayed views)
//!     -> ops      (rational operations, composition, optimization)
//!     -> cdrewrite (context-dependent rewrite rules)
//!
//! Every machine is generic over its weight; the grammar layer picks one
//! semiring per compilation.

// ---------------------------------------------------------------------
// Weights and machines
// ---------------------------------------------------------------------

pub mod error;
pub mod fst;
pub mod semiring;
pub mod symbol_table;

// ---------------------------------------------------------------------
// Text conversion
// ---------------------------------------------------------------------

pub mod string;

// ---------------------------------------------------------------------
// Algorithms
// ---------------------------------------------------------------------

pub mod cdrewrite;
pub mod ops;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use error::FstError;
pub use fst::{Arc, DelayedOp, EPSILON, Fst, Label, StateId, VectorFst};
pub use semiring::{DELTA, Log64Weight, LogWeight, Semiring, TropicalWeight};
pub use string::{TokenType, compile_string, labels_to_string, string_to_labels};
pub use symbol_table::SymbolTable;
