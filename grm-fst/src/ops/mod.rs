//! Algorithms over [`VectorFst`](crate::fst::VectorFst).
//!
//! Functions taking `&mut VectorFst` rewrite their argument in place;
//! the others build a fresh machine and leave their inputs untouched.

mod compose;
mod determinize;
mod difference;
mod epsilon;
mod minimize;
mod misc;
mod optimize;
pub mod paths;
mod rational;
mod shortest_path;

pub use compose::{compose, cross};
pub use determinize::{EncodeTable, decode, determinize, encode};
pub use difference::{difference, lenient_compose, priority_union};
pub use epsilon::rm_epsilon;
pub use minimize::minimize;
pub use misc::{ArcSortType, ProjectType, arc_sort, connect, invert, project, reverse, rm_weight};
pub use optimize::optimize;
pub use rational::{ClosureType, closure, concat, concat_left, concat_range, union};
pub use shortest_path::shortest_path;
