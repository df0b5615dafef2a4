#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data structures shared by the Sourcer crates.
//!
//! - [`position`]: offsets, line/column positions and spans
//! - [`tree`]: the syntax tree produced by a successful parse
//! - [`visit`] / [`transform`]: read-only traversal and bottom-up rewriting
//! - [`colors`]: ANSI palette for human-readable output

pub mod colors;
pub mod position;
pub mod transform;
pub mod tree;
pub mod visit;

pub use colors::Colors;
pub use position::{LineIndex, Position, Span, SpanError, locate};
pub use transform::{Chain, TransformTable, Transformer, transform};
pub use tree::{Descendants, Node, Operation, Value};
pub use visit::{VisitTable, Visitor, Walk, visit, walk_node, walk_value};

#[cfg(test)]
mod test_utils;
