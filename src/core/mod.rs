/*!
# Core Module

Shared foundations: source positions, the storage error type and file
loading helpers.
*/

pub mod errors;
pub mod fs_utils;
pub mod position;

pub use errors::{GraphError, IndexKind};
pub use fs_utils::read_source_file;
pub use position::{Position, Span};
