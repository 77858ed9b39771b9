//! This module defines the core, strongly-typed data representations used
//! by the field-level API.
//!
//! It currently includes the canonical `FieldShape` enum, the dispatch key the
//! scene-graph layer hands to the codec in place of its own field-type integers.

pub mod field_shape;

// Re-export the main type(s) for easier access.
pub use field_shape::{FieldShape, ScalarKind};
