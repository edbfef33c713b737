//! Transformation module.
//!
//! - Bucket: derived categorical columns from numeric ones
//! - Pipeline: load, derive, summarize and assemble in one call

pub mod bucket;
pub mod pipeline;

pub use bucket::{derive_categorical, Boundary, BucketRule, BucketSpec, Closed};
pub use pipeline::*;
