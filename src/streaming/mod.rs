//! Streaming module for chunk-at-a-time body rewriting
//!
//! This module provides the core rewrite primitive, which:
//! - Works on whatever slice the caller presents (no internal buffering)
//! - Withholds at most one pattern-length of bytes to resolve matches
//!   that straddle chunk boundaries
//! - Leaves all real buffering and I/O to the driver that owns them

pub mod replacer;

pub use replacer::{Outcome, StreamReplacer, TransformResult};
