//! galec-util - Shared infrastructure for the gale compiler.
//!
//! This crate provides the pieces every phase needs: source positions and
//! spans, the common error type, the target machine interface, and source
//! file discovery.

pub mod error;
pub mod files;
pub mod span;
pub mod target;

pub use error::{CompileError, Result};
pub use span::{FilePos, FileSpan};
pub use target::{native_target, TargetMachine, X86_64Linux};
