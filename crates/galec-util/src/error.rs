//! The compiler's error type.
//!
//! Every phase reports the first failure it hits as a [`CompileError`].
//! Source errors render as `<message> at <path>:<line>:<col>`, which is the
//! shape the driver prints and the integration tests match on.

use crate::span::FileSpan;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    /// An error attributable to a location in the source being compiled.
    #[error("{message} at {span}")]
    Source { message: String, span: FileSpan },

    /// An I/O failure reading input or writing output.
    #[error("{0}")]
    Io(#[from] io::Error),
}

impl CompileError {
    pub fn source(message: impl Into<String>, span: FileSpan) -> Self {
        CompileError::Source {
            message: message.into(),
            span,
        }
    }

    /// The span of a source error, if there is one.
    pub fn span(&self) -> Option<&FileSpan> {
        match self {
            CompileError::Source { span, .. } => Some(span),
            CompileError::Io(_) => None,
        }
    }
}
