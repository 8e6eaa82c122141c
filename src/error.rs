//! Unified error handling for the binding layer.
//!
//! There is deliberately one error enum for the whole crate: every failure a
//! native invocation can surface collapses into [`Error::NativeCall`] carrying
//! the operation name, per the bridge's no-partial-recovery rule. Programming
//! errors (double-registering a handle, mixing wrappers across worlds) are not
//! represented here — they panic.

use thiserror::Error;

/// Binding-layer error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("native call `{op}` failed")]
    NativeCall { op: &'static str },

    #[error("failed to load native library: {0}")]
    LibraryLoad(#[from] libloading::Error),

    #[error("native symbol not found: {symbol}")]
    MissingSymbol { symbol: &'static str },

    #[error("unknown field path `{path}` in layout `{layout}`")]
    UnknownField {
        layout: &'static str,
        path: String,
    },

    #[error("field `{path}` in layout `{layout}` is not readable as {expected}")]
    FieldKind {
        layout: &'static str,
        path: String,
        expected: &'static str,
    },

    #[error("definition rejected by native library in `{op}` (uninitialized or out-of-range values)")]
    InvalidDef { op: &'static str },
}

impl Error {
    /// Shorthand used by every binding call site's failure boundary.
    pub(crate) fn native(op: &'static str) -> Self {
        Error::NativeCall { op }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
