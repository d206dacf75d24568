// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-wide error type.
//!
//! Errors are never recovered inside the engine; they propagate to the call
//! boundary. Pooled scratch objects are returned to their pools on the way
//! out (see `compat::slot_stream`), but no partial wire state is repaired.

use std::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by serialization and deserialization.
#[derive(Debug)]
pub enum Error {
    /// Unreconcilable field mapping, duplicate field name in a slot chain,
    /// or a wire class that matches no remaining local slot.
    SchemaMismatch(String),
    /// Bad class handle, bad type tag, or a truncated class definition.
    ProtocolViolation(String),
    /// Buffer exhausted mid-value.
    Eof { need: usize, have: usize },
    /// A put-field/get-field operation named a field the slot does not declare.
    UnknownField(String),
    /// PutField/GetField state machine violation.
    NotActive(&'static str),
    /// A user hook invoked a legacy stream operation this engine refuses.
    UnsupportedEncoding(&'static str),
    /// Null validation callback, or an object in an unusable state.
    InvalidObject(String),
    /// Target instance could not be allocated.
    ConstructionFailed(String),
    /// Rejected configuration combination.
    InvalidConfig(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaMismatch(msg) => write!(f, "Schema mismatch: {}", msg),
            Self::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
            Self::Eof { need, have } => {
                write!(f, "Unexpected end of buffer: need {} bytes, have {}", need, have)
            }
            Self::UnknownField(name) => write!(f, "Unknown field: {}", name),
            Self::NotActive(op) => write!(f, "Operation not active: {}", op),
            Self::UnsupportedEncoding(op) => {
                write!(
                    f,
                    "Unsupported legacy stream operation `{}`; use a fallback serializer",
                    op
                )
            }
            Self::InvalidObject(msg) => write!(f, "Invalid object: {}", msg),
            Self::ConstructionFailed(msg) => write!(f, "Construction failed: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
