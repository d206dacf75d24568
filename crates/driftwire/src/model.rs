// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Declared-type model.
//!
//! A [`TypeRef`] is the declared type of a serializable field: a primitive
//! kind, a string, a named object type (with optional generic parameters),
//! an array, or `Opaque` when the declared type cannot be recovered. Type
//! references travel inside class definitions as a one-byte tag plus a
//! tag-specific payload.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::{Error, Result};
use std::fmt;

/// Primitive type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Char,
}

impl PrimitiveKind {
    /// Fixed wire size in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Bool | Self::I8 => 1,
            Self::I16 => 2,
            Self::I32 | Self::F32 | Self::Char => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Char => "char",
        }
    }
}

// Wire tags for TypeRef encoding. Stable: part of the canonical ClassDef
// byte form, which the 64-bit fingerprint is computed over. The same tags
// mark the actual value kind at opaque field sites.
pub(crate) const TAG_BOOL: u8 = 0;
pub(crate) const TAG_I8: u8 = 1;
pub(crate) const TAG_I16: u8 = 2;
pub(crate) const TAG_I32: u8 = 3;
pub(crate) const TAG_I64: u8 = 4;
pub(crate) const TAG_F32: u8 = 5;
pub(crate) const TAG_F64: u8 = 6;
pub(crate) const TAG_CHAR: u8 = 7;
pub(crate) const TAG_STRING: u8 = 8;
pub(crate) const TAG_OBJECT: u8 = 9;
pub(crate) const TAG_ARRAY: u8 = 10;
pub(crate) const TAG_OPAQUE: u8 = 11;

/// Declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Primitive(PrimitiveKind),
    String,
    /// Named object type; generic parameters are advisory and erased for
    /// compatibility matching.
    Object {
        class_name: String,
        generics: Vec<TypeRef>,
    },
    Array(Box<TypeRef>),
    /// Declared type unknown; matches any reference type.
    Opaque,
}

impl TypeRef {
    pub fn bool() -> Self {
        Self::Primitive(PrimitiveKind::Bool)
    }

    pub fn i8() -> Self {
        Self::Primitive(PrimitiveKind::I8)
    }

    pub fn i16() -> Self {
        Self::Primitive(PrimitiveKind::I16)
    }

    pub fn i32() -> Self {
        Self::Primitive(PrimitiveKind::I32)
    }

    pub fn i64() -> Self {
        Self::Primitive(PrimitiveKind::I64)
    }

    pub fn f32() -> Self {
        Self::Primitive(PrimitiveKind::F32)
    }

    pub fn f64() -> Self {
        Self::Primitive(PrimitiveKind::F64)
    }

    pub fn char() -> Self {
        Self::Primitive(PrimitiveKind::Char)
    }

    pub fn string() -> Self {
        Self::String
    }

    pub fn object(class_name: impl Into<String>) -> Self {
        Self::Object {
            class_name: class_name.into(),
            generics: Vec::new(),
        }
    }

    pub fn generic_object(class_name: impl Into<String>, generics: Vec<TypeRef>) -> Self {
        Self::Object {
            class_name: class_name.into(),
            generics,
        }
    }

    pub fn array(element: TypeRef) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn opaque() -> Self {
        Self::Opaque
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(_))
    }

    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Primitive(k) => Some(*k),
            _ => None,
        }
    }

    /// Reference types carry identity on the wire (null tag, back-references).
    pub fn is_reference(&self) -> bool {
        !self.is_primitive()
    }

    /// Wire tag byte.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Primitive(PrimitiveKind::Bool) => TAG_BOOL,
            Self::Primitive(PrimitiveKind::I8) => TAG_I8,
            Self::Primitive(PrimitiveKind::I16) => TAG_I16,
            Self::Primitive(PrimitiveKind::I32) => TAG_I32,
            Self::Primitive(PrimitiveKind::I64) => TAG_I64,
            Self::Primitive(PrimitiveKind::F32) => TAG_F32,
            Self::Primitive(PrimitiveKind::F64) => TAG_F64,
            Self::Primitive(PrimitiveKind::Char) => TAG_CHAR,
            Self::String => TAG_STRING,
            Self::Object { .. } => TAG_OBJECT,
            Self::Array(_) => TAG_ARRAY,
            Self::Opaque => TAG_OPAQUE,
        }
    }

    /// Canonical type name used for deterministic ordering.
    pub fn canonical_name(&self) -> String {
        match self {
            Self::Primitive(k) => k.name().to_string(),
            Self::String => "string".to_string(),
            Self::Object { class_name, .. } => class_name.clone(),
            Self::Array(elem) => format!("array<{}>", elem.canonical_name()),
            Self::Opaque => "opaque".to_string(),
        }
    }

    /// Encode as tag + payload.
    pub fn encode(&self, out: &mut WriteBuffer) {
        out.write_u8(self.tag());
        match self {
            Self::Object {
                class_name,
                generics,
            } => {
                out.write_str(class_name);
                out.write_var_u32(generics.len() as u32);
                for g in generics {
                    g.encode(out);
                }
            }
            Self::Array(elem) => elem.encode(out),
            _ => {}
        }
    }

    /// Map a payload-free tag back to its type: primitives and strings only.
    /// Object and array tags need a payload and return `None`.
    pub(crate) fn from_simple_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_BOOL => Some(Self::bool()),
            TAG_I8 => Some(Self::i8()),
            TAG_I16 => Some(Self::i16()),
            TAG_I32 => Some(Self::i32()),
            TAG_I64 => Some(Self::i64()),
            TAG_F32 => Some(Self::f32()),
            TAG_F64 => Some(Self::f64()),
            TAG_CHAR => Some(Self::char()),
            TAG_STRING => Some(Self::String),
            _ => None,
        }
    }

    /// Decode a tag + payload.
    pub fn decode(input: &mut ReadBuffer<'_>) -> Result<Self> {
        let tag = input.read_u8()?;
        let type_ref = match tag {
            TAG_BOOL => Self::bool(),
            TAG_I8 => Self::i8(),
            TAG_I16 => Self::i16(),
            TAG_I32 => Self::i32(),
            TAG_I64 => Self::i64(),
            TAG_F32 => Self::f32(),
            TAG_F64 => Self::f64(),
            TAG_CHAR => Self::char(),
            TAG_STRING => Self::String,
            TAG_OBJECT => {
                let class_name = input.read_str()?;
                let count = input.read_var_u32()? as usize;
                let mut generics = Vec::with_capacity(count);
                for _ in 0..count {
                    generics.push(Self::decode(input)?);
                }
                Self::Object {
                    class_name,
                    generics,
                }
            }
            TAG_ARRAY => Self::Array(Box::new(Self::decode(input)?)),
            TAG_OPAQUE => Self::Opaque,
            other => {
                return Err(Error::ProtocolViolation(format!(
                    "unknown type tag {:#x}",
                    other
                )))
            }
        };
        Ok(type_ref)
    }

    /// Whether a locally declared type and a peer-declared type can be mapped
    /// onto each other.
    ///
    /// Widenings: nullability (boxed forms) is handled by the descriptor
    /// layer, so identical primitive kinds always match here; a declared
    /// `Opaque` matches any reference type in either direction; arrays match
    /// element-recursively; object types match on class name with generics
    /// erased.
    pub fn reconcilable(local: &TypeRef, peer: &TypeRef) -> bool {
        match (local, peer) {
            (Self::Primitive(a), Self::Primitive(b)) => a == b,
            (Self::String, Self::String) => true,
            (Self::Array(a), Self::Array(b)) => Self::reconcilable(a, b),
            (Self::Object { class_name: a, .. }, Self::Object { class_name: b, .. }) => a == b,
            (Self::Opaque, peer) => peer.is_reference(),
            (local, Self::Opaque) => local.is_reference(),
            _ => false,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}
