// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Portable class definitions.
//!
//! A [`ClassDef`] is the structural fingerprint of a type: class name plus
//! the ordered field records, with a stable 64-bit id derived from the
//! canonical byte encoding. The id is never on the wire; each peer recomputes
//! it from the received bytes. Definitions are immutable once constructed.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::grouper::{DescriptorGrouper, GroupOpts};
use crate::model::TypeRef;
use crate::registry::{ClassRegistry, ClassSpec};
use std::fmt;
use xxhash_rust::xxh3::xxh3_64;

/// One field record inside a [`ClassDef`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub type_ref: TypeRef,
    pub nullable: bool,
}

/// Structural fingerprint of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    id: u64,
    class_name: String,
    fields: Vec<FieldDef>,
}

impl ClassDef {
    /// Construct from an ordered field list. The id is computed here and the
    /// definition is immutable afterwards.
    pub fn new(class_name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        let class_name = class_name.into();
        let mut canonical = WriteBuffer::new();
        encode_into(&class_name, &fields, &mut canonical);
        let id = xxh3_64(canonical.as_slice());
        Self {
            id,
            class_name,
            fields,
        }
    }

    /// Definition of a class's flattened structural layout, in grouped order.
    pub fn from_class(class: &ClassSpec, opts: &GroupOpts, registry: &ClassRegistry) -> Self {
        let grouped = DescriptorGrouper::group(Descriptor::locals_of(class), opts, registry);
        Self::new(class.name(), field_defs(grouped))
    }

    /// Definition of the fields a class declares itself, in grouped order
    /// (one per ancestor in slot mode).
    pub fn from_own_fields(class: &ClassSpec, opts: &GroupOpts, registry: &ClassRegistry) -> Self {
        let grouped = DescriptorGrouper::group(Descriptor::own_of(class), opts, registry);
        Self::new(class.name(), field_defs(grouped))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Canonical byte encoding; equal bytes produce equal ids.
    pub fn encode(&self, out: &mut WriteBuffer) {
        encode_into(&self.class_name, &self.fields, out);
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = WriteBuffer::new();
        self.encode(&mut out);
        out.into_bytes()
    }

    /// Decode a definition and recompute its id from the canonical form.
    pub fn decode(input: &mut ReadBuffer<'_>) -> Result<Self> {
        let class_name = input.read_str()?;
        let count = input.read_var_u32()? as usize;
        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            let name = input.read_str()?;
            let nullable = match input.read_u8()? {
                0 => false,
                1 => true,
                other => {
                    return Err(Error::ProtocolViolation(format!(
                        "bad nullable flag {:#x} in class definition",
                        other
                    )))
                }
            };
            let type_ref = TypeRef::decode(input)?;
            fields.push(FieldDef {
                name,
                type_ref,
                nullable,
            });
        }
        Ok(Self::new(class_name, fields))
    }
}

impl fmt::Display for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassDef({} #{:016x}, {} fields)",
            self.class_name,
            self.id,
            self.fields.len()
        )
    }
}

fn field_defs(grouped: DescriptorGrouper) -> Vec<FieldDef> {
    grouped
        .into_ordered()
        .into_iter()
        .map(|d| FieldDef {
            name: d.name,
            type_ref: d.type_ref,
            nullable: d.nullable,
        })
        .collect()
}

fn encode_into(class_name: &str, fields: &[FieldDef], out: &mut WriteBuffer) {
    out.write_str(class_name);
    out.write_var_u32(fields.len() as u32);
    for field in fields {
        out.write_str(&field.name);
        out.write_u8(u8::from(field.nullable));
        field.type_ref.encode(out);
    }
}
