// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field descriptors.
//!
//! A [`Descriptor`] describes a single serializable field: its name, its
//! declared type, the class that declared it, nullability, and - when the
//! field exists locally - the record slot it is read from and written to.
//! A descriptor with no slot describes a peer-only field: skipped on read,
//! zero-filled on write.

use crate::model::TypeRef;
use crate::registry::ClassSpec;

/// A single field description.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub name: String,
    pub type_ref: TypeRef,
    pub owner: String,
    pub nullable: bool,
    /// Record slot index; `None` for a field that exists only on the peer.
    pub slot: Option<usize>,
}

impl Descriptor {
    /// Descriptors for the flattened local field set of `class`, in record
    /// slot order.
    pub fn locals_of(class: &ClassSpec) -> Vec<Descriptor> {
        class
            .effective_fields()
            .iter()
            .enumerate()
            .map(|(slot, f)| Descriptor {
                name: f.name.clone(),
                type_ref: f.type_ref.clone(),
                owner: f.owner.clone(),
                nullable: f.nullable,
                slot: Some(slot),
            })
            .collect()
    }

    /// Descriptors for the fields `class` declares itself (used per-slot in
    /// slot mode). Slots are relative to `class`'s own record layout.
    pub fn own_of(class: &ClassSpec) -> Vec<Descriptor> {
        class
            .own_fields()
            .iter()
            .map(|f| Descriptor {
                name: f.name.clone(),
                type_ref: f.type_ref.clone(),
                owner: class.name().to_string(),
                nullable: f.nullable,
                slot: class.field_slot(&f.name),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_locals_follow_record_layout() {
        let base = Arc::new(
            ClassSpec::builder("Base")
                .field("id", TypeRef::i64())
                .build(),
        );
        let child = ClassSpec::builder("Child")
            .parent(base)
            .nullable_field("label", TypeRef::string())
            .build();

        let descs = Descriptor::locals_of(&child);
        assert_eq!(descs.len(), 2);
        assert_eq!(descs[0].name, "id");
        assert_eq!(descs[0].slot, Some(0));
        assert_eq!(descs[0].owner, "Base");
        assert_eq!(descs[1].name, "label");
        assert_eq!(descs[1].slot, Some(1));
        assert!(descs[1].nullable);
    }

    #[test]
    fn test_own_of_maps_to_concrete_slots() {
        let base = Arc::new(
            ClassSpec::builder("Base")
                .field("id", TypeRef::i64())
                .build(),
        );
        let child = ClassSpec::builder("Child")
            .parent(base.clone())
            .field("name", TypeRef::string())
            .build();

        let base_descs = Descriptor::own_of(&base);
        assert_eq!(base_descs.len(), 1);
        assert_eq!(base_descs[0].slot, Some(0));

        let child_descs = Descriptor::own_of(&child);
        assert_eq!(child_descs[0].name, "name");
        assert_eq!(child_descs[0].slot, Some(1));
    }
}
