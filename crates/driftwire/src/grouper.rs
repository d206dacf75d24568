// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Deterministic descriptor grouping.
//!
//! Partitions a field set into four groups in fixed order: plain primitives,
//! boxed (nullable) primitives, final-typed reference fields, and other
//! reference fields. Primitives of identical size form a block that can be
//! copied without per-field branching; descending-size bucketing keeps those
//! blocks aligned. Final-typed reference fields never need a polymorphic
//! dispatch on read.
//!
//! The ordering is pure and deterministic: both peers derive the same
//! sequence from the same class definition and configuration.

use crate::descriptor::Descriptor;
use crate::model::{PrimitiveKind, TypeRef};
use crate::registry::ClassRegistry;
use std::cmp::Reverse;

/// Grouping options; a subset of the engine configuration that affects wire
/// layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupOpts {
    pub track_refs_for_basics: bool,
    pub compress_ints: bool,
    pub compress_longs: bool,
}

/// Computed four-group view over a descriptor set.
#[derive(Debug)]
pub struct DescriptorGrouper {
    primitives: Vec<Descriptor>,
    boxed_primitives: Vec<Descriptor>,
    final_objects: Vec<Descriptor>,
    other_objects: Vec<Descriptor>,
}

impl DescriptorGrouper {
    /// Partition and order `descriptors`.
    pub fn group(
        descriptors: Vec<Descriptor>,
        opts: &GroupOpts,
        registry: &ClassRegistry,
    ) -> Self {
        let mut primitives = Vec::new();
        let mut boxed_primitives = Vec::new();
        let mut final_objects = Vec::new();
        let mut other_objects = Vec::new();

        for desc in descriptors {
            match &desc.type_ref {
                TypeRef::Primitive(_) if !desc.nullable => primitives.push(desc),
                TypeRef::Primitive(_) => boxed_primitives.push(desc),
                other => {
                    if is_final_type(other, registry) {
                        final_objects.push(desc);
                    } else {
                        other_objects.push(desc);
                    }
                }
            }
        }

        let size_key = |d: &Descriptor| {
            let kind = d.type_ref.primitive().unwrap_or(PrimitiveKind::Bool);
            (Reverse(effective_size(kind, opts)), d.name.clone())
        };
        primitives.sort_by_key(size_key);
        boxed_primitives.sort_by_key(size_key);

        let name_key =
            |d: &Descriptor| (d.type_ref.canonical_name(), d.name.clone());
        final_objects.sort_by_key(name_key);
        other_objects.sort_by_key(name_key);

        Self {
            primitives,
            boxed_primitives,
            final_objects,
            other_objects,
        }
    }

    pub fn primitives(&self) -> &[Descriptor] {
        &self.primitives
    }

    pub fn boxed_primitives(&self) -> &[Descriptor] {
        &self.boxed_primitives
    }

    pub fn final_objects(&self) -> &[Descriptor] {
        &self.final_objects
    }

    pub fn other_objects(&self) -> &[Descriptor] {
        &self.other_objects
    }

    /// The canonical flat sequence: groups concatenated in fixed order.
    pub fn into_ordered(self) -> Vec<Descriptor> {
        let mut out = self.primitives;
        out.extend(self.boxed_primitives);
        out.extend(self.final_objects);
        out.extend(self.other_objects);
        out
    }
}

/// Variable-width encodings spoil the fixed-size primitive block, so
/// compressed kinds sort to the end of their group.
fn effective_size(kind: PrimitiveKind, opts: &GroupOpts) -> usize {
    match kind {
        PrimitiveKind::I32 if opts.compress_ints => 0,
        PrimitiveKind::I64 if opts.compress_longs => 0,
        other => other.size(),
    }
}

/// String and array fields have an exact runtime type; object fields are
/// final only when their registered class is final. Opaque fields are always
/// polymorphic.
fn is_final_type(type_ref: &TypeRef, registry: &ClassRegistry) -> bool {
    match type_ref {
        TypeRef::String | TypeRef::Array(_) => true,
        TypeRef::Object { class_name, .. } => registry
            .get(class_name)
            .map(|c| c.is_final())
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClassSpec;

    fn desc(name: &str, type_ref: TypeRef, nullable: bool) -> Descriptor {
        Descriptor {
            name: name.to_string(),
            type_ref,
            owner: "T".to_string(),
            nullable,
            slot: None,
        }
    }

    #[test]
    fn test_primitives_sort_by_descending_size_then_name() {
        let grouped = DescriptorGrouper::group(
            vec![
                desc("b", TypeRef::bool(), false),
                desc("a", TypeRef::i64(), false),
                desc("m", TypeRef::i32(), false),
                desc("c", TypeRef::i64(), false),
            ],
            &GroupOpts::default(),
            &ClassRegistry::new(),
        );
        let names: Vec<&str> = grouped.primitives().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["a", "c", "m", "b"]);
    }

    #[test]
    fn test_compressed_ints_demoted() {
        let opts = GroupOpts {
            compress_ints: true,
            ..GroupOpts::default()
        };
        let grouped = DescriptorGrouper::group(
            vec![
                desc("n", TypeRef::i32(), false),
                desc("s", TypeRef::i16(), false),
            ],
            &opts,
            &ClassRegistry::new(),
        );
        let names: Vec<&str> = grouped.primitives().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["s", "n"]);
    }

    #[test]
    fn test_boxed_primitives_split_from_plain() {
        let grouped = DescriptorGrouper::group(
            vec![
                desc("a", TypeRef::i32(), false),
                desc("b", TypeRef::i32(), true),
            ],
            &GroupOpts::default(),
            &ClassRegistry::new(),
        );
        assert_eq!(grouped.primitives().len(), 1);
        assert_eq!(grouped.boxed_primitives().len(), 1);
        assert_eq!(grouped.boxed_primitives()[0].name, "b");
    }

    #[test]
    fn test_final_and_polymorphic_objects_split() {
        let reg = ClassRegistry::new();
        reg.register(ClassSpec::builder("Sealed").final_class().build());
        reg.register(ClassSpec::builder("Open").build());

        let grouped = DescriptorGrouper::group(
            vec![
                desc("s", TypeRef::object("Sealed"), true),
                desc("o", TypeRef::object("Open"), true),
                desc("t", TypeRef::string(), true),
                desc("any", TypeRef::opaque(), true),
            ],
            &GroupOpts::default(),
            &reg,
        );
        let finals: Vec<&str> = grouped.final_objects().iter().map(|d| d.name.as_str()).collect();
        let others: Vec<&str> = grouped.other_objects().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(finals, ["s", "t"]);
        assert_eq!(others, ["o", "any"]);
    }

    #[test]
    fn test_ordered_sequence_is_deterministic() {
        let build = || {
            DescriptorGrouper::group(
                vec![
                    desc("z", TypeRef::string(), true),
                    desc("y", TypeRef::i64(), false),
                    desc("x", TypeRef::i8(), true),
                ],
                &GroupOpts::default(),
                &ClassRegistry::new(),
            )
            .into_ordered()
            .iter()
            .map(|d| d.name.clone())
            .collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
        assert_eq!(build(), ["y", "x", "z"]);
    }
}
