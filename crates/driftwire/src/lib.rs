// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Driftwire - schema-evolution object-graph serialization
//!
//! A serialization core for peers whose versions of the same types have
//! drifted apart: fields added, removed, or reordered. Class layouts are
//! exchanged once per peer pairing as structural definitions and addressed
//! by dense integer handles afterwards; a compatibility engine reconciles
//! each received definition against the local class and reads exactly the
//! fields the sender wrote, assigning the ones that exist locally and
//! skipping the rest. Reference identity (shared subobjects, cycles) is
//! preserved through per-message integer ids.
//!
//! ## Quick start
//!
//! ```rust
//! use driftwire::{ClassSpec, Config, Engine, Heap, MetaContext, TypeRef, Value};
//!
//! # fn main() -> driftwire::Result<()> {
//! let engine = Engine::new(Config::default())?;
//! let point = engine.register(
//!     ClassSpec::builder("Point")
//!         .field("x", TypeRef::i32())
//!         .field("y", TypeRef::i32())
//!         .build(),
//! );
//!
//! let mut heap = Heap::new();
//! let obj = heap.new_object(&point, &[("x", 3.into()), ("y", 4.into())])?;
//!
//! let mut to_peer = MetaContext::new();
//! let bytes = engine.serialize(&heap, &Value::Object(obj), &mut to_peer)?;
//!
//! let mut from_peer = MetaContext::new();
//! let mut peer_heap = Heap::new();
//! let root = engine.deserialize(&mut peer_heap, &bytes, &mut from_peer)?;
//! let read = root.as_object().expect("object root");
//! assert_eq!(peer_heap.get(read, "x"), Some(&Value::I32(3)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------------+
//! |                        Engine (facade)                            |
//! |    Config | ClassRegistry | plan cache | encoded-def cache        |
//! +-------------------------------------------------------------------+
//! |                     Compatibility engine                          |
//! |  structural mode (consolidation)  |  slot mode (ancestor hooks)   |
//! +-------------------------------------------------------------------+
//! |        ClassDef + MetaContext (definition exchange)               |
//! |   Descriptor + DescriptorGrouper (deterministic wire layout)      |
//! +-------------------------------------------------------------------+
//! |   Heap/Value (object arena)  |  RefResolver (identity, cycles)    |
//! |             WriteBuffer / ReadBuffer (primitives)                 |
//! +-------------------------------------------------------------------+
//! ```
//!
//! ## Key types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Engine`] | Entry point: owns config, registry, and layout caches |
//! | [`ClassSpec`] | Local description of a serializable class |
//! | [`Heap`] / [`Value`] | Object arena and dynamic field values |
//! | [`MetaContext`] | Per-peer cache of exchanged class definitions |
//! | [`ClassDef`] | Portable structural fingerprint with a stable 64-bit id |
//! | [`SlotWriter`] / [`SlotReader`] | Stream surfaces for per-ancestor hooks |

/// Bounds-checked little-endian buffers with varint support.
pub mod buffer;
/// Portable class definitions with stable 64-bit ids.
pub mod classdef;
/// Compatibility engine: structural and slot modes.
pub mod compat;
/// Engine configuration.
pub mod config;
/// Field descriptors.
pub mod descriptor;
/// Engine facade.
pub mod engine;
/// Crate-wide error type.
pub mod error;
/// Deterministic descriptor grouping.
pub mod grouper;
/// Per-peer session cache of exchanged definitions.
pub mod meta;
/// Declared-type model.
pub mod model;
/// Consolidation plans and the plan cache.
pub mod plan;
/// Class specifications and the class registry.
pub mod registry;
/// Per-call reference tracking.
pub mod resolver;
/// Dynamic values and the object heap.
pub mod value;

pub use buffer::{ReadBuffer, WriteBuffer};
pub use classdef::{ClassDef, FieldDef};
pub use compat::slot_stream::{GetField, PutField, SlotReader, SlotWriter};
pub use compat::Validator;
pub use config::{CompatibleMode, Config};
pub use descriptor::Descriptor;
pub use engine::Engine;
pub use error::{Error, Result};
pub use grouper::{DescriptorGrouper, GroupOpts};
pub use meta::MetaContext;
pub use model::{PrimitiveKind, TypeRef};
pub use registry::{ClassRegistry, ClassSpec, ClassSpecBuilder, FieldSpec};
pub use resolver::RefResolver;
pub use value::{Heap, ObjRef, Record, Value};
