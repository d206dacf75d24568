// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Class specifications and the class registry.
//!
//! A [`ClassSpec`] is the local description of a serializable type: its own
//! declared fields, an optional parent class, and the optional per-ancestor
//! custom-serialization hooks. The flattened field layout (inherited fields
//! included, most-derived winning on a name clash) is precomputed at build
//! time and defines the record slot layout used by the heap and the engine.

use crate::compat::slot_stream::{SlotReader, SlotWriter};
use crate::error::Result;
use crate::model::TypeRef;
use crate::value::{Heap, ObjRef, Value};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Custom write hook: emits the slot's payload through a [`SlotWriter`].
pub type WriteSelfFn =
    dyn Fn(ObjRef, &mut SlotWriter<'_, '_>) -> Result<()> + Send + Sync;

/// Custom read hook: consumes the slot's payload through a [`SlotReader`].
pub type ReadSelfFn =
    dyn Fn(ObjRef, &mut SlotReader<'_, '_>) -> Result<()> + Send + Sync;

/// Invoked when a slot is present locally but absent on the wire.
pub type ReadNoDataFn = dyn Fn(&mut Heap, ObjRef) -> Result<()> + Send + Sync;

/// One declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub type_ref: TypeRef,
    pub nullable: bool,
}

/// A field in the flattened layout, tagged with the class that declared it.
#[derive(Debug, Clone)]
pub struct FlatField {
    pub name: String,
    pub type_ref: TypeRef,
    pub nullable: bool,
    pub owner: String,
}

/// Local description of a serializable class.
pub struct ClassSpec {
    name: String,
    own_fields: Vec<FieldSpec>,
    parent: Option<Arc<ClassSpec>>,
    is_final: bool,
    instantiable: bool,
    write_self: Option<Box<WriteSelfFn>>,
    read_self: Option<Box<ReadSelfFn>>,
    read_no_data: Option<Box<ReadNoDataFn>>,
    has_replace_hooks: bool,
    flat: Vec<FlatField>,
    // LIFO pool of sparse field buffers for PutField/GetField (§ pooling).
    field_pool: Mutex<Vec<Vec<Option<Value>>>>,
}

impl fmt::Debug for ClassSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassSpec")
            .field("name", &self.name)
            .field("own_fields", &self.own_fields)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("is_final", &self.is_final)
            .field("instantiable", &self.instantiable)
            .field("write_self", &self.write_self.is_some())
            .field("read_self", &self.read_self.is_some())
            .field("read_no_data", &self.read_no_data.is_some())
            .finish()
    }
}

impl ClassSpec {
    pub fn builder(name: impl Into<String>) -> ClassSpecBuilder {
        ClassSpecBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields this class declares itself (no inherited fields).
    pub fn own_fields(&self) -> &[FieldSpec] {
        &self.own_fields
    }

    pub fn parent(&self) -> Option<&Arc<ClassSpec>> {
        self.parent.as_ref()
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_instantiable(&self) -> bool {
        self.instantiable
    }

    pub fn write_self(&self) -> Option<&WriteSelfFn> {
        self.write_self.as_deref()
    }

    pub fn read_self(&self) -> Option<&ReadSelfFn> {
        self.read_self.as_deref()
    }

    pub fn read_no_data(&self) -> Option<&ReadNoDataFn> {
        self.read_no_data.as_deref()
    }

    pub fn has_replace_hooks(&self) -> bool {
        self.has_replace_hooks
    }

    pub fn has_serial_hooks(&self) -> bool {
        self.write_self.is_some() || self.read_self.is_some()
    }

    /// Flattened field layout: inherited fields first (superclass order),
    /// a most-derived redeclaration replacing its ancestor's entry in place.
    pub fn effective_fields(&self) -> &[FlatField] {
        &self.flat
    }

    /// Record slot index of a field, by name.
    pub fn field_slot(&self, name: &str) -> Option<usize> {
        self.flat.iter().position(|f| f.name == name)
    }

    /// Ancestor chain, superclass-first, ending with `self`.
    pub fn chain(self: &Arc<Self>) -> Vec<Arc<ClassSpec>> {
        let mut chain = match &self.parent {
            Some(p) => p.chain(),
            None => Vec::new(),
        };
        chain.push(self.clone());
        chain
    }

    pub(crate) fn take_field_buf(&self, len: usize) -> Vec<Option<Value>> {
        let mut pool = self.field_pool.lock();
        match pool.pop() {
            Some(mut buf) => {
                buf.clear();
                buf.resize(len, None);
                buf
            }
            None => {
                log::trace!("field pool for `{}` grew", self.name);
                vec![None; len]
            }
        }
    }

    pub(crate) fn return_field_buf(&self, mut buf: Vec<Option<Value>>) {
        // Clear before pooling so no value leaks into the next invocation.
        buf.clear();
        self.field_pool.lock().push(buf);
    }
}

/// Fluent builder for [`ClassSpec`].
pub struct ClassSpecBuilder {
    name: String,
    own_fields: Vec<FieldSpec>,
    parent: Option<Arc<ClassSpec>>,
    is_final: bool,
    instantiable: bool,
    write_self: Option<Box<WriteSelfFn>>,
    read_self: Option<Box<ReadSelfFn>>,
    read_no_data: Option<Box<ReadNoDataFn>>,
    has_replace_hooks: bool,
}

impl ClassSpecBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            own_fields: Vec::new(),
            parent: None,
            is_final: false,
            instantiable: true,
            write_self: None,
            read_self: None,
            read_no_data: None,
            has_replace_hooks: false,
        }
    }

    /// Add a non-nullable field.
    pub fn field(mut self, name: impl Into<String>, type_ref: TypeRef) -> Self {
        self.own_fields.push(FieldSpec {
            name: name.into(),
            type_ref,
            nullable: false,
        });
        self
    }

    /// Add a nullable field (a boxed primitive, or a nullable reference).
    pub fn nullable_field(mut self, name: impl Into<String>, type_ref: TypeRef) -> Self {
        self.own_fields.push(FieldSpec {
            name: name.into(),
            type_ref,
            nullable: true,
        });
        self
    }

    pub fn parent(mut self, parent: Arc<ClassSpec>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn final_class(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Mark the class as non-constructible; reading an instance fails.
    pub fn non_instantiable(mut self) -> Self {
        self.instantiable = false;
        self
    }

    pub fn write_self<F>(mut self, hook: F) -> Self
    where
        F: Fn(ObjRef, &mut SlotWriter<'_, '_>) -> Result<()> + Send + Sync + 'static,
    {
        self.write_self = Some(Box::new(hook));
        self
    }

    pub fn read_self<F>(mut self, hook: F) -> Self
    where
        F: Fn(ObjRef, &mut SlotReader<'_, '_>) -> Result<()> + Send + Sync + 'static,
    {
        self.read_self = Some(Box::new(hook));
        self
    }

    pub fn read_no_data<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Heap, ObjRef) -> Result<()> + Send + Sync + 'static,
    {
        self.read_no_data = Some(Box::new(hook));
        self
    }

    /// Mark the class as declaring replace/resolve hooks. Slot mode refuses
    /// such classes; a separate replace-resolve serializer owns them.
    pub fn replace_hooks(mut self) -> Self {
        self.has_replace_hooks = true;
        self
    }

    pub fn build(self) -> ClassSpec {
        let mut flat: Vec<FlatField> = self
            .parent
            .as_ref()
            .map(|p| p.effective_fields().to_vec())
            .unwrap_or_default();
        for f in &self.own_fields {
            let flat_field = FlatField {
                name: f.name.clone(),
                type_ref: f.type_ref.clone(),
                nullable: f.nullable,
                owner: self.name.clone(),
            };
            match flat.iter().position(|existing| existing.name == f.name) {
                // Most-derived declaration wins, keeping the ancestor's slot.
                Some(i) => flat[i] = flat_field,
                None => flat.push(flat_field),
            }
        }
        ClassSpec {
            name: self.name,
            own_fields: self.own_fields,
            parent: self.parent,
            is_final: self.is_final,
            instantiable: self.instantiable,
            write_self: self.write_self,
            read_self: self.read_self,
            read_no_data: self.read_no_data,
            has_replace_hooks: self.has_replace_hooks,
            flat,
            field_pool: Mutex::new(Vec::new()),
        }
    }
}

/// Concurrent name-keyed registry of class specifications.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: DashMap<String, Arc<ClassSpec>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class; the latest registration for a name wins.
    pub fn register(&self, spec: ClassSpec) -> Arc<ClassSpec> {
        let arc = Arc::new(spec);
        self.classes.insert(arc.name().to_string(), arc.clone());
        arc
    }

    pub fn get(&self, name: &str) -> Option<Arc<ClassSpec>> {
        self.classes.get(name).map(|r| r.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_inherits_parent_fields() {
        let base = Arc::new(
            ClassSpec::builder("Base")
                .field("id", TypeRef::i64())
                .build(),
        );
        let child = ClassSpec::builder("Child")
            .parent(base)
            .field("name", TypeRef::string())
            .build();

        let flat = child.effective_fields();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].name, "id");
        assert_eq!(flat[0].owner, "Base");
        assert_eq!(flat[1].name, "name");
        assert_eq!(flat[1].owner, "Child");
    }

    #[test]
    fn test_most_derived_wins_in_place() {
        let base = Arc::new(
            ClassSpec::builder("Base")
                .field("id", TypeRef::i32())
                .field("tag", TypeRef::string())
                .build(),
        );
        let child = ClassSpec::builder("Child")
            .parent(base)
            .field("id", TypeRef::i64())
            .build();

        let flat = child.effective_fields();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].name, "id");
        assert_eq!(flat[0].type_ref, TypeRef::i64());
        assert_eq!(flat[0].owner, "Child");
        assert_eq!(child.field_slot("id"), Some(0));
        assert_eq!(child.field_slot("tag"), Some(1));
    }

    #[test]
    fn test_chain_is_superclass_first() {
        let a = Arc::new(ClassSpec::builder("A").build());
        let b = Arc::new(ClassSpec::builder("B").parent(a.clone()).build());
        let c = Arc::new(ClassSpec::builder("C").parent(b.clone()).build());

        let chain = c.chain();
        let names: Vec<&str> = chain.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn test_registry_latest_wins() {
        let reg = ClassRegistry::new();
        reg.register(ClassSpec::builder("P").field("x", TypeRef::i32()).build());
        reg.register(
            ClassSpec::builder("P")
                .field("x", TypeRef::i32())
                .field("y", TypeRef::i32())
                .build(),
        );
        let p = reg.get("P").unwrap();
        assert_eq!(p.effective_fields().len(), 2);
    }

    #[test]
    fn test_field_pool_clears_on_release() {
        let class = ClassSpec::builder("Pooled").field("x", TypeRef::i32()).build();
        let mut buf = class.take_field_buf(3);
        buf[1] = Some(Value::I32(9));
        class.return_field_buf(buf);
        let again = class.take_field_buf(3);
        assert!(again.iter().all(Option::is_none));
    }
}
