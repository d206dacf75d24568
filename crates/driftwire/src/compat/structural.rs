// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structural-mode object writer and reader.
//!
//! The writer emits each object as `[class handle][field bytes...]` with the
//! fields in the class definition's grouped order; the reader consolidates
//! the received definition against the local class and assigns, widens, or
//! discards each field in that same order. Reference-typed values go through
//! the reference protocol: a tag byte for null/back-reference/new, with ids
//! assigned in emission order on both sides.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::classdef::ClassDef;
use crate::compat::{prim_kind_of, slot_chain_if_eligible, slots, PendingValidation};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::meta::MetaContext;
use crate::model::{PrimitiveKind, TypeRef};
use crate::plan::{ConsolidatedEntry, ConsolidatedPlan};
use crate::resolver::{RefResolver, REF_BACK, REF_NEW, REF_NULL};
use crate::value::{ObjRef, Value};
use std::sync::Arc;

pub(crate) struct ObjectWriter<'s> {
    pub(crate) eng: &'s Engine,
    pub(crate) buf: &'s mut WriteBuffer,
    pub(crate) heap: &'s crate::value::Heap,
    pub(crate) ctx: &'s mut MetaContext,
    pub(crate) resolver: &'s mut RefResolver,
}

impl<'s> ObjectWriter<'s> {
    /// Emit any value through the reference protocol.
    pub(crate) fn write_ref(&mut self, value: &Value, declared: &TypeRef) -> Result<()> {
        let opaque_site = matches!(declared, TypeRef::Opaque);
        match value {
            Value::Null => {
                self.buf.write_u8(REF_NULL);
                Ok(())
            }
            Value::Object(obj) => {
                if !matches!(declared, TypeRef::Object { .. } | TypeRef::Opaque) {
                    return Err(type_clash(declared, "object"));
                }
                if let Some(id) = self.resolver.object_id(*obj) {
                    self.buf.write_u8(REF_BACK);
                    self.buf.write_var_u32(id);
                    return Ok(());
                }
                self.buf.write_u8(REF_NEW);
                self.resolver.alloc_object_id(*obj);
                if opaque_site {
                    self.buf.write_u8(crate::model::TAG_OBJECT);
                }
                self.write_object_body(*obj)
            }
            Value::Str(s) => {
                if !matches!(declared, TypeRef::String | TypeRef::Opaque) {
                    return Err(type_clash(declared, "string"));
                }
                let track = self.eng.config().track_refs_for_basic_types;
                if track {
                    if let Some(id) = self.resolver.string_id(s) {
                        self.buf.write_u8(REF_BACK);
                        self.buf.write_var_u32(id);
                        return Ok(());
                    }
                }
                self.buf.write_u8(REF_NEW);
                if track {
                    self.resolver.alloc_string_id(s);
                } else {
                    self.resolver.alloc_anon_id();
                }
                if opaque_site {
                    self.buf.write_u8(crate::model::TAG_STRING);
                }
                self.buf.write_str(s);
                Ok(())
            }
            Value::Array(items) => {
                let element = match declared {
                    TypeRef::Array(elem) => (**elem).clone(),
                    TypeRef::Opaque => TypeRef::Opaque,
                    _ => return Err(type_clash(declared, "array")),
                };
                self.buf.write_u8(REF_NEW);
                self.resolver.alloc_anon_id();
                if opaque_site {
                    self.buf.write_u8(crate::model::TAG_ARRAY);
                }
                self.buf.write_var_u32(items.len() as u32);
                for item in items {
                    self.write_element(&element, item)?;
                }
                Ok(())
            }
            primitive => {
                let kind = prim_kind_of(primitive)
                    .ok_or_else(|| type_clash(declared, "non-serializable value"))?;
                self.buf.write_u8(REF_NEW);
                self.resolver.alloc_anon_id();
                match declared {
                    TypeRef::Primitive(k) if *k == kind => self.write_primitive(*k, primitive),
                    TypeRef::Opaque => {
                        self.buf.write_u8(TypeRef::Primitive(kind).tag());
                        self.write_primitive(kind, primitive)
                    }
                    _ => Err(type_clash(declared, kind.name())),
                }
            }
        }
    }

    /// Emit one field value according to its declared type and nullability.
    pub(crate) fn write_value(
        &mut self,
        declared: &TypeRef,
        nullable: bool,
        value: &Value,
    ) -> Result<()> {
        match declared {
            TypeRef::Primitive(k) if !nullable => self.write_primitive(*k, value),
            TypeRef::Primitive(k) => {
                if self.eng.config().track_refs_for_basic_types {
                    self.write_ref(value, declared)
                } else if value.is_null() {
                    self.buf.write_u8(0);
                    Ok(())
                } else {
                    self.buf.write_u8(1);
                    self.write_primitive(*k, value)
                }
            }
            TypeRef::String if !self.eng.config().track_refs_for_basic_types => {
                if nullable {
                    match value {
                        Value::Null => {
                            self.buf.write_u8(0);
                            Ok(())
                        }
                        Value::Str(s) => {
                            self.buf.write_u8(1);
                            self.buf.write_str(s);
                            Ok(())
                        }
                        _ => Err(type_clash(declared, "non-string value")),
                    }
                } else {
                    // Non-nullable string: no presence byte.
                    match value {
                        Value::Str(s) => {
                            self.buf.write_str(s);
                            Ok(())
                        }
                        Value::Null => {
                            self.buf.write_str("");
                            Ok(())
                        }
                        _ => Err(type_clash(declared, "non-string value")),
                    }
                }
            }
            _ => self.write_ref(value, declared),
        }
    }

    fn write_element(&mut self, element: &TypeRef, item: &Value) -> Result<()> {
        match element {
            TypeRef::Primitive(k) => self.write_primitive(*k, item),
            other => self.write_ref(item, other),
        }
    }

    pub(crate) fn write_primitive(&mut self, kind: PrimitiveKind, value: &Value) -> Result<()> {
        if value.is_null() {
            let zero = Value::zero_of(&TypeRef::Primitive(kind), false);
            return self.write_primitive(kind, &zero);
        }
        let cfg = self.eng.config();
        match (kind, value) {
            (PrimitiveKind::Bool, Value::Bool(v)) => self.buf.write_bool(*v),
            (PrimitiveKind::I8, Value::I8(v)) => self.buf.write_i8(*v),
            (PrimitiveKind::I16, Value::I16(v)) => self.buf.write_i16(*v),
            (PrimitiveKind::I32, Value::I32(v)) => {
                if cfg.compress_ints {
                    self.buf.write_var_i32(*v);
                } else {
                    self.buf.write_i32(*v);
                }
            }
            (PrimitiveKind::I64, Value::I64(v)) => {
                if cfg.compress_longs {
                    self.buf.write_var_i64(*v);
                } else {
                    self.buf.write_i64(*v);
                }
            }
            (PrimitiveKind::F32, Value::F32(v)) => self.buf.write_f32(*v),
            (PrimitiveKind::F64, Value::F64(v)) => self.buf.write_f64(*v),
            (PrimitiveKind::Char, Value::Char(v)) => self.buf.write_char(*v),
            (kind, _) => return Err(type_clash(&TypeRef::Primitive(kind), "mismatched value")),
        }
        Ok(())
    }

    /// Emit `[class handle]([version stamp])[payload]` for an object.
    pub(crate) fn write_object_body(&mut self, obj: ObjRef) -> Result<()> {
        let heap = self.heap;
        let class = heap.rec(obj)?.class().clone();
        let def = self.eng.structural_def(&class);
        self.write_class_handle(&def);
        if self.eng.config().check_class_version {
            self.buf.write_u64(def.id());
        }
        match slot_chain_if_eligible(&class)? {
            None => {
                let plan = self.eng.plan(&class, &def)?;
                self.write_fields_with_plan(&plan, Some(obj))
            }
            Some(chain) => slots::write_slots(self, obj, &class, &chain),
        }
    }

    pub(crate) fn write_class_handle(&mut self, def: &Arc<ClassDef>) {
        if self.eng.config().meta_share_enabled {
            let eng = self.eng;
            self.ctx.write_class(self.buf, def, || eng.encoded_def(def));
        } else {
            let bytes = self.eng.encoded_def(def);
            MetaContext::write_class_inline(self.buf, &bytes);
        }
    }

    /// Emit field values in plan order: the source object's value where an
    /// accessor exists, the peer-declared zero value otherwise.
    pub(crate) fn write_fields_with_plan(
        &mut self,
        plan: &ConsolidatedPlan,
        src: Option<ObjRef>,
    ) -> Result<()> {
        for entry in &plan.entries {
            match (entry.slot, src) {
                (Some(slot), Some(obj)) => {
                    let heap = self.heap;
                    let value = heap.rec(obj)?.field(slot).ok_or_else(|| {
                        Error::InvalidObject(format!(
                            "record of `{}` has no slot {}",
                            plan.local_class, slot
                        ))
                    })?;
                    self.write_value(&entry.peer_type, entry.peer_nullable, value)?;
                }
                _ => {
                    let zero = Value::zero_of(&entry.peer_type, entry.peer_nullable);
                    self.write_value(&entry.peer_type, entry.peer_nullable, &zero)?;
                }
            }
        }
        Ok(())
    }
}

pub(crate) struct ObjectReader<'s> {
    pub(crate) eng: &'s Engine,
    pub(crate) buf: ReadBuffer<'s>,
    pub(crate) heap: &'s mut crate::value::Heap,
    pub(crate) ctx: &'s mut MetaContext,
    pub(crate) resolver: &'s mut RefResolver,
    pub(crate) validators: Vec<PendingValidation>,
}

impl<'s> ObjectReader<'s> {
    /// Read any value through the reference protocol.
    pub(crate) fn read_ref(&mut self, declared: &TypeRef) -> Result<Value> {
        match self.buf.read_u8()? {
            REF_NULL => Ok(Value::Null),
            REF_BACK => {
                let id = self.buf.read_var_u32()?;
                self.resolver.read_value(id)
            }
            REF_NEW => self.read_new_value(declared),
            other => Err(Error::ProtocolViolation(format!(
                "bad reference tag {:#x}",
                other
            ))),
        }
    }

    /// Dispatch a `REF_NEW` payload. Opaque sites carry a one-byte actual
    /// kind tag; everywhere else the declared type directs the decode.
    fn read_new_value(&mut self, declared: &TypeRef) -> Result<Value> {
        if matches!(declared, TypeRef::Opaque) {
            let tag = self.buf.read_u8()?;
            if tag == crate::model::TAG_OBJECT {
                return self.read_object_body();
            }
            if tag == crate::model::TAG_ARRAY {
                return self.read_array(&TypeRef::Opaque);
            }
            return match TypeRef::from_simple_tag(tag) {
                Some(TypeRef::String) => self.read_new_string(),
                Some(TypeRef::Primitive(k)) => self.read_new_primitive(k),
                _ => Err(Error::ProtocolViolation(format!(
                    "bad value kind tag {:#x}",
                    tag
                ))),
            };
        }
        match declared {
            TypeRef::Object { .. } => self.read_object_body(),
            TypeRef::String => self.read_new_string(),
            TypeRef::Array(elem) => self.read_array(elem.as_ref()),
            TypeRef::Primitive(k) => self.read_new_primitive(*k),
            TypeRef::Opaque => Err(Error::ProtocolViolation(
                "opaque declaration reached typed decode".into(),
            )),
        }
    }

    fn read_new_string(&mut self) -> Result<Value> {
        let s = self.buf.read_str()?;
        let value = Value::Str(s);
        self.resolver.register_read(value.clone());
        Ok(value)
    }

    fn read_new_primitive(&mut self, kind: PrimitiveKind) -> Result<Value> {
        let value = self.read_primitive(kind)?;
        self.resolver.register_read(value.clone());
        Ok(value)
    }

    fn read_array(&mut self, element: &TypeRef) -> Result<Value> {
        // Reserve the array's id before its elements so the numbering stays
        // aligned with the writer.
        let id = self.resolver.register_placeholder();
        let len = self.buf.read_var_u32()? as usize;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.read_element(element)?);
        }
        let value = Value::Array(items);
        self.resolver.fulfill(id, value.clone());
        Ok(value)
    }

    fn read_element(&mut self, element: &TypeRef) -> Result<Value> {
        match element {
            TypeRef::Primitive(k) => self.read_primitive(*k),
            other => self.read_ref(other),
        }
    }

    /// Read one field value according to its declared type and nullability.
    pub(crate) fn read_value_decl(&mut self, declared: &TypeRef, nullable: bool) -> Result<Value> {
        match declared {
            TypeRef::Primitive(k) if !nullable => self.read_primitive(*k),
            TypeRef::Primitive(k) => {
                if self.eng.config().track_refs_for_basic_types {
                    self.read_ref(declared)
                } else {
                    match self.buf.read_u8()? {
                        0 => Ok(Value::Null),
                        1 => self.read_primitive(*k),
                        other => Err(Error::ProtocolViolation(format!(
                            "bad presence byte {:#x}",
                            other
                        ))),
                    }
                }
            }
            TypeRef::String if !self.eng.config().track_refs_for_basic_types => {
                if nullable {
                    match self.buf.read_u8()? {
                        0 => Ok(Value::Null),
                        1 => Ok(Value::Str(self.buf.read_str()?)),
                        other => Err(Error::ProtocolViolation(format!(
                            "bad presence byte {:#x}",
                            other
                        ))),
                    }
                } else {
                    Ok(Value::Str(self.buf.read_str()?))
                }
            }
            _ => self.read_ref(declared),
        }
    }

    pub(crate) fn read_primitive(&mut self, kind: PrimitiveKind) -> Result<Value> {
        let cfg = self.eng.config();
        let value = match kind {
            PrimitiveKind::Bool => Value::Bool(self.buf.read_bool()?),
            PrimitiveKind::I8 => Value::I8(self.buf.read_i8()?),
            PrimitiveKind::I16 => Value::I16(self.buf.read_i16()?),
            PrimitiveKind::I32 => {
                if cfg.compress_ints {
                    Value::I32(self.buf.read_var_i32()?)
                } else {
                    Value::I32(self.buf.read_i32()?)
                }
            }
            PrimitiveKind::I64 => {
                if cfg.compress_longs {
                    Value::I64(self.buf.read_var_i64()?)
                } else {
                    Value::I64(self.buf.read_i64()?)
                }
            }
            PrimitiveKind::F32 => Value::F32(self.buf.read_f32()?),
            PrimitiveKind::F64 => Value::F64(self.buf.read_f64()?),
            PrimitiveKind::Char => Value::Char(self.buf.read_char()?),
        };
        Ok(value)
    }

    pub(crate) fn read_class_handle(&mut self) -> Result<Arc<ClassDef>> {
        if self.eng.config().meta_share_enabled {
            self.ctx.read_class(&mut self.buf)
        } else {
            // Mirror of the writer's inline bypass: nothing is retained, so
            // a long-lived context does not accumulate one definition per
            // received object.
            MetaContext::read_class_inline(&mut self.buf)
        }
    }

    /// Read `[class handle]([version stamp])[payload]` into a fresh instance.
    pub(crate) fn read_object_body(&mut self) -> Result<Value> {
        let def = self.read_class_handle()?;
        let wire_version = if self.eng.config().check_class_version {
            Some(self.buf.read_u64()?)
        } else {
            None
        };
        match self.eng.registry().get(def.class_name()) {
            Some(class) => {
                if let Some(stamp) = wire_version {
                    let local = self.eng.structural_def(&class);
                    if stamp != local.id() {
                        return Err(Error::SchemaMismatch(format!(
                            "class version mismatch for `{}`: wire {:016x}, local {:016x}",
                            class.name(),
                            stamp,
                            local.id()
                        )));
                    }
                }
                match slot_chain_if_eligible(&class)? {
                    None => {
                        let plan = self.eng.plan(&class, &def)?;
                        let obj = self.heap.alloc(&class)?;
                        // Register before fields so cycles resolve to the
                        // instance under construction.
                        self.resolver.register_read(Value::Object(obj));
                        self.read_fields_with_plan(&plan, Some(obj))?;
                        Ok(Value::Object(obj))
                    }
                    Some(chain) => slots::read_slots(self, &class, &chain),
                }
            }
            None => {
                log::debug!(
                    "class `{}` unknown locally; discarding instance",
                    def.class_name()
                );
                self.resolver.register_read(Value::Null);
                for field in def.fields() {
                    let _ = self.read_value_decl(&field.type_ref, field.nullable)?;
                }
                Ok(Value::Null)
            }
        }
    }

    /// Read field values in plan order, assigning through accessors and
    /// discarding the rest.
    pub(crate) fn read_fields_with_plan(
        &mut self,
        plan: &ConsolidatedPlan,
        target: Option<ObjRef>,
    ) -> Result<()> {
        for entry in &plan.entries {
            let value = self.read_value_decl(&entry.peer_type, entry.peer_nullable)?;
            if let (Some(slot), Some(obj)) = (entry.slot, target) {
                let value = widen_for_local(entry, value);
                self.heap.rec_mut(obj)?.set_slot(slot, value);
            }
        }
        Ok(())
    }

    /// Fire registered validators in descending priority; registration order
    /// breaks ties.
    pub(crate) fn run_validators(&mut self) -> Result<()> {
        let mut pending = std::mem::take(&mut self.validators);
        pending.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        for p in &mut pending {
            (p.callback)(self.heap)?;
        }
        Ok(())
    }
}

/// Boxed-null to plain-zero widening on assignment.
fn widen_for_local(entry: &ConsolidatedEntry, value: Value) -> Value {
    if value.is_null() && !entry.local_nullable {
        if let Some(local_type) = &entry.local_type {
            return Value::zero_of(local_type, false);
        }
    }
    value
}

fn type_clash(declared: &TypeRef, got: &str) -> Error {
    Error::SchemaMismatch(format!(
        "value of kind `{}` cannot serialize as declared type {}",
        got, declared
    ))
}
