// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hook-facing stream surfaces.
//!
//! [`SlotWriter`] and [`SlotReader`] are the scratch surfaces handed to user
//! `write_self`/`read_self` hooks. They expose exactly the supported subset
//! of the legacy stream protocol: default field emission, named put/get
//! fields, typed scalar helpers, and validator registration. Every legacy
//! operation outside that subset fails loudly with `UnsupportedEncoding` so
//! migrations surface early instead of silently corrupting streams.
//!
//! PutField/GetField buffers are pooled LIFO on the slot's class; release
//! clears every entry back to the absent sentinel.

use crate::classdef::ClassDef;
use crate::compat::structural::{ObjectReader, ObjectWriter};
use crate::compat::{PendingValidation, Validator};
use crate::error::{Error, Result};
use crate::registry::ClassSpec;
use crate::value::{Heap, ObjRef, Value};
use std::sync::Arc;

/// Sparse named-field buffer for a write hook.
#[derive(Debug)]
pub struct PutField {
    def: Arc<ClassDef>,
    values: Vec<Option<Value>>,
}

impl PutField {
    fn new(def: Arc<ClassDef>, values: Vec<Option<Value>>) -> Self {
        Self { def, values }
    }

    /// Set a field by name. Names outside the slot's declared field set are
    /// rejected.
    pub fn put(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self
            .def
            .fields()
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?;
        self.values[index] = Some(value.into());
        Ok(())
    }
}

/// Named-field view over one received slot payload.
///
/// The name universe is the *local* slot class; values come from the wire.
/// A name the sender's definition lacks reads as absent.
#[derive(Debug)]
pub struct GetField {
    local_def: Arc<ClassDef>,
    values: Vec<Option<Value>>,
}

impl GetField {
    /// Value of `name`, or `fallback` when the sender did not carry it.
    pub fn get(&self, name: &str, fallback: impl Into<Value>) -> Result<Value> {
        let index = self.index_of(name)?;
        Ok(self.values[index].clone().unwrap_or_else(|| fallback.into()))
    }

    /// True iff `name` was absent from the sender's slot definition.
    pub fn defaulted(&self, name: &str) -> Result<bool> {
        let index = self.index_of(name)?;
        Ok(self.values[index].is_none())
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.local_def
            .fields()
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }
}

/// Stream surface for a `write_self` hook.
pub struct SlotWriter<'a, 's> {
    ow: &'a mut ObjectWriter<'s>,
    slot_class: Arc<ClassSpec>,
    slot_def: Arc<ClassDef>,
    obj: ObjRef,
    defaulted: bool,
    put: Option<PutField>,
}

impl<'a, 's> SlotWriter<'a, 's> {
    pub(crate) fn new(
        ow: &'a mut ObjectWriter<'s>,
        slot_class: Arc<ClassSpec>,
        slot_def: Arc<ClassDef>,
        obj: ObjRef,
    ) -> Self {
        Self {
            ow,
            slot_class,
            slot_def,
            obj,
            defaulted: false,
            put: None,
        }
    }

    /// Emit the slot's declared fields from the object, in grouped order.
    /// At most once per slot invocation.
    pub fn default_write(&mut self) -> Result<()> {
        if self.defaulted {
            return Err(Error::NotActive("default_write already invoked"));
        }
        self.defaulted = true;
        let class = self.ow.heap.rec(self.obj)?.class().clone();
        let plan = self.ow.eng.plan(&class, &self.slot_def)?;
        self.ow.write_fields_with_plan(&plan, Some(self.obj))
    }

    /// The slot's sparse put-field record; created on first call.
    pub fn put_fields(&mut self) -> &mut PutField {
        let slot_class = &self.slot_class;
        let slot_def = &self.slot_def;
        self.put.get_or_insert_with(|| {
            let values = slot_class.take_field_buf(slot_def.fields().len());
            PutField::new(slot_def.clone(), values)
        })
    }

    /// Flush the put-field record: declared fields in declared order, unset
    /// primitives as zero, unset references as null. Recycles the record.
    pub fn write_fields(&mut self) -> Result<()> {
        let put = self
            .put
            .take()
            .ok_or(Error::NotActive("write_fields without put_fields"))?;
        let PutField { def, values } = put;
        let mut outcome = Ok(());
        for (field, value) in def.fields().iter().zip(&values) {
            let result = match value {
                Some(v) => self.ow.write_value(&field.type_ref, field.nullable, v),
                None => {
                    let zero = Value::zero_of(&field.type_ref, field.nullable);
                    self.ow.write_value(&field.type_ref, field.nullable, &zero)
                }
            };
            if let Err(e) = result {
                outcome = Err(e);
                break;
            }
        }
        self.slot_class.return_field_buf(values);
        outcome
    }

    pub fn heap(&self) -> &Heap {
        self.ow.heap
    }

    // Typed scalar helpers, delegating straight to the buffer.

    pub fn write_bool(&mut self, v: bool) {
        self.ow.buf.write_bool(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.ow.buf.write_i8(v);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.ow.buf.write_i16(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.ow.buf.write_i32(v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.ow.buf.write_i64(v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.ow.buf.write_f32(v);
    }

    pub fn write_f64(&mut self, v: f64) {
        self.ow.buf.write_f64(v);
    }

    pub fn write_char(&mut self, v: char) {
        self.ow.buf.write_char(v);
    }

    pub fn write_str(&mut self, v: &str) {
        self.ow.buf.write_str(v);
    }

    // Legacy operations outside the supported subset.

    pub fn annotate_class(&mut self) -> Result<()> {
        Err(Error::UnsupportedEncoding("annotate_class"))
    }

    pub fn write_class_descriptor(&mut self) -> Result<()> {
        Err(Error::UnsupportedEncoding("write_class_descriptor"))
    }

    pub fn enable_replace_object(&mut self) -> Result<()> {
        Err(Error::UnsupportedEncoding("enable_replace_object"))
    }

    pub fn reset(&mut self) -> Result<()> {
        Err(Error::UnsupportedEncoding("reset"))
    }

    pub fn write_stream_header(&mut self) -> Result<()> {
        Err(Error::UnsupportedEncoding("write_stream_header"))
    }

    pub fn use_protocol_version(&mut self) -> Result<()> {
        Err(Error::UnsupportedEncoding("use_protocol_version"))
    }
}

impl Drop for SlotWriter<'_, '_> {
    fn drop(&mut self) {
        // Pool return is unconditional; an abandoned PutField (hook error
        // before write_fields) must not leak state into the next invocation.
        if let Some(put) = self.put.take() {
            self.slot_class.return_field_buf(put.values);
        }
    }
}

/// Stream surface for a `read_self` hook.
pub struct SlotReader<'a, 's> {
    or: &'a mut ObjectReader<'s>,
    slot_class: Arc<ClassSpec>,
    wire_def: Arc<ClassDef>,
    obj: ObjRef,
    consumed: bool,
    get: Option<GetField>,
}

impl<'a, 's> SlotReader<'a, 's> {
    pub(crate) fn new(
        or: &'a mut ObjectReader<'s>,
        slot_class: Arc<ClassSpec>,
        wire_def: Arc<ClassDef>,
        obj: ObjRef,
    ) -> Self {
        Self {
            or,
            slot_class,
            wire_def,
            obj,
            consumed: false,
            get: None,
        }
    }

    /// Read the slot's fields and assign them to the instance through the
    /// consolidated plan. At most once per slot invocation.
    pub fn default_read(&mut self) -> Result<()> {
        if self.consumed {
            return Err(Error::NotActive("slot payload already consumed"));
        }
        self.consumed = true;
        let class = self.or.heap.rec(self.obj)?.class().clone();
        let plan = self.or.eng.plan(&class, &self.wire_def)?;
        self.or.read_fields_with_plan(&plan, Some(self.obj))
    }

    /// Read the slot payload into a named-field view. At most once per slot
    /// invocation (shared with `default_read`).
    pub fn read_fields(&mut self) -> Result<&GetField> {
        if self.consumed {
            return Err(Error::NotActive("slot payload already consumed"));
        }
        self.consumed = true;
        let local_def = self.or.eng.slot_def(&self.slot_class);
        let mut values = self
            .slot_class
            .take_field_buf(local_def.fields().len());
        for field in self.wire_def.fields() {
            let value = match self.or.read_value_decl(&field.type_ref, field.nullable) {
                Ok(v) => v,
                Err(e) => {
                    self.slot_class.return_field_buf(values);
                    return Err(e);
                }
            };
            // Wire fields unknown to the local slot are read and discarded.
            if let Some(index) = local_def
                .fields()
                .iter()
                .position(|l| l.name == field.name)
            {
                values[index] = Some(value);
            }
        }
        let get = GetField { local_def, values };
        Ok(self.get.insert(get))
    }

    /// Defer a callback until the entire object graph has been read.
    /// Callbacks fire in descending priority; registration order breaks ties.
    pub fn register_validation(
        &mut self,
        callback: Option<Validator>,
        priority: i32,
    ) -> Result<()> {
        let callback = callback
            .ok_or_else(|| Error::InvalidObject("null validation callback".into()))?;
        let seq = self.or.validators.len() as u64;
        self.or.validators.push(PendingValidation {
            priority,
            seq,
            callback,
        });
        Ok(())
    }

    pub fn heap(&self) -> &Heap {
        self.or.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        self.or.heap
    }

    // Typed scalar helpers, delegating straight to the buffer.

    pub fn read_bool(&mut self) -> Result<bool> {
        self.or.buf.read_bool()
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.or.buf.read_i8()
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.or.buf.read_i16()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.or.buf.read_i32()
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.or.buf.read_i64()
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.or.buf.read_f32()
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.or.buf.read_f64()
    }

    pub fn read_char(&mut self) -> Result<char> {
        self.or.buf.read_char()
    }

    pub fn read_str(&mut self) -> Result<String> {
        self.or.buf.read_str()
    }

    // Legacy operations outside the supported subset.

    pub fn read_line(&mut self) -> Result<String> {
        Err(Error::UnsupportedEncoding("read_line"))
    }

    pub fn reset(&mut self) -> Result<()> {
        Err(Error::UnsupportedEncoding("reset"))
    }

    pub fn use_protocol_version(&mut self) -> Result<()> {
        Err(Error::UnsupportedEncoding("use_protocol_version"))
    }
}

impl Drop for SlotReader<'_, '_> {
    fn drop(&mut self) {
        if let Some(get) = self.get.take() {
            self.slot_class.return_field_buf(get.values);
        }
    }
}
