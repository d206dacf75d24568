// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic values and the object heap.
//!
//! Objects live in an arena-style [`Heap`] and are addressed by copyable
//! [`ObjRef`] handles; object identity is handle equality. Field values are
//! [`Value`]s; arrays are embedded by value, while object edges are handles,
//! so cyclic graphs are representable without owning references.

use crate::error::{Error, Result};
use crate::model::{PrimitiveKind, TypeRef};
use crate::registry::ClassSpec;
use std::sync::Arc;

/// Handle to an object in a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub(crate) u32);

impl ObjRef {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A dynamic field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Char(char),
    Str(String),
    Array(Vec<Value>),
    Object(ObjRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self {
            Self::I8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Self::I16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Self::Char(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjRef> {
        match self {
            Self::Object(r) => Some(*r),
            _ => None,
        }
    }

    /// Language-default value for a declared type.
    ///
    /// Nullable fields and all reference types default to `Null`; plain
    /// primitives default to their typed zero.
    pub fn zero_of(type_ref: &TypeRef, nullable: bool) -> Value {
        if nullable {
            return Value::Null;
        }
        match type_ref {
            TypeRef::Primitive(PrimitiveKind::Bool) => Value::Bool(false),
            TypeRef::Primitive(PrimitiveKind::I8) => Value::I8(0),
            TypeRef::Primitive(PrimitiveKind::I16) => Value::I16(0),
            TypeRef::Primitive(PrimitiveKind::I32) => Value::I32(0),
            TypeRef::Primitive(PrimitiveKind::I64) => Value::I64(0),
            TypeRef::Primitive(PrimitiveKind::F32) => Value::F32(0.0),
            TypeRef::Primitive(PrimitiveKind::F64) => Value::F64(0.0),
            TypeRef::Primitive(PrimitiveKind::Char) => Value::Char('\0'),
            TypeRef::String => Value::Str(String::new()),
            TypeRef::Array(_) => Value::Array(Vec::new()),
            _ => Value::Null,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::I8(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::I16(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Self::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<ObjRef> for Value {
    fn from(v: ObjRef) -> Self {
        Self::Object(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

/// One materialized object: its class and one value slot per effective field.
#[derive(Debug, Clone)]
pub struct Record {
    class: Arc<ClassSpec>,
    fields: Vec<Value>,
}

impl Record {
    pub fn class(&self) -> &Arc<ClassSpec> {
        &self.class
    }

    pub fn field(&self, slot: usize) -> Option<&Value> {
        self.fields.get(slot)
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub(crate) fn set_slot(&mut self, slot: usize, value: Value) {
        self.fields[slot] = value;
    }
}

/// Arena of materialized objects.
#[derive(Debug, Default)]
pub struct Heap {
    records: Vec<Record>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Allocate a zero-initialized instance of `class`.
    ///
    /// Every field slot starts at its language default; the handle is valid
    /// immediately, before any field is assigned.
    pub fn alloc(&mut self, class: &Arc<ClassSpec>) -> Result<ObjRef> {
        if !class.is_instantiable() {
            return Err(Error::ConstructionFailed(format!(
                "class `{}` is not instantiable",
                class.name()
            )));
        }
        let fields = class
            .effective_fields()
            .iter()
            .map(|f| Value::zero_of(&f.type_ref, f.nullable))
            .collect();
        let handle = ObjRef(self.records.len() as u32);
        self.records.push(Record {
            class: class.clone(),
            fields,
        });
        Ok(handle)
    }

    /// Allocate and assign named fields in one step.
    pub fn new_object(
        &mut self,
        class: &Arc<ClassSpec>,
        fields: &[(&str, Value)],
    ) -> Result<ObjRef> {
        let obj = self.alloc(class)?;
        for (name, value) in fields {
            self.set(obj, name, value.clone())?;
        }
        Ok(obj)
    }

    pub fn record(&self, obj: ObjRef) -> Option<&Record> {
        self.records.get(obj.index())
    }

    pub(crate) fn rec(&self, obj: ObjRef) -> Result<&Record> {
        self.records
            .get(obj.index())
            .ok_or_else(|| Error::InvalidObject(format!("dangling object handle {}", obj.0)))
    }

    pub(crate) fn rec_mut(&mut self, obj: ObjRef) -> Result<&mut Record> {
        self.records
            .get_mut(obj.index())
            .ok_or_else(|| Error::InvalidObject(format!("dangling object handle {}", obj.0)))
    }

    pub fn class_of(&self, obj: ObjRef) -> Option<&Arc<ClassSpec>> {
        self.record(obj).map(Record::class)
    }

    /// Read a field by name.
    pub fn get(&self, obj: ObjRef, name: &str) -> Option<&Value> {
        let rec = self.record(obj)?;
        let slot = rec.class.field_slot(name)?;
        rec.field(slot)
    }

    /// Assign a field by name.
    pub fn set(&mut self, obj: ObjRef, name: &str, value: impl Into<Value>) -> Result<()> {
        let rec = self.rec_mut(obj)?;
        let slot = rec
            .class
            .field_slot(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?;
        rec.set_slot(slot, value.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClassSpec;

    fn point_class() -> Arc<ClassSpec> {
        Arc::new(
            ClassSpec::builder("Point")
                .field("x", TypeRef::i32())
                .field("y", TypeRef::i32())
                .build(),
        )
    }

    #[test]
    fn test_zero_of() {
        assert_eq!(Value::zero_of(&TypeRef::i32(), false), Value::I32(0));
        assert_eq!(Value::zero_of(&TypeRef::i32(), true), Value::Null);
        assert_eq!(
            Value::zero_of(&TypeRef::string(), false),
            Value::Str(String::new())
        );
        assert_eq!(Value::zero_of(&TypeRef::string(), true), Value::Null);
        assert_eq!(Value::zero_of(&TypeRef::object("X"), false), Value::Null);
        assert_eq!(Value::zero_of(&TypeRef::char(), false), Value::Char('\0'));
    }

    #[test]
    fn test_alloc_defaults_fields() {
        let mut heap = Heap::new();
        let class = point_class();
        let obj = heap.alloc(&class).unwrap();
        assert_eq!(heap.get(obj, "x"), Some(&Value::I32(0)));
        assert_eq!(heap.get(obj, "y"), Some(&Value::I32(0)));
    }

    #[test]
    fn test_set_get_by_name() {
        let mut heap = Heap::new();
        let class = point_class();
        let obj = heap.new_object(&class, &[("x", 3.into()), ("y", 4.into())]).unwrap();
        assert_eq!(heap.get(obj, "x"), Some(&Value::I32(3)));
        assert_eq!(heap.get(obj, "y"), Some(&Value::I32(4)));
        assert!(heap.get(obj, "z").is_none());
    }

    #[test]
    fn test_set_unknown_field_fails() {
        let mut heap = Heap::new();
        let class = point_class();
        let obj = heap.alloc(&class).unwrap();
        assert!(matches!(
            heap.set(obj, "nope", 1).unwrap_err(),
            Error::UnknownField(_)
        ));
    }

    #[test]
    fn test_identity_is_handle_equality() {
        let mut heap = Heap::new();
        let class = point_class();
        let a = heap.alloc(&class).unwrap();
        let b = heap.alloc(&class).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a);
        assert_eq!(Value::Object(a), Value::Object(a));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_non_instantiable_class_fails_alloc() {
        let mut heap = Heap::new();
        let class = Arc::new(
            ClassSpec::builder("Abstract")
                .field("x", TypeRef::i32())
                .non_instantiable()
                .build(),
        );
        assert!(matches!(
            heap.alloc(&class).unwrap_err(),
            Error::ConstructionFailed(_)
        ));
    }
}
