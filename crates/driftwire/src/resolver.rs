// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reference tracking for one serialization call.
//!
//! Every tracked value consumes one integer id per message, assigned in
//! emission order on the write side and registration order on the read side;
//! the two numberings are identical by construction, which is what makes
//! back-references resolvable. Objects are registered *before* their fields
//! are visited so cycles resolve to the instance under construction.

use crate::error::{Error, Result};
use crate::value::{ObjRef, Value};
use std::collections::HashMap;

/// Reference-protocol tag bytes.
pub(crate) const REF_NULL: u8 = 0;
pub(crate) const REF_BACK: u8 = 1;
pub(crate) const REF_NEW: u8 = 2;

/// Per-call reference tracker. Concurrent serializations must each own one.
#[derive(Debug, Default)]
pub struct RefResolver {
    object_ids: HashMap<ObjRef, u32>,
    string_ids: HashMap<String, u32>,
    next_id: u32,
    read_values: Vec<Value>,
}

impl RefResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all tracked state. The engine resets a resolver every time it
    /// returns to the pool, whether the message succeeded or failed.
    pub fn reset(&mut self) {
        self.object_ids.clear();
        self.string_ids.clear();
        self.next_id = 0;
        self.read_values.clear();
    }

    // --- write side -------------------------------------------------------

    /// Id previously assigned to `obj`, if it was already emitted.
    pub fn object_id(&self, obj: ObjRef) -> Option<u32> {
        self.object_ids.get(&obj).copied()
    }

    /// Id previously assigned to an equal string, if tracking strings.
    pub fn string_id(&self, s: &str) -> Option<u32> {
        self.string_ids.get(s).copied()
    }

    /// Assign the next id to `obj`.
    pub fn alloc_object_id(&mut self, obj: ObjRef) -> u32 {
        let id = self.bump();
        self.object_ids.insert(obj, id);
        id
    }

    /// Assign the next id to a string value.
    pub fn alloc_string_id(&mut self, s: &str) -> u32 {
        let id = self.bump();
        self.string_ids.insert(s.to_string(), id);
        id
    }

    /// Consume one id for a value with no usable identity (arrays, boxed
    /// primitives). Keeps the write-side numbering aligned with the reader.
    pub fn alloc_anon_id(&mut self) -> u32 {
        self.bump()
    }

    fn bump(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // --- read side --------------------------------------------------------

    /// Register a materialized value and return its id.
    pub fn register_read(&mut self, value: Value) -> u32 {
        let id = self.read_values.len() as u32;
        self.read_values.push(value);
        id
    }

    /// Reserve an id before the value is complete (arrays register before
    /// their elements are read to keep the numbering aligned).
    pub fn register_placeholder(&mut self) -> u32 {
        self.register_read(Value::Null)
    }

    /// Replace a placeholder with the finished value.
    pub fn fulfill(&mut self, id: u32, value: Value) {
        if let Some(slot) = self.read_values.get_mut(id as usize) {
            *slot = value;
        }
    }

    /// Resolve a back-reference.
    pub fn read_value(&self, id: u32) -> Result<Value> {
        self.read_values
            .get(id as usize)
            .cloned()
            .ok_or_else(|| {
                Error::ProtocolViolation(format!(
                    "back-reference {} out of range ({} values registered)",
                    id,
                    self.read_values.len()
                ))
            })
    }

    pub fn tracked(&self) -> usize {
        self.read_values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_ids_are_sequential() {
        let mut r = RefResolver::new();
        assert_eq!(r.alloc_object_id(ObjRef(7)), 0);
        assert_eq!(r.alloc_string_id("s"), 1);
        assert_eq!(r.alloc_anon_id(), 2);
        assert_eq!(r.object_id(ObjRef(7)), Some(0));
        assert_eq!(r.string_id("s"), Some(1));
        assert_eq!(r.object_id(ObjRef(8)), None);
    }

    #[test]
    fn test_read_registration_mirrors_write_numbering() {
        let mut r = RefResolver::new();
        let a = r.register_read(Value::I32(1));
        let b = r.register_read(Value::Str("x".into()));
        assert_eq!((a, b), (0, 1));
        assert_eq!(r.read_value(1).unwrap(), Value::Str("x".into()));
    }

    #[test]
    fn test_placeholder_fulfill() {
        let mut r = RefResolver::new();
        let id = r.register_placeholder();
        assert_eq!(r.read_value(id).unwrap(), Value::Null);
        r.fulfill(id, Value::Array(vec![Value::I32(1)]));
        assert_eq!(r.read_value(id).unwrap(), Value::Array(vec![Value::I32(1)]));
    }

    #[test]
    fn test_out_of_range_back_reference_is_fatal() {
        let r = RefResolver::new();
        assert!(matches!(
            r.read_value(3).unwrap_err(),
            Error::ProtocolViolation(_)
        ));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut r = RefResolver::new();
        r.alloc_object_id(ObjRef(0));
        r.register_read(Value::Bool(true));
        r.reset();
        assert_eq!(r.tracked(), 0);
        assert_eq!(r.object_id(ObjRef(0)), None);
        assert_eq!(r.alloc_anon_id(), 0);
    }
}
