// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compatibility engine.
//!
//! Two modes: structural (the default) reconciles a peer class definition
//! against the local class field-by-field; slot mode reproduces the legacy
//! per-ancestor hook protocol on top of the same buffer. Both share the
//! reference protocol and the meta-context handle exchange.

pub mod slot_stream;
pub(crate) mod slots;
pub(crate) mod structural;

use crate::error::{Error, Result};
use crate::model::PrimitiveKind;
use crate::registry::ClassSpec;
use crate::value::{Heap, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Deferred post-read validation callback.
pub type Validator = Box<dyn FnMut(&mut Heap) -> Result<()>>;

/// A registered validator with its firing priority and registration order.
pub(crate) struct PendingValidation {
    pub priority: i32,
    pub seq: u64,
    pub callback: Validator,
}

/// Slot-mode eligibility gate.
///
/// Returns the superclass-first ancestor chain when slot mode applies, `None`
/// when the class is plainly structural. Replace/resolve hooks belong to a
/// different serializer; duplicate field names along the chain make the
/// per-ancestor layout ambiguous.
pub(crate) fn slot_chain_if_eligible(
    class: &Arc<ClassSpec>,
) -> Result<Option<Vec<Arc<ClassSpec>>>> {
    let chain = class.chain();
    if !chain.iter().any(|c| c.has_serial_hooks()) {
        return Ok(None);
    }
    if chain.iter().any(|c| c.has_replace_hooks()) {
        return Err(Error::UnsupportedEncoding(
            "replace/resolve hooks are handled by the replace-resolve serializer",
        ));
    }
    let mut seen = HashSet::new();
    for c in &chain {
        for f in c.own_fields() {
            if !seen.insert(f.name.clone()) {
                return Err(Error::SchemaMismatch(format!(
                    "duplicate field `{}` in ancestor chain of `{}`",
                    f.name,
                    class.name()
                )));
            }
        }
    }
    Ok(Some(chain))
}

/// Primitive kind of a primitive value.
pub(crate) fn prim_kind_of(value: &Value) -> Option<PrimitiveKind> {
    match value {
        Value::Bool(_) => Some(PrimitiveKind::Bool),
        Value::I8(_) => Some(PrimitiveKind::I8),
        Value::I16(_) => Some(PrimitiveKind::I16),
        Value::I32(_) => Some(PrimitiveKind::I32),
        Value::I64(_) => Some(PrimitiveKind::I64),
        Value::F32(_) => Some(PrimitiveKind::F32),
        Value::F64(_) => Some(PrimitiveKind::F64),
        Value::Char(_) => Some(PrimitiveKind::Char),
        _ => None,
    }
}
