// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Slot-mode write/read protocol.
//!
//! A slot is one ancestor of the concrete class, superclass-first. The wire
//! carries `[slot_count: i16]` then, per slot, the slot's class handle and
//! its payload: either the output of the ancestor's write hook or the
//! structural encoding of the fields that ancestor declares. On read, the
//! local slot index advances past locally-present slots the wire does not
//! mention, firing their `read_no_data` hooks; a wire slot that matches no
//! remaining local slot is fatal.

use crate::compat::slot_stream::{SlotReader, SlotWriter};
use crate::compat::structural::{ObjectReader, ObjectWriter};
use crate::error::{Error, Result};
use crate::registry::ClassSpec;
use crate::value::{ObjRef, Value};
use std::sync::Arc;

pub(crate) fn write_slots(
    w: &mut ObjectWriter<'_>,
    obj: ObjRef,
    class: &Arc<ClassSpec>,
    chain: &[Arc<ClassSpec>],
) -> Result<()> {
    w.buf.write_i16(chain.len() as i16);
    for ancestor in chain {
        let slot_def = w.eng.slot_def(ancestor);
        w.write_class_handle(&slot_def);
        if ancestor.write_self().is_some() {
            let mut stream = SlotWriter::new(w, ancestor.clone(), slot_def, obj);
            // Re-borrow the hook through the chain entry so the stream may
            // mutably borrow the writer.
            let outcome = match ancestor.write_self() {
                Some(hook) => hook(obj, &mut stream),
                None => Ok(()),
            };
            drop(stream);
            outcome?;
        } else {
            let plan = w.eng.plan(class, &slot_def)?;
            w.write_fields_with_plan(&plan, Some(obj))?;
        }
    }
    Ok(())
}

pub(crate) fn read_slots(
    r: &mut ObjectReader<'_>,
    class: &Arc<ClassSpec>,
    chain: &[Arc<ClassSpec>],
) -> Result<Value> {
    let obj = r.heap.alloc(class)?;
    // Register before any slot is read so field back-references resolve to
    // the instance under construction.
    r.resolver.register_read(Value::Object(obj));

    let slot_count = r.buf.read_i16()?;
    if slot_count < 0 {
        return Err(Error::ProtocolViolation(format!(
            "negative slot count {}",
            slot_count
        )));
    }

    let mut index = 0usize;
    for _ in 0..slot_count {
        let wire_def = r.read_class_handle()?;
        let offset = chain[index..]
            .iter()
            .position(|c| c.name() == wire_def.class_name())
            .ok_or_else(|| {
                Error::SchemaMismatch(format!(
                    "wire slot class `{}` matches no remaining local slot of `{}`",
                    wire_def.class_name(),
                    class.name()
                ))
            })?;
        for skipped in &chain[index..index + offset] {
            invoke_read_no_data(r, skipped, obj)?;
        }
        index += offset;

        let ancestor = &chain[index];
        if ancestor.read_self().is_some() {
            let mut stream = SlotReader::new(r, ancestor.clone(), wire_def, obj);
            let outcome = match ancestor.read_self() {
                Some(hook) => hook(obj, &mut stream),
                None => Ok(()),
            };
            drop(stream);
            outcome?;
        } else {
            let plan = r.eng.plan(class, &wire_def)?;
            r.read_fields_with_plan(&plan, Some(obj))?;
        }
        index += 1;
    }

    // Local slots below the last wire slot were also absent on the wire.
    for remaining in &chain[index..] {
        invoke_read_no_data(r, remaining, obj)?;
    }
    Ok(Value::Object(obj))
}

fn invoke_read_no_data(r: &mut ObjectReader<'_>, slot: &Arc<ClassSpec>, obj: ObjRef) -> Result<()> {
    log::debug!(
        "slot `{}` present locally but absent on the wire",
        slot.name()
    );
    if let Some(hook) = slot.read_no_data() {
        hook(r.heap, obj)?;
    }
    Ok(())
}
