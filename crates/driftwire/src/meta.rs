// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-peer session cache of exchanged class definitions.
//!
//! A [`MetaContext`] belongs to one direction of one peer pairing and
//! persists across messages. The writer emits `0` for "new class, definition
//! follows inline" and `handle + 1` afterwards; the reader mirrors this with
//! an ordered table of received definitions. Handles are dense, monotonic,
//! and never reused within a context.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::classdef::ClassDef;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Session cache for one direction of one peer pairing.
#[derive(Debug, Default)]
pub struct MetaContext {
    // Keyed by ClassDef id: a class can legitimately contribute two distinct
    // definitions (structural layout and per-ancestor slot layout).
    class_to_handle: HashMap<u64, u32>,
    read_defs: Vec<Arc<ClassDef>>,
}

impl MetaContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of definitions this context has emitted handles for.
    pub fn handle_count(&self) -> usize {
        self.class_to_handle.len()
    }

    /// Definitions received so far, in arrival order.
    pub fn read_defs(&self) -> &[Arc<ClassDef>] {
        &self.read_defs
    }

    /// Emit the class handle for `def`, sending the definition bytes inline
    /// on first occurrence. `encoded` supplies the canonical bytes lazily so
    /// a cache hit costs nothing.
    pub fn write_class<F>(&mut self, out: &mut WriteBuffer, def: &ClassDef, encoded: F)
    where
        F: FnOnce() -> Arc<Vec<u8>>,
    {
        if let Some(&handle) = self.class_to_handle.get(&def.id()) {
            out.write_var_u32(handle + 1);
            return;
        }
        out.write_var_u32(0);
        let bytes = encoded();
        out.write_bytes(&bytes);
        let handle = self.class_to_handle.len() as u32;
        self.class_to_handle.insert(def.id(), handle);
        log::debug!(
            "meta context: shared {} as handle {}",
            def,
            handle
        );
    }

    /// Emit the definition inline unconditionally (meta sharing disabled).
    pub fn write_class_inline(out: &mut WriteBuffer, encoded: &[u8]) {
        out.write_var_u32(0);
        out.write_bytes(encoded);
    }

    /// Read a definition written by [`write_class_inline`]. Nothing is
    /// retained: with meta sharing disabled every occurrence is a fresh
    /// inline copy and handles never appear on the wire.
    ///
    /// [`write_class_inline`]: MetaContext::write_class_inline
    pub fn read_class_inline(input: &mut ReadBuffer<'_>) -> Result<Arc<ClassDef>> {
        let raw = input.read_var_u32()?;
        if raw != 0 {
            return Err(Error::ProtocolViolation(format!(
                "class handle {} received with meta sharing disabled",
                raw
            )));
        }
        decode_inline_def(input)
    }

    /// Read a class handle, decoding and retaining an inline definition when
    /// the handle is `0`.
    pub fn read_class(&mut self, input: &mut ReadBuffer<'_>) -> Result<Arc<ClassDef>> {
        let raw = input.read_var_u32()?;
        if raw == 0 {
            let def = decode_inline_def(input)?;
            self.read_defs.push(def.clone());
            log::debug!(
                "meta context: received {} as handle {}",
                def,
                self.read_defs.len() - 1
            );
            return Ok(def);
        }
        let index = (raw - 1) as usize;
        self.read_defs.get(index).cloned().ok_or_else(|| {
            Error::ProtocolViolation(format!(
                "class handle {} out of range ({} definitions known)",
                raw,
                self.read_defs.len()
            ))
        })
    }
}

fn decode_inline_def(input: &mut ReadBuffer<'_>) -> Result<Arc<ClassDef>> {
    let bytes = input.read_bytes()?;
    let mut sub = ReadBuffer::new(bytes);
    let def = ClassDef::decode(&mut sub)?;
    if !sub.is_eof() {
        return Err(Error::ProtocolViolation(format!(
            "trailing bytes after class definition for `{}`",
            def.class_name()
        )));
    }
    Ok(Arc::new(def))
}
