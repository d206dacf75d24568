// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Consolidation plans and the plan cache.
//!
//! Consolidation aligns a peer class definition with the local class: the
//! result has one entry per peer field, in peer order, each either carrying a
//! local record slot or marked absent (skip on read, zero-fill on write).
//! Plans are immutable and cached per `(local class, definition id)`.
//!
//! The cache is the code-generation seam: lookups take a shared lock and an
//! atomic load, never blocking while another call is still producing a plan;
//! installation is an atomic pointer swap observed by the next call.

use crate::classdef::ClassDef;
use crate::config::CompatibleMode;
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::model::TypeRef;
use crate::registry::ClassSpec;
use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// One peer field aligned against the local class.
#[derive(Debug, Clone)]
pub struct ConsolidatedEntry {
    pub name: String,
    pub peer_type: TypeRef,
    pub peer_nullable: bool,
    /// Local record slot; `None` means skip on read, zero-fill on write.
    pub slot: Option<usize>,
    pub local_type: Option<TypeRef>,
    pub local_nullable: bool,
}

impl ConsolidatedEntry {
    pub fn has_accessor(&self) -> bool {
        self.slot.is_some()
    }
}

/// A read/write plan: peer fields in peer order, aligned to local slots.
#[derive(Debug)]
pub struct ConsolidatedPlan {
    pub local_class: String,
    pub def_id: u64,
    pub entries: Vec<ConsolidatedEntry>,
}

/// Align `def`'s fields against `class`'s flattened local field set.
pub fn consolidate(
    class: &ClassSpec,
    def: &ClassDef,
    mode: CompatibleMode,
) -> Result<ConsolidatedPlan> {
    let locals = Descriptor::locals_of(class);
    consolidate_descriptors(class.name(), &locals, def, mode)
}

/// Align `def`'s fields against an explicit local descriptor set (slot mode
/// consolidates each ancestor definition against the concrete class).
pub fn consolidate_descriptors(
    local_class: &str,
    locals: &[Descriptor],
    def: &ClassDef,
    mode: CompatibleMode,
) -> Result<ConsolidatedPlan> {
    let mut entries = Vec::with_capacity(def.fields().len());
    for field in def.fields() {
        let local = locals.iter().find(|l| l.name == field.name);
        let entry = match local {
            Some(l) if TypeRef::reconcilable(&l.type_ref, &field.type_ref) => ConsolidatedEntry {
                name: field.name.clone(),
                peer_type: field.type_ref.clone(),
                peer_nullable: field.nullable,
                slot: l.slot,
                local_type: Some(l.type_ref.clone()),
                local_nullable: l.nullable,
            },
            Some(l) => {
                if mode == CompatibleMode::Strict {
                    return Err(Error::SchemaMismatch(format!(
                        "field `{}.{}`: local type {} does not match peer type {}",
                        local_class, field.name, l.type_ref, field.type_ref
                    )));
                }
                log::debug!(
                    "consolidation: `{}.{}` local type {} vs peer type {}, treating as absent",
                    local_class,
                    field.name,
                    l.type_ref,
                    field.type_ref
                );
                absent_entry(field)
            }
            None => {
                if mode == CompatibleMode::Strict {
                    return Err(Error::SchemaMismatch(format!(
                        "peer field `{}.{}` does not exist locally",
                        local_class, field.name
                    )));
                }
                log::debug!(
                    "consolidation: peer field `{}.{}` absent locally, will skip",
                    local_class,
                    field.name
                );
                absent_entry(field)
            }
        };
        entries.push(entry);
    }
    Ok(ConsolidatedPlan {
        local_class: local_class.to_string(),
        def_id: def.id(),
        entries,
    })
}

fn absent_entry(field: &crate::classdef::FieldDef) -> ConsolidatedEntry {
    ConsolidatedEntry {
        name: field.name.clone(),
        peer_type: field.type_ref.clone(),
        peer_nullable: field.nullable,
        slot: None,
        local_type: None,
        local_nullable: false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PlanKey {
    class: String,
    def_id: u64,
}

/// Engine-owned cache of consolidation plans.
#[derive(Default)]
pub struct PlanCache {
    inner: RwLock<HashMap<PlanKey, Arc<ArcSwapOption<ConsolidatedPlan>>>>,
}

impl std::fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanCache")
            .field("entries", &self.inner.read().len())
            .finish()
    }
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concurrent lookup; returns the installed plan, if any.
    pub fn lookup(&self, class: &str, def_id: u64) -> Option<Arc<ConsolidatedPlan>> {
        let key = PlanKey {
            class: class.to_string(),
            def_id,
        };
        let map = self.inner.read();
        map.get(&key).and_then(|entry| entry.load_full())
    }

    /// Install a plan; an atomic pointer swap observed by the next lookup.
    pub fn install(&self, plan: Arc<ConsolidatedPlan>) {
        let key = PlanKey {
            class: plan.local_class.clone(),
            def_id: plan.def_id,
        };
        let entry = {
            let mut map = self.inner.write();
            map.entry(key).or_insert_with(|| Arc::new(ArcSwapOption::empty())).clone()
        };
        log::trace!(
            "plan cache: installed plan for `{}` #{:016x}",
            plan.local_class,
            plan.def_id
        );
        entry.store(Some(plan));
    }

    /// Drop every plan derived for `class` (re-registration invalidates its
    /// layout).
    pub fn purge(&self, class: &str) {
        self.inner.write().retain(|key, _| key.class != class);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
