// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine facade.
//!
//! An [`Engine`] owns the configuration, the class registry, and the caches
//! a process keeps for its lifetime: class definitions per class, encoded
//! definition bytes per definition id, and consolidation plans per
//! `(class, definition id)`. Serialization state that belongs to a single
//! message (the reference resolver) is created per call; state that belongs
//! to a peer pairing (the [`MetaContext`]) is owned by the caller and passed
//! in, persisting across messages.

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::classdef::ClassDef;
use crate::compat::structural::{ObjectReader, ObjectWriter};
use crate::config::Config;
use crate::error::Result;
use crate::meta::MetaContext;
use crate::model::TypeRef;
use crate::plan::{consolidate, ConsolidatedPlan, PlanCache};
use crate::registry::{ClassRegistry, ClassSpec};
use crate::resolver::RefResolver;
use crate::value::{Heap, Value};
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

const ENCODED_DEF_CACHE_CAP: usize = 256;

/// Schema-evolution serialization engine.
pub struct Engine {
    config: Config,
    registry: ClassRegistry,
    plans: PlanCache,
    structural_defs: DashMap<String, Arc<ClassDef>>,
    slot_defs: DashMap<String, Arc<ClassDef>>,
    encoded_defs: Mutex<LruCache<u64, Arc<Vec<u8>>>>,
    // LIFO pool of reference resolvers, reset between messages. Torn down
    // with the engine.
    resolvers: Mutex<Vec<RefResolver>>,
}

impl Engine {
    /// Build an engine; contradictory configurations are rejected here.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry: ClassRegistry::new(),
            plans: PlanCache::new(),
            structural_defs: DashMap::new(),
            slot_defs: DashMap::new(),
            encoded_defs: Mutex::new(LruCache::new(
                NonZeroUsize::new(ENCODED_DEF_CACHE_CAP).unwrap_or(NonZeroUsize::MIN),
            )),
            resolvers: Mutex::new(Vec::new()),
        })
    }

    fn take_resolver(&self) -> RefResolver {
        self.resolvers.lock().pop().unwrap_or_default()
    }

    /// Reset-on-return: the resolver re-enters the pool with no tracked
    /// state, whether the message succeeded or not.
    fn return_resolver(&self, mut resolver: RefResolver) {
        resolver.reset();
        self.resolvers.lock().push(resolver);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Register a class, invalidating any cached definitions and plans that
    /// were derived from a previous registration under the same name.
    pub fn register(&self, spec: ClassSpec) -> Arc<ClassSpec> {
        let class = self.registry.register(spec);
        self.structural_defs.remove(class.name());
        self.slot_defs.remove(class.name());
        self.plans.purge(class.name());
        class
    }

    /// Flattened structural definition of a class, cached per class name.
    pub(crate) fn structural_def(&self, class: &Arc<ClassSpec>) -> Arc<ClassDef> {
        let entry = self
            .structural_defs
            .entry(class.name().to_string())
            .or_insert_with(|| {
                Arc::new(ClassDef::from_class(
                    class,
                    &self.config.group_opts(),
                    &self.registry,
                ))
            });
        entry.value().clone()
    }

    /// Own-fields definition of an ancestor class, cached per class name.
    pub(crate) fn slot_def(&self, class: &Arc<ClassSpec>) -> Arc<ClassDef> {
        let entry = self
            .slot_defs
            .entry(class.name().to_string())
            .or_insert_with(|| {
                Arc::new(ClassDef::from_own_fields(
                    class,
                    &self.config.group_opts(),
                    &self.registry,
                ))
            });
        entry.value().clone()
    }

    /// Canonical bytes of a definition, encoded once and shared across all
    /// meta contexts.
    pub(crate) fn encoded_def(&self, def: &ClassDef) -> Arc<Vec<u8>> {
        let mut cache = self.encoded_defs.lock();
        if let Some(bytes) = cache.get(&def.id()) {
            return bytes.clone();
        }
        let bytes = Arc::new(def.canonical_bytes());
        cache.put(def.id(), bytes.clone());
        bytes
    }

    /// Consolidation plan for `(class, def)`: cached when available, built
    /// interpreted otherwise, installed behind the atomic seam when code
    /// generation is enabled.
    pub(crate) fn plan(
        &self,
        class: &Arc<ClassSpec>,
        def: &ClassDef,
    ) -> Result<Arc<ConsolidatedPlan>> {
        if let Some(plan) = self.plans.lookup(class.name(), def.id()) {
            return Ok(plan);
        }
        let plan = Arc::new(consolidate(class, def, self.config.compatible_mode)?);
        if self.config.code_gen_enabled {
            self.plans.install(plan.clone());
        }
        Ok(plan)
    }

    /// Serialize a value graph into one message.
    ///
    /// The root goes through the reference protocol, so null roots and
    /// shared/cyclic subgraphs are handled uniformly. `ctx` must be the
    /// write-direction context of the target peer pairing. The reference
    /// resolver comes from the engine's pool and is reset per message.
    pub fn serialize(&self, heap: &Heap, root: &Value, ctx: &mut MetaContext) -> Result<Vec<u8>> {
        let mut buf = WriteBuffer::with_capacity(64);
        let mut resolver = self.take_resolver();
        let mut writer = ObjectWriter {
            eng: self,
            buf: &mut buf,
            heap,
            ctx,
            resolver: &mut resolver,
        };
        let outcome = writer.write_ref(root, &TypeRef::Opaque);
        self.return_resolver(resolver);
        outcome?;
        Ok(buf.into_bytes())
    }

    /// Deserialize one message, materializing objects into `heap`.
    ///
    /// Registered validators fire after the whole graph is read. On error
    /// the partially materialized instances stay in `heap` but the returned
    /// handle never escapes; the pooled resolver is reset either way.
    pub fn deserialize(
        &self,
        heap: &mut Heap,
        bytes: &[u8],
        ctx: &mut MetaContext,
    ) -> Result<Value> {
        let mut resolver = self.take_resolver();
        let mut reader = ObjectReader {
            eng: self,
            buf: ReadBuffer::new(bytes),
            heap,
            ctx,
            resolver: &mut resolver,
            validators: Vec::new(),
        };
        let outcome = match reader.read_ref(&TypeRef::Opaque) {
            Ok(root) => reader.run_validators().map(|()| root),
            Err(e) => Err(e),
        };
        self.return_resolver(resolver);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompatibleMode;

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let cfg = Config::new()
            .compatible_mode(CompatibleMode::ForwardBackward)
            .check_class_version(true);
        assert!(Engine::new(cfg).is_err());
    }

    #[test]
    fn test_structural_def_cached_per_class() {
        let eng = Engine::new(Config::default()).unwrap();
        let class = eng.register(
            ClassSpec::builder("Point")
                .field("x", TypeRef::i32())
                .build(),
        );
        let a = eng.structural_def(&class);
        let b = eng.structural_def(&class);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_reregistration_invalidates_cached_def() {
        let eng = Engine::new(Config::default()).unwrap();
        let class = eng.register(
            ClassSpec::builder("Point")
                .field("x", TypeRef::i32())
                .build(),
        );
        let before = eng.structural_def(&class);
        let class2 = eng.register(
            ClassSpec::builder("Point")
                .field("x", TypeRef::i32())
                .field("y", TypeRef::i32())
                .build(),
        );
        let after = eng.structural_def(&class2);
        assert_ne!(before.id(), after.id());
    }

    #[test]
    fn test_encoded_def_shared() {
        let eng = Engine::new(Config::default()).unwrap();
        let class = eng.register(
            ClassSpec::builder("Point")
                .field("x", TypeRef::i32())
                .build(),
        );
        let def = eng.structural_def(&class);
        let a = eng.encoded_def(&def);
        let b = eng.encoded_def(&def);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, def.canonical_bytes());
    }

    #[test]
    fn test_plan_installed_once_when_codegen_enabled() {
        let eng = Engine::new(Config::default()).unwrap();
        let class = eng.register(
            ClassSpec::builder("Point")
                .field("x", TypeRef::i32())
                .build(),
        );
        let def = eng.structural_def(&class);
        let a = eng.plan(&class, &def).unwrap();
        let b = eng.plan(&class, &def).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_resolver_pool_resets_after_failed_message() {
        use crate::value::ObjRef;

        let eng = Engine::new(Config::default()).unwrap();
        let class = eng.register(
            ClassSpec::builder("Point")
                .field("x", TypeRef::i32())
                .build(),
        );

        // A dangling handle fails mid-message, after the resolver has
        // already tracked it.
        let empty_heap = Heap::new();
        assert!(eng
            .serialize(&empty_heap, &Value::Object(ObjRef(9)), &mut MetaContext::new())
            .is_err());

        // The pooled resolver must come back clean: the next message encodes
        // byte-identically to a fresh engine's.
        let mut heap = Heap::new();
        let obj = heap.new_object(&class, &[("x", 1.into())]).unwrap();
        let after_error = eng
            .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
            .unwrap();

        let fresh = Engine::new(Config::default()).unwrap();
        fresh.register(
            ClassSpec::builder("Point")
                .field("x", TypeRef::i32())
                .build(),
        );
        let from_fresh = fresh
            .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
            .unwrap();
        assert_eq!(after_error, from_fresh);
    }

    #[test]
    fn test_interpreted_path_when_codegen_disabled() {
        let eng = Engine::new(Config::new().code_gen(false)).unwrap();
        let class = eng.register(
            ClassSpec::builder("Point")
                .field("x", TypeRef::i32())
                .build(),
        );
        let def = eng.structural_def(&class);
        let a = eng.plan(&class, &def).unwrap();
        let b = eng.plan(&class, &def).unwrap();
        // No install: each call rebuilds an equivalent plan.
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.entries.len(), b.entries.len());
    }
}
