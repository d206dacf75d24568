// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Slot-mode scenarios: per-ancestor hooks, put/get fields, read_no_data
// advancement, and post-read validators.

use driftwire::{
    ClassSpec, Config, Engine, Error, Heap, MetaContext, TypeRef, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// B with write/read hooks moving `u`/`v` through put/get fields.
fn hooked_base() -> ClassSpec {
    ClassSpec::builder("B")
        .field("u", TypeRef::i32())
        .field("v", TypeRef::i32())
        .write_self(|obj, stream| {
            let u = stream.heap().get(obj, "u").and_then(Value::as_i32).unwrap_or(0);
            let v = stream.heap().get(obj, "v").and_then(Value::as_i32).unwrap_or(0);
            let pf = stream.put_fields();
            pf.put("u", u)?;
            pf.put("v", v)?;
            stream.write_fields()
        })
        .read_self(|obj, stream| {
            let (u, v) = {
                let gf = stream.read_fields()?;
                (gf.get("u", 0)?, gf.get("v", 0)?)
            };
            stream.heap_mut().set(obj, "u", u)?;
            stream.heap_mut().set(obj, "v", v)?;
            Ok(())
        })
        .build()
}

fn hook_engine() -> Engine {
    let engine = Engine::new(Config::default()).expect("valid config");
    let b = engine.register(hooked_base());
    engine.register(
        ClassSpec::builder("A")
            .parent(b)
            .field("w", TypeRef::i32())
            .build(),
    );
    engine
}

#[test]
fn put_get_fields_roundtrip() {
    let sender = hook_engine();
    let receiver = hook_engine();

    let class = sender.registry().get("A").unwrap();
    let mut heap = Heap::new();
    let obj = heap
        .new_object(
            &class,
            &[("u", 1.into()), ("v", 2.into()), ("w", 3.into())],
        )
        .unwrap();

    let bytes = sender
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .expect("serialize");

    let mut peer_heap = Heap::new();
    let read = receiver
        .deserialize(&mut peer_heap, &bytes, &mut MetaContext::new())
        .expect("deserialize");
    let obj = read.as_object().expect("object root");
    assert_eq!(peer_heap.get(obj, "u"), Some(&Value::I32(1)));
    assert_eq!(peer_heap.get(obj, "v"), Some(&Value::I32(2)));
    assert_eq!(peer_heap.get(obj, "w"), Some(&Value::I32(3)));
}

#[test]
fn slots_travel_superclass_first() {
    let order = Arc::new(Mutex::new(Vec::new()));

    let build = |order: Arc<Mutex<Vec<String>>>| {
        let engine = Engine::new(Config::default()).unwrap();
        let wo = order.clone();
        let b = engine.register(
            ClassSpec::builder("B")
                .field("u", TypeRef::i32())
                .write_self(move |_, stream| {
                    wo.lock().unwrap().push("B".to_string());
                    stream.default_write()
                })
                .read_self(|_, stream| stream.default_read())
                .build(),
        );
        let wo = order;
        engine.register(
            ClassSpec::builder("A")
                .parent(b)
                .field("w", TypeRef::i32())
                .write_self(move |_, stream| {
                    wo.lock().unwrap().push("A".to_string());
                    stream.default_write()
                })
                .read_self(|_, stream| stream.default_read())
                .build(),
        );
        engine
    };

    let sender = build(order.clone());
    let receiver = build(Arc::new(Mutex::new(Vec::new())));

    let class = sender.registry().get("A").unwrap();
    let mut heap = Heap::new();
    let obj = heap
        .new_object(&class, &[("u", 10.into()), ("w", 20.into())])
        .unwrap();
    let bytes = sender
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap();
    assert_eq!(*order.lock().unwrap(), ["B", "A"]);

    let mut peer_heap = Heap::new();
    let read = receiver
        .deserialize(&mut peer_heap, &bytes, &mut MetaContext::new())
        .unwrap();
    let obj = read.as_object().unwrap();
    assert_eq!(peer_heap.get(obj, "u"), Some(&Value::I32(10)));
    assert_eq!(peer_heap.get(obj, "w"), Some(&Value::I32(20)));
}

#[test]
fn read_no_data_fires_for_locally_inserted_ancestor() {
    let fired = Arc::new(AtomicUsize::new(0));

    // Sender: Msg extends B. Receiver: Msg extends A extends B, where A is a
    // locally added ancestor carrying read_no_data.
    let sender = {
        let engine = Engine::new(Config::default()).unwrap();
        let b = engine.register(hooked_base());
        engine.register(
            ClassSpec::builder("Msg")
                .parent(b)
                .field("payload", TypeRef::i32())
                .build(),
        );
        engine
    };
    let receiver = {
        let engine = Engine::new(Config::default()).unwrap();
        let b = engine.register(hooked_base());
        let hits = fired.clone();
        let a = engine.register(
            ClassSpec::builder("A")
                .parent(b)
                .field("extra", TypeRef::i32())
                .read_no_data(move |heap, obj| {
                    hits.fetch_add(1, Ordering::SeqCst);
                    heap.set(obj, "extra", 42)
                })
                .build(),
        );
        engine.register(
            ClassSpec::builder("Msg")
                .parent(a)
                .field("payload", TypeRef::i32())
                .build(),
        );
        engine
    };

    let class = sender.registry().get("Msg").unwrap();
    let mut heap = Heap::new();
    let obj = heap
        .new_object(
            &class,
            &[("u", 1.into()), ("v", 2.into()), ("payload", 9.into())],
        )
        .unwrap();
    let bytes = sender
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap();

    let mut peer_heap = Heap::new();
    let read = receiver
        .deserialize(&mut peer_heap, &bytes, &mut MetaContext::new())
        .expect("deserialize");
    let obj = read.as_object().unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(peer_heap.get(obj, "u"), Some(&Value::I32(1)));
    assert_eq!(peer_heap.get(obj, "extra"), Some(&Value::I32(42)));
    assert_eq!(peer_heap.get(obj, "payload"), Some(&Value::I32(9)));
}

#[test]
fn sender_only_ancestor_is_schema_mismatch() {
    // Receiver's chain is missing an ancestor the sender wrote: the wire
    // class matches no remaining local slot.
    let sender = {
        let engine = Engine::new(Config::default()).unwrap();
        let b = engine.register(hooked_base());
        let mid = engine.register(
            ClassSpec::builder("Mid")
                .parent(b)
                .field("m", TypeRef::i32())
                .build(),
        );
        engine.register(
            ClassSpec::builder("Msg")
                .parent(mid)
                .field("payload", TypeRef::i32())
                .build(),
        );
        engine
    };
    let receiver = {
        let engine = Engine::new(Config::default()).unwrap();
        let b = engine.register(hooked_base());
        engine.register(
            ClassSpec::builder("Msg")
                .parent(b)
                .field("payload", TypeRef::i32())
                .build(),
        );
        engine
    };

    let class = sender.registry().get("Msg").unwrap();
    let mut heap = Heap::new();
    let obj = heap.new_object(&class, &[("payload", 1.into())]).unwrap();
    let bytes = sender
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap();

    let mut peer_heap = Heap::new();
    let err = receiver
        .deserialize(&mut peer_heap, &bytes, &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch(_)));
}

#[test]
fn unset_put_fields_read_as_defaults() {
    // Sender's B writes only `u`; its definition still carries `v`, which
    // flushes as zero. The receiver's extra `t` never hits the wire at all.
    let sender = {
        let engine = Engine::new(Config::default()).unwrap();
        engine.register(
            ClassSpec::builder("B")
                .field("u", TypeRef::i32())
                .field("v", TypeRef::i32())
                .write_self(|_, stream| {
                    stream.put_fields().put("u", 5)?;
                    stream.write_fields()
                })
                .read_self(|_, stream| stream.default_read())
                .build(),
        );
        engine
    };

    let observed = Arc::new(Mutex::new(Vec::new()));
    let receiver = {
        let engine = Engine::new(Config::default()).unwrap();
        let seen = observed.clone();
        engine.register(
            ClassSpec::builder("B")
                .field("u", TypeRef::i32())
                .field("v", TypeRef::i32())
                .field("t", TypeRef::i32())
                .write_self(|_, stream| stream.default_write())
                .read_self(move |obj, stream| {
                    let (u, v, t, v_defaulted, t_defaulted) = {
                        let gf = stream.read_fields()?;
                        (
                            gf.get("u", 0)?,
                            gf.get("v", -1)?,
                            gf.get("t", 7)?,
                            gf.defaulted("v")?,
                            gf.defaulted("t")?,
                        )
                    };
                    assert!(matches!(
                        stream.read_fields().unwrap_err(),
                        Error::NotActive(_)
                    ));
                    seen.lock().unwrap().push((
                        u.clone(),
                        v.clone(),
                        t.clone(),
                        v_defaulted,
                        t_defaulted,
                    ));
                    stream.heap_mut().set(obj, "u", u)?;
                    stream.heap_mut().set(obj, "v", v)?;
                    stream.heap_mut().set(obj, "t", t)?;
                    Ok(())
                })
                .build(),
        );
        engine
    };

    let class = sender.registry().get("B").unwrap();
    let mut heap = Heap::new();
    let obj = heap.alloc(&class).unwrap();
    let bytes = sender
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap();

    let mut peer_heap = Heap::new();
    receiver
        .deserialize(&mut peer_heap, &bytes, &mut MetaContext::new())
        .expect("deserialize");

    let seen = observed.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (u, v, t, v_defaulted, t_defaulted) = &seen[0];
    // Unset on the write side but declared: flushed as zero, not defaulted.
    assert_eq!(u, &Value::I32(5));
    assert_eq!(v, &Value::I32(0));
    assert!(!*v_defaulted);
    // Absent from the sender's definition entirely: the fallback applies.
    assert_eq!(t, &Value::I32(7));
    assert!(*t_defaulted);
}

#[test]
fn unknown_put_field_name_rejected() {
    let engine = {
        let e = Engine::new(Config::default()).unwrap();
        e.register(
            ClassSpec::builder("B")
                .field("u", TypeRef::i32())
                .write_self(|_, stream| {
                    stream.put_fields().put("nope", 1)?;
                    stream.write_fields()
                })
                .read_self(|_, stream| stream.default_read())
                .build(),
        );
        e
    };

    let class = engine.registry().get("B").unwrap();
    let mut heap = Heap::new();
    let obj = heap.alloc(&class).unwrap();
    let err = engine
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, Error::UnknownField(_)));
}

#[test]
fn write_fields_without_put_fields_is_not_active() {
    let engine = {
        let e = Engine::new(Config::default()).unwrap();
        e.register(
            ClassSpec::builder("B")
                .field("u", TypeRef::i32())
                .write_self(|_, stream| stream.write_fields())
                .read_self(|_, stream| stream.default_read())
                .build(),
        );
        e
    };

    let class = engine.registry().get("B").unwrap();
    let mut heap = Heap::new();
    let obj = heap.alloc(&class).unwrap();
    let err = engine
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, Error::NotActive(_)));
}

#[test]
fn second_default_write_is_not_active() {
    let engine = {
        let e = Engine::new(Config::default()).unwrap();
        e.register(
            ClassSpec::builder("B")
                .field("u", TypeRef::i32())
                .write_self(|_, stream| {
                    stream.default_write()?;
                    stream.default_write()
                })
                .read_self(|_, stream| stream.default_read())
                .build(),
        );
        e
    };

    let class = engine.registry().get("B").unwrap();
    let mut heap = Heap::new();
    let obj = heap.alloc(&class).unwrap();
    let err = engine
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, Error::NotActive(_)));
}

#[test]
fn forbidden_legacy_operation_fails_loudly() {
    let engine = {
        let e = Engine::new(Config::default()).unwrap();
        e.register(
            ClassSpec::builder("B")
                .field("u", TypeRef::i32())
                .write_self(|_, stream| stream.annotate_class())
                .read_self(|_, stream| stream.default_read())
                .build(),
        );
        e
    };

    let class = engine.registry().get("B").unwrap();
    let mut heap = Heap::new();
    let obj = heap.alloc(&class).unwrap();
    let err = engine
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedEncoding("annotate_class")));
}

#[test]
fn validators_fire_in_descending_priority() {
    let firing = Arc::new(Mutex::new(Vec::new()));

    let engine = {
        let e = Engine::new(Config::default()).unwrap();
        let log = firing.clone();
        e.register(
            ClassSpec::builder("B")
                .field("u", TypeRef::i32())
                .write_self(|_, stream| stream.default_write())
                .read_self(move |_, stream| {
                    stream.default_read()?;
                    for (tag, priority) in
                        [("low", -1), ("first-high", 10), ("mid", 3), ("second-high", 10)]
                    {
                        let log = log.clone();
                        stream.register_validation(
                            Some(Box::new(move |_heap: &mut Heap| {
                                log.lock().unwrap().push(tag);
                                Ok(())
                            })),
                            priority,
                        )?;
                    }
                    Ok(())
                })
                .build(),
        );
        e
    };

    let class = engine.registry().get("B").unwrap();
    let mut heap = Heap::new();
    let obj = heap.new_object(&class, &[("u", 1.into())]).unwrap();
    let bytes = engine
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap();

    let mut peer_heap = Heap::new();
    engine
        .deserialize(&mut peer_heap, &bytes, &mut MetaContext::new())
        .expect("deserialize");

    assert_eq!(
        *firing.lock().unwrap(),
        ["first-high", "second-high", "mid", "low"]
    );
}

#[test]
fn null_validator_is_invalid_object() {
    let engine = {
        let e = Engine::new(Config::default()).unwrap();
        e.register(
            ClassSpec::builder("B")
                .field("u", TypeRef::i32())
                .write_self(|_, stream| stream.default_write())
                .read_self(|_, stream| {
                    stream.default_read()?;
                    stream.register_validation(None, 0)
                })
                .build(),
        );
        e
    };

    let class = engine.registry().get("B").unwrap();
    let mut heap = Heap::new();
    let obj = heap.alloc(&class).unwrap();
    let bytes = engine
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap();

    let mut peer_heap = Heap::new();
    let err = engine
        .deserialize(&mut peer_heap, &bytes, &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidObject(_)));
}

#[test]
fn duplicate_chain_field_refused_at_write() {
    let engine = {
        let e = Engine::new(Config::default()).unwrap();
        let b = e.register(hooked_base());
        e.register(
            ClassSpec::builder("A")
                .parent(b)
                .field("u", TypeRef::i64())
                .build(),
        );
        e
    };

    let class = engine.registry().get("A").unwrap();
    let mut heap = Heap::new();
    let obj = heap.alloc(&class).unwrap();
    let err = engine
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch(_)));
}

#[test]
fn replace_hooks_refused() {
    let engine = {
        let e = Engine::new(Config::default()).unwrap();
        let b = e.register(hooked_base());
        e.register(
            ClassSpec::builder("A")
                .parent(b)
                .field("w", TypeRef::i32())
                .replace_hooks()
                .build(),
        );
        e
    };

    let class = engine.registry().get("A").unwrap();
    let mut heap = Heap::new();
    let obj = heap.alloc(&class).unwrap();
    let err = engine
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedEncoding(_)));
}

#[test]
fn non_instantiable_class_fails_construction_on_read() {
    let sender = {
        let e = Engine::new(Config::default()).unwrap();
        e.register(
            ClassSpec::builder("Ghost")
                .field("n", TypeRef::i32())
                .build(),
        );
        e
    };
    let receiver = {
        let e = Engine::new(Config::default()).unwrap();
        e.register(
            ClassSpec::builder("Ghost")
                .field("n", TypeRef::i32())
                .non_instantiable()
                .build(),
        );
        e
    };

    let class = sender.registry().get("Ghost").unwrap();
    let mut heap = Heap::new();
    let obj = heap.new_object(&class, &[("n", 1.into())]).unwrap();
    let bytes = sender
        .serialize(&heap, &Value::Object(obj), &mut MetaContext::new())
        .unwrap();

    let mut peer_heap = Heap::new();
    let err = receiver
        .deserialize(&mut peer_heap, &bytes, &mut MetaContext::new())
        .unwrap_err();
    assert!(matches!(err, Error::ConstructionFailed(_)));
}
