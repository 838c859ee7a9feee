//! Generic deep clone / deep freeze over arbitrary value graphs.
//!
//! `deep_clone` recurses (stack depth = nesting depth) and copies;
//! `deep_freeze` walks an explicit worklist with an identity-keyed visited set
//! and freezes in place, so it terminates on cycles and never processes a
//! shared node twice.
use indexmap::IndexMap;

use crate::identity::{classify, IdentitySet, Kind};
use crate::value::{Obj, Value};

/// Deep copy of plain data: sequences and maps are rebuilt all the way down,
/// everything else is copied one level (or passed through, for immutable
/// and shared kinds). With `freeze`, map keys and every produced container
/// are frozen on the way out.
pub fn deep_clone(value: &Value, freeze: bool) -> Value {
    let result = match value {
        Value::Seq(xs) => Value::seq(xs.borrow().iter().map(|x| deep_clone(x, freeze)).collect()),
        Value::Map(m) => {
            let m = m.borrow();
            let mut out = IndexMap::with_capacity(m.len());
            for (k, v) in m.iter() {
                if freeze {
                    k.freeze();
                }
                out.insert(k.clone(), deep_clone(v, freeze));
            }
            Value::Map(Obj::new(out))
        }
        _ => match classify(value) {
            Kind::Immediate | Kind::Singleton => return value.clone(),
            Kind::Pattern => value.shallow_dup(),
            _ => value.shallow_clone(),
        },
    };
    if freeze {
        result.freeze();
    }
    result
}

/// Freeze `value` and everything reachable from it, in place. Returns the
/// same handle.
pub fn deep_freeze(value: &Value) -> Value {
    let mut todo = vec![value.clone()];
    let mut seen = IdentitySet::new();

    while let Some(o) = todo.pop() {
        match classify(&o) {
            Kind::Immediate | Kind::Singleton => {}
            Kind::Leaf => o.freeze(),
            _ => {
                if seen.insert(&o) {
                    freeze_one(&mut todo, &o);
                }
            }
        }
    }

    tracing::debug!(nodes = seen.len(), "deep_freeze finished");
    value.clone()
}

/// Freeze one container and queue whatever it holds.
fn freeze_one(todo: &mut Vec<Value>, o: &Value) {
    match o {
        // shared machinery, not data
        Value::Class(_) => {}
        Value::Seq(xs) => {
            o.freeze();
            todo.extend(xs.borrow().iter().cloned());
        }
        Value::Set(xs) => {
            o.freeze();
            todo.extend(xs.borrow().iter().cloned());
        }
        Value::Record(r) => {
            o.freeze();
            todo.extend(r.borrow().fields.values().cloned());
        }
        Value::Map(m) => {
            o.freeze();
            for (k, v) in m.borrow().iter() {
                todo.push(k.clone());
                todo.push(v.clone());
            }
        }
        Value::Range(r) => {
            o.freeze();
            let r = r.borrow();
            todo.push(r.begin.clone());
            todo.push(r.end.clone());
        }
        Value::Opaque(obj) => {
            obj.freeze();
            todo.extend(obj.children());
        }
        _ => o.freeze(),
    }
}

// ------------------------------- Tests ------------------------------------ //
