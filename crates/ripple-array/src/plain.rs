#![forbid(unsafe_code)]

//! Plain-data projection.
//!
//! [`to_plain`] strips every reactive wrapper and modifier and yields a
//! `serde_json::Value`. Reactive arrays are read with observation, so a
//! derivation that projects a container depends on it.
//!
//! A structure reachable twice is projected once and the result reused. A
//! structure reachable from inside itself projects to `null` at the point
//! where the cycle closes.

use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value as Json;

use crate::value::Value;

/// Project `value` to plain JSON.
#[must_use]
pub fn to_plain(value: &Value) -> Json {
    Projector::default().project(value)
}

#[derive(Default)]
struct Projector {
    done: AHashMap<usize, Json>,
    active: Vec<usize>,
}

impl Projector {
    fn project(&mut self, value: &Value) -> Json {
        match value {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number(*n),
            Value::String(s) => Json::String(s.to_string()),
            Value::Modified(m) => self.project(&m.value),
            Value::List(items) => self.guarded(Rc::as_ptr(items) as usize, |this| {
                Json::Array(items.iter().map(|v| this.project(v)).collect())
            }),
            Value::Object(map) => self.guarded(Rc::as_ptr(map) as usize, |this| {
                Json::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), this.project(v)))
                        .collect(),
                )
            }),
            Value::Array(array) => self.guarded(array.address(), |this| {
                let items = array.to_vec();
                Json::Array(items.iter().map(|v| this.project(v)).collect())
            }),
        }
    }

    fn guarded(&mut self, addr: usize, build: impl FnOnce(&mut Self) -> Json) -> Json {
        if let Some(done) = self.done.get(&addr) {
            return done.clone();
        }
        if self.active.contains(&addr) {
            return Json::Null;
        }
        self.active.push(addr);
        let out = build(self);
        self.active.pop();
        self.done.insert(addr, out.clone());
        out
    }
}

fn number(n: f64) -> Json {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        Json::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ObservableArray, WrapMode};
    use ripple_core::Runtime;
    use serde_json::json;

    #[test]
    fn scalars_project_directly() {
        assert_eq!(to_plain(&Value::Undefined), Json::Null);
        assert_eq!(to_plain(&Value::from(true)), json!(true));
        assert_eq!(to_plain(&Value::from(3)), json!(3));
        assert_eq!(to_plain(&Value::from(1.5)), json!(1.5));
        assert_eq!(to_plain(&Value::from(f64::NAN)), Json::Null);
        assert_eq!(to_plain(&Value::from("hi")), json!("hi"));
    }

    #[test]
    fn nested_arrays_are_unwrapped() {
        let rt = Runtime::new();
        let xs = ObservableArray::new(
            &rt,
            [
                Value::from(1),
                Value::list([Value::from(2), Value::from(3)]),
                Value::object([("k", Value::list([Value::from("v")]))]),
            ],
            WrapMode::Recursive,
            "nested",
        )
        .unwrap();
        assert!(xs.get(1).unwrap().as_array().is_some());
        assert_eq!(xs.to_plain(), json!([1, [2, 3], {"k": ["v"]}]));
    }

    #[test]
    fn modifiers_are_stripped() {
        let v = Value::list([Value::as_reference(Value::from(1))]);
        assert_eq!(to_plain(&v), json!([1]));
    }

    #[test]
    fn cycles_project_to_null() {
        let rt = Runtime::new();
        let xs = ObservableArray::new(&rt, [Value::from(1)], WrapMode::Flat, "cyc").unwrap();
        xs.push(Value::Array(xs.clone())).unwrap();
        assert_eq!(xs.to_plain(), json!([1, null]));
    }

    #[test]
    fn shared_structures_project_identically() {
        let shared = Value::list([Value::from(7)]);
        let outer = Value::list([shared.clone(), shared]);
        assert_eq!(to_plain(&outer), json!([[7], [7]]));
    }

    #[test]
    fn object_key_order_is_kept() {
        let obj = Value::object([("z", Value::from(1)), ("a", Value::from(2))]);
        let Json::Object(map) = to_plain(&obj) else {
            panic!("object expected");
        };
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, ["z", "a"]);
    }
}
