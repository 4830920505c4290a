#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ripple_array::{ObservableArray, Value, WrapMode};
use ripple_core::Runtime;

#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Splice {
        index: Option<i16>,
        delete: Option<i16>,
        items: Vec<i8>,
    },
    Set { index: u8, value: i8 },
    SetLength(i16),
    Push(i8),
    Pop,
    Shift,
    Nested(Vec<i8>),
    Tamper,
}

fuzz_target!(|ops: Vec<FuzzOp>| {
    let rt = Runtime::new();
    let xs = ObservableArray::empty(&rt);
    let mut model: Vec<Value> = Vec::new();
    let mut tampered = false;

    for op in ops.into_iter().take(256) {
        match op {
            FuzzOp::Splice {
                index,
                delete,
                items,
            } => {
                let items: Vec<Value> = items.into_iter().map(Value::from).collect();
                let result = xs.splice_with(
                    index.map(isize::from),
                    delete.map(isize::from),
                    items.clone(),
                );
                if tampered {
                    continue;
                }
                let removed = result.expect("splice on an intact array never fails");
                let len = model.len();
                let start = match index.map(isize::from) {
                    None => 0,
                    Some(i) if i < 0 => len.saturating_sub(i.unsigned_abs()),
                    Some(i) => i.unsigned_abs().min(len),
                };
                let count = match delete.map(isize::from) {
                    None if items.is_empty() => len - start,
                    None => 0,
                    Some(d) => usize::try_from(d).unwrap_or(0).min(len - start),
                };
                let expected: Vec<Value> = model.splice(start..start + count, items).collect();
                assert_eq!(removed, expected);
            }
            FuzzOp::Set { index, value } => {
                let index = usize::from(index);
                let ok = xs.set(index, value).is_ok();
                if !tampered {
                    assert_eq!(ok, index <= model.len());
                    if index < model.len() {
                        model[index] = Value::from(value);
                    } else if index == model.len() {
                        model.push(Value::from(value));
                    }
                }
            }
            FuzzOp::SetLength(n) => {
                if xs.set_length(i64::from(n)).is_ok() && !tampered {
                    model.resize(usize::try_from(n).unwrap_or(0), Value::Undefined);
                }
            }
            FuzzOp::Push(v) => {
                if xs.push(v).is_ok() {
                    model.push(Value::from(v));
                }
            }
            FuzzOp::Pop => {
                if xs.pop().is_ok() && !tampered {
                    model.pop();
                }
            }
            FuzzOp::Shift => {
                if xs.shift().is_ok() && !tampered && !model.is_empty() {
                    model.remove(0);
                }
            }
            FuzzOp::Nested(items) => {
                let nested = Value::list(items.into_iter().map(Value::from));
                if xs.push(nested.clone()).is_ok() {
                    model.push(nested);
                }
            }
            FuzzOp::Tamper => {
                xs.peek_mut().push(Value::Null);
                tampered = true;
            }
        }
        if !tampered {
            assert_eq!(xs.to_vec(), model);
        }
    }
    let _ = xs.to_plain();
});
