//! Change detection by canonical equality
//!
//! Two payloads are equal when their canonical forms match. The canonical
//! form sorts mapping keys and writes integral floats as integers, so
//! `{"b":1,"a":2.0}` and `{"a":2,"b":1}` compare equal.

use serde_json::{Number, Value};
use std::collections::HashMap;

/// Largest float that still maps to a unique integer
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Canonical string form of a JSON value
pub fn canonical_form(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Canonical structural equality
pub fn canonical_eq(a: &Value, b: &Value) -> bool {
    canonical_form(a) == canonical_form(b)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&normalize_number(n)),
        Value::String(_) => out.push_str(&value.to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

fn normalize_number(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT {
                return (f as i64).to_string();
            }
        }
    }
    n.to_string()
}

/// Last observed value per topic
#[derive(Debug, Default)]
pub struct Deduplicator {
    last_values: HashMap<String, Observed>,
}

#[derive(Debug)]
struct Observed {
    canonical: String,
    value: Value,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` for `topic`. Returns `true` when it differs from the
    /// previous observation (or there was none).
    pub fn observe(&mut self, topic: &str, value: &Value) -> bool {
        let canonical = canonical_form(value);

        if let Some(previous) = self.last_values.get(topic) {
            if previous.canonical == canonical {
                return false;
            }
        }

        self.last_values.insert(
            topic.to_string(),
            Observed {
                canonical,
                value: value.clone(),
            },
        );
        true
    }

    pub fn last_value(&self, topic: &str) -> Option<&Value> {
        self.last_values.get(topic).map(|o| &o.value)
    }

    /// Drop the stored observation so the next value is treated as new
    pub fn forget(&mut self, topic: &str) -> Option<Value> {
        self.last_values.remove(topic).map(|o| o.value)
    }

    pub fn len(&self) -> usize {
        self.last_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_values.is_empty()
    }
}
