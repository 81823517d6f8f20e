//! Deep extend of JSON values.
//!
//! Merges the properties of several objects into a new object, later
//! sources winning by default. Inputs are never modified.

use serde_json::{Map, Value};

/// Merge `sources` with the default options (deep, overwriting).
pub fn extend<'a, I>(sources: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    ExtendOptions::default().extend(sources)
}

/// How [`ExtendOptions::extend`] combines properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendOptions {
    /// Recurse into nested objects and arrays instead of replacing them.
    pub deep: bool,
    /// Let later sources replace properties set by earlier ones.
    pub overwrite: bool,
}

impl Default for ExtendOptions {
    fn default() -> Self {
        Self {
            deep: true,
            overwrite: true,
        }
    }
}

enum Key<'a> {
    Name(&'a str),
    Index(usize),
}

impl ExtendOptions {
    /// Recursive merge that overwrites earlier properties.
    pub fn deep() -> Self {
        Self::default()
    }

    /// Top-level merge: nested values are replaced, not merged.
    pub fn shallow() -> Self {
        Self {
            deep: false,
            ..Self::default()
        }
    }

    /// Set whether later sources replace existing properties.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Merge `sources` into a new object.
    ///
    /// Sources that are neither objects nor arrays are ignored. Arrays are
    /// merged by index.
    pub fn extend<'a, I>(&self, sources: I) -> Value
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.merge(false, sources)
    }

    fn merge<'a, I>(&self, array: bool, sources: I) -> Value
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut target = if array {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };

        for source in sources {
            match source {
                Value::Object(map) => {
                    for (name, item) in map {
                        self.assign(&mut target, Key::Name(name), item);
                    }
                }
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        self.assign(&mut target, Key::Index(index), item);
                    }
                }
                _ => {}
            }
        }

        target
    }

    fn assign(&self, target: &mut Value, key: Key<'_>, item: &Value) {
        let existing = slot(target, &key);
        if existing == Some(item) {
            return;
        }
        if !self.overwrite && existing.is_some() {
            return;
        }

        let value = if self.deep && (existing.is_some_and(is_container) || is_container(item)) {
            // An object landing on an array becomes an object keyed by index.
            let array = item.is_array();
            self.merge(array, existing.into_iter().chain(Some(item)))
        } else {
            item.clone()
        };

        put(target, key, value);
    }
}

fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

fn slot<'t>(target: &'t Value, key: &Key<'_>) -> Option<&'t Value> {
    match (target, key) {
        (Value::Object(map), Key::Name(name)) => map.get(*name),
        (Value::Object(map), Key::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), Key::Index(index)) => items.get(*index),
        (Value::Array(items), Key::Name(name)) => name.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn put(target: &mut Value, key: Key<'_>, value: Value) {
    match (target, key) {
        (Value::Object(map), Key::Name(name)) => {
            map.insert(name.to_string(), value);
        }
        (Value::Object(map), Key::Index(index)) => {
            map.insert(index.to_string(), value);
        }
        (Value::Array(items), Key::Index(index)) => set_index(items, index, value),
        (Value::Array(items), Key::Name(name)) => {
            // Non-numeric names have no place in an array.
            if let Ok(index) = name.parse::<usize>() {
                set_index(items, index, value);
            }
        }
        _ => {}
    }
}

/// Overwrites or appends; indices past the end are dropped.
fn set_index(items: &mut Vec<Value>, index: usize, value: Value) {
    match index.cmp(&items.len()) {
        std::cmp::Ordering::Less => items[index] = value,
        std::cmp::Ordering::Equal => items.push(value),
        std::cmp::Ordering::Greater => {}
    }
}
