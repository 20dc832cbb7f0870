//! # Configuration Tree
//!
//! Nested key/value store addressed by dotted paths, with change watchers.
//!
//! Values are `serde_json::Value`, so a tree holds whatever a JSON, YAML or
//! TOML document can express. Reads hand out clones; mutating a returned
//! value never touches the tree. A null value is treated as unset.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::{debug, error};

/// Callback invoked with the new value of a watched key (null on delete),
/// or with the whole tree for reload listeners.
pub type WatchCallback = Rc<dyn Fn(&Value)>;

/// Token returned by [`ConfigTree::watch`]; pass it to
/// [`ConfigTree::unwatch`] to remove the registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchHandle {
    id: u64,
    key: Option<String>,
}

impl WatchHandle {
    /// Watched key, or `None` for a reload listener.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

struct Watcher {
    id: u64,
    key: Option<String>,
    callback: WatchCallback,
}

/// Hierarchical configuration data with dotted-path access.
#[derive(Default)]
pub struct ConfigTree {
    data: Map<String, Value>,
    watchers: Vec<Watcher>,
    next_watcher_id: u64,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(data: Map<String, Value>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    fn resolve(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let mut node = self.data.get(parts.next()?)?;
        for part in parts {
            node = node.as_object()?.get(part)?;
        }
        Some(node)
    }

    /// Value at a dotted path, cloned out of the tree. An explicit null
    /// reports absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.resolve(key) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value.clone()),
        }
    }

    /// Value at a dotted path, or `default` when absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Set a value, creating intermediate objects as needed. A non-object
    /// value sitting on an intermediate segment is replaced.
    ///
    /// If the value actually changed, watchers of the key fire with the
    /// new value, then watchers of each ancestor fire with their
    /// re-resolved subtree.
    pub fn set(&mut self, key: &str, value: Value) {
        if self.resolve(key) == Some(&value) {
            return;
        }
        let parts: Vec<&str> = key.split('.').collect();
        let Some((last, intermediate)) = parts.split_last() else {
            return;
        };

        let mut current = &mut self.data;
        for part in intermediate {
            let entry = current
                .entry((*part).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(map) = entry else {
                unreachable!("entry was just made an object");
            };
            current = map;
        }
        current.insert((*last).to_string(), value.clone());

        debug!(key, "config value set");
        self.notify_key(key, &value);
        self.notify_ancestors(key);
    }

    /// Remove a value. Returns whether the key existed. Watchers of the
    /// key fire with null on success.
    pub fn delete(&mut self, key: &str) -> bool {
        let parts: Vec<&str> = key.split('.').collect();
        let Some((last, intermediate)) = parts.split_last() else {
            return false;
        };

        let mut current = &mut self.data;
        for part in intermediate {
            let Some(next) = current.get_mut(*part).and_then(Value::as_object_mut) else {
                return false;
            };
            current = next;
        }
        if current.remove(*last).is_none() {
            return false;
        }

        debug!(key, "config value deleted");
        self.notify_key(key, &Value::Null);
        true
    }

    /// Whether a key resolves to a non-null value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Merge another mapping into the tree. Shallow merge replaces
    /// top-level keys wholesale; deep merge recurses into objects with
    /// incoming leaves winning. Fires one bulk reload notification.
    pub fn merge(&mut self, other: &Map<String, Value>, deep: bool) {
        if deep {
            Self::merge_into(&mut self.data, other);
        } else {
            for (key, value) in other {
                self.data.insert(key.clone(), value.clone());
            }
        }
        self.notify_reloaded();
    }

    pub(crate) fn merge_into(target: &mut Map<String, Value>, source: &Map<String, Value>) {
        for (key, value) in source {
            match (target.get_mut(key), value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    Self::merge_into(existing, incoming);
                }
                _ => {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Replace the entire tree contents and fire the bulk reload
    /// notification.
    pub fn replace(&mut self, data: Map<String, Value>) {
        self.data = data;
        self.notify_reloaded();
    }

    /// Drop every value and fire the bulk reload notification.
    pub fn clear(&mut self) {
        self.data.clear();
        self.notify_reloaded();
    }

    /// Swap the contents without notifying anyone. Callers batch several
    /// mutations and fire one notification themselves.
    pub(crate) fn replace_silent(&mut self, data: Map<String, Value>) {
        self.data = data;
    }

    /// Copy of the full tree.
    pub fn to_map(&self) -> Map<String, Value> {
        self.data.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All reachable dotted paths, intermediate paths included, depth
    /// first in document order, optionally filtered by prefix.
    pub fn keys(&self, prefix: Option<&str>) -> Vec<String> {
        let mut out = Vec::new();
        Self::collect_keys(&self.data, None, &mut out);
        if let Some(prefix) = prefix {
            out.retain(|k| k.starts_with(prefix));
        }
        out
    }

    fn collect_keys(map: &Map<String, Value>, prefix: Option<&str>, out: &mut Vec<String>) {
        for (key, value) in map {
            let dotted = match prefix {
                Some(p) => format!("{p}.{key}"),
                None => key.clone(),
            };
            if let Value::Object(inner) = value {
                out.push(dotted.clone());
                Self::collect_keys(inner, Some(&dotted), out);
            } else {
                out.push(dotted);
            }
        }
    }

    /// Check the tree against a required-shape description without
    /// raising. A shape is an object whose keys are required; each value
    /// is either a nested shape or a type name (`"string"`, `"number"`,
    /// `"bool"`, `"array"`, `"object"`, `"null"`, `"any"`).
    pub fn matches_shape(&self, schema: &Value) -> bool {
        let Value::Object(required) = schema else {
            return false;
        };
        required
            .iter()
            .all(|(key, shape)| self.data.get(key).is_some_and(|v| value_matches(v, shape)))
    }

    /// Register a callback for changes to `key`. Pass `None` to listen for
    /// bulk reloads instead, which fire with the whole tree.
    pub fn watch(&mut self, key: Option<&str>, callback: impl Fn(&Value) + 'static) -> WatchHandle {
        let id = self.next_watcher_id;
        self.next_watcher_id += 1;
        let key = key.map(str::to_string);
        self.watchers.push(Watcher {
            id,
            key: key.clone(),
            callback: Rc::new(callback),
        });
        WatchHandle { id, key }
    }

    /// Remove a watcher. Returns whether it was still registered; a
    /// second call with the same handle is a no-op returning false.
    pub fn unwatch(&mut self, handle: &WatchHandle) -> bool {
        let before = self.watchers.len();
        self.watchers.retain(|w| w.id != handle.id);
        self.watchers.len() != before
    }

    /// Fire reload listeners and every key watcher with their current
    /// values.
    pub fn notify_reloaded(&self) {
        let snapshot = Value::Object(self.data.clone());
        let callbacks: Vec<(Option<String>, WatchCallback)> = self
            .watchers
            .iter()
            .map(|w| (w.key.clone(), Rc::clone(&w.callback)))
            .collect();
        for (key, callback) in callbacks {
            match key {
                None => Self::invoke(callback.as_ref(), &snapshot),
                Some(key) => {
                    let value = self.resolve(&key).cloned().unwrap_or(Value::Null);
                    Self::invoke(callback.as_ref(), &value);
                }
            }
        }
    }

    fn notify_key(&self, key: &str, value: &Value) {
        let callbacks: Vec<WatchCallback> = self
            .watchers
            .iter()
            .filter(|w| w.key.as_deref() == Some(key))
            .map(|w| Rc::clone(&w.callback))
            .collect();
        for callback in callbacks {
            Self::invoke(callback.as_ref(), value);
        }
    }

    fn notify_ancestors(&self, key: &str) {
        let mut ancestor = key;
        while let Some(pos) = ancestor.rfind('.') {
            ancestor = &ancestor[..pos];
            let subtree = self.resolve(ancestor).cloned().unwrap_or(Value::Null);
            self.notify_key(ancestor, &subtree);
        }
    }

    /// A panicking watcher must not take the tree down with it.
    fn invoke(callback: &dyn Fn(&Value), value: &Value) {
        if catch_unwind(AssertUnwindSafe(|| callback(value))).is_err() {
            error!("config watcher panicked; continuing");
        }
    }
}

fn value_matches(value: &Value, shape: &Value) -> bool {
    match shape {
        Value::Object(required) => {
            let Value::Object(map) = value else {
                return false;
            };
            required
                .iter()
                .all(|(key, sub)| map.get(key).is_some_and(|v| value_matches(v, sub)))
        }
        Value::String(type_name) => match type_name.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "bool" | "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            "null" => value.is_null(),
            "any" => true,
            _ => false,
        },
        _ => false,
    }
}
