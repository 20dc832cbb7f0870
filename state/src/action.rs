//! # Actions
//!
//! Actions describe state changes. They carry a kind string, an optional
//! payload, a metadata map and an error flag; internal lifecycle actions
//! use `@@`-prefixed kinds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Dispatched once when a store is created.
pub const INIT: &str = "@@INIT";
/// Dispatched when a store's state is reset.
pub const RESET: &str = "@@RESET";
/// Dispatched when a store's reducer is replaced.
pub const REPLACE: &str = "@@REPLACE";

/// A description of a state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub error: bool,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
            meta: Map::new(),
            error: false,
        }
    }

    pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            payload,
            ..Self::new(kind)
        }
    }

    /// Attach one metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Mark this action as representing a failure.
    pub fn with_error(mut self, error: bool) -> Self {
        self.error = error;
        self
    }

    pub fn init() -> Self {
        Self::new(INIT)
    }

    /// Whether this is a store lifecycle action rather than an
    /// application one.
    pub fn is_internal(&self) -> bool {
        self.kind.starts_with("@@")
    }
}

/// Factory producing actions under one namespace.
///
/// ```
/// use state::action::ActionCreator;
/// use serde_json::json;
///
/// let todos = ActionCreator::new("todos");
/// let action = todos.create("ADD", json!({"text": "write docs"}));
/// assert_eq!(action.kind, "todos/ADD");
///
/// let action = todos.update("items.0.done", json!(true));
/// assert_eq!(action.kind, "todos/UPDATE");
/// ```
#[derive(Debug, Clone)]
pub struct ActionCreator {
    namespace: String,
}

impl ActionCreator {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Action of kind `namespace/TYPE` with an arbitrary payload.
    pub fn create(&self, kind: &str, payload: Value) -> Action {
        Action::with_payload(format!("{}/{kind}", self.namespace), payload)
    }

    /// `namespace/UPDATE` carrying a dotted path and a new value.
    pub fn update(&self, path: &str, value: Value) -> Action {
        self.create("UPDATE", json!({"path": path, "value": value}))
    }

    /// `namespace/SET` replacing the whole slice with a mapping.
    pub fn set(&self, data: Map<String, Value>) -> Action {
        self.create("SET", Value::Object(data))
    }

    /// `namespace/DELETE` removing a dotted path.
    pub fn delete(&self, path: &str) -> Action {
        self.create("DELETE", json!({"path": path}))
    }
}
