//! # Reducers
//!
//! Pure functions from `(state, action)` to a new state, plus helpers
//! for composing them and for updating nested state without mutation.

use serde_json::{Map, Value};

use crate::action::Action;

/// A pure state transition. Must not mutate anything it can reach; the
/// store compares the returned value against the previous state to
/// decide whether anything changed.
pub type Reducer = Box<dyn Fn(&Value, &Action) -> Value>;

/// Per-kind handler used by [`create_reducer`].
pub type ActionHandler = Box<dyn Fn(&Value, &Action) -> Value>;

/// Compose slice reducers into one reducer over an object state.
///
/// Each entry owns one top-level key; a slice reducer sees only its
/// slice (null when absent) and its result is written back under its
/// key. Unclaimed keys pass through untouched.
pub fn combine_reducers(reducers: Vec<(String, Reducer)>) -> Reducer {
    Box::new(move |state, action| {
        let mut next = state.as_object().cloned().unwrap_or_default();
        let mut changed = !state.is_object();
        for (key, reducer) in &reducers {
            let slice = next.get(key).cloned().unwrap_or(Value::Null);
            let new_slice = reducer(&slice, action);
            if new_slice != slice {
                changed = true;
            }
            next.insert(key.clone(), new_slice);
        }
        if changed {
            Value::Object(next)
        } else {
            state.clone()
        }
    })
}

/// Build a reducer from a table of action-kind handlers.
///
/// Null state is replaced with `initial` before the lookup; actions
/// with no matching handler leave the state unchanged.
pub fn create_reducer(initial: Value, handlers: Vec<(String, ActionHandler)>) -> Reducer {
    Box::new(move |state, action| {
        let current = if state.is_null() {
            initial.clone()
        } else {
            state.clone()
        };
        for (kind, handler) in &handlers {
            if *kind == action.kind {
                return handler(&current, action);
            }
        }
        current
    })
}

/// Copy of `state` with `path` set to `value`. Intermediate objects are
/// created as needed; non-object intermediates are replaced.
pub fn immutable_update(state: &Value, path: &str, value: Value) -> Value {
    let mut root = state.as_object().cloned().unwrap_or_default();
    let parts: Vec<&str> = path.split('.').collect();
    let Some((last, intermediate)) = parts.split_last() else {
        return Value::Object(root);
    };

    let mut current = &mut root;
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
    current.insert((*last).to_string(), value);
    Value::Object(root)
}

/// Copy of `state` with `path` removed. Missing paths return the state
/// unchanged.
pub fn immutable_delete(state: &Value, path: &str) -> Value {
    let mut root = state.as_object().cloned().unwrap_or_default();
    let parts: Vec<&str> = path.split('.').collect();
    let Some((last, intermediate)) = parts.split_last() else {
        return Value::Object(root);
    };

    let mut current = &mut root;
    for part in intermediate {
        let Some(next) = current.get_mut(*part).and_then(Value::as_object_mut) else {
            return Value::Object(root);
        };
        current = next;
    }
    current.remove(*last);
    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter_reducer() -> Reducer {
        Box::new(|state, action| {
            let count = state.as_i64().unwrap_or(0);
            match action.kind.as_str() {
                "increment" => json!(count + 1),
                "decrement" => json!(count - 1),
                _ => json!(count),
            }
        })
    }

    #[test]
    fn test_combine_reducers_slices() {
        let reducer = combine_reducers(vec![
            ("counter".to_string(), counter_reducer()),
            (
                "log".to_string(),
                Box::new(|state, action| {
                    let mut entries = state.as_array().cloned().unwrap_or_default();
                    if !action.is_internal() {
                        entries.push(json!(action.kind));
                    }
                    Value::Array(entries)
                }),
            ),
        ]);

        let state = reducer(&Value::Null, &Action::init());
        assert_eq!(state, json!({"counter": 0, "log": []}));

        let state = reducer(&state, &Action::new("increment"));
        assert_eq!(state, json!({"counter": 1, "log": ["increment"]}));
    }

    #[test]
    fn test_combine_reducers_preserves_unclaimed_keys() {
        let reducer = combine_reducers(vec![("counter".to_string(), counter_reducer())]);
        let state = json!({"counter": 0, "extra": "kept"});
        let next = reducer(&state, &Action::new("increment"));
        assert_eq!(next, json!({"counter": 1, "extra": "kept"}));
    }

    #[test]
    fn test_create_reducer_dispatch_table() {
        let reducer = create_reducer(
            json!({"items": []}),
            vec![(
                "items/add".to_string(),
                Box::new(|state, action| {
                    let mut next = state.clone();
                    if let Some(items) = next["items"].as_array_mut() {
                        items.push(action.payload.clone());
                    }
                    next
                }),
            )],
        );

        let state = reducer(&Value::Null, &Action::init());
        assert_eq!(state, json!({"items": []}));

        let state = reducer(&state, &Action::with_payload("items/add", json!("a")));
        assert_eq!(state, json!({"items": ["a"]}));

        let same = reducer(&state, &Action::new("unknown"));
        assert_eq!(same, state);
    }

    #[test]
    fn test_immutable_update_leaves_original_alone() {
        let state = json!({"ui": {"theme": "light"}});
        let next = immutable_update(&state, "ui.theme", json!("dark"));
        assert_eq!(next, json!({"ui": {"theme": "dark"}}));
        assert_eq!(state, json!({"ui": {"theme": "light"}}));
    }

    #[test]
    fn test_immutable_update_creates_path() {
        let next = immutable_update(&json!({}), "a.b.c", json!(1));
        assert_eq!(next, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_immutable_delete() {
        let state = json!({"a": {"b": 1, "c": 2}});
        let next = immutable_delete(&state, "a.b");
        assert_eq!(next, json!({"a": {"c": 2}}));
        assert_eq!(immutable_delete(&state, "missing.path"), state);
    }
}
