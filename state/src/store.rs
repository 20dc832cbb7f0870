//! # Store
//!
//! Single source of truth for application state. Actions are dispatched
//! through the middleware chain into the reducer; subscribers are
//! notified whenever the resulting state differs from the previous one.
//!
//! The store keeps a bounded history of states for undo/redo. A new
//! dispatch after an undo discards the redone future, like an editor's
//! undo stack.

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::Rc;

use errors::StateError;
use serde_json::Value;
use tracing::{debug, error};

use crate::action::{self, Action};
use crate::middleware::{Middleware, Next};
use crate::reducer::Reducer;

const DEFAULT_MAX_HISTORY: usize = 100;

/// One point in the store's timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub state: Value,
    pub action_kind: String,
}

/// Token for removing a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Subscriber = Rc<dyn Fn(&Value)>;
type ActionListener = Rc<dyn Fn(&Action)>;

/// Predictable state container.
///
/// All methods take `&self`; interior mutability lets closures hold an
/// `Rc<Store>` and interact with it, with a reentrancy guard turning a
/// dispatch-during-reduce into [`StateError::ReentrantDispatch`] instead
/// of a runtime borrow failure.
pub struct Store {
    state: RefCell<Value>,
    reducer: RefCell<Reducer>,
    middleware: RefCell<Vec<Rc<dyn Middleware>>>,
    subscribers: RefCell<Vec<(u64, Subscriber)>>,
    action_listeners: RefCell<Vec<(u64, ActionListener)>>,
    next_subscriber_id: Cell<u64>,
    is_dispatching: Cell<bool>,
    history: RefCell<Vec<HistoryEntry>>,
    cursor: Cell<usize>,
    max_history: Cell<usize>,
}

impl Store {
    /// Create a store. The reducer is run once with the init action to
    /// settle the initial state.
    pub fn new(reducer: Reducer, initial_state: Value) -> Self {
        let state = reducer(&initial_state, &Action::init());
        let history = vec![HistoryEntry {
            state: state.clone(),
            action_kind: action::INIT.to_string(),
        }];
        Self {
            state: RefCell::new(state),
            reducer: RefCell::new(reducer),
            middleware: RefCell::new(Vec::new()),
            subscribers: RefCell::new(Vec::new()),
            action_listeners: RefCell::new(Vec::new()),
            next_subscriber_id: Cell::new(0),
            is_dispatching: Cell::new(false),
            history: RefCell::new(history),
            cursor: Cell::new(0),
            max_history: Cell::new(DEFAULT_MAX_HISTORY),
        }
    }

    /// Create a store with a middleware chain already in place. The
    /// first middleware in the list is outermost.
    pub fn with_middleware(
        reducer: Reducer,
        initial_state: Value,
        middleware: Vec<Rc<dyn Middleware>>,
    ) -> Self {
        let store = Self::new(reducer, initial_state);
        *store.middleware.borrow_mut() = middleware;
        store
    }

    /// Current state, cloned.
    pub fn get_state(&self) -> Value {
        self.state.borrow().clone()
    }

    /// Run a selector against the current state without cloning it.
    pub fn select<R>(&self, selector: impl FnOnce(&Value) -> R) -> R {
        let state = self.state.borrow();
        selector(&state)
    }

    /// Value at a dotted path into the state, cloned.
    pub fn select_path(&self, path: &str) -> Option<Value> {
        let state = self.state.borrow();
        let mut node: &Value = &state;
        for part in path.split('.') {
            node = node.as_object()?.get(part)?;
        }
        Some(node.clone())
    }

    /// Send an action through the middleware chain into the reducer.
    ///
    /// Returns the action as it came out of the chain. Dispatching from
    /// inside a reducer fails with [`StateError::ReentrantDispatch`].
    pub fn dispatch(&self, action: Action) -> Result<Action, StateError> {
        if self.is_dispatching.get() {
            return Err(StateError::ReentrantDispatch);
        }
        self.is_dispatching.set(true);
        let outcome = catch_unwind(AssertUnwindSafe(|| self.proceed(Next { index: 0 }, action)));
        self.is_dispatching.set(false);
        match outcome {
            Ok(result) => result,
            Err(panic) => resume_unwind(panic),
        }
    }

    /// Continue the dispatch chain from inside a middleware.
    pub fn proceed(&self, next: Next, action: Action) -> Result<Action, StateError> {
        let middleware = self.middleware.borrow().get(next.index).cloned();
        match middleware {
            Some(m) => m.handle(
                self,
                action,
                Next {
                    index: next.index + 1,
                },
            ),
            None => self.apply(action),
        }
    }

    fn apply(&self, action: Action) -> Result<Action, StateError> {
        let previous = self.state.borrow().clone();
        let next_state = {
            let reducer = self.reducer.borrow();
            (*reducer)(&previous, &action)
        };

        let changed = next_state != previous;
        if changed {
            *self.state.borrow_mut() = next_state.clone();
            self.record(next_state.clone(), &action.kind);
        }
        // Subscribers may dispatch; the reduce phase is over.
        self.is_dispatching.set(false);
        if changed {
            debug!(action = %action.kind, "state changed");
            self.notify(&next_state);
        }
        self.notify_action(&action);
        Ok(action)
    }

    /// Register a subscriber called with every new state.
    pub fn subscribe(&self, callback: impl Fn(&Value) + 'static) -> SubscriptionId {
        let id = self.next_subscriber_id.get();
        self.next_subscriber_id.set(id + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(callback)));
        SubscriptionId(id)
    }

    /// Remove a subscriber. Returns whether it was still registered; a
    /// second call with the same id is a no-op returning false.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id.0);
        subscribers.len() != before
    }

    /// Register a listener called with every dispatched action, whether
    /// or not it changed the state.
    pub fn on_action(&self, callback: impl Fn(&Action) + 'static) -> SubscriptionId {
        let id = self.next_subscriber_id.get();
        self.next_subscriber_id.set(id + 1);
        self.action_listeners
            .borrow_mut()
            .push((id, Rc::new(callback)));
        SubscriptionId(id)
    }

    /// Remove an action listener. Returns whether it was still
    /// registered.
    pub fn remove_action_listener(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.action_listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id.0);
        listeners.len() != before
    }

    pub fn add_middleware(&self, middleware: Rc<dyn Middleware>) {
        self.middleware.borrow_mut().push(middleware);
    }

    /// Remove a middleware by identity. Returns whether it was present.
    pub fn remove_middleware(&self, middleware: &Rc<dyn Middleware>) -> bool {
        let mut chain = self.middleware.borrow_mut();
        let before = chain.len();
        chain.retain(|m| !Rc::ptr_eq(m, middleware));
        chain.len() != before
    }

    /// Swap the reducer and announce it with a replace action.
    pub fn replace_reducer(&self, reducer: Reducer) -> Result<(), StateError> {
        if self.is_dispatching.get() {
            return Err(StateError::ReentrantDispatch);
        }
        *self.reducer.borrow_mut() = reducer;
        self.dispatch(Action::new(action::REPLACE)).map(|_| ())
    }

    /// Replace the state outright and collapse history to this point.
    pub fn reset(&self, state: Value) {
        *self.state.borrow_mut() = state.clone();
        {
            let mut history = self.history.borrow_mut();
            history.clear();
            history.push(HistoryEntry {
                state: state.clone(),
                action_kind: action::RESET.to_string(),
            });
        }
        self.cursor.set(0);
        debug!("state reset");
        self.notify(&state);
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.get() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.get() + 1 < self.history.borrow().len()
    }

    /// Step back one state. Returns whether a step was taken.
    pub fn undo(&self) -> bool {
        let cursor = self.cursor.get();
        if cursor == 0 {
            return false;
        }
        let state = self.history.borrow()[cursor - 1].state.clone();
        self.cursor.set(cursor - 1);
        *self.state.borrow_mut() = state.clone();
        self.notify(&state);
        true
    }

    /// Step forward one state. Returns whether a step was taken.
    pub fn redo(&self) -> bool {
        let cursor = self.cursor.get();
        if cursor + 1 >= self.history.borrow().len() {
            return false;
        }
        let state = self.history.borrow()[cursor + 1].state.clone();
        self.cursor.set(cursor + 1);
        *self.state.borrow_mut() = state.clone();
        self.notify(&state);
        true
    }

    /// Copy of the timeline, oldest first.
    pub fn get_history(&self) -> Vec<HistoryEntry> {
        self.history.borrow().clone()
    }

    /// Cap the timeline length, dropping the oldest entries. A cap of
    /// zero is treated as one; the current state always has an entry.
    pub fn set_max_history(&self, max: usize) {
        let max = max.max(1);
        self.max_history.set(max);
        let mut history = self.history.borrow_mut();
        if history.len() > max {
            let overflow = history.len() - max;
            history.drain(..overflow);
            self.cursor.set(self.cursor.get().saturating_sub(overflow));
        }
    }

    fn record(&self, state: Value, action_kind: &str) {
        let mut history = self.history.borrow_mut();
        history.truncate(self.cursor.get() + 1);
        history.push(HistoryEntry {
            state,
            action_kind: action_kind.to_string(),
        });
        let max = self.max_history.get();
        if history.len() > max {
            let overflow = history.len() - max;
            history.drain(..overflow);
        }
        self.cursor.set(history.len() - 1);
    }

    /// A panicking subscriber must not take the store down with it.
    fn notify(&self, state: &Value) {
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, s)| Rc::clone(s))
            .collect();
        for subscriber in subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber(state))).is_err() {
                error!("store subscriber panicked; continuing");
            }
        }
    }

    fn notify_action(&self, action: &Action) {
        let listeners: Vec<ActionListener> = self
            .action_listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(action))).is_err() {
                error!("store action listener panicked; continuing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::ValidationMiddleware;
    use serde_json::json;

    fn counter_reducer() -> Reducer {
        Box::new(|state, action| {
            let count = state.as_i64().unwrap_or(0);
            match action.kind.as_str() {
                "increment" => json!(count + 1),
                "decrement" => json!(count - 1),
                _ => state.clone(),
            }
        })
    }

    #[test]
    fn test_dispatch_updates_state() {
        let store = Store::new(counter_reducer(), json!(0));
        store.dispatch(Action::new("increment")).unwrap();
        store.dispatch(Action::new("increment")).unwrap();
        store.dispatch(Action::new("decrement")).unwrap();
        assert_eq!(store.get_state(), json!(1));
    }

    #[test]
    fn test_initial_state_settled_by_init_action() {
        let reducer: Reducer = Box::new(|state, _| {
            if state.is_null() {
                json!({"ready": true})
            } else {
                state.clone()
            }
        });
        let store = Store::new(reducer, Value::Null);
        assert_eq!(store.get_state(), json!({"ready": true}));
        assert_eq!(store.get_history()[0].action_kind, action::INIT);
    }

    #[test]
    fn test_subscribers_fire_only_on_change() {
        let store = Store::new(counter_reducer(), json!(0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.subscribe(move |state| sink.borrow_mut().push(state.clone()));

        store.dispatch(Action::new("increment")).unwrap();
        store.dispatch(Action::new("noop")).unwrap();
        assert_eq!(*seen.borrow(), vec![json!(1)]);
    }

    #[test]
    fn test_unsubscribe() {
        let store = Store::new(counter_reducer(), json!(0));
        let count = Rc::new(Cell::new(0));
        let sink = Rc::clone(&count);
        let id = store.subscribe(move |_| sink.set(sink.get() + 1));

        store.dispatch(Action::new("increment")).unwrap();
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.dispatch(Action::new("increment")).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_action_listeners_fire_even_without_state_change() {
        let store = Store::new(counter_reducer(), json!(0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = store.on_action(move |action| sink.borrow_mut().push(action.kind.clone()));

        store.dispatch(Action::new("increment")).unwrap();
        store.dispatch(Action::new("noop")).unwrap();
        assert_eq!(*seen.borrow(), vec!["increment", "noop"]);

        assert!(store.remove_action_listener(id));
        assert!(!store.remove_action_listener(id));
        store.dispatch(Action::new("increment")).unwrap();
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_dispatch_inside_reducer_is_rejected() {
        let slot: Rc<RefCell<Option<Rc<Store>>>> = Rc::new(RefCell::new(None));
        let outcome: Rc<RefCell<Option<Result<Action, StateError>>>> =
            Rc::new(RefCell::new(None));

        let slot_ref = Rc::clone(&slot);
        let outcome_ref = Rc::clone(&outcome);
        let reducer: Reducer = Box::new(move |state, probe| {
            if probe.kind == "probe" {
                if let Some(store) = slot_ref.borrow().as_ref() {
                    *outcome_ref.borrow_mut() = Some(store.dispatch(Action::new("nested")));
                }
            }
            state.clone()
        });

        let store = Rc::new(Store::new(reducer, json!(0)));
        *slot.borrow_mut() = Some(Rc::clone(&store));

        store.dispatch(Action::new("probe")).unwrap();
        assert_eq!(
            *outcome.borrow(),
            Some(Err(StateError::ReentrantDispatch))
        );
    }

    #[test]
    fn test_subscriber_may_dispatch() {
        let store = Rc::new(Store::new(counter_reducer(), json!(0)));
        let inner = Rc::clone(&store);
        store.subscribe(move |state| {
            if state == &json!(1) {
                inner.dispatch(Action::new("increment")).unwrap();
            }
        });
        store.dispatch(Action::new("increment")).unwrap();
        assert_eq!(store.get_state(), json!(2));
    }

    struct TagMiddleware {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Middleware for TagMiddleware {
        fn handle(&self, store: &Store, action: Action, next: Next) -> Result<Action, StateError> {
            self.log.borrow_mut().push(format!("{}:in", self.name));
            let result = store.proceed(next, action);
            self.log.borrow_mut().push(format!("{}:out", self.name));
            result
        }
    }

    #[test]
    fn test_middleware_runs_as_an_onion() {
        let store = Store::new(counter_reducer(), json!(0));
        let log = Rc::new(RefCell::new(Vec::new()));
        store.add_middleware(Rc::new(TagMiddleware {
            name: "a",
            log: Rc::clone(&log),
        }));
        store.add_middleware(Rc::new(TagMiddleware {
            name: "b",
            log: Rc::clone(&log),
        }));

        store.dispatch(Action::new("increment")).unwrap();
        assert_eq!(*log.borrow(), vec!["a:in", "b:in", "b:out", "a:out"]);
        assert_eq!(store.get_state(), json!(1));
    }

    #[test]
    fn test_validation_middleware_drops_failing_actions() {
        let store = Store::new(counter_reducer(), json!(0));
        store.add_middleware(Rc::new(
            ValidationMiddleware::new().with_rule("increment", |action| !action.payload.is_null()),
        ));

        store.dispatch(Action::new("increment")).unwrap();
        assert_eq!(store.get_state(), json!(0));
        store
            .dispatch(Action::with_payload("increment", json!(1)))
            .unwrap();
        assert_eq!(store.get_state(), json!(1));
        store.dispatch(Action::new("decrement")).unwrap();
        assert_eq!(store.get_state(), json!(0));
    }

    #[test]
    fn test_with_middleware_constructor() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let store = Store::with_middleware(
            counter_reducer(),
            json!(0),
            vec![
                Rc::new(TagMiddleware {
                    name: "a",
                    log: Rc::clone(&log),
                }),
                Rc::new(TagMiddleware {
                    name: "b",
                    log: Rc::clone(&log),
                }),
            ],
        );
        store.dispatch(Action::new("increment")).unwrap();
        assert_eq!(*log.borrow(), vec!["a:in", "b:in", "b:out", "a:out"]);
    }

    struct RenameMiddleware;

    impl Middleware for RenameMiddleware {
        fn handle(&self, store: &Store, mut action: Action, next: Next) -> Result<Action, StateError> {
            if action.kind == "bump" {
                action.kind = "increment".to_string();
            }
            store.proceed(next, action)
        }
    }

    #[test]
    fn test_middleware_may_transform_actions() {
        let store = Store::new(counter_reducer(), json!(0));
        store.add_middleware(Rc::new(RenameMiddleware));
        let out = store.dispatch(Action::new("bump")).unwrap();
        assert_eq!(out.kind, "increment");
        assert_eq!(store.get_state(), json!(1));
    }

    #[test]
    fn test_remove_middleware_by_identity() {
        let store = Store::new(counter_reducer(), json!(0));
        let blocker: Rc<dyn Middleware> =
            Rc::new(ValidationMiddleware::new().with_rule("increment", |_| false));
        store.add_middleware(Rc::clone(&blocker));

        store.dispatch(Action::new("increment")).unwrap();
        assert_eq!(store.get_state(), json!(0));

        assert!(store.remove_middleware(&blocker));
        assert!(!store.remove_middleware(&blocker));
        store.dispatch(Action::new("increment")).unwrap();
        assert_eq!(store.get_state(), json!(1));
    }

    #[test]
    fn test_undo_redo() {
        let store = Store::new(counter_reducer(), json!(0));
        store.dispatch(Action::new("increment")).unwrap();
        store.dispatch(Action::new("increment")).unwrap();

        assert!(store.can_undo());
        assert!(store.undo());
        assert_eq!(store.get_state(), json!(1));
        assert!(store.can_redo());
        assert!(store.redo());
        assert_eq!(store.get_state(), json!(2));
        assert!(!store.redo());
    }

    #[test]
    fn test_undo_stops_at_initial_state() {
        let store = Store::new(counter_reducer(), json!(0));
        store.dispatch(Action::new("increment")).unwrap();
        assert!(store.undo());
        assert_eq!(store.get_state(), json!(0));
        assert!(!store.undo());
    }

    #[test]
    fn test_dispatch_after_undo_discards_future() {
        let store = Store::new(counter_reducer(), json!(0));
        store.dispatch(Action::new("increment")).unwrap();
        store.dispatch(Action::new("increment")).unwrap();
        store.undo();

        store.dispatch(Action::new("decrement")).unwrap();
        assert_eq!(store.get_state(), json!(0));
        assert!(!store.can_redo());

        let history = store.get_history();
        let kinds: Vec<&str> = history.iter().map(|e| e.action_kind.as_str()).collect();
        assert_eq!(kinds, vec![action::INIT, "increment", "decrement"]);
    }

    #[test]
    fn test_history_is_bounded() {
        let store = Store::new(counter_reducer(), json!(0));
        store.set_max_history(3);
        for _ in 0..10 {
            store.dispatch(Action::new("increment")).unwrap();
        }
        let history = store.get_history();
        assert_eq!(history.len(), 3);
        assert_eq!(history.last().unwrap().state, json!(10));
        assert_eq!(store.get_state(), json!(10));
    }

    #[test]
    fn test_reset_collapses_history() {
        let store = Store::new(counter_reducer(), json!(0));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.subscribe(move |state| sink.borrow_mut().push(state.clone()));

        store.dispatch(Action::new("increment")).unwrap();
        store.reset(json!(42));

        assert_eq!(store.get_state(), json!(42));
        let history = store.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action_kind, action::RESET);
        assert!(!store.can_undo());
        assert_eq!(*seen.borrow(), vec![json!(1), json!(42)]);
    }

    #[test]
    fn test_replace_reducer() {
        let store = Store::new(counter_reducer(), json!(0));
        store.dispatch(Action::new("increment")).unwrap();

        store
            .replace_reducer(Box::new(|state, action| {
                let count = state.as_i64().unwrap_or(0);
                if action.kind == "increment" {
                    json!(count + 10)
                } else {
                    state.clone()
                }
            }))
            .unwrap();

        store.dispatch(Action::new("increment")).unwrap();
        assert_eq!(store.get_state(), json!(11));
    }

    #[test]
    fn test_select_path() {
        let reducer: Reducer = Box::new(|state, _| {
            if state.is_null() {
                json!({"ui": {"theme": "dark"}})
            } else {
                state.clone()
            }
        });
        let store = Store::new(reducer, Value::Null);
        assert_eq!(store.select_path("ui.theme"), Some(json!("dark")));
        assert_eq!(store.select_path("ui.missing"), None);
        assert_eq!(store.select(|s| s["ui"]["theme"].clone()), json!("dark"));
    }

    #[test]
    fn test_subscriber_panic_is_isolated() {
        let store = Store::new(counter_reducer(), json!(0));
        let count = Rc::new(Cell::new(0));
        let sink = Rc::clone(&count);
        store.subscribe(|_| panic!("boom"));
        store.subscribe(move |_| sink.set(sink.get() + 1));

        store.dispatch(Action::new("increment")).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_reducer_panic_leaves_store_usable() {
        let reducer: Reducer = Box::new(|state, action| {
            if action.kind == "boom" {
                panic!("reducer failure");
            }
            let count = state.as_i64().unwrap_or(0);
            if action.kind == "increment" {
                json!(count + 1)
            } else {
                state.clone()
            }
        });
        let store = Store::new(reducer, json!(0));

        let result = catch_unwind(AssertUnwindSafe(|| store.dispatch(Action::new("boom"))));
        assert!(result.is_err());

        store.dispatch(Action::new("increment")).unwrap();
        assert_eq!(store.get_state(), json!(1));
    }
}
