//! # State Management
//!
//! A predictable state container: all state lives in a single [`Store`],
//! changes only through dispatched [`Action`]s, and new state is computed
//! by pure [`Reducer`] functions. Middleware wraps dispatch; subscribers
//! observe every state change; a bounded history provides undo/redo.
//!
//! ```
//! use state::{Action, Reducer, Store};
//! use serde_json::json;
//!
//! let reducer: Reducer = Box::new(|state, action| {
//!     let count = state.as_i64().unwrap_or(0);
//!     match action.kind.as_str() {
//!         "increment" => json!(count + 1),
//!         _ => state.clone(),
//!     }
//! });
//!
//! let store = Store::new(reducer, json!(0));
//! store.dispatch(Action::new("increment")).unwrap();
//! assert_eq!(store.get_state(), json!(1));
//! ```

pub mod action;
pub mod middleware;
pub mod reducer;
pub mod store;

pub use action::{Action, ActionCreator};
pub use middleware::{LoggerMiddleware, Middleware, Next, TimingMiddleware, ValidationMiddleware};
pub use reducer::{
    ActionHandler, Reducer, combine_reducers, create_reducer, immutable_delete, immutable_update,
};
pub use store::{HistoryEntry, Store, SubscriptionId};

pub use errors::StateError;
