//! # Middleware
//!
//! Middleware wraps dispatch in an onion: each layer sees the action on
//! the way in and the dispatched action on the way out, and may pass it
//! along, transform it, or drop it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use errors::StateError;
use tracing::{debug, warn};

use crate::action::Action;
use crate::store::Store;

/// Continuation token for the rest of the dispatch chain. Pass it to
/// [`Store::proceed`] to keep the action moving; dropping it drops the
/// action.
#[derive(Debug)]
pub struct Next {
    pub(crate) index: usize,
}

/// A dispatch interceptor.
pub trait Middleware {
    fn handle(&self, store: &Store, action: Action, next: Next) -> Result<Action, StateError>;
}

/// Logs every action passing through the store, and the state it
/// produced.
#[derive(Default)]
pub struct LoggerMiddleware;

impl LoggerMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for LoggerMiddleware {
    fn handle(&self, store: &Store, action: Action, next: Next) -> Result<Action, StateError> {
        debug!(action = %action.kind, "dispatching");
        let result = store.proceed(next, action);
        match &result {
            Ok(action) => debug!(action = %action.kind, state = %store.get_state(), "dispatched"),
            Err(e) => warn!(error = %e, "dispatch failed"),
        }
        result
    }
}

/// Logs how long each dispatch took; dispatches slower than the
/// threshold are warned about.
pub struct TimingMiddleware {
    threshold: Duration,
}

impl TimingMiddleware {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }
}

impl Default for TimingMiddleware {
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

impl Middleware for TimingMiddleware {
    fn handle(&self, store: &Store, action: Action, next: Next) -> Result<Action, StateError> {
        let kind = action.kind.clone();
        let started = Instant::now();
        let result = store.proceed(next, action);
        let elapsed = started.elapsed();
        debug!(action = %kind, ?elapsed, "dispatch timed");
        if elapsed > self.threshold {
            warn!(action = %kind, ?elapsed, "slow dispatch");
        }
        result
    }
}

/// Swallows actions that fail a per-kind predicate before they reach the
/// reducer. Kinds with no registered rule always pass.
#[derive(Default)]
pub struct ValidationMiddleware {
    rules: HashMap<String, Box<dyn Fn(&Action) -> bool>>,
}

impl ValidationMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a predicate for one action kind, replacing any existing
    /// rule for that kind.
    pub fn add_rule(&mut self, kind: impl Into<String>, rule: impl Fn(&Action) -> bool + 'static) {
        self.rules.insert(kind.into(), Box::new(rule));
    }

    pub fn with_rule(
        mut self,
        kind: impl Into<String>,
        rule: impl Fn(&Action) -> bool + 'static,
    ) -> Self {
        self.add_rule(kind, rule);
        self
    }
}

impl Middleware for ValidationMiddleware {
    fn handle(&self, store: &Store, action: Action, next: Next) -> Result<Action, StateError> {
        if let Some(rule) = self.rules.get(&action.kind) {
            if !rule(&action) {
                warn!(action = %action.kind, "action rejected by validation middleware");
                return Ok(action);
            }
        }
        store.proceed(next, action)
    }
}
