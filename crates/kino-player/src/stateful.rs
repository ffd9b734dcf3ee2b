//! Stateful capability
//!
//! A change-tracked key/value bag. Objects embed a [`StateBag`] and
//! implement [`Stateful`]; when they are also [`Evented`], every update
//! that changed at least one key emits a non-bubbling `statechanged`
//! event carrying `{changes: {key: {from, to}}}`.

use crate::events::{Event, Evented};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{trace, warn};

/// Event type emitted after a state update changed something
pub const STATE_CHANGED: &str = "statechanged";

/// State values keyed by name
pub type StateMap = Map<String, Value>;

/// Changed keys of one update
pub type Changes = BTreeMap<String, StateChange>;

/// Old and new value of one key. A key that did not exist reads as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub from: Value,
    pub to: Value,
}

/// Input to [`Stateful::set_state`]
pub enum StateUpdate {
    Values(StateMap),
    /// Produces the values when the update is applied
    Deferred(Box<dyn FnOnce() -> StateMap>),
}

impl StateUpdate {
    pub fn deferred(producer: impl FnOnce() -> StateMap + 'static) -> Self {
        StateUpdate::Deferred(Box::new(producer))
    }

    fn resolve(self) -> StateMap {
        match self {
            StateUpdate::Values(values) => values,
            StateUpdate::Deferred(producer) => producer(),
        }
    }
}

impl From<StateMap> for StateUpdate {
    fn from(values: StateMap) -> Self {
        StateUpdate::Values(values)
    }
}

impl From<Value> for StateUpdate {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(values) => StateUpdate::Values(values),
            other => {
                warn!(update = %other, "Ignoring non-object state update");
                StateUpdate::Values(StateMap::new())
            }
        }
    }
}

impl fmt::Debug for StateUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateUpdate::Values(values) => f.debug_tuple("Values").field(values).finish(),
            StateUpdate::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// The state store itself
#[derive(Debug, Default)]
pub struct StateBag {
    values: RefCell<StateMap>,
}

impl StateBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(values: StateMap) -> Self {
        Self {
            values: RefCell::new(values),
        }
    }

    pub fn snapshot(&self) -> StateMap {
        self.values.borrow().clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    /// Write every value and return the keys whose value differed.
    ///
    /// All values are written before this returns, so any event built from
    /// the result observes the new state.
    pub fn apply(&self, update: StateMap) -> Option<Changes> {
        let mut values = self.values.borrow_mut();
        let mut changes = Changes::new();

        for (key, to) in update {
            let previous = values.get(&key);
            if previous != Some(&to) {
                // an absent key is reported as `from: null`
                let from = previous.cloned().unwrap_or(Value::Null);
                changes.insert(
                    key.clone(),
                    StateChange {
                        from,
                        to: to.clone(),
                    },
                );
            }
            values.insert(key, to);
        }

        (!changes.is_empty()).then_some(changes)
    }
}

/// Build the `statechanged` payload
pub fn changes_to_value(changes: &Changes) -> Value {
    let mut encoded = Map::new();
    for (key, change) in changes {
        let mut pair = Map::new();
        pair.insert("from".to_string(), change.from.clone());
        pair.insert("to".to_string(), change.to.clone());
        encoded.insert(key.clone(), Value::Object(pair));
    }
    let mut data = Map::new();
    data.insert("changes".to_string(), Value::Object(encoded));
    Value::Object(data)
}

/// Read the changes back out of a `statechanged` event
pub fn changes_from_event(event: &Event) -> Option<Changes> {
    serde_json::from_value(event.get("changes")?.clone()).ok()
}

/// The stateful capability.
pub trait Stateful {
    fn state_bag(&self) -> &StateBag;

    /// The event surface `statechanged` goes to, if the object has one
    fn as_evented(&self) -> Option<&dyn Evented> {
        None
    }

    fn state(&self) -> StateMap {
        self.state_bag().snapshot()
    }

    fn state_value(&self, key: &str) -> Option<Value> {
        self.state_bag().get(key)
    }

    /// Apply an update. Returns the changed keys, or `None` when every
    /// value was already current.
    fn set_state(&self, update: impl Into<StateUpdate>) -> Option<Changes>
    where
        Self: Sized,
    {
        let changes = self.state_bag().apply(update.into().resolve())?;
        trace!(keys = changes.len(), "State changed");

        if let Some(evented) = self.as_evented() {
            let event = Event::new(STATE_CHANGED)
                .with_data(changes_to_value(&changes))
                .non_bubbling();
            evented.dispatch(&event);
        }

        Some(changes)
    }
}
