//! Event dispatch primitive
//!
//! Every evented object embeds an [`EventRegistry`] and implements
//! [`Evented`] by handing it out. The registry maps an event type to an
//! ordered list of listener records:
//!
//! - listeners fire in registration order
//! - a listener is registered at most once per type (identity is the
//!   [`Listener`] handle, not the closure body)
//! - a `one` registration spanning several types fires once in total
//! - dispatch works on a snapshot, so handlers may add or remove
//!   listeners while an event is in flight
//!
//! After local handlers run, a bubbling event is re-dispatched on the
//! object's [`Evented::event_parent`] unless propagation was stopped.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

/// Fired on a component right before it is torn down. Never bubbles.
pub const DISPOSE: &str = "dispose";
/// Fired when queued ready callbacks have been flushed. Never bubbles.
pub const READY: &str = "ready";

/// A normalized event object.
#[derive(Debug, Clone)]
pub struct Event {
    event_type: String,
    data: Value,
    bubbles: bool,
    timestamp: DateTime<Utc>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl Event {
    /// Create a bubbling event with no payload
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: Value::Null,
            bubbles: true,
            timestamp: Utc::now(),
            propagation_stopped: Cell::new(false),
            immediate_propagation_stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    /// Attach a payload
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Keep the event on the object it was triggered on
    pub fn non_bubbling(mut self) -> Self {
        self.bubbles = false;
        self
    }

    /// Build an event from a `{type, ...}` record. Every field other than
    /// `type` and `bubbles` becomes the payload.
    pub fn from_descriptor(descriptor: Value) -> Result<Self> {
        let Value::Object(mut fields) = descriptor else {
            return Err(Error::InvalidEvent(
                "descriptor must be a string or an object".to_string(),
            ));
        };

        let event_type = match fields.remove("type") {
            Some(Value::String(event_type)) if !event_type.is_empty() => event_type,
            _ => return Err(Error::InvalidEvent("missing `type`".to_string())),
        };
        let bubbles = !matches!(fields.remove("bubbles"), Some(Value::Bool(false)));

        let mut event = Self::new(event_type).with_data(Value::Object(fields));
        event.bubbles = bubbles;
        Ok(event)
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Look up a payload field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Stop the event from reaching parent objects
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    /// Stop both bubbling and the remaining listeners on the current object
    pub fn stop_immediate_propagation(&self) {
        self.immediate_propagation_stopped.set(true);
        self.propagation_stopped.set(true);
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn is_immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped.get()
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

impl From<&str> for Event {
    fn from(event_type: &str) -> Self {
        Event::new(event_type)
    }
}

impl From<String> for Event {
    fn from(event_type: String) -> Self {
        Event::new(event_type)
    }
}

impl TryFrom<Value> for Event {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(event_type) if !event_type.is_empty() => Ok(Event::new(event_type)),
            other => Event::from_descriptor(other),
        }
    }
}

/// A shareable event handler. Two `Listener`s are the same listener when
/// they are clones of one handle.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0))
    }
}

/// One or more event types
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventTypes(Vec<String>);

impl EventTypes {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for EventTypes {
    fn from(event_type: &str) -> Self {
        Self(vec![event_type.to_string()])
    }
}

impl From<String> for EventTypes {
    fn from(event_type: String) -> Self {
        Self(vec![event_type])
    }
}

impl From<&[&str]> for EventTypes {
    fn from(types: &[&str]) -> Self {
        Self(types.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for EventTypes {
    fn from(types: [&str; N]) -> Self {
        Self(types.iter().map(|t| t.to_string()).collect())
    }
}

impl From<Vec<&str>> for EventTypes {
    fn from(types: Vec<&str>) -> Self {
        Self(types.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for EventTypes {
    fn from(types: Vec<String>) -> Self {
        Self(types)
    }
}

impl From<&EventTypes> for EventTypes {
    fn from(types: &EventTypes) -> Self {
        types.clone()
    }
}

#[derive(Clone)]
struct Record {
    listener: Listener,
    /// Shared by every record of one `one` registration
    once: Option<Rc<Cell<bool>>>,
}

/// A listener this object placed on another evented object
struct Binding {
    target: Weak<dyn Evented>,
    types: EventTypes,
    listener: Listener,
}

/// Per-object listener registry.
#[derive(Default)]
pub struct EventRegistry {
    handlers: RefCell<HashMap<String, Vec<Record>>>,
    bindings: RefCell<Vec<Binding>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for every type in `types`
    pub fn add(&self, types: &EventTypes, listener: &Listener) {
        self.insert(types, listener, None);
    }

    /// Register `listener` to fire once across all of `types`
    pub fn add_once(&self, types: &EventTypes, listener: &Listener) {
        self.insert(types, listener, Some(Rc::new(Cell::new(false))));
    }

    fn insert(&self, types: &EventTypes, listener: &Listener, once: Option<Rc<Cell<bool>>>) {
        let mut handlers = self.handlers.borrow_mut();
        for event_type in types.iter() {
            let records = handlers.entry(event_type.to_string()).or_default();
            if records.iter().any(|record| record.listener == *listener) {
                continue;
            }
            records.push(Record {
                listener: listener.clone(),
                once: once.clone(),
            });
        }
    }

    /// Remove one listener from the given types
    pub fn remove(&self, types: &EventTypes, listener: &Listener) {
        let mut handlers = self.handlers.borrow_mut();
        for event_type in types.iter() {
            if let Some(records) = handlers.get_mut(event_type) {
                records.retain(|record| record.listener != *listener);
                if records.is_empty() {
                    handlers.remove(event_type);
                }
            }
        }
    }

    /// Remove every listener of the given types
    pub fn remove_types(&self, types: &EventTypes) {
        let mut handlers = self.handlers.borrow_mut();
        for event_type in types.iter() {
            handlers.remove(event_type);
        }
    }

    /// Remove one listener from every type it is registered for
    pub fn remove_listener(&self, listener: &Listener) {
        self.handlers.borrow_mut().retain(|_, records| {
            records.retain(|record| record.listener != *listener);
            !records.is_empty()
        });
    }

    /// Remove every listener
    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.handlers
            .borrow()
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }

    fn remove_once_group(&self, group: &Rc<Cell<bool>>) {
        self.handlers.borrow_mut().retain(|_, records| {
            records.retain(|record| {
                !record
                    .once
                    .as_ref()
                    .is_some_and(|other| Rc::ptr_eq(other, group))
            });
            !records.is_empty()
        });
    }

    /// Invoke the local listeners for `event`.
    pub fn dispatch_local(&self, event: &Event) {
        let snapshot = match self.handlers.borrow().get(event.event_type()) {
            Some(records) => records.clone(),
            None => return,
        };

        trace!(event = event.event_type(), listeners = snapshot.len(), "Dispatching");

        for record in snapshot {
            if event.is_immediate_propagation_stopped() {
                break;
            }
            if let Some(group) = &record.once {
                if group.replace(true) {
                    continue;
                }
                self.remove_once_group(group);
            }
            record.listener.call(event);
        }
    }

    /// Remember a listener placed on another object so it can be released
    /// when this object goes away.
    pub fn track_binding(&self, target: Weak<dyn Evented>, types: EventTypes, listener: Listener) {
        self.bindings.borrow_mut().push(Binding {
            target,
            types,
            listener,
        });
    }

    /// Remove every listener this object placed on other objects
    pub fn release_bindings(&self) {
        let bindings: Vec<Binding> = self.bindings.borrow_mut().drain(..).collect();
        for binding in bindings {
            if let Some(target) = binding.target.upgrade() {
                target.events().remove(&binding.types, &binding.listener);
            }
        }
    }

    /// Release the bindings placed on one particular target
    pub fn release_bindings_to(&self, target: &Rc<dyn Evented>) {
        let mut released = Vec::new();
        self.bindings.borrow_mut().retain(|binding| {
            let matches = binding
                .target
                .upgrade()
                .is_some_and(|bound| Rc::ptr_eq(&bound, target));
            if matches {
                released.push((binding.types.clone(), binding.listener.clone()));
            }
            !matches
        });
        for (types, listener) in released {
            target.events().remove(&types, &listener);
        }
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.borrow();
        let mut types: Vec<(&String, usize)> =
            handlers.iter().map(|(t, records)| (t, records.len())).collect();
        types.sort();
        f.debug_struct("EventRegistry")
            .field("handlers", &types)
            .field("bindings", &self.bindings.borrow().len())
            .finish()
    }
}

/// The evented capability.
///
/// Implementors only supply [`events`](Evented::events) and, when events
/// should bubble, [`event_parent`](Evented::event_parent).
pub trait Evented {
    fn events(&self) -> &EventRegistry;

    /// Where bubbling events go after local listeners ran
    fn event_parent(&self) -> Option<Rc<dyn Evented>> {
        None
    }

    /// Run local listeners, then bubble.
    fn dispatch(&self, event: &Event) {
        self.events().dispatch_local(event);
        if event.bubbles() && !event.is_propagation_stopped() {
            if let Some(parent) = self.event_parent() {
                parent.dispatch(event);
            }
        }
    }

    fn on(&self, types: impl Into<EventTypes>, listener: &Listener)
    where
        Self: Sized,
    {
        self.events().add(&types.into(), listener);
    }

    fn one(&self, types: impl Into<EventTypes>, listener: &Listener)
    where
        Self: Sized,
    {
        self.events().add_once(&types.into(), listener);
    }

    fn off(&self, types: impl Into<EventTypes>, listener: &Listener)
    where
        Self: Sized,
    {
        self.events().remove(&types.into(), listener);
    }

    fn off_type(&self, types: impl Into<EventTypes>)
    where
        Self: Sized,
    {
        self.events().remove_types(&types.into());
    }

    fn off_all(&self)
    where
        Self: Sized,
    {
        self.events().clear();
    }

    /// Dispatch synchronously. Returns `false` when a listener called
    /// [`Event::prevent_default`].
    fn trigger(&self, event: impl Into<Event>) -> bool
    where
        Self: Sized,
    {
        let event = event.into();
        self.dispatch(&event);
        !event.is_default_prevented()
    }

    /// Listen on `target`; the registration is dropped when this object
    /// releases its bindings (on dispose).
    fn listen_to<T: Evented + 'static>(
        &self,
        target: &Rc<T>,
        types: impl Into<EventTypes>,
        listener: &Listener,
    ) where
        Self: Sized,
    {
        let types = types.into();
        target.events().add(&types, listener);
        let target: Rc<dyn Evented> = target.clone();
        self.events()
            .track_binding(Rc::downgrade(&target), types, listener.clone());
    }
}
