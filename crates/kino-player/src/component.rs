//! Component tree
//!
//! A [`Component`] is a node of the player's UI tree. It owns one element,
//! an ordered list of children, merged options, an event registry and a
//! state bag. What a component *is* (its markup, default options, default
//! state and reactions) comes from its [`Widget`].
//!
//! Lifecycle:
//!
//! ```text
//!   new ──► options merged ──► createEl ──► children ──► Widget::init
//!                                                            │
//!            ready callbacks ◄── ready edge (1 ms later) ◄───┘
//!                                                            │
//!   dispose: `dispose` event ► children (reverse) ► timers ► listeners
//!            ► detach from parent ► element released
//! ```

use crate::dom::{self, Attributes, Dom, ElementProps, NodeId};
use crate::error::{Error, Result};
use crate::events::{Event, EventRegistry, Evented, Listener, DISPOSE, READY};
use crate::host::Context;
use crate::options::{bool_option, merge_options, str_option, Options};
use crate::player::Player;
use crate::registry;
use crate::runloop::TimerId;
use crate::stateful::{changes_from_event, Changes, StateBag, StateMap, Stateful, STATE_CHANGED};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Class that hides a component's element
pub const HIDDEN_CLASS: &str = "kino-hidden";

static NEXT_GUID: AtomicU64 = AtomicU64::new(1);

fn next_guid() -> u64 {
    NEXT_GUID.fetch_add(1, Ordering::Relaxed)
}

/// The behaviour of one component kind
pub trait Widget: 'static {
    /// Registry name of the kind
    fn name(&self) -> &str;

    /// Kind-level options; instance options are merged over them
    fn default_options(&self) -> Options {
        Options::new()
    }

    fn css_class(&self) -> Option<String> {
        None
    }

    /// Build the component's element. Called exactly once.
    fn create_el(&self, component: &Component) -> NodeId {
        let props = ElementProps {
            class_name: self.css_class(),
            ..Default::default()
        };
        dom::create_el(component.dom(), "div", &props, &Attributes::new())
    }

    fn initial_state(&self) -> StateMap {
        StateMap::new()
    }

    /// Runs after children exist, before the ready edge is scheduled
    fn init(&self, _component: &Rc<Component>) -> Result<()> {
        Ok(())
    }

    fn handle_state_changed(&self, _component: &Component, _changes: &Changes) {}

    /// Whether construction schedules the ready edge by itself
    fn auto_ready(&self) -> bool {
        true
    }

    /// Kind-specific teardown; runs after children are gone, while the
    /// element still exists
    fn dispose(&self, _component: &Component) {}
}

/// The generic container registered as `Component`
#[derive(Debug, Default)]
pub struct Container;

impl Widget for Container {
    fn name(&self) -> &str {
        registry::BASE_COMPONENT
    }
}

/// A child to add: a registered name or an existing component
pub enum ChildSpec {
    Name(String),
    Instance(Rc<Component>),
}

impl From<&str> for ChildSpec {
    fn from(name: &str) -> Self {
        ChildSpec::Name(name.to_string())
    }
}

impl From<String> for ChildSpec {
    fn from(name: String) -> Self {
        ChildSpec::Name(name)
    }
}

impl From<Rc<Component>> for ChildSpec {
    fn from(component: Rc<Component>) -> Self {
        ChildSpec::Instance(component)
    }
}

impl From<&Rc<Component>> for ChildSpec {
    fn from(component: &Rc<Component>) -> Self {
        ChildSpec::Instance(component.clone())
    }
}

type ReadyCallback = Box<dyn FnOnce(&Rc<Component>)>;

/// A node of the UI tree
pub struct Component {
    id: String,
    name: String,
    ctx: Context,
    parent: RefCell<Weak<Component>>,
    children: RefCell<Vec<Rc<Component>>>,
    el: Cell<Option<NodeId>>,
    content_el: Cell<Option<NodeId>>,
    options: RefCell<Options>,
    events: EventRegistry,
    state: StateBag,
    ready_queue: RefCell<Vec<ReadyCallback>>,
    ready_timer: Cell<Option<TimerId>>,
    is_ready: Cell<bool>,
    disposed: Cell<bool>,
    timers: RefCell<HashSet<TimerId>>,
    widget: Box<dyn Widget>,
    self_ref: Weak<Component>,
}

impl Component {
    /// Build a component. Unknown declarative children fail the whole
    /// construction.
    pub fn new(ctx: &Context, options: Options, widget: Box<dyn Widget>) -> Result<Rc<Component>> {
        let options = merge_options(&[&widget.default_options(), &options]);
        let name = str_option(&options, "name")
            .map(str::to_string)
            .unwrap_or_else(|| widget.name().to_string());
        let id = str_option(&options, "id")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_component_{}", ctx.player_id(), next_guid()));
        let create_el = bool_option(&options, "createEl", true);
        let init_children = bool_option(&options, "initChildren", true);
        let state = StateBag::with_initial(widget.initial_state());

        let component = Rc::new_cyclic(|self_ref| Component {
            id,
            name,
            ctx: ctx.clone(),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            el: Cell::new(None),
            content_el: Cell::new(None),
            options: RefCell::new(options),
            events: EventRegistry::new(),
            state,
            ready_queue: RefCell::new(Vec::new()),
            ready_timer: Cell::new(None),
            is_ready: Cell::new(false),
            disposed: Cell::new(false),
            timers: RefCell::new(HashSet::new()),
            widget,
            self_ref: self_ref.clone(),
        });

        if create_el {
            let el = component.widget.create_el(&component);
            component.el.set(Some(el));
            component.content_el.set(Some(el));
        }

        let weak = Rc::downgrade(&component);
        component.on(
            STATE_CHANGED,
            &Listener::new(move |event| {
                if let (Some(component), Some(changes)) = (weak.upgrade(), changes_from_event(event)) {
                    component.widget.handle_state_changed(&component, &changes);
                }
            }),
        );

        let mut setup = Ok(());
        if init_children {
            setup = component.init_children();
        }
        let setup = setup.and_then(|_| component.widget.init(&component));

        if let Err(e) = setup {
            component.dispose();
            return Err(e);
        }

        if component.widget.auto_ready() {
            component.trigger_ready();
        }

        debug!(component = %component.name, id = %component.id, "Component created");
        Ok(component)
    }

    /// Instantiate children declared in the `children` option.
    ///
    /// `children` may be an array of names or `{name, ...options}` records,
    /// or a map of name to options. A parent option keyed by the child's
    /// name overrides the declared options; `false` skips the child.
    pub fn init_children(&self) -> Result<()> {
        let options = self.options.borrow().clone();
        let declared: Vec<(String, Value)> = match options.get("children") {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(name) => Ok((name.clone(), Value::Object(Options::new()))),
                    Value::Object(record) => str_option(record, "name")
                        .map(|name| (name.to_string(), item.clone()))
                        .ok_or_else(|| Error::InvalidOptions("child record without a name".to_string())),
                    other => Err(Error::InvalidOptions(format!("invalid child entry {}", other))),
                })
                .collect::<Result<_>>()?,
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Some(other) => {
                return Err(Error::InvalidOptions(format!(
                    "children must be an array or an object, got {}",
                    other
                )))
            }
        };

        for (name, declared_options) in declared {
            let mut child_options = match options.get(&name).unwrap_or(&declared_options) {
                Value::Bool(false) => continue,
                Value::Object(child_options) => child_options.clone(),
                _ => Options::new(),
            };
            if let Some(kind) = declared_options.get("componentClass") {
                child_options
                    .entry("componentClass")
                    .or_insert_with(|| kind.clone());
            }
            self.add_child(name.as_str(), child_options, None)?;
        }
        Ok(())
    }

    /// Add a child at `index` (default: last). A name is resolved through
    /// the component registry (`componentClass` in the options picks a
    /// different kind than the name). An instance with another parent is
    /// moved.
    pub fn add_child(
        &self,
        child: impl Into<ChildSpec>,
        options: Options,
        index: Option<usize>,
    ) -> Result<Rc<Component>> {
        if self.disposed.get() {
            return Err(Error::Disposed(self.id.clone()));
        }

        let child = match child.into() {
            ChildSpec::Name(name) => {
                let kind = str_option(&options, "componentClass").unwrap_or(&name).to_string();
                let factory =
                    registry::get_component(&kind).ok_or_else(|| Error::UnknownComponent(kind.clone()))?;
                let mut options = options;
                options
                    .entry("name")
                    .or_insert_with(|| Value::String(name.clone()));
                Component::new(&self.ctx, options, factory())?
            }
            ChildSpec::Instance(component) => {
                if component.is_disposed() {
                    return Err(Error::Disposed(component.id.clone()));
                }
                if self.is_self_or_ancestor(&component) {
                    return Err(Error::InvalidOptions(format!(
                        "{} cannot become a child of its own subtree",
                        component.id
                    )));
                }
                component
            }
        };

        self.insert_child(&child, index);
        Ok(child)
    }

    fn is_self_or_ancestor(&self, candidate: &Rc<Component>) -> bool {
        if std::ptr::eq(self, Rc::as_ptr(candidate)) {
            return true;
        }
        let mut current = self.parent();
        while let Some(node) = current {
            if Rc::ptr_eq(&node, candidate) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    fn insert_child(&self, child: &Rc<Component>, index: Option<usize>) {
        if let Some(old_parent) = child.parent() {
            old_parent.remove_child(child);
        }

        let before = {
            let mut children = self.children.borrow_mut();
            let index = index.unwrap_or(children.len()).min(children.len());
            let before = children.get(index).and_then(|sibling| sibling.el());
            children.insert(index, child.clone());
            before
        };
        *child.parent.borrow_mut() = self.self_ref.clone();

        if let (Some(content_el), Some(child_el)) = (self.content_el(), child.el()) {
            self.dom().insert_child(content_el, child_el, before);
        }
        trace!(parent = %self.id, child = %child.id, "Child added");
    }

    /// Detach a child without disposing it
    pub fn remove_child(&self, child: &Component) -> bool {
        let removed = {
            let mut children = self.children.borrow_mut();
            match children.iter().position(|c| std::ptr::eq(Rc::as_ptr(c), child)) {
                Some(position) => Some(children.remove(position)),
                None => None,
            }
        };
        let Some(removed) = removed else {
            return false;
        };

        *removed.parent.borrow_mut() = Weak::new();
        if let (Some(content_el), Some(child_el)) = (self.content_el(), removed.el()) {
            if self.dom().parent(child_el) == Some(content_el) {
                self.dom().remove_child(content_el, child_el);
            }
        }
        true
    }

    /// Tear the component down. Repeated calls do nothing.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }

        self.dispatch(&Event::new(DISPOSE).non_bubbling());

        let children: Vec<Rc<Component>> = self.children.borrow_mut().drain(..).collect();
        for child in children.iter().rev() {
            *child.parent.borrow_mut() = Weak::new();
            child.dispose();
        }

        let run_loop = self.ctx.run_loop();
        for timer in self.timers.borrow_mut().drain() {
            run_loop.clear_timeout(timer);
        }
        self.ready_timer.set(None);
        self.ready_queue.borrow_mut().clear();

        self.widget.dispose(self);

        self.events.release_bindings();
        self.events.clear();

        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
        if let Some(el) = self.el.take() {
            self.dom().release(el);
        }
        self.content_el.set(None);

        debug!(component = %self.name, id = %self.id, "Component disposed");
    }

    /// Run `callback` once the component is ready; immediately when it
    /// already is.
    pub fn ready(&self, callback: impl FnOnce(&Rc<Component>) + 'static) {
        if self.disposed.get() {
            warn!(id = %self.id, "ready() on a disposed component");
            return;
        }
        if self.is_ready.get() {
            if let Some(component) = self.self_ref.upgrade() {
                callback(&component);
            }
        } else {
            self.ready_queue.borrow_mut().push(Box::new(callback));
        }
    }

    /// Schedule the ready edge: queued callbacks run in order, then
    /// `ready` fires.
    pub fn trigger_ready(&self) {
        if self.disposed.get() || self.ready_timer.get().is_some() {
            return;
        }
        let weak = self.self_ref.clone();
        let timer = self.set_timeout(1, move || {
            if let Some(component) = weak.upgrade() {
                component.flush_ready();
            }
        });
        if let Ok(timer) = timer {
            self.ready_timer.set(Some(timer));
        }
    }

    fn flush_ready(self: &Rc<Self>) {
        self.ready_timer.set(None);
        self.is_ready.set(true);

        let queued: Vec<ReadyCallback> = self.ready_queue.borrow_mut().drain(..).collect();
        for callback in queued {
            if self.disposed.get() {
                return;
            }
            callback(self);
        }
        if !self.disposed.get() {
            self.trigger(Event::new(READY).non_bubbling());
        }
    }

    /// Schedule a task that is cancelled if the component is disposed first
    pub fn set_timeout(&self, delay_ms: u64, task: impl FnOnce() + 'static) -> Result<TimerId> {
        if self.disposed.get() {
            return Err(Error::Disposed(self.id.clone()));
        }

        let weak = self.self_ref.clone();
        let slot: Rc<Cell<Option<TimerId>>> = Rc::new(Cell::new(None));
        let own_id = slot.clone();
        let timer = self.ctx.run_loop().set_timeout(delay_ms, move || {
            if let (Some(component), Some(timer)) = (weak.upgrade(), own_id.get()) {
                component.timers.borrow_mut().remove(&timer);
            }
            task();
        });
        slot.set(Some(timer));
        self.timers.borrow_mut().insert(timer);
        Ok(timer)
    }

    pub fn clear_timeout(&self, timer: TimerId) {
        if self.timers.borrow_mut().remove(&timer) {
            self.ctx.run_loop().clear_timeout(timer);
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn dom(&self) -> &dyn Dom {
        self.ctx.dom()
    }

    pub fn widget(&self) -> &dyn Widget {
        self.widget.as_ref()
    }

    /// The owning player
    pub fn player(&self) -> Option<Rc<Player>> {
        self.ctx.player()
    }

    pub fn el(&self) -> Option<NodeId> {
        self.el.get()
    }

    /// Where children's elements go; defaults to [`el`](Self::el)
    pub fn content_el(&self) -> Option<NodeId> {
        self.content_el.get()
    }

    pub fn set_content_el(&self, node: NodeId) {
        self.content_el.set(Some(node));
    }

    pub fn options(&self) -> Options {
        self.options.borrow().clone()
    }

    pub fn option(&self, key: &str) -> Option<Value> {
        self.options.borrow().get(key).cloned()
    }

    /// Merge more options over the current ones
    pub fn merge_options(&self, options: &Options) {
        let merged = merge_options(&[&self.options.borrow(), options]);
        *self.options.borrow_mut() = merged;
    }

    pub fn parent(&self) -> Option<Rc<Component>> {
        self.parent.borrow().upgrade()
    }

    pub fn children(&self) -> Vec<Rc<Component>> {
        self.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    /// First direct child with this name
    pub fn get_child(&self, name: &str) -> Option<Rc<Component>> {
        let title = registry::to_title_case(name);
        self.children
            .borrow()
            .iter()
            .find(|c| c.name == name || registry::to_title_case(&c.name) == title)
            .cloned()
    }

    pub fn get_child_by_id(&self, id: &str) -> Option<Rc<Component>> {
        self.children.borrow().iter().find(|c| c.id == id).cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.el().is_some_and(|el| dom::has_class(self.dom(), el, class))
    }

    pub fn add_class(&self, class: &str) {
        if let Some(el) = self.el() {
            dom::add_class(self.dom(), el, class);
        }
    }

    pub fn remove_class(&self, class: &str) {
        if let Some(el) = self.el() {
            dom::remove_class(self.dom(), el, class);
        }
    }

    pub fn toggle_class(&self, class: &str, force: Option<bool>) {
        if let Some(el) = self.el() {
            dom::toggle_class(self.dom(), el, class, force);
        }
    }

    pub fn show(&self) {
        self.remove_class(HIDDEN_CLASS);
    }

    pub fn hide(&self) {
        self.add_class(HIDDEN_CLASS);
    }

    pub fn is_hidden(&self) -> bool {
        self.has_class(HIDDEN_CLASS)
    }
}

impl Evented for Component {
    fn events(&self) -> &EventRegistry {
        &self.events
    }

    fn event_parent(&self) -> Option<Rc<dyn Evented>> {
        self.parent().map(|parent| parent as Rc<dyn Evented>)
    }
}

impl Stateful for Component {
    fn state_bag(&self) -> &StateBag {
        &self.state
    }

    fn as_evented(&self) -> Option<&dyn Evented> {
        Some(self)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("el", &self.el.get())
            .field("children", &self.children.borrow().len())
            .field("ready", &self.is_ready.get())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::HeadlessDom;
    use crate::host::Host;
    use crate::runloop::RunLoop;
    use crate::simulated::SimulatedPlatform;
    use serde_json::json;

    struct Fixture {
        dom: Rc<HeadlessDom>,
        run_loop: Rc<RunLoop>,
        ctx: Context,
    }

    fn fixture() -> Fixture {
        let dom = Rc::new(HeadlessDom::new());
        let run_loop = Rc::new(RunLoop::new());
        let host = Host::new(dom.clone(), Rc::new(SimulatedPlatform::new(run_loop.clone())), run_loop.clone());
        Fixture {
            dom,
            run_loop,
            ctx: Context::new(host, "test_player"),
        }
    }

    fn opts(value: Value) -> Options {
        crate::options::to_options(value).unwrap()
    }

    fn container(ctx: &Context) -> Rc<Component> {
        Component::new(ctx, Options::new(), Box::new(Container)).unwrap()
    }

    struct Labelled {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Widget for Labelled {
        fn name(&self) -> &str {
            self.label
        }

        fn css_class(&self) -> Option<String> {
            Some(format!("kino-{}", self.label.to_lowercase()))
        }

        fn initial_state(&self) -> StateMap {
            opts(json!({"count": 0}))
        }

        fn handle_state_changed(&self, _component: &Component, changes: &Changes) {
            for key in changes.keys() {
                self.log.borrow_mut().push(format!("{}:changed:{}", self.label, key));
            }
        }

        fn dispose(&self, _component: &Component) {
            self.log.borrow_mut().push(format!("{}:dispose", self.label));
        }
    }

    #[test]
    fn test_ids_and_element() {
        let f = fixture();
        let component = container(&f.ctx);
        assert!(component.id().starts_with("test_player_component_"));
        assert_eq!(component.name(), "Component");
        let el = component.el().unwrap();
        assert_eq!(f.dom.tag_name(el).as_deref(), Some("div"));

        let bare = Component::new(&f.ctx, opts(json!({"createEl": false, "id": "x"})), Box::new(Container)).unwrap();
        assert_eq!(bare.id(), "x");
        assert!(bare.el().is_none());
    }

    #[test]
    fn test_add_child_positions_match_dom() {
        let f = fixture();
        let parent = container(&f.ctx);
        let a = parent.add_child(container(&f.ctx), Options::new(), None).unwrap();
        let c = parent.add_child(container(&f.ctx), Options::new(), None).unwrap();
        let b = parent.add_child(container(&f.ctx), Options::new(), Some(1)).unwrap();

        let ids: Vec<_> = parent.children().iter().map(|c| c.el().unwrap()).collect();
        assert_eq!(ids, vec![a.el().unwrap(), b.el().unwrap(), c.el().unwrap()]);
        assert_eq!(f.dom.children(parent.el().unwrap()), ids);
        assert!(Rc::ptr_eq(&b.parent().unwrap(), &parent));
    }

    #[test]
    fn test_unknown_child_fails_fast() {
        let f = fixture();
        let parent = container(&f.ctx);
        let err = parent.add_child("NoSuchWidget", Options::new(), None).unwrap_err();
        assert!(matches!(err, Error::UnknownComponent(_)));

        let err = Component::new(&f.ctx, opts(json!({"children": ["NoSuchWidget"]})), Box::new(Container)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_declarative_children() {
        let f = fixture();
        let parent = Component::new(
            &f.ctx,
            opts(json!({
                "children": ["component", {"name": "Extra", "componentClass": "Component", "id": "extra"}],
                "Extra": {"id": "overridden"}
            })),
            Box::new(Container),
        )
        .unwrap();

        assert_eq!(parent.child_count(), 2);
        assert!(parent.get_child("Component").is_some());
        assert!(parent.get_child_by_id("overridden").is_some());

        let skipped = Component::new(
            &f.ctx,
            opts(json!({"children": {"Component": {}}, "Component": false})),
            Box::new(Container),
        )
        .unwrap();
        assert_eq!(skipped.child_count(), 0);
    }

    #[test]
    fn test_remove_child_keeps_component_alive() {
        let f = fixture();
        let first = container(&f.ctx);
        let second = container(&f.ctx);
        let child = first.add_child(container(&f.ctx), Options::new(), None).unwrap();

        assert!(first.remove_child(&child));
        assert!(!child.is_disposed());
        assert!(child.parent().is_none());
        assert!(f.dom.parent(child.el().unwrap()).is_none());

        second.add_child(&child, Options::new(), None).unwrap();
        assert_eq!(f.dom.parent(child.el().unwrap()), second.el());
        assert!(!first.remove_child(&child));
    }

    #[test]
    fn test_cannot_adopt_ancestor() {
        let f = fixture();
        let root = container(&f.ctx);
        let child = root.add_child(container(&f.ctx), Options::new(), None).unwrap();
        assert!(child.add_child(&root, Options::new(), None).is_err());
        assert!(root.add_child(&root, Options::new(), None).is_err());
    }

    #[test]
    fn test_dispose_children_first_and_idempotent() {
        let f = fixture();
        let log = Rc::new(RefCell::new(Vec::new()));
        let widget = |label| Box::new(Labelled { label, log: log.clone() });
        let parent = Component::new(&f.ctx, Options::new(), widget("Parent")).unwrap();
        for label in ["A", "B", "C"] {
            let child = Component::new(&f.ctx, Options::new(), widget(label)).unwrap();
            parent.add_child(child, Options::new(), None).unwrap();
        }
        let events = log.clone();
        parent.on(
            DISPOSE,
            &Listener::new(move |_| events.borrow_mut().push("Parent:event".to_string())),
        );
        let parent_el = parent.el().unwrap();

        parent.dispose();
        parent.dispose();

        assert_eq!(
            *log.borrow(),
            vec!["Parent:event", "C:dispose", "B:dispose", "A:dispose", "Parent:dispose"]
        );
        assert_eq!(parent.child_count(), 0);
        assert!(parent.el().is_none());
        assert!(!f.dom.contains(parent_el));
        assert!(f.dom.is_empty());
    }

    #[test]
    fn test_dispose_detaches_from_parent() {
        let f = fixture();
        let root = container(&f.ctx);
        let child = root.add_child(container(&f.ctx), Options::new(), None).unwrap();
        child.dispose();
        assert_eq!(root.child_count(), 0);
        assert!(f.dom.children(root.el().unwrap()).is_empty());
        assert!(root.add_child(&child, Options::new(), None).is_err());
    }

    #[test]
    fn test_ready_queue_order_and_immediate() {
        let f = fixture();
        let component = container(&f.ctx);
        let log = Rc::new(RefCell::new(Vec::new()));
        for label in ["first", "second"] {
            let log = log.clone();
            component.ready(move |_| log.borrow_mut().push(label));
        }
        let on_ready = log.clone();
        component.on(READY, &Listener::new(move |_| on_ready.borrow_mut().push("event")));
        assert!(log.borrow().is_empty());

        f.run_loop.advance(1);
        assert!(component.is_ready());
        assert_eq!(*log.borrow(), vec!["first", "second", "event"]);

        let late = log.clone();
        component.ready(move |_| late.borrow_mut().push("late"));
        assert_eq!(log.borrow().last(), Some(&"late"));
    }

    #[test]
    fn test_dispose_cancels_pending_work() {
        let f = fixture();
        let component = container(&f.ctx);
        let fired = Rc::new(Cell::new(0));
        let ready = fired.clone();
        component.ready(move |_| ready.set(ready.get() + 1));
        let timer = fired.clone();
        component.set_timeout(50, move || timer.set(timer.get() + 1)).unwrap();

        component.dispose();
        f.run_loop.run_until_idle();
        assert_eq!(fired.get(), 0);
        assert_eq!(f.run_loop.pending(), 0);
        assert!(component.set_timeout(1, || {}).is_err());
    }

    #[test]
    fn test_events_bubble_to_parent() {
        let f = fixture();
        let root = container(&f.ctx);
        let child = root.add_child(container(&f.ctx), Options::new(), None).unwrap();
        let heard = Rc::new(Cell::new(0));
        let counter = heard.clone();
        root.on("x", &Listener::new(move |_| counter.set(counter.get() + 1)));

        child.trigger("x");
        child.trigger(Event::new("x").non_bubbling());
        assert_eq!(heard.get(), 1);
    }

    #[test]
    fn test_state_hook_and_initial_state() {
        let f = fixture();
        let log = Rc::new(RefCell::new(Vec::new()));
        let component = Component::new(
            &f.ctx,
            Options::new(),
            Box::new(Labelled {
                label: "Counter",
                log: log.clone(),
            }),
        )
        .unwrap();

        assert_eq!(component.state_value("count"), Some(json!(0)));
        component.set_state(json!({"count": 0}));
        component.set_state(json!({"count": 1}));
        assert_eq!(*log.borrow(), vec!["Counter:changed:count"]);
        assert!(component.has_class("kino-counter"));
    }

    #[test]
    fn test_show_hide() {
        let f = fixture();
        let component = container(&f.ctx);
        component.hide();
        assert!(component.is_hidden());
        component.show();
        assert!(!component.is_hidden());
    }
}
