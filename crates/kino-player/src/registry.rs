//! Process-wide component registry
//!
//! Maps a component name to a factory producing its [`Widget`]. Names are
//! stored title-cased, so `controlBar` and `ControlBar` resolve alike.
//! Built-in names cannot be re-registered; replacing a user registration
//! is allowed and logged.

use crate::component::{Container, Widget};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use tracing::{debug, warn};

/// Produces a fresh widget per component instance
pub type WidgetFactory = Arc<dyn Fn() -> Box<dyn Widget> + Send + Sync>;

/// Name of the generic container component
pub const BASE_COMPONENT: &str = "Component";

/// First letter upper-cased
pub fn to_title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Component name → factory
pub struct ComponentRegistry {
    factories: HashMap<String, WidgetFactory>,
    builtins: HashSet<String>,
}

impl ComponentRegistry {
    /// An empty registry without built-ins
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
            builtins: HashSet::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.factories.insert(
            BASE_COMPONENT.to_string(),
            Arc::new(|| Box::new(Container::default()) as Box<dyn Widget>),
        );
        registry.builtins.insert(BASE_COMPONENT.to_string());
        registry
    }

    pub fn register(&mut self, name: &str, factory: WidgetFactory) -> Result<()> {
        let name = to_title_case(name);
        if name.is_empty() {
            return Err(Error::InvalidOptions("component name must not be empty".to_string()));
        }
        if self.builtins.contains(&name) {
            return Err(Error::BuiltinConflict {
                kind: "component",
                name,
            });
        }
        if self.factories.insert(name.clone(), factory).is_some() {
            warn!(component = %name, "Replacing registered component");
        } else {
            debug!(component = %name, "Component registered");
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<WidgetFactory> {
        self.factories
            .get(name)
            .or_else(|| self.factories.get(&to_title_case(name)))
            .cloned()
    }

    /// Remove a user registration. Built-ins stay.
    pub fn unregister(&mut self, name: &str) -> bool {
        let name = to_title_case(name);
        if self.builtins.contains(&name) {
            return false;
        }
        self.factories.remove(&name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

static COMPONENTS: LazyLock<RwLock<ComponentRegistry>> =
    LazyLock::new(|| RwLock::new(ComponentRegistry::with_builtins()));

/// Register a component kind globally
pub fn register_component<F>(name: &str, factory: F) -> Result<()>
where
    F: Fn() -> Box<dyn Widget> + Send + Sync + 'static,
{
    COMPONENTS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(name, Arc::new(factory))
}

pub fn get_component(name: &str) -> Option<WidgetFactory> {
    COMPONENTS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
}

pub fn unregister_component(name: &str) -> bool {
    COMPONENTS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .unregister(name)
}

pub fn component_names() -> Vec<String> {
    COMPONENTS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .names()
}

/// Drop every user registration
pub fn reset_components() {
    *COMPONENTS.write().unwrap_or_else(PoisonError::into_inner) = ComponentRegistry::with_builtins();
}
