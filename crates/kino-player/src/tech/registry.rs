//! Process-wide tech registry
//!
//! Registration order is probing precedence. Built-in techs cannot be
//! replaced.

use super::TechFactory;
use crate::error::{Error, Result};
use crate::registry::to_title_case;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use tracing::{debug, warn};

/// Tech name → factory, in registration order
pub struct TechRegistry {
    order: Vec<String>,
    techs: HashMap<String, Arc<dyn TechFactory>>,
    builtins: HashSet<String>,
}

impl TechRegistry {
    pub fn empty() -> Self {
        Self {
            order: Vec::new(),
            techs: HashMap::new(),
            builtins: HashSet::new(),
        }
    }

    pub fn with_builtins() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();
        #[cfg(feature = "html5")]
        {
            let html5: Arc<dyn TechFactory> = Arc::new(super::html5::Html5Factory);
            let name = html5.name().to_string();
            registry.order.push(name.clone());
            registry.techs.insert(name.clone(), html5);
            registry.builtins.insert(name);
        }
        registry
    }

    /// Register a tech after all existing ones. Replacing a user tech keeps
    /// its position.
    pub fn register(&mut self, tech: Arc<dyn TechFactory>) -> Result<()> {
        let name = to_title_case(tech.name());
        if name.is_empty() {
            return Err(Error::InvalidOptions("tech name must not be empty".to_string()));
        }
        if self.builtins.contains(&name) {
            return Err(Error::BuiltinConflict { kind: "tech", name });
        }
        if self.techs.insert(name.clone(), tech).is_some() {
            warn!(tech = %name, "Replacing registered tech");
        } else {
            debug!(tech = %name, "Tech registered");
            self.order.push(name);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TechFactory>> {
        self.techs
            .get(name)
            .or_else(|| self.techs.get(&to_title_case(name)))
            .cloned()
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let name = to_title_case(name);
        if self.builtins.contains(&name) || self.techs.remove(&name).is_none() {
            return false;
        }
        self.order.retain(|n| *n != name);
        true
    }

    /// Names in precedence order
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Resolve `names` in the given order; an empty list means every tech
    /// in registration order. Unknown names fail.
    pub fn ordered(&self, names: &[String]) -> Result<Vec<Arc<dyn TechFactory>>> {
        if names.is_empty() {
            return Ok(self
                .order
                .iter()
                .filter_map(|name| self.techs.get(name).cloned())
                .collect());
        }
        names
            .iter()
            .map(|name| self.get(name).ok_or_else(|| Error::UnknownTech(name.clone())))
            .collect()
    }
}

impl Default for TechRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

static TECHS: LazyLock<RwLock<TechRegistry>> = LazyLock::new(|| RwLock::new(TechRegistry::with_builtins()));

pub fn register_tech(tech: Arc<dyn TechFactory>) -> Result<()> {
    TECHS.write().unwrap_or_else(PoisonError::into_inner).register(tech)
}

pub fn get_tech(name: &str) -> Option<Arc<dyn TechFactory>> {
    TECHS.read().unwrap_or_else(PoisonError::into_inner).get(name)
}

pub fn unregister_tech(name: &str) -> bool {
    TECHS.write().unwrap_or_else(PoisonError::into_inner).unregister(name)
}

pub fn tech_names() -> Vec<String> {
    TECHS.read().unwrap_or_else(PoisonError::into_inner).names()
}

/// Resolve a tech order against the global registry
pub fn ordered_techs(names: &[String]) -> Result<Vec<Arc<dyn TechFactory>>> {
    TECHS.read().unwrap_or_else(PoisonError::into_inner).ordered(names)
}

/// Drop every user registration
pub fn reset_techs() {
    *TECHS.write().unwrap_or_else(PoisonError::into_inner) = TechRegistry::with_builtins();
}
