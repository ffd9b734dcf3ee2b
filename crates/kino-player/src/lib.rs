//! Kino Player - Media Player Framework Core
//!
//! This crate provides the embeddable core of a media player:
//! - Event dispatch with bubbling, one-shot listeners and cross-object bindings
//! - Stateful objects with change notification
//! - A component tree with declarative children and a ready/dispose lifecycle
//! - Pluggable playback techs selected per source, with a native `Html5` tech
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Kino Player                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │    Events    │  │   Stateful   │  │   Options    │          │
//! │  │  (Evented)   │  │  (StateBag)  │  │   (merge)    │          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘          │
//! │         └─────────────────┼─────────────────┘                   │
//! │                    ┌──────┴──────┐      ┌──────────────┐        │
//! │                    │  Component  │◄─────│  Component   │        │
//! │                    │    Tree     │      │   Registry   │        │
//! │                    └──────┬──────┘      └──────────────┘        │
//! │                    ┌──────┴──────┐      ┌──────────────┐        │
//! │                    │   Player    │◄─────│     Tech     │        │
//! │                    │ (tech swap) │      │   Registry   │        │
//! │                    └──────┬──────┘      └──────────────┘        │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Html5 Tech │                              │
//! │                    └──────┬──────┘                              │
//! ├───────────────────────────┼─────────────────────────────────────┤
//! │   Host:  Dom  ·  Platform / MediaElement  ·  RunLoop            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs on one thread. The host supplies the element tree, the
//! media backend and a timer queue; [`simulated::Headless`] provides all
//! three in memory.

pub mod component;
pub mod dom;
pub mod error;
pub mod events;
pub mod host;
pub mod media_error;
pub mod options;
pub mod platform;
pub mod player;
pub mod registry;
pub mod runloop;
pub mod simulated;
pub mod source;
pub mod stateful;
pub mod tech;
pub mod tracks;

pub use component::{ChildSpec, Component, Container, Widget};
pub use dom::{Dom, HeadlessDom, NodeId};
pub use error::{Error, Result};
pub use events::{Event, EventRegistry, EventTypes, Evented, Listener};
pub use host::{Context, Host};
pub use media_error::{MediaError, MediaErrorCode};
pub use options::{merge_options, Options, PlayerConfig, Preload};
pub use platform::{BrowserCapabilities, MediaElement, Platform};
pub use player::Player;
pub use registry::{
    component_names, get_component, register_component, unregister_component, ComponentRegistry,
};
pub use runloop::{RunLoop, TimerId};
pub use source::{MimeType, SourceDescriptor, Sources};
pub use stateful::{Changes, StateBag, StateMap, StateUpdate, Stateful};
pub use tech::{
    get_tech, register_tech, select_source, tech_names, unregister_tech, CanPlay, Tech,
    TechFactory, TechFeatures, TechOptions,
};
pub use tracks::{Track, TrackKind, TrackList};

/// Commonly used items
pub mod prelude {
    pub use crate::component::{Component, Widget};
    pub use crate::events::{Event, Evented, Listener};
    pub use crate::options::Options;
    pub use crate::player::Player;
    pub use crate::stateful::Stateful;
    pub use crate::tech::{CanPlay, Tech, TechFactory};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version and registered techs
pub fn init() {
    tracing::info!(version = VERSION, techs = ?tech_names(), "Kino Player initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[cfg(feature = "html5")]
    #[test]
    fn test_html5_is_builtin() {
        assert!(tech_names().iter().any(|name| name == "Html5"));
    }
}
