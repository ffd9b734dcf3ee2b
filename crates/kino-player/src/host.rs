//! Host facilities shared by a player and its components

use crate::dom::Dom;
use crate::platform::Platform;
use crate::player::Player;
use crate::runloop::RunLoop;
use std::cell::OnceCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Rendering, browser and scheduling collaborators
#[derive(Clone)]
pub struct Host {
    pub dom: Rc<dyn Dom>,
    pub platform: Rc<dyn Platform>,
    pub run_loop: Rc<RunLoop>,
}

impl Host {
    pub fn new(dom: Rc<dyn Dom>, platform: Rc<dyn Platform>, run_loop: Rc<RunLoop>) -> Self {
        Self {
            dom,
            platform,
            run_loop,
        }
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("capabilities", self.platform.capabilities())
            .field("run_loop", &self.run_loop)
            .finish()
    }
}

/// What every component of one player shares
#[derive(Clone)]
pub struct Context {
    host: Host,
    player_id: String,
    player: Rc<OnceCell<Weak<Player>>>,
}

impl Context {
    pub fn new(host: Host, player_id: impl Into<String>) -> Self {
        Self {
            host,
            player_id: player_id.into(),
            player: Rc::new(OnceCell::new()),
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn dom(&self) -> &dyn Dom {
        self.host.dom.as_ref()
    }

    pub fn platform(&self) -> &dyn Platform {
        self.host.platform.as_ref()
    }

    pub fn run_loop(&self) -> &Rc<RunLoop> {
        &self.host.run_loop
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// The owning player, once it has finished binding
    pub fn player(&self) -> Option<Rc<Player>> {
        self.player.get().and_then(Weak::upgrade)
    }

    /// Bind the owning player. Only the first call has an effect.
    pub(crate) fn bind_player(&self, player: &Rc<Player>) -> bool {
        self.player.set(Rc::downgrade(player)).is_ok()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("player_id", &self.player_id)
            .field("bound", &self.player.get().is_some())
            .finish()
    }
}
