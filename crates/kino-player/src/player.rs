//! Player
//!
//! The root component. It owns at most one current tech, mediates the
//! public playback API onto it and re-triggers the tech's media events on
//! itself so widgets never talk to the tech directly.
//!
//! Source changes follow a swap protocol:
//!
//! ```text
//!  src(b) ─► select tech ─► create tech B (A stays current)
//!                               │ B's events are buffered
//!                 ┌─────────────┴─────────────┐
//!             B ready                     B error
//!                 │                           │
//!   A unbound + disposed, B current      B disposed, A stays,
//!   forwarding bound, buffer replayed    player `error`
//!                 └─────────────┬─────────────┘
//!                         next queued src
//! ```

use crate::component::{Component, Widget};
use crate::dom::{self, Attributes, ElementProps, NodeId};
use crate::error::{Error, Result};
use crate::events::{Event, EventRegistry, Evented, Listener, DISPOSE};
use crate::host::{Context, Host};
use crate::media_error::{MediaError, MediaErrorCode};
use crate::options::{bool_option, Options, PlayerConfig};
use crate::platform::Platform;
use crate::source::{filter_sources, SourceDescriptor, Sources};
use crate::tech::registry::ordered_techs;
use crate::tech::{forwarded_events, select_source, Tech, TechFactory, TechFeatures, TechOptions};
use crate::tracks::{Track, TrackKind};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub const PAUSED_CLASS: &str = "kino-paused";
pub const PLAYING_CLASS: &str = "kino-playing";
pub const ENDED_CLASS: &str = "kino-ended";
pub const ERROR_CLASS: &str = "kino-error";
pub const FULLSCREEN_CLASS: &str = "kino-fullscreen";

/// Markup of the player root
struct PlayerWidget;

impl Widget for PlayerWidget {
    fn name(&self) -> &str {
        "Player"
    }

    fn create_el(&self, component: &Component) -> NodeId {
        let props = ElementProps {
            class_name: Some(format!("kino-player {}", PAUSED_CLASS)),
            id: Some(component.id().to_string()),
            tab_index: Some(-1),
            ..Default::default()
        };
        let mut attributes = Attributes::new();
        attributes.insert("role".to_string(), "region".to_string());
        attributes.insert("aria-label".to_string(), "Video Player".to_string());
        dom::create_el(component.dom(), "div", &props, &attributes)
    }

    fn auto_ready(&self) -> bool {
        false
    }
}

/// A tech that was created but has not reported ready yet
struct PendingTech {
    generation: u64,
    tech: Rc<dyn Tech>,
    source: SourceDescriptor,
    listener: Listener,
    buffered: Rc<RefCell<Vec<Event>>>,
}

/// Values that outlive a tech
#[derive(Debug, Clone)]
struct Cache {
    source: Option<SourceDescriptor>,
    current_time: f64,
    volume: f64,
    muted: bool,
    playback_rate: f64,
}

/// One embedded player instance
pub struct Player {
    component: Rc<Component>,
    config: RefCell<PlayerConfig>,
    techs: Vec<Arc<dyn TechFactory>>,
    current: RefCell<Option<Rc<dyn Tech>>>,
    loading: RefCell<Option<PendingTech>>,
    queue: RefCell<VecDeque<Sources>>,
    generation: Cell<u64>,
    forwarder: Listener,
    cache: RefCell<Cache>,
    error: RefCell<Option<MediaError>>,
    pending_play: Cell<bool>,
    fullscreen: Cell<bool>,
    disposed: Cell<bool>,
    self_ref: Weak<Player>,
}

impl Player {
    /// Create a player on `host`.
    ///
    /// Invalid option shapes, unknown tech names in `techOrder` and unknown
    /// declarative children fail here. Initial `sources` start loading
    /// right away.
    pub fn new(host: Host, options: Options) -> Result<Rc<Player>> {
        let config = PlayerConfig::from_options(&options)?;
        let techs = ordered_techs(&config.tech_order)?;
        if techs.is_empty() {
            return Err(Error::InvalidOptions("no techs available".to_string()));
        }

        let player_id = config
            .id
            .clone()
            .unwrap_or_else(|| format!("kino_player_{}", Uuid::new_v4().simple()));
        let ctx = Context::new(host, player_id.clone());

        let mut component_options = options.clone();
        component_options.insert("id".to_string(), Value::String(player_id.clone()));
        component_options.insert("initChildren".to_string(), Value::Bool(false));
        let component = Component::new(&ctx, component_options, Box::new(PlayerWidget))?;

        let cache = Cache {
            source: None,
            current_time: 0.0,
            volume: config.volume,
            muted: config.muted,
            playback_rate: config.playback_rate,
        };
        let controls = config.controls;

        let player = Rc::new_cyclic(|weak: &Weak<Player>| {
            let forward_to = weak.clone();
            Player {
                component,
                config: RefCell::new(config),
                techs,
                current: RefCell::new(None),
                loading: RefCell::new(None),
                queue: RefCell::new(VecDeque::new()),
                generation: Cell::new(0),
                forwarder: Listener::new(move |event| {
                    if let Some(player) = forward_to.upgrade() {
                        player.handle_tech_event(event);
                    }
                }),
                cache: RefCell::new(cache),
                error: RefCell::new(None),
                pending_play: Cell::new(false),
                fullscreen: Cell::new(false),
                disposed: Cell::new(false),
                self_ref: weak.clone(),
            }
        });
        ctx.bind_player(&player);

        if bool_option(&options, "initChildren", true) {
            if let Err(e) = player.component.init_children() {
                player.dispose();
                return Err(e);
            }
        }
        player.set_controls(controls);

        info!(
            player_id = %player_id,
            techs = ?player.techs.iter().map(|t| t.name().to_string()).collect::<Vec<_>>(),
            "Player created"
        );

        let sources = player.config.borrow().sources.clone();
        if !sources.is_empty() {
            player.src(sources);
        }
        Ok(player)
    }

    pub fn id(&self) -> &str {
        self.component.id()
    }

    /// The root component (element, children, state)
    pub fn component(&self) -> &Rc<Component> {
        &self.component
    }

    pub fn el(&self) -> Option<NodeId> {
        self.component.el()
    }

    pub fn config(&self) -> PlayerConfig {
        self.config.borrow().clone()
    }

    fn platform(&self) -> &dyn Platform {
        self.component.context().platform()
    }

    fn tech(&self) -> Option<Rc<dyn Tech>> {
        self.current.borrow().clone()
    }

    /// Change the source. While a tech is still loading the request waits
    /// its turn.
    #[instrument(skip(self, sources), fields(player_id = %self.id()))]
    pub fn src(&self, sources: impl Into<Sources>) {
        if self.disposed.get() {
            warn!("src() on a disposed player");
            return;
        }
        let sources = filter_sources(&sources.into());

        if self.loading.borrow().is_some() {
            debug!(pending = self.queue.borrow().len() + 1, "Source change queued");
            self.queue.borrow_mut().push_back(sources);
            return;
        }
        self.load_sources(sources);
    }

    fn load_sources(&self, sources: Sources) {
        let Some(selection) = select_source(&sources, &self.techs, self.platform()) else {
            warn!(sources = sources.len(), "No compatible source");
            self.report_unsupported();
            return;
        };

        info!(
            tech = selection.tech.name(),
            src = %selection.source.src,
            support = %selection.support,
            "Loading source"
        );

        let options = {
            let config = self.config.borrow();
            let cache = self.cache.borrow();
            TechOptions {
                autoplay: false,
                volume: cache.volume,
                muted: cache.muted,
                playback_rate: cache.playback_rate,
                ..TechOptions::from(&*config)
            }
            .with_source(selection.source.clone())
        };

        match selection.tech.create(self.component.context(), options) {
            Ok(tech) => self.begin_swap(tech, selection.source),
            Err(e) => {
                error!(tech = selection.tech.name(), error = %e, "Tech creation failed");
                self.set_error(MediaError::custom(e.to_string()));
            }
        }
    }

    fn begin_swap(&self, tech: Rc<dyn Tech>, source: SourceDescriptor) {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let buffered = Rc::new(RefCell::new(Vec::new()));
        let weak = self.self_ref.clone();
        let buffer = buffered.clone();
        let listener = Listener::new(move |event| {
            if event.event_type() == "error" {
                if let Some(player) = weak.upgrade() {
                    player.abort_loading(generation);
                }
            } else {
                buffer.borrow_mut().push(event.clone());
            }
        });
        tech.component().on(forwarded_events(), &listener);

        let weak = self.self_ref.clone();
        tech.component().ready(move |_| {
            if let Some(player) = weak.upgrade() {
                player.promote(generation);
            }
        });

        if let (Some(player_el), Some(tech_el)) = (self.el(), tech.component().el()) {
            let dom = self.component.dom();
            let first = dom.children(player_el).first().copied();
            dom.insert_child(player_el, tech_el, first);
        }

        *self.loading.borrow_mut() = Some(PendingTech {
            generation,
            tech,
            source,
            listener,
            buffered,
        });
    }

    fn take_pending(&self, generation: u64) -> Option<PendingTech> {
        let mut loading = self.loading.borrow_mut();
        if loading.as_ref().is_some_and(|pending| pending.generation == generation) {
            loading.take()
        } else {
            None
        }
    }

    fn promote(&self, generation: u64) {
        let Some(pending) = self.take_pending(generation) else {
            return;
        };
        pending.tech.component().off(forwarded_events(), &pending.listener);

        let old = self.current.replace(Some(pending.tech.clone()));
        if let Some(old) = old {
            self.unbind_tech(&old);
            old.dispose();
            debug!(tech = old.tech_name(), "Previous tech disposed");
        }

        self.cache.borrow_mut().source = Some(pending.source.clone());
        self.component
            .listen_to(pending.tech.component(), forwarded_events(), &self.forwarder);

        info!(tech = pending.tech.tech_name(), src = %pending.source.src, "Tech ready");

        let buffered: Vec<Event> = pending.buffered.borrow_mut().drain(..).collect();
        for event in &buffered {
            self.handle_tech_event(event);
        }

        if !self.component.is_ready() {
            self.component.trigger_ready();
        }

        let autoplay = self.config.borrow().autoplay;
        if self.pending_play.replace(false) || autoplay {
            pending.tech.play();
        }

        self.process_queue();
    }

    fn abort_loading(&self, generation: u64) {
        let Some(pending) = self.take_pending(generation) else {
            return;
        };
        pending.tech.component().off(forwarded_events(), &pending.listener);

        let error = pending
            .tech
            .error()
            .unwrap_or_else(|| MediaError::new(MediaErrorCode::SrcNotSupported));
        warn!(tech = pending.tech.tech_name(), src = %pending.source.src, "Tech failed before ready");
        pending.tech.dispose();

        self.set_error(error);
        self.process_queue();
    }

    fn process_queue(&self) {
        while self.loading.borrow().is_none() && !self.disposed.get() {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(sources) => self.load_sources(sources),
                None => break,
            }
        }
    }

    fn unbind_tech(&self, tech: &Rc<dyn Tech>) {
        let target: Rc<dyn Evented> = tech.component().clone();
        self.component.events().release_bindings_to(&target);
    }

    /// The asynchronous "no compatible source" error
    fn report_unsupported(&self) {
        let weak = self.self_ref.clone();
        let message = self.config.borrow().not_supported_message.clone();
        let scheduled = self.component.set_timeout(0, move || {
            if let Some(player) = weak.upgrade() {
                player.set_error(MediaError::with_message(MediaErrorCode::SrcNotSupported, message));
            }
        });
        if let Err(e) = scheduled {
            warn!(error = %e, "Could not report unsupported source");
        }
    }

    fn handle_tech_event(&self, event: &Event) {
        let component = &self.component;
        match event.event_type() {
            "loadstart" => {
                self.clear_error();
                component.remove_class(ENDED_CLASS);
            }
            "play" | "playing" => {
                component.remove_class(ENDED_CLASS);
                component.remove_class(PAUSED_CLASS);
                component.add_class(PLAYING_CLASS);
            }
            "pause" => {
                component.remove_class(PLAYING_CLASS);
                component.add_class(PAUSED_CLASS);
            }
            "ended" => {
                component.remove_class(PLAYING_CLASS);
                component.add_class(PAUSED_CLASS);
                component.add_class(ENDED_CLASS);
            }
            "timeupdate" | "seeked" => {
                if let Some(tech) = self.tech() {
                    self.cache.borrow_mut().current_time = tech.current_time();
                }
            }
            "volumechange" => {
                if let Some(tech) = self.tech() {
                    let mut cache = self.cache.borrow_mut();
                    cache.volume = tech.volume();
                    cache.muted = tech.muted();
                }
            }
            "ratechange" => {
                if let Some(tech) = self.tech() {
                    self.cache.borrow_mut().playback_rate = tech.playback_rate();
                }
            }
            "error" => {
                let error = self
                    .tech()
                    .and_then(|tech| tech.error())
                    .unwrap_or_else(|| MediaError::custom("Unknown media error"));
                self.set_error(error);
                return;
            }
            _ => {}
        }

        let forwarded = Event::new(event.event_type()).with_data(event.data().clone());
        self.dispatch(&forwarded);
    }

    /// Start playback; before any tech is ready the request is kept
    pub fn play(&self) {
        match self.tech() {
            Some(tech) => tech.play(),
            None => self.pending_play.set(true),
        }
    }

    pub fn pause(&self) {
        match self.tech() {
            Some(tech) => tech.pause(),
            None => self.pending_play.set(false),
        }
    }

    pub fn paused(&self) -> bool {
        self.tech().map_or(!self.pending_play.get(), |tech| tech.paused())
    }

    pub fn ended(&self) -> bool {
        self.tech().is_some_and(|tech| tech.ended())
    }

    pub fn current_time(&self) -> f64 {
        match self.tech() {
            Some(tech) => tech.current_time(),
            None => self.cache.borrow().current_time,
        }
    }

    pub fn set_current_time(&self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        let seconds = seconds.max(0.0);
        self.cache.borrow_mut().current_time = seconds;
        if let Some(tech) = self.tech() {
            tech.set_current_time(seconds);
        }
    }

    /// `NaN` until metadata is known
    pub fn duration(&self) -> f64 {
        self.tech().map_or(f64::NAN, |tech| tech.duration())
    }

    pub fn volume(&self) -> f64 {
        match self.tech() {
            Some(tech) => tech.volume(),
            None => self.cache.borrow().volume,
        }
    }

    /// Set the volume, clamped to 0..1
    pub fn set_volume(&self, volume: f64) {
        if volume.is_nan() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.cache.borrow_mut().volume = volume;
        if let Some(tech) = self.tech() {
            tech.set_volume(volume);
        }
    }

    pub fn muted(&self) -> bool {
        match self.tech() {
            Some(tech) => tech.muted(),
            None => self.cache.borrow().muted,
        }
    }

    pub fn set_muted(&self, muted: bool) {
        self.cache.borrow_mut().muted = muted;
        if let Some(tech) = self.tech() {
            tech.set_muted(muted);
        }
    }

    pub fn playback_rate(&self) -> f64 {
        match self.tech() {
            Some(tech) => tech.playback_rate(),
            None => self.cache.borrow().playback_rate,
        }
    }

    /// Set the rate; non-positive rates are ignored
    pub fn set_playback_rate(&self, rate: f64) {
        if rate.is_nan() || rate <= 0.0 {
            return;
        }
        self.cache.borrow_mut().playback_rate = rate;
        if let Some(tech) = self.tech() {
            if tech.features().playback_rate {
                tech.set_playback_rate(rate);
            }
        }
    }

    /// URL the current tech is playing
    pub fn current_src(&self) -> String {
        match self.tech() {
            Some(tech) => tech.current_src(),
            None => String::new(),
        }
    }

    /// Descriptor of the promoted source
    pub fn current_source(&self) -> Option<SourceDescriptor> {
        self.cache.borrow().source.clone()
    }

    pub fn tech_name(&self) -> Option<String> {
        self.tech().map(|tech| tech.tech_name().to_string())
    }

    pub fn tech_features(&self) -> Option<TechFeatures> {
        self.tech().map(|tech| tech.features())
    }

    /// Whether a new tech is waiting to become ready
    pub fn is_switching(&self) -> bool {
        self.loading.borrow().is_some()
    }

    /// Scoped access to the current tech
    pub fn with_tech<R>(&self, f: impl FnOnce(&dyn Tech) -> R) -> Option<R> {
        let tech = self.tech()?;
        Some(f(tech.as_ref()))
    }

    pub fn tracks(&self, kind: TrackKind) -> Vec<Track> {
        self.tech()
            .map(|tech| tech.tracks(kind).tracks())
            .unwrap_or_default()
    }

    pub fn text_tracks(&self) -> Vec<Track> {
        self.tracks(TrackKind::Text)
    }

    /// Add a text track to the current tech
    pub fn add_text_track(&self, kind: &str, label: &str, language: &str) -> Option<Track> {
        self.with_tech(|tech| tech.add_text_track(kind, label, language))
    }

    pub fn error(&self) -> Option<MediaError> {
        self.error.borrow().clone()
    }

    /// Record a playback error and announce it with an `error` event
    pub fn set_error(&self, error: impl Into<MediaError>) {
        if self.disposed.get() {
            return;
        }
        let error = error.into();
        error!(
            player_id = %self.id(),
            code = error.code.code(),
            message = %error.message,
            "Playback error"
        );
        *self.error.borrow_mut() = Some(error.clone());
        self.component.add_class(ERROR_CLASS);
        self.trigger(Event::new("error").with_data(error.to_value()));
    }

    pub fn clear_error(&self) {
        if self.error.borrow_mut().take().is_some() {
            self.component.remove_class(ERROR_CLASS);
        }
    }

    pub fn controls(&self) -> bool {
        self.config.borrow().controls
    }

    pub fn set_controls(&self, controls: bool) {
        self.config.borrow_mut().controls = controls;
        self.component.toggle_class("kino-controls-enabled", Some(controls));
        self.component.toggle_class("kino-controls-disabled", Some(!controls));
        if let Some(tech) = self.tech() {
            tech.set_controls(controls);
        }
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.get()
    }

    pub fn request_fullscreen(&self) {
        self.set_fullscreen(true);
    }

    pub fn exit_fullscreen(&self) {
        self.set_fullscreen(false);
    }

    fn set_fullscreen(&self, fullscreen: bool) {
        if self.fullscreen.get() == fullscreen {
            return;
        }
        if let Some(tech) = self.tech() {
            if tech.supports_full_screen() {
                if fullscreen {
                    tech.enter_full_screen();
                } else {
                    tech.exit_full_screen();
                }
            }
        }
        self.fullscreen.set(fullscreen);
        self.component.toggle_class(FULLSCREEN_CLASS, Some(fullscreen));
        self.trigger(Event::new("fullscreenchange"));
    }

    /// Add a child under the player root
    pub fn add_child(
        &self,
        child: impl Into<crate::component::ChildSpec>,
        options: Options,
        index: Option<usize>,
    ) -> Result<Rc<Component>> {
        self.component.add_child(child, options, index)
    }

    pub fn is_ready(&self) -> bool {
        self.component.is_ready()
    }

    /// Run `callback` once the first tech is ready
    pub fn ready(&self, callback: impl FnOnce(&Rc<Player>) + 'static) {
        let weak = self.self_ref.clone();
        self.component.ready(move |_| {
            if let Some(player) = weak.upgrade() {
                callback(&player);
            }
        });
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Tear down techs and the component tree. `dispose` fires once;
    /// repeated calls do nothing.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }

        self.dispatch(&Event::new(DISPOSE).non_bubbling());
        self.off_type(DISPOSE);

        self.queue.borrow_mut().clear();
        let pending = self.loading.borrow_mut().take();
        if let Some(pending) = pending {
            pending.tech.component().off(forwarded_events(), &pending.listener);
            pending.tech.dispose();
        }
        let current = self.current.borrow_mut().take();
        if let Some(tech) = current {
            self.unbind_tech(&tech);
            tech.dispose();
        }

        self.component.dispose();
        info!(player_id = %self.id(), "Player disposed");
    }
}

impl Evented for Player {
    fn events(&self) -> &EventRegistry {
        self.component.events()
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id())
            .field("tech", &self.tech_name())
            .field("switching", &self.is_switching())
            .field("queued", &self.queue.borrow().len())
            .field("error", &self.error.borrow())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}
