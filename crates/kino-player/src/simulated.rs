//! Deterministic headless host
//!
//! [`SimulatedPlatform`] answers `canPlayType` from a table and hands out
//! [`SimulatedMediaElement`]s, which follow the HTML load and playback
//! algorithms on the [`RunLoop`]:
//!
//! ```text
//! src set ─► loadstart ─(20 ms)─► durationchange ► loadedmetadata ►
//!            loadeddata ► canplay ► canplaythrough
//!        └─(failing source)─────► error
//! play ─► play ► playing ─► timeupdate every 250 ms ─► timeupdate ► pause ► ended
//! ```

use crate::dom::{Dom, HeadlessDom, NodeId};
use crate::host::Host;
use crate::media_error::{MediaError, MediaErrorCode};
use crate::platform::{BrowserCapabilities, EventSink, MediaElement, Platform};
use crate::runloop::{RunLoop, TimerId};
use crate::source::MimeType;
use crate::tech::CanPlay;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

/// Delay between `loadstart` and metadata
pub const LOAD_DELAY_MS: u64 = 20;
/// Interval of `timeupdate` while playing
pub const TICK_MS: u64 = 250;
/// Default media duration in seconds
pub const DEFAULT_DURATION: f64 = 30.0;

const NETWORK_EMPTY: u16 = 0;
const NETWORK_IDLE: u16 = 1;
const NETWORK_LOADING: u16 = 2;
const NETWORK_NO_SOURCE: u16 = 3;
const HAVE_NOTHING: u16 = 0;
const HAVE_ENOUGH_DATA: u16 = 4;

#[derive(Debug, Clone)]
struct MediaProfile {
    duration: f64,
    failures: HashMap<String, MediaErrorCode>,
    fixed_volume: bool,
}

/// Scripted browser
pub struct SimulatedPlatform {
    run_loop: Rc<RunLoop>,
    capabilities: BrowserCapabilities,
    support: HashMap<String, CanPlay>,
    profile: MediaProfile,
    elements: RefCell<Vec<Rc<SimulatedMediaElement>>>,
}

impl SimulatedPlatform {
    pub fn new(run_loop: Rc<RunLoop>) -> Self {
        let support = [
            ("video/mp4", CanPlay::Probably),
            ("audio/mpeg", CanPlay::Probably),
            ("video/webm", CanPlay::Maybe),
            ("video/ogg", CanPlay::Maybe),
            ("audio/mp4", CanPlay::Maybe),
        ]
        .into_iter()
        .map(|(mime, level)| (mime.to_string(), level))
        .collect();

        Self {
            run_loop,
            capabilities: BrowserCapabilities {
                can_override_attributes: true,
                ..Default::default()
            },
            support,
            profile: MediaProfile {
                duration: DEFAULT_DURATION,
                failures: HashMap::new(),
                fixed_volume: false,
            },
            elements: RefCell::new(Vec::new()),
        }
    }

    /// Answer `level` for a MIME type (parameters ignored)
    pub fn with_support(mut self, mime: &str, level: CanPlay) -> Self {
        self.support.insert(mime.to_ascii_lowercase(), level);
        self
    }

    pub fn with_capabilities(mut self, capabilities: BrowserCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.profile.duration = seconds;
        self
    }

    /// Make loading `src` end in a media error
    pub fn fail_source(mut self, src: &str, code: MediaErrorCode) -> Self {
        self.profile.failures.insert(src.to_string(), code);
        self
    }

    /// Volume stays at 1.0 whatever is set (iOS)
    pub fn with_fixed_volume(mut self, fixed: bool) -> Self {
        self.profile.fixed_volume = fixed;
        self
    }

    /// Every element created so far, oldest first
    pub fn elements(&self) -> Vec<Rc<SimulatedMediaElement>> {
        self.elements.borrow().clone()
    }
}

impl Platform for SimulatedPlatform {
    fn capabilities(&self) -> &BrowserCapabilities {
        &self.capabilities
    }

    fn can_play_type(&self, mime: &str) -> CanPlay {
        match MimeType::parse(mime) {
            Ok(parsed) => self.support.get(&parsed.essence()).copied().unwrap_or_default(),
            Err(_) => CanPlay::No,
        }
    }

    fn create_media_element(&self, dom: &Rc<dyn Dom>, tag: &str) -> Rc<dyn MediaElement> {
        let node = dom.create_element(tag);
        let element = SimulatedMediaElement::new(node, self.run_loop.clone(), self.profile.clone());
        self.elements.borrow_mut().push(element.clone());
        element
    }
}

impl fmt::Debug for SimulatedPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedPlatform")
            .field("capabilities", &self.capabilities)
            .field("support", &self.support)
            .field("elements", &self.elements.borrow().len())
            .finish()
    }
}

#[derive(Debug)]
struct ElementState {
    src: String,
    current_src: String,
    paused: bool,
    ended: bool,
    current_time: f64,
    duration: f64,
    volume: f64,
    muted: bool,
    playback_rate: f64,
    preload: String,
    autoplay: bool,
    looping: bool,
    controls: bool,
    error: Option<MediaError>,
    network_state: u16,
    ready_state: u16,
    fullscreen: bool,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            src: String::new(),
            current_src: String::new(),
            paused: true,
            ended: false,
            current_time: 0.0,
            duration: f64::NAN,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            preload: "auto".to_string(),
            autoplay: false,
            looping: false,
            controls: false,
            error: None,
            network_state: NETWORK_EMPTY,
            ready_state: HAVE_NOTHING,
            fullscreen: false,
        }
    }
}

/// Scripted media element
pub struct SimulatedMediaElement {
    node: NodeId,
    run_loop: Rc<RunLoop>,
    profile: MediaProfile,
    state: RefCell<ElementState>,
    sink: RefCell<Option<EventSink>>,
    /// Bumped on every load; stale load tasks compare against it
    generation: Cell<u64>,
    tick: Cell<Option<TimerId>>,
    self_ref: Weak<SimulatedMediaElement>,
}

impl SimulatedMediaElement {
    fn new(node: NodeId, run_loop: Rc<RunLoop>, profile: MediaProfile) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            node,
            run_loop,
            profile,
            state: RefCell::new(ElementState::default()),
            sink: RefCell::new(None),
            generation: Cell::new(0),
            tick: Cell::new(None),
            self_ref: self_ref.clone(),
        })
    }

    /// Deliver an event right now, as if the browser fired it
    pub fn fire(&self, event_type: &str) {
        let sink = self.sink.borrow().clone();
        if let Some(sink) = sink {
            trace!(node = %self.node, event = event_type, "Media event");
            sink(event_type);
        }
    }

    /// Fail the current load right now
    pub fn fail(&self, code: MediaErrorCode) {
        self.generation.set(self.generation.get() + 1);
        self.stop_ticking();
        {
            let mut state = self.state.borrow_mut();
            state.error = Some(MediaError::new(code));
            state.network_state = NETWORK_NO_SOURCE;
            state.paused = true;
        }
        self.fire("error");
    }

    pub fn is_fullscreen(&self) -> bool {
        self.state.borrow().fullscreen
    }

    pub fn preload(&self) -> String {
        self.state.borrow().preload.clone()
    }

    pub fn controls(&self) -> bool {
        self.state.borrow().controls
    }

    pub fn looping(&self) -> bool {
        self.state.borrow().looping
    }

    pub fn has_event_sink(&self) -> bool {
        self.sink.borrow().is_some()
    }

    fn queue(&self, event_type: &'static str) {
        let weak = self.self_ref.clone();
        self.run_loop.set_timeout(0, move || {
            if let Some(element) = weak.upgrade() {
                element.fire(event_type);
            }
        });
    }

    fn stop_ticking(&self) {
        if let Some(timer) = self.tick.take() {
            self.run_loop.clear_timeout(timer);
        }
    }

    fn start_ticking(&self) {
        if self.tick.get().is_some() {
            return;
        }
        let weak = self.self_ref.clone();
        let timer = self.run_loop.set_timeout(TICK_MS, move || {
            if let Some(element) = weak.upgrade() {
                element.tick.set(None);
                element.advance_playback();
            }
        });
        self.tick.set(Some(timer));
    }

    fn advance_playback(&self) {
        let finished = {
            let mut state = self.state.borrow_mut();
            if state.paused {
                return;
            }
            state.current_time += TICK_MS as f64 / 1000.0 * state.playback_rate;
            if state.current_time < state.duration {
                false
            } else if state.looping {
                state.current_time = 0.0;
                false
            } else {
                state.current_time = state.duration;
                state.paused = true;
                state.ended = true;
                true
            }
        };

        self.fire("timeupdate");
        if finished {
            self.fire("pause");
            self.fire("ended");
        } else {
            self.start_ticking();
        }
    }

    /// The resource selection and fetch steps
    fn run_load(&self) {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.stop_ticking();

        let had_media = {
            let mut state = self.state.borrow_mut();
            let had_media = state.network_state != NETWORK_EMPTY;
            state.paused = true;
            state.ended = false;
            state.current_time = 0.0;
            state.duration = f64::NAN;
            state.error = None;
            state.ready_state = HAVE_NOTHING;
            state.current_src = state.src.clone();
            state.network_state = if state.src.is_empty() {
                NETWORK_EMPTY
            } else {
                NETWORK_LOADING
            };
            had_media
        };

        if had_media {
            self.queue("emptied");
        }
        if self.state.borrow().src.is_empty() {
            return;
        }
        self.queue("loadstart");

        let weak = self.self_ref.clone();
        self.run_loop.set_timeout(LOAD_DELAY_MS, move || {
            if let Some(element) = weak.upgrade() {
                if element.generation.get() == generation {
                    element.finish_load();
                }
            }
        });
    }

    fn finish_load(&self) {
        let src = self.state.borrow().current_src.clone();
        if let Some(code) = self.profile.failures.get(&src).copied() {
            self.fail(code);
            return;
        }

        let (autoplay, playing) = {
            let mut state = self.state.borrow_mut();
            state.duration = self.profile.duration;
            state.ready_state = HAVE_ENOUGH_DATA;
            state.network_state = NETWORK_IDLE;
            (state.autoplay, !state.paused)
        };

        for event_type in ["durationchange", "loadedmetadata", "loadeddata", "canplay", "canplaythrough"] {
            self.fire(event_type);
        }

        if playing {
            self.fire("playing");
            self.start_ticking();
        } else if autoplay {
            self.play();
        }
    }
}

impl MediaElement for SimulatedMediaElement {
    fn node(&self) -> NodeId {
        self.node
    }

    fn play(&self) {
        let (was_paused, can_play) = {
            let mut state = self.state.borrow_mut();
            let was_paused = state.paused;
            if state.ended {
                state.ended = false;
                state.current_time = 0.0;
            }
            state.paused = false;
            (was_paused, state.ready_state >= HAVE_ENOUGH_DATA)
        };
        if !was_paused {
            return;
        }

        self.queue("play");
        if can_play {
            self.queue("playing");
            self.start_ticking();
        } else {
            self.queue("waiting");
        }
    }

    fn pause(&self) {
        let was_playing = {
            let mut state = self.state.borrow_mut();
            let was_playing = !state.paused;
            state.paused = true;
            was_playing
        };
        if was_playing {
            self.stop_ticking();
            self.queue("pause");
        }
    }

    fn paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn ended(&self) -> bool {
        self.state.borrow().ended
    }

    fn current_time(&self) -> f64 {
        self.state.borrow().current_time
    }

    fn set_current_time(&self, seconds: f64) {
        {
            let mut state = self.state.borrow_mut();
            let upper = if state.duration.is_nan() { f64::MAX } else { state.duration };
            state.current_time = seconds.clamp(0.0, upper);
            state.ended = false;
        }
        self.queue("seeking");
        self.queue("timeupdate");
        self.queue("seeked");
    }

    fn duration(&self) -> f64 {
        self.state.borrow().duration
    }

    fn volume(&self) -> f64 {
        self.state.borrow().volume
    }

    fn set_volume(&self, volume: f64) {
        if self.profile.fixed_volume {
            return;
        }
        let changed = {
            let mut state = self.state.borrow_mut();
            let volume = volume.clamp(0.0, 1.0);
            let changed = state.volume != volume;
            state.volume = volume;
            changed
        };
        if changed {
            self.queue("volumechange");
        }
    }

    fn muted(&self) -> bool {
        self.state.borrow().muted
    }

    fn set_muted(&self, muted: bool) {
        let changed = std::mem::replace(&mut self.state.borrow_mut().muted, muted) != muted;
        if changed {
            self.queue("volumechange");
        }
    }

    fn playback_rate(&self) -> f64 {
        self.state.borrow().playback_rate
    }

    fn set_playback_rate(&self, rate: f64) {
        let changed = std::mem::replace(&mut self.state.borrow_mut().playback_rate, rate) != rate;
        if changed {
            self.queue("ratechange");
        }
    }

    fn src(&self) -> String {
        self.state.borrow().src.clone()
    }

    fn set_src(&self, src: &str) {
        self.state.borrow_mut().src = src.to_string();
        self.run_load();
    }

    fn current_src(&self) -> String {
        self.state.borrow().current_src.clone()
    }

    fn load(&self) {
        self.run_load();
    }

    fn set_preload(&self, preload: &str) {
        self.state.borrow_mut().preload = preload.to_string();
    }

    fn set_autoplay(&self, autoplay: bool) {
        self.state.borrow_mut().autoplay = autoplay;
    }

    fn set_loop(&self, looping: bool) {
        self.state.borrow_mut().looping = looping;
    }

    fn set_controls(&self, controls: bool) {
        self.state.borrow_mut().controls = controls;
    }

    fn error(&self) -> Option<MediaError> {
        self.state.borrow().error.clone()
    }

    fn network_state(&self) -> u16 {
        self.state.borrow().network_state
    }

    fn ready_state(&self) -> u16 {
        self.state.borrow().ready_state
    }

    fn supports_fullscreen(&self) -> bool {
        true
    }

    fn enter_fullscreen(&self) {
        self.state.borrow_mut().fullscreen = true;
    }

    fn exit_fullscreen(&self) {
        self.state.borrow_mut().fullscreen = false;
    }

    fn set_event_sink(&self, sink: Option<EventSink>) {
        *self.sink.borrow_mut() = sink;
    }

    /// Drop the source without running a new load
    fn reset(&self) {
        self.generation.set(self.generation.get() + 1);
        self.stop_ticking();
        let mut state = self.state.borrow_mut();
        state.src.clear();
        state.current_src.clear();
        state.paused = true;
        state.network_state = NETWORK_EMPTY;
        state.ready_state = HAVE_NOTHING;
    }
}

impl fmt::Debug for SimulatedMediaElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedMediaElement")
            .field("node", &self.node)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// A complete in-memory host
#[derive(Debug, Clone)]
pub struct Headless {
    pub dom: Rc<HeadlessDom>,
    pub platform: Rc<SimulatedPlatform>,
    pub run_loop: Rc<RunLoop>,
}

impl Headless {
    pub fn new() -> Self {
        Self::with_platform(|platform| platform)
    }

    /// Customize the simulated platform
    pub fn with_platform(configure: impl FnOnce(SimulatedPlatform) -> SimulatedPlatform) -> Self {
        let run_loop = Rc::new(RunLoop::new());
        let platform = configure(SimulatedPlatform::new(run_loop.clone()));
        Self {
            dom: Rc::new(HeadlessDom::new()),
            platform: Rc::new(platform),
            run_loop,
        }
    }

    pub fn host(&self) -> Host {
        Host::new(self.dom.clone(), self.platform.clone(), self.run_loop.clone())
    }
}

impl Default for Headless {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(headless: &Headless) -> (Rc<dyn MediaElement>, Rc<RefCell<Vec<String>>>) {
        let dom: Rc<dyn Dom> = headless.dom.clone();
        let element = headless.platform.create_media_element(&dom, "video");
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        element.set_event_sink(Some(Rc::new(move |event: &str| sink.borrow_mut().push(event.to_string()))));
        (element, log)
    }

    #[test]
    fn test_load_sequence() {
        let headless = Headless::new();
        let (element, log) = element(&headless);
        element.set_src("movie.mp4");
        assert!(element.duration().is_nan());

        headless.run_loop.advance(LOAD_DELAY_MS);
        assert_eq!(
            *log.borrow(),
            vec!["loadstart", "durationchange", "loadedmetadata", "loadeddata", "canplay", "canplaythrough"]
        );
        assert_eq!(element.duration(), DEFAULT_DURATION);
        assert_eq!(element.ready_state(), HAVE_ENOUGH_DATA);
    }

    #[test]
    fn test_playback_to_end() {
        let headless = Headless::with_platform(|p| p.with_duration(1.0));
        let (element, log) = element(&headless);
        element.set_src("short.mp4");
        headless.run_loop.advance(LOAD_DELAY_MS);
        log.borrow_mut().clear();

        element.play();
        headless.run_loop.run_until_idle();

        let events = log.borrow();
        assert_eq!(&events[..2], &["play", "playing"]);
        assert_eq!(events.iter().filter(|e| *e == "timeupdate").count(), 4);
        assert_eq!(&events[events.len() - 2..], &["pause", "ended"]);
        assert!(element.ended() && element.paused());
        assert_eq!(element.current_time(), 1.0);
    }

    #[test]
    fn test_failing_source() {
        let headless = Headless::with_platform(|p| p.fail_source("broken.mp4", MediaErrorCode::Network));
        let (element, log) = element(&headless);
        element.set_src("broken.mp4");
        headless.run_loop.run_until_idle();

        assert_eq!(*log.borrow(), vec!["loadstart", "error"]);
        assert_eq!(element.error().map(|e| e.code), Some(MediaErrorCode::Network));
    }

    #[test]
    fn test_source_change_cancels_stale_load() {
        let headless = Headless::new();
        let (element, log) = element(&headless);
        element.set_src("a.mp4");
        headless.run_loop.advance(5);
        element.set_src("b.mp4");
        headless.run_loop.run_until_idle();

        let metadata = log.borrow().iter().filter(|e| *e == "loadedmetadata").count();
        assert_eq!(metadata, 1);
        assert_eq!(element.current_src(), "b.mp4");
    }

    #[test]
    fn test_fixed_volume() {
        let headless = Headless::with_platform(|p| p.with_fixed_volume(true));
        let (element, log) = element(&headless);
        element.set_volume(0.2);
        headless.run_loop.run_until_idle();
        assert_eq!(element.volume(), 1.0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_can_play_type_ignores_params() {
        let headless = Headless::new();
        assert_eq!(
            headless.platform.can_play_type("video/mp4; codecs=\"avc1.42E01E\""),
            CanPlay::Probably
        );
        assert_eq!(headless.platform.can_play_type("not a mime"), CanPlay::No);
    }
}
