//! Browser platform: capabilities from the user agent and real
//! `HTMLMediaElement`s

use crate::dom::WebDom;
use kino_player::dom::{Dom, NodeId};
use kino_player::media_error::{MediaError, MediaErrorCode};
use kino_player::platform::{BrowserCapabilities, EventSink, MediaElement, Platform};
use kino_player::tech::{CanPlay, TECH_EVENTS};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlMediaElement;

/// Facts and element factory of the running browser
pub struct WebPlatform {
    dom: Rc<WebDom>,
    capabilities: BrowserCapabilities,
    probe: Option<HtmlMediaElement>,
}

impl WebPlatform {
    /// `dom` must be the same backend the host uses: media elements are
    /// created through it so their handles resolve.
    pub fn new(dom: Rc<WebDom>) -> Self {
        let window = web_sys::window();
        let user_agent = window
            .as_ref()
            .and_then(|w| w.navigator().user_agent().ok())
            .unwrap_or_default();

        let mut capabilities = BrowserCapabilities::from_user_agent(&user_agent);
        capabilities.touch_enabled = window
            .as_ref()
            .map(|w| js_sys::Reflect::has(w, &JsValue::from_str("ontouchstart")).unwrap_or(false))
            .unwrap_or(false);

        let probe = dom
            .document()
            .create_element("video")
            .ok()
            .and_then(|el| el.dyn_into::<HtmlMediaElement>().ok());

        debug!(user_agent = %user_agent, "Browser capabilities detected");
        Self {
            dom,
            capabilities,
            probe,
        }
    }
}

impl Platform for WebPlatform {
    fn capabilities(&self) -> &BrowserCapabilities {
        &self.capabilities
    }

    fn can_play_type(&self, mime: &str) -> CanPlay {
        self.probe
            .as_ref()
            .map(|probe| CanPlay::parse(&probe.can_play_type(mime)))
            .unwrap_or_default()
    }

    fn create_media_element(&self, _dom: &Rc<dyn Dom>, tag: &str) -> Rc<dyn MediaElement> {
        Rc::new(WebMediaElement::new(&self.dom, tag))
    }
}

type Handler = Closure<dyn FnMut(web_sys::Event)>;

/// A real media element. An element the browser refused to create behaves
/// as an empty, paused element.
pub struct WebMediaElement {
    node: NodeId,
    element: Option<HtmlMediaElement>,
    sink: Rc<RefCell<Option<EventSink>>>,
    handlers: Vec<(&'static str, Handler)>,
}

impl WebMediaElement {
    fn new(dom: &WebDom, tag: &str) -> Self {
        let node = dom.create_element(tag);
        let element = dom
            .element(node)
            .and_then(|el| el.dyn_into::<HtmlMediaElement>().ok());
        if element.is_none() {
            warn!(tag, "Not a media element");
        }

        let sink: Rc<RefCell<Option<EventSink>>> = Rc::new(RefCell::new(None));
        let mut handlers = Vec::new();
        if let Some(element) = &element {
            for event_type in TECH_EVENTS {
                let sink = sink.clone();
                let handler: Handler = Closure::wrap(Box::new(move |_event: web_sys::Event| {
                    let sink = sink.borrow().clone();
                    if let Some(sink) = sink {
                        sink(event_type);
                    }
                }) as Box<dyn FnMut(web_sys::Event)>);
                if element
                    .add_event_listener_with_callback(event_type, handler.as_ref().unchecked_ref())
                    .is_ok()
                {
                    handlers.push((event_type, handler));
                }
            }
        }

        Self {
            node,
            element,
            sink,
            handlers,
        }
    }

    fn with<R: Default>(&self, f: impl FnOnce(&HtmlMediaElement) -> R) -> R {
        self.element.as_ref().map(f).unwrap_or_default()
    }
}

impl Drop for WebMediaElement {
    fn drop(&mut self) {
        if let Some(element) = &self.element {
            for (event_type, handler) in &self.handlers {
                let _ = element
                    .remove_event_listener_with_callback(event_type, handler.as_ref().unchecked_ref());
            }
        }
    }
}

impl MediaElement for WebMediaElement {
    fn node(&self) -> NodeId {
        self.node
    }

    fn play(&self) {
        // the returned promise rejects on autoplay policy; the element
        // still reports through its events
        self.with(|el| {
            let _ = el.play();
        });
    }

    fn pause(&self) {
        self.with(|el| {
            let _ = el.pause();
        });
    }

    fn paused(&self) -> bool {
        self.element.as_ref().map_or(true, |el| el.paused())
    }

    fn ended(&self) -> bool {
        self.with(|el| el.ended())
    }

    fn current_time(&self) -> f64 {
        self.with(|el| el.current_time())
    }

    fn set_current_time(&self, seconds: f64) {
        self.with(|el| el.set_current_time(seconds));
    }

    fn duration(&self) -> f64 {
        self.element.as_ref().map_or(f64::NAN, |el| el.duration())
    }

    fn volume(&self) -> f64 {
        self.element.as_ref().map_or(1.0, |el| el.volume())
    }

    fn set_volume(&self, volume: f64) {
        self.with(|el| el.set_volume(volume));
    }

    fn muted(&self) -> bool {
        self.with(|el| el.muted())
    }

    fn set_muted(&self, muted: bool) {
        self.with(|el| el.set_muted(muted));
    }

    fn playback_rate(&self) -> f64 {
        self.element.as_ref().map_or(1.0, |el| el.playback_rate())
    }

    fn set_playback_rate(&self, rate: f64) {
        self.with(|el| el.set_playback_rate(rate));
    }

    fn src(&self) -> String {
        self.with(|el| el.src())
    }

    fn set_src(&self, src: &str) {
        self.with(|el| el.set_src(src));
    }

    fn current_src(&self) -> String {
        self.with(|el| el.current_src())
    }

    fn load(&self) {
        self.with(|el| el.load());
    }

    fn set_preload(&self, preload: &str) {
        self.with(|el| el.set_preload(preload));
    }

    fn set_autoplay(&self, autoplay: bool) {
        self.with(|el| el.set_autoplay(autoplay));
    }

    fn set_loop(&self, looping: bool) {
        self.with(|el| el.set_loop(looping));
    }

    fn set_controls(&self, controls: bool) {
        self.with(|el| el.set_controls(controls));
    }

    fn error(&self) -> Option<MediaError> {
        let error = self.element.as_ref()?.error()?;
        Some(MediaError::new(MediaErrorCode::from(error.code())))
    }

    fn network_state(&self) -> u16 {
        self.with(|el| el.network_state())
    }

    fn ready_state(&self) -> u16 {
        self.with(|el| el.ready_state())
    }

    fn supports_fullscreen(&self) -> bool {
        self.element.is_some()
    }

    fn enter_fullscreen(&self) {
        self.with(|el| {
            if let Err(e) = el.request_fullscreen() {
                warn!(error = ?e, "requestFullscreen failed");
            }
        });
    }

    fn exit_fullscreen(&self) {
        if let Some(document) = web_sys::window().and_then(|w| w.document()) {
            document.exit_fullscreen();
        }
    }

    fn set_event_sink(&self, sink: Option<EventSink>) {
        *self.sink.borrow_mut() = sink;
    }
}
