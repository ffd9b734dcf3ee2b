//! JavaScript facade over [`Player`]

use crate::dom::WebDom;
use crate::media::WebPlatform;
use kino_player::dom::Dom;
use kino_player::{Event, Evented, Host, Listener, Options, Player, RunLoop, Sources};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Run loop granularity in milliseconds
const PUMP_INTERVAL_MS: i32 = 16;

fn js_error(error: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&error.to_string()).into()
}

fn to_js(value: &impl Serialize) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap_or(JsValue::NULL)
}

/// Advances the run loop to `performance.now()` on an interval
struct Pump {
    interval: i32,
    _tick: Closure<dyn FnMut()>,
}

impl Pump {
    fn start(run_loop: Rc<RunLoop>) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| js_error("no window"))?;
        let performance = window.performance().ok_or_else(|| js_error("no performance clock"))?;
        let origin = performance.now();

        let tick = Closure::wrap(Box::new(move || {
            let elapsed = (performance.now() - origin).max(0.0) as u64;
            run_loop.advance_to(elapsed);
        }) as Box<dyn FnMut()>);

        let interval = window.set_interval_with_callback_and_timeout_and_arguments_0(
            tick.as_ref().unchecked_ref(),
            PUMP_INTERVAL_MS,
        )?;
        Ok(Self {
            interval,
            _tick: tick,
        })
    }
}

impl Drop for Pump {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            window.clear_interval_with_handle(self.interval);
        }
    }
}

struct Subscription {
    event_type: String,
    callback: js_sys::Function,
    listener: Listener,
}

/// A player mounted into a container element
#[wasm_bindgen]
pub struct KinoPlayer {
    player: Rc<Player>,
    subscriptions: RefCell<Vec<Subscription>>,
    pump: RefCell<Option<Pump>>,
}

#[wasm_bindgen]
impl KinoPlayer {
    /// Create a player inside the element with id `container_id`
    #[wasm_bindgen(constructor)]
    pub fn new(container_id: &str, options: JsValue) -> Result<KinoPlayer, JsValue> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| js_error("no document"))?;
        let container = document
            .get_element_by_id(container_id)
            .ok_or_else(|| js_error(format!("no element with id '{}'", container_id)))?;

        let options: Options = if options.is_undefined() || options.is_null() {
            Options::new()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };

        let dom = Rc::new(WebDom::new(document));
        let platform = Rc::new(WebPlatform::new(dom.clone()));
        let run_loop = Rc::new(RunLoop::new());
        let host = Host::new(dom.clone(), platform, run_loop.clone());

        let player = Player::new(host, options).map_err(js_error)?;
        if let Some(el) = player.el() {
            let root = dom.adopt(container);
            dom.insert_child(root, el, None);
        }
        let pump = Pump::start(run_loop)?;

        info!(player_id = %player.id(), container = container_id, "Player mounted");
        Ok(KinoPlayer {
            player,
            subscriptions: RefCell::new(Vec::new()),
            pump: RefCell::new(Some(pump)),
        })
    }

    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String {
        self.player.id().to_string()
    }

    /// Set the source: a URL, a `{src, type}` record, or an array of either
    pub fn src(&self, source: JsValue) -> Result<(), JsValue> {
        let value: Value = serde_wasm_bindgen::from_value(source)?;
        let sources = Sources::from_value(value).map_err(js_error)?;
        self.player.src(sources);
        Ok(())
    }

    #[wasm_bindgen(js_name = currentSrc)]
    pub fn current_src(&self) -> String {
        self.player.current_src()
    }

    pub fn play(&self) {
        self.player.play();
    }

    pub fn pause(&self) {
        self.player.pause();
    }

    pub fn paused(&self) -> bool {
        self.player.paused()
    }

    #[wasm_bindgen(js_name = currentTime)]
    pub fn current_time(&self) -> f64 {
        self.player.current_time()
    }

    #[wasm_bindgen(js_name = setCurrentTime)]
    pub fn set_current_time(&self, seconds: f64) {
        self.player.set_current_time(seconds);
    }

    pub fn duration(&self) -> f64 {
        self.player.duration()
    }

    pub fn volume(&self) -> f64 {
        self.player.volume()
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, volume: f64) {
        self.player.set_volume(volume);
    }

    pub fn muted(&self) -> bool {
        self.player.muted()
    }

    #[wasm_bindgen(js_name = setMuted)]
    pub fn set_muted(&self, muted: bool) {
        self.player.set_muted(muted);
    }

    #[wasm_bindgen(js_name = techName)]
    pub fn tech_name(&self) -> Option<String> {
        self.player.tech_name()
    }

    /// Current error as `{code, message}`, or `null`
    pub fn error(&self) -> JsValue {
        match self.player.error() {
            Some(error) => to_js(&error),
            None => JsValue::NULL,
        }
    }

    #[wasm_bindgen(js_name = requestFullscreen)]
    pub fn request_fullscreen(&self) {
        self.player.request_fullscreen();
    }

    #[wasm_bindgen(js_name = exitFullscreen)]
    pub fn exit_fullscreen(&self) {
        self.player.exit_fullscreen();
    }

    /// Listen for `event_type`; the callback gets `(type, data)`
    pub fn on(&self, event_type: &str, callback: js_sys::Function) {
        let target = callback.clone();
        let listener = Listener::new(move |event: &Event| {
            let kind = JsValue::from_str(event.event_type());
            if let Err(e) = target.call2(&JsValue::NULL, &kind, &to_js(event.data())) {
                warn!(event = event.event_type(), error = ?e, "Event callback threw");
            }
        });
        self.player.on(event_type, &listener);
        self.subscriptions.borrow_mut().push(Subscription {
            event_type: event_type.to_string(),
            callback,
            listener,
        });
    }

    /// Remove a callback added with `on`
    pub fn off(&self, event_type: &str, callback: &js_sys::Function) {
        let mut removed = Vec::new();
        self.subscriptions.borrow_mut().retain(|sub| {
            let matches = sub.event_type == event_type && sub.callback == *callback;
            if matches {
                removed.push(sub.listener.clone());
            }
            !matches
        });
        for listener in removed {
            self.player.off(event_type, &listener);
        }
    }

    /// Trigger an event on the player: a type string or `{type, ...}`
    pub fn trigger(&self, event: JsValue) -> Result<bool, JsValue> {
        let descriptor: Value = serde_wasm_bindgen::from_value(event)?;
        let event = Event::try_from(descriptor).map_err(js_error)?;
        Ok(self.player.trigger(event))
    }

    /// Tear the player down and stop the clock
    pub fn dispose(&self) {
        self.player.dispose();
        self.subscriptions.borrow_mut().clear();
        self.pump.borrow_mut().take();
    }
}
