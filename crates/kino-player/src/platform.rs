//! Browser capability and media element collaborators
//!
//! The core reads browser facts through [`BrowserCapabilities`] and drives
//! native media through [`MediaElement`]. A [`Platform`] hands out both.

use crate::dom::{Dom, NodeId};
use crate::media_error::MediaError;
use crate::tech::CanPlay;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Receives the type of every native media event
pub type EventSink = Rc<dyn Fn(&str)>;

/// Read-only browser facts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserCapabilities {
    pub is_ipad: bool,
    pub is_iphone: bool,
    pub is_ipod: bool,
    pub ios_version: Option<u32>,
    pub is_android: bool,
    pub android_version: Option<f64>,
    pub is_firefox: bool,
    pub is_edge: bool,
    pub is_chrome: bool,
    pub chrome_version: Option<u32>,
    pub is_safari: bool,
    pub touch_enabled: bool,
    /// Media element attributes (e.g. `src`) can be redefined by script
    pub can_override_attributes: bool,
}

impl BrowserCapabilities {
    /// Derive the facts from a user-agent string
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        let is_ipad = ua.contains("ipad");
        let is_iphone = ua.contains("iphone") && !is_ipad;
        let is_ipod = ua.contains("ipod");
        let is_android = ua.contains("android");
        let is_edge = ua.contains("edge") || ua.contains("edg/");
        let is_chrome = !is_edge && ua.contains("chrome");
        let is_ios = is_ipad || is_iphone || is_ipod;

        Self {
            is_ipad,
            is_iphone,
            is_ipod,
            ios_version: leading_number(&ua, "os ").and_then(|v| v.parse().ok()),
            is_android,
            android_version: android_version(&ua),
            is_firefox: ua.contains("firefox"),
            is_edge,
            is_chrome,
            chrome_version: leading_number(&ua, "chrome/").and_then(|v| v.parse().ok()),
            is_safari: ua.contains("safari") && !is_chrome && !is_android && !is_edge,
            touch_enabled: is_ios || is_android,
            can_override_attributes: true,
        }
    }

    pub fn is_ios(&self) -> bool {
        self.is_ipad || self.is_iphone || self.is_ipod
    }

    /// Desktop or mobile Safari
    pub fn is_any_safari(&self) -> bool {
        (self.is_safari || self.is_ios()) && !self.is_chrome
    }
}

/// Digits directly following `marker`
fn leading_number<'a>(haystack: &'a str, marker: &str) -> Option<&'a str> {
    let start = haystack.find(marker)? + marker.len();
    let rest = &haystack[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

/// `Android 4.4.2` reads as `4.4`, `Android 9` as `9.0`
fn android_version(ua: &str) -> Option<f64> {
    let start = ua.find("android ")? + "android ".len();
    let rest = &ua[start..];
    let major = leading_number(rest, "")?;
    let minor = rest[major.len()..]
        .strip_prefix('.')
        .and_then(|tail| leading_number(tail, ""));

    match minor {
        Some(minor) => format!("{}.{}", major, minor).parse().ok(),
        None => major.parse().ok(),
    }
}

/// A native media element handle
pub trait MediaElement {
    /// The element in the host tree
    fn node(&self) -> NodeId;

    fn play(&self);
    fn pause(&self);
    fn paused(&self) -> bool;
    fn ended(&self) -> bool;

    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    /// `NaN` until metadata is known
    fn duration(&self) -> f64;

    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64);
    fn muted(&self) -> bool;
    fn set_muted(&self, muted: bool);

    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);

    fn src(&self) -> String;
    fn set_src(&self, src: &str);
    fn current_src(&self) -> String;
    fn load(&self);

    fn set_preload(&self, preload: &str);
    fn set_autoplay(&self, autoplay: bool);
    fn set_loop(&self, looping: bool);
    fn set_controls(&self, controls: bool);

    fn error(&self) -> Option<MediaError>;
    fn network_state(&self) -> u16;
    fn ready_state(&self) -> u16;

    fn supports_fullscreen(&self) -> bool;
    fn enter_fullscreen(&self);
    fn exit_fullscreen(&self);

    /// Route native events to `sink`; `None` detaches
    fn set_event_sink(&self, sink: Option<EventSink>);

    /// Drop the source and abort any load in progress
    fn reset(&self) {
        self.set_src("");
        self.load();
    }
}

/// The browser-side collaborator
pub trait Platform {
    fn capabilities(&self) -> &BrowserCapabilities;

    /// The native `canPlayType` answer for a MIME type
    fn can_play_type(&self, mime: &str) -> CanPlay;

    /// Create a detached `<video>`/`<audio>` element
    fn create_media_element(&self, dom: &Rc<dyn Dom>, tag: &str) -> Rc<dyn MediaElement>;
}
