//! Native media element tech
//!
//! Wraps a `<video>` element from the [`Platform`]. Sources go straight to
//! the element (the native source handler); feature flags are probed on a
//! throwaway element when the tech is created.

use super::{CanPlay, Tech, TechBase, TechFactory, TechFeatures, TechOptions, SOURCESET};
use crate::component::{Component, Widget};
use crate::dom::{Dom, NodeId};
use crate::error::Result;
use crate::events::{Event, Evented};
use crate::host::Context;
use crate::media_error::MediaError;
use crate::options::Options;
use crate::platform::{MediaElement, Platform};
use crate::source::{file_extension, SourceDescriptor};
use crate::tracks::{TrackKind, TrackList};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, instrument, warn};

pub const HTML5: &str = "Html5";

/// `application/x-mpegurl` and `application/vnd.apple.mpegurl`
fn is_mpegurl(mime: &str) -> bool {
    let mime = mime.trim_start().to_ascii_lowercase();
    mime.starts_with("application/x-mpegurl") || mime.starts_with("application/vnd.apple.mpegurl")
}

/// Factory and support probes for [`Html5`]
#[derive(Debug, Default, Clone, Copy)]
pub struct Html5Factory;

impl Html5Factory {
    /// Probe the element features of this platform
    pub fn probe_features(platform: &dyn Platform, dom: &Rc<dyn Dom>) -> TechFeatures {
        let caps = platform.capabilities();
        let probe = platform.create_media_element(dom, "video");

        let volume = probe.volume();
        probe.set_volume(volume / 2.0 + 0.1);
        let volume_control = probe.volume() != volume;

        // Android Chrome before 58 accepts a rate but ignores it
        let broken_rate = caps.is_android && caps.is_chrome && caps.chrome_version.is_some_and(|v| v < 58);
        let playback_rate = !broken_rate && {
            let rate = probe.playback_rate();
            probe.set_playback_rate(rate / 2.0 + 0.1);
            probe.playback_rate() != rate
        };

        dom.release(probe.node());

        TechFeatures {
            volume_control,
            fullscreen_resize: true,
            playback_rate,
            progress_events: true,
            timeupdate_events: true,
            sourceset: caps.can_override_attributes,
            native_text_tracks: caps.is_any_safari(),
            native_audio_tracks: false,
            native_video_tracks: false,
            moving_media_element_in_dom: !caps.is_ios(),
        }
    }
}

impl TechFactory for Html5Factory {
    fn name(&self) -> &str {
        HTML5
    }

    fn is_supported(&self, _platform: &dyn Platform) -> bool {
        true
    }

    /// Native answer, except that Android 4+ stock browsers are told HLS is
    /// a `maybe` (they play it but report otherwise)
    fn can_play_type(&self, platform: &dyn Platform, mime: &str) -> CanPlay {
        let caps = platform.capabilities();
        let patched = caps.android_version.is_some_and(|v| v >= 4.0) && !caps.is_firefox && !caps.is_chrome;
        if patched && is_mpegurl(mime) {
            return CanPlay::Maybe;
        }
        platform.can_play_type(mime)
    }

    /// Explicit type when given, else `video/<extension>`
    fn can_play_source(&self, platform: &dyn Platform, source: &SourceDescriptor) -> CanPlay {
        if let Some(mime) = source.explicit_type() {
            return self.can_play_type(platform, mime);
        }
        match file_extension(&source.src) {
            Some(extension) => self.can_play_type(platform, &format!("video/{}", extension)),
            None => CanPlay::No,
        }
    }

    #[instrument(skip(self, ctx, options), fields(player_id = %ctx.player_id()))]
    fn create(&self, ctx: &Context, options: TechOptions) -> Result<Rc<dyn Tech>> {
        let tech = Html5::new(ctx, options)?;
        Ok(tech)
    }
}

/// Element ownership for the tech's component
struct MediaElementWidget {
    element: Rc<dyn MediaElement>,
}

impl Widget for MediaElementWidget {
    fn name(&self) -> &str {
        HTML5
    }

    fn create_el(&self, _component: &Component) -> NodeId {
        self.element.node()
    }

    fn dispose(&self, _component: &Component) {
        self.element.set_event_sink(None);
        self.element.reset();
    }
}

/// The native tech
pub struct Html5 {
    base: TechBase,
    element: Rc<dyn MediaElement>,
    features: TechFeatures,
    source: RefCell<Option<SourceDescriptor>>,
}

impl Html5 {
    pub fn new(ctx: &Context, options: TechOptions) -> Result<Rc<Html5>> {
        let dom = ctx.host().dom.clone();
        let platform = ctx.platform();
        let features = Html5Factory::probe_features(platform, &dom);
        let element = platform.create_media_element(&dom, "video");

        let mut component_options = Options::new();
        component_options.insert("name".to_string(), Value::String(HTML5.to_string()));
        let component = Component::new(
            ctx,
            component_options,
            Box::new(MediaElementWidget {
                element: element.clone(),
            }),
        )?;

        element.set_preload(options.preload.as_str());
        element.set_autoplay(options.autoplay);
        element.set_loop(options.looping);
        element.set_controls(options.controls);
        element.set_muted(options.muted);
        if features.volume_control {
            element.set_volume(options.volume);
        }
        if features.playback_rate {
            element.set_playback_rate(options.playback_rate);
        }

        let weak = Rc::downgrade(&component);
        element.set_event_sink(Some(Rc::new(move |event_type: &str| {
            if let Some(component) = weak.upgrade() {
                component.trigger(event_type);
            }
        })));

        let tech = Rc::new(Html5 {
            base: TechBase::new(component),
            element,
            features,
            source: RefCell::new(None),
        });

        if let Some(source) = &options.source {
            tech.set_source(source);
        }

        debug!(id = %tech.base.component().id(), "Html5 tech created");
        Ok(tech)
    }

    /// The wrapped element
    pub fn element(&self) -> &Rc<dyn MediaElement> {
        &self.element
    }
}

impl Tech for Html5 {
    fn component(&self) -> &Rc<Component> {
        self.base.component()
    }

    fn tech_name(&self) -> &str {
        HTML5
    }

    fn features(&self) -> TechFeatures {
        self.features
    }

    fn source(&self) -> Option<SourceDescriptor> {
        self.source.borrow().clone()
    }

    /// Hand the source to the element. With `sourceset` support the
    /// change is announced on the next turn, ahead of `loadstart`.
    fn set_source(&self, source: &SourceDescriptor) {
        *self.source.borrow_mut() = Some(source.clone());
        if self.features.sourceset {
            let component = Rc::downgrade(self.base.component());
            let src = source.src.clone();
            let scheduled = self.base.component().set_timeout(0, move || {
                if let Some(component) = component.upgrade() {
                    component.trigger(Event::new(SOURCESET).with_data(json!({ "src": src })));
                }
            });
            if let Err(e) = scheduled {
                warn!(error = %e, "sourceset not announced");
            }
        }
        self.element.set_src(&source.src);
    }

    fn current_src(&self) -> String {
        self.element.current_src()
    }

    fn play(&self) {
        self.element.play();
    }

    fn pause(&self) {
        self.element.pause();
    }

    fn paused(&self) -> bool {
        self.element.paused()
    }

    fn ended(&self) -> bool {
        self.element.ended()
    }

    fn current_time(&self) -> f64 {
        self.element.current_time()
    }

    fn set_current_time(&self, seconds: f64) {
        self.element.set_current_time(seconds);
    }

    fn duration(&self) -> f64 {
        self.element.duration()
    }

    fn volume(&self) -> f64 {
        self.element.volume()
    }

    fn set_volume(&self, volume: f64) {
        self.element.set_volume(volume);
    }

    fn muted(&self) -> bool {
        self.element.muted()
    }

    fn set_muted(&self, muted: bool) {
        self.element.set_muted(muted);
    }

    fn playback_rate(&self) -> f64 {
        self.element.playback_rate()
    }

    fn set_playback_rate(&self, rate: f64) {
        self.element.set_playback_rate(rate);
    }

    fn set_controls(&self, controls: bool) {
        self.element.set_controls(controls);
    }

    fn error(&self) -> Option<MediaError> {
        self.element.error()
    }

    fn supports_full_screen(&self) -> bool {
        self.element.supports_fullscreen()
    }

    fn enter_full_screen(&self) {
        self.element.enter_fullscreen();
    }

    fn exit_full_screen(&self) {
        self.element.exit_fullscreen();
    }

    fn tracks(&self, kind: TrackKind) -> Rc<TrackList> {
        self.base.tracks(kind)
    }

    fn dispose(&self) {
        self.base.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Listener;
    use crate::platform::BrowserCapabilities;
    use crate::simulated::{Headless, SimulatedPlatform};

    const ANDROID_STOCK: &str = "Mozilla/5.0 (Linux; U; Android 4.4.2; en-us; Nexus 5 Build/KOT49H) AppleWebKit/534.30 (KHTML, like Gecko) Version/4.0 Mobile Safari/534.30";
    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 12_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/12.1 Mobile/15E148 Safari/604.1";

    #[test]
    fn test_android_hls_patch() {
        let headless = Headless::new();
        let stock = SimulatedPlatform::new(headless.run_loop.clone())
            .with_capabilities(BrowserCapabilities::from_user_agent(ANDROID_STOCK));

        assert_eq!(Html5Factory.can_play_type(&stock, "application/x-mpegURL"), CanPlay::Maybe);
        assert_eq!(Html5Factory.can_play_type(&stock, "application/vnd.apple.mpegurl"), CanPlay::Maybe);
        assert_eq!(Html5Factory.can_play_type(&*headless.platform, "application/x-mpegURL"), CanPlay::No);
    }

    #[test]
    fn test_native_source_handler() {
        let headless = Headless::new();
        let platform = &*headless.platform;

        assert_eq!(
            Html5Factory.can_play_source(platform, &SourceDescriptor::new("movie.mp4")),
            CanPlay::Probably
        );
        // without a type only `video/<ext>` is asked
        assert_eq!(
            Html5Factory.can_play_source(platform, &SourceDescriptor::new("song.mp3")),
            CanPlay::No
        );
        assert_eq!(
            Html5Factory.can_play_source(platform, &SourceDescriptor::with_type("song.mp3", "audio/mpeg")),
            CanPlay::Probably
        );
        assert_eq!(Html5Factory.can_play_source(platform, &SourceDescriptor::new("stream")), CanPlay::No);
    }

    #[test]
    fn test_feature_probes() {
        let headless = Headless::new();
        let dom: Rc<dyn Dom> = headless.dom.clone();
        let features = Html5Factory::probe_features(&*headless.platform, &dom);
        assert!(features.volume_control);
        assert!(features.playback_rate);
        assert!(features.moving_media_element_in_dom);
        assert!(headless.dom.is_empty());

        let fixed = SimulatedPlatform::new(headless.run_loop.clone())
            .with_fixed_volume(true)
            .with_capabilities(BrowserCapabilities::from_user_agent(IPHONE));
        let features = Html5Factory::probe_features(&fixed, &dom);
        assert!(!features.volume_control);
        assert!(features.native_text_tracks);
        assert!(!features.moving_media_element_in_dom);
    }

    #[test]
    fn test_element_events_reach_component_until_dispose() {
        let headless = Headless::new();
        let ctx = Context::new(headless.host(), "html5_test");
        let tech = Html5Factory
            .create(&ctx, TechOptions::default().with_source(SourceDescriptor::new("movie.mp4")))
            .unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        tech.component().on(
            ["loadstart", "loadedmetadata", "canplay"],
            &Listener::new(move |event| sink.borrow_mut().push(event.event_type().to_string())),
        );

        headless.run_loop.advance(100);
        assert_eq!(*log.borrow(), vec!["loadstart", "loadedmetadata", "canplay"]);
        assert_eq!(tech.duration(), 30.0);
        assert_eq!(tech.current_src(), "movie.mp4");

        let element = headless.platform.elements().pop().unwrap();
        let node = tech.component().el().unwrap();
        tech.dispose();
        element.fire("canplay");
        assert_eq!(log.borrow().len(), 3);
        assert!(!headless.dom.contains(node));
        assert!(tech.is_disposed());
    }

    #[test]
    fn test_sourceset_precedes_loadstart() {
        let headless = Headless::new();
        let ctx = Context::new(headless.host(), "html5_sourceset");
        let tech = Html5Factory
            .create(&ctx, TechOptions::default().with_source(SourceDescriptor::new("movie.mp4")))
            .unwrap();
        assert!(tech.features().sourceset);

        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        tech.component().on(
            [SOURCESET, "loadstart"],
            &Listener::new(move |event| {
                let src = event.data()["src"].as_str().unwrap_or_default().to_string();
                sink.borrow_mut().push(format!("{}:{}", event.event_type(), src));
            }),
        );

        headless.run_loop.advance(10);
        assert_eq!(*log.borrow(), vec!["sourceset:movie.mp4", "loadstart:"]);

        tech.set_source(&SourceDescriptor::new("next.webm"));
        headless.run_loop.advance(10);
        assert_eq!(log.borrow()[2], "sourceset:next.webm");
    }

    #[test]
    fn test_no_sourceset_without_attribute_override() {
        let headless = Headless::with_platform(|platform| platform.with_capabilities(BrowserCapabilities::default()));
        let ctx = Context::new(headless.host(), "html5_no_sourceset");
        let tech = Html5Factory
            .create(&ctx, TechOptions::default().with_source(SourceDescriptor::new("movie.mp4")))
            .unwrap();
        assert!(!tech.features().sourceset);

        let fired = Rc::new(RefCell::new(0));
        let count = fired.clone();
        tech.component()
            .on(SOURCESET, &Listener::new(move |_| *count.borrow_mut() += 1));
        headless.run_loop.advance(100);
        assert_eq!(*fired.borrow(), 0);
    }
}
