//! Playback backends
//!
//! A tech wraps one media element behind the uniform [`Tech`] interface.
//! Techs are never bound statically: a [`TechFactory`] answers support
//! probes for a source and [`select_source`] picks the backend.

pub mod registry;

#[cfg(feature = "html5")]
pub mod html5;

use crate::component::Component;
use crate::error::Result;
use crate::host::Context;
use crate::media_error::MediaError;
use crate::options::{PlayerConfig, Preload};
use crate::platform::Platform;
use crate::source::{SourceDescriptor, Sources};
use crate::tracks::{Track, TrackKind, TrackList};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

pub use registry::{get_tech, ordered_techs, register_tech, reset_techs, tech_names, unregister_tech, TechRegistry};

/// Media events every tech emits on its component
pub const TECH_EVENTS: [&str; 23] = [
    "loadstart",
    "suspend",
    "abort",
    "error",
    "emptied",
    "stalled",
    "loadedmetadata",
    "loadeddata",
    "canplay",
    "canplaythrough",
    "playing",
    "waiting",
    "seeking",
    "seeked",
    "ended",
    "durationchange",
    "timeupdate",
    "progress",
    "play",
    "pause",
    "ratechange",
    "resize",
    "volumechange",
];

/// Fired by techs that can observe source changes, with `{src}`
pub const SOURCESET: &str = "sourceset";

/// Events the player takes from its tech: the media catalogue plus
/// `sourceset`
pub fn forwarded_events() -> Vec<&'static str> {
    TECH_EVENTS.iter().copied().chain([SOURCESET]).collect()
}

/// Support level, ordered `No < Maybe < Probably`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanPlay {
    #[default]
    No,
    Maybe,
    Probably,
}

impl CanPlay {
    /// The `canPlayType` string form; unsupported is `""`
    pub fn as_str(&self) -> &'static str {
        match self {
            CanPlay::No => "",
            CanPlay::Maybe => "maybe",
            CanPlay::Probably => "probably",
        }
    }

    pub fn parse(answer: &str) -> Self {
        match answer.trim().to_ascii_lowercase().as_str() {
            "probably" => CanPlay::Probably,
            "maybe" => CanPlay::Maybe,
            _ => CanPlay::No,
        }
    }

    pub fn is_supported(&self) -> bool {
        *self != CanPlay::No
    }
}

impl fmt::Display for CanPlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanPlay::No => write!(f, "no"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Capability flags of a tech instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechFeatures {
    pub volume_control: bool,
    pub fullscreen_resize: bool,
    pub playback_rate: bool,
    pub progress_events: bool,
    pub timeupdate_events: bool,
    pub sourceset: bool,
    pub native_text_tracks: bool,
    pub native_audio_tracks: bool,
    pub native_video_tracks: bool,
    pub moving_media_element_in_dom: bool,
}

impl Default for TechFeatures {
    fn default() -> Self {
        Self {
            volume_control: true,
            fullscreen_resize: false,
            playback_rate: false,
            progress_events: false,
            timeupdate_events: false,
            sourceset: false,
            native_text_tracks: false,
            native_audio_tracks: false,
            native_video_tracks: false,
            moving_media_element_in_dom: true,
        }
    }
}

/// What a tech is created with
#[derive(Debug, Clone, PartialEq)]
pub struct TechOptions {
    pub source: Option<SourceDescriptor>,
    pub autoplay: bool,
    pub looping: bool,
    pub muted: bool,
    pub volume: f64,
    pub playback_rate: f64,
    pub preload: Preload,
    pub controls: bool,
}

impl Default for TechOptions {
    fn default() -> Self {
        Self::from(&PlayerConfig::default())
    }
}

impl From<&PlayerConfig> for TechOptions {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            source: None,
            autoplay: config.autoplay,
            looping: config.looping,
            muted: config.muted,
            volume: config.volume,
            playback_rate: config.playback_rate,
            preload: config.preload,
            controls: config.controls,
        }
    }
}

impl TechOptions {
    pub fn with_source(mut self, source: SourceDescriptor) -> Self {
        self.source = Some(source);
        self
    }
}

/// The uniform playback interface
pub trait Tech {
    /// Event surface and element owner
    fn component(&self) -> &Rc<Component>;

    fn tech_name(&self) -> &str;

    fn features(&self) -> TechFeatures;

    fn source(&self) -> Option<SourceDescriptor>;
    fn set_source(&self, source: &SourceDescriptor);
    fn current_src(&self) -> String;

    fn play(&self);
    fn pause(&self);
    fn paused(&self) -> bool;
    fn ended(&self) -> bool;

    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    fn duration(&self) -> f64;

    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64);
    fn muted(&self) -> bool;
    fn set_muted(&self, muted: bool);

    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);

    fn set_controls(&self, _controls: bool) {}

    fn error(&self) -> Option<MediaError>;

    fn supports_full_screen(&self) -> bool {
        false
    }
    fn enter_full_screen(&self) {}
    fn exit_full_screen(&self) {}

    fn tracks(&self, kind: TrackKind) -> Rc<TrackList>;

    /// Create and list a text track
    fn add_text_track(&self, kind: &str, label: &str, language: &str) -> Track {
        let track = Track::new(kind).with_label(label).with_language(language);
        self.tracks(TrackKind::Text).add_track(track.clone());
        track
    }

    fn dispose(&self);

    fn is_disposed(&self) -> bool {
        self.component().is_disposed()
    }
}

/// State shared by tech implementations
#[derive(Debug)]
pub struct TechBase {
    component: Rc<Component>,
    video_tracks: Rc<TrackList>,
    audio_tracks: Rc<TrackList>,
    text_tracks: Rc<TrackList>,
}

impl TechBase {
    pub fn new(component: Rc<Component>) -> Self {
        component.add_class("kino-tech");
        Self {
            component,
            video_tracks: Rc::new(TrackList::new(TrackKind::Video)),
            audio_tracks: Rc::new(TrackList::new(TrackKind::Audio)),
            text_tracks: Rc::new(TrackList::new(TrackKind::Text)),
        }
    }

    pub fn component(&self) -> &Rc<Component> {
        &self.component
    }

    pub fn tracks(&self, kind: TrackKind) -> Rc<TrackList> {
        match kind {
            TrackKind::Video => self.video_tracks.clone(),
            TrackKind::Audio => self.audio_tracks.clone(),
            TrackKind::Text => self.text_tracks.clone(),
        }
    }

    /// Empty every track list and dispose the component
    pub fn dispose(&self) {
        for list in [&self.video_tracks, &self.audio_tracks, &self.text_tracks] {
            list.clear();
        }
        self.component.dispose();
    }
}

/// A registered backend: support probes plus construction
pub trait TechFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the backend works on this platform at all
    fn is_supported(&self, platform: &dyn Platform) -> bool;

    fn can_play_type(&self, platform: &dyn Platform, mime: &str) -> CanPlay;

    fn can_play_source(&self, platform: &dyn Platform, source: &SourceDescriptor) -> CanPlay {
        match source.mime_type() {
            Some(mime) => self.can_play_type(platform, &mime),
            None => CanPlay::No,
        }
    }

    fn create(&self, ctx: &Context, options: TechOptions) -> Result<Rc<dyn Tech>>;
}

/// The source and backend chosen for playback
#[derive(Clone)]
pub struct Selection {
    pub source: SourceDescriptor,
    pub tech: Arc<dyn TechFactory>,
    pub support: CanPlay,
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("source", &self.source)
            .field("tech", &self.tech.name())
            .field("support", &self.support)
            .finish()
    }
}

/// Pick the first source some tech supports, and for it the first tech
/// (in precedence order) answering anything but `No`.
pub fn select_source(
    sources: &Sources,
    techs: &[Arc<dyn TechFactory>],
    platform: &dyn Platform,
) -> Option<Selection> {
    let usable: Vec<&Arc<dyn TechFactory>> =
        techs.iter().filter(|tech| tech.is_supported(platform)).collect();

    for source in sources.iter() {
        for tech in &usable {
            let support = tech.can_play_source(platform, source);
            if support.is_supported() {
                return Some(Selection {
                    source: source.normalized(),
                    tech: Arc::clone(tech),
                    support,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runloop::RunLoop;
    use crate::simulated::SimulatedPlatform;
    use crate::error::Error;
    use std::collections::HashMap;

    struct Canned {
        name: &'static str,
        answers: HashMap<&'static str, CanPlay>,
        supported: bool,
    }

    impl Canned {
        fn new(name: &'static str, answers: &[(&'static str, CanPlay)]) -> Arc<dyn TechFactory> {
            Arc::new(Self {
                name,
                answers: answers.iter().copied().collect(),
                supported: true,
            })
        }
    }

    impl TechFactory for Canned {
        fn name(&self) -> &str {
            self.name
        }

        fn is_supported(&self, _platform: &dyn Platform) -> bool {
            self.supported
        }

        fn can_play_type(&self, _platform: &dyn Platform, mime: &str) -> CanPlay {
            self.answers.get(mime).copied().unwrap_or_default()
        }

        fn create(&self, _ctx: &Context, _options: TechOptions) -> Result<Rc<dyn Tech>> {
            Err(Error::TechCreation("selection only".into()))
        }
    }

    fn platform() -> SimulatedPlatform {
        SimulatedPlatform::new(Rc::new(RunLoop::new()))
    }

    #[test]
    fn test_equal_levels_prefer_earlier_tech() {
        let a = Canned::new("A", &[("video/x-test", CanPlay::Maybe)]);
        let b = Canned::new("B", &[("video/x-test", CanPlay::Maybe)]);
        let sources = Sources::from(SourceDescriptor::with_type("clip", "video/x-test"));

        let selection = select_source(&sources, &[a, b], &platform()).unwrap();
        assert_eq!(selection.tech.name(), "A");
        assert_eq!(selection.support, CanPlay::Maybe);
    }

    #[test]
    fn test_empty_answer_falls_through() {
        let a = Canned::new("A", &[]);
        let b = Canned::new("B", &[("video/x-test", CanPlay::Probably)]);
        let sources = Sources::from(SourceDescriptor::with_type("clip", "video/x-test"));

        let selection = select_source(&sources, &[a, b], &platform()).unwrap();
        assert_eq!(selection.tech.name(), "B");
    }

    #[test]
    fn test_earlier_tech_wins_regardless_of_level() {
        let a = Canned::new("A", &[("video/mp4", CanPlay::Maybe)]);
        let b = Canned::new("B", &[("video/mp4", CanPlay::Probably)]);
        let selection = select_source(&Sources::from("movie.mp4"), &[a, b], &platform()).unwrap();
        assert_eq!(selection.tech.name(), "A");
        assert_eq!(selection.support, CanPlay::Maybe);
        assert_eq!(selection.source.mime.as_deref(), Some("video/mp4"));
    }

    #[test]
    fn test_source_order_comes_first() {
        let a = Canned::new("A", &[("video/webm", CanPlay::Maybe), ("video/mp4", CanPlay::Probably)]);
        let sources = Sources(vec![
            SourceDescriptor::new("first.webm"),
            SourceDescriptor::new("second.mp4"),
        ]);
        let selection = select_source(&sources, &[a], &platform()).unwrap();
        assert_eq!(selection.source.src, "first.webm");
    }

    #[test]
    fn test_nothing_playable() {
        let a = Canned::new("A", &[("video/mp4", CanPlay::Probably)]);
        assert!(select_source(&Sources::from("clip.flv"), &[a.clone()], &platform()).is_none());
        assert!(select_source(&Sources::default(), &[a], &platform()).is_none());

        let disabled: Arc<dyn TechFactory> = Arc::new(Canned {
            name: "Off",
            answers: [("video/mp4", CanPlay::Probably)].into_iter().collect(),
            supported: false,
        });
        assert!(select_source(&Sources::from("clip.mp4"), &[disabled], &platform()).is_none());
    }

    #[test]
    fn test_can_play_strings() {
        assert_eq!(CanPlay::parse("Probably"), CanPlay::Probably);
        assert_eq!(CanPlay::parse(""), CanPlay::No);
        assert_eq!(CanPlay::Maybe.as_str(), "maybe");
        assert!(CanPlay::Probably > CanPlay::Maybe && CanPlay::Maybe > CanPlay::No);
    }
}
