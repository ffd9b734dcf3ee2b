//! Track lists
//!
//! Each tech owns one evented list per track kind. Lists emit `addtrack`,
//! `removetrack` and `change` with the affected track in `track`.

use crate::events::{Event, EventRegistry, Evented};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

pub const ADD_TRACK: &str = "addtrack";
pub const REMOVE_TRACK: &str = "removetrack";
pub const CHANGE: &str = "change";

/// Which list a track belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Text,
}

impl TrackKind {
    /// Whether enabling one track disables the others in the list
    pub fn is_exclusive(&self) -> bool {
        matches!(self, TrackKind::Video | TrackKind::Audio)
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Text => write!(f, "text"),
        }
    }
}

/// A media track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    /// Role within its list: `main`, `alternative`, `subtitles`, `captions`, ...
    pub kind: String,
    pub label: String,
    pub language: String,
    /// Enabled/selected for audio and video, showing for text
    pub enabled: bool,
}

impl Track {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            kind: kind.into(),
            label: String::new(),
            language: String::new(),
            enabled: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// An evented list of tracks of one kind
#[derive(Debug)]
pub struct TrackList {
    kind: TrackKind,
    tracks: RefCell<Vec<Track>>,
    events: EventRegistry,
}

impl TrackList {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            tracks: RefCell::new(Vec::new()),
            events: EventRegistry::new(),
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.tracks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.borrow().is_empty()
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.tracks.borrow().clone()
    }

    pub fn get_track_by_id(&self, id: &str) -> Option<Track> {
        self.tracks.borrow().iter().find(|t| t.id == id).cloned()
    }

    fn notify(&self, event_type: &str, track: &Track) {
        let track = serde_json::to_value(track).unwrap_or(Value::Null);
        self.dispatch(&Event::new(event_type).with_data(json!({ "track": track })));
    }

    /// Append a track. A track whose id is already listed is not added
    /// twice, but `addtrack` still fires.
    pub fn add_track(&self, track: Track) {
        {
            let mut tracks = self.tracks.borrow_mut();
            if !tracks.iter().any(|t| t.id == track.id) {
                if self.kind.is_exclusive() && track.enabled {
                    for other in tracks.iter_mut() {
                        other.enabled = false;
                    }
                }
                tracks.push(track.clone());
            }
        }
        debug!(kind = %self.kind, id = %track.id, "Track added");
        self.notify(ADD_TRACK, &track);
    }

    /// Remove a track. Unknown ids are a no-op.
    pub fn remove_track(&self, id: &str) -> Option<Track> {
        let removed = {
            let mut tracks = self.tracks.borrow_mut();
            let position = tracks.iter().position(|t| t.id == id)?;
            tracks.remove(position)
        };
        self.notify(REMOVE_TRACK, &removed);
        Some(removed)
    }

    /// Enable or disable a track, firing `change` when something changed.
    /// Enabling a video or audio track disables its siblings.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let changed = {
            let mut tracks = self.tracks.borrow_mut();
            let Some(position) = tracks.iter().position(|t| t.id == id) else {
                return false;
            };
            let mut changed = tracks[position].enabled != enabled;
            tracks[position].enabled = enabled;
            if enabled && self.kind.is_exclusive() {
                for (index, other) in tracks.iter_mut().enumerate() {
                    if index != position && other.enabled {
                        other.enabled = false;
                        changed = true;
                    }
                }
            }
            changed.then(|| tracks[position].clone())
        };

        match changed {
            Some(track) => {
                self.notify(CHANGE, &track);
                true
            }
            None => false,
        }
    }

    /// Remove every track, one `removetrack` each
    pub fn clear(&self) {
        let ids: Vec<String> = self.tracks.borrow().iter().map(|t| t.id.clone()).collect();
        for id in ids {
            self.remove_track(&id);
        }
    }
}

impl Evented for TrackList {
    fn events(&self) -> &EventRegistry {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Listener;
    use std::rc::Rc;

    fn collect(list: &TrackList) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        list.on(
            [ADD_TRACK, REMOVE_TRACK, CHANGE],
            &Listener::new(move |event| {
                let id = event.get("track").and_then(|t| t.get("id")).and_then(Value::as_str);
                sink.borrow_mut()
                    .push(format!("{}:{}", event.event_type(), id.unwrap_or("?")));
            }),
        );
        log
    }

    #[test]
    fn test_add_remove_events() {
        let list = TrackList::new(TrackKind::Text);
        let log = collect(&list);

        list.add_track(Track::new("subtitles").with_id("en"));
        list.add_track(Track::new("subtitles").with_id("en"));
        assert_eq!(list.len(), 1);
        assert!(list.get_track_by_id("en").is_some());

        assert!(list.remove_track("en").is_some());
        assert!(list.remove_track("en").is_none());
        assert_eq!(*log.borrow(), vec!["addtrack:en", "addtrack:en", "removetrack:en"]);
    }

    #[test]
    fn test_exclusive_enable() {
        let list = TrackList::new(TrackKind::Audio);
        list.add_track(Track::new("main").with_id("a").enabled(true));
        list.add_track(Track::new("alternative").with_id("b"));
        let log = collect(&list);

        assert!(list.set_enabled("b", true));
        assert!(!list.get_track_by_id("a").unwrap().enabled);
        assert!(!list.set_enabled("b", true));
        assert!(!list.set_enabled("missing", true));
        assert_eq!(*log.borrow(), vec!["change:b"]);
    }

    #[test]
    fn test_text_tracks_not_exclusive() {
        let list = TrackList::new(TrackKind::Text);
        list.add_track(Track::new("subtitles").with_id("en").enabled(true));
        list.add_track(Track::new("captions").with_id("fr"));
        list.set_enabled("fr", true);
        assert!(list.tracks().iter().all(|t| t.enabled));
    }

    #[test]
    fn test_clear() {
        let list = TrackList::new(TrackKind::Video);
        list.add_track(Track::new("main"));
        list.add_track(Track::new("alternative"));
        let log = collect(&list);
        list.clear();
        assert!(list.is_empty());
        assert_eq!(log.borrow().len(), 2);
    }
}
