//! End-to-end behaviour of the player core on the headless host

use kino_player::events::DISPOSE;
use kino_player::options::to_options;
use kino_player::simulated::{Headless, LOAD_DELAY_MS};
use kino_player::stateful::StateBag;
use kino_player::tech::registry::TechRegistry;
use kino_player::{
    register_component, register_tech, select_source, CanPlay, Component, Container, Context, Dom, Error,
    Event, Evented, Listener, MediaError, MediaErrorCode, Options, Platform, Player, SourceDescriptor,
    Sources, Stateful, Tech, TechFactory, TechOptions, Widget,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

fn opts(value: Value) -> Options {
    to_options(value).unwrap()
}

fn new_player(headless: &Headless, options: Value) -> Rc<Player> {
    Player::new(headless.host(), opts(options)).unwrap()
}

type Log = Rc<RefCell<Vec<String>>>;

fn recorder(log: &Log, label: &str) -> Listener {
    let log = log.clone();
    let label = label.to_string();
    Listener::new(move |event| log.borrow_mut().push(format!("{}:{}", label, event.event_type())))
}

/// Answers a fixed support level for one MIME type
struct Canned {
    name: &'static str,
    mime: &'static str,
    level: CanPlay,
}

impl TechFactory for Canned {
    fn name(&self) -> &str {
        self.name
    }

    fn is_supported(&self, _platform: &dyn Platform) -> bool {
        true
    }

    fn can_play_type(&self, _platform: &dyn Platform, mime: &str) -> CanPlay {
        if mime == self.mime {
            self.level
        } else {
            CanPlay::No
        }
    }

    fn create(&self, _ctx: &Context, _options: TechOptions) -> kino_player::Result<Rc<dyn Tech>> {
        Err(Error::TechCreation(format!("{} cannot be constructed", self.name)))
    }
}

fn canned(name: &'static str, mime: &'static str, level: CanPlay) -> Arc<dyn TechFactory> {
    Arc::new(Canned { name, mime, level })
}

#[test]
fn test_on_off_sequence_leaves_registered_minus_removed() {
    let headless = Headless::new();
    let player = new_player(&headless, json!({}));
    let log: Log = Rc::default();
    let (a, b, c) = (recorder(&log, "a"), recorder(&log, "b"), recorder(&log, "c"));

    player.on("x", &a);
    player.on("x", &b);
    player.on("x", &c);
    player.on("x", &a);
    player.off("x", &b);
    player.off("y", &c);
    player.trigger("x");

    assert_eq!(*log.borrow(), vec!["a:x", "c:x"]);
}

#[test]
fn test_one_fires_once_total() {
    let headless = Headless::new();
    let player = new_player(&headless, json!({}));
    let log: Log = Rc::default();
    player.one(["x", "y"], &recorder(&log, "h"));

    player.trigger("x");
    player.trigger("x");
    player.trigger("y");
    assert_eq!(*log.borrow(), vec!["h:x"]);
}

#[test]
fn test_set_state_reports_only_changed_keys() {
    let headless = Headless::new();
    let player = new_player(&headless, json!({}));
    let component = player.component();
    let log: Log = Rc::default();
    component.on("statechanged", &recorder(&log, "state"));

    assert!(component.set_state(json!({"a": 1})).is_some());
    assert!(component.set_state(json!({"a": 1})).is_none());
    assert_eq!(log.borrow().len(), 1);

    let changes = component.set_state(json!({"a": 1, "b": 2})).unwrap();
    assert_eq!(changes.keys().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(changes["b"].from, Value::Null);
    assert_eq!(changes["b"].to, json!(2));
    assert_eq!(component.state_value("a"), Some(json!(1)));
}

#[test]
fn test_state_bag_standalone() {
    struct Settings {
        bag: StateBag,
    }

    impl Stateful for Settings {
        fn state_bag(&self) -> &StateBag {
            &self.bag
        }
    }

    let settings = Settings { bag: StateBag::new() };
    assert!(settings.set_state(json!({"quality": "hd"})).is_some());
    assert!(settings.set_state(json!({"quality": "hd"})).is_none());
}

#[test]
fn test_dispose_children_before_parent_once() {
    struct Tracked {
        label: String,
        log: Log,
    }

    impl Widget for Tracked {
        fn name(&self) -> &str {
            &self.label
        }

        fn dispose(&self, _component: &Component) {
            self.log.borrow_mut().push(format!("teardown:{}", self.label));
        }
    }

    let headless = Headless::new();
    let ctx = Context::new(headless.host(), "tree");
    let log: Log = Rc::default();
    let tracked = |label: &str| {
        Component::new(
            &ctx,
            Options::new(),
            Box::new(Tracked {
                label: label.to_string(),
                log: log.clone(),
            }),
        )
        .unwrap()
    };

    let parent = tracked("Parent");
    for label in ["One", "Two", "Three"] {
        parent.add_child(tracked(label), Options::new(), None).unwrap();
    }
    parent.on(DISPOSE, &recorder(&log, "event"));

    parent.dispose();
    parent.dispose();

    let log = log.borrow();
    let parent_teardown = log.iter().position(|l| l == "teardown:Parent").unwrap();
    for label in ["One", "Two", "Three"] {
        let child = log.iter().position(|l| *l == format!("teardown:{}", label)).unwrap();
        assert!(child < parent_teardown);
    }
    assert_eq!(log.iter().filter(|l| *l == "event:dispose").count(), 1);
    assert_eq!(log.iter().filter(|l| *l == "teardown:Parent").count(), 1);
    assert!(headless.dom.is_empty());
}

#[test]
fn test_tech_selection_precedence() {
    let headless = Headless::new();
    let platform = &*headless.platform;

    let both_maybe = [
        canned("SelA", "video/x-sel", CanPlay::Maybe),
        canned("SelB", "video/x-sel", CanPlay::Maybe),
    ];
    let source = Sources::from(SourceDescriptor::with_type("a.sel", "video/x-sel"));
    let selection = select_source(&source, &both_maybe, platform).unwrap();
    assert_eq!(selection.tech.name(), "SelA");

    let b_only = [
        canned("SelA", "video/x-other", CanPlay::Maybe),
        canned("SelB", "video/x-sel", CanPlay::Probably),
    ];
    let selection = select_source(&source, &b_only, platform).unwrap();
    assert_eq!(selection.tech.name(), "SelB");
    assert_eq!(selection.support, CanPlay::Probably);
}

#[test]
fn test_registry_order_drives_selection() {
    let headless = Headless::new();
    let mut registry = TechRegistry::empty();
    registry.register(canned("First", "video/x-reg", CanPlay::Maybe)).unwrap();
    registry.register(canned("Second", "video/x-reg", CanPlay::Probably)).unwrap();

    let techs = registry.ordered(&[]).unwrap();
    let source = Sources::from(SourceDescriptor::with_type("a.reg", "video/x-reg"));
    let selection = select_source(&source, &techs, &*headless.platform).unwrap();
    assert_eq!(selection.tech.name(), "First");
    assert_eq!(selection.support, CanPlay::Maybe);

    let techs = registry.ordered(&["Second".to_string(), "First".to_string()]).unwrap();
    let selection = select_source(&source, &techs, &*headless.platform).unwrap();
    assert_eq!(selection.tech.name(), "Second");
}

#[test]
fn test_source_swap_never_leaves_zero_techs() {
    let headless = Headless::new();
    let player = new_player(&headless, json!({"sources": ["first.mp4"]}));
    player.play();
    headless.run_loop.advance(LOAD_DELAY_MS + 500);
    assert!(!player.paused());

    let old_component = player.with_tech(|tech| tech.component().clone()).unwrap();
    let log: Log = Rc::default();
    player.on(["timeupdate", "loadstart"], &recorder(&log, "player"));

    player.src("second.webm");
    assert!(player.is_switching());
    assert_eq!(player.tech_name().as_deref(), Some("Html5"));
    assert!(Rc::ptr_eq(&player.with_tech(|t| t.component().clone()).unwrap(), &old_component));
    assert!(!old_component.is_disposed());

    headless.run_loop.advance(5);
    assert!(!player.is_switching());
    assert!(old_component.is_disposed());
    assert_eq!(player.current_source().unwrap().src, "second.webm");

    log.borrow_mut().clear();
    old_component.trigger("timeupdate");
    assert!(log.borrow().is_empty());

    headless.run_loop.advance(LOAD_DELAY_MS);
    assert_eq!(player.duration(), 30.0);
    assert_eq!(player.el().map(|el| headless.dom.children(el).len()), Some(1));
}

#[test]
fn test_no_events_lost_during_swap() {
    let headless = Headless::new();
    let player = new_player(&headless, json!({}));
    let log: Log = Rc::default();
    player.on(["loadstart", "loadedmetadata", "canplay"], &recorder(&log, "p"));

    player.src("movie.mp4");
    headless.run_loop.advance(LOAD_DELAY_MS + 1);
    assert_eq!(*log.borrow(), vec!["p:loadstart", "p:loadedmetadata", "p:canplay"]);
}

#[test]
fn test_queued_sources_load_in_order() {
    let headless = Headless::new();
    let player = new_player(&headless, json!({}));
    let sources: Log = Rc::default();
    let sink = sources.clone();
    let weak = Rc::downgrade(&player);
    player.on(
        "loadstart",
        &Listener::new(move |_| {
            if let Some(player) = weak.upgrade() {
                sink.borrow_mut().push(player.current_src());
            }
        }),
    );

    player.src("one.mp4");
    player.src("two.mp4");
    player.src("three.mp4");
    headless.run_loop.advance(50);

    assert_eq!(player.current_src(), "three.mp4");
    assert_eq!(sources.borrow().last().map(String::as_str), Some("three.mp4"));
}

#[test]
fn test_bubbling_reaches_parent_without_local_handler() {
    let headless = Headless::new();
    let player = new_player(&headless, json!({}));
    let child = player.add_child("Component", Options::new(), None).unwrap();
    let log: Log = Rc::default();
    player.on("x", &recorder(&log, "player"));

    child.trigger("x");
    child.trigger(Event::new("x").non_bubbling());
    assert_eq!(*log.borrow(), vec!["player:x"]);
}

#[test]
fn test_unsupported_source_reports_error_asynchronously() {
    let headless = Headless::new();
    let player = new_player(&headless, json!({"notSupportedMessage": "Nothing to play"}));
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = errors.clone();
    player.on(
        "error",
        &Listener::new(move |event| sink.borrow_mut().push(MediaError::from_value(event.data()))),
    );

    player.src(SourceDescriptor::with_type("clip.xyz", "video/x-unknown"));
    assert!(errors.borrow().is_empty());

    headless.run_loop.advance(1);
    let errors = errors.borrow();
    let error = errors[0].as_ref().unwrap();
    assert_eq!(error.code, MediaErrorCode::SrcNotSupported);
    assert_eq!(error.message, "Nothing to play");
    assert!(player.component().has_class("kino-error"));
}

#[test]
fn test_playback_error_surfaces_as_event() {
    let headless = Headless::with_platform(|p| p.fail_source("broken.mp4", MediaErrorCode::Network));
    let player = new_player(&headless, json!({"sources": ["broken.mp4"]}));
    let log: Log = Rc::default();
    player.on("error", &recorder(&log, "player"));

    headless.run_loop.advance(LOAD_DELAY_MS + 5);
    assert_eq!(*log.borrow(), vec!["player:error"]);
    assert_eq!(player.error().map(|e| e.code), Some(MediaErrorCode::Network));

    player.src("fine.mp4");
    headless.run_loop.advance(LOAD_DELAY_MS + 5);
    assert!(player.error().is_none());
    assert!(!player.component().has_class("kino-error"));
}

#[test]
fn test_tech_creation_failure_keeps_player_usable() {
    register_tech(canned("IntegrationBroken", "video/x-broken", CanPlay::Probably)).unwrap();
    let headless = Headless::new();
    let player = new_player(&headless, json!({"techOrder": ["IntegrationBroken", "Html5"]}));
    let log: Log = Rc::default();
    player.on("error", &recorder(&log, "player"));

    player.src(SourceDescriptor::with_type("a.broken", "video/x-broken"));
    assert_eq!(*log.borrow(), vec!["player:error"]);
    assert_eq!(player.error().map(|e| e.code), Some(MediaErrorCode::Custom));

    player.src("movie.mp4");
    headless.run_loop.advance(5);
    assert_eq!(player.tech_name().as_deref(), Some("Html5"));
}

#[test]
fn test_declarative_children_from_registry() {
    struct Badge;

    impl Widget for Badge {
        fn name(&self) -> &str {
            "IntegrationBadge"
        }

        fn css_class(&self) -> Option<String> {
            Some("kino-badge".to_string())
        }
    }

    register_component("IntegrationBadge", || Box::new(Badge) as Box<dyn Widget>).unwrap();
    assert!(matches!(
        register_component("Component", || Box::new(Container) as Box<dyn Widget>),
        Err(Error::BuiltinConflict { .. })
    ));

    let headless = Headless::new();
    let player = new_player(
        &headless,
        json!({"children": ["IntegrationBadge"], "IntegrationBadge": {"id": "badge"}}),
    );
    let badge = player.component().get_child("IntegrationBadge").unwrap();
    assert_eq!(badge.id(), "badge");
    assert!(badge.has_class("kino-badge"));
    assert!(Rc::ptr_eq(&badge.player().unwrap(), &player));

    let err = Player::new(headless.host(), opts(json!({"children": ["IntegrationMissing"]}))).unwrap_err();
    assert!(matches!(err, Error::UnknownComponent(_)));
}

#[test]
fn test_invalid_options_fail_fast() {
    let headless = Headless::new();
    let err = Player::new(headless.host(), opts(json!({"volume": "loud"}))).unwrap_err();
    assert!(err.is_configuration());
    let err = Player::new(headless.host(), opts(json!({"volume": 3.0}))).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_dispose_detaches_everything() {
    let headless = Headless::new();
    let player = new_player(&headless, json!({"sources": ["movie.mp4"], "autoplay": true}));
    headless.run_loop.advance(LOAD_DELAY_MS + 300);
    assert!(!player.paused());

    let log: Log = Rc::default();
    player.on(["dispose", "timeupdate"], &recorder(&log, "player"));
    player.dispose();
    player.dispose();
    headless.run_loop.run_until_idle();

    assert_eq!(*log.borrow(), vec!["player:dispose"]);
    assert!(headless.dom.is_empty());
    assert!(player.component().is_disposed());
}
