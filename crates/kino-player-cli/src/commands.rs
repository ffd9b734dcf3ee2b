//! CLI command implementations

use crate::output::{format_rows, OutputFormat};
use crate::timeline::{format_time, Timeline, TIMELINE};
use anyhow::Context as _;
use kino_player::options::to_options;
use kino_player::simulated::Headless;
use kino_player::tech::{ordered_techs, select_source};
use kino_player::{
    component_names, get_component, register_component, tech_names, BrowserCapabilities, CanPlay,
    Event, Evented, Listener, MediaErrorCode, Options, Player, SourceDescriptor, Sources, Widget,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tabled::Tabled;
use tracing::{debug, info};

/// Events shown in the playback log
const LOGGED_EVENTS: [&str; 18] = [
    "sourceset",
    "loadstart",
    "durationchange",
    "loadedmetadata",
    "canplay",
    "play",
    "playing",
    "waiting",
    "pause",
    "seeked",
    "ended",
    "emptied",
    "error",
    "volumechange",
    "ratechange",
    "ready",
    "fullscreenchange",
    "timeupdate",
];

/// Wall-clock pacing of the simulated clock
const FRAME_MS: u64 = 50;

#[derive(Debug, Serialize, Tabled)]
struct RegistryRow {
    kind: String,
    name: String,
}

/// List registered techs and components
pub fn techs(format: OutputFormat) -> anyhow::Result<()> {
    let rows: Vec<RegistryRow> = tech_names()
        .into_iter()
        .map(|name| RegistryRow {
            kind: "tech".to_string(),
            name,
        })
        .chain(component_names().into_iter().map(|name| RegistryRow {
            kind: "component".to_string(),
            name,
        }))
        .collect();

    match format_rows(&rows, format) {
        Some(rendered) => println!("{}", rendered),
        None => {
            println!("Techs (precedence order):");
            for row in rows.iter().filter(|r| r.kind == "tech") {
                println!("  {}", row.name);
            }
            println!("\nComponents:");
            for row in rows.iter().filter(|r| r.kind == "component") {
                println!("  {}", row.name);
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
struct ProbeRow {
    tech: String,
    supported: bool,
    answer: String,
}

/// Report what each tech answers for a source
pub fn probe(
    src: &str,
    mime: Option<String>,
    tech_order: &[String],
    user_agent: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let headless = Headless::with_platform(|platform| match &user_agent {
        Some(ua) => platform.with_capabilities(BrowserCapabilities::from_user_agent(ua)),
        None => platform,
    });
    let platform = &*headless.platform;

    let source = match mime {
        Some(mime) => SourceDescriptor::with_type(src, mime),
        None => SourceDescriptor::new(src),
    }
    .normalized();
    let techs = ordered_techs(tech_order)?;

    let rows: Vec<ProbeRow> = techs
        .iter()
        .map(|tech| {
            let supported = tech.is_supported(platform);
            let answer = if supported {
                tech.can_play_source(platform, &source)
            } else {
                CanPlay::No
            };
            ProbeRow {
                tech: tech.name().to_string(),
                supported,
                answer: answer.to_string(),
            }
        })
        .collect();
    let selection = select_source(&Sources::from(source.clone()), &techs, platform);

    match format_rows(&rows, format) {
        Some(rendered) => println!("{}", rendered),
        None => {
            println!("Source: {}", source);
            for row in &rows {
                let note = if row.supported { "" } else { " (unavailable)" };
                println!("  {:<12} {}{}", row.tech, row.answer, note);
            }
        }
    }
    match selection {
        Some(selection) => println!("\nSelected: {} ({})", selection.tech.name(), selection.support),
        None => println!("\nSelected: none (no compatible source)"),
    }
    Ok(())
}

/// Options of a simulated playback session
#[derive(Debug, Clone)]
pub struct PlayArgs {
    pub sources: Vec<String>,
    pub seconds: f64,
    pub speed: f64,
    pub volume: Option<f64>,
    pub rate: Option<f64>,
    pub seek: Option<f64>,
    pub fail: Vec<String>,
    pub options: Option<PathBuf>,
}

#[derive(Debug, Serialize, Tabled)]
struct EventRow {
    at_ms: u64,
    event: String,
    position: String,
    detail: String,
}

fn load_options(path: Option<&PathBuf>) -> anyhow::Result<Options> {
    let Some(path) = path else {
        return Ok(Options::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading options file {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing options file {}", path.display()))?;
    Ok(to_options(value)?)
}

fn event_detail(event: &Event) -> String {
    match event.data() {
        Value::Null => String::new(),
        Value::Object(map) if map.is_empty() => String::new(),
        data => data.to_string(),
    }
}

/// Run a simulated playback session and print the player's event log
pub async fn play(args: PlayArgs, format: OutputFormat) -> anyhow::Result<()> {
    if get_component(TIMELINE).is_none() {
        register_component(TIMELINE, || Box::new(Timeline) as Box<dyn Widget>)?;
    }

    let mut options = load_options(args.options.as_ref())?;
    options.insert("sources".to_string(), json!(args.sources));
    options.insert("autoplay".to_string(), json!(true));
    options
        .entry("children")
        .or_insert_with(|| json!([TIMELINE]));
    if let Some(volume) = args.volume {
        options.insert("volume".to_string(), json!(volume));
    }
    if let Some(rate) = args.rate {
        options.insert("playbackRate".to_string(), json!(rate));
    }

    let headless = Headless::with_platform(|platform| {
        args.fail
            .iter()
            .fold(platform, |platform, src| platform.fail_source(src, MediaErrorCode::Network))
    });
    let run_loop = headless.run_loop.clone();
    let player = Player::new(headless.host(), options)?;
    info!(player_id = %player.id(), sources = args.sources.len(), "Simulated session started");

    let rows: Rc<RefCell<Vec<EventRow>>> = Rc::default();
    let recorder = {
        let rows = rows.clone();
        let clock = run_loop.clone();
        let weak = Rc::downgrade(&player);
        Listener::new(move |event| {
            let position = weak
                .upgrade()
                .map(|player| format_time(player.current_time()))
                .unwrap_or_default();
            rows.borrow_mut().push(EventRow {
                at_ms: clock.now(),
                event: event.event_type().to_string(),
                position,
                detail: event_detail(event),
            });
        })
    };
    player.on(LOGGED_EVENTS, &recorder);

    if let Some(seek) = args.seek {
        player.ready(move |player| player.set_current_time(seek));
    }

    let target_ms = (args.seconds.max(0.0) * 1000.0) as u64;
    let step_ms = ((FRAME_MS as f64) * args.speed.max(0.1)).round().max(1.0) as u64;
    let mut ticker = tokio::time::interval(Duration::from_millis(FRAME_MS));
    while run_loop.now() < target_ms && !player.ended() {
        ticker.tick().await;
        let ran = run_loop.advance(step_ms.min(target_ms - run_loop.now()));
        debug!(now_ms = run_loop.now(), tasks = ran, "Clock advanced");
    }

    let timeline = player
        .component()
        .get_child(TIMELINE)
        .and_then(|child| child.el())
        .and_then(|el| headless.dom.text(el));
    let error = player.error();
    player.dispose();

    let rows = rows.borrow();
    match format_rows(&rows[..], format) {
        Some(rendered) => println!("{}", rendered),
        None => {
            for row in rows.iter() {
                println!("  [{:>6}ms] {:<16} {:>6}  {}", row.at_ms, row.event, row.position, row.detail);
            }
        }
    }

    if format != OutputFormat::Json {
        println!();
        if let Some(timeline) = timeline {
            println!("Timeline: {}", timeline);
        }
        match error {
            Some(error) => println!("Finished with error: {}", error),
            None => println!("Finished after {} ms", run_loop.now()),
        }
    }
    Ok(())
}
