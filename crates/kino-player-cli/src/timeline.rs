//! A stateful position readout mounted under the player
//!
//! Mirrors the player's `timeupdate`/`durationchange` into component
//! state and renders `m:ss / m:ss` into its element.

use kino_player::component::{Component, Widget};
use kino_player::stateful::{Changes, StateMap, Stateful};
use kino_player::{Evented, Listener, Result};
use serde_json::{json, Value};
use std::rc::{Rc, Weak};

pub const TIMELINE: &str = "Timeline";

/// `m:ss`, or `-:--` when unknown
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "-:--".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn seconds(value: Option<Value>) -> f64 {
    value.and_then(|v| v.as_f64()).unwrap_or(f64::NAN)
}

pub struct Timeline;

impl Widget for Timeline {
    fn name(&self) -> &str {
        TIMELINE
    }

    fn css_class(&self) -> Option<String> {
        Some("kino-timeline".to_string())
    }

    fn initial_state(&self) -> StateMap {
        let mut state = StateMap::new();
        state.insert("position".to_string(), json!(0.0));
        state.insert("duration".to_string(), Value::Null);
        state
    }

    fn init(&self, component: &Rc<Component>) -> Result<()> {
        let Some(player) = component.player() else {
            return Ok(());
        };

        let weak_component: Weak<Component> = Rc::downgrade(component);
        let weak_player = Rc::downgrade(&player);
        let listener = Listener::new(move |_| {
            let (Some(component), Some(player)) = (weak_component.upgrade(), weak_player.upgrade()) else {
                return;
            };
            let duration = player.duration();
            component.set_state(json!({
                "position": player.current_time(),
                "duration": if duration.is_finite() { json!(duration) } else { Value::Null },
            }));
        });
        component.listen_to(&player, ["timeupdate", "durationchange", "seeked"], &listener);
        Ok(())
    }

    fn handle_state_changed(&self, component: &Component, _changes: &Changes) {
        let text = format!(
            "{} / {}",
            format_time(seconds(component.state_value("position"))),
            format_time(seconds(component.state_value("duration")))
        );
        if let Some(el) = component.el() {
            component.dom().set_text(el, &text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(75.9), "1:15");
        assert_eq!(format_time(f64::NAN), "-:--");
    }
}
