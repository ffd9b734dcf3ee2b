//! Component options and player configuration
//!
//! Options are JSON-like records. Defaults, kind-level overrides and the
//! caller's options are combined with [`merge_options`]: plain objects
//! merge recursively, everything else (arrays included) overwrites.

use crate::error::{Error, Result};
use crate::source::{SourceDescriptor, Sources};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// An options record
pub type Options = Map<String, Value>;

/// Deep-merge `layers` left to right; later layers win.
pub fn merge_options(layers: &[&Options]) -> Options {
    let mut merged = Options::new();
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}

fn merge_into(target: &mut Options, layer: &Options) {
    for (key, value) in layer {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Read a boolean option, treating anything that is not a bool as absent
pub fn bool_option(options: &Options, key: &str, default: bool) -> bool {
    options.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Read a string option
pub fn str_option<'a>(options: &'a Options, key: &str) -> Option<&'a str> {
    options.get(key).and_then(Value::as_str)
}

/// Turn a JSON value into an options record. `null` is an empty record.
pub fn to_options(value: Value) -> Result<Options> {
    match value {
        Value::Object(options) => Ok(options),
        Value::Null => Ok(Options::new()),
        other => Err(Error::InvalidOptions(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Preload hint handed to the media element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preload {
    None,
    Metadata,
    #[default]
    Auto,
}

impl Preload {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preload::None => "none",
            Preload::Metadata => "metadata",
            Preload::Auto => "auto",
        }
    }
}

/// Default message of the "no compatible source" error
pub const NOT_SUPPORTED_MESSAGE: &str = "No compatible source was found for this media.";

/// Typed view of the player's options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerConfig {
    /// Player id; generated when absent
    pub id: Option<String>,
    /// Tech names in probing order; empty means registry order
    pub tech_order: Vec<String>,
    /// Initial sources: a URL, a `{src, type}` record, or an array of either
    #[serde(deserialize_with = "deserialize_sources")]
    pub sources: Vec<SourceDescriptor>,
    /// Initial volume (0.0 - 1.0)
    pub volume: f64,
    pub muted: bool,
    pub autoplay: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub preload: Preload,
    pub controls: bool,
    pub playback_rate: f64,
    /// Message of the error raised when no tech supports any source
    pub not_supported_message: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            id: None,
            tech_order: Vec::new(),
            sources: Vec::new(),
            volume: 1.0,
            muted: false,
            autoplay: false,
            looping: false,
            preload: Preload::Auto,
            controls: false,
            playback_rate: 1.0,
            not_supported_message: NOT_SUPPORTED_MESSAGE.to_string(),
        }
    }
}

fn deserialize_sources<'de, D>(deserializer: D) -> std::result::Result<Vec<SourceDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        value => Sources::from_value(value)
            .map(|sources| sources.0)
            .map_err(serde::de::Error::custom),
    }
}

impl PlayerConfig {
    /// Read the typed configuration out of a merged options record
    pub fn from_options(options: &Options) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_value(Value::Object(options.clone()))
            .map_err(|e| Error::InvalidOptions(e.to_string()))?;

        if !(0.0..=1.0).contains(&config.volume) {
            return Err(Error::InvalidOptions(format!(
                "volume must be within 0..1, got {}",
                config.volume
            )));
        }
        if config.playback_rate <= 0.0 {
            return Err(Error::InvalidOptions(format!(
                "playbackRate must be positive, got {}",
                config.playback_rate
            )));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(value: Value) -> Options {
        to_options(value).unwrap()
    }

    #[test]
    fn test_deep_merge() {
        let base = opts(json!({"a": 1, "nested": {"x": 1, "y": 1}, "list": [1, 2]}));
        let kind = opts(json!({"nested": {"y": 2}, "list": [3]}));
        let instance = opts(json!({"a": "over", "nested": {"z": 3}}));

        let merged = merge_options(&[&base, &kind, &instance]);
        assert_eq!(
            Value::Object(merged),
            json!({"a": "over", "nested": {"x": 1, "y": 2, "z": 3}, "list": [3]})
        );
    }

    #[test]
    fn test_object_overwrites_scalar() {
        let base = opts(json!({"a": 1}));
        let over = opts(json!({"a": {"b": 2}}));
        assert_eq!(Value::Object(merge_options(&[&base, &over])), json!({"a": {"b": 2}}));
    }

    #[test]
    fn test_merge_leaves_inputs_untouched() {
        let base = opts(json!({"nested": {"x": 1}}));
        let over = opts(json!({"nested": {"x": 2}}));
        merge_options(&[&base, &over]);
        assert_eq!(base["nested"]["x"], json!(1));
    }

    #[test]
    fn test_player_config_defaults() {
        let config = PlayerConfig::from_options(&Options::new()).unwrap();
        assert_eq!(config, PlayerConfig::default());
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.not_supported_message, NOT_SUPPORTED_MESSAGE);
    }

    #[test]
    fn test_player_config_source_shapes() {
        let config = PlayerConfig::from_options(&opts(json!({"sources": "movie.mp4"}))).unwrap();
        assert_eq!(config.sources, vec![SourceDescriptor::new("movie.mp4")]);

        let config = PlayerConfig::from_options(&opts(json!({"sources": ["a.mp4", {"src": "b.webm"}]}))).unwrap();
        assert_eq!(config.sources.len(), 2);

        let err = PlayerConfig::from_options(&opts(json!({"sources": [42]}))).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_player_config_camel_case() {
        let config = PlayerConfig::from_options(&opts(json!({
            "techOrder": ["Html5"],
            "sources": [{"src": "movie.mp4", "type": "video/mp4"}],
            "loop": true,
            "preload": "metadata",
            "playbackRate": 1.5,
            "children": ["Anything"]
        })))
        .unwrap();

        assert_eq!(config.tech_order, vec!["Html5"]);
        assert_eq!(config.sources.len(), 1);
        assert!(config.looping);
        assert_eq!(config.preload, Preload::Metadata);
        assert_eq!(config.playback_rate, 1.5);
    }

    #[test]
    fn test_invalid_shapes_fail_fast() {
        let err = PlayerConfig::from_options(&opts(json!({"techOrder": "Html5"}))).unwrap_err();
        assert!(err.is_configuration());
        assert!(PlayerConfig::from_options(&opts(json!({"volume": 3.0}))).is_err());
        assert!(to_options(json!(7)).is_err());
    }
}
