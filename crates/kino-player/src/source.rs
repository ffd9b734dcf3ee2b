//! Source descriptors and MIME handling

use crate::error::{Error, Result};
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0},
    multi::many0,
    sequence::{delimited, preceded, separated_pair},
    IResult, Parser,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Playable media and its MIME type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub src: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

impl SourceDescriptor {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            mime: None,
        }
    }

    pub fn with_type(src: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            mime: Some(mime.into()),
        }
    }

    /// Explicit type when present and non-empty
    pub fn explicit_type(&self) -> Option<&str> {
        self.mime.as_deref().filter(|mime| !mime.trim().is_empty())
    }

    /// Explicit type, else the type implied by the file extension
    pub fn mime_type(&self) -> Option<String> {
        self.explicit_type()
            .map(str::to_string)
            .or_else(|| mime_for_extension(&file_extension(&self.src)?).map(str::to_string))
    }

    /// Copy with the type filled in from the extension when missing
    pub fn normalized(&self) -> Self {
        Self {
            src: self.src.clone(),
            mime: self.mime_type(),
        }
    }
}

impl From<&str> for SourceDescriptor {
    fn from(src: &str) -> Self {
        SourceDescriptor::new(src)
    }
}

impl From<String> for SourceDescriptor {
    fn from(src: String) -> Self {
        SourceDescriptor::new(src)
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mime {
            Some(mime) => write!(f, "{} ({})", self.src, mime),
            None => write!(f, "{}", self.src),
        }
    }
}

/// An ordered list of candidate sources
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sources(pub Vec<SourceDescriptor>);

impl Sources {
    /// Accept a URL string, a `{src, type}` record, or an array of either
    pub fn from_value(value: Value) -> Result<Self> {
        let list = match value {
            Value::Array(items) => items,
            other => vec![other],
        };

        let mut sources = Vec::with_capacity(list.len());
        for item in list {
            match item {
                Value::String(src) => sources.push(SourceDescriptor::new(src)),
                Value::Object(_) => sources.push(serde_json::from_value(item)?),
                other => {
                    return Err(Error::InvalidOptions(format!(
                        "source must be a string or {{src, type}}, got {}",
                        other
                    )))
                }
            }
        }
        Ok(Self(sources))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&SourceDescriptor> {
        self.0.first()
    }
}

impl From<&str> for Sources {
    fn from(src: &str) -> Self {
        Sources(vec![SourceDescriptor::new(src)])
    }
}

impl From<String> for Sources {
    fn from(src: String) -> Self {
        Sources(vec![SourceDescriptor::new(src)])
    }
}

impl From<SourceDescriptor> for Sources {
    fn from(source: SourceDescriptor) -> Self {
        Sources(vec![source])
    }
}

impl From<Vec<SourceDescriptor>> for Sources {
    fn from(sources: Vec<SourceDescriptor>) -> Self {
        Sources(sources)
    }
}

impl From<&[SourceDescriptor]> for Sources {
    fn from(sources: &[SourceDescriptor]) -> Self {
        Sources(sources.to_vec())
    }
}

/// Drop entries without a `src` and fill in missing types
pub fn filter_sources(sources: &Sources) -> Sources {
    Sources(
        sources
            .iter()
            .filter(|source| !source.src.trim().is_empty())
            .map(SourceDescriptor::normalized)
            .collect(),
    )
}

/// Lowercased file extension of a source URL, query and fragment ignored
pub fn file_extension(src: &str) -> Option<String> {
    let url = Url::parse(src).or_else(|_| {
        Url::parse("http://localhost/").and_then(|base| base.join(src))
    });
    let path = match &url {
        Ok(url) => url.path().to_string(),
        Err(_) => src.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    let file = path.rsplit('/').next()?;
    let (stem, extension) = file.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// MIME type conventionally used for a file extension
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let mime = match extension.to_ascii_lowercase().as_str() {
        "opus" | "ogv" => "video/ogg",
        "mp4" | "mov" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "aac" => "audio/aac",
        "caf" => "audio/x-caf",
        "flac" => "audio/flac",
        "oga" => "audio/ogg",
        "wav" => "audio/wav",
        "m3u8" => "application/x-mpegURL",
        "mpd" => "application/dash+xml",
        _ => return None,
    };
    Some(mime)
}

/// A parsed `type/subtype; param=value` MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    pub kind: String,
    pub subtype: String,
    /// Parameters in order; names lowercased, values as written
    pub params: Vec<(String, String)>,
}

impl MimeType {
    pub fn parse(input: &str) -> Result<Self> {
        match mime_type(input.trim()) {
            Ok(("", mime)) => Ok(mime),
            Ok((rest, _)) => Err(Error::InvalidMimeType(format!(
                "{}: unexpected trailing input {:?}",
                input, rest
            ))),
            Err(_) => Err(Error::InvalidMimeType(input.to_string())),
        }
    }

    /// `type/subtype` without parameters
    pub fn essence(&self) -> String {
        format!("{}/{}", self.kind, self.subtype)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// HLS playlists under any of their registered names
    pub fn is_hls(&self) -> bool {
        matches!(
            self.essence().as_str(),
            "application/x-mpegurl"
                | "application/vnd.apple.mpegurl"
                | "audio/mpegurl"
                | "audio/x-mpegurl"
                | "video/x-mpegurl"
                | "video/mpegurl"
                | "application/mpegurl"
        )
    }
}

impl FromStr for MimeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MimeType::parse(s)
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)?;
        for (name, value) in &self.params {
            if value.chars().all(is_token_char) && !value.is_empty() {
                write!(f, "; {}={}", name, value)?;
            } else {
                write!(f, "; {}=\"{}\"", name, value)?;
            }
        }
        Ok(())
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn token(input: &str) -> IResult<&str, &str> {
    take_while1(is_token_char).parse(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_while(|c| c != '"'), char('"')).parse(input)
}

fn parameter(input: &str) -> IResult<&str, (&str, &str)> {
    preceded(
        (multispace0, char(';'), multispace0),
        separated_pair(token, char('='), alt((quoted, token))),
    )
    .parse(input)
}

fn mime_type(input: &str) -> IResult<&str, MimeType> {
    let (input, (kind, subtype)) = separated_pair(token, char('/'), token).parse(input)?;
    let (input, params) = many0(parameter).parse(input)?;
    let (input, _) = multispace0(input)?;

    Ok((
        input,
        MimeType {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params: params
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                .collect(),
        },
    ))
}
