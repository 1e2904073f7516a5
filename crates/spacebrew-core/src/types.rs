//! Client descriptor types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value type tag attached to a channel.
///
/// The set of tags is open: the four known tags have constants, anything
/// else a client announces is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueType(String);

impl ValueType {
    pub const BOOLEAN: &'static str = "boolean";
    pub const RANGE: &'static str = "range";
    pub const STRING: &'static str = "string";
    pub const JSON: &'static str = "json";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for boolean, range, string and json
    pub fn is_known(&self) -> bool {
        matches!(
            self.0.as_str(),
            Self::BOOLEAN | Self::RANGE | Self::STRING | Self::JSON
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ValueType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A named publisher or subscriber channel of a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: Option<ValueType>,
}

impl Channel {
    pub fn new(name: impl Into<String>, value_type: impl Into<ValueType>) -> Self {
        Self {
            name: name.into(),
            value_type: Some(value_type.into()),
        }
    }

    /// A channel announced without a `:type` suffix
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: None,
        }
    }

    /// Parse a `name[:type]` entry.
    ///
    /// Splits on the first `:` and trims both halves. Whatever follows the
    /// colon becomes the type tag, even when it is not a known tag.
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(':') {
            Some((name, tag)) => Self::new(name.trim(), tag.trim()),
            None => Self::untyped(spec.trim()),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value_type {
            Some(tag) => write!(f, "{}:{}", self.name, tag),
            None => f.write_str(&self.name),
        }
    }
}

/// Identity of one registered client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDescriptor {
    pub name: String,
    pub description: String,
    pub publishers: Vec<Channel>,
    pub subscribers: Vec<Channel>,
}

impl ClientDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            publishers: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn with_publisher(mut self, channel: Channel) -> Self {
        self.publishers.push(channel);
        self
    }

    pub fn with_subscriber(mut self, channel: Channel) -> Self {
        self.subscribers.push(channel);
        self
    }

    /// Structured registration announcement for this client:
    /// `name, description, pubs(a:type, ...), subs(b:type, ...)`
    pub fn announcement(&self) -> String {
        format!(
            "{}, {}, pubs({}), subs({})",
            self.name,
            self.description,
            join_channels(&self.publishers),
            join_channels(&self.subscribers)
        )
    }
}

fn join_channels(channels: &[Channel]) -> String {
    channels
        .iter()
        .map(Channel::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
