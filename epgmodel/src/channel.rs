//! Channel identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable channel identifier.
///
/// The id is assigned by the owning data source and is immutable for
/// the lifetime of a session. It takes part in file names on disk, so
/// comparisons are exact string comparisons.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A TV channel together with the data source that owns it.
///
/// `source` is the fully-qualified name of the owning source; the
/// registry resolves it back to a live source when listings for this
/// channel have to be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    id: ChannelId,
    source: String,
    name: String,
}

impl Channel {
    pub fn new(
        id: impl Into<ChannelId>,
        source: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    /// Fully-qualified name of the owning data source.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Human-readable channel name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<String> for ChannelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_accessors() {
        let channel = Channel::new("arte", "example.sdf", "Arte");
        assert_eq!(channel.id().as_str(), "arte");
        assert_eq!(channel.source(), "example.sdf");
        assert_eq!(channel.name(), "Arte");
    }

    #[test]
    fn test_channel_id_equality() {
        assert_eq!(ChannelId::new("a"), ChannelId::from("a"));
        assert_ne!(ChannelId::new("a"), ChannelId::new("b"));
    }
}
