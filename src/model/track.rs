use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A playable track as returned by the node.
///
/// The `encoded` payload is the only thing the node needs to play the track again, everything
/// else is descriptive. Two tracks are equal when their payloads are equal.
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Base64 payload understood by the node.
    #[serde(alias = "track")]
    pub encoded: String,
    /// Display metadata.
    pub info: TrackInfo,
    /// Extra data attached by node plugins, if any.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub plugin_info: Value
}

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    /// Source specific identifier (a video id for youtube).
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub is_seekable: bool,
    #[serde(default)]
    pub author: String,
    /// Length of the track.
    #[serde(default, deserialize_with = "duration_from_millis", serialize_with = "duration_to_millis")]
    pub length: Duration,
    #[serde(default)]
    pub is_stream: bool,
    /// Position the track was loaded at.
    #[serde(default, deserialize_with = "duration_from_millis", serialize_with = "duration_to_millis")]
    pub position: Duration,
    #[serde(default)]
    pub title: String,
    pub uri: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub isrc: Option<String>,
    /// Name of the source manager that produced the track.
    #[serde(default)]
    pub source_name: String
}

impl Track {
    /// Creates a track that only carries its payload, used when the node
    /// reports a track without metadata.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self {
            encoded: encoded.into(),
            info: TrackInfo::default(),
            plugin_info: Value::Null
        }
    }

    /// Artwork of the track, falling back to the youtube thumbnail for youtube tracks.
    pub fn artwork(&self) -> Option<String> {
        if let Some(url) = &self.info.artwork_url {
            return Some(url.clone());
        }

        let is_youtube = self.info.uri.as_deref()
            .map(|uri| uri.contains("youtube.com") || uri.contains("youtu.be"))
            .unwrap_or(false);

        if is_youtube && !self.info.identifier.is_empty() {
            Some(format!("https://img.youtube.com/vi/{}/hqdefault.jpg", self.info.identifier))
        } else {
            None
        }
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

pub(crate) fn duration_from_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>
{
    Ok(<Option<u64> as Deserialize>::deserialize(deserializer)?
        .map(Duration::from_millis)
        .unwrap_or_default())
}

pub(crate) fn duration_to_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer
{
    serializer.serialize_u64(duration.as_millis() as _)
}
