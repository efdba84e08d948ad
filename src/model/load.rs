use serde::Deserialize;
use serde_json::Value;

use crate::model::error::Exception;
use crate::model::track::Track;

/// Kind of result returned by the load tracks route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadType {
    /// A single track was loaded.
    Track,
    /// A playlist was loaded.
    Playlist,
    /// A search returned results.
    Search,
    /// Nothing matched the identifier.
    Empty,
    /// Loading failed.
    Error
}

impl LoadType {
    fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "track" | "TRACK_LOADED" => Self::Track,
            "playlist" | "PLAYLIST_LOADED" => Self::Playlist,
            "search" | "SEARCH_RESULT" => Self::Search,
            "empty" | "NO_MATCHES" => Self::Empty,
            "error" | "LOAD_FAILED" => Self::Error,
            _ => return None
        })
    }
}

/// Information about a loaded playlist.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    /// Name of the playlist.
    #[serde(default)]
    pub name: String,
    /// Index of the selected track, negative or absent if none.
    #[serde(default)]
    pub selected_track: Option<i64>
}

/// Result of loading an identifier, the same shape regardless of the node protocol version.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub load_type: LoadType,
    /// Loaded tracks, in the order the node returned them.
    pub tracks: Vec<Track>,
    /// Set when a playlist was loaded.
    pub playlist: Option<PlaylistInfo>,
    /// Set when loading failed.
    pub exception: Option<Exception>
}

#[derive(Deserialize)]
struct RawPlaylist {
    info: PlaylistInfo,
    #[serde(default)]
    tracks: Vec<Track>
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyLoadResult {
    #[serde(default)]
    playlist_info: Option<PlaylistInfo>,
    #[serde(default)]
    tracks: Vec<Track>,
    #[serde(default)]
    exception: Option<Exception>
}

impl LoadResult {
    pub fn empty() -> Self {
        Self {
            load_type: LoadType::Empty,
            tracks: Vec::new(),
            playlist: None,
            exception: None
        }
    }

    /// Normalizes a raw load tracks response.
    ///
    /// Responses carrying a `data` field follow the session based layout, anything
    /// else is read as the legacy layout.
    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        let load_type = value.get("loadType")
            .and_then(Value::as_str)
            .and_then(LoadType::parse)
            .ok_or_else(|| <serde_json::Error as serde::de::Error>::custom("missing or unknown loadType"))?;

        let mut result = Self {
            load_type,
            ..Self::empty()
        };

        if let Some(data) = value.get_mut("data").map(Value::take) {
            match load_type {
                LoadType::Track => result.tracks.push(serde_json::from_value(data)?),
                LoadType::Search => result.tracks = serde_json::from_value(data)?,
                LoadType::Playlist => {
                    let playlist: RawPlaylist = serde_json::from_value(data)?;
                    result.playlist = Some(playlist.info);
                    result.tracks = playlist.tracks;
                },
                LoadType::Error => result.exception = Some(serde_json::from_value(data)?),
                LoadType::Empty => {}
            }
        } else {
            let legacy: LegacyLoadResult = serde_json::from_value(value)?;
            result.tracks = legacy.tracks;
            result.exception = legacy.exception;

            if load_type == LoadType::Playlist {
                result.playlist = legacy.playlist_info;
            }
        }

        Ok(result)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use super::*;

    fn track(encoded: &str) -> Value {
        json!({
            "encoded": encoded,
            "info": { "identifier": encoded, "title": "t", "author": "a", "length": 10, "sourceName": "youtube" }
        })
    }

    #[test]
    fn normalizes_v4_search() {
        let result = LoadResult::from_value(json!({
            "loadType": "search",
            "data": [track("a"), track("b")]
        })).unwrap();

        assert_eq!(result.load_type, LoadType::Search);
        assert_eq!(result.tracks.len(), 2);
        assert_eq!(result.tracks[1].encoded, "b");
    }

    #[test]
    fn normalizes_v4_playlist() {
        let result = LoadResult::from_value(json!({
            "loadType": "playlist",
            "data": {
                "info": { "name": "mix", "selectedTrack": -1 },
                "pluginInfo": {},
                "tracks": [track("a")]
            }
        })).unwrap();

        assert_eq!(result.playlist.unwrap().name, "mix");
        assert_eq!(result.tracks.len(), 1);
    }

    #[test]
    fn normalizes_v4_error() {
        let result = LoadResult::from_value(json!({
            "loadType": "error",
            "data": { "message": "blocked", "severity": "common", "cause": "x" }
        })).unwrap();

        assert_eq!(result.load_type, LoadType::Error);
        assert!(result.is_empty());
        assert_eq!(result.exception.unwrap().message.as_deref(), Some("blocked"));
    }

    #[test]
    fn normalizes_legacy_layout() {
        let result = LoadResult::from_value(json!({
            "loadType": "PLAYLIST_LOADED",
            "playlistInfo": { "name": "legacy", "selectedTrack": 0 },
            "tracks": [
                { "track": "QA1", "info": { "identifier": "1", "title": "one", "author": "a", "length": 5 } }
            ],
            "exception": null
        })).unwrap();

        assert_eq!(result.load_type, LoadType::Playlist);
        assert_eq!(result.tracks[0].encoded, "QA1");
        assert_eq!(result.playlist.unwrap().selected_track, Some(0));
    }

    #[test]
    fn rejects_unknown_load_type() {
        assert!(LoadResult::from_value(json!({ "loadType": "weird" })).is_err());
    }

    #[test]
    fn empty_legacy_result() {
        let result = LoadResult::from_value(json!({
            "loadType": "NO_MATCHES",
            "playlistInfo": {},
            "tracks": []
        })).unwrap();

        assert_eq!(result.load_type, LoadType::Empty);
        assert!(result.is_empty());
    }
}
