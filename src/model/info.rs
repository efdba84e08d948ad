use serde::Deserialize;

/// Information object returned from the `info` route.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// Version of the node.
    pub version: VersionInfo,
    /// Build time as a unix timestamp in milliseconds.
    #[serde(default)]
    pub build_time: u64,
    /// Java version the node runs on.
    #[serde(default)]
    pub jvm: String,
    /// Version of the audio player library.
    #[serde(default)]
    pub lavaplayer: String,
    /// Enabled source managers.
    #[serde(default)]
    pub source_managers: Vec<String>,
    /// Filters supported by the node.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Loaded plugins.
    #[serde(default)]
    pub plugins: Vec<PluginInfo>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    /// Full version string.
    pub semver: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    #[serde(default)]
    pub pre_release: Option<String>
}

#[derive(Debug, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String
}

impl NodeInfo {
    /// Whether if the node can load tracks from the given source.
    pub fn supports_source(&self, source: &str) -> bool {
        self.source_managers.iter().any(|s| s == source)
    }
}
