/// Sources that can be searched through a node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SearchSource {
    #[default]
    Youtube,
    YoutubeMusic,
    SoundCloud,
    Spotify,
    AppleMusic,
    Deezer,
    JioSaavn,
    /// Any other source, `name` becomes the `namesearch:` prefix.
    Custom(String)
}

impl SearchSource {
    /// Reads a source from its short name (`yt`, `ytm`, `sc`, `sp`, `am`, `dz`, `js`).
    pub fn from_short(name: &str) -> Self {
        match name {
            "yt" => Self::Youtube,
            "ytm" => Self::YoutubeMusic,
            "sc" => Self::SoundCloud,
            "sp" => Self::Spotify,
            "am" => Self::AppleMusic,
            "dz" => Self::Deezer,
            "js" => Self::JioSaavn,
            other => Self::Custom(other.to_string())
        }
    }

    pub fn prefix(&self) -> String {
        match self {
            Self::Youtube => "ytsearch:".into(),
            Self::YoutubeMusic => "ytmsearch:".into(),
            Self::SoundCloud => "scsearch:".into(),
            Self::Spotify => "spsearch:".into(),
            Self::AppleMusic => "amsearch:".into(),
            Self::Deezer => "dzsearch:".into(),
            Self::JioSaavn => "jssearch:".into(),
            Self::Custom(name) => format!("{name}search:")
        }
    }

    /// Builds the identifier to load, urls are passed through untouched.
    pub fn identifier(&self, query: &str) -> String {
        if is_url(query) {
            query.to_string()
        } else {
            format!("{}{query}", self.prefix())
        }
    }
}

pub(crate) fn is_url(query: &str) -> bool {
    query.starts_with("http://") || query.starts_with("https://")
}
