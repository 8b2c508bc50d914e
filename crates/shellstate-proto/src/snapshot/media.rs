use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl PlaybackStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "playing" => Self::Playing,
            "paused" => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

/// Last-known state of the Spotify MPRIS player, via `playerctl`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaSnapshot {
    /// Whether the player was reachable at all.
    pub available: bool,
    pub title: String,
    pub artist: String,
    pub status: PlaybackStatus,
    pub position_secs: f64,
    pub length_secs: f64,
    pub art_url: String,
    /// Base-62 Spotify track id, when one could be extracted.
    pub track_id: String,
    pub shuffle: bool,
}
