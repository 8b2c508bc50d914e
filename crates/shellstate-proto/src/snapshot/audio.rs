use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioNodeKind {
    Sink,
    Source,
}

/// One row of `pactl list short sinks|sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioNode {
    pub id: u32,
    pub name: String,
    pub server: String,
    pub format: String,
    pub state: String,
    pub kind: AudioNodeKind,
    pub is_default: bool,
}

/// Last-known audio routing and volume state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioSnapshot {
    pub default_sink: String,
    pub default_source: String,
    /// Sorted: default first, then by name.
    pub sinks: Vec<AudioNode>,
    pub sources: Vec<AudioNode>,
    /// Default sink volume, `0..=100`.
    pub volume: u8,
    pub muted: bool,
}
