//! Audio state over `wpctl` and `pactl`.
//!
//! Volume and mute prefer `wpctl` and fall back to `pactl` when WirePlumber
//! is absent. Node listings and default-device queries always go through
//! `pactl`, whose short listing format is stable.

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use log::warn;
use masterror::{AppError, AppResult};
use regex::Regex;
use shellstate_proto::{
    ports::{CommandRequest, CommandRunner},
    snapshot::audio::{AudioNode, AudioNodeKind, AudioSnapshot},
};

use crate::{runner::shell_quote, services::clamp_percent};

fn volume_percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]+(?:[.,][0-9]+)?)\s*%").expect("valid pattern"))
}

fn volume_ratio_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]+(?:[.,][0-9]+)?)").expect("valid pattern"))
}

/// Parses `pactl list short sinks|sources` output.
///
/// Columns are tab separated: id, name, driver, sample format, state.
pub fn parse_nodes(raw: &str, kind: AudioNodeKind, default_name: &str) -> Vec<AudioNode> {
    let mut nodes: Vec<AudioNode> = raw
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return None;
            }

            let id = fields[0].trim().parse::<u32>().ok()?;
            let name = fields[1].trim();
            if name.is_empty() {
                return None;
            }

            Some(AudioNode {
                id,
                name: name.to_string(),
                server: fields.get(2).map(|f| f.trim().to_string()).unwrap_or_default(),
                format: fields.get(3).map(|f| f.trim().to_string()).unwrap_or_default(),
                state: fields.get(4).map(|f| f.trim().to_string()).unwrap_or_default(),
                kind,
                is_default: !default_name.is_empty() && name == default_name,
            })
        })
        .collect();

    nodes.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.name.cmp(&b.name))
    });

    nodes
}

/// Parses volume output from either tool into a percent and a mute flag.
///
/// `wpctl` prints a 0..1 ratio ("Volume: 0.85 [MUTED]") while `pactl` prints
/// an explicit percent somewhere in the line, so the percent form is tried
/// first.
pub fn parse_volume(raw: &str) -> Option<(u8, bool)> {
    let lowered = raw.to_lowercase();
    let muted = lowered.contains("[muted]") || lowered.contains("mute: yes");

    if let Some(captures) = volume_percent_re().captures(raw) {
        let percent: f64 = captures[1].replace(',', ".").parse().ok()?;
        return Some((clamp_percent(percent.round() as i64), muted));
    }

    let captures = volume_ratio_re().captures(raw)?;
    let ratio: f64 = captures[1].replace(',', ".").parse().ok()?;
    Some((clamp_percent((ratio * 100.0).round() as i64), muted))
}

#[derive(Clone)]
pub struct AudioService {
    runner: Arc<dyn CommandRunner>,
}

impl AudioService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn query(&self, command: &str, dedupe_key: &str) -> String {
        let request = CommandRequest::new(command)
            .timeout(Duration::from_secs(4))
            .allow_failure()
            .dedupe_key(dedupe_key);

        match self.runner.run(request).await {
            Ok(output) => output,
            Err(err) => {
                warn!("audio query failed: {err}");
                String::new()
            }
        }
    }

    /// Reads sinks, sources, defaults, volume and mute in one pass.
    pub async fn read(&self) -> AudioSnapshot {
        let (default_sink, default_source, sinks_raw, sources_raw, volume_raw) = tokio::join!(
            self.query("pactl get-default-sink", "audio-default-sink"),
            self.query("pactl get-default-source", "audio-default-source"),
            self.query("pactl list short sinks", "audio-sinks"),
            self.query("pactl list short sources", "audio-sources"),
            self.query(
                "wpctl get-volume @DEFAULT_AUDIO_SINK@ 2>/dev/null \
                 || { pactl get-sink-volume @DEFAULT_SINK@ | head -n1; \
                      pactl get-sink-mute @DEFAULT_SINK@; }",
                "audio-volume",
            ),
        );

        let default_sink = default_sink.trim().to_string();
        let default_source = default_source.trim().to_string();
        let (volume, muted) = parse_volume(&volume_raw).unwrap_or((0, false));

        AudioSnapshot {
            sinks: parse_nodes(&sinks_raw, AudioNodeKind::Sink, &default_sink),
            sources: parse_nodes(&sources_raw, AudioNodeKind::Source, &default_source),
            default_sink,
            default_source,
            volume,
            muted,
        }
    }

    async fn action(&self, command: String) -> AppResult<()> {
        let request = CommandRequest::new(command).timeout(Duration::from_secs(5));
        self.runner
            .run(request)
            .await
            .map(|_| ())
            .map_err(|err| AppError::internal(err.to_string()))
    }

    pub async fn set_default_sink(&self, name: &str) -> AppResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::internal("sink name must not be blank"));
        }
        self.action(format!("pactl set-default-sink {}", shell_quote(name)))
            .await
    }

    pub async fn set_default_source(&self, name: &str) -> AppResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::internal("source name must not be blank"));
        }
        self.action(format!("pactl set-default-source {}", shell_quote(name)))
            .await
    }

    /// Sets the default sink volume, clamped to 0..=100.
    pub async fn set_volume(&self, percent: u8) -> AppResult<()> {
        let percent = percent.min(100);
        self.action(format!(
            "wpctl set-volume @DEFAULT_AUDIO_SINK@ {percent}% 2>/dev/null \
             || pactl set-sink-volume @DEFAULT_SINK@ {percent}%"
        ))
        .await
    }

    pub async fn toggle_mute(&self) -> AppResult<()> {
        self.action(
            "wpctl set-mute @DEFAULT_AUDIO_SINK@ toggle 2>/dev/null \
             || pactl set-sink-mute @DEFAULT_SINK@ toggle"
                .to_string(),
        )
        .await
    }
}
