//! Spotify playback state over `playerctl`.
//!
//! All metadata is gathered in one batched shell invocation so a poll costs
//! a single process tree even when the player is gone. Each line is
//! `key=value`; a missing player leaves every value empty.

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use log::warn;
use masterror::{AppError, AppResult};
use regex::Regex;
use shellstate_proto::{
    ports::{CommandRequest, CommandRunner},
    snapshot::media::{MediaSnapshot, PlaybackStatus},
};

use crate::services::parse_f64_loose;

fn track_id_res() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"open\.spotify\.com/track/([A-Za-z0-9]{22})").expect("valid pattern"),
            Regex::new(r"spotify:track:([A-Za-z0-9]{22})").expect("valid pattern"),
            Regex::new(r"/com/spotify/track/([A-Za-z0-9]{22})").expect("valid pattern"),
        ]
    })
}

/// Extracts the base-62 track id from any of the URI shapes Spotify uses.
pub fn extract_track_id(raw: &str) -> Option<String> {
    track_id_res()
        .iter()
        .find_map(|re| re.captures(raw))
        .map(|captures| captures[1].to_string())
}

fn batched_query() -> String {
    const FIELDS: [(&str, &str); 8] = [
        ("status", "status"),
        ("title", "metadata title"),
        ("artist", "metadata artist"),
        ("position", "position"),
        ("length", "metadata mpris:length"),
        ("art", "metadata mpris:artUrl"),
        ("track", "metadata mpris:trackid"),
        ("shuffle", "shuffle"),
    ];

    FIELDS
        .iter()
        .map(|(key, subcommand)| {
            format!("echo \"{key}=$(playerctl -p spotify {subcommand} 2>/dev/null)\"")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parses the `key=value` lines of the batched query.
pub fn parse_media_output(raw: &str) -> MediaSnapshot {
    let field = |key: &str| -> String {
        raw.lines()
            .find_map(|line| line.strip_prefix(&format!("{key}=")))
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    };

    let status_raw = field("status");
    if status_raw.is_empty() {
        return MediaSnapshot::default();
    }

    let track_field = field("track");
    let art_url = field("art");
    let track_id = extract_track_id(&track_field)
        .or_else(|| extract_track_id(&art_url))
        .unwrap_or_default();

    MediaSnapshot {
        available: true,
        title: field("title"),
        artist: field("artist"),
        status: PlaybackStatus::parse(&status_raw),
        position_secs: parse_f64_loose(&field("position")).unwrap_or(0.0),
        // mpris:length is microseconds.
        length_secs: parse_f64_loose(&field("length")).unwrap_or(0.0) / 1_000_000.0,
        art_url,
        track_id,
        shuffle: field("shuffle").eq_ignore_ascii_case("on"),
    }
}

#[derive(Clone)]
pub struct MediaService {
    runner: Arc<dyn CommandRunner>,
}

impl MediaService {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Reads the player state; an absent player yields the empty snapshot.
    pub async fn read(&self) -> MediaSnapshot {
        let request = CommandRequest::new(batched_query())
            .timeout(Duration::from_secs(4))
            .allow_failure()
            .dedupe_key("media-spotify");

        match self.runner.run(request).await {
            Ok(raw) => parse_media_output(&raw),
            Err(err) => {
                warn!("playerctl query failed: {err}");
                MediaSnapshot::default()
            }
        }
    }

    async fn control(&self, subcommand: &str) -> AppResult<()> {
        let request = CommandRequest::new(format!("playerctl -p spotify {subcommand}"))
            .timeout(Duration::from_secs(4));

        self.runner
            .run(request)
            .await
            .map(|_| ())
            .map_err(|err| AppError::internal(err.to_string()))
    }

    pub async fn play_pause(&self) -> AppResult<()> {
        self.control("play-pause").await
    }

    pub async fn next(&self) -> AppResult<()> {
        self.control("next").await
    }

    pub async fn previous(&self) -> AppResult<()> {
        self.control("previous").await
    }

    pub async fn toggle_shuffle(&self) -> AppResult<()> {
        self.control("shuffle toggle").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::runtime::Runtime;

    use crate::test_utils::FakeRunner;

    const OUTPUT: &str = "\
status=Playing
title=Weird Fishes
artist=Radiohead
position=34.5
length=318000000
art=https://i.scdn.co/image/abc
track=/com/spotify/track/4wajJ1o7jWIg62YqpkHC7S
shuffle=On
";

    #[test]
    fn track_id_extraction_covers_all_shapes() {
        let id = "4wajJ1o7jWIg62YqpkHC7S";
        assert_eq!(
            extract_track_id(&format!("https://open.spotify.com/track/{id}")).as_deref(),
            Some(id)
        );
        assert_eq!(
            extract_track_id(&format!("spotify:track:{id}")).as_deref(),
            Some(id)
        );
        assert_eq!(
            extract_track_id(&format!("/com/spotify/track/{id}")).as_deref(),
            Some(id)
        );
        assert_eq!(extract_track_id("not a track"), None);
    }

    #[test]
    fn output_parses_into_snapshot() {
        let snapshot = parse_media_output(OUTPUT);

        assert!(snapshot.available);
        assert_eq!(snapshot.title, "Weird Fishes");
        assert_eq!(snapshot.artist, "Radiohead");
        assert_eq!(snapshot.status, PlaybackStatus::Playing);
        assert_eq!(snapshot.position_secs, 34.5);
        assert_eq!(snapshot.length_secs, 318.0);
        assert_eq!(snapshot.track_id, "4wajJ1o7jWIg62YqpkHC7S");
        assert!(snapshot.shuffle);
    }

    #[test]
    fn missing_player_is_the_empty_snapshot() {
        assert_eq!(
            parse_media_output("status=\ntitle=\n"),
            MediaSnapshot::default()
        );
        assert_eq!(parse_media_output(""), MediaSnapshot::default());
    }

    #[test]
    fn read_degrades_without_playerctl() {
        let runtime = Runtime::new().expect("runtime");
        let service = MediaService::new(Arc::new(FakeRunner::new()));

        let snapshot = runtime.block_on(service.read());
        assert_eq!(snapshot, MediaSnapshot::default());
    }

    #[test]
    fn read_parses_stubbed_output() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        runner.respond("playerctl", OUTPUT);

        let service = MediaService::new(runner);
        let snapshot = runtime.block_on(service.read());
        assert!(snapshot.available);
        assert_eq!(snapshot.artist, "Radiohead");
    }

    #[test]
    fn controls_target_the_spotify_player() {
        let runtime = Runtime::new().expect("runtime");
        let runner = Arc::new(FakeRunner::new());
        runner.respond("playerctl", "");

        let service = MediaService::new(Arc::clone(&runner) as Arc<dyn CommandRunner>);
        runtime
            .block_on(service.play_pause())
            .expect("control should apply");
        assert!(runner.calls()[0].contains("playerctl -p spotify play-pause"));
    }
}
