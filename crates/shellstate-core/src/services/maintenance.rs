//! Package updates, Arch news and snapper availability.
//!
//! These queries are expensive (checkupdates hits the network, the news feed
//! is remote), so reads go through a memory slot and a disk cache first and
//! only fall through to a live query once the TTL lapses. A failed refresh
//! serves the last known value instead of erasing it.

use std::{
    path::Path,
    sync::{Arc, OnceLock},
    time::Duration,
};

use chrono::DateTime;
use log::{info, warn};
use regex::Regex;
use reqwest::Client;
use shellstate_proto::{
    config::Config,
    ports::{CommandRequest, CommandRunner},
    snapshot::maintenance::{ArchNewsSnapshot, SnapperAvailability, UpdatesBreakdown},
};

use crate::{
    cache::{CacheRecord, DiskCache, MemorySlot},
    services::parse_u32,
};

const ARCH_NEWS_FEED_URL: &str = "https://archlinux.org/feeds/news/";
const AUR_UNAVAILABLE_MARKER: &str = "__NA__";

fn news_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?s)<item>.*?<title>(.*?)</title>.*?<link>(.*?)</link>.*?<pubDate>(.*?)</pubDate>",
        )
        .expect("valid pattern")
    })
}

/// Minimal XML entity unescape for feed titles.
fn unescape(raw: &str) -> String {
    raw.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Extracts the first feed item.
pub fn parse_news_feed(xml: &str) -> Option<(String, String, String)> {
    let captures = news_item_re().captures(xml)?;
    let title = unescape(captures[1].trim());
    let link = captures[2].trim().to_string();
    let published = captures[3].trim().to_string();
    if title.is_empty() {
        return None;
    }
    Some((title, link, published))
}

/// Unread count (0 or 1) for the latest item.
///
/// An item without a publication date can never be marked read, so it
/// counts as read rather than leaving a badge that cannot be cleared.
pub fn unread_count(seen: Option<&str>, published: &str) -> u32 {
    if published.trim().is_empty() {
        return 0;
    }
    u32::from(is_unread(seen, published))
}

/// Whether `published` post-dates the persisted `seen` marker.
///
/// Both sides are RFC 2822 dates; if either fails to parse the comparison
/// falls back to string inequality so a malformed marker still clears once
/// the user marks the item read.
pub fn is_unread(seen: Option<&str>, published: &str) -> bool {
    let Some(seen) = seen.map(str::trim).filter(|seen| !seen.is_empty()) else {
        return true;
    };

    match (
        DateTime::parse_from_rfc2822(seen),
        DateTime::parse_from_rfc2822(published),
    ) {
        (Ok(seen_at), Ok(published_at)) => published_at > seen_at,
        _ => seen != published,
    }
}

/// Parses the two-line updates query output.
pub fn parse_updates_output(raw: &str) -> UpdatesBreakdown {
    let mut lines = raw.lines().map(str::trim);
    let official = lines.next().and_then(parse_u32);
    let aur_line = lines.next().unwrap_or(AUR_UNAVAILABLE_MARKER);

    if aur_line == AUR_UNAVAILABLE_MARKER {
        UpdatesBreakdown::with_total(official, None, false)
    } else {
        UpdatesBreakdown::with_total(official, parse_u32(aur_line), true)
    }
}

pub struct MaintenanceService {
    runner: Arc<dyn CommandRunner>,
    http: Client,
    aur_helper: String,
    updates_ttl: Duration,
    news_ttl: Duration,
    updates_memory: MemorySlot<UpdatesBreakdown>,
    updates_disk: DiskCache<UpdatesBreakdown>,
    news_memory: MemorySlot<ArchNewsSnapshot>,
    news_disk: DiskCache<ArchNewsSnapshot>,
    seen_disk: DiskCache<String>,
}

impl MaintenanceService {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &Config, cache_dir: &Path) -> Self {
        let http = match Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("shellstate")
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                warn!("http client builder failed, using defaults: {err}");
                Client::new()
            }
        };

        Self {
            runner,
            http,
            aur_helper: config.aur_helper.clone(),
            updates_ttl: Duration::from_secs(config.ttl.updates_secs),
            news_ttl: Duration::from_secs(config.ttl.news_secs),
            updates_memory: MemorySlot::new(),
            updates_disk: DiskCache::new(cache_dir, "updates"),
            news_memory: MemorySlot::new(),
            news_disk: DiskCache::new(cache_dir, "arch-news"),
            seen_disk: DiskCache::new(cache_dir, "arch-news-seen"),
        }
    }

    fn updates_query(&self) -> String {
        let helper = &self.aur_helper;
        format!(
            "if command -v checkupdates >/dev/null 2>&1; then \
               checkupdates 2>/dev/null | wc -l; \
             else \
               pacman -Qu 2>/dev/null | wc -l; \
             fi; \
             if command -v {helper} >/dev/null 2>&1; then \
               {helper} -Qua 2>/dev/null | wc -l; \
             else \
               echo {AUR_UNAVAILABLE_MARKER}; \
             fi"
        )
    }

    async fn query_updates(&self) -> Option<UpdatesBreakdown> {
        let request = CommandRequest::new(self.updates_query())
            .timeout(Duration::from_secs(90))
            .allow_failure()
            .dedupe_key("maintenance-updates-refresh");

        let raw = match self.runner.run(request).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("updates query failed: {err}");
                return None;
            }
        };

        let breakdown = parse_updates_output(&raw);
        // Only discard the breakdown when neither leg produced a count.
        (breakdown.official.is_some() || breakdown.aur.is_some()).then_some(breakdown)
    }

    /// Pending updates: memory, then disk, then a live query, then whatever
    /// stale value survives.
    pub async fn read_updates(&self) -> UpdatesBreakdown {
        if let Some(fresh) = self.updates_memory.get_fresh(self.updates_ttl) {
            return fresh;
        }

        if let Some(record) = self.updates_disk.load_fresh(self.updates_ttl).await {
            self.updates_memory.set(record.clone());
            return record.value;
        }

        self.refresh_updates().await
    }

    /// Runs the updates query regardless of cache freshness.
    pub async fn refresh_updates(&self) -> UpdatesBreakdown {
        if let Some(breakdown) = self.query_updates().await {
            let record = CacheRecord::now(breakdown.clone());
            self.updates_memory.set(record.clone());
            self.updates_disk.store(&record).await;
            return breakdown;
        }

        if let Some(stale) = self.updates_memory.get_any() {
            return stale;
        }
        if let Some(record) = self.updates_disk.load_any().await {
            return record.value;
        }
        UpdatesBreakdown::default()
    }

    async fn fetch_news(&self) -> Option<ArchNewsSnapshot> {
        let response = self
            .http
            .get(ARCH_NEWS_FEED_URL)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let body = match response {
            Ok(response) => match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    warn!("news feed body failed: {err}");
                    return None;
                }
            },
            Err(err) => {
                warn!("news feed request failed: {err}");
                return None;
            }
        };

        let (title, link, published) = parse_news_feed(&body)?;
        let seen = self.seen_disk.load_any().await.map(|record| record.value);

        Some(ArchNewsSnapshot {
            unread_count: unread_count(seen.as_deref(), &published),
            latest_title: title,
            latest_link: link,
            latest_published_at: published,
        })
    }

    /// Latest Arch news item with read tracking, cached like updates.
    pub async fn read_news(&self) -> ArchNewsSnapshot {
        if let Some(fresh) = self.news_memory.get_fresh(self.news_ttl) {
            return fresh;
        }

        if let Some(record) = self.news_disk.load_fresh(self.news_ttl).await {
            self.news_memory.set(record.clone());
            return record.value;
        }

        self.refresh_news().await
    }

    /// Fetches the feed regardless of cache freshness.
    pub async fn refresh_news(&self) -> ArchNewsSnapshot {
        if let Some(snapshot) = self.fetch_news().await {
            let record = CacheRecord::now(snapshot.clone());
            self.news_memory.set(record.clone());
            self.news_disk.store(&record).await;
            return snapshot;
        }

        if let Some(stale) = self.news_memory.get_any() {
            return stale;
        }
        if let Some(record) = self.news_disk.load_any().await {
            return record.value;
        }
        ArchNewsSnapshot::default()
    }

    /// Persists the latest item's publication date as the seen marker and
    /// clears the unread flag in both cache layers.
    pub async fn mark_news_read(&self) {
        let latest = match self.news_memory.get_any() {
            Some(snapshot) => Some(snapshot),
            None => self.news_disk.load_any().await.map(|record| record.value),
        };

        let Some(mut snapshot) = latest else {
            return;
        };
        if snapshot.latest_published_at.is_empty() {
            return;
        }

        info!("marking news read up to {}", snapshot.latest_published_at);
        self.seen_disk
            .store(&CacheRecord::now(snapshot.latest_published_at.clone()))
            .await;

        snapshot.unread_count = 0;
        let record = CacheRecord::now(snapshot);
        self.news_memory.set(record.clone());
        self.news_disk.store(&record).await;
    }

    /// Checks whether snapper rollbacks are possible on this host.
    pub async fn read_snapper(&self) -> SnapperAvailability {
        let script = "if command -v snapper >/dev/null 2>&1; then \
                        if snapper list-configs 2>/dev/null | awk '{print $1}' | grep -qx root; then \
                          echo ok; \
                        else \
                          echo missing_root; \
                        fi; \
                      else \
                        echo missing; \
                      fi";
        let request = CommandRequest::new(script)
            .timeout(Duration::from_secs(10))
            .allow_failure()
            .dedupe_key("maintenance-snapper");

        let raw = match self.runner.run(request).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("snapper probe failed: {err}");
                return SnapperAvailability::default();
            }
        };

        match raw.trim() {
            "ok" => SnapperAvailability {
                available: true,
                reason: "root config present".to_string(),
            },
            "missing_root" => SnapperAvailability {
                available: false,
                reason: "no snapper config for root".to_string(),
            },
            _ => SnapperAvailability::default(),
        }
    }
}
