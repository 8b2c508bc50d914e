use serde::{Deserialize, Serialize};

/// Pending package update counts.
///
/// `None` means the corresponding query could not produce a number, which is
/// distinct from a confirmed zero.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdatesBreakdown {
    /// Official repository updates.
    pub official: Option<u32>,
    /// AUR updates; `None` also when no AUR helper is installed.
    pub aur: Option<u32>,
    pub total: Option<u32>,
    /// Whether an AUR helper was detected at all.
    pub aur_enabled: bool,
}

impl UpdatesBreakdown {
    /// Recomputes `total` from the component counts.
    pub fn with_total(official: Option<u32>, aur: Option<u32>, aur_enabled: bool) -> Self {
        let total = match (official, aur_enabled, aur) {
            (None, _, _) => None,
            (Some(official), false, _) => Some(official),
            (Some(official), true, None) => Some(official),
            (Some(official), true, Some(aur)) => Some(official + aur),
        };

        Self {
            official,
            aur,
            total,
            aur_enabled,
        }
    }
}

/// Latest Arch news item plus read-tracking.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArchNewsSnapshot {
    /// `1` when the latest item post-dates the persisted seen marker.
    pub unread_count: u32,
    pub latest_title: String,
    pub latest_link: String,
    /// RFC 2822 publication date, verbatim from the feed.
    pub latest_published_at: String,
}

/// Whether snapper rollbacks are possible on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapperAvailability {
    pub available: bool,
    pub reason: String,
}

impl Default for SnapperAvailability {
    fn default() -> Self {
        Self {
            available: false,
            reason: "snapper not installed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_combines_official_and_aur() {
        let breakdown = UpdatesBreakdown::with_total(Some(12), Some(3), true);
        assert_eq!(breakdown.total, Some(15));
    }

    #[test]
    fn total_survives_missing_aur_count() {
        let breakdown = UpdatesBreakdown::with_total(Some(12), None, true);
        assert_eq!(breakdown.total, Some(12));
    }

    #[test]
    fn total_is_unknown_without_official_count() {
        let breakdown = UpdatesBreakdown::with_total(None, Some(3), true);
        assert_eq!(breakdown.total, None);
    }
}
