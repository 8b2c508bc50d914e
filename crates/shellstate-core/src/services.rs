//! Subsystem services: execute an external tool, parse its output into a
//! snapshot, and degrade to a previous or empty snapshot on failure.

pub mod audio;
pub mod battery;
pub mod bluetooth;
pub mod hypr;
pub mod maintenance;
pub mod media;
pub mod network;
pub mod power;
pub mod session;
pub mod system;

/// Lenient integer parse: whitespace trimmed, anything non-numeric is `None`.
pub(crate) fn parse_u32(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok()
}

/// Lenient float parse tolerating a comma decimal separator.
pub(crate) fn parse_f64_loose(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    let value = cleaned.parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

pub(crate) fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

/// Rounds to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_parses() {
        assert_eq!(parse_u32(" 42 \n"), Some(42));
        assert_eq!(parse_u32("x"), None);
        assert_eq!(parse_f64_loose("0,85"), Some(0.85));
        assert_eq!(parse_f64_loose("nan"), None);
    }

    #[test]
    fn percent_clamping() {
        assert_eq!(clamp_percent(-3), 0);
        assert_eq!(clamp_percent(55), 55);
        assert_eq!(clamp_percent(250), 100);
    }
}
