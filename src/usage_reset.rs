//! Reset timestamps and countdown formatting shared by all providers.
//!
//! Providers report reset times in three shapes: RFC 3339 strings (Claude),
//! epoch seconds or a relative "reset after N seconds" (Codex), and epoch
//! milliseconds (z.ai). Everything is normalized to epoch milliseconds here
//! so the countdown is computed one way.

/// Current time as Unix epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// An absolute reset timestamp stored as Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetTimestamp {
    pub epoch_ms: i64,
}

impl ResetTimestamp {
    pub fn from_epoch_ms(epoch_ms: i64) -> Self {
        Self { epoch_ms }
    }

    pub fn from_epoch_seconds(seconds: i64) -> Self {
        Self {
            epoch_ms: seconds.saturating_mul(1000),
        }
    }

    /// A reset `seconds` after `now_ms`.
    pub fn after_seconds(now_ms: i64, seconds: f64) -> Self {
        let offset = (seconds.max(0.0) * 1000.0).round() as i64;
        Self {
            epoch_ms: now_ms.saturating_add(offset),
        }
    }

    pub fn parse_rfc3339(value: &str) -> Option<Self> {
        chrono::DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| Self::from_epoch_ms(dt.timestamp_millis()))
    }

    /// Countdown label relative to `now_ms`.
    pub fn resets_in(&self, now_ms: i64) -> String {
        format_countdown(self.epoch_ms.saturating_sub(now_ms))
    }
}

/// Formats a remaining duration in milliseconds as a short countdown.
///
/// Minutes are rounded to the nearest whole minute so a reset exactly one
/// hour out still reads "1h 0m" a few milliseconds later.
///
/// Examples: "2d 3h", "1h 0m", "45m", "<1m", "now"
pub fn format_countdown(remaining_ms: i64) -> String {
    if remaining_ms <= 0 {
        return "now".to_string();
    }

    let total_minutes = remaining_ms.saturating_add(30_000) / 60_000;
    if total_minutes == 0 {
        return "<1m".to_string();
    }

    let days = total_minutes / 1440;
    let hours = (total_minutes % 1440) / 60;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
