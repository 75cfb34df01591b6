//! Download progress as reported by the bridge, plus display helpers.

use serde::Serialize;
use serde_json::Value;

use crate::payload::{as_number, number_field};

/// Download progress.
///
/// `percent` is stored exactly as the bridge reported it; use
/// [`Progress::display_percent`] when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Raw percentage, not clamped.
    pub percent: f64,
    /// Transfer rate, if the bridge reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_per_second: Option<f64>,
    /// Estimated seconds left, if the bridge reported it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<f64>,
}

impl Progress {
    /// Progress at 0% with no rate or estimate.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            percent: 0.0,
            bytes_per_second: None,
            remaining: None,
        }
    }

    /// Progress pinned at 100%.
    #[must_use]
    pub const fn complete() -> Self {
        Self {
            percent: 100.0,
            bytes_per_second: None,
            remaining: None,
        }
    }

    /// Reads progress from a bridge payload.
    ///
    /// A bare number is taken as the percentage. A missing or unreadable
    /// percentage becomes 0; rate and estimate stay absent unless they are
    /// non-negative numbers.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Self {
        if let Some(percent) = as_number(payload) {
            return Self {
                percent,
                ..Self::zero()
            };
        }
        let non_negative = |keys: &[&str]| number_field(payload, keys).filter(|n| *n >= 0.0);
        Self {
            percent: number_field(payload, &["percent"]).unwrap_or(0.0),
            bytes_per_second: non_negative(&["bytesPerSecond", "bytes_per_second"]),
            remaining: non_negative(&["remaining", "remainingSeconds", "remaining_seconds"]),
        }
    }

    /// Whether this report shows a download actually moving.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.percent.is_finite() && self.percent > 0.0
    }

    /// Percentage clamped to `[0, 100]` for rendering. NaN renders as 0.
    #[must_use]
    pub fn display_percent(&self) -> f64 {
        if self.percent.is_nan() {
            return 0.0;
        }
        self.percent.clamp(0.0, 100.0)
    }

    /// Progress as a fraction (0.0 to 1.0), for progress bars.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        (self.display_percent() / 100.0) as f32
    }

    /// Human-readable transfer rate, or `None` when not reported.
    #[must_use]
    pub fn speed_label(&self) -> Option<String> {
        self.bytes_per_second
            .map(|rate| format_speed(rate.round() as u64))
    }

    /// Human-readable time left, or `None` when not reported.
    #[must_use]
    pub fn remaining_label(&self) -> Option<String> {
        self.remaining.map(format_remaining)
    }
}

/// Formats a byte count with a binary unit ("512 B", "1.5 KB", "50.0 MB").
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Formats a transfer rate ("1.5 MB/s").
#[must_use]
pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// Format a number of seconds as a short duration ("1h 5m", "3m 20s", "42s").
#[must_use]
pub fn format_remaining(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
