//! Normalization of untrusted bridge payloads.
//!
//! Bridges deliver loosely shaped JSON. Everything here is lenient: a field
//! that cannot be read is treated as absent, never as an error.

use serde_json::Value;

use crate::progress::Progress;
use crate::release::UpdateInfo;

/// A bridge event after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEvent {
    /// The bridge found a newer release. `None` when the payload had no usable version.
    Available(Option<UpdateInfo>),
    /// Download progress report.
    Progress(Progress),
    /// The release finished downloading. `None` keeps the info already held.
    Downloaded(Option<UpdateInfo>),
    /// The bridge reported a failure. `None` when the payload carried no message.
    Error(Option<String>),
}

impl UpdateEvent {
    /// Normalizes an "update available" payload.
    #[must_use]
    pub fn available(payload: &Value) -> Self {
        Self::Available(UpdateInfo::from_payload(payload))
    }

    /// Normalizes a "download progress" payload.
    #[must_use]
    pub fn progress(payload: &Value) -> Self {
        Self::Progress(Progress::from_payload(payload))
    }

    /// Normalizes an "update downloaded" payload.
    #[must_use]
    pub fn downloaded(payload: &Value) -> Self {
        Self::Downloaded(UpdateInfo::from_payload(payload))
    }

    /// Normalizes an "update error" payload.
    #[must_use]
    pub fn error(payload: &Value) -> Self {
        Self::Error(error_message(payload))
    }

    /// Short name used in log lines.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Available(_) => "update-available",
            Self::Progress(_) => "download-progress",
            Self::Downloaded(_) => "update-downloaded",
            Self::Error(_) => "update-error",
        }
    }
}

/// Reads the first present string field among `keys`.
pub(crate) fn string_field<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| payload.get(*key)?.as_str())
}

/// Reads a number given either as a JSON number or a numeric string.
///
/// Non-finite values are rejected.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Reads the first present numeric field among `keys`.
pub(crate) fn number_field(payload: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| as_number(payload.get(*key)?))
}

/// Extracts a non-empty error message.
///
/// Accepts a bare string, `{ "message": .. }`, or `{ "error": .. }` where the
/// inner value may itself be a string or an object with `message`.
pub(crate) fn error_message(payload: &Value) -> Option<String> {
    let message = match payload {
        Value::String(s) => Some(s.as_str()),
        Value::Object(_) => string_field(payload, &["message"]).or_else(|| {
            let inner = payload.get("error")?;
            inner
                .as_str()
                .or_else(|| string_field(inner, &["message"]))
        }),
        _ => None,
    }?;
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}
