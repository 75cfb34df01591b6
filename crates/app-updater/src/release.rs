//! Release information adopted from the bridge.

use serde::Serialize;
use serde_json::Value;

use crate::payload::string_field;

/// Information about an available update.
///
/// The version is always non-empty; there is no way to build an
/// `UpdateInfo` from a blank version string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    version: String,
    release_notes: String,
}

impl UpdateInfo {
    /// Builds release info, returning `None` if the version is blank.
    ///
    /// ```
    /// use app_updater::UpdateInfo;
    ///
    /// assert!(UpdateInfo::new("  ", "notes").is_none());
    /// assert_eq!(UpdateInfo::new(" 2.0.0 ", "").unwrap().version(), "2.0.0");
    /// ```
    pub fn new(version: impl AsRef<str>, release_notes: impl Into<String>) -> Option<Self> {
        let version = version.as_ref().trim();
        if version.is_empty() {
            return None;
        }
        Some(Self {
            version: version.to_string(),
            release_notes: release_notes.into(),
        })
    }

    /// Reads release info from a bridge payload.
    ///
    /// Accepts `{ version, releaseNotes }` (with `release_notes` / `notes`
    /// aliases) or a bare version string.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        if let Some(version) = payload.as_str() {
            return Self::new(version, String::new());
        }
        let version = string_field(payload, &["version"])?;
        Self::new(version, release_notes_field(payload).unwrap_or_default())
    }

    /// The release version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Release notes, possibly empty.
    #[must_use]
    pub fn release_notes(&self) -> &str {
        &self.release_notes
    }
}

/// Reads release notes under any of the accepted keys.
pub(crate) fn release_notes_field(payload: &Value) -> Option<String> {
    ["releaseNotes", "release_notes", "notes"]
        .iter()
        .find_map(|key| payload.get(*key))
        .map(release_notes_text)
}

/// Flattens release notes that may be a string or a list of per-version notes.
fn release_notes_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                other => string_field(other, &["note"]),
            })
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        _ => String::new(),
    }
}
