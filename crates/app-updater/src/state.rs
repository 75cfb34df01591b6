//! Observable update state and the pure event transitions over it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::payload::UpdateEvent;
use crate::progress::Progress;
use crate::release::UpdateInfo;

/// Everything the UI needs to render update status.
///
/// `is_downloading` and `ready_to_install` are never both true.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateState {
    /// Release being offered, if any.
    pub info: Option<UpdateInfo>,
    /// Whether the update dialog should be shown.
    pub open: bool,
    /// A download is in flight.
    pub is_downloading: bool,
    /// A downloaded update awaits installation.
    pub ready_to_install: bool,
    /// Latest download progress.
    pub progress: Progress,
    /// Last bridge error, empty when none.
    pub error: String,
    /// Installed version as last reported by the bridge.
    pub current_version: String,
    /// A manual check is running.
    pub manual_check_loading: bool,
    /// Outcome of the last manual check, for display.
    pub last_check_message: String,
    /// When the bridge last answered a manual check.
    pub last_check_at: Option<DateTime<Utc>>,
}

/// Coarse status derived from [`UpdateState`], for switching UI views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    /// Nothing to show.
    Idle,
    /// A release is on offer.
    Available,
    /// Downloading.
    Downloading,
    /// Downloaded, waiting for the user to install.
    ReadyToInstall,
    /// The last action failed.
    Failed,
}

impl UpdateState {
    /// Applies a normalized bridge event, returning the next state.
    ///
    /// "Available" and "downloaded" always reopen the dialog: a dismissal
    /// only means "not now".
    #[must_use]
    pub fn apply(&self, event: &UpdateEvent) -> Self {
        let mut next = self.clone();
        match event {
            UpdateEvent::Available(info) => {
                next.error.clear();
                next.is_downloading = false;
                next.ready_to_install = false;
                next.progress = Progress::zero();
                next.adopt(info.clone());
                next.open = true;
            }
            UpdateEvent::Progress(progress) => {
                next.progress = *progress;
                if progress.is_active() {
                    next.is_downloading = true;
                    next.ready_to_install = false;
                }
            }
            UpdateEvent::Downloaded(info) => {
                next.adopt(info.clone());
                next.is_downloading = false;
                next.ready_to_install = true;
                next.progress = Progress::complete();
                next.open = true;
            }
            UpdateEvent::Error(message) => {
                if let Some(message) = message {
                    next.error = message.clone();
                }
                next.is_downloading = false;
                next.ready_to_install = false;
            }
        }
        next
    }

    /// Replaces `info` when a valid one is given; keeps the old one otherwise.
    pub fn adopt(&mut self, info: Option<UpdateInfo>) {
        if let Some(info) = info {
            self.info = Some(info);
        }
    }

    /// Marks the start of a download initiated by the user.
    pub(crate) fn begin_download(&mut self) {
        self.error.clear();
        self.is_downloading = true;
        self.ready_to_install = false;
        self.progress = Progress::zero();
    }

    /// Version of the release on offer, empty when there is none.
    #[must_use]
    pub fn offered_version(&self) -> &str {
        self.info.as_ref().map_or("", UpdateInfo::version)
    }

    /// Whether a failure message is pending.
    #[must_use]
    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Derives the coarse phase shown by the dialog.
    #[must_use]
    pub fn phase(&self) -> UpdatePhase {
        if self.ready_to_install {
            UpdatePhase::ReadyToInstall
        } else if self.is_downloading {
            UpdatePhase::Downloading
        } else if self.has_error() {
            UpdatePhase::Failed
        } else if self.info.is_some() {
            UpdatePhase::Available
        } else {
            UpdatePhase::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn info(version: &str) -> Option<UpdateInfo> {
        UpdateInfo::new(version, "")
    }

    #[test]
    fn test_available_resets_and_opens() {
        let state = UpdateState {
            error: "old".to_string(),
            is_downloading: true,
            progress: Progress::from_payload(&json!({"percent": 40})),
            ..Default::default()
        };
        let next = state.apply(&UpdateEvent::Available(info("2.0.0")));
        assert!(next.open);
        assert!(!next.is_downloading);
        assert!(!next.ready_to_install);
        assert_eq!(next.progress, Progress::zero());
        assert!(next.error.is_empty());
        assert_eq!(next.offered_version(), "2.0.0");
    }

    #[test]
    fn test_available_without_version_keeps_info() {
        let state = UpdateState {
            info: info("1.5.0"),
            ..Default::default()
        };
        let next = state.apply(&UpdateEvent::available(&json!({"version": "   "})));
        assert_eq!(next.offered_version(), "1.5.0");
        assert!(next.open);
    }

    #[test]
    fn test_progress_forces_downloading() {
        let state = UpdateState::default();
        let next = state.apply(&UpdateEvent::progress(&json!({"percent": 12})));
        assert!(next.is_downloading);
        assert_eq!(next.progress.percent, 12.0);

        let idle = state.apply(&UpdateEvent::progress(&json!({"percent": 0})));
        assert!(!idle.is_downloading);
    }

    #[test]
    fn test_progress_replaces_wholesale() {
        let state = UpdateState {
            progress: Progress {
                percent: 30.0,
                bytes_per_second: Some(100.0),
                remaining: Some(5.0),
            },
            ..Default::default()
        };
        let next = state.apply(&UpdateEvent::progress(&json!({"percent": 35})));
        assert_eq!(next.progress.bytes_per_second, None);
        assert_eq!(next.progress.remaining, None);
    }

    #[test]
    fn test_downloaded_after_dismiss() {
        let state = UpdateState {
            info: info("2.0.0"),
            open: false,
            is_downloading: true,
            progress: Progress::from_payload(&json!({"percent": 63, "bytesPerSecond": 512})),
            ..Default::default()
        };
        let next = state.apply(&UpdateEvent::Downloaded(None));
        assert_eq!(next.progress, Progress::complete());
        assert!(next.open);
        assert!(next.ready_to_install);
        assert!(!next.is_downloading);
        assert_eq!(next.progress.display_percent(), 100.0);
        assert_eq!(next.offered_version(), "2.0.0");
        assert_eq!(next.phase(), UpdatePhase::ReadyToInstall);
    }

    #[test]
    fn test_error_event() {
        let state = UpdateState {
            error: "previous".to_string(),
            ready_to_install: true,
            ..Default::default()
        };
        let silent = state.apply(&UpdateEvent::Error(None));
        assert_eq!(silent.error, "previous");
        assert!(!silent.ready_to_install);

        let loud = state.apply(&UpdateEvent::error(&json!({"message": "signature mismatch"})));
        assert_eq!(loud.error, "signature mismatch");
        assert_eq!(loud.phase(), UpdatePhase::Failed);
    }

    #[test]
    fn test_flags_never_both_set() {
        let events = [
            UpdateEvent::Downloaded(info("1.0.0")),
            UpdateEvent::progress(&json!({"percent": 5})),
            UpdateEvent::Downloaded(None),
            UpdateEvent::Available(None),
            UpdateEvent::progress(&json!({"percent": 99})),
            UpdateEvent::Error(Some("x".to_string())),
        ];
        let mut state = UpdateState::default();
        for event in &events {
            state = state.apply(event);
            assert!(!(state.is_downloading && state.ready_to_install), "{event:?}");
        }
    }

    #[test]
    fn test_phase_idle_by_default() {
        assert_eq!(UpdateState::default().phase(), UpdatePhase::Idle);
    }
}
