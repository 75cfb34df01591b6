//! The host update bridge and capability detection.
//!
//! A bridge is whatever the desktop shell injects to perform real update
//! work. The controller never trusts it: every operation may be missing,
//! fail, or return junk, and the bridge may belong to a different host
//! entirely (detected through its brand marker).

use std::fmt;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::Value;

use crate::config::ControllerConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::payload::error_message;
use crate::release::release_notes_field;

/// Callback invoked by the bridge when an event fires.
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Handle returned by a subscription; calling it detaches the handler.
pub type Unsubscribe = Box<dyn FnOnce() -> BridgeResult<()> + Send>;

/// Which operations a bridge actually implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeCapabilities {
    /// `getVersion`
    pub get_version: bool,
    /// `checkForUpdates`
    pub check_for_updates: bool,
    /// `downloadAndInstall`
    pub download_and_install: bool,
    /// `installUpdate` (optional)
    pub install_update: bool,
    /// `ignoreUpdate` (optional)
    pub ignore_update: bool,
}

impl BridgeCapabilities {
    /// A bridge exposing every operation.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            get_version: true,
            check_for_updates: true,
            download_and_install: true,
            install_update: true,
            ignore_update: true,
        }
    }

    /// Names of the operations required for the minimal update flow that are missing.
    #[must_use]
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            (self.get_version, "getVersion"),
            (self.check_for_updates, "checkForUpdates"),
            (self.download_and_install, "downloadAndInstall"),
        ]
        .into_iter()
        .filter_map(|(present, name)| (!present).then_some(name))
        .collect()
    }
}

/// Response to `checkForUpdates`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckResponse {
    /// `Some(false)` when updates are turned off for this build.
    pub enabled: Option<bool>,
    /// Error reported by the bridge instead of failing the call.
    pub error: Option<String>,
    /// Whether a newer release exists.
    pub has_update: Option<bool>,
    /// Version of the newer release.
    pub version: Option<String>,
    /// Release notes of the newer release.
    pub release_notes: Option<String>,
}

impl CheckResponse {
    /// Builds a response from loosely typed JSON.
    ///
    /// Unlike plain deserialization this tolerates an `error` given as an
    /// object and release notes given as a list.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let bool_field = |key: &str| value.get(key).and_then(Value::as_bool);
        Self {
            enabled: bool_field("enabled"),
            error: value.get("error").and_then(error_message),
            has_update: bool_field("hasUpdate").or_else(|| bool_field("has_update")),
            version: value
                .get("version")
                .and_then(Value::as_str)
                .map(str::to_string),
            release_notes: release_notes_field(value).filter(|notes| !notes.trim().is_empty()),
        }
    }

    /// Response for a bridge that found nothing new.
    #[must_use]
    pub fn up_to_date() -> Self {
        Self {
            has_update: Some(false),
            ..Default::default()
        }
    }

    /// Response announcing a newer release.
    #[must_use]
    pub fn update(version: impl Into<String>, release_notes: impl Into<String>) -> Self {
        Self {
            has_update: Some(true),
            version: Some(version.into()),
            release_notes: Some(release_notes.into()),
            ..Default::default()
        }
    }
}

fn missing<T: Send + 'static>(operation: &'static str) -> BoxFuture<'static, BridgeResult<T>> {
    future::ready(Err(BridgeError::missing(operation))).boxed()
}

/// Update capability injected by the desktop host.
///
/// Implementations report what they support through [`capabilities`];
/// operations they leave out keep the default bodies, which fail, and
/// subscriptions they leave out return `None`.
///
/// [`capabilities`]: UpdateBridge::capabilities
pub trait UpdateBridge: Send + Sync {
    /// Identity marker of the host that installed this bridge.
    fn brand(&self) -> Option<&str> {
        None
    }

    /// Operations this bridge implements.
    fn capabilities(&self) -> BridgeCapabilities;

    /// Installed application version.
    fn get_version(&self) -> BoxFuture<'_, BridgeResult<String>> {
        missing("getVersion")
    }

    /// Asks the update server whether a newer release exists.
    fn check_for_updates(&self) -> BoxFuture<'_, BridgeResult<CheckResponse>> {
        missing("checkForUpdates")
    }

    /// Downloads the offered release and arms its installation.
    fn download_and_install(&self) -> BoxFuture<'_, BridgeResult<()>> {
        missing("downloadAndInstall")
    }

    /// Installs a downloaded release, normally replacing the running process.
    fn install_update(&self) -> BoxFuture<'_, BridgeResult<()>> {
        missing("installUpdate")
    }

    /// Persistently suppresses notifications for `version`.
    fn ignore_update(&self, version: String) -> BoxFuture<'_, BridgeResult<()>> {
        let _ = version;
        missing("ignoreUpdate")
    }

    /// Subscribes to "update available".
    fn on_update_available(&self, handler: EventHandler) -> Option<Unsubscribe> {
        let _ = handler;
        None
    }

    /// Subscribes to "download progress".
    fn on_download_progress(&self, handler: EventHandler) -> Option<Unsubscribe> {
        let _ = handler;
        None
    }

    /// Subscribes to "update downloaded".
    fn on_update_downloaded(&self, handler: EventHandler) -> Option<Unsubscribe> {
        let _ = handler;
        None
    }

    /// Subscribes to "update error".
    fn on_update_error(&self, handler: EventHandler) -> Option<Unsubscribe> {
        let _ = handler;
        None
    }
}

/// Result of probing the runtime for a usable bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Support {
    /// No bridge in this runtime (e.g. a browser build).
    NoBridge,
    /// A bridge exists but belongs to another host.
    ForeignBrand {
        /// The marker the bridge carried.
        brand: String,
    },
    /// The bridge lacks operations needed for the update flow.
    MissingCapabilities {
        /// Names of the missing operations.
        missing: Vec<&'static str>,
    },
    /// The update flow is available.
    Supported,
}

impl Support {
    /// Probes a bridge against the configured brand.
    #[must_use]
    pub fn detect(bridge: Option<&dyn UpdateBridge>, config: &ControllerConfig) -> Self {
        let Some(bridge) = bridge else {
            return Self::NoBridge;
        };
        if !config.accepts_brand(bridge.brand()) {
            return Self::ForeignBrand {
                brand: bridge.brand().unwrap_or_default().to_string(),
            };
        }
        let missing = bridge.capabilities().missing_required();
        if missing.is_empty() {
            Self::Supported
        } else {
            Self::MissingCapabilities { missing }
        }
    }

    /// Whether the update flow may run.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported)
    }

    /// Whether we are running inside this application's desktop shell at all.
    #[must_use]
    pub fn in_desktop_shell(&self) -> bool {
        matches!(self, Self::Supported | Self::MissingCapabilities { .. })
    }
}

impl fmt::Display for Support {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBridge => write!(f, "no update bridge"),
            Self::ForeignBrand { brand } => write!(f, "bridge belongs to `{brand}`"),
            Self::MissingCapabilities { missing } => {
                write!(f, "bridge lacks {}", missing.join(", "))
            }
            Self::Supported => write!(f, "supported"),
        }
    }
}
