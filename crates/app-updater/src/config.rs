//! Configuration types for the update controller.

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdateError};

/// Brand marker expected from the bridge when none is configured.
pub const DEFAULT_BRAND: &str = "desktop-shell";

/// Placeholder replaced with a version string in check messages.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Placeholder replaced with an error message in check messages.
pub const ERROR_PLACEHOLDER: &str = "{error}";

/// Controller settings.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Identity of this application. A bridge carrying a different brand
    /// marker belongs to another host and is treated as absent.
    pub brand: String,

    /// Treat a successful `download_and_install` call as an implicit
    /// "update downloaded" event when the bridge never sends one.
    pub ready_on_download_resolved: bool,

    /// User-facing strings written to `last_check_message`.
    pub messages: UpdateMessages,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            brand: DEFAULT_BRAND.to_string(),
            ready_on_download_resolved: false,
            messages: UpdateMessages::default(),
        }
    }
}

impl ControllerConfig {
    /// Creates a default config for the given brand.
    #[must_use]
    pub fn with_brand(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            ..Default::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// ```
    /// use app_updater::ControllerConfig;
    ///
    /// let config = ControllerConfig::from_toml_str(r#"
    ///     brand = "notes"
    ///     [messages]
    ///     up_to_date = "Nothing new."
    /// "#).unwrap();
    /// assert_eq!(config.brand, "notes");
    /// assert_eq!(config.messages.up_to_date, "Nothing new.");
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.brand.trim().is_empty() {
            return Err(UpdateError::Config("brand must not be empty".to_string()));
        }
        for (name, message) in self.messages.entries() {
            if message.trim().is_empty() {
                return Err(UpdateError::Config(format!("message `{name}` must not be empty")));
            }
        }
        Ok(())
    }

    /// Whether a bridge brand marker belongs to this application.
    #[must_use]
    pub fn accepts_brand(&self, marker: Option<&str>) -> bool {
        match marker {
            None => true,
            Some(marker) => marker.trim() == self.brand.trim(),
        }
    }
}

/// Localizable messages shown after a manual check.
///
/// `{version}` and `{error}` are substituted where they make sense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateMessages {
    /// Shown when running outside the desktop shell.
    pub desktop_only: String,
    /// Shown when the bridge is present but lacks updater operations.
    pub unsupported_build: String,
    /// Shown when the bridge reports updates as disabled.
    pub disabled: String,
    /// Shown when the check fails; `{error}` is the bridge message.
    pub check_failed: String,
    /// Shown when a newer release exists; `{version}` is its version.
    pub update_found: String,
    /// Shown when already current; `{version}` is the installed version.
    pub up_to_date: String,
}

impl Default for UpdateMessages {
    fn default() -> Self {
        Self {
            desktop_only: "Update checks are only available in the desktop app.".to_string(),
            unsupported_build: "This build does not support automatic updates.".to_string(),
            disabled: "Automatic updates are disabled for this build.".to_string(),
            check_failed: "Update check failed: {error}".to_string(),
            update_found: "Version {version} is available.".to_string(),
            up_to_date: "You are on the latest version ({version}).".to_string(),
        }
    }
}

impl UpdateMessages {
    fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("desktop_only", &self.desktop_only),
            ("unsupported_build", &self.unsupported_build),
            ("disabled", &self.disabled),
            ("check_failed", &self.check_failed),
            ("update_found", &self.update_found),
            ("up_to_date", &self.up_to_date),
        ]
    }

    /// Renders `check_failed` for the given error text.
    #[must_use]
    pub fn render_check_failed(&self, error: &str) -> String {
        self.check_failed.replace(ERROR_PLACEHOLDER, error)
    }

    /// Renders `update_found` for the given version.
    #[must_use]
    pub fn render_update_found(&self, version: &str) -> String {
        self.update_found.replace(VERSION_PLACEHOLDER, version)
    }

    /// Renders `up_to_date` for the installed version.
    ///
    /// An unknown installed version drops the parenthesized placeholder
    /// instead of printing `()`.
    #[must_use]
    pub fn render_up_to_date(&self, current_version: &str) -> String {
        if current_version.trim().is_empty() {
            return self
                .up_to_date
                .replace(" ({version})", "")
                .replace(VERSION_PLACEHOLDER, "");
        }
        self.up_to_date.replace(VERSION_PLACEHOLDER, current_version)
    }
}
