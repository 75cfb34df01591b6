//! The update lifecycle controller.
//!
//! One controller is meant to exist per process. [`UpdateController`] is a
//! cheap handle: clones share the same state, listener registry, and bridge,
//! so every UI surface can hold its own clone and still observe one
//! consistent update status.
//!
//! No public operation returns an error. Failures are written to
//! [`UpdateState::error`] or [`UpdateState::last_check_message`]; an
//! unsupported environment turns every operation into a silent no-op.

use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;

use crate::bridge::{BridgeCapabilities, CheckResponse, EventHandler, Support, UpdateBridge};
use crate::config::ControllerConfig;
use crate::error::{Result, UpdateError};
use crate::listeners::{ListenerRegistry, Subscription, detach_all};
use crate::payload::UpdateEvent;
use crate::release::UpdateInfo;
use crate::state::UpdateState;

/// What a manual check concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Another manual check was already running; nothing was done.
    Busy,
    /// Not running inside this application's desktop shell.
    DesktopOnly,
    /// The desktop shell lacks updater operations.
    UnsupportedBuild,
    /// The bridge reports updates as disabled.
    Disabled,
    /// The check failed with the given message.
    Failed(String),
    /// A newer release exists.
    UpdateAvailable(UpdateInfo),
    /// Already on the latest release.
    UpToDate,
}

impl CheckOutcome {
    /// Whether the check found a newer release.
    #[must_use]
    pub fn has_update(&self) -> bool {
        matches!(self, Self::UpdateAvailable(_))
    }
}

/// Runs a closure when dropped, including when the owning future is dropped
/// mid-await.
struct OnExit<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> OnExit<F> {
    fn new(f: F) -> Self {
        Self(Some(f))
    }
}

impl<F: FnOnce()> Drop for OnExit<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

struct Inner {
    config: ControllerConfig,
    bridge: Option<Arc<dyn UpdateBridge>>,
    support: Support,
    capabilities: BridgeCapabilities,
    state: watch::Sender<UpdateState>,
    listeners: Mutex<ListenerRegistry>,
}

/// Handle to the process-wide update state machine.
#[derive(Clone)]
pub struct UpdateController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for UpdateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateController")
            .field("support", &self.inner.support)
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl UpdateController {
    /// Creates a controller around whatever bridge the host provided.
    ///
    /// Support is detected here, once, and cached for the controller's
    /// lifetime.
    pub fn new(config: ControllerConfig, bridge: Option<Arc<dyn UpdateBridge>>) -> Self {
        let support = Support::detect(bridge.as_deref(), &config);
        let capabilities = match (&bridge, support.is_supported()) {
            (Some(bridge), true) => bridge.capabilities(),
            _ => BridgeCapabilities::default(),
        };
        if support.is_supported() {
            tracing::info!(?capabilities, "Update bridge detected");
        } else {
            tracing::debug!("Updates unavailable: {}", support);
        }

        let (state, _) = watch::channel(UpdateState::default());
        Self {
            inner: Arc::new(Inner {
                config,
                bridge,
                support,
                capabilities,
                state,
                listeners: Mutex::new(ListenerRegistry::default()),
            }),
        }
    }

    /// Controller for a runtime without any bridge, such as a web build.
    #[must_use]
    pub fn without_bridge(config: ControllerConfig) -> Self {
        Self::new(config, None)
    }

    /// The cached support verdict.
    #[must_use]
    pub fn support(&self) -> &Support {
        &self.inner.support
    }

    /// Whether the update flow can run at all.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.inner.support.is_supported()
    }

    /// The controller's configuration.
    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> UpdateState {
        self.inner.state.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.inner.state.subscribe()
    }

    /// Whether bridge listeners are currently registered.
    #[must_use]
    pub fn listeners_registered(&self) -> bool {
        self.inner.listeners.lock().is_registered()
    }

    /// Number of live bridge subscriptions.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    // =========================================================================
    // Listener lifecycle
    // =========================================================================

    /// Refreshes the installed version and subscribes to bridge events.
    ///
    /// Safe to call from several places: only the first call after
    /// construction (or after [`cleanup`](Self::cleanup)) subscribes.
    pub async fn init_listeners(&self) {
        let Ok(bridge) = self.supported_bridge() else {
            return;
        };
        let Some(generation) = self.inner.listeners.lock().claim() else {
            tracing::debug!("Update listeners already registered");
            return;
        };

        self.refresh_version().await;

        let handles = [
            (
                "update-available",
                bridge.on_update_available(self.event_handler(UpdateEvent::available)),
            ),
            (
                "download-progress",
                bridge.on_download_progress(self.event_handler(UpdateEvent::progress)),
            ),
            (
                "update-downloaded",
                bridge.on_update_downloaded(self.event_handler(UpdateEvent::downloaded)),
            ),
            (
                "update-error",
                bridge.on_update_error(self.event_handler(UpdateEvent::error)),
            ),
        ];
        let mut subscriptions = Vec::with_capacity(handles.len());
        for (channel, unsubscribe) in handles {
            match unsubscribe {
                Some(unsubscribe) => subscriptions.push(Subscription::new(channel, unsubscribe)),
                None => tracing::debug!(channel, "Bridge returned no unsubscribe handle"),
            }
        }

        let count = subscriptions.len();
        let committed = self.inner.listeners.lock().commit(generation, subscriptions);
        match committed {
            Ok(()) => tracing::info!("Registered {} update listener(s)", count),
            Err(stale) => {
                let failures = detach_all(stale);
                tracing::debug!(
                    failures,
                    "Listeners were cleaned up during registration; detached {} new handle(s)",
                    count
                );
            }
        }
    }

    /// Detaches every bridge listener and allows a later re-registration.
    ///
    /// Does not cancel bridge operations already in flight.
    pub fn cleanup(&self) {
        let subscriptions = self.inner.listeners.lock().release();
        if subscriptions.is_empty() {
            return;
        }
        let count = subscriptions.len();
        let failures = detach_all(subscriptions);
        tracing::info!("Detached {} update listener(s), {} failed", count, failures);
    }

    /// Detaches listeners and restores the initial state.
    ///
    /// The installed version is kept since it cannot change underneath us.
    /// Intended for tests and for hosts that tear down and recreate their
    /// bridge.
    pub fn reset(&self) {
        self.cleanup();
        self.inner.state.send_modify(|state| {
            *state = UpdateState {
                current_version: std::mem::take(&mut state.current_version),
                ..UpdateState::default()
            };
        });
    }

    /// Applies a normalized event as if the bridge had delivered it.
    pub fn handle_event(&self, event: &UpdateEvent) {
        apply_event(&self.inner, event);
    }

    fn event_handler(&self, normalize: fn(&Value) -> UpdateEvent) -> EventHandler {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Arc::new(move |payload: Value| {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            apply_event(&inner, &normalize(&payload));
        })
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Asks the bridge for the installed version.
    ///
    /// Falls back to the cached value on any failure and returns whichever
    /// version is current afterwards.
    pub async fn refresh_version(&self) -> String {
        match self.try_refresh_version().await {
            Ok(version) => {
                self.inner.state.send_if_modified(|state| {
                    if state.current_version == version {
                        return false;
                    }
                    state.current_version.clone_from(&version);
                    true
                });
                version
            }
            Err(err) => {
                tracing::debug!("Keeping cached version: {}", err);
                self.inner.state.borrow().current_version.clone()
            }
        }
    }

    /// Runs a user-initiated update check.
    ///
    /// Overlapping calls return [`CheckOutcome::Busy`]. Every other outcome
    /// also lands in `last_check_message`.
    pub async fn manual_check(&self) -> CheckOutcome {
        let acquired = self.inner.state.send_if_modified(|state| {
            if state.manual_check_loading {
                return false;
            }
            state.manual_check_loading = true;
            true
        });
        if !acquired {
            tracing::debug!("Manual update check already running");
            return CheckOutcome::Busy;
        }
        let _loading = OnExit::new(|| {
            self.inner
                .state
                .send_modify(|state| state.manual_check_loading = false);
        });

        let outcome = self.run_manual_check().await;
        let message = self.check_message(&outcome);
        self.inner
            .state
            .send_modify(|state| state.last_check_message = message);
        outcome
    }

    async fn run_manual_check(&self) -> CheckOutcome {
        if !self.inner.support.in_desktop_shell() {
            return CheckOutcome::DesktopOnly;
        }
        if !self.inner.support.is_supported() {
            return CheckOutcome::UnsupportedBuild;
        }

        tracing::info!("Checking for updates");
        self.refresh_version().await;
        match self.try_check().await {
            Ok(response) => {
                self.inner
                    .state
                    .send_modify(|state| state.last_check_at = Some(Utc::now()));
                self.classify(response)
            }
            Err(err) => {
                tracing::warn!("Update check failed: {}", err);
                CheckOutcome::Failed(err.user_message())
            }
        }
    }

    fn classify(&self, response: CheckResponse) -> CheckOutcome {
        if response.enabled == Some(false) {
            tracing::info!("Updates are disabled by the bridge");
            return CheckOutcome::Disabled;
        }
        if let Some(error) = response.error.filter(|e| !e.trim().is_empty()) {
            tracing::warn!("Bridge reported check error: {}", error);
            return CheckOutcome::Failed(error);
        }
        if response.has_update != Some(true) {
            tracing::info!("No update available");
            return CheckOutcome::UpToDate;
        }

        let found = UpdateInfo::new(
            response.version.unwrap_or_default(),
            response.release_notes.unwrap_or_default(),
        );
        let mut adopted = None;
        self.inner.state.send_modify(|state| {
            state.adopt(found);
            if state.info.is_some() {
                state.open = true;
            }
            adopted = state.info.clone();
        });
        match adopted {
            Some(info) => {
                tracing::info!("Update available: {}", info.version());
                CheckOutcome::UpdateAvailable(info)
            }
            None => {
                let err = UpdateError::InvalidPayload("update reported without a version".into());
                tracing::warn!("{}", err);
                CheckOutcome::Failed(err.to_string())
            }
        }
    }

    fn check_message(&self, outcome: &CheckOutcome) -> String {
        let messages = &self.inner.config.messages;
        match outcome {
            CheckOutcome::Busy => self.inner.state.borrow().last_check_message.clone(),
            CheckOutcome::DesktopOnly => messages.desktop_only.clone(),
            CheckOutcome::UnsupportedBuild => messages.unsupported_build.clone(),
            CheckOutcome::Disabled => messages.disabled.clone(),
            CheckOutcome::Failed(error) => messages.render_check_failed(error),
            CheckOutcome::UpdateAvailable(info) => messages.render_update_found(info.version()),
            CheckOutcome::UpToDate => {
                messages.render_up_to_date(&self.inner.state.borrow().current_version)
            }
        }
    }

    /// Starts downloading the offered release.
    ///
    /// Failures are written to `error`; callers should gate this on
    /// `is_downloading` since nothing here prevents a second download.
    pub async fn start_update(&self) {
        if let Err(err) = self.try_start_update().await {
            if matches!(err, UpdateError::Unsupported) {
                return;
            }
            tracing::error!("Update download failed: {}", err);
            let message = err.user_message();
            self.inner.state.send_modify(|state| {
                state.error = message;
                state.is_downloading = false;
            });
        }
    }

    async fn try_start_update(&self) -> Result<()> {
        let bridge = self.supported_bridge()?;
        tracing::info!("Starting update download");
        self.inner.state.send_modify(UpdateState::begin_download);
        bridge.download_and_install().await?;
        self.settle_resolved_download();
        Ok(())
    }

    /// Handles a download call that resolved without any event having
    /// settled the state.
    fn settle_resolved_download(&self) {
        if !self.inner.config.ready_on_download_resolved {
            return;
        }
        let settled = self.inner.state.send_if_modified(|state| {
            if !state.is_downloading || state.ready_to_install || state.has_error() {
                return false;
            }
            *state = state.apply(&UpdateEvent::Downloaded(None));
            true
        });
        if settled {
            tracing::info!("Download resolved without event; marking ready to install");
        }
    }

    /// Installs a downloaded release.
    ///
    /// On success the bridge normally replaces the running process, so there
    /// is no "installing" state. Failures are written to `error` and leave
    /// the download/ready flags alone.
    pub async fn install_update(&self) {
        match self.try_install_update().await {
            Ok(()) | Err(UpdateError::Unsupported | UpdateError::MissingOperation(_)) => {}
            Err(err) => {
                tracing::error!("Update install failed: {}", err);
                let message = err.user_message();
                self.inner.state.send_modify(|state| state.error = message);
            }
        }
    }

    async fn try_install_update(&self) -> Result<()> {
        let bridge = self.supported_bridge()?;
        if !self.inner.capabilities.install_update {
            tracing::debug!("Bridge has no direct install");
            return Err(UpdateError::MissingOperation("installUpdate"));
        }
        tracing::info!("Installing update");
        bridge.install_update().await?;
        Ok(())
    }

    /// Skips the offered release for good and closes the dialog.
    ///
    /// The dialog closes and the release is forgotten locally even if the
    /// bridge fails to record the choice.
    pub async fn ignore(&self) {
        let Ok(bridge) = self.supported_bridge() else {
            return;
        };
        let version = self.inner.state.borrow().offered_version().to_string();
        if version.is_empty() {
            return;
        }
        let _forget = OnExit::new(|| {
            self.inner.state.send_modify(|state| {
                state.open = false;
                state.info = None;
            });
        });

        if !self.inner.capabilities.ignore_update {
            tracing::debug!("Bridge cannot persist ignored versions");
            return;
        }
        tracing::info!("Ignoring version {}", version);
        if let Err(err) = bridge.ignore_update(version).await {
            tracing::warn!("Failed to ignore version: {}", err);
        }
    }

    /// Hides the dialog without forgetting the offered release.
    pub fn dismiss(&self) {
        self.inner.state.send_if_modified(|state| {
            let was_open = state.open;
            state.open = false;
            was_open
        });
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn supported_bridge(&self) -> Result<&Arc<dyn UpdateBridge>> {
        match &self.inner.bridge {
            Some(bridge) if self.inner.support.is_supported() => Ok(bridge),
            _ => Err(UpdateError::Unsupported),
        }
    }

    async fn try_refresh_version(&self) -> Result<String> {
        let bridge = self.supported_bridge()?;
        let version = bridge.get_version().await?;
        let version = version.trim();
        if version.is_empty() {
            return Err(UpdateError::InvalidPayload("empty version".to_string()));
        }
        Ok(version.to_string())
    }

    async fn try_check(&self) -> Result<CheckResponse> {
        let bridge = self.supported_bridge()?;
        Ok(bridge.check_for_updates().await?)
    }
}

fn apply_event(inner: &Inner, event: &UpdateEvent) {
    tracing::debug!(event = event.kind(), "Update event received");
    inner.state.send_modify(|state| *state = state.apply(event));
}
