//! Shared test fixtures: a scriptable, recording update bridge.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use app_updater::{
    BridgeCapabilities, BridgeError, BridgeResult, CheckResponse, ControllerConfig, EventHandler,
    Unsubscribe, UpdateBridge, UpdateController,
};
use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

pub const AVAILABLE: &str = "update-available";
pub const PROGRESS: &str = "download-progress";
pub const DOWNLOADED: &str = "update-downloaded";
pub const ERROR: &str = "update-error";

/// Installs a test subscriber once so `RUST_LOG` works in test runs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A bridge whose answers are scripted and whose calls are recorded.
pub struct MockBridge {
    brand: Option<String>,
    capabilities: BridgeCapabilities,
    version: Mutex<BridgeResult<String>>,
    version_gate: Mutex<Option<Arc<Notify>>>,
    check: Mutex<BridgeResult<CheckResponse>>,
    check_gate: Option<Arc<Notify>>,
    download: Mutex<BridgeResult<()>>,
    download_events: Mutex<Vec<(&'static str, Value)>>,
    install: Mutex<BridgeResult<()>>,
    ignore: Mutex<BridgeResult<()>>,
    silent_channels: Vec<&'static str>,
    failing_unsubscribe: Vec<&'static str>,
    calls: Arc<Mutex<Vec<String>>>,
    subscribe_counts: Mutex<HashMap<&'static str, usize>>,
    handlers: Arc<Mutex<HashMap<&'static str, EventHandler>>>,
    live: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl Default for MockBridge {
    fn default() -> Self {
        Self {
            brand: None,
            capabilities: BridgeCapabilities::all(),
            version: Mutex::new(Ok("1.0.0".to_string())),
            version_gate: Mutex::new(None),
            check: Mutex::new(Ok(CheckResponse::up_to_date())),
            check_gate: None,
            download: Mutex::new(Ok(())),
            download_events: Mutex::new(Vec::new()),
            install: Mutex::new(Ok(())),
            ignore: Mutex::new(Ok(())),
            silent_channels: Vec::new(),
            failing_unsubscribe: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            subscribe_counts: Mutex::new(HashMap::new()),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_brand(mut self, brand: &str) -> Self {
        self.brand = Some(brand.to_string());
        self
    }

    pub fn with_capabilities(mut self, capabilities: BridgeCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_version(self, version: BridgeResult<String>) -> Self {
        *self.version.lock() = version;
        self
    }

    /// Makes the next `get_version` call wait until the gate is notified.
    pub fn with_version_gate(self, gate: Arc<Notify>) -> Self {
        *self.version_gate.lock() = Some(gate);
        self
    }

    pub fn with_check(self, check: BridgeResult<CheckResponse>) -> Self {
        *self.check.lock() = check;
        self
    }

    /// Makes `check_for_updates` wait until the gate is notified.
    pub fn with_check_gate(mut self, gate: Arc<Notify>) -> Self {
        self.check_gate = Some(gate);
        self
    }

    pub fn with_download(self, download: BridgeResult<()>) -> Self {
        *self.download.lock() = download;
        self
    }

    /// Events emitted while `download_and_install` runs, before it resolves.
    pub fn with_download_events(self, events: Vec<(&'static str, Value)>) -> Self {
        *self.download_events.lock() = events;
        self
    }

    pub fn with_install(self, install: BridgeResult<()>) -> Self {
        *self.install.lock() = install;
        self
    }

    pub fn with_ignore(self, ignore: BridgeResult<()>) -> Self {
        *self.ignore.lock() = ignore;
        self
    }

    /// Channels whose subscribe call returns no unsubscribe handle.
    pub fn with_silent_channels(mut self, channels: &[&'static str]) -> Self {
        self.silent_channels = channels.to_vec();
        self
    }

    /// Channels whose unsubscribe handle fails.
    pub fn with_failing_unsubscribe(mut self, channels: &[&'static str]) -> Self {
        self.failing_unsubscribe = channels.to_vec();
        self
    }

    pub fn into_controller(self, config: ControllerConfig) -> (Arc<Self>, UpdateController) {
        let bridge = Arc::new(self);
        let controller =
            UpdateController::new(config, Some(Arc::clone(&bridge) as Arc<dyn UpdateBridge>));
        (bridge, controller)
    }

    /// Delivers an event to the registered handler, if any.
    pub fn emit(&self, channel: &'static str, payload: Value) -> bool {
        let handler = self.handlers.lock().get(channel).cloned();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    /// Operation calls in order, excluding subscriptions.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn subscribe_count(&self, channel: &str) -> usize {
        self.subscribe_counts.lock().get(channel).copied().unwrap_or(0)
    }

    /// Subscriptions on `channel` that have not been unsubscribed.
    pub fn live_count(&self, channel: &str) -> usize {
        self.live.lock().get(channel).copied().unwrap_or(0)
    }

    pub fn has_handler(&self, channel: &str) -> bool {
        self.handlers.lock().contains_key(channel)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn subscribe(&self, channel: &'static str, handler: EventHandler) -> Option<Unsubscribe> {
        *self.subscribe_counts.lock().entry(channel).or_default() += 1;
        if self.silent_channels.contains(&channel) {
            return None;
        }
        self.handlers.lock().insert(channel, handler);
        *self.live.lock().entry(channel).or_default() += 1;

        let handlers = Arc::clone(&self.handlers);
        let live = Arc::clone(&self.live);
        let calls = Arc::clone(&self.calls);
        let fails = self.failing_unsubscribe.contains(&channel);
        Some(Box::new(move || {
            calls.lock().push(format!("unsubscribe:{channel}"));
            if fails {
                return Err(BridgeError::new("listener already detached"));
            }
            handlers.lock().remove(channel);
            if let Some(count) = live.lock().get_mut(channel) {
                *count = count.saturating_sub(1);
            }
            Ok(())
        }))
    }
}

impl UpdateBridge for MockBridge {
    fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    fn capabilities(&self) -> BridgeCapabilities {
        self.capabilities
    }

    fn get_version(&self) -> BoxFuture<'_, BridgeResult<String>> {
        self.record("getVersion");
        let result = self.version.lock().clone();
        let gate = self.version_gate.lock().take();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            result
        }
        .boxed()
    }

    fn check_for_updates(&self) -> BoxFuture<'_, BridgeResult<CheckResponse>> {
        self.record("checkForUpdates");
        let result = self.check.lock().clone();
        let gate = self.check_gate.clone();
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            result
        }
        .boxed()
    }

    fn download_and_install(&self) -> BoxFuture<'_, BridgeResult<()>> {
        self.record("downloadAndInstall");
        let result = self.download.lock().clone();
        let events = self.download_events.lock().clone();
        async move {
            for (channel, payload) in events {
                self.emit(channel, payload);
            }
            result
        }
        .boxed()
    }

    fn install_update(&self) -> BoxFuture<'_, BridgeResult<()>> {
        self.record("installUpdate");
        let result = self.install.lock().clone();
        async move { result }.boxed()
    }

    fn ignore_update(&self, version: String) -> BoxFuture<'_, BridgeResult<()>> {
        self.record(format!("ignoreUpdate:{version}"));
        let result = self.ignore.lock().clone();
        async move { result }.boxed()
    }

    fn on_update_available(&self, handler: EventHandler) -> Option<Unsubscribe> {
        self.subscribe(AVAILABLE, handler)
    }

    fn on_download_progress(&self, handler: EventHandler) -> Option<Unsubscribe> {
        self.subscribe(PROGRESS, handler)
    }

    fn on_update_downloaded(&self, handler: EventHandler) -> Option<Unsubscribe> {
        self.subscribe(DOWNLOADED, handler)
    }

    fn on_update_error(&self, handler: EventHandler) -> Option<Unsubscribe> {
        self.subscribe(ERROR, handler)
    }
}
