//! Self-update lifecycle controller for desktop shells.
//!
//! This crate coordinates checking for a new release, downloading it,
//! tracking progress, arming the install, and handling the user's
//! "not now" / "skip this version" decisions. The actual update work is
//! done by a host-provided [`UpdateBridge`]; the controller only drives it
//! and keeps a single, observable [`UpdateState`].
//!
//! # Overview
//!
//! - The bridge may be absent, belong to another host, or implement only part
//!   of the update flow. Support is detected once, and an unsupported
//!   environment turns every operation into a silent no-op.
//! - Bridge events arrive as loosely shaped JSON and are normalized into
//!   [`UpdateEvent`]s, which are applied by the pure
//!   [`UpdateState::apply`] transition.
//! - No operation returns an error. Failures land in `error` or
//!   `last_check_message` on the state.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use app_updater::{ControllerConfig, UpdateBridge, UpdateController};
//!
//! async fn run(bridge: Option<Arc<dyn UpdateBridge>>) {
//!     let controller = UpdateController::new(ControllerConfig::default(), bridge);
//!     controller.init_listeners().await;
//!
//!     let mut updates = controller.subscribe();
//!     let outcome = controller.manual_check().await;
//!     println!("{}", controller.snapshot().last_check_message);
//!
//!     if outcome.has_update() {
//!         controller.start_update().await;
//!     }
//!
//!     while updates.changed().await.is_ok() {
//!         let state = updates.borrow_and_update().clone();
//!         if state.ready_to_install {
//!             controller.install_update().await;
//!             break;
//!         }
//!     }
//!
//!     controller.cleanup();
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod error;
pub mod progress;
pub mod release;
pub mod state;

// Bridge contract and event normalization
pub mod bridge;
pub mod payload;

// State machine
pub mod controller;
mod listeners;

// Re-export main types for convenience
pub use bridge::{
    BridgeCapabilities, CheckResponse, EventHandler, Support, Unsubscribe, UpdateBridge,
};
pub use config::{ControllerConfig, UpdateMessages};
pub use controller::{CheckOutcome, UpdateController};
pub use error::{BridgeError, BridgeResult, Result, UpdateError};
pub use payload::UpdateEvent;
pub use progress::{Progress, format_bytes, format_remaining, format_speed};
pub use release::UpdateInfo;
pub use state::{UpdatePhase, UpdateState};

/// Current version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
