//! Bookkeeping for bridge event subscriptions.

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::bridge::Unsubscribe;

/// One live subscription.
pub(crate) struct Subscription {
    channel: &'static str,
    unsubscribe: Unsubscribe,
}

/// Subscriptions held between `init_listeners` and `cleanup`.
///
/// `registered` is claimed before subscribing so concurrent callers cannot
/// both subscribe; it is only released by `release`. Every release bumps
/// `generation`, so a registration that was released while it was still
/// subscribing can tell its claim is gone.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    registered: bool,
    generation: u64,
    subscriptions: Vec<Subscription>,
}

impl ListenerRegistry {
    /// Claims the one-time registration, returning the generation it
    /// belongs to. Returns `None` if already claimed.
    pub(crate) fn claim(&mut self) -> Option<u64> {
        if std::mem::replace(&mut self.registered, true) {
            return None;
        }
        Some(self.generation)
    }

    /// Stores subscriptions made under `generation`.
    ///
    /// If the registry was released since that claim, nothing is stored and
    /// the subscriptions are handed back for detaching.
    pub(crate) fn commit(
        &mut self,
        generation: u64,
        subscriptions: Vec<Subscription>,
    ) -> Result<(), Vec<Subscription>> {
        if !self.registered || self.generation != generation {
            return Err(subscriptions);
        }
        self.subscriptions.extend(subscriptions);
        Ok(())
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registered
    }

    pub(crate) fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Empties the registry and resets the claim, handing back what was held.
    pub(crate) fn release(&mut self) -> Vec<Subscription> {
        self.registered = false;
        self.generation = self.generation.wrapping_add(1);
        std::mem::take(&mut self.subscriptions)
    }
}

impl Subscription {
    pub(crate) fn new(channel: &'static str, unsubscribe: Unsubscribe) -> Self {
        Self {
            channel,
            unsubscribe,
        }
    }
}

/// Runs every unsubscribe handle, in registration order.
///
/// A handle that errors or panics is logged and skipped so the rest still
/// run. Returns the number of handles that failed.
pub(crate) fn detach_all(subscriptions: Vec<Subscription>) -> usize {
    let mut failures = 0;
    for Subscription {
        channel,
        unsubscribe,
    } in subscriptions
    {
        match catch_unwind(AssertUnwindSafe(unsubscribe)) {
            Ok(Ok(())) => tracing::trace!(channel, "listener detached"),
            Ok(Err(err)) => {
                failures += 1;
                tracing::warn!(channel, "Failed to detach listener: {}", err);
            }
            Err(_) => {
                failures += 1;
                tracing::warn!(channel, "Listener detach panicked");
            }
        }
    }
    failures
}
