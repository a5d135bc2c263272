//! PoolHooks: the feed/observer surface a caller implements to drive and
//! react to the Pool. A concrete implementation typically overrides
//! `next_address` and `on_synced` and leaves the rest at their no-op
//! defaults.

use async_trait::async_trait;

use crate::address::Address;
use crate::controller::ControllerHandle;

/// Feeds addresses to the Pool and observes Controller lifecycle events.
///
/// Only [`next_address`](PoolHooks::next_address) is required; the
/// lifecycle callbacks default to doing nothing, matching the lifecycles
/// most hook implementations don't care about.
#[async_trait]
pub trait PoolHooks: Send + Sync {
    /// Returns the next address to admit, or `None` if the feed is
    /// (currently) exhausted. Must not block the Pool's main loop; an
    /// implementation that cycles through a fixed list is the common case.
    async fn next_address(&self) -> Option<Address>;

    /// Key material to supply if `address` turns out to be uninitialised.
    /// Ignored for already-initialised wallets. Default: no keys, so an
    /// uninitialised wallet fed here fails fast at startup.
    async fn keys_for(&self, _address: &Address) -> (Option<String>, Option<String>) {
        (None, None)
    }

    async fn on_started(&self, _ctrl: &ControllerHandle) {}
    async fn on_synced(&self, _ctrl: &ControllerHandle) {}
    async fn on_closed(&self, _ctrl: &ControllerHandle) {}
    async fn on_failed(&self, _ctrl: &ControllerHandle) {}
}
