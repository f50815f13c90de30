//! Handler registration tables.
//!
//! Six independent tables, one per [`RouteFamily`]. Registration may happen
//! before serving or while requests are in flight; each insert, remove and
//! lookup is atomic for its key, so a dispatcher sees either the old handler
//! or the new one, never a torn entry.

use crate::domain::types::RouteFamily;
use crate::ports::outbound::Handler;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Shared handler reference
pub type SharedHandler = Arc<dyn Handler>;

/// Route table for all callback families
#[derive(Default)]
pub struct RouteTable {
    commands: DashMap<String, SharedHandler>,
    shortcuts: DashMap<String, SharedHandler>,
    block_actions: DashMap<String, SharedHandler>,
    view_submissions: DashMap<String, SharedHandler>,
    view_closes: DashMap<String, SharedHandler>,
    events: DashMap<String, SharedHandler>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, family: RouteFamily) -> &DashMap<String, SharedHandler> {
        match family {
            RouteFamily::Command => &self.commands,
            RouteFamily::Shortcut => &self.shortcuts,
            RouteFamily::BlockAction => &self.block_actions,
            RouteFamily::ViewSubmission => &self.view_submissions,
            RouteFamily::ViewClose => &self.view_closes,
            RouteFamily::Event => &self.events,
        }
    }

    /// Register `handler` under `key`, returning the handler it replaced.
    ///
    /// Last registration wins.
    pub fn register(
        &self,
        family: RouteFamily,
        key: impl Into<String>,
        handler: SharedHandler,
    ) -> Option<SharedHandler> {
        let key = key.into();
        debug!(%family, key = %key, "Registering handler");
        self.table(family).insert(key, handler)
    }

    /// Remove the handler under `key`, if any.
    pub fn unregister(&self, family: RouteFamily, key: &str) -> Option<SharedHandler> {
        debug!(%family, key, "Unregistering handler");
        self.table(family).remove(key).map(|(_, handler)| handler)
    }

    /// Handler registered under `key`.
    pub fn lookup(&self, family: RouteFamily, key: &str) -> Option<SharedHandler> {
        self.table(family)
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Number of handlers registered for `family`.
    pub fn len(&self, family: RouteFamily) -> usize {
        self.table(family).len()
    }

    pub fn is_empty(&self) -> bool {
        RouteFamily::ALL.iter().all(|family| self.table(*family).is_empty())
    }

    /// Registered keys for `family`, in no particular order.
    pub fn keys(&self, family: RouteFamily) -> Vec<String> {
        self.table(family)
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for family in RouteFamily::ALL {
            map.entry(&family, &self.keys(family));
        }
        map.finish()
    }
}
