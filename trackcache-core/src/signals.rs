//! # Lifecycle signals
//!
//! Applications forward platform lifecycle notifications to the cache as
//! [`LifecycleEvent`]s. A [`SignalHub`] keeps a named subscription per memory
//! tier and lets each tier decide, through its auto-clear flags, whether the
//! event empties it.
//!
//! Subscriptions hold weak references: a tier dropped without unregistering
//! is skipped and pruned on the next broadcast.
//!
//! # Examples
//!
//! ```rust
//! use trackcache_core::{LifecycleEvent, MemoryConfig, MemoryTier, SignalHub};
//!
//! let hub = SignalHub::new();
//! let tier = MemoryTier::new(MemoryConfig::default());
//! tier.set("thumbnail", vec![0u8; 16], 16);
//!
//! hub.register("thumbnails", &tier);
//! assert_eq!(hub.broadcast(LifecycleEvent::MemoryPressure), 1);
//! assert_eq!(tier.total_count(), 0);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::memory_tier::MemoryTier;

/// Application lifecycle notifications a memory tier may react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The system is low on memory.
    MemoryPressure,
    /// The application moved to the background.
    EnteredBackground,
}

/// Returns `None` once the subscribed tier is gone, otherwise whether the
/// tier was cleared.
type Subscriber = Arc<dyn Fn(LifecycleEvent) -> Option<bool> + Send + Sync>;

/// Registry fanning lifecycle events out to memory tiers.
pub struct SignalHub {
    subscribers: RwLock<HashMap<String, Subscriber>>,
}

static GLOBAL_HUB: Lazy<SignalHub> = Lazy::new(SignalHub::new);

impl SignalHub {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Get the process-wide hub
    pub fn global() -> &'static SignalHub {
        &GLOBAL_HUB
    }

    /// Subscribes `tier` under `name`, replacing any previous subscription
    /// with that name. Returns `true` if one was replaced.
    pub fn register<V>(&self, name: &str, tier: &Arc<MemoryTier<V>>) -> bool
    where
        V: Clone + Send + 'static,
    {
        let weak = Arc::downgrade(tier);
        let subscriber: Subscriber = Arc::new(move |event: LifecycleEvent| {
            weak.upgrade().map(|tier| tier.handle_event(event))
        });
        self.subscribers
            .write()
            .insert(name.to_string(), subscriber)
            .is_some()
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.subscribers.write().remove(name).is_some()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.subscribers.read().contains_key(name)
    }

    /// Number of subscriptions, including ones whose tier is already gone.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every subscribed tier and returns how many of them
    /// cleared themselves.
    pub fn broadcast(&self, event: LifecycleEvent) -> usize {
        // Snapshot so tiers are not locked while the registry lock is held.
        let subscribers: Vec<(String, Subscriber)> = self
            .subscribers
            .read()
            .iter()
            .map(|(name, sub)| (name.clone(), Arc::clone(sub)))
            .collect();

        let mut cleared = 0;
        let mut dead = Vec::new();
        for (name, subscriber) in subscribers {
            match subscriber(event) {
                Some(true) => cleared += 1,
                Some(false) => {}
                None => dead.push(name),
            }
        }

        if !dead.is_empty() {
            let mut map = self.subscribers.write();
            for name in &dead {
                map.remove(name);
            }
        }

        debug!(?event, cleared, pruned = dead.len(), "broadcast lifecycle event");
        cleared
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}
