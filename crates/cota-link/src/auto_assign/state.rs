//! Latest receiver visibility and slot assignments reported by the device.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Point-in-time copy of [`LiveState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSnapshot {
    /// Receiver ids seen by the last receiver list query.
    pub visible: Vec<String>,
    /// Slot number to receiver id, from the last slot list query.
    pub assigned: BTreeMap<u32, String>,
}

/// Device state shared between the dispatcher, which writes it after list
/// queries, and the auto-assign worker, which reads it once per cycle.
///
/// The two fields are updated by separate queries, so a reader may see a
/// visibility list and a slot map taken at different times.
#[derive(Debug, Clone, Default)]
pub struct LiveState {
    inner: Arc<RwLock<LiveSnapshot>>,
}

impl LiveState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the visible receiver list.
    pub fn set_visible(&self, visible: Vec<String>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .visible = visible;
    }

    /// Replaces the slot assignment map.
    pub fn set_assigned(&self, assigned: BTreeMap<u32, String>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .assigned = assigned;
    }

    /// Forgets everything, as after a disconnect.
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = LiveSnapshot::default();
    }

    /// Copies the current state.
    #[must_use]
    pub fn snapshot(&self) -> LiveSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_updates() {
        let state = LiveState::new();
        let reader = state.clone();
        state.set_visible(vec!["0x01".to_owned()]);
        state.set_assigned(BTreeMap::from([(2, "0x01".to_owned())]));

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.visible, ["0x01"]);
        assert_eq!(snapshot.assigned.get(&2).map(String::as_str), Some("0x01"));

        reader.clear();
        assert_eq!(state.snapshot(), LiveSnapshot::default());
    }
}
