//! Foldable/posture device-state accessor: the set of states a device
//! supports (e.g. closed, half-open, flat), the currently observed state,
//! and a peer-requested override with cancel-on-base-change semantics.

use agent_display::ConcurrentList;
use agent_wire::message::DeviceState;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(pub u64);

struct Inner {
    base_state: i32,
    override_state: Option<i32>,
}

pub struct DeviceStateManager {
    supported: Vec<DeviceState>,
    inner: Mutex<Inner>,
    listeners: ConcurrentList<ListenerId>,
    next_listener_id: Mutex<u64>,
}

impl DeviceStateManager {
    /// `supported` lists every state this device can report; `initial_base`
    /// is the observed (unfolded-hardware) state identifier.
    #[must_use]
    pub fn new(supported: Vec<DeviceState>, initial_base: i32) -> Self {
        Self {
            supported,
            inner: Mutex::new(Inner {
                base_state: initial_base,
                override_state: None,
            }),
            listeners: ConcurrentList::new(),
            next_listener_id: Mutex::new(0),
        }
    }

    #[must_use]
    pub fn get_supported_states(&self) -> &[DeviceState] {
        &self.supported
    }

    /// The identifier currently in effect: the active override if one was
    /// requested, otherwise the observed base state.
    #[must_use]
    pub fn get_state_identifier(&self) -> i32 {
        let inner = self.inner.lock();
        inner.override_state.unwrap_or(inner.base_state)
    }

    /// Requests an override. `state_id == -1` clears any active override
    /// and reverts to the base state. Returns the new effective identifier.
    pub fn request_state(&self, state_id: i32) -> i32 {
        let mut inner = self.inner.lock();
        if state_id < 0 {
            inner.override_state = None;
        } else {
            inner.override_state = Some(state_id);
        }
        inner.override_state.unwrap_or(inner.base_state)
    }

    /// Called when the hardware reports a new base state. If an override
    /// was active and the base state genuinely changed under it, the
    /// override is cancelled — a posture change makes a prior override
    /// request stale. Returns the new effective identifier and whether it
    /// changed.
    pub fn notify_base_state_changed(&self, new_base: i32) -> (i32, bool) {
        let mut inner = self.inner.lock();
        let previous_effective = inner.override_state.unwrap_or(inner.base_state);
        let base_changed = inner.base_state != new_base;
        inner.base_state = new_base;
        if base_changed && inner.override_state.is_some() {
            inner.override_state = None;
        }
        let effective = inner.override_state.unwrap_or(inner.base_state);
        (effective, effective != previous_effective)
    }

    pub fn add_listener(&self) -> ListenerId {
        let mut next = self.next_listener_id.lock();
        let id = ListenerId(*next);
        *next += 1;
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states() -> Vec<DeviceState> {
        vec![
            DeviceState {
                identifier: 0,
                name: "CLOSED".into(),
                system_properties: 0,
                physical_properties: 0,
            },
            DeviceState {
                identifier: 1,
                name: "HALF_OPEN".into(),
                system_properties: 0,
                physical_properties: 0,
            },
            DeviceState {
                identifier: 2,
                name: "OPEN".into(),
                system_properties: 0,
                physical_properties: 0,
            },
        ]
    }

    #[test]
    fn override_takes_effect_until_cleared() {
        let mgr = DeviceStateManager::new(states(), 0);
        assert_eq!(mgr.get_state_identifier(), 0);
        assert_eq!(mgr.request_state(2), 2);
        assert_eq!(mgr.get_state_identifier(), 2);
        assert_eq!(mgr.request_state(-1), 0);
        assert_eq!(mgr.get_state_identifier(), 0);
    }

    #[test]
    fn base_state_change_cancels_active_override() {
        let mgr = DeviceStateManager::new(states(), 0);
        mgr.request_state(2);
        let (effective, changed) = mgr.notify_base_state_changed(1);
        assert_eq!(effective, 1);
        assert!(changed);
        assert_eq!(mgr.get_state_identifier(), 1);
    }

    #[test]
    fn base_state_change_without_override_reports_no_change_when_same() {
        let mgr = DeviceStateManager::new(states(), 0);
        let (effective, changed) = mgr.notify_base_state_changed(0);
        assert_eq!(effective, 0);
        assert!(!changed);
    }
}
