//! Clipboard accessor: a thin, lazily-initialized wrapper around the host
//! clipboard, gating a poll-driven change notification the same way the
//! window/display accessors gate their platform callbacks.
//!
//! The real platform clipboard listener is an external collaborator this
//! agent only describes the contract of (§1); here that contract is
//! satisfied by polling [`arboard`] on the controller's 250 ms tick and
//! comparing against the last-seen value, which is indistinguishable from a
//! push notification at that granularity.

use agent_display::ConcurrentList;
use parking_lot::Mutex;

/// Registration token for a clipboard-change listener; see
/// [`agent_display::ConcurrentList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(pub u64);

pub struct ClipboardManager {
    clipboard: Mutex<Option<arboard::Clipboard>>,
    listeners: ConcurrentList<ListenerId>,
    last_seen: Mutex<Option<String>>,
    next_listener_id: Mutex<u64>,
}

impl Default for ClipboardManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            clipboard: Mutex::new(None),
            listeners: ConcurrentList::new(),
            last_seen: Mutex::new(None),
            next_listener_id: Mutex::new(0),
        }
    }

    fn with_clipboard<T>(&self, f: impl FnOnce(&mut arboard::Clipboard) -> Result<T, arboard::Error>) -> Option<T> {
        let mut guard = self.clipboard.lock();
        if guard.is_none() {
            *guard = arboard::Clipboard::new().ok();
        }
        let cb = guard.as_mut()?;
        f(cb).ok()
    }

    #[must_use]
    pub fn get_text(&self) -> Option<String> {
        self.with_clipboard(arboard::Clipboard::get_text)
    }

    pub fn set_text(&self, text: &str) {
        let text = text.to_string();
        self.with_clipboard(move |cb| cb.set_text(text.clone()));
        *self.last_seen.lock() = Some(text);
    }

    /// Registers a change listener, enabling the underlying poll baseline
    /// on the 0→1 transition (so the first registration doesn't
    /// immediately report a spurious "change" from an unobserved past
    /// clipboard state).
    pub fn add_listener(&self) -> ListenerId {
        let mut next = self.next_listener_id.lock();
        let id = ListenerId(*next);
        *next += 1;
        drop(next);

        let count_before = self.listeners.len();
        self.listeners.add(id);
        if count_before == 0 {
            *self.last_seen.lock() = self.get_text();
        }
        id
    }

    /// Unregisters a listener, clearing cached state on the 1→0
    /// transition.
    pub fn remove_listener(&self, id: ListenerId) {
        if self.listeners.remove(&id) == 0 {
            *self.last_seen.lock() = None;
        }
    }

    #[must_use]
    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Polls the host clipboard and returns the new text if it changed
    /// since the last poll (or since listener registration). Returns
    /// `None` when nothing changed or no listener is registered.
    pub fn poll_changed(&self) -> Option<String> {
        if !self.has_listeners() {
            return None;
        }
        let current = self.get_text()?;
        let mut last = self.last_seen.lock();
        if last.as_deref() == Some(current.as_str()) {
            return None;
        }
        *last = Some(current.clone());
        Some(current)
    }
}

/// Whether `text` fits the peer's sync policy: both a UTF-8 byte budget and
/// a Unicode code-point count must be respected (per the clipboard-sync
/// testable scenario — a value can be short in bytes yet long in code
/// points, or vice versa for multi-byte scripts).
#[must_use]
pub fn within_sync_limit(text: &str, max_length: i32) -> bool {
    if max_length < 0 {
        return true;
    }
    let max = max_length as usize;
    text.len() <= max && text.chars().count() <= max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_limit_checks_both_bytes_and_code_points() {
        assert!(within_sync_limit("hello", 256));
        assert!(!within_sync_limit(&"x".repeat(2000), 256));
        // Multi-byte but few code points should still pass a byte-generous
        // budget that's tight on code points only if the code point count
        // itself exceeds the limit.
        assert!(within_sync_limit("日本語", 10));
    }

    #[test]
    fn listener_transitions_track_count() {
        let mgr = ClipboardManager::new();
        assert!(!mgr.has_listeners());
        let id = mgr.add_listener();
        assert!(mgr.has_listeners());
        mgr.remove_listener(id);
        assert!(!mgr.has_listeners());
    }

    #[test]
    fn poll_without_listeners_returns_none() {
        let mgr = ClipboardManager::new();
        assert_eq!(mgr.poll_changed(), None);
    }
}
