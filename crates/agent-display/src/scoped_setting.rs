//! Scoped acquisition of a platform setting, restored on every exit path.

/// A setting whose value can be read and written through some backend
/// (a platform settings table in the original source; here, anything that
/// can get/set a `String`).
pub trait SettingBackend {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// Remembers the value of `key` at construction time and writes it back
/// exactly once — on `restore()` or on drop — if a `set()` call actually
/// changed it.
pub struct ScopedSetting<'a, B: SettingBackend> {
    backend: &'a B,
    key: String,
    saved_value: Option<String>,
    restore_required: bool,
}

impl<'a, B: SettingBackend> ScopedSetting<'a, B> {
    #[must_use]
    pub fn new(backend: &'a B, key: impl Into<String>) -> Self {
        let key = key.into();
        let saved_value = backend.get(&key);
        Self {
            backend,
            key,
            saved_value,
            restore_required: false,
        }
    }

    /// Applies a new value, marking a restore as owed unless it happens to
    /// match the value we already saved.
    pub fn set(&mut self, value: &str) {
        self.backend.set(&self.key, value);
        self.restore_required = self.saved_value.as_deref() != Some(value);
    }

    /// Writes back the original value exactly once, if it differs from
    /// what's currently set. Safe to call multiple times.
    pub fn restore(&mut self) {
        if !self.restore_required {
            return;
        }
        match &self.saved_value {
            Some(v) => self.backend.set(&self.key, v),
            None => self.backend.set(&self.key, ""),
        }
        self.restore_required = false;
    }
}

impl<'a, B: SettingBackend> Drop for ScopedSetting<'a, B> {
    fn drop(&mut self) {
        self.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct MapBackend(RefCell<HashMap<String, String>>);

    impl SettingBackend for MapBackend {
        fn get(&self, key: &str) -> Option<String> {
            self.0.borrow().get(key).cloned()
        }
        fn set(&self, key: &str, value: &str) {
            self.0.borrow_mut().insert(key.to_string(), value.to_string());
        }
    }

    #[test]
    fn restores_original_value_on_drop() {
        let backend = MapBackend(RefCell::new(HashMap::from([(
            "rotation_lock".to_string(),
            "0".to_string(),
        )])));
        {
            let mut scoped = ScopedSetting::new(&backend, "rotation_lock");
            scoped.set("1");
            assert_eq!(backend.get("rotation_lock"), Some("1".to_string()));
        }
        assert_eq!(backend.get("rotation_lock"), Some("0".to_string()));
    }

    #[test]
    fn restore_is_idempotent_and_skips_when_unchanged() {
        let backend = MapBackend(RefCell::new(HashMap::from([(
            "k".to_string(),
            "v".to_string(),
        )])));
        let mut scoped = ScopedSetting::new(&backend, "k");
        scoped.set("v"); // same as saved value, no restore owed
        scoped.restore();
        scoped.restore();
        assert_eq!(backend.get("k"), Some("v".to_string()));
    }

    #[test]
    fn multiple_sets_restore_to_entry_value() {
        let backend = MapBackend(RefCell::new(HashMap::from([(
            "k".to_string(),
            "orig".to_string(),
        )])));
        let mut scoped = ScopedSetting::new(&backend, "k");
        scoped.set("a");
        scoped.set("b");
        scoped.set("c");
        drop(scoped);
        assert_eq!(backend.get("k"), Some("orig".to_string()));
    }
}
