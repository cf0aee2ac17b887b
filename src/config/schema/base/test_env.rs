use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Serializes tests that touch process environment and restores every
/// variable it changed when dropped.
pub(super) struct EnvScope {
    saved: Vec<(&'static str, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvScope {
    /// Acquire the env lock and clear `keys` so ambient values cannot leak in.
    pub(super) fn clean(keys: &[&'static str]) -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut scope = Self {
            saved: Vec::new(),
            _lock: lock,
        };
        for key in keys {
            scope.remember(key);
            // SAFETY: ENV_LOCK is held for the lifetime of the scope.
            unsafe {
                std::env::remove_var(key);
            }
        }
        scope
    }

    pub(super) fn set(&mut self, key: &'static str, value: &str) {
        self.remember(key);
        // SAFETY: ENV_LOCK is held for the lifetime of the scope.
        unsafe {
            std::env::set_var(key, value);
        }
    }

    fn remember(&mut self, key: &'static str) {
        if !self.saved.iter().any(|(saved, _)| *saved == key) {
            self.saved.push((key, std::env::var(key).ok()));
        }
    }
}

impl Drop for EnvScope {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..) {
            // SAFETY: still holding ENV_LOCK; the guard field drops after this.
            unsafe {
                match previous {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}
