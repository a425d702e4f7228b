//! Diagnostic-context capability and its thread-local implementation.
//!
//! The `log` facade has no mapped diagnostic context of its own, so the bridge
//! provides one: a per-thread string map that log formatters read to attach
//! contextual fields. The bridge only ever talks to it through the
//! [`DiagnosticContext`] trait, which lets tests substitute a fake store instead
//! of touching real process-wide state.

use crate::domain::error::{BridgeError, Result};
use std::cell::RefCell;
use std::collections::BTreeMap;

thread_local! {
    static MDC: RefCell<BTreeMap<String, String>> = const { RefCell::new(BTreeMap::new()) };
}

/// Get/set/remove access to a diagnostic context.
///
/// Implementations decide where values live; the bridge assumes only that a
/// value written on a thread is visible to later reads on that same thread.
pub trait DiagnosticContext: Send + Sync {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written right now.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written right now.
    fn remove(&self, key: &str) -> Result<()>;
}

/// The per-thread diagnostic context backing the free functions in this module.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLocalMdc;

impl DiagnosticContext for ThreadLocalMdc {
    fn get(&self, key: &str) -> Option<String> {
        get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        with_map_mut(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        with_map_mut(|map| {
            map.remove(key);
        })
    }
}

fn with_map_mut(f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
    MDC.try_with(|cell| -> Result<()> {
        let mut map = cell
            .try_borrow_mut()
            .map_err(|e| BridgeError::DiagnosticContext(format!("context busy: {e}")))?;
        f(&mut *map);
        Ok(())
    })
    .map_err(|e| BridgeError::DiagnosticContext(format!("thread context destroyed: {e}")))?
}

/// Reads a value from the calling thread's diagnostic context.
#[must_use]
pub fn get(key: &str) -> Option<String> {
    MDC.try_with(|cell| cell.try_borrow().ok().and_then(|map| map.get(key).cloned()))
        .ok()
        .flatten()
}

/// Inserts a value into the calling thread's diagnostic context.
///
/// # Errors
///
/// Returns [`BridgeError::DiagnosticContext`] if the thread's storage is being
/// torn down or is already borrowed.
pub fn insert(key: &str, value: &str) -> Result<()> {
    ThreadLocalMdc.set(key, value)
}

/// Removes a value from the calling thread's diagnostic context.
///
/// # Errors
///
/// Returns [`BridgeError::DiagnosticContext`] if the thread's storage is being
/// torn down or is already borrowed.
pub fn remove(key: &str) -> Result<()> {
    ThreadLocalMdc.remove(key)
}

/// Copies the calling thread's whole diagnostic context.
///
/// Formatters use this to render every contextual field of a log line.
#[must_use]
pub fn snapshot() -> BTreeMap<String, String> {
    MDC.try_with(|cell| cell.try_borrow().map(|map| map.clone()).unwrap_or_default())
        .unwrap_or_default()
}

/// Clears the calling thread's diagnostic context.
pub fn clear() {
    let _ = with_map_mut(BTreeMap::clear);
}
