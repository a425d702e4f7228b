//! Legacy context adapter: carrier → diagnostic context.
//!
//! Copies the active trace context's identifiers into diagnostic-context slots
//! under a fixed naming scheme derived from the configured prefix:
//!
//! | key                  | value                              |
//! |----------------------|------------------------------------|
//! | `{prefix}id`         | trace id, 32 lowercase hex chars   |
//! | `{prefix}span_id`    | span id, 16 lowercase hex chars    |
//! | `{prefix}sampled`    | `true` / `false`                   |
//! | X-Ray key (optional) | `1-xxxxxxxx-yyyy…@span`            |
//!
//! With the default prefix `trace_` the first key is `trace_id`.
//!
//! Writes are scoped: [`LegacyContextAdapter::sync_with`] returns a
//! [`SyncScope`] that puts back the prior values when dropped, so identifiers
//! never leak into later log statements outside the traced call.

use super::store::DiagnosticContext;
use crate::context::{carrier, TraceContext};
use crate::diagnostics::Diagnostics;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Diagnostic-context key names used by one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticKeys {
    pub trace_id: String,
    pub span_id: String,
    pub sampled: String,
    /// Optional key receiving the X-Ray rendering of the trace id.
    pub xray: Option<String>,
}

impl DiagnosticKeys {
    /// Derives key names from a prefix.
    ///
    /// # Example
    ///
    /// ```
    /// use log_trace_bridge::mdc::DiagnosticKeys;
    ///
    /// let keys = DiagnosticKeys::from_prefix("trace_", None);
    /// assert_eq!(keys.trace_id, "trace_id");
    /// assert_eq!(keys.span_id, "trace_span_id");
    /// ```
    #[must_use]
    pub fn from_prefix(prefix: &str, xray: Option<String>) -> Self {
        Self {
            trace_id: format!("{prefix}id"),
            span_id: format!("{prefix}span_id"),
            sampled: format!("{prefix}sampled"),
            xray,
        }
    }
}

/// Bridges the carrier into a [`DiagnosticContext`].
pub struct LegacyContextAdapter {
    mdc: Arc<dyn DiagnosticContext>,
    keys: DiagnosticKeys,
    diagnostics: Arc<Diagnostics>,
}

impl LegacyContextAdapter {
    #[must_use]
    pub fn new(
        mdc: Arc<dyn DiagnosticContext>,
        keys: DiagnosticKeys,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            mdc,
            keys,
            diagnostics,
        }
    }

    #[must_use]
    pub const fn keys(&self) -> &DiagnosticKeys {
        &self.keys
    }

    /// Syncs the carrier's current context into the diagnostic context.
    #[must_use = "dropping the scope immediately restores the previous values"]
    pub fn sync(&self) -> SyncScope {
        self.sync_with(carrier::current().as_ref())
    }

    /// Syncs an explicit context snapshot.
    ///
    /// With `Some(ctx)` the id keys are set; with `None` they are removed.
    /// Keys that already hold the wanted value are not touched, so syncing an
    /// unchanged context twice is indistinguishable from syncing it once.
    ///
    /// The X-Ray key is only written when it is empty. A present value means
    /// something upstream already correlated this thread, and that value wins.
    ///
    /// Never fails: a rejected read or write skips that key and increments
    /// `adapter_failures`.
    #[must_use = "dropping the scope immediately restores the previous values"]
    pub fn sync_with(&self, ctx: Option<&TraceContext>) -> SyncScope {
        let mut scope = SyncScope {
            mdc: Arc::clone(&self.mdc),
            diagnostics: Arc::clone(&self.diagnostics),
            restore: Vec::new(),
        };

        match ctx {
            Some(ctx) => {
                self.put(&mut scope, &self.keys.trace_id, Some(ctx.trace_id_hex()));
                self.put(&mut scope, &self.keys.span_id, Some(ctx.span_id_hex()));
                self.put(&mut scope, &self.keys.sampled, Some(ctx.is_sampled().to_string()));

                if let Some(xray_key) = &self.keys.xray {
                    if self.mdc.get(xray_key).is_none() {
                        self.put(&mut scope, xray_key, Some(ctx.xray_trace_id()));
                    }
                }
            }
            None => {
                self.put(&mut scope, &self.keys.trace_id, None);
                self.put(&mut scope, &self.keys.span_id, None);
                self.put(&mut scope, &self.keys.sampled, None);
            }
        }

        scope
    }

    fn put(&self, scope: &mut SyncScope, key: &str, value: Option<String>) {
        let prior = self.mdc.get(key);
        if prior == value {
            return;
        }

        let outcome = match &value {
            Some(v) => self.mdc.set(key, v),
            None => self.mdc.remove(key),
        };

        match outcome {
            Ok(()) => scope.restore.push((key.to_string(), prior)),
            Err(e) => {
                self.diagnostics.record_adapter_failure();
                tracing::debug!(key = %key, error = %e, "diagnostic context write skipped");
            }
        }
    }
}

impl std::fmt::Debug for LegacyContextAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyContextAdapter")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// Pending restoration of the keys a sync changed.
///
/// Dropping the scope restores prior values in reverse write order. Call
/// [`SyncScope::keep`] to make the writes permanent instead.
///
/// A store that errors or panics while restoring is counted in
/// `adapter_failures` and the remaining keys are still restored. The drop
/// itself never panics, so it is safe to run while the original call unwinds.
pub struct SyncScope {
    mdc: Arc<dyn DiagnosticContext>,
    diagnostics: Arc<Diagnostics>,
    restore: Vec<(String, Option<String>)>,
}

impl SyncScope {
    /// Number of keys this sync actually changed.
    #[must_use]
    pub fn changed(&self) -> usize {
        self.restore.len()
    }

    /// Leaves the synced values in place.
    pub fn keep(mut self) {
        self.restore.clear();
    }
}

impl Drop for SyncScope {
    fn drop(&mut self) {
        let mdc = &self.mdc;
        for (key, prior) in self.restore.drain(..).rev() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &prior {
                Some(v) => mdc.set(&key, v),
                None => mdc.remove(&key),
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.diagnostics.record_adapter_failure();
                    tracing::debug!(key = %key, error = %e, "diagnostic context restore skipped");
                }
                Err(_) => {
                    self.diagnostics.record_adapter_failure();
                    tracing::debug!(key = %key, "diagnostic context panicked during restore");
                }
            }
        }
    }
}

impl std::fmt::Debug for SyncScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScope")
            .field("changed", &self.restore.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::{BridgeError, Result};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store that counts writes and can be told to fail.
    #[derive(Default)]
    struct FakeMdc {
        values: Mutex<HashMap<String, String>>,
        writes: AtomicUsize,
        fail_writes: bool,
    }

    impl FakeMdc {
        fn failing() -> Self {
            Self {
                fail_writes: true,
                ..Self::default()
            }
        }
    }

    impl DiagnosticContext for FakeMdc {
        fn get(&self, key: &str) -> Option<String> {
            self.values.lock().unwrap().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if self.fail_writes {
                return Err(BridgeError::DiagnosticContext("read-only".to_string()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<()> {
            if self.fail_writes {
                return Err(BridgeError::DiagnosticContext("read-only".to_string()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.values.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn ctx() -> TraceContext {
        TraceContext::from_hex("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7", true)
            .unwrap()
    }

    fn adapter(mdc: Arc<FakeMdc>, xray: Option<&str>) -> (LegacyContextAdapter, Arc<Diagnostics>) {
        let diagnostics = Arc::new(Diagnostics::new());
        let adapter = LegacyContextAdapter::new(
            mdc,
            DiagnosticKeys::from_prefix("trace_", xray.map(String::from)),
            Arc::clone(&diagnostics),
        );
        (adapter, diagnostics)
    }

    #[test]
    fn test_sync_writes_ids_and_restores() {
        let mdc = Arc::new(FakeMdc::default());
        let (adapter, _) = adapter(Arc::clone(&mdc), None);

        {
            let scope = adapter.sync_with(Some(&ctx()));
            assert_eq!(scope.changed(), 3);
            assert_eq!(mdc.get("trace_id").as_deref(), Some("4bf92f3577b34da6a3ce929d0e0e4736"));
            assert_eq!(mdc.get("trace_span_id").as_deref(), Some("00f067aa0ba902b7"));
            assert_eq!(mdc.get("trace_sampled").as_deref(), Some("true"));
        }

        assert_eq!(mdc.get("trace_id"), None);
        assert_eq!(mdc.get("trace_span_id"), None);
    }

    #[test]
    fn test_sync_is_idempotent() {
        let mdc = Arc::new(FakeMdc::default());
        let (adapter, _) = adapter(Arc::clone(&mdc), None);

        adapter.sync_with(Some(&ctx())).keep();
        let writes = mdc.writes.load(Ordering::SeqCst);
        let before = mdc.values.lock().unwrap().clone();

        let second = adapter.sync_with(Some(&ctx()));
        assert_eq!(second.changed(), 0);
        assert_eq!(mdc.writes.load(Ordering::SeqCst), writes);
        drop(second);

        assert_eq!(*mdc.values.lock().unwrap(), before);
    }

    #[test]
    fn test_sync_without_context_removes_keys() {
        let mdc = Arc::new(FakeMdc::default());
        let (adapter, _) = adapter(Arc::clone(&mdc), None);
        adapter.sync_with(Some(&ctx())).keep();

        {
            let _scope = adapter.sync_with(None);
            assert_eq!(mdc.get("trace_id"), None);
        }
        // scope end puts the outer values back
        assert!(mdc.get("trace_id").is_some());
    }

    #[test]
    fn test_xray_key_written_only_when_empty() {
        let mdc = Arc::new(FakeMdc::default());
        let (adapter, _) = adapter(Arc::clone(&mdc), Some("AWS-XRAY-TRACE-ID"));

        {
            let _scope = adapter.sync_with(Some(&ctx()));
            assert_eq!(
                mdc.get("AWS-XRAY-TRACE-ID").as_deref(),
                Some("1-4bf92f35-77b34da6a3ce929d0e0e4736@00f067aa0ba902b7")
            );
        }
        assert_eq!(mdc.get("AWS-XRAY-TRACE-ID"), None);

        mdc.set("AWS-XRAY-TRACE-ID", "upstream").unwrap();
        {
            let _scope = adapter.sync_with(Some(&ctx()));
            assert_eq!(mdc.get("AWS-XRAY-TRACE-ID").as_deref(), Some("upstream"));
        }
    }

    #[test]
    fn test_failures_degrade_to_noop() {
        let mdc = Arc::new(FakeMdc::failing());
        let (adapter, diagnostics) = adapter(Arc::clone(&mdc), None);

        let scope = adapter.sync_with(Some(&ctx()));
        assert_eq!(scope.changed(), 0);
        assert_eq!(diagnostics.snapshot().adapter_failures, 3);
        assert_eq!(mdc.get("trace_id"), None);
    }

    /// Accepts writes but panics on every removal.
    #[derive(Default)]
    struct PanicOnRemove(FakeMdc);

    impl DiagnosticContext for PanicOnRemove {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.0.set(key, value)
        }

        fn remove(&self, _key: &str) -> Result<()> {
            panic!("store torn down")
        }
    }

    #[test]
    fn test_panicking_restore_is_counted_not_raised() {
        let mdc = Arc::new(PanicOnRemove::default());
        let diagnostics = Arc::new(Diagnostics::new());
        let adapter = LegacyContextAdapter::new(
            Arc::clone(&mdc) as Arc<dyn DiagnosticContext>,
            DiagnosticKeys::from_prefix("trace_", None),
            Arc::clone(&diagnostics),
        );

        let scope = adapter.sync_with(Some(&ctx()));
        assert_eq!(scope.changed(), 3);
        drop(scope);

        assert_eq!(diagnostics.snapshot().adapter_failures, 3);
    }

    #[test]
    fn test_sync_reads_carrier() {
        let mdc = Arc::new(FakeMdc::default());
        let (adapter, _) = adapter(Arc::clone(&mdc), None);

        let _guard = carrier::with_context(ctx());
        let _scope = adapter.sync();
        assert_eq!(mdc.get("trace_span_id").as_deref(), Some("00f067aa0ba902b7"));
    }
}
