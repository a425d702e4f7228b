//! Thread-scoped carrier for the current trace context.
//!
//! Each thread owns a stack of [`TraceContext`] values. [`with_context`] pushes a
//! value and returns a [`ContextGuard`]; releasing the guard (explicitly or by
//! drop, including during unwinding) restores whatever was current before. No
//! thread ever observes another thread's stack.
//!
//! Guards must be released in LIFO order. An out-of-order release is a
//! programming error: [`ContextGuard::release`] reports it as
//! [`BridgeError::ScopeOrder`], and the drop path counts it in
//! [`scope_violations`]. When the guard's own entry is still on the stack, the
//! stack is cut back to it so the prior value is restored. A stale guard, whose
//! entry an earlier out-of-order release already removed, leaves the stack
//! untouched: each entry carries a generation id, so a later scope that happens
//! to sit at the same depth is never mistaken for the guard's.

use super::trace_context::TraceContext;
use crate::domain::error::{BridgeError, Result};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

thread_local! {
    /// (generation, context) entries, innermost last.
    static CONTEXT_STACK: RefCell<Vec<(u64, TraceContext)>> = const { RefCell::new(Vec::new()) };
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);
static SCOPE_VIOLATIONS: AtomicU64 = AtomicU64::new(0);

/// Returns the calling thread's current trace context, if any.
#[must_use]
pub fn current() -> Option<TraceContext> {
    CONTEXT_STACK
        .try_with(|stack| stack.borrow().last().map(|(_, ctx)| ctx.clone()))
        .ok()
        .flatten()
}

/// Number of contexts currently pushed on the calling thread.
#[must_use]
pub fn depth() -> usize {
    CONTEXT_STACK
        .try_with(|stack| stack.borrow().len())
        .unwrap_or(0)
}

/// Total out-of-order releases observed on the drop path, across all threads.
#[must_use]
pub fn scope_violations() -> u64 {
    SCOPE_VIOLATIONS.load(Ordering::Relaxed)
}

/// Makes `ctx` current on the calling thread until the guard is released.
///
/// # Example
///
/// ```
/// use log_trace_bridge::context::{carrier, TraceContext};
///
/// let ctx = TraceContext::generate();
/// {
///     let _guard = carrier::with_context(ctx.clone());
///     assert_eq!(carrier::current(), Some(ctx));
/// }
/// assert_eq!(carrier::current(), None);
/// ```
#[must_use = "the context is popped as soon as the guard is dropped"]
pub fn with_context(ctx: TraceContext) -> ContextGuard {
    let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
    let depth = CONTEXT_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push((generation, ctx));
        stack.len()
    });

    ContextGuard {
        depth,
        generation,
        released: false,
        _not_send: PhantomData,
    }
}

/// Runs `f` with `ctx` as the current context, restoring the prior one afterwards.
pub fn in_context<T>(ctx: TraceContext, f: impl FnOnce() -> T) -> T {
    let _guard = with_context(ctx);
    f()
}

/// Scope handle returned by [`with_context`].
///
/// The guard is `!Send`: it restores state on the thread that created it.
#[derive(Debug)]
pub struct ContextGuard {
    /// Stack length right after this guard's push.
    depth: usize,
    /// Id of the stack entry this guard pushed.
    generation: u64,
    released: bool,
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    /// Stack depth this guard's context sits at (1 for the outermost scope).
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Releases the scope, restoring the prior context.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ScopeOrder`] if inner scopes on this thread are
    /// still open (the prior context is restored regardless, which also closes
    /// them), or if this guard's entry was already removed by an out-of-order
    /// release (the stack is left as it is).
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.unwind()
    }

    fn unwind(&self) -> Result<()> {
        let slot = self.depth.saturating_sub(1);
        let outcome = CONTEXT_STACK.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            let actual = stack.len();
            let owned = stack
                .get(slot)
                .is_some_and(|(generation, _)| *generation == self.generation);
            if owned {
                stack.truncate(slot);
            }
            (owned, actual)
        });

        match outcome {
            Ok((true, actual_depth)) if actual_depth == self.depth => Ok(()),
            Ok((_, actual_depth)) => Err(BridgeError::ScopeOrder {
                expected_depth: self.depth,
                actual_depth,
            }),
            // Thread-local storage is gone during thread teardown.
            Err(_) => Ok(()),
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Err(e) = self.unwind() {
            SCOPE_VIOLATIONS.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "trace context scope dropped out of order");
        }
    }
}
