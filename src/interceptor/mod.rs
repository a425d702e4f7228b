//! Call-site interception for the `log` facade.
//!
//! The bridge cannot rewrite the facade, so interception happens at the one
//! seam it controls: the installed logger. [`BridgeLogger`] wraps the
//! application's logger and routes each `log::Log` method through
//! [`Interceptor::intercept`], which runs the advice registered for that
//! call site around the original call.
//!
//! ```text
//! log::info!(..) ─▶ BridgeLogger::log ─▶ Interceptor::intercept(EMIT)
//!                                          ├─ firing on this thread? → original only
//!                                          ├─ decide: Enrich | SuppressDuplicate | PassThrough
//!                                          ├─ resolve context, sync diagnostic keys
//!                                          ├─ original (inner logger)
//!                                          ├─ capture → translate → emit
//!                                          └─ restore diagnostic keys
//! ```
//!
//! Nothing raised by the advice reaches the caller. Errors are counted in
//! [`Diagnostics`]; panics are caught and counted. A panic from the original
//! call itself propagates untouched.
//!
//! The emit timeout bounds the bridge's own time per call, counted from entry
//! into [`Interceptor::intercept`]. Time spent inside the original call does
//! not count against it.

pub mod advice;
pub mod capture;
pub mod logger;

pub use advice::{
    Advice, AdviceTable, CallSite, Decision, SiteState, EMIT, FLUSH, LOGGER_LOOKUP,
};
pub use capture::{capture_event, is_already_instrumented, SOURCE_KEY};
pub use logger::BridgeLogger;

use crate::config::BridgeConfig;
use crate::context::{self, TraceContext};
use crate::diagnostics::Diagnostics;
use crate::emit::{Emitter, TelemetryPipeline};
use crate::mdc::{DiagnosticContext, DiagnosticKeys, LegacyContextAdapter};
use crate::translate::{LegacyLogEvent, Translator};
use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static NEXT_INTERCEPTOR_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// (interceptor id, site) pairs currently firing on this thread.
    static FIRING: RefCell<Vec<(u64, CallSite)>> = const { RefCell::new(Vec::new()) };
}

/// What the interceptor needs to know about one call before running it.
#[derive(Debug, Clone, Copy)]
pub struct CallInfo<'a> {
    pub target: &'a str,
    pub already_instrumented: bool,
}

impl<'a> CallInfo<'a> {
    #[must_use]
    pub const fn new(target: &'a str) -> Self {
        Self {
            target,
            already_instrumented: false,
        }
    }

    #[must_use]
    pub const fn already_instrumented(mut self, yes: bool) -> Self {
        self.already_instrumented = yes;
        self
    }
}

/// Runs advice around intercepted calls for one installed module.
pub struct Interceptor {
    id: u64,
    table: AdviceTable,
    active: AtomicBool,
    config: BridgeConfig,
    adapter: LegacyContextAdapter,
    translator: Translator,
    emitter: Emitter,
    diagnostics: Arc<Diagnostics>,
}

impl Interceptor {
    /// Builds an unarmed interceptor with the standard advice table.
    ///
    /// `config` is expected to be validated already; the registrar does that.
    #[must_use]
    pub fn new(
        config: &BridgeConfig,
        mdc: Arc<dyn DiagnosticContext>,
        pipeline: Arc<dyn TelemetryPipeline>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        let keys = DiagnosticKeys::from_prefix(
            &config.diagnostic_context_key_prefix,
            config.xray_trace_key.clone(),
        );

        Self {
            id: NEXT_INTERCEPTOR_ID.fetch_add(1, Ordering::Relaxed),
            table: AdviceTable::standard(),
            active: AtomicBool::new(config.enabled),
            config: config.clone(),
            adapter: LegacyContextAdapter::new(mdc, keys, Arc::clone(&diagnostics)),
            translator: Translator::new(config.module_name.clone()),
            emitter: Emitter::new(pipeline, config.emit_timeout(), Arc::clone(&diagnostics)),
            diagnostics,
        }
    }

    /// Arms every call site. Returns `false` if already armed.
    pub fn arm(&self) -> bool {
        let armed = self.table.arm();
        if armed {
            tracing::debug!(
                source = %self.translator.source(),
                sites = self.table.sites().count(),
                "call sites armed"
            );
        }
        armed
    }

    /// Switches advice on or off. Returns the previous value.
    pub fn set_active(&self, active: bool) -> bool {
        self.active.swap(active, Ordering::AcqRel)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// State of `site` as seen from the current thread.
    #[must_use]
    pub fn state(&self, site: CallSite) -> SiteState {
        if is_firing(self.id, site) {
            SiteState::Firing
        } else if self.table.is_armed(site) {
            SiteState::Armed
        } else {
            SiteState::Unarmed
        }
    }

    /// Decision for one call, ignoring re-entrancy.
    #[must_use]
    pub fn decide(&self, site: CallSite, call: &CallInfo<'_>) -> Decision {
        if !self.is_active() || !self.table.is_armed(site) {
            Decision::PassThrough
        } else if !self.config.instruments(call.target) {
            Decision::PassThrough
        } else if call.already_instrumented {
            Decision::SuppressDuplicate
        } else {
            Decision::Enrich
        }
    }

    /// Runs `original` with this site's advice around it and returns its result.
    ///
    /// `event` is only invoked after `original` returns, and only when the
    /// call is being enriched; returning `None` skips emission for this call.
    pub fn intercept<R>(
        &self,
        site: CallSite,
        call: CallInfo<'_>,
        original: impl FnOnce() -> R,
        event: impl FnOnce() -> Option<LegacyLogEvent>,
    ) -> R {
        self.intercept_with(site, call, |_| original(), event)
    }

    /// Like [`Interceptor::intercept`], but tells `original` what the advice
    /// is doing with this call.
    ///
    /// `original` receives [`Decision::Enrich`] only when this call will be
    /// emitted, so it can mark what it forwards downstream.
    pub fn intercept_with<R>(
        &self,
        site: CallSite,
        call: CallInfo<'_>,
        original: impl FnOnce(Decision) -> R,
        event: impl FnOnce() -> Option<LegacyLogEvent>,
    ) -> R {
        let entered = Instant::now();
        let _firing = match FiringGuard::enter(self.id, site) {
            Entered::Yes(guard) => guard,
            Entered::Reentrant => {
                self.diagnostics.record_reentrancy_trip();
                return original(Decision::PassThrough);
            }
            // Thread-local storage is gone during thread teardown.
            Entered::Unavailable => return original(Decision::PassThrough),
        };

        let decision = self.decide(site, &call);
        match (decision, self.table.advice(site)) {
            (Decision::PassThrough, _) | (_, Advice::PassThrough) => original(Decision::PassThrough),
            (_, Advice::Observe) => {
                self.diagnostics.record_logger_lookup();
                original(Decision::PassThrough)
            }
            (decision, Advice::Enrich) => {
                let context = self
                    .isolate(site, || context::resolve(self.config.follow_tracing_spans))
                    .flatten();
                let scope = self.isolate(site, || self.adapter.sync_with(context.as_ref()));
                let before = entered.elapsed();

                let result = original(decision);
                let resumed = Instant::now();

                if decision == Decision::Enrich {
                    self.isolate(site, || self.emit(event, context, before, resumed));
                } else {
                    self.diagnostics.record_suppressed_duplicate();
                }

                self.isolate(site, move || drop(scope));
                result
            }
        }
    }

    /// `before` is the advice time spent ahead of the original call; `resumed`
    /// is when the original call returned.
    fn emit(
        &self,
        event: impl FnOnce() -> Option<LegacyLogEvent>,
        context: Option<TraceContext>,
        before: Duration,
        resumed: Instant,
    ) {
        let Some(event) = event() else {
            return;
        };

        match self.translator.translate_with(&event, context) {
            Ok(record) => {
                let spent = before + resumed.elapsed();
                self.emitter
                    .emit_within(record, self.emitter.timeout().saturating_sub(spent));
            }
            Err(e) => {
                self.diagnostics.record_translation_fault();
                tracing::debug!(logger = %event.logger_name, error = %e, "event dropped");
            }
        }
    }

    fn isolate<T>(&self, site: CallSite, f: impl FnOnce() -> T) -> Option<T> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Some(value),
            Err(payload) => {
                self.diagnostics.record_emission_fault();
                tracing::warn!(
                    site = %site,
                    panic = %panic_message(payload.as_ref()),
                    "instrumentation panicked, call passed through"
                );
                None
            }
        }
    }

    /// Instrumentation source stamped on emitted records.
    #[must_use]
    pub fn source(&self) -> &str {
        self.translator.source()
    }

    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    #[must_use]
    pub const fn keys(&self) -> &DiagnosticKeys {
        self.adapter.keys()
    }

    #[must_use]
    pub const fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("id", &self.id)
            .field("source", &self.translator.source())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn is_firing(id: u64, site: CallSite) -> bool {
    FIRING
        .try_with(|firing| firing.borrow().contains(&(id, site)))
        .unwrap_or(false)
}

enum Entered {
    Yes(FiringGuard),
    Reentrant,
    Unavailable,
}

/// Marks (interceptor, site) as firing on this thread until dropped.
struct FiringGuard {
    key: (u64, CallSite),
}

impl FiringGuard {
    fn enter(id: u64, site: CallSite) -> Entered {
        let key = (id, site);
        FIRING
            .try_with(|firing| {
                let mut firing = firing.borrow_mut();
                if firing.contains(&key) {
                    Entered::Reentrant
                } else {
                    firing.push(key);
                    Entered::Yes(Self { key })
                }
            })
            .unwrap_or(Entered::Unavailable)
    }
}

impl Drop for FiringGuard {
    fn drop(&mut self) {
        let _ = FIRING.try_with(|firing| {
            let mut firing = firing.borrow_mut();
            if let Some(pos) = firing.iter().rposition(|k| *k == self.key) {
                firing.remove(pos);
            }
        });
    }
}
