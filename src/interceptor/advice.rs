//! Advice table over the legacy logging surface.
//!
//! Each intercepted method is a [`CallSite`] keyed by (class, method). The
//! table maps call sites to the [`Advice`] that runs around them and tracks
//! whether each site has been armed.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// An intercepted method of the legacy framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    pub class: &'static str,
    pub method: &'static str,
}

impl CallSite {
    #[must_use]
    pub const fn new(class: &'static str, method: &'static str) -> Self {
        Self { class, method }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.class, self.method)
    }
}

/// Logger retrieval by name: the facade asking whether a target is enabled.
pub const LOGGER_LOOKUP: CallSite = CallSite::new("log::Log", "enabled");

/// Log emission: the facade handing a record to the installed logger.
pub const EMIT: CallSite = CallSite::new("log::Log", "log");

/// Buffer flush.
pub const FLUSH: CallSite = CallSite::new("log::Log", "flush");

/// What runs around a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    /// Count the call, change nothing.
    Observe,
    /// Sync the diagnostic context around the call, then translate and emit.
    Enrich,
    /// Nothing runs.
    PassThrough,
}

/// Lifecycle of a call site.
///
/// `Unarmed → Armed` happens once, at install. `Firing` is per thread: a site
/// is firing on a thread while advice is running around a call on that thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    Unarmed,
    Armed,
    Firing,
}

/// Per-call outcome of the interceptor's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run the site's advice fully.
    Enrich,
    /// The record was already emitted upstream: sync context but do not emit again.
    SuppressDuplicate,
    /// Run only the original call.
    PassThrough,
}

#[derive(Debug)]
struct Entry {
    advice: Advice,
    armed: AtomicBool,
}

/// Call site → advice mapping.
#[derive(Debug)]
pub struct AdviceTable {
    entries: HashMap<CallSite, Entry>,
}

impl AdviceTable {
    /// Empty, unarmed table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The fixed advice set over `log::Log`.
    ///
    /// | site            | advice        |
    /// |-----------------|---------------|
    /// | `enabled`       | `Observe`     |
    /// | `log`           | `Enrich`      |
    /// | `flush`         | `PassThrough` |
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register(LOGGER_LOOKUP, Advice::Observe);
        table.register(EMIT, Advice::Enrich);
        table.register(FLUSH, Advice::PassThrough);
        table
    }

    /// Registers (or replaces) the advice for a site. New entries start unarmed.
    pub fn register(&mut self, site: CallSite, advice: Advice) {
        self.entries.insert(
            site,
            Entry {
                advice,
                armed: AtomicBool::new(false),
            },
        );
    }

    /// Advice for `site`; unregistered sites pass through.
    #[must_use]
    pub fn advice(&self, site: CallSite) -> Advice {
        self.entries
            .get(&site)
            .map_or(Advice::PassThrough, |entry| entry.advice)
    }

    /// Arms every registered site. Returns `false` if they were already armed.
    pub fn arm(&self) -> bool {
        let mut changed = false;
        for entry in self.entries.values() {
            changed |= !entry.armed.swap(true, Ordering::AcqRel);
        }
        changed
    }

    #[must_use]
    pub fn is_armed(&self, site: CallSite) -> bool {
        self.entries
            .get(&site)
            .is_some_and(|entry| entry.armed.load(Ordering::Acquire))
    }

    pub fn sites(&self) -> impl Iterator<Item = CallSite> + '_ {
        self.entries.keys().copied()
    }
}

impl Default for AdviceTable {
    fn default() -> Self {
        Self::standard()
    }
}
