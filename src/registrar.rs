//! Process-wide bootstrap.
//!
//! A [`Registrar`] installs one module's interceptor exactly once. Install
//! takes a mutex; afterwards [`Registrar::is_installed`] and
//! [`Registrar::is_active`] are plain atomic loads. Once installed, a module
//! stays installed for the life of the process.
//!
//! Co-resident modules are detected through a [`ClaimTable`]: each module
//! claims its diagnostic-context key prefix at install. Claims are held by
//! registrar identity, not by module name, so two modules configured with the
//! same name still conflict. A module whose prefix is already claimed installs
//! in a conflicted state where every call passes straight through, and it
//! records the holder's module name.

use crate::config::BridgeConfig;
use crate::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use crate::domain::error::{BridgeError, Result};
use crate::emit::TelemetryPipeline;
use crate::interceptor::{BridgeLogger, Interceptor};
use crate::mdc::{DiagnosticContext, ThreadLocalMdc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Snapshot of one module's install state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleState {
    pub installed: bool,
    pub active: bool,
    pub module_name: String,
    /// Modules found holding this module's key prefix at install.
    pub conflicting_modules: BTreeSet<String>,
    /// Configuration faults reported at install (defaults were applied).
    pub config_faults: Vec<String>,
}

impl ModuleState {
    #[must_use]
    pub fn is_conflicted(&self) -> bool {
        !self.conflicting_modules.is_empty()
    }
}

static NEXT_REGISTRAR_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
struct Claim {
    holder: u64,
    module_name: String,
}

/// Ownership markers for diagnostic-context key prefixes.
#[derive(Debug, Default)]
pub struct ClaimTable {
    owners: Mutex<HashMap<String, Claim>>,
}

impl ClaimTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The table shared by every registrar in the process that was not given
    /// its own.
    #[must_use]
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<ClaimTable>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Claims `prefix` for the holder `holder`, displayed as `module_name`.
    ///
    /// Re-claiming by the same holder succeeds. Holders are compared by id
    /// only; sharing a module name does not share a claim.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Conflict`] naming the current holder's module if
    /// another holder has the prefix.
    pub fn claim(&self, prefix: &str, holder: u64, module_name: &str) -> Result<()> {
        let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        match owners.get(prefix) {
            Some(claim) if claim.holder != holder => Err(BridgeError::Conflict {
                prefix: prefix.to_string(),
                owner: claim.module_name.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                owners.insert(
                    prefix.to_string(),
                    Claim {
                        holder,
                        module_name: module_name.to_string(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Module name of whoever holds `prefix`.
    #[must_use]
    pub fn owner(&self, prefix: &str) -> Option<String> {
        self.owners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(prefix)
            .map(|claim| claim.module_name.clone())
    }
}

struct Installation {
    interceptor: Arc<Interceptor>,
    module_name: String,
    conflicting_modules: BTreeSet<String>,
    config_faults: Vec<String>,
}

/// Installs and controls one instrumentation module.
pub struct Registrar {
    id: u64,
    pipeline: Arc<dyn TelemetryPipeline>,
    mdc: Arc<dyn DiagnosticContext>,
    claims: Arc<ClaimTable>,
    diagnostics: Arc<Diagnostics>,
    install_lock: Mutex<()>,
    installed: AtomicBool,
    installation: OnceLock<Installation>,
}

impl Registrar {
    /// Registrar emitting to `pipeline`, using the thread-local diagnostic
    /// context and the process-wide claim table.
    #[must_use]
    pub fn new(pipeline: Arc<dyn TelemetryPipeline>) -> Self {
        Self {
            id: NEXT_REGISTRAR_ID.fetch_add(1, Ordering::Relaxed),
            pipeline,
            mdc: Arc::new(ThreadLocalMdc),
            claims: ClaimTable::global(),
            diagnostics: Arc::new(Diagnostics::new()),
            install_lock: Mutex::new(()),
            installed: AtomicBool::new(false),
            installation: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn with_claims(mut self, claims: Arc<ClaimTable>) -> Self {
        self.claims = claims;
        self
    }

    #[must_use]
    pub fn with_diagnostic_context(mut self, mdc: Arc<dyn DiagnosticContext>) -> Self {
        self.mdc = mdc;
        self
    }

    /// Installs the module. Later calls return the current state unchanged.
    ///
    /// Install never fails. Bad configuration values are reported once via
    /// `tracing`, counted, and replaced by defaults. A prefix conflict leaves
    /// the module installed but permanently inactive.
    pub fn install(&self, config: &BridgeConfig) -> ModuleState {
        if self.is_installed() {
            return self.state();
        }

        let _lock = self.install_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_installed() {
            return self.state();
        }

        let (config, faults) = config.validate();
        for fault in &faults {
            self.diagnostics.record_config_fault();
            tracing::warn!(module = %config.module_name, error = %fault, "configuration value replaced by default");
        }

        let interceptor = Arc::new(Interceptor::new(
            &config,
            Arc::clone(&self.mdc),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.diagnostics),
        ));

        let mut conflicting_modules = BTreeSet::new();
        if let Err(fault) = self
            .claims
            .claim(&config.diagnostic_context_key_prefix, self.id, &config.module_name)
        {
            self.diagnostics.record_conflict();
            tracing::warn!(module = %config.module_name, error = %fault, "instrumentation disabled");
            if let BridgeError::Conflict { owner, .. } = fault {
                conflicting_modules.insert(owner);
            }
            interceptor.set_active(false);
        }

        interceptor.arm();

        let installation = Installation {
            interceptor,
            module_name: config.module_name.clone(),
            conflicting_modules,
            config_faults: faults.iter().map(ToString::to_string).collect(),
        };
        // Only ever set here, under the install lock.
        let _ = self.installation.set(installation);
        self.installed.store(true, Ordering::Release);

        let state = self.state();
        tracing::info!(
            module = %state.module_name,
            active = state.active,
            conflicted = state.is_conflicted(),
            "log trace bridge installed"
        );
        state
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.installation
            .get()
            .is_some_and(|inst| inst.interceptor.is_active())
    }

    /// Current state. Before install this is the default (all false, empty).
    #[must_use]
    pub fn state(&self) -> ModuleState {
        self.installation.get().map_or_else(ModuleState::default, |inst| ModuleState {
            installed: true,
            active: inst.interceptor.is_active(),
            module_name: inst.module_name.clone(),
            conflicting_modules: inst.conflicting_modules.clone(),
            config_faults: inst.config_faults.clone(),
        })
    }

    /// Turns instrumentation on or off at runtime. Returns whether the module
    /// is now active.
    ///
    /// Has no effect before install or on a conflicted module.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        match self.installation.get() {
            Some(inst) if inst.conflicting_modules.is_empty() => {
                if inst.interceptor.set_active(enabled) != enabled {
                    tracing::info!(module = %inst.module_name, enabled, "instrumentation toggled");
                }
                enabled
            }
            Some(inst) => {
                tracing::debug!(module = %inst.module_name, "conflicted module stays disabled");
                false
            }
            None => false,
        }
    }

    #[must_use]
    pub fn interceptor(&self) -> Option<Arc<Interceptor>> {
        self.installation
            .get()
            .map(|inst| Arc::clone(&inst.interceptor))
    }

    /// Wraps `inner` with this module's interceptor. `None` before install.
    #[must_use]
    pub fn logger<L: log::Log>(&self, inner: L) -> Option<BridgeLogger<L>> {
        self.interceptor()
            .map(|interceptor| BridgeLogger::new(inner, interceptor))
    }

    #[must_use]
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// The process-wide registrar, once [`install_global`] has run.
    #[must_use]
    pub fn global() -> Option<&'static Self> {
        GLOBAL.get()
    }
}

impl std::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrar")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

static GLOBAL: OnceLock<Registrar> = OnceLock::new();
static GLOBAL_INSTALL: Mutex<()> = Mutex::new(());

/// Installs the bridge as the process's `log` logger, wrapping `inner`.
///
/// The first call creates the global [`Registrar`] around `pipeline`, installs
/// it, and hands `log` a [`BridgeLogger`] with `max_level` as the facade's
/// level filter. Later calls return the existing state; their `inner` and
/// `pipeline` are dropped unused.
///
/// # Errors
///
/// Returns [`BridgeError::LoggerInstall`] if some other logger was already set
/// on the `log` facade. The registrar is still installed in that case and can
/// be reached via [`Registrar::global`].
pub fn install_global(
    config: &BridgeConfig,
    inner: Box<dyn log::Log>,
    max_level: log::LevelFilter,
    pipeline: Arc<dyn TelemetryPipeline>,
) -> Result<ModuleState> {
    let _lock = GLOBAL_INSTALL.lock().unwrap_or_else(PoisonError::into_inner);

    let registrar = GLOBAL.get_or_init(|| Registrar::new(pipeline));
    if registrar.is_installed() {
        return Ok(registrar.state());
    }

    let state = registrar.install(config);
    if let Some(logger) = registrar.logger(inner) {
        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(max_level);
    }
    Ok(state)
}
