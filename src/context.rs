//! The process-wide profiler context.
//!
//! The runtime calls the hooks without any user data, so the trampolines need one place to
//! find the runtime interface, configuration and sink. [`ProfilerContext::attach`] builds that
//! context exactly once, stores it in a single-assignment cell and only then registers the
//! hooks, so no hook can ever observe a partially initialised context. After attach the context
//! is read-only apart from the shutdown flag and the lock-free diagnostics.
//!
//! Contexts can also be created standalone with [`ProfilerContext::new`]; such a context is not
//! reachable from the trampolines but drives the same handlers through
//! [`ProfilerContext::dispatch`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use eltscope::{
//!     config::ProfilerConfig,
//!     context::ProfilerContext,
//!     events::TraceWriter,
//!     runtime::ProfilerInfo,
//! };
//!
//! fn on_initialize(info: Arc<dyn ProfilerInfo>) -> eltscope::Result<()> {
//!     let config = ProfilerConfig::from_env()?;
//!     let context = ProfilerContext::attach(info, config, Arc::new(TraceWriter::stdout()))?;
//!     if !context.registration().is_some_and(|r| r.is_complete()) {
//!         log::warn!("tracing with reduced capability");
//!     }
//!     Ok(())
//! }
//! ```

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
};

use crate::{
    config::ProfilerConfig,
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
    events::{EventHandlers, EventKind, EventSink},
    logging,
    runtime::{EltInfo, FunctionIdOrClientId, HResult, ProfilerInfo, IID_ICOR_PROFILER_INFO8},
    trampoline::{CallFrameAdapter, NativeAdapter},
    Error, Result,
};

static CONTEXT: OnceLock<ProfilerContext> = OnceLock::new();

/// Outcome of the two registration calls made during attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// Status of `SetEventMask`
    pub event_mask: HResult,
    /// Status of `SetEnterLeaveFunctionHooks3WithInfo`, `None` if no hooks exist for the target
    pub hooks: Option<HResult>,
}

impl Registration {
    /// Returns true if both calls succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.event_mask.is_success() && self.hooks.is_some_and(HResult::is_success)
    }
}

/// Everything the event handlers need, shared by all threads.
pub struct ProfilerContext {
    info: Arc<dyn ProfilerInfo>,
    config: ProfilerConfig,
    sink: Arc<dyn EventSink>,
    diagnostics: Diagnostics,
    registration: OnceLock<Registration>,
    shut_down: AtomicBool,
}

impl ProfilerContext {
    /// Creates a context that is not installed process-wide.
    #[must_use]
    pub fn new(
        info: Arc<dyn ProfilerInfo>,
        config: ProfilerConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let diagnostics = Diagnostics::with_capacity(config.max_diagnostics);
        ProfilerContext {
            info,
            config,
            sink,
            diagnostics,
            registration: OnceLock::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Installs the process-wide context and registers the native hooks.
    ///
    /// Registration failures do not fail attach. They are logged, recorded as
    /// [`DiagnosticCategory::Registration`] errors and visible through
    /// [`ProfilerContext::registration`]; tracing continues with whatever the runtime accepted.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `config` does not validate
    /// - [`Error::AlreadyAttached`] if a context was installed before
    pub fn attach(
        info: Arc<dyn ProfilerInfo>,
        config: ProfilerConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<&'static ProfilerContext> {
        config.validate()?;
        if config.init_logger {
            logging::init(&config);
        }
        log::debug!("attaching through ICorProfilerInfo8 {}", IID_ICOR_PROFILER_INFO8);

        CONTEXT
            .set(ProfilerContext::new(info, config, sink))
            .map_err(|_| Error::AlreadyAttached)?;
        let context = ProfilerContext::current().ok_or(Error::NotAttached)?;

        let registration = context.register(&NativeAdapter);
        log::info!(
            "profiler attached ({}), event mask {}, hooks {}",
            NativeAdapter.name(),
            registration.event_mask,
            registration
                .hooks
                .map_or_else(|| "unavailable".to_string(), |hr| hr.to_string())
        );
        Ok(context)
    }

    /// The process-wide context, if attached.
    #[must_use]
    pub fn current() -> Option<&'static ProfilerContext> {
        CONTEXT.get()
    }

    /// Requests the configured event categories and installs the hooks `adapter` provides.
    ///
    /// Only the first call on a context is recorded; later calls return the first outcome
    /// without contacting the runtime again.
    pub fn register(&self, adapter: &dyn CallFrameAdapter) -> Registration {
        *self.registration.get_or_init(|| {
            let event_mask = self.info.set_event_mask(self.config.event_mask);
            if event_mask.is_failure() {
                self.registration_failure(
                    format!("SetEventMask({:#x}) failed", self.config.event_mask.bits()),
                    Some(event_mask),
                );
            }

            let hooks = if !self.config.event_mask.wants_hooks() {
                log::debug!("event mask does not request enter/leave hooks, none installed");
                None
            } else if let Some(hooks) = adapter.hooks() {
                let status = self.info.set_enter_leave_function_hooks3_with_info(hooks);
                if status.is_failure() {
                    self.registration_failure(
                        "SetEnterLeaveFunctionHooks3WithInfo failed".to_string(),
                        Some(status),
                    );
                }
                Some(status)
            } else {
                self.registration_failure(Error::UnsupportedArchitecture.to_string(), None);
                None
            };

            Registration { event_mask, hooks }
        })
    }

    fn registration_failure(&self, message: String, hresult: Option<HResult>) {
        let mut diagnostic = Diagnostic::new(
            DiagnosticSeverity::Error,
            DiagnosticCategory::Registration,
            message,
        );
        if let Some(hresult) = hresult {
            diagnostic = diagnostic.with_hresult(hresult);
        }
        self.diagnostics.push(diagnostic);
    }

    /// Handles one event, unless the context was shut down.
    ///
    /// A panic inside the handlers is caught and recorded as a
    /// [`DiagnosticCategory::Dispatch`] error; it never propagates to the caller.
    pub fn dispatch(&self, kind: EventKind, id: FunctionIdOrClientId, elt: EltInfo) {
        if self.is_shut_down() {
            return;
        }

        let handlers = self.handlers();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match kind {
            EventKind::Enter => handlers.enter(id, elt),
            EventKind::Leave => handlers.leave(id, elt),
            EventKind::Tailcall => handlers.tailcall(id, elt),
        }));

        if outcome.is_err() {
            self.diagnostics.error(
                DiagnosticCategory::Dispatch,
                format!("{kind} handler panicked for {:#x}", id.raw()),
            );
        }
    }

    /// The event handlers bound to this context.
    #[must_use]
    pub fn handlers(&self) -> EventHandlers<'_> {
        EventHandlers::new(
            self.info.as_ref(),
            &self.config,
            self.sink.as_ref(),
            &self.diagnostics,
        )
    }

    /// Stops event handling and flushes the sink.
    ///
    /// Hooks stay registered with the runtime but return immediately from now on. Repeated
    /// calls are no-ops.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sink.flush();
        log::info!(
            "profiler shut down, {} diagnostic(s), {} dropped",
            self.diagnostics.count(),
            self.diagnostics.dropped()
        );
    }

    /// Returns true once [`ProfilerContext::shutdown`] was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// The registration outcome, `None` before [`ProfilerContext::register`] ran.
    #[must_use]
    pub fn registration(&self) -> Option<Registration> {
        self.registration.get().copied()
    }

    /// The runtime interface.
    #[must_use]
    pub fn info(&self) -> &dyn ProfilerInfo {
        self.info.as_ref()
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Faults collected so far.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}
