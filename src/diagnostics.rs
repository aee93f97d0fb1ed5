//! Diagnostics collection for non-fatal tracing faults.
//!
//! Nothing that goes wrong inside an event handler is allowed to reach the execution engine.
//! Failed runtime queries, argument descriptors whose ranges do not add up, resolver limits and
//! registration failures are instead reported here and logged through the `log` facade, while
//! the event itself degrades to a partial record.
//!
//! The [`Diagnostics`] container uses `boxcar::Vec` for thread-safe, lock-free append
//! operations, so any number of managed threads can report faults from inside their hooks
//! without contending on a lock.
//!
//! # Key Components
//!
//! - [`Diagnostics`] - Thread-safe container for diagnostic entries
//! - [`Diagnostic`] - Individual diagnostic entry with severity and context
//! - [`DiagnosticSeverity`] - Severity level (Info, Warning, Error)
//! - [`DiagnosticCategory`] - Which part of the tracer reported the entry
//!
//! # Usage Examples
//!
//! ```rust
//! use eltscope::diagnostics::{Diagnostics, DiagnosticCategory};
//!
//! let diagnostics = Diagnostics::new();
//! diagnostics.warning(
//!     DiagnosticCategory::Consistency,
//!     "argument ranges sum to 12 bytes, descriptor reports 16",
//! );
//!
//! assert_eq!(diagnostics.by_category(DiagnosticCategory::Consistency).len(), 1);
//! ```
//!
//! # Bounded Growth
//!
//! A traced process can run for a long time. Once the configured capacity is reached new
//! entries are still logged but only counted, see [`Diagnostics::dropped`].

use std::{
    fmt::{self, Write},
    sync::atomic::{AtomicUsize, Ordering},
};

use strum::Display;

use crate::runtime::{FunctionId, HResult};

/// Severity level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    /// Informational message, not indicating a problem.
    Info,

    /// A fault that degraded a single event record.
    Warning,

    /// A fault that reduced the tracer's capability, such as a failed registration.
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Info => write!(f, "INFO"),
            DiagnosticSeverity::Warning => write!(f, "WARN"),
            DiagnosticSeverity::Error => write!(f, "ERROR"),
        }
    }
}

impl DiagnosticSeverity {
    fn level(self) -> log::Level {
        match self {
            DiagnosticSeverity::Info => log::Level::Info,
            DiagnosticSeverity::Warning => log::Level::Warn,
            DiagnosticSeverity::Error => log::Level::Error,
        }
    }
}

/// Category indicating the source of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DiagnosticCategory {
    /// The argument descriptor could not be acquired; the event was dropped or degraded.
    Arguments,

    /// The argument descriptor was acquired but its ranges do not add up to its total size.
    Consistency,

    /// A class, module or method name could not be resolved.
    Resolution,

    /// Event mask or hook registration failed during attach.
    Registration,

    /// A trampoline stub could not hand the event to a handler.
    Dispatch,
}

/// A single diagnostic entry with context information.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level of this diagnostic.
    pub severity: DiagnosticSeverity,

    /// Category indicating the source of this diagnostic.
    pub category: DiagnosticCategory,

    /// Human-readable description of the issue.
    pub message: String,

    /// The function whose event raised the issue.
    pub function: Option<FunctionId>,

    /// The runtime status code involved, if any.
    pub hresult: Option<HResult>,
}

impl Diagnostic {
    /// Creates a new diagnostic entry.
    ///
    /// # Arguments
    ///
    /// * `severity` - Severity level of the diagnostic
    /// * `category` - Category of the diagnostic source
    /// * `message` - Human-readable description
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            function: None,
            hresult: None,
        }
    }

    /// Adds the function the event belonged to.
    #[must_use]
    pub fn with_function(mut self, function: FunctionId) -> Self {
        self.function = Some(function);
        self
    }

    /// Adds the runtime status code involved.
    #[must_use]
    pub fn with_hresult(mut self, hresult: HResult) -> Self {
        self.hresult = Some(hresult);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)?;

        if let Some(function) = self.function {
            write!(f, " (function: {function})")?;
        }

        if let Some(hresult) = self.hresult {
            write!(f, " (hresult: {hresult})")?;
        }

        Ok(())
    }
}

/// Thread-safe container for collecting diagnostic entries.
///
/// Every pushed entry is also emitted through the `log` facade at the matching level.
#[derive(Debug)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
    capacity: usize,
    dropped: AtomicUsize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Default number of entries retained before further entries are only counted.
    pub const DEFAULT_CAPACITY: usize = 4096;

    /// Creates a new empty diagnostics container with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a new empty diagnostics container retaining at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: boxcar::Vec::new(),
            capacity,
            dropped: AtomicUsize::new(0),
        }
    }

    /// Adds an informational diagnostic.
    pub fn info(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Info, category, message));
    }

    /// Adds a warning diagnostic.
    pub fn warning(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Warning,
            category,
            message,
        ));
    }

    /// Adds an error diagnostic.
    pub fn error(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Error,
            category,
            message,
        ));
    }

    /// Adds a diagnostic entry directly.
    ///
    /// Use this for diagnostics that need additional context like the function or status
    /// code. The entry is logged even when the container is full.
    pub fn push(&self, diagnostic: Diagnostic) {
        log::log!(diagnostic.severity.level(), "{diagnostic}");

        // The count check races with concurrent pushes, so the bound is approximate.
        if self.entries.count() >= self.capacity {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.entries.push(diagnostic);
    }

    /// Returns true if any diagnostics have been collected.
    pub fn has_any(&self) -> bool {
        self.entries.count() > 0
    }

    /// Returns true if any error-level diagnostics have been collected.
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns the total number of retained diagnostics.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Returns the number of entries that were logged but not retained.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of error-level diagnostics.
    pub fn error_count(&self) -> usize {
        self.count_severity(DiagnosticSeverity::Error)
    }

    /// Returns the number of warning-level diagnostics.
    pub fn warning_count(&self) -> usize {
        self.count_severity(DiagnosticSeverity::Warning)
    }

    fn count_severity(&self, severity: DiagnosticSeverity) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == severity)
            .count()
    }

    /// Returns an iterator over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Returns diagnostics filtered by category.
    pub fn by_category(&self, category: DiagnosticCategory) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .filter(|(_, d)| d.category == category)
            .map(|(_, d)| d)
            .collect()
    }

    /// Formats a summary of all diagnostics for display.
    pub fn summary(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "Diagnostics: {} error(s), {} warning(s), {} dropped",
            self.error_count(),
            self.warning_count(),
            self.dropped()
        );

        for diag in self.iter() {
            let _ = writeln!(output, "  {diag}");
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_diagnostic_with_context() {
        let diag = Diagnostic::new(
            DiagnosticSeverity::Warning,
            DiagnosticCategory::Arguments,
            "GetFunctionEnter3Info failed",
        )
        .with_function(FunctionId(0x1000))
        .with_hresult(HResult::E_FAIL);

        assert_eq!(diag.function, Some(FunctionId(0x1000)));
        assert_eq!(diag.hresult, Some(HResult::E_FAIL));

        let display = diag.to_string();
        assert!(display.starts_with("[WARN] Arguments: GetFunctionEnter3Info failed"));
        assert!(display.contains("(function: 0x1000)"));
        assert!(display.contains("E_FAIL"));
    }

    #[test]
    fn test_diagnostics_container() {
        let diagnostics = Diagnostics::new();

        diagnostics.info(DiagnosticCategory::Registration, "event mask set");
        diagnostics.warning(DiagnosticCategory::Consistency, "range mismatch");
        diagnostics.error(DiagnosticCategory::Registration, "hooks rejected");

        assert_eq!(diagnostics.count(), 3);
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(diagnostics.warning_count(), 1);
        assert!(diagnostics.has_errors());
        assert_eq!(
            diagnostics.by_category(DiagnosticCategory::Registration).len(),
            2
        );
    }

    #[test]
    fn test_diagnostics_capacity() {
        let diagnostics = Diagnostics::with_capacity(2);
        for i in 0..5 {
            diagnostics.warning(DiagnosticCategory::Resolution, format!("miss {i}"));
        }
        assert_eq!(diagnostics.count(), 2);
        assert_eq!(diagnostics.dropped(), 3);
        assert!(diagnostics.summary().contains("3 dropped"));
    }

    #[test]
    fn test_diagnostics_thread_safety() {
        let diagnostics = Arc::new(Diagnostics::new());
        let mut handles = vec![];

        for i in 0..10 {
            let diag_clone = Arc::clone(&diagnostics);
            handles.push(thread::spawn(move || {
                diag_clone.warning(DiagnosticCategory::Dispatch, format!("thread {i}"));
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(diagnostics.count(), 10);
    }
}
