//! Enter, leave and tailcall event handling.
//!
//! [`EventHandlers`] is what the trampolines call into once the caller's registers are saved.
//! Each handler builds one [`EventRecord`] and passes it to the configured [`EventSink`]. The
//! handlers are stateless across events: every buffer and name they produce is owned by the
//! thread handling the event and released when the record has been emitted.
//!
//! Enter events carry the most detail:
//!
//! 1. the argument descriptor is acquired with the sized-query protocol
//! 2. the method name is resolved from the frame the descriptor query returned
//! 3. the owning class name is resolved, if enabled
//! 4. the bytes of every argument range are copied, if enabled
//!
//! A failure in any step is recorded in [`Diagnostics`] and leaves the corresponding field of
//! the record empty; the event itself is always emitted. Leave and tailcall records only carry
//! the function identity.
//!
//! # Trace format
//!
//! [`TraceWriter`] renders records through their `Display` implementation:
//!
//! ```text
//! Enter 140711932510208, FuncName: Add, Class: Calculator
//!       startAddress: 0x7ffd5a3c1e40
//!       length: 4
//!       data: 02 00 00 00
//! Leave 140711932510208
//! ```

use std::{
    fmt,
    io::{self, Write},
    sync::{Mutex, PoisonError},
    thread::{self, ThreadId},
};

use strum::Display;

use crate::{
    arguments::{acquire_arguments, ArgumentRange},
    config::ProfilerConfig,
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
    resolver::{NameResolver, NameStyle, ResolvedName, ResolverLimits},
    runtime::{Callee, EltInfo, FrameInfo, FunctionId, FunctionIdOrClientId, ProfilerInfo},
    Error,
};

/// The transition that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EventKind {
    /// A function was entered
    Enter,
    /// A function returned normally
    Leave,
    /// A function left through a tail call
    Tailcall,
}

/// One argument range of an enter event and the bytes it covered at the time of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentCapture {
    /// Location and length of the range
    pub range: ArgumentRange,
    /// Copied bytes, empty when byte capture is disabled
    pub bytes: Vec<u8>,
}

/// A single traced event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Which transition happened
    pub kind: EventKind,
    /// The function (or client value) the runtime reported
    pub callee: Callee,
    /// Thread the event was handled on
    pub thread: ThreadId,
    /// Method name, enter events only
    pub method_name: Option<ResolvedName>,
    /// Owning class name, enter events only
    pub class_name: Option<ResolvedName>,
    /// Argument ranges, enter events only
    pub arguments: Option<Vec<ArgumentCapture>>,
    /// False if the argument ranges did not add up to the reported total size
    pub consistent: bool,
}

impl EventRecord {
    /// Creates an identity-only record for the current thread.
    #[must_use]
    pub fn new(kind: EventKind, callee: Callee) -> Self {
        EventRecord {
            kind,
            callee,
            thread: thread::current().id(),
            method_name: None,
            class_name: None,
            arguments: None,
            consistent: true,
        }
    }

    /// Returns true if every field applicable to the event kind is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match self.kind {
            EventKind::Enter => self.method_name.is_some() && self.arguments.is_some(),
            EventKind::Leave | EventKind::Tailcall => true,
        }
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.callee)?;
        if let Some(method) = &self.method_name {
            write!(f, ", FuncName: {method}")?;
        }
        if let Some(class) = &self.class_name {
            write!(f, ", Class: {class}")?;
        }
        if !self.consistent {
            write!(f, " (argument sizes inconsistent)")?;
        }

        for capture in self.arguments.iter().flatten() {
            write!(
                f,
                "\n      startAddress: 0x{:x}\n      length: {}\n      data:",
                capture.range.start_address, capture.range.length
            )?;
            for byte in &capture.bytes {
                write!(f, " {byte:02x}")?;
            }
        }
        Ok(())
    }
}

/// Destination of traced events.
///
/// Sinks are shared by every thread the runtime calls hooks on, so `emit` must be safe to call
/// concurrently and must not interleave the output of two records.
pub trait EventSink: Send + Sync {
    /// Consumes one record.
    fn emit(&self, record: &EventRecord);

    /// Flushes buffered output, called on shutdown.
    fn flush(&self) {}
}

/// Writes records in the text trace format, one block per event.
pub struct TraceWriter<W: Write + Send> {
    out: Mutex<W>,
}

impl TraceWriter<io::Stdout> {
    /// A writer to the process's standard output.
    #[must_use]
    pub fn stdout() -> Self {
        TraceWriter::new(io::stdout())
    }
}

impl<W: Write + Send> TraceWriter<W> {
    /// Wraps `out`.
    pub fn new(out: W) -> Self {
        TraceWriter {
            out: Mutex::new(out),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> EventSink for TraceWriter<W> {
    fn emit(&self, record: &EventRecord) {
        // Rendered up front so the lock only covers a single write.
        let block = format!("{record}\n");
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = out.write_all(block.as_bytes()) {
            log::warn!("failed to write {} event: {}", record.kind, err);
        }
    }

    fn flush(&self) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = out.flush() {
            log::warn!("failed to flush trace output: {err}");
        }
    }
}

/// The three event handlers over one runtime, configuration and sink.
#[derive(Clone, Copy)]
pub struct EventHandlers<'a> {
    info: &'a dyn ProfilerInfo,
    config: &'a ProfilerConfig,
    sink: &'a dyn EventSink,
    diagnostics: &'a Diagnostics,
}

impl<'a> EventHandlers<'a> {
    /// Creates handlers borrowing their collaborators.
    #[must_use]
    pub fn new(
        info: &'a dyn ProfilerInfo,
        config: &'a ProfilerConfig,
        sink: &'a dyn EventSink,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        EventHandlers {
            info,
            config,
            sink,
            diagnostics,
        }
    }

    /// Handles a function entry.
    pub fn enter(&self, id: FunctionIdOrClientId, elt: EltInfo) {
        let mut record = EventRecord::new(EventKind::Enter, callee_of(id));
        if self.config.resolve_enter_details {
            if let Some(function) = record.callee.function() {
                self.describe_enter(function, elt, &mut record);
            }
        }
        self.sink.emit(&record);
    }

    /// Handles a normal function return.
    pub fn leave(&self, id: FunctionIdOrClientId, _elt: EltInfo) {
        self.sink
            .emit(&EventRecord::new(EventKind::Leave, callee_of(id)));
    }

    /// Handles a tail call out of a function.
    pub fn tailcall(&self, id: FunctionIdOrClientId, _elt: EltInfo) {
        self.sink
            .emit(&EventRecord::new(EventKind::Tailcall, callee_of(id)));
    }

    fn describe_enter(&self, function: FunctionId, elt: EltInfo, record: &mut EventRecord) {
        let frame = match acquire_arguments(
            self.info,
            function,
            elt,
            self.config.trial_argument_size,
            self.diagnostics,
        ) {
            Ok(acquired) => {
                record.consistent = acquired.consistent;
                record.arguments = Some(
                    acquired
                        .descriptor
                        .ranges
                        .into_iter()
                        .map(|range| self.capture(range))
                        .collect(),
                );
                acquired.frame
            }
            Err(err) => {
                self.report(DiagnosticCategory::Arguments, function, &err);
                FrameInfo::NULL
            }
        };

        let resolver = NameResolver::new(self.info, ResolverLimits::from(self.config));
        let method = match resolver.method_name(function, frame) {
            Ok(method) => method,
            Err(err) => {
                self.report(DiagnosticCategory::Resolution, function, &err);
                return;
            }
        };
        record.method_name = Some(method.name);

        if self.config.resolve_class_names && !method.class.is_null() {
            let style = if self.config.qualify_class_names {
                NameStyle::Qualified
            } else {
                NameStyle::Simple
            };
            match resolver.class_name(method.class, style) {
                Ok(name) => record.class_name = Some(name),
                Err(err) => self.report(DiagnosticCategory::Resolution, function, &err),
            }
        }
    }

    fn capture(&self, range: ArgumentRange) -> ArgumentCapture {
        let bytes = if self.config.capture_argument_bytes {
            // SAFETY: ranges reported by the runtime stay readable until the enter hook returns
            unsafe { range.capture() }
        } else {
            Vec::new()
        };
        ArgumentCapture { range, bytes }
    }

    fn report(&self, category: DiagnosticCategory, function: FunctionId, err: &Error) {
        let mut diagnostic =
            Diagnostic::new(DiagnosticSeverity::Warning, category, err.to_string())
                .with_function(function);
        if let Some(hresult) = err.hresult() {
            diagnostic = diagnostic.with_hresult(hresult);
        }
        self.diagnostics.push(diagnostic);
    }
}

// No function id mapper is installed, so the runtime always passes a FunctionId.
fn callee_of(id: FunctionIdOrClientId) -> Callee {
    id.callee(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arguments::ArgumentDescriptor,
        runtime::HResult,
        test::{CollectingSink, MockRuntime},
    };

    struct Fixture {
        runtime: MockRuntime,
        config: ProfilerConfig,
        sink: CollectingSink,
        diagnostics: Diagnostics,
    }

    impl Fixture {
        fn new(config: ProfilerConfig) -> Self {
            Fixture {
                runtime: MockRuntime::new(),
                config,
                sink: CollectingSink::new(),
                diagnostics: Diagnostics::new(),
            }
        }

        fn handlers(&self) -> EventHandlers<'_> {
            EventHandlers::new(&self.runtime, &self.config, &self.sink, &self.diagnostics)
        }
    }

    fn id(function: FunctionId) -> FunctionIdOrClientId {
        FunctionIdOrClientId::from_function(function)
    }

    #[test]
    fn test_enter_full_record() {
        let fixture = Fixture::new(ProfilerConfig::default());
        let function = fixture.runtime.add_function("Add", "Calculator", &[]);
        let left = 2u32.to_ne_bytes();
        let right = 40u64.to_ne_bytes();
        fixture.runtime.set_arguments(
            function,
            ArgumentDescriptor::from_ranges(vec![
                ArgumentRange::new(left.as_ptr() as usize, 4),
                ArgumentRange::new(right.as_ptr() as usize, 8),
            ]),
        );

        fixture.handlers().enter(id(function), EltInfo(7));

        let records = fixture.sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.kind, EventKind::Enter);
        assert_eq!(record.callee, Callee::Function(function));
        assert!(record.is_complete());
        assert!(record.consistent);
        assert_eq!(record.method_name.as_ref().unwrap(), &"Add");
        assert_eq!(record.class_name.as_ref().unwrap(), &"Calculator");

        let arguments = record.arguments.as_ref().unwrap();
        assert_eq!(arguments[0].bytes, left.to_vec());
        assert_eq!(arguments[1].bytes, right.to_vec());
        assert!(!fixture.diagnostics.has_any());
    }

    #[test]
    fn test_enter_argument_failure_degrades() {
        let fixture = Fixture::new(ProfilerConfig::default());
        let function = fixture.runtime.add_function("Run", "Job", &[]);
        fixture.runtime.fail_enter_info(function, HResult::E_FAIL);

        fixture.handlers().enter(id(function), EltInfo(1));

        let record = &fixture.sink.records()[0];
        assert!(record.arguments.is_none());
        assert_eq!(record.method_name.as_ref().unwrap(), &"Run");
        assert!(!record.is_complete());

        let faults = fixture.diagnostics.by_category(DiagnosticCategory::Arguments);
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].hresult, Some(HResult::E_FAIL));
    }

    #[test]
    fn test_enter_resolution_failure_degrades() {
        let fixture = Fixture::new(ProfilerConfig::default());
        let function = fixture.runtime.add_function("Run", "Job", &[]);
        fixture
            .runtime
            .fail_function_info(function, HResult::E_INVALIDARG);

        fixture.handlers().enter(id(function), EltInfo(1));

        let record = &fixture.sink.records()[0];
        assert!(record.method_name.is_none());
        assert!(record.class_name.is_none());
        assert_eq!(record.arguments.as_ref().map(Vec::len), Some(0));
        assert_eq!(
            fixture
                .diagnostics
                .by_category(DiagnosticCategory::Resolution)
                .len(),
            1
        );
    }

    #[test]
    fn test_enter_inconsistent_arguments_still_emitted() {
        let fixture = Fixture::new(ProfilerConfig::default());
        let function = fixture.runtime.add_function("Odd", "Program", &[]);
        let data = [1u8, 2, 3, 4];
        fixture.runtime.set_arguments(
            function,
            ArgumentDescriptor {
                ranges: vec![ArgumentRange::new(data.as_ptr() as usize, 4)],
                total_size: 8,
            },
        );

        fixture.handlers().enter(id(function), EltInfo(1));

        let record = &fixture.sink.records()[0];
        assert!(!record.consistent);
        assert_eq!(record.arguments.as_ref().unwrap()[0].bytes, data.to_vec());
        assert!(record.to_string().contains("inconsistent"));
        assert_eq!(fixture.diagnostics.warning_count(), 1);
    }

    #[test]
    fn test_enter_qualified_generic_class() {
        let fixture = Fixture::new(ProfilerConfig::verbose());
        let string = fixture.runtime.add_class("String", &[]);
        let cache = fixture.runtime.add_class("Cache`1", &[string]);
        let function = fixture.runtime.add_method(cache, "Get");

        fixture.handlers().enter(id(function), EltInfo(1));

        let record = &fixture.sink.records()[0];
        assert_eq!(
            record.class_name.as_ref().unwrap(),
            &"Program.Cache`1<String>"
        );
    }

    #[test]
    fn test_minimal_config_skips_queries() {
        let fixture = Fixture::new(ProfilerConfig::minimal());
        let function = fixture.runtime.add_function("Main", "Program", &[]);

        fixture.handlers().enter(id(function), EltInfo(1));

        let record = &fixture.sink.records()[0];
        assert!(record.method_name.is_none());
        assert!(record.arguments.is_none());
        assert_eq!(fixture.runtime.enter_info_calls(), 0);
        assert_eq!(fixture.runtime.method_lookups(), 0);
    }

    #[test]
    fn test_capture_disabled_keeps_ranges() {
        let config = ProfilerConfig {
            capture_argument_bytes: false,
            resolve_class_names: false,
            ..ProfilerConfig::default()
        };
        let fixture = Fixture::new(config);
        let function = fixture.runtime.add_function("Main", "Program", &[]);
        fixture.runtime.set_arguments(
            function,
            ArgumentDescriptor::from_ranges(vec![ArgumentRange::new(0x1000, 16)]),
        );

        fixture.handlers().enter(id(function), EltInfo(1));

        let record = &fixture.sink.records()[0];
        let arguments = record.arguments.as_ref().unwrap();
        assert_eq!(arguments[0].range.length, 16);
        assert!(arguments[0].bytes.is_empty());
        assert!(record.class_name.is_none());
        assert_eq!(fixture.runtime.class_info_calls(), 0);
    }

    #[test]
    fn test_leave_and_tailcall_identity_only() {
        let fixture = Fixture::new(ProfilerConfig::default());
        let function = fixture.runtime.add_function("Main", "Program", &[]);

        fixture.handlers().leave(id(function), EltInfo(1));
        fixture.handlers().tailcall(id(function), EltInfo(1));

        let records = fixture.sink.records();
        assert_eq!(records[0].kind, EventKind::Leave);
        assert_eq!(records[1].kind, EventKind::Tailcall);
        assert!(records.iter().all(EventRecord::is_complete));
        assert_eq!(fixture.runtime.enter_info_calls(), 0);
        assert_eq!(
            records[0].to_string(),
            format!("Leave {}", function.value())
        );
    }

    #[test]
    fn test_trace_format() {
        let data = [0xABu8, 0x01];
        let mut record = EventRecord::new(EventKind::Enter, Callee::Function(FunctionId(42)));
        record.method_name = Some(ResolvedName::from("Main"));
        record.arguments = Some(vec![ArgumentCapture {
            range: ArgumentRange::new(0x2000, 2),
            bytes: data.to_vec(),
        }]);

        let writer = TraceWriter::new(Vec::new());
        writer.emit(&record);
        writer.emit(&EventRecord::new(
            EventKind::Leave,
            Callee::Function(FunctionId(42)),
        ));
        writer.flush();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            text,
            "Enter 42, FuncName: Main\n      startAddress: 0x2000\n      length: 2\n      data: ab 01\nLeave 42\n"
        );
    }

    #[test]
    fn test_trace_writer_blocks_do_not_interleave() {
        let writer = TraceWriter::new(Vec::new());
        let payload = vec![0x5Au8; 64];

        thread::scope(|scope| {
            for t in 0..8usize {
                let writer = &writer;
                let payload = &payload;
                scope.spawn(move || {
                    for _ in 0..50 {
                        let mut record =
                            EventRecord::new(EventKind::Enter, Callee::Function(FunctionId(t)));
                        record.arguments = Some(vec![ArgumentCapture {
                            range: ArgumentRange::new(0x1000, 64),
                            bytes: payload.clone(),
                        }]);
                        writer.emit(&record);
                    }
                });
            }
        });

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 8 * 50 * 4);
        for block in lines.chunks(4) {
            assert!(block[0].starts_with("Enter "));
            assert!(block[1].contains("startAddress"));
            assert_eq!(block[3].matches("5a").count(), 64);
        }
    }
}
