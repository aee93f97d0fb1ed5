//! # eltscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the eltscope library. Import this module to get quick access to everything needed to
//! attach a tracer and consume its events.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all eltscope operations
pub use crate::Error;

/// The result type used throughout eltscope
pub use crate::Result;

/// Profiler configuration
pub use crate::config::ProfilerConfig;

// ================================================================================================
// Attach and Dispatch
// ================================================================================================

/// The process-wide context and its registration outcome
pub use crate::context::{ProfilerContext, Registration};

/// The native call-frame adapter
pub use crate::trampoline::{CallFrameAdapter, NativeAdapter};

// ================================================================================================
// Events
// ================================================================================================

/// Event records, handlers and sinks
pub use crate::events::{
    ArgumentCapture, EventHandlers, EventKind, EventRecord, EventSink, TraceWriter,
};

/// Argument descriptors
pub use crate::arguments::{ArgumentDescriptor, ArgumentRange};

// ================================================================================================
// Name Resolution
// ================================================================================================

/// Identifier resolver
pub use crate::resolver::{
    MethodName, NameResolver, NameStyle, PseudoType, ResolvedName, ResolverLimits,
};

// ================================================================================================
// Runtime Interface
// ================================================================================================

/// Handles, tokens, status codes and the runtime query traits
pub use crate::runtime::{
    Callee, ClassId, EltInfo, EventMask, FrameInfo, FunctionId, FunctionIdOrClientId, HResult,
    MetadataImport, ModuleId, ProfilerInfo, Token,
};

// ================================================================================================
// Diagnostics
// ================================================================================================

/// Non-fatal fault collection
pub use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};
