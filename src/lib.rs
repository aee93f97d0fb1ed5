// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]
// - 'trampoline' is naked assembly by necessity
// - 'buffer.rs' reinterprets its word storage as bytes
// - 'arguments.rs' copies argument memory the runtime points at

//! # eltscope
//!
//! Enter/leave/tailcall tracing for the .NET execution engine.
//!
//! `eltscope` is the core of an in-process profiler: it hooks every JIT-compiled function's
//! enter, leave and tailcall transitions, captures the raw bytes of each call's arguments, and
//! resolves the runtime's opaque class, module and method handles into readable,
//! generics-aware names.
//!
//! ## Features
//!
//! - **Register-preserving trampolines** - naked entry points for x86_64 (System V and
//!   Windows), aarch64 and x86 Windows
//! - **Argument capture** - the runtime's variable-length argument descriptor, fetched with a
//!   reusable size-then-fetch query helper
//! - **Name resolution** - recursive, module-qualified, generics-aware class names with
//!   placeholders for arrays, composite types and types still being loaded
//! - **Never faults the host** - every failure degrades the emitted record and is collected
//!   as a diagnostic instead
//!
//! ## Quick Start
//!
//! The runtime binding hands the tracer an implementation of [`runtime::ProfilerInfo`] during
//! profiler initialisation. Attaching installs the process-wide context and the hooks:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use eltscope::prelude::*;
//!
//! fn initialize(info: Arc<dyn ProfilerInfo>) -> eltscope::Result<()> {
//!     let context = ProfilerContext::attach(
//!         info,
//!         ProfilerConfig::from_env()?,
//!         Arc::new(TraceWriter::stdout()),
//!     )?;
//!     println!("{}", context.diagnostics());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! runtime ─► trampoline ─► ProfilerContext::dispatch ─► EventHandlers ─► EventSink
//!                                                          │
//!                                     ┌────────────────────┴───────────────┐
//!                                     ▼                                    ▼
//!                           arguments (sized query)              resolver (names)
//! ```
//!
//! - [`trampoline`] - the architecture-specific native call-frame adapter
//! - [`context`] - single-assignment attach context, hook registration, shutdown
//! - [`events`] - event records, handlers and sinks
//! - [`arguments`] and [`buffer`] - argument descriptors and the sized-query protocol
//! - [`resolver`] - class, module and method names
//! - [`runtime`] - handles, tokens, status codes and the runtime query traits
//! - [`diagnostics`], [`config`], [`logging`] - the ambient plumbing
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T>`]. Inside the hooks, errors never escape: the
//! handlers turn them into [`diagnostics::Diagnostic`] entries and emit a partial record.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use eltscope::prelude::*;
///
/// let config = ProfilerConfig::verbose();
/// assert_eq!(config.event_mask, EventMask::tracing());
/// ```
pub mod prelude;

/// Types and interfaces shared with the execution engine.
pub mod runtime;

/// Reusable size-then-fetch query protocol.
pub mod buffer;

/// Argument descriptors of enter events.
pub mod arguments;

/// Class, module and method name resolution.
pub mod resolver;

/// Event records, sinks and the enter/leave/tailcall handlers.
pub mod events;

/// Native enter/leave/tailcall entry points.
pub mod trampoline;

/// The process-wide profiler context.
pub mod context;

/// Collection of non-fatal tracing faults.
pub mod diagnostics;

/// Profiler configuration.
pub mod config;

/// Logger initialisation.
pub mod logging;

/// `eltscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `eltscope` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use eltscope::{Error, config::ProfilerConfig};
///
/// let config = ProfilerConfig { max_resolution_depth: 0, ..ProfilerConfig::default() };
/// match config.validate() {
///     Err(Error::Config(message)) => println!("rejected: {message}"),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub use error::Error;
