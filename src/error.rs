use thiserror::Error;

use crate::runtime::{ClassId, HResult};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! query_error {
    ($call:expr, $hresult:expr) => {
        crate::Error::Query {
            call: $call,
            hresult: $hresult,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// None of these errors ever reach the execution engine. The event handlers absorb them,
/// record them in [`crate::diagnostics::Diagnostics`] and degrade the emitted record instead.
///
/// # Error Categories
///
/// ## Runtime Query Errors
/// - [`Error::Query`] - A runtime or metadata call returned a failing status
/// - [`Error::BufferStillTooSmall`] - The sized-query retry was rejected a second time
/// - [`Error::Malformed`] - A buffer returned by the runtime could not be decoded
///
/// ## Resolution Errors
/// - [`Error::TooManyTypeArguments`] - Generic arity exceeded the configured soft limit
/// - [`Error::RecursionLimit`] - Generic nesting exceeded the configured depth
/// - [`Error::CyclicType`] - A class handle appeared as its own generic argument
///
/// ## Lifecycle Errors
/// - [`Error::AlreadyAttached`] / [`Error::NotAttached`] - Attach context misuse
/// - [`Error::UnsupportedArchitecture`] - No trampolines exist for the build target
/// - [`Error::Config`] - Invalid profiler configuration
///
/// # Examples
///
/// ```rust
/// use eltscope::{Error, runtime::HResult};
///
/// let err = Error::Query { call: "GetClassIDInfo2", hresult: HResult::E_FAIL };
/// assert_eq!(err.hresult(), Some(HResult::E_FAIL));
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A runtime or metadata query returned a failing status.
    ///
    /// This is the generic "anything else" failure of the runtime interfaces. Status codes
    /// with a dedicated meaning (buffer too small, pseudo-type sentinels) are handled before
    /// they can become this error.
    #[error("{call} failed with {hresult}")]
    Query {
        /// Name of the runtime call that failed
        call: &'static str,
        /// The status code returned by the runtime
        hresult: HResult,
    },

    /// The runtime reported "buffer too small" again after the buffer was resized.
    ///
    /// The sized-query protocol retries exactly once with the size the runtime asked for.
    #[error("Buffer still too small after resize - provided {requested} bytes, runtime requires {required}")]
    BufferStillTooSmall {
        /// The size of the buffer handed to the retry
        requested: usize,
        /// The size the runtime reported on the retry
        required: usize,
    },

    /// A buffer returned by the runtime could not be decoded.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A class has more generic type arguments than the configured soft limit.
    #[error("Class has {count} generic type arguments, limit is {limit}")]
    TooManyTypeArguments {
        /// The arity reported by the runtime
        count: usize,
        /// The configured limit
        limit: usize,
    },

    /// Recursion limit reached.
    ///
    /// Generic type arguments are resolved recursively. The associated value shows the
    /// recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// A class handle was encountered again while resolving its own generic arguments.
    #[error("Class {0} refers to itself through its generic arguments")]
    CyclicType(ClassId),

    /// A profiler context is already installed for this process.
    #[error("A profiler context is already attached to this process")]
    AlreadyAttached,

    /// No profiler context has been installed yet.
    #[error("No profiler context is attached")]
    NotAttached,

    /// There are no native trampolines for the target this crate was built for.
    #[error("Enter/leave/tailcall trampolines are not available on this architecture")]
    UnsupportedArchitecture,

    /// Invalid configuration value.
    #[error("Invalid configuration - {0}")]
    Config(String),
}

impl Error {
    /// Returns the runtime status code carried by this error, if any.
    #[must_use]
    pub fn hresult(&self) -> Option<HResult> {
        match self {
            Error::Query { hresult, .. } => Some(*hresult),
            _ => None,
        }
    }
}
