//! Status codes returned by the runtime's profiling and metadata interfaces.
//!
//! Every call into the execution engine reports an `HRESULT`: a 32-bit value whose sign bit
//! marks failure. Only a handful of codes carry meaning beyond success/failure for the tracer:
//!
//! - [`HResult::INSUFFICIENT_BUFFER`] drives the resize-and-retry protocol of sized queries
//! - [`HResult::CLASSID_IS_ARRAY`], [`HResult::CLASSID_IS_COMPOSITE`] and
//!   [`HResult::DATA_INCOMPLETE`] are pseudo-type sentinels of class queries
//!
//! Everything else is treated as an opaque failure.

use std::fmt;

/// A raw `HRESULT` status code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct HResult(pub i32);

impl HResult {
    /// The call succeeded.
    pub const S_OK: Self = Self(0);
    /// The call succeeded with a qualified result.
    pub const S_FALSE: Self = Self(1);
    /// Unspecified failure.
    pub const E_FAIL: Self = Self(0x8000_4005_u32 as i32);
    /// The requested interface is not supported.
    pub const E_NOINTERFACE: Self = Self(0x8000_4002_u32 as i32);
    /// The requested operation is not implemented.
    pub const E_NOTIMPL: Self = Self(0x8000_4001_u32 as i32);
    /// One or more arguments are invalid.
    pub const E_INVALIDARG: Self = Self(0x8007_0057_u32 as i32);
    /// Out of memory.
    pub const E_OUTOFMEMORY: Self = Self(0x8007_000E_u32 as i32);
    /// `HRESULT_FROM_WIN32(ERROR_INSUFFICIENT_BUFFER)`, the output buffer is too small.
    pub const INSUFFICIENT_BUFFER: Self = Self(0x8007_007A_u32 as i32);
    /// `CORPROF_E_DATAINCOMPLETE`, the type is still being loaded.
    pub const DATA_INCOMPLETE: Self = Self(0x8013_1351_u32 as i32);
    /// `CORPROF_E_CLASSID_IS_ARRAY`, the class handle denotes an array type.
    pub const CLASSID_IS_ARRAY: Self = Self(0x8013_1365_u32 as i32);
    /// `CORPROF_E_CLASSID_IS_COMPOSITE`, the class handle denotes a composite type.
    pub const CLASSID_IS_COMPOSITE: Self = Self(0x8013_1366_u32 as i32);

    /// Returns true for any success code (sign bit clear).
    #[must_use]
    pub fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Returns true for any failure code (sign bit set).
    #[must_use]
    pub fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// Returns the raw value as an unsigned integer.
    #[must_use]
    pub fn value(self) -> u32 {
        self.0 as u32
    }

    /// Converts a Win32 error code the way `HRESULT_FROM_WIN32` does.
    #[must_use]
    pub fn from_win32(code: u32) -> Self {
        if code == 0 {
            Self::S_OK
        } else {
            Self(((code & 0x0000_FFFF) | 0x8007_0000) as i32)
        }
    }

    /// Returns the symbolic name of well-known codes.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::S_OK => Some("S_OK"),
            Self::S_FALSE => Some("S_FALSE"),
            Self::E_FAIL => Some("E_FAIL"),
            Self::E_NOINTERFACE => Some("E_NOINTERFACE"),
            Self::E_NOTIMPL => Some("E_NOTIMPL"),
            Self::E_INVALIDARG => Some("E_INVALIDARG"),
            Self::E_OUTOFMEMORY => Some("E_OUTOFMEMORY"),
            Self::INSUFFICIENT_BUFFER => Some("ERROR_INSUFFICIENT_BUFFER"),
            Self::DATA_INCOMPLETE => Some("CORPROF_E_DATAINCOMPLETE"),
            Self::CLASSID_IS_ARRAY => Some("CORPROF_E_CLASSID_IS_ARRAY"),
            Self::CLASSID_IS_COMPOSITE => Some("CORPROF_E_CLASSID_IS_COMPOSITE"),
            _ => None,
        }
    }

    /// Turns the status into a `Result`, keeping the code on both sides.
    ///
    /// # Errors
    ///
    /// Returns `Err(self)` for failure codes.
    pub fn ok(self) -> Result<HResult, HResult> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self)
        }
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult({self})")
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "0x{:08x} ({})", self.value(), name),
            None => write!(f, "0x{:08x}", self.value()),
        }
    }
}

impl From<u32> for HResult {
    fn from(value: u32) -> Self {
        HResult(value as i32)
    }
}
