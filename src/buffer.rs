//! Sized queries whose result length is only known to the runtime.
//!
//! Several runtime calls write a variable-length structure into a caller-provided buffer and
//! follow the same convention:
//!
//! 1. The caller passes a buffer and its capacity through an in/out size argument.
//! 2. On success the buffer is filled and the size argument holds the number of bytes used.
//! 3. If the buffer is too small the call fails with [`HResult::INSUFFICIENT_BUFFER`] and the
//!    size argument holds the number of bytes required.
//!
//! [`query_growable`] implements the caller side once for any [`GrowableBuffer`]: one call
//! with a trial buffer, and on "too small" exactly one retry with a buffer of the reported
//! size. It never issues a third call. The caller classifies each call's outcome as an
//! [`Attempt`], which lets queries that report their required length some other way, such as
//! a generic argument count, share the protocol. [`query_with_growable_result`] is the byte
//! flavour for calls with an in/out size argument.
//!
//! # Examples
//!
//! ```rust
//! use eltscope::{buffer::query_with_growable_result, runtime::HResult};
//!
//! let payload = [7u8; 40];
//! let outcome = query_with_growable_result("Example", 8, |buffer, size| {
//!     if buffer.len() < payload.len() {
//!         *size = payload.len() as u32;
//!         return HResult::INSUFFICIENT_BUFFER;
//!     }
//!     buffer[..payload.len()].copy_from_slice(&payload);
//!     *size = payload.len() as u32;
//!     HResult::S_OK
//! })?;
//!
//! assert_eq!(outcome.attempts, 2);
//! assert_eq!(outcome.buffer.as_bytes(), &payload);
//! # Ok::<(), eltscope::Error>(())
//! ```

use crate::{runtime::HResult, Error, Result};

/// Upper bound for the size a runtime may request; anything larger is treated as corrupt.
pub const MAX_QUERY_SIZE: usize = 16 * 1024 * 1024;

/// A zero-initialised byte buffer with 8-byte alignment.
///
/// The runtime writes native structures (pointer-sized fields) into query buffers, so the
/// storage is backed by `u64` words rather than bytes.
#[derive(Clone)]
pub struct ScratchBuffer {
    words: Vec<u64>,
    len: usize,
}

impl ScratchBuffer {
    /// Allocates a zeroed buffer of `len` bytes.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(8)],
            len,
        }
    }

    /// Number of valid bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Shrinks the valid length; growing is not possible.
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// The valid bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `words` owns at least `len` initialised bytes and u8 has no alignment needs
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    /// The valid bytes, mutably.
    #[must_use]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: `words` owns at least `len` initialised bytes and u8 has no alignment needs
        unsafe { std::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
    }
}

impl std::fmt::Debug for ScratchBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchBuffer").field("len", &self.len).finish()
    }
}

/// A buffer the sized-query protocol can allocate and trim.
pub trait GrowableBuffer {
    /// Allocates a zeroed buffer of `len` elements.
    fn allocate(len: usize) -> Self;

    /// Number of elements the buffer can hold.
    fn capacity(&self) -> usize;

    /// Shrinks the buffer to the `used` elements the runtime reported.
    fn keep_used(&mut self, used: usize);
}

impl GrowableBuffer for ScratchBuffer {
    fn allocate(len: usize) -> Self {
        ScratchBuffer::new(len)
    }

    fn capacity(&self) -> usize {
        self.len()
    }

    fn keep_used(&mut self, used: usize) {
        self.truncate(used);
    }
}

impl<T: Copy + Default> GrowableBuffer for Vec<T> {
    fn allocate(len: usize) -> Self {
        vec![T::default(); len]
    }

    fn capacity(&self) -> usize {
        self.len()
    }

    fn keep_used(&mut self, used: usize) {
        self.truncate(used);
    }
}

/// What a single call of a sized query reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<R> {
    /// The call completed, filling `used` elements
    Complete {
        /// Fixed-size output of the call
        value: R,
        /// Number of elements written
        used: usize,
    },
    /// The buffer was too small, `required` elements are needed
    TooSmall {
        /// Number of elements the runtime asked for
        required: usize,
    },
}

/// The result of a successful sized query.
#[derive(Debug)]
pub struct Grown<B, R> {
    /// The populated buffer, trimmed to the elements the runtime reported as used.
    pub buffer: B,
    /// Fixed-size output of the successful call.
    pub value: R,
    /// Number of calls issued, 1 or 2.
    pub attempts: u32,
}

/// Runs a sized query over any buffer type, resizing and retrying once if the trial buffer
/// is too small.
///
/// `query` performs one runtime call and classifies its outcome. Its errors are returned
/// unchanged from either call, so callers can still tell status codes apart afterwards.
/// `call` names the runtime call in errors.
///
/// # Errors
///
/// - whatever `query` returns
/// - [`Error::BufferStillTooSmall`] if the retry is rejected as too small as well, or the
///   runtime asks for a size that is not larger than the trial buffer
/// - [`Error::Malformed`] if the runtime asks for more than `max_len` elements
pub fn query_growable<B, R, F>(
    call: &'static str,
    trial_len: usize,
    max_len: usize,
    mut query: F,
) -> Result<Grown<B, R>>
where
    B: GrowableBuffer,
    F: FnMut(&mut B) -> Result<Attempt<R>>,
{
    let mut buffer = B::allocate(trial_len);
    let required = match query(&mut buffer)? {
        Attempt::Complete { value, used } => {
            buffer.keep_used(used);
            return Ok(Grown {
                buffer,
                value,
                attempts: 1,
            });
        }
        Attempt::TooSmall { required } => required,
    };

    if required <= trial_len {
        return Err(Error::BufferStillTooSmall {
            requested: trial_len,
            required,
        });
    }
    if required > max_len {
        return Err(malformed_error!(
            "{} requested {} elements, limit is {}",
            call,
            required,
            max_len
        ));
    }

    drop(buffer);
    let mut buffer = B::allocate(required);
    match query(&mut buffer)? {
        Attempt::Complete { value, used } => {
            buffer.keep_used(used);
            Ok(Grown {
                buffer,
                value,
                attempts: 2,
            })
        }
        Attempt::TooSmall { required: again } => Err(Error::BufferStillTooSmall {
            requested: required,
            required: again,
        }),
    }
}

/// The result of a successful byte-sized query.
#[derive(Debug)]
pub struct QueryOutcome {
    /// The populated buffer, truncated to the size the runtime reported as used.
    pub buffer: ScratchBuffer,
    /// Number of calls issued, 1 or 2.
    pub attempts: u32,
}

/// Runs a byte-sized query that reports its size through an in/out argument.
///
/// `query` receives the buffer and the in/out size and returns the runtime's status. `call` is
/// the name of the runtime call, used in errors.
///
/// # Errors
///
/// - [`Error::Query`] if either call fails with anything other than "buffer too small"
/// - [`Error::BufferStillTooSmall`] if the retry is rejected as too small as well, or the
///   runtime asks for a size that is not larger than the trial buffer
/// - [`Error::Malformed`] if the runtime asks for more than [`MAX_QUERY_SIZE`] bytes
pub fn query_with_growable_result<F>(
    call: &'static str,
    trial_size: usize,
    mut query: F,
) -> Result<QueryOutcome>
where
    F: FnMut(&mut [u8], &mut u32) -> HResult,
{
    let grown = query_growable(call, trial_size, MAX_QUERY_SIZE, |buffer: &mut ScratchBuffer| {
        let mut size = capacity_of(buffer);
        let status = query(buffer.as_bytes_mut(), &mut size);
        if status.is_success() {
            Ok(Attempt::Complete {
                value: (),
                used: size as usize,
            })
        } else if status == HResult::INSUFFICIENT_BUFFER {
            Ok(Attempt::TooSmall {
                required: size as usize,
            })
        } else {
            Err(query_error!(call, status))
        }
    })?;

    Ok(QueryOutcome {
        buffer: grown.buffer,
        attempts: grown.attempts,
    })
}

fn capacity_of(buffer: &ScratchBuffer) -> u32 {
    u32::try_from(buffer.len()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_scratch_buffer_alignment() {
        let mut buffer = ScratchBuffer::new(13);
        assert_eq!(buffer.len(), 13);
        assert_eq!(buffer.as_bytes().as_ptr() as usize % 8, 0);
        buffer.as_bytes_mut()[12] = 0xAB;
        buffer.truncate(20);
        assert_eq!(buffer.len(), 13);
        buffer.truncate(4);
        assert_eq!(buffer.as_bytes(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_fits_first_time() {
        let calls = Cell::new(0);
        let outcome = query_with_growable_result("Test", 32, |buffer, size| {
            calls.set(calls.get() + 1);
            assert_eq!(*size, 32);
            buffer[0] = 1;
            *size = 4;
            HResult::S_OK
        })
        .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.buffer.as_bytes(), &[1, 0, 0, 0]);
    }

    #[test]
    fn test_resize_uses_exactly_two_calls() {
        let calls = Cell::new(0);
        let outcome = query_with_growable_result("Test", 16, |buffer, size| {
            calls.set(calls.get() + 1);
            if buffer.len() < 72 {
                *size = 72;
                return HResult::INSUFFICIENT_BUFFER;
            }
            assert_eq!(*size, 72);
            buffer.fill(0x5A);
            HResult::S_OK
        })
        .unwrap();

        assert_eq!(calls.get(), 2);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.buffer.len(), 72);
        assert!(outcome.buffer.as_bytes().iter().all(|b| *b == 0x5A));
    }

    #[test]
    fn test_other_failure_aborts() {
        let calls = Cell::new(0);
        let result = query_with_growable_result("GetFunctionEnter3Info", 16, |_, _| {
            calls.set(calls.get() + 1);
            HResult::E_FAIL
        });

        assert_eq!(calls.get(), 1);
        assert!(matches!(
            result,
            Err(Error::Query {
                call: "GetFunctionEnter3Info",
                hresult: HResult::E_FAIL
            })
        ));
    }

    #[test]
    fn test_second_too_small_is_not_retried() {
        let calls = Cell::new(0);
        let result = query_with_growable_result("Test", 16, |_, size| {
            calls.set(calls.get() + 1);
            *size += 8;
            HResult::INSUFFICIENT_BUFFER
        });

        assert_eq!(calls.get(), 2);
        assert!(matches!(
            result,
            Err(Error::BufferStillTooSmall {
                requested: 24,
                required: 32
            })
        ));
    }

    #[test]
    fn test_failure_on_retry() {
        let calls = Cell::new(0);
        let result = query_with_growable_result("Test", 8, |_, size| {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                *size = 64;
                HResult::INSUFFICIENT_BUFFER
            } else {
                HResult::E_INVALIDARG
            }
        });

        assert_eq!(calls.get(), 2);
        assert_eq!(result.unwrap_err().hresult(), Some(HResult::E_INVALIDARG));
    }

    #[test]
    fn test_growable_vec_of_handles() {
        let calls = Cell::new(0);
        let grown = query_growable("Test", 2, 16, |buffer: &mut Vec<u32>| {
            calls.set(calls.get() + 1);
            if buffer.len() < 5 {
                return Ok(Attempt::TooSmall { required: 5 });
            }
            buffer.copy_from_slice(&[1, 2, 3, 4, 5]);
            Ok(Attempt::Complete {
                value: "done",
                used: 5,
            })
        })
        .unwrap();

        assert_eq!(calls.get(), 2);
        assert_eq!(grown.attempts, 2);
        assert_eq!(grown.value, "done");
        assert_eq!(grown.buffer, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_growable_keeps_retry_error() {
        let calls = Cell::new(0);
        let result = query_growable("Test", 1, 16, |_: &mut Vec<u32>| {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Ok(Attempt::<()>::TooSmall { required: 3 })
            } else {
                Err(query_error!("Test", HResult::DATA_INCOMPLETE))
            }
        });

        assert_eq!(calls.get(), 2);
        assert_eq!(
            result.unwrap_err().hresult(),
            Some(HResult::DATA_INCOMPLETE)
        );
    }

    #[test]
    fn test_bogus_required_size() {
        let result = query_with_growable_result("Test", 16, |_, size| {
            *size = 8;
            HResult::INSUFFICIENT_BUFFER
        });
        assert!(matches!(result, Err(Error::BufferStillTooSmall { .. })));

        let result = query_with_growable_result("Test", 16, |_, size| {
            *size = u32::MAX;
            HResult::INSUFFICIENT_BUFFER
        });
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }
}
