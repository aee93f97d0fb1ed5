//! Argument location descriptors of enter events.
//!
//! When an instrumented function is entered, the runtime can describe where the call's
//! arguments live in memory. The calling convention may split one logical argument over several
//! disjoint ranges or group several arguments into one, so the description is a
//! variable-length structure (`COR_PRF_FUNCTION_ARGUMENT_INFO`):
//!
//! ```text
//! ┌────────────┬────────────────────┬──────────────────────────────────────┐
//! │ num_ranges │ total_argument_size│ ranges[num_ranges]                   │
//! │ u32        │ u32                │ { start_address: usize, length: u32 }│
//! └────────────┴────────────────────┴──────────────────────────────────────┘
//! ```
//!
//! Its size depends on the call site and is only discoverable by asking the runtime, which is
//! done through [`crate::buffer::query_with_growable_result`]. After decoding, the sum of all
//! range lengths must equal `total_argument_size`; a mismatch is reported as a consistency
//! fault but the descriptor is still returned.

use std::mem::{offset_of, size_of};

use crate::{
    buffer::query_with_growable_result,
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
    runtime::{EltInfo, FrameInfo, FunctionId, ProfilerInfo},
    Result,
};

#[repr(C)]
struct RawArgumentRange {
    start_address: usize,
    length: u32,
}

#[repr(C)]
struct RawArgumentInfo {
    num_ranges: u32,
    total_argument_size: u32,
    ranges: [RawArgumentRange; 0],
}

/// One contiguous block of argument memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgumentRange {
    /// Address of the first byte
    pub start_address: usize,
    /// Number of bytes
    pub length: u32,
}

impl ArgumentRange {
    /// Creates a range.
    #[must_use]
    pub fn new(start_address: usize, length: u32) -> Self {
        Self {
            start_address,
            length,
        }
    }

    /// Copies the bytes covered by this range.
    ///
    /// A null start address yields an empty vector.
    ///
    /// # Safety
    ///
    /// The range must describe readable memory for its full length. Ranges reported by the
    /// runtime satisfy this for the duration of the enter callback that produced them.
    #[must_use]
    pub unsafe fn capture(&self) -> Vec<u8> {
        if self.start_address == 0 || self.length == 0 {
            return Vec::new();
        }
        std::slice::from_raw_parts(self.start_address as *const u8, self.length as usize).to_vec()
    }
}

/// Decoded `COR_PRF_FUNCTION_ARGUMENT_INFO`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgumentDescriptor {
    /// Argument ranges in the order reported by the runtime
    pub ranges: Vec<ArgumentRange>,
    /// Total argument size reported by the runtime
    pub total_size: u32,
}

impl ArgumentDescriptor {
    /// Size of the fixed header preceding the ranges.
    pub const HEADER_SIZE: usize = offset_of!(RawArgumentInfo, ranges);

    /// Size of one encoded range.
    pub const RANGE_SIZE: usize = size_of::<RawArgumentRange>();

    /// Encoded size of a descriptor with `ranges` ranges.
    #[must_use]
    pub const fn size_for(ranges: usize) -> usize {
        Self::HEADER_SIZE + ranges * Self::RANGE_SIZE
    }

    /// Creates a descriptor whose total size is the sum of its ranges.
    #[must_use]
    pub fn from_ranges(ranges: Vec<ArgumentRange>) -> Self {
        let total_size = ranges.iter().map(|r| r.length).sum();
        Self { ranges, total_size }
    }

    /// Decodes a descriptor from the buffer the runtime filled.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the buffer is shorter than the header or than the
    /// number of ranges it announces.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::HEADER_SIZE {
            return Err(malformed_error!(
                "argument descriptor of {} bytes is shorter than its header",
                bytes.len()
            ));
        }

        let num_ranges = read_u32(bytes, offset_of!(RawArgumentInfo, num_ranges));
        let total_size = read_u32(bytes, offset_of!(RawArgumentInfo, total_argument_size));

        let count = num_ranges as usize;
        let needed = count
            .checked_mul(Self::RANGE_SIZE)
            .and_then(|n| n.checked_add(Self::HEADER_SIZE))
            .ok_or_else(|| malformed_error!("argument range count {} overflows", num_ranges))?;
        if bytes.len() < needed {
            return Err(malformed_error!(
                "argument descriptor announces {} ranges ({} bytes) but holds {} bytes",
                num_ranges,
                needed,
                bytes.len()
            ));
        }

        let ranges = (0..count)
            .map(|index| {
                let base = Self::HEADER_SIZE + index * Self::RANGE_SIZE;
                ArgumentRange {
                    start_address: read_usize(
                        bytes,
                        base + offset_of!(RawArgumentRange, start_address),
                    ),
                    length: read_u32(bytes, base + offset_of!(RawArgumentRange, length)),
                }
            })
            .collect();

        Ok(Self { ranges, total_size })
    }

    /// Encodes the descriptor in the runtime's native layout.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; Self::size_for(self.ranges.len())];

        write_bytes(
            &mut bytes,
            offset_of!(RawArgumentInfo, num_ranges),
            &u32::try_from(self.ranges.len())
                .unwrap_or(u32::MAX)
                .to_ne_bytes(),
        );
        write_bytes(
            &mut bytes,
            offset_of!(RawArgumentInfo, total_argument_size),
            &self.total_size.to_ne_bytes(),
        );
        for (index, range) in self.ranges.iter().enumerate() {
            let base = Self::HEADER_SIZE + index * Self::RANGE_SIZE;
            write_bytes(
                &mut bytes,
                base + offset_of!(RawArgumentRange, start_address),
                &range.start_address.to_ne_bytes(),
            );
            write_bytes(
                &mut bytes,
                base + offset_of!(RawArgumentRange, length),
                &range.length.to_ne_bytes(),
            );
        }

        bytes
    }

    /// Sum of all range lengths.
    #[must_use]
    pub fn range_sum(&self) -> u64 {
        self.ranges.iter().map(|r| u64::from(r.length)).sum()
    }

    /// Returns true if the range lengths add up to the reported total size.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.range_sum() == u64::from(self.total_size)
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(raw)
}

fn read_usize(bytes: &[u8], offset: usize) -> usize {
    let mut raw = [0u8; size_of::<usize>()];
    raw.copy_from_slice(&bytes[offset..offset + size_of::<usize>()]);
    usize::from_ne_bytes(raw)
}

fn write_bytes(bytes: &mut [u8], offset: usize, value: &[u8]) {
    bytes[offset..offset + value.len()].copy_from_slice(value);
}

/// An argument descriptor together with the frame it was acquired for.
#[derive(Debug, Clone)]
pub struct AcquiredArguments {
    /// Frame of the current call, needed for the method lookup
    pub frame: FrameInfo,
    /// The decoded descriptor
    pub descriptor: ArgumentDescriptor,
    /// Result of the range-sum check
    pub consistent: bool,
    /// Number of runtime calls issued (1 or 2)
    pub attempts: u32,
}

/// Retrieves the argument descriptor and frame of the current enter event.
///
/// Issues `GetFunctionEnter3Info` with a buffer of `trial_size` bytes and retries once with
/// the size the runtime asks for. A descriptor whose ranges do not add up to its total size is
/// reported to `diagnostics` as a [`DiagnosticCategory::Consistency`] warning and returned with
/// `consistent` cleared.
///
/// # Errors
///
/// Returns the errors of [`query_with_growable_result`] and [`ArgumentDescriptor::parse`].
pub fn acquire_arguments(
    info: &dyn ProfilerInfo,
    function: FunctionId,
    elt: EltInfo,
    trial_size: usize,
    diagnostics: &Diagnostics,
) -> Result<AcquiredArguments> {
    let mut frame = FrameInfo::NULL;
    let outcome = query_with_growable_result("GetFunctionEnter3Info", trial_size, |buffer, size| {
        info.get_function_enter3_info(function, elt, &mut frame, size, buffer)
    })?;

    let descriptor = ArgumentDescriptor::parse(outcome.buffer.as_bytes())?;
    let consistent = descriptor.is_consistent();
    if !consistent {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticSeverity::Warning,
                DiagnosticCategory::Consistency,
                format!(
                    "argument ranges sum to {} bytes but the descriptor reports {}",
                    descriptor.range_sum(),
                    descriptor.total_size
                ),
            )
            .with_function(function),
        );
    }

    log::trace!(
        "function {} has {} argument range(s), {} bytes, {} query call(s)",
        function,
        descriptor.ranges.len(),
        descriptor.total_size,
        outcome.attempts
    );

    Ok(AcquiredArguments {
        frame,
        descriptor,
        consistent,
        attempts: outcome.attempts,
    })
}
