//! Native entry points for the runtime's enter, leave and tailcall hooks.
//!
//! The runtime calls these three functions directly from JIT-compiled code, on every thread,
//! for every instrumented call. At that point the caller's volatile registers still hold live
//! values (argument registers of the call being made, return values of the call returning), so
//! each entry point is a naked trampoline that:
//!
//! 1. establishes its own frame
//! 2. saves every volatile general-purpose and vector register
//! 3. calls a regular `extern "system"` stub with the function id and event info untouched
//! 4. restores the saved registers bit for bit and returns
//!
//! Only the trampolines differ per target; the stubs and everything behind them are
//! architecture independent. The stubs look up the attached [`ProfilerContext`] and hand the
//! event to [`ProfilerContext::dispatch`], which never lets a panic unwind into the runtime.
//!
//! | Target | Convention | Saved |
//! |---|---|---|
//! | x86_64 (System V) | `extern "C"` | rax, rcx, rdx, rsi, rdi, r8-r11, xmm0-15 |
//! | x86_64 (Windows) | `extern "system"` | rax, rcx, rdx, r8-r11, xmm0-5 |
//! | aarch64 | AAPCS64 | x0-x17, q0-q31 |
//! | x86 (Windows) | `stdcall`, callee pops 8 bytes | eax, ecx, edx |
//!
//! On any other target no hooks are available; [`NativeAdapter::hooks`] returns `None` and
//! attach records the registration as failed.

use crate::{
    context::ProfilerContext,
    events::EventKind,
    runtime::{EltHooks, EltInfo, FunctionIdOrClientId},
};

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(all(target_arch = "x86", windows))]
mod x86;
#[cfg(target_arch = "x86_64")]
mod x86_64;

#[cfg(target_arch = "aarch64")]
use aarch64 as arch;
#[cfg(all(target_arch = "x86", windows))]
use x86 as arch;
#[cfg(target_arch = "x86_64")]
use x86_64 as arch;

/// Supplies the hook addresses registered with the runtime.
///
/// This is the only architecture-dependent seam of the tracer.
pub trait CallFrameAdapter: Send + Sync {
    /// Human-readable name of the calling convention.
    fn name(&self) -> &'static str;

    /// The enter, leave and tailcall entry points, or `None` if the target has none.
    fn hooks(&self) -> Option<EltHooks>;
}

/// The trampolines compiled for the current target.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeAdapter;

impl CallFrameAdapter for NativeAdapter {
    fn name(&self) -> &'static str {
        if cfg!(all(target_arch = "x86_64", windows)) {
            "x86_64-windows"
        } else if cfg!(target_arch = "x86_64") {
            "x86_64-sysv"
        } else if cfg!(target_arch = "aarch64") {
            "aarch64"
        } else if cfg!(all(target_arch = "x86", windows)) {
            "x86-stdcall"
        } else {
            "unsupported"
        }
    }

    #[cfg(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        all(target_arch = "x86", windows)
    ))]
    fn hooks(&self) -> Option<EltHooks> {
        Some(EltHooks {
            enter: arch::enter_naked,
            leave: arch::leave_naked,
            tailcall: arch::tailcall_naked,
        })
    }

    #[cfg(not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        all(target_arch = "x86", windows)
    )))]
    fn hooks(&self) -> Option<EltHooks> {
        None
    }
}

#[cfg_attr(
    not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        all(target_arch = "x86", windows)
    )),
    allow(dead_code)
)]
pub(crate) extern "system" fn enter_stub(id: FunctionIdOrClientId, elt: EltInfo) {
    dispatch(EventKind::Enter, id, elt);
}

#[cfg_attr(
    not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        all(target_arch = "x86", windows)
    )),
    allow(dead_code)
)]
pub(crate) extern "system" fn leave_stub(id: FunctionIdOrClientId, elt: EltInfo) {
    dispatch(EventKind::Leave, id, elt);
}

#[cfg_attr(
    not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        all(target_arch = "x86", windows)
    )),
    allow(dead_code)
)]
pub(crate) extern "system" fn tailcall_stub(id: FunctionIdOrClientId, elt: EltInfo) {
    dispatch(EventKind::Tailcall, id, elt);
}

fn dispatch(kind: EventKind, id: FunctionIdOrClientId, elt: EltInfo) {
    if let Some(context) = ProfilerContext::current() {
        context.dispatch(kind, id, elt);
    }
}
