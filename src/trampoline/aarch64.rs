//! aarch64 trampolines.
//!
//! Frame (656 bytes below the saved x29/x30 pair):
//!
//! ```text
//! [sp +   0 .. 144)  x0 - x17
//! [sp + 144 .. 656)  q0 - q31
//! ```
//!
//! x18 is the platform register and is left alone.

use crate::runtime::{EltInfo, FunctionIdOrClientId};

macro_rules! trampoline {
    ($name:ident => $stub:path) => {
        #[unsafe(naked)]
        pub(crate) unsafe extern "system" fn $name(_id: FunctionIdOrClientId, _elt: EltInfo) {
            core::arch::naked_asm!(
                "stp x29, x30, [sp, #-16]!",
                "mov x29, sp",
                "sub sp, sp, #656",
                "stp x0, x1, [sp, #0]",
                "stp x2, x3, [sp, #16]",
                "stp x4, x5, [sp, #32]",
                "stp x6, x7, [sp, #48]",
                "stp x8, x9, [sp, #64]",
                "stp x10, x11, [sp, #80]",
                "stp x12, x13, [sp, #96]",
                "stp x14, x15, [sp, #112]",
                "stp x16, x17, [sp, #128]",
                "stp q0, q1, [sp, #144]",
                "stp q2, q3, [sp, #176]",
                "stp q4, q5, [sp, #208]",
                "stp q6, q7, [sp, #240]",
                "stp q8, q9, [sp, #272]",
                "stp q10, q11, [sp, #304]",
                "stp q12, q13, [sp, #336]",
                "stp q14, q15, [sp, #368]",
                "stp q16, q17, [sp, #400]",
                "stp q18, q19, [sp, #432]",
                "stp q20, q21, [sp, #464]",
                "stp q22, q23, [sp, #496]",
                "stp q24, q25, [sp, #528]",
                "stp q26, q27, [sp, #560]",
                "stp q28, q29, [sp, #592]",
                "stp q30, q31, [sp, #624]",
                "bl {stub}",
                "ldp q30, q31, [sp, #624]",
                "ldp q28, q29, [sp, #592]",
                "ldp q26, q27, [sp, #560]",
                "ldp q24, q25, [sp, #528]",
                "ldp q22, q23, [sp, #496]",
                "ldp q20, q21, [sp, #464]",
                "ldp q18, q19, [sp, #432]",
                "ldp q16, q17, [sp, #400]",
                "ldp q14, q15, [sp, #368]",
                "ldp q12, q13, [sp, #336]",
                "ldp q10, q11, [sp, #304]",
                "ldp q8, q9, [sp, #272]",
                "ldp q6, q7, [sp, #240]",
                "ldp q4, q5, [sp, #208]",
                "ldp q2, q3, [sp, #176]",
                "ldp q0, q1, [sp, #144]",
                "ldp x16, x17, [sp, #128]",
                "ldp x14, x15, [sp, #112]",
                "ldp x12, x13, [sp, #96]",
                "ldp x10, x11, [sp, #80]",
                "ldp x8, x9, [sp, #64]",
                "ldp x6, x7, [sp, #48]",
                "ldp x4, x5, [sp, #32]",
                "ldp x2, x3, [sp, #16]",
                "ldp x0, x1, [sp, #0]",
                "add sp, sp, #656",
                "ldp x29, x30, [sp], #16",
                "ret",
                stub = sym $stub,
            )
        }
    };
}

trampoline!(enter_naked => super::enter_stub);
trampoline!(leave_naked => super::leave_stub);
trampoline!(tailcall_naked => super::tailcall_stub);
