//! x86 (Windows, `stdcall`) trampolines.
//!
//! Both hook arguments are passed on the stack and popped by the callee. After the three
//! volatile registers are pushed, the arguments sit at `[esp + 16]` and `[esp + 20]`; they are
//! pushed again in reverse order for the stub, which pops them itself.

use crate::runtime::{EltInfo, FunctionIdOrClientId};

macro_rules! trampoline {
    ($name:ident => $stub:path) => {
        #[unsafe(naked)]
        pub(crate) unsafe extern "system" fn $name(_id: FunctionIdOrClientId, _elt: EltInfo) {
            core::arch::naked_asm!(
                "push eax",
                "push ecx",
                "push edx",
                "push dword ptr [esp + 20]",
                "push dword ptr [esp + 20]",
                "call {stub}",
                "pop edx",
                "pop ecx",
                "pop eax",
                "ret 8",
                stub = sym $stub,
            )
        }
    };
}

trampoline!(enter_naked => super::enter_stub);
trampoline!(leave_naked => super::leave_stub);
trampoline!(tailcall_naked => super::tailcall_stub);
