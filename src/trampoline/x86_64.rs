//! x86_64 trampolines.
//!
//! System V frame (336 bytes below the saved rbp):
//!
//! ```text
//! [rsp +   0 .. 256)  xmm0 - xmm15
//! [rsp + 256 .. 328)  rax, rdi, rsi, rdx, rcx, r8, r9, r10, r11
//! ```
//!
//! Windows frame (192 bytes below the saved rbp):
//!
//! ```text
//! [rsp +   0 ..  32)  shadow space of the stub call
//! [rsp +  32 .. 128)  xmm0 - xmm5
//! [rsp + 128 .. 184)  rax, rcx, rdx, r8, r9, r10, r11
//! ```
//!
//! Both frames keep rsp 16-byte aligned at the stub call. The argument registers are saved but
//! never modified before the call, so the stub receives the runtime's arguments as-is.

use crate::runtime::{EltInfo, FunctionIdOrClientId};

#[cfg(not(windows))]
macro_rules! trampoline {
    ($name:ident => $stub:path) => {
        #[unsafe(naked)]
        pub(crate) unsafe extern "system" fn $name(_id: FunctionIdOrClientId, _elt: EltInfo) {
            core::arch::naked_asm!(
                "push rbp",
                "mov rbp, rsp",
                "sub rsp, 336",
                "movdqu [rsp + 0], xmm0",
                "movdqu [rsp + 16], xmm1",
                "movdqu [rsp + 32], xmm2",
                "movdqu [rsp + 48], xmm3",
                "movdqu [rsp + 64], xmm4",
                "movdqu [rsp + 80], xmm5",
                "movdqu [rsp + 96], xmm6",
                "movdqu [rsp + 112], xmm7",
                "movdqu [rsp + 128], xmm8",
                "movdqu [rsp + 144], xmm9",
                "movdqu [rsp + 160], xmm10",
                "movdqu [rsp + 176], xmm11",
                "movdqu [rsp + 192], xmm12",
                "movdqu [rsp + 208], xmm13",
                "movdqu [rsp + 224], xmm14",
                "movdqu [rsp + 240], xmm15",
                "mov [rsp + 256], rax",
                "mov [rsp + 264], rdi",
                "mov [rsp + 272], rsi",
                "mov [rsp + 280], rdx",
                "mov [rsp + 288], rcx",
                "mov [rsp + 296], r8",
                "mov [rsp + 304], r9",
                "mov [rsp + 312], r10",
                "mov [rsp + 320], r11",
                "call {stub}",
                "mov r11, [rsp + 320]",
                "mov r10, [rsp + 312]",
                "mov r9, [rsp + 304]",
                "mov r8, [rsp + 296]",
                "mov rcx, [rsp + 288]",
                "mov rdx, [rsp + 280]",
                "mov rsi, [rsp + 272]",
                "mov rdi, [rsp + 264]",
                "mov rax, [rsp + 256]",
                "movdqu xmm15, [rsp + 240]",
                "movdqu xmm14, [rsp + 224]",
                "movdqu xmm13, [rsp + 208]",
                "movdqu xmm12, [rsp + 192]",
                "movdqu xmm11, [rsp + 176]",
                "movdqu xmm10, [rsp + 160]",
                "movdqu xmm9, [rsp + 144]",
                "movdqu xmm8, [rsp + 128]",
                "movdqu xmm7, [rsp + 112]",
                "movdqu xmm6, [rsp + 96]",
                "movdqu xmm5, [rsp + 80]",
                "movdqu xmm4, [rsp + 64]",
                "movdqu xmm3, [rsp + 48]",
                "movdqu xmm2, [rsp + 32]",
                "movdqu xmm1, [rsp + 16]",
                "movdqu xmm0, [rsp + 0]",
                "add rsp, 336",
                "pop rbp",
                "ret",
                stub = sym $stub,
            )
        }
    };
}

#[cfg(windows)]
macro_rules! trampoline {
    ($name:ident => $stub:path) => {
        #[unsafe(naked)]
        pub(crate) unsafe extern "system" fn $name(_id: FunctionIdOrClientId, _elt: EltInfo) {
            core::arch::naked_asm!(
                "push rbp",
                "mov rbp, rsp",
                "sub rsp, 192",
                "movdqu [rsp + 32], xmm0",
                "movdqu [rsp + 48], xmm1",
                "movdqu [rsp + 64], xmm2",
                "movdqu [rsp + 80], xmm3",
                "movdqu [rsp + 96], xmm4",
                "movdqu [rsp + 112], xmm5",
                "mov [rsp + 128], rax",
                "mov [rsp + 136], rcx",
                "mov [rsp + 144], rdx",
                "mov [rsp + 152], r8",
                "mov [rsp + 160], r9",
                "mov [rsp + 168], r10",
                "mov [rsp + 176], r11",
                "call {stub}",
                "mov r11, [rsp + 176]",
                "mov r10, [rsp + 168]",
                "mov r9, [rsp + 160]",
                "mov r8, [rsp + 152]",
                "mov rdx, [rsp + 144]",
                "mov rcx, [rsp + 136]",
                "mov rax, [rsp + 128]",
                "movdqu xmm5, [rsp + 112]",
                "movdqu xmm4, [rsp + 96]",
                "movdqu xmm3, [rsp + 80]",
                "movdqu xmm2, [rsp + 64]",
                "movdqu xmm1, [rsp + 48]",
                "movdqu xmm0, [rsp + 32]",
                "add rsp, 192",
                "pop rbp",
                "ret",
                stub = sym $stub,
            )
        }
    };
}

trampoline!(enter_naked => super::enter_stub);
trampoline!(leave_naked => super::leave_stub);
trampoline!(tailcall_naked => super::tailcall_stub);
