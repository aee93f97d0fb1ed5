//! Types and interfaces shared with the execution engine.
//!
//! This module contains everything the tracer exchanges with the runtime: the opaque handle
//! types, metadata tokens, status codes, registration flags, and the two query interfaces
//! ([`ProfilerInfo`] and [`MetadataImport`]) through which all runtime state is read.
//!
//! # Key Components
//!
//! - [`handles`] - `FunctionId`, `ClassId`, `ModuleId`, `FrameInfo`, `EltInfo` and the
//!   function/client id union passed to every hook
//! - [`token`] - metadata tokens
//! - [`hresult`] - status codes and the sentinels with special meaning
//! - [`flags`] - event mask and metadata open flags
//! - [`interface`] - the runtime query traits

pub mod flags;
pub mod handles;
pub mod hresult;
pub mod interface;
pub mod token;

pub use flags::{EventMask, OpenFlags};
pub use handles::{
    Callee, ClassId, ClientId, EltInfo, FrameInfo, FunctionId, FunctionIdOrClientId, ModuleId,
};
pub use hresult::HResult;
pub use interface::{
    ClassIdInfo, EltHookFn, EltHooks, FunctionInfo, MetadataImport, MethodProps, ModuleInfo,
    ProfilerInfo, TypeDefProps, IID_ICOR_PROFILER_INFO8, IID_IMETADATA_IMPORT,
};
pub use token::{Token, TokenKind};
pub use uguid::Guid;
