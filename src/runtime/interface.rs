//! The runtime services the tracer consumes.
//!
//! The execution engine exposes two query surfaces to an attached profiler:
//!
//! - [`ProfilerInfo`] - process-wide queries about compiled functions, classes and modules,
//!   plus the one-time registration calls made during attach
//! - [`MetadataImport`] - per-module metadata lookups by token
//!
//! Both are modelled as object-safe traits so the handlers and resolver can be driven by the
//! real runtime binding or by a scripted test double. Implementations must be callable from
//! any number of threads at once; the runtime defines these read-style queries as thread-safe.
//!
//! Calls keep the runtime's status-code convention: failures are reported as [`HResult`]
//! values and interpreted by the caller, because several failure codes are not errors at all
//! (see [`crate::resolver::PseudoType`]).

use std::sync::Arc;

use uguid::{guid, Guid};

use crate::runtime::{
    ClassId, EltInfo, EventMask, FrameInfo, FunctionId, FunctionIdOrClientId, HResult, ModuleId,
    OpenFlags, Token,
};

/// Interface id of `ICorProfilerInfo8`, the runtime interface the tracer attaches to.
pub const IID_ICOR_PROFILER_INFO8: Guid = guid!("c5ac80a6-782e-4716-8044-39598c60cfbf");

/// Interface id of `IMetaDataImport`, passed to [`ProfilerInfo::get_module_metadata`] for
/// every metadata scope the resolver opens.
pub const IID_IMETADATA_IMPORT: Guid = guid!("7dac8207-d3ae-4c75-9b67-92801a497d44");

/// Signature of the three hooks installed with `SetEnterLeaveFunctionHooks3WithInfo`.
pub type EltHookFn = unsafe extern "system" fn(FunctionIdOrClientId, EltInfo);

/// The enter, leave and tailcall hook addresses handed to the runtime.
#[derive(Clone, Copy, Debug)]
pub struct EltHooks {
    /// Called on entry to every instrumented function
    pub enter: EltHookFn,
    /// Called on normal return from every instrumented function
    pub leave: EltHookFn,
    /// Called when an instrumented function performs a tail call
    pub tailcall: EltHookFn,
}

/// Result of a class query (`GetClassIDInfo2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassIdInfo {
    /// Module the class is defined in
    pub module: ModuleId,
    /// `mdTypeDef` of the class inside `module`
    pub token: Token,
    /// Parent class, null for `System.Object` and interfaces
    pub parent: ClassId,
    /// Number of generic type arguments. May exceed the capacity of the slice handed to the
    /// query, in which case only the first `capacity` entries were written.
    pub type_arg_count: usize,
}

/// Result of a function query (`GetFunctionInfo2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionInfo {
    /// Class the function belongs to
    pub class: ClassId,
    /// Module the function is defined in
    pub module: ModuleId,
    /// `mdMethodDef` of the function inside `module`
    pub token: Token,
    /// Number of generic method type arguments
    pub type_arg_count: usize,
}

/// Result of a module query (`GetModuleInfo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Address the module is loaded at
    pub base_address: usize,
    /// Length of the module's file name in UTF-16 units, including the terminating NUL
    pub name_len: usize,
}

/// Result of a type definition lookup (`GetTypeDefProps`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeDefProps {
    /// Length of the type name in UTF-16 units, including the terminating NUL
    pub name_len: usize,
    /// `CorTypeAttr` flags
    pub flags: u32,
    /// Token of the base type
    pub extends: Token,
}

/// Result of a method definition lookup (`GetMethodProps`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodProps {
    /// `mdTypeDef` of the declaring class
    pub class: Token,
    /// Length of the method name in UTF-16 units, including the terminating NUL
    pub name_len: usize,
    /// `CorMethodAttr` flags
    pub attributes: u32,
}

/// Process-wide runtime query interface.
///
/// Name-returning calls follow the runtime convention: they write at most `name.len()` UTF-16
/// units including a terminating NUL and report the full required length, so callers can
/// detect truncation without ever writing past their buffer.
pub trait ProfilerInfo: Send + Sync {
    /// Selects which event categories the runtime delivers.
    fn set_event_mask(&self, mask: EventMask) -> HResult;

    /// Installs the enter, leave and tailcall hooks.
    fn set_enter_leave_function_hooks3_with_info(&self, hooks: EltHooks) -> HResult;

    /// Queries a class handle. Generic type arguments are written to `type_args`.
    ///
    /// # Errors
    ///
    /// Returns the runtime's status code on failure, including the pseudo-type sentinels.
    fn get_class_id_info2(
        &self,
        class: ClassId,
        type_args: &mut [ClassId],
    ) -> Result<ClassIdInfo, HResult>;

    /// Queries a function handle in the context of one frame.
    ///
    /// # Errors
    ///
    /// Returns the runtime's status code on failure.
    fn get_function_info2(
        &self,
        function: FunctionId,
        frame: FrameInfo,
        type_args: &mut [ClassId],
    ) -> Result<FunctionInfo, HResult>;

    /// Retrieves frame information and the argument descriptor of the current enter event.
    ///
    /// `size` is in/out: on input the capacity of `buffer`, on output the number of bytes
    /// used or, when [`HResult::INSUFFICIENT_BUFFER`] is returned, the number required.
    fn get_function_enter3_info(
        &self,
        function: FunctionId,
        elt: EltInfo,
        frame: &mut FrameInfo,
        size: &mut u32,
        buffer: &mut [u8],
    ) -> HResult;

    /// Queries a module handle, writing the module's file name to `name`.
    ///
    /// # Errors
    ///
    /// Returns the runtime's status code on failure.
    fn get_module_info(&self, module: ModuleId, name: &mut [u16]) -> Result<ModuleInfo, HResult>;

    /// Opens the metadata scope of a module through the interface `iid`.
    ///
    /// # Errors
    ///
    /// Returns the runtime's status code on failure, `E_NOINTERFACE` if the scope does not
    /// support `iid`.
    fn get_module_metadata(
        &self,
        module: ModuleId,
        flags: OpenFlags,
        iid: Guid,
    ) -> Result<Arc<dyn MetadataImport>, HResult>;
}

/// Metadata lookups within one module scope.
pub trait MetadataImport: Send + Sync {
    /// Looks up a type definition, writing its name to `name`.
    ///
    /// # Errors
    ///
    /// Returns the runtime's status code on failure.
    fn get_type_def_props(&self, token: Token, name: &mut [u16]) -> Result<TypeDefProps, HResult>;

    /// Looks up a method definition, writing its name to `name`.
    ///
    /// # Errors
    ///
    /// Returns the runtime's status code on failure.
    fn get_method_props(&self, token: Token, name: &mut [u16]) -> Result<MethodProps, HResult>;
}
