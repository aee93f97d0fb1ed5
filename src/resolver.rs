//! Identifier resolution for class, module and method handles.
//!
//! The runtime hands the tracer opaque handles. This module turns them into readable names by
//! walking the runtime's class queries and the per-module metadata scopes:
//!
//! ```text
//! ClassId ──GetClassIDInfo2──► (ModuleId, TypeDef token, [ClassId; N])
//!                                   │             │            │
//!                    GetModuleInfo ◄┘   GetTypeDefProps        └─► recurse, simple style
//!                                   │             │
//!                             "Module" . "Dictionary" < "String", "Int32" >
//! ```
//!
//! Generic type arguments are resolved recursively and always in [`NameStyle::Simple`], so
//! module qualification only ever applies to the outermost name. Three class query outcomes
//! are not failures but pseudo-types with a fixed placeholder name, see [`PseudoType`].
//!
//! # Limits
//!
//! Resolution is bounded in three ways, all taken from [`crate::config::ProfilerConfig`]:
//!
//! - generic arity beyond `max_type_arguments` fails with [`Error::TooManyTypeArguments`]
//! - nesting deeper than `max_resolution_depth` fails with [`Error::RecursionLimit`], and a
//!   handle that reappears as its own (transitive) generic argument fails with
//!   [`Error::CyclicType`]
//! - names longer than `max_name_length` UTF-16 units are truncated
//!
//! # Examples
//!
//! ```rust,no_run
//! use eltscope::{
//!     resolver::{NameResolver, NameStyle, ResolverLimits},
//!     runtime::{ClassId, ProfilerInfo},
//! };
//!
//! fn describe(info: &dyn ProfilerInfo, class: ClassId) -> eltscope::Result<String> {
//!     let resolver = NameResolver::new(info, ResolverLimits::default());
//!     Ok(resolver.class_name(class, NameStyle::Qualified)?.to_string())
//! }
//! ```

use std::fmt;

use widestring::{U16Str, U16String};

use crate::{
    buffer::{query_growable, Attempt},
    config::ProfilerConfig,
    runtime::{
        ClassId, ClassIdInfo, FrameInfo, FunctionId, HResult, ModuleId, OpenFlags, ProfilerInfo,
        Token, IID_IMETADATA_IMPORT,
    },
    Error, Result,
};

/// Whether a class name carries its module prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameStyle {
    /// The type's own name plus generic arguments
    Simple,
    /// `Module.` followed by the simple form
    Qualified,
}

/// Class handles that do not map to a type definition.
///
/// The runtime reports these as failing status codes from `GetClassIDInfo2`, but they are
/// regular states of a class handle and resolve to a fixed placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoType {
    /// An array type
    Array,
    /// A composite type, such as a boxed value type or a pointer
    Composite,
    /// A type whose load has not finished yet
    Incomplete,
}

impl PseudoType {
    /// Maps a class query status to the pseudo-type it denotes.
    #[must_use]
    pub fn from_hresult(hresult: HResult) -> Option<Self> {
        match hresult {
            HResult::CLASSID_IS_ARRAY => Some(PseudoType::Array),
            HResult::CLASSID_IS_COMPOSITE => Some(PseudoType::Composite),
            HResult::DATA_INCOMPLETE => Some(PseudoType::Incomplete),
            _ => None,
        }
    }

    /// The name emitted in place of a resolved class name.
    #[must_use]
    pub fn placeholder(self) -> &'static str {
        match self {
            PseudoType::Array => "ArrayClass",
            PseudoType::Composite => "CompositeClass",
            PseudoType::Incomplete => "DataIncomplete",
        }
    }
}

impl fmt::Display for PseudoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.placeholder())
    }
}

/// A name in the runtime's wide-character encoding.
///
/// Names are built and kept as UTF-16 so that metadata strings pass through unchanged;
/// `Display` converts lossily.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResolvedName(U16String);

impl ResolvedName {
    /// Creates an empty name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends UTF-8 text.
    pub fn push_str(&mut self, text: &str) {
        self.0.push_str(text);
    }

    /// Appends another name.
    pub fn push(&mut self, other: &ResolvedName) {
        self.0.push(&other.0);
    }

    /// Number of UTF-16 units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the name is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The UTF-16 units.
    #[must_use]
    pub fn as_wide(&self) -> &U16Str {
        &self.0
    }

    /// Consumes the name, returning the UTF-16 units.
    #[must_use]
    pub fn into_wide(self) -> U16String {
        self.0
    }
}

impl From<&str> for ResolvedName {
    fn from(value: &str) -> Self {
        Self(U16String::from_str(value))
    }
}

impl From<U16String> for ResolvedName {
    fn from(value: U16String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ResolvedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_string_lossy())
    }
}

impl PartialEq<&str> for ResolvedName {
    fn eq(&self, other: &&str) -> bool {
        self.0.to_string_lossy() == *other
    }
}

/// Bounds applied during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverLimits {
    /// Maximum generic arity of a single class
    pub max_type_arguments: usize,
    /// Capacity of name buffers in UTF-16 units, including the terminator
    pub max_name_length: usize,
    /// Maximum generic nesting depth
    pub max_depth: usize,
}

impl Default for ResolverLimits {
    fn default() -> Self {
        ResolverLimits::from(&ProfilerConfig::default())
    }
}

impl From<&ProfilerConfig> for ResolverLimits {
    fn from(config: &ProfilerConfig) -> Self {
        ResolverLimits {
            max_type_arguments: config.max_type_arguments,
            max_name_length: config.max_name_length,
            max_depth: config.max_resolution_depth,
        }
    }
}

/// The resolved identity of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodName {
    /// Name of the method definition
    pub name: ResolvedName,
    /// Class the function belongs to, null for global functions
    pub class: ClassId,
    /// Module the method is defined in
    pub module: ModuleId,
    /// `mdMethodDef` of the method
    pub token: Token,
}

enum ClassQuery {
    Pseudo(PseudoType),
    Defined(ClassIdInfo, Vec<ClassId>),
}

/// Resolves handles into names through a [`ProfilerInfo`].
///
/// The resolver holds no state besides the borrowed runtime and its limits, so one instance
/// per event is as cheap as a shared one.
pub struct NameResolver<'a> {
    info: &'a dyn ProfilerInfo,
    limits: ResolverLimits,
}

impl<'a> NameResolver<'a> {
    /// Creates a resolver over `info`.
    #[must_use]
    pub fn new(info: &'a dyn ProfilerInfo, limits: ResolverLimits) -> Self {
        NameResolver { info, limits }
    }

    /// The limits in effect.
    #[must_use]
    pub fn limits(&self) -> ResolverLimits {
        self.limits
    }

    /// Resolves a class handle into its name.
    ///
    /// # Errors
    ///
    /// - [`Error::Query`] if a class, module or metadata query fails, or `class` is null
    /// - [`Error::TooManyTypeArguments`], [`Error::RecursionLimit`] or [`Error::CyclicType`]
    ///   if a resolution limit is hit anywhere in the generic argument tree
    pub fn class_name(&self, class: ClassId, style: NameStyle) -> Result<ResolvedName> {
        let mut ancestors = Vec::new();
        self.resolve_class(class, style, &mut ancestors)
    }

    fn resolve_class(
        &self,
        class: ClassId,
        style: NameStyle,
        ancestors: &mut Vec<ClassId>,
    ) -> Result<ResolvedName> {
        if class.is_null() {
            return Err(query_error!("GetClassIDInfo2", HResult::E_FAIL));
        }
        if ancestors.contains(&class) {
            return Err(Error::CyclicType(class));
        }
        if ancestors.len() >= self.limits.max_depth {
            return Err(Error::RecursionLimit(self.limits.max_depth));
        }

        let (info, type_args) = match self.query_class(class)? {
            ClassQuery::Pseudo(pseudo) => return Ok(ResolvedName::from(pseudo.placeholder())),
            ClassQuery::Defined(info, type_args) => (info, type_args),
        };

        let metadata = self
            .info
            .get_module_metadata(
                info.module,
                OpenFlags::READ | OpenFlags::WRITE,
                IID_IMETADATA_IMPORT,
            )
            .map_err(|hr| query_error!("GetModuleMetaData", hr))?;
        let simple = self.read_name("GetTypeDefProps", |buffer| {
            metadata
                .get_type_def_props(info.token, buffer)
                .map(|props| props.name_len)
        })?;

        let mut name = ResolvedName::new();
        if style == NameStyle::Qualified {
            name.push(&self.module_name(info.module)?);
            name.push_str(".");
        }
        name.push(&simple);

        if !type_args.is_empty() {
            ancestors.push(class);
            name.push_str("<");
            for (index, arg) in type_args.iter().enumerate() {
                if index > 0 {
                    name.push_str(", ");
                }
                name.push(&self.resolve_class(*arg, NameStyle::Simple, ancestors)?);
            }
            name.push_str(">");
            ancestors.pop();
        }

        Ok(name)
    }

    fn query_class(&self, class: ClassId) -> Result<ClassQuery> {
        let limit = self.limits.max_type_arguments;
        let outcome = query_growable(
            "GetClassIDInfo2",
            limit.min(4),
            limit,
            |type_args: &mut Vec<ClassId>| {
                let info = self
                    .info
                    .get_class_id_info2(class, type_args.as_mut_slice())
                    .map_err(|hr| query_error!("GetClassIDInfo2", hr))?;
                if info.type_arg_count > limit {
                    return Err(Error::TooManyTypeArguments {
                        count: info.type_arg_count,
                        limit,
                    });
                }
                if info.type_arg_count > type_args.len() {
                    return Ok(Attempt::TooSmall {
                        required: info.type_arg_count,
                    });
                }
                Ok(Attempt::Complete {
                    used: info.type_arg_count,
                    value: info,
                })
            },
        );

        match outcome {
            Ok(grown) => Ok(ClassQuery::Defined(grown.value, grown.buffer)),
            Err(error) => match error.hresult().and_then(PseudoType::from_hresult) {
                Some(pseudo) => Ok(ClassQuery::Pseudo(pseudo)),
                None => Err(error),
            },
        }
    }

    /// Resolves a module handle into its file name without directory and extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] if the module query fails.
    pub fn module_name(&self, module: ModuleId) -> Result<ResolvedName> {
        let path = self.read_name("GetModuleInfo", |buffer| {
            self.info
                .get_module_info(module, buffer)
                .map(|info| info.name_len)
        })?;
        Ok(ResolvedName::from(module_stem(path.as_wide().as_slice())))
    }

    /// Resolves a function handle in the context of `frame` into its method name.
    ///
    /// The function's class is returned unresolved so the caller can decide whether to spend
    /// the additional queries on it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Query`] if the function, metadata or method query fails.
    pub fn method_name(&self, function: FunctionId, frame: FrameInfo) -> Result<MethodName> {
        let info = self
            .info
            .get_function_info2(function, frame, &mut [])
            .map_err(|hr| query_error!("GetFunctionInfo2", hr))?;

        let metadata = self
            .info
            .get_module_metadata(info.module, OpenFlags::READ, IID_IMETADATA_IMPORT)
            .map_err(|hr| query_error!("GetModuleMetaData", hr))?;
        let name = self.read_name("GetMethodProps", |buffer| {
            metadata
                .get_method_props(info.token, buffer)
                .map(|props| props.name_len)
        })?;

        Ok(MethodName {
            name,
            class: info.class,
            module: info.module,
            token: info.token,
        })
    }

    fn read_name<F>(&self, call: &'static str, query: F) -> Result<ResolvedName>
    where
        F: FnOnce(&mut [u16]) -> std::result::Result<usize, HResult>,
    {
        let mut buffer = vec![0u16; self.limits.max_name_length];
        let required = query(&mut buffer).map_err(|hr| query_error!(call, hr))?;

        let end = buffer
            .iter()
            .position(|unit| *unit == 0)
            .unwrap_or(buffer.len());
        if required > buffer.len() {
            log::debug!(
                "{} name truncated to {} of {} units",
                call,
                end,
                required.saturating_sub(1)
            );
        }

        buffer.truncate(end);
        Ok(ResolvedName(U16String::from_vec(buffer)))
    }
}

fn module_stem(path: &[u16]) -> U16String {
    let file = match path
        .iter()
        .rposition(|unit| *unit == u16::from(b'/') || *unit == u16::from(b'\\'))
    {
        Some(separator) => &path[separator + 1..],
        None => path,
    };
    let stem = match file.iter().rposition(|unit| *unit == u16::from(b'.')) {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    U16String::from_vec(stem.to_vec())
}
