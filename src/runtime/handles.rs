//! Opaque handles issued by the execution engine.
//!
//! All handles are pointer-sized values owned by the runtime. The tracer only copies them
//! around and hands them back to the runtime's query interfaces; it never dereferences or frees
//! them. [`FrameInfo`] and [`EltInfo`] are additionally only valid for the duration of the
//! enter/leave/tailcall callback that produced them.

use std::fmt;

macro_rules! engine_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(pub usize);

        impl $name {
            /// The null handle.
            pub const NULL: Self = Self(0);

            /// Returns the raw handle value.
            #[must_use]
            pub fn value(&self) -> usize {
                self.0
            }

            /// Returns true if the handle is null.
            #[must_use]
            pub fn is_null(&self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "(0x{:x})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:x}", self.0)
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self(value)
            }
        }
    };
}

engine_handle!(
    /// Identifies a compiled function. Stable for the lifetime of the compiled method.
    FunctionId
);
engine_handle!(
    /// A correlation value returned by a client-installed function id mapper.
    ClientId
);
engine_handle!(
    /// Identifies a loaded class, including each distinct generic instantiation.
    ClassId
);
engine_handle!(
    /// Identifies a loaded module.
    ModuleId
);
engine_handle!(
    /// Identifies one activation of a function. Only valid inside the event that produced it.
    FrameInfo
);
engine_handle!(
    /// Opaque per-event token handed to the enter/leave/tailcall hooks.
    EltInfo
);

/// The first argument of every enter/leave/tailcall hook.
///
/// The runtime passes the raw [`FunctionId`] unless a function id mapper was installed, in
/// which case it passes whatever [`ClientId`] the mapper returned for that function. Both
/// members are pointer sized, so every bit pattern is valid for either reading.
#[derive(Clone, Copy)]
#[repr(C)]
pub union FunctionIdOrClientId {
    /// The runtime's function handle.
    pub function_id: FunctionId,
    /// The value returned by the client's function id mapper.
    pub client_id: ClientId,
}

impl FunctionIdOrClientId {
    /// Wraps a function handle.
    #[must_use]
    pub fn from_function(function_id: FunctionId) -> Self {
        Self { function_id }
    }

    /// Wraps a client correlation value.
    #[must_use]
    pub fn from_client(client_id: ClientId) -> Self {
        Self { client_id }
    }

    /// Returns the raw pointer-sized value regardless of interpretation.
    #[must_use]
    pub fn raw(&self) -> usize {
        // SAFETY: both members are `repr(transparent)` over `usize`
        unsafe { self.function_id.0 }
    }

    /// Interprets the value according to whether a function id mapper is active.
    #[must_use]
    pub fn callee(&self, mapper_installed: bool) -> Callee {
        if mapper_installed {
            Callee::Client(ClientId(self.raw()))
        } else {
            Callee::Function(FunctionId(self.raw()))
        }
    }
}

impl fmt::Debug for FunctionIdOrClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionIdOrClientId(0x{:x})", self.raw())
    }
}

/// Safe view of [`FunctionIdOrClientId`] once the active interpretation is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callee {
    /// The runtime's own function handle.
    Function(FunctionId),
    /// A client correlation value.
    Client(ClientId),
}

impl Callee {
    /// Returns the function handle, if this is not a client value.
    #[must_use]
    pub fn function(&self) -> Option<FunctionId> {
        match self {
            Callee::Function(id) => Some(*id),
            Callee::Client(_) => None,
        }
    }

    /// Returns the raw value for display purposes.
    #[must_use]
    pub fn raw(&self) -> usize {
        match self {
            Callee::Function(id) => id.0,
            Callee::Client(id) => id.0,
        }
    }
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Function(id) => write!(f, "{}", id.0),
            Callee::Client(id) => write!(f, "client:{}", id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        let class = ClassId(0x7ff0_1234);
        assert_eq!(class.to_string(), "0x7ff01234");
        assert_eq!(format!("{class:?}"), "ClassId(0x7ff01234)");
        assert!(ClassId::NULL.is_null());
        assert!(!class.is_null());
    }

    #[test]
    fn test_union_views() {
        let id = FunctionIdOrClientId::from_function(FunctionId(0x1000));
        assert_eq!(id.raw(), 0x1000);
        assert_eq!(id.callee(false), Callee::Function(FunctionId(0x1000)));
        assert_eq!(id.callee(true), Callee::Client(ClientId(0x1000)));

        let client = FunctionIdOrClientId::from_client(ClientId(42));
        assert_eq!(client.callee(true).function(), None);
        assert_eq!(client.callee(true).raw(), 42);
    }

    #[test]
    fn test_union_is_pointer_sized() {
        assert_eq!(
            std::mem::size_of::<FunctionIdOrClientId>(),
            std::mem::size_of::<usize>()
        );
    }

    #[test]
    fn test_callee_display() {
        assert_eq!(Callee::Function(FunctionId(255)).to_string(), "255");
        assert_eq!(Callee::Client(ClientId(7)).to_string(), "client:7");
    }
}
