//! Flag sets exchanged with the runtime during attach and metadata access.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Event categories the profiler asks the runtime to deliver (`COR_PRF_MONITOR`)
    pub struct EventMask: u32 {
        /// Function unload notifications
        const MONITOR_FUNCTION_UNLOADS = 0x0000_0001;
        /// Class load notifications
        const MONITOR_CLASS_LOADS = 0x0000_0002;
        /// Module load notifications
        const MONITOR_MODULE_LOADS = 0x0000_0004;
        /// Assembly load notifications
        const MONITOR_ASSEMBLY_LOADS = 0x0000_0008;
        /// JIT compilation notifications
        const MONITOR_JIT_COMPILATION = 0x0000_0020;
        /// Function enter, leave and tailcall hooks
        const MONITOR_ENTERLEAVE = 0x0000_1000;
        /// Argument locations are available from the enter hook
        const ENABLE_FUNCTION_ARGS = 0x0200_0000;
        /// The return value location is available from the leave hook
        const ENABLE_FUNCTION_RETVAL = 0x0400_0000;
        /// Frame information is available from all three hooks
        const ENABLE_FRAME_INFO = 0x0800_0000;
    }
}

impl EventMask {
    /// The categories the tracer needs: hooks plus argument, return value and frame detail.
    #[must_use]
    pub fn tracing() -> Self {
        Self::MONITOR_ENTERLEAVE
            | Self::ENABLE_FUNCTION_ARGS
            | Self::ENABLE_FUNCTION_RETVAL
            | Self::ENABLE_FRAME_INFO
    }

    /// Returns true if the mask asks for the enter/leave/tailcall hooks at all.
    #[must_use]
    pub fn wants_hooks(&self) -> bool {
        self.contains(Self::MONITOR_ENTERLEAVE)
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::tracing()
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// How a module's metadata scope is opened (`CorOpenFlags`)
    pub struct OpenFlags: u32 {
        /// Open for read
        const READ = 0x0000_0000;
        /// Open for read and write
        const WRITE = 0x0000_0001;
    }
}
