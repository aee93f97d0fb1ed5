//! Test doubles for the runtime interfaces and event sinks.


pub use runtime::*;
pub use sink::*;
