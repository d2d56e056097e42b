//! Crate error type plus the two ways of attaching context to it while it
//! travels up from a walk, a dump or a delivery.

use std::fmt::Debug;
pub mod error;
pub mod result;

/// Wraps an error with the debug form of the object being worked on (a root
/// path, a database name) and the function that failed.
pub trait WithDebugObjectAndFnName<S: Into<String>, O: Debug + 'static> {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self;
}

/// Wraps an error with a human readable line on top.
pub trait WithMsg<S: Into<String>> {
    fn with_msg(self, msg: S) -> Self;
}
