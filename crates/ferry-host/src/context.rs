//! HostContext trait: the Host object protocol
//!
//! Defines the operations the bridge consumes from the Host interpreter.
//! The bridge programs against this trait only; [`HostInterp`](crate::HostInterp)
//! is the in-process implementation.

use std::sync::Arc;

use crate::error::HostResult;
use crate::value::{HostClass, HostValue, NativePayload};

/// Abstract Host interpreter context.
///
/// Every call is synchronous and may re-enter the bridge: a message send can
/// run Host code that calls back into the Guest runtime on the same thread.
/// Implementations must not hold internal locks while a method body runs.
pub trait HostContext: Send + Sync {
    // ========================================================================
    // Singletons
    // ========================================================================

    /// The Host `nil` value
    fn nil(&self) -> HostValue {
        HostValue::Nil
    }

    // ========================================================================
    // Class Operations
    // ========================================================================

    /// Find a class by name (case-insensitive)
    fn find_class(&self, name: &str) -> Option<Arc<HostClass>>;

    /// Register a class, replacing any class with the same name
    fn register_class(&self, class: HostClass) -> Arc<HostClass>;

    /// Class of any Host value (`String`, `Array`, `NilObject`, or the object's class)
    fn class_of(&self, value: &HostValue) -> Arc<HostClass>;

    /// Check whether `value` is an instance of `class` or one of its subclasses
    fn is_instance_of(&self, value: &HostValue, class: &HostClass) -> bool {
        self.class_of(value).is_subclass_of(class)
    }

    // ========================================================================
    // Object Operations
    // ========================================================================

    /// Create a new instance of `class`, optionally carrying native data
    fn new_object(&self, class: &Arc<HostClass>, native: Option<NativePayload>) -> HostValue;

    /// Send `message` to `receiver` with positional arguments
    fn send(&self, receiver: &HostValue, message: &str, args: &[HostValue]) -> HostResult<HostValue>;

    // ========================================================================
    // Sequence Operations
    // ========================================================================

    /// Number of items in an array
    fn array_len(&self, value: &HostValue) -> HostResult<usize>;

    /// Item at a zero-based index
    fn array_at(&self, value: &HostValue, index: usize) -> HostResult<HostValue>;
}
