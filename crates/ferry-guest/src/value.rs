//! GuestValue: an owned reference to a Guest object
//!
//! Holding a `GuestValue` keeps one reference on the object. Cloning acquires
//! another reference and dropping releases it, so every path that creates or
//! retrieves a value releases it exactly once, including early returns and
//! `?` propagation.

use std::fmt;

use crate::heap::Handle;
use crate::runtime::GuestRuntime;

/// Closed tag over the Guest object kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuestKind {
    /// The `None` singleton
    None,
    /// `True` / `False`
    Bool,
    /// Integer
    Int,
    /// Unicode string
    Str,
    /// Immutable tuple
    Tuple,
    /// String-keyed dictionary
    Dict,
    /// Native callable
    Function,
    /// Callable bound to a receiver
    BoundMethod,
    /// A type (builtin or synthesized)
    Type,
    /// Instance of a non-builtin type, or of `object`
    Instance,
    /// Imported module
    Module,
}

impl GuestKind {
    /// Builtin type name for this kind
    pub fn type_name(self) -> &'static str {
        match self {
            GuestKind::None => "NoneType",
            GuestKind::Bool => "bool",
            GuestKind::Int => "int",
            GuestKind::Str => "str",
            GuestKind::Tuple => "tuple",
            GuestKind::Dict => "dict",
            GuestKind::Function => "function",
            GuestKind::BoundMethod => "method",
            GuestKind::Type => "type",
            GuestKind::Instance => "object",
            GuestKind::Module => "module",
        }
    }

    /// Check if values of this kind can be called
    pub fn is_callable(self) -> bool {
        matches!(self, GuestKind::Function | GuestKind::BoundMethod | GuestKind::Type)
    }
}

/// Owned (acquired) reference to a Guest object
pub struct GuestValue {
    rt: GuestRuntime,
    handle: Handle,
}

impl GuestValue {
    /// Adopt a handle whose reference has already been acquired
    pub(crate) fn adopt(rt: GuestRuntime, handle: Handle) -> Self {
        Self { rt, handle }
    }

    /// The underlying handle. Valid while this value (or any other
    /// reference to the object) is alive.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Identity of the object (Guest `id()`)
    pub fn id(&self) -> u64 {
        self.handle.id()
    }

    /// Identity comparison
    pub fn is(&self, other: &GuestValue) -> bool {
        self.handle == other.handle
    }

    /// The runtime this value belongs to
    pub fn runtime(&self) -> &GuestRuntime {
        &self.rt
    }

    /// Kind of the referenced object (`None` once the runtime is finalized)
    pub fn kind(&self) -> Option<GuestKind> {
        self.rt.kind_of(self.handle)
    }

    /// Check if this is the `None` singleton
    pub fn is_none(&self) -> bool {
        self.kind() == Some(GuestKind::None)
    }

    /// Get the string if this is a `str`
    pub fn as_string(&self) -> Option<String> {
        self.rt.read_str(self.handle)
    }

    /// Get the integer if this is an `int`
    pub fn as_int(&self) -> Option<i64> {
        self.rt.read_int(self.handle)
    }

    /// Get the boolean if this is a `bool`
    pub fn as_bool(&self) -> Option<bool> {
        self.rt.read_bool(self.handle)
    }

    /// Get the items (each newly acquired) if this is a `tuple`
    pub fn tuple_items(&self) -> Option<Vec<GuestValue>> {
        self.rt.read_tuple(self.handle)
    }

    /// Current reference count (for diagnostics and tests)
    pub fn refcount(&self) -> usize {
        self.rt.refcount(self.handle).unwrap_or(0)
    }
}

impl Clone for GuestValue {
    fn clone(&self) -> Self {
        self.rt.incref(self.handle);
        Self {
            rt: self.rt.clone(),
            handle: self.handle,
        }
    }
}

impl Drop for GuestValue {
    fn drop(&mut self) {
        self.rt.release(self.handle);
    }
}

impl fmt::Debug for GuestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "GuestValue({}#{:x})", kind.type_name(), self.id()),
            None => write!(f, "GuestValue(<released>#{:x})", self.id()),
        }
    }
}
