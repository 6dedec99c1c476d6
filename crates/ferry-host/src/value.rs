//! Host values, objects and classes
//!
//! The Host runtime is class-based: every value has a class, and behaviour is
//! reached by sending a message to an object. Message names are matched
//! case-insensitively, so `greet`, `Greet` and `GREET` name the same method.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::context::HostContext;
use crate::error::HostResult;

/// Native data attached to a Host object (e.g. a bridge proxy's identity)
pub type NativePayload = Arc<dyn Any + Send + Sync>;

/// A method body: `(context, receiver, arguments) -> result`
pub type HostMethod =
    Arc<dyn Fn(&dyn HostContext, &HostValue, &[HostValue]) -> HostResult<HostValue> + Send + Sync>;

// ============================================================================
// HostValue
// ============================================================================

/// A Host value as seen by the bridge.
///
/// Strings and arrays compare structurally; objects compare by identity.
#[derive(Clone)]
pub enum HostValue {
    /// The distinct `nil` object
    Nil,
    /// A primitive string
    Str(String),
    /// An ordered sequence
    Array(Arc<Vec<HostValue>>),
    /// Any other object (including bridge proxies)
    Object(Arc<HostObject>),
}

impl HostValue {
    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        HostValue::Str(s.into())
    }

    /// Create an array value
    pub fn array(items: Vec<HostValue>) -> Self {
        HostValue::Array(Arc::new(items))
    }

    /// Check if this is `nil`
    pub fn is_nil(&self) -> bool {
        matches!(self, HostValue::Nil)
    }

    /// Get as string slice if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the items if this is an array
    pub fn as_array(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Get the object if this is an object
    pub fn as_object(&self) -> Option<&Arc<HostObject>> {
        match self {
            HostValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Name of the value's class, for diagnostics
    pub fn class_name(&self) -> &str {
        match self {
            HostValue::Nil => "NilObject",
            HostValue::Str(_) => "String",
            HostValue::Array(_) => "Array",
            HostValue::Object(obj) => obj.class().name(),
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Nil, HostValue::Nil) => true,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::Array(a), HostValue::Array(b)) => a == b,
            (HostValue::Object(a), HostValue::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Nil => write!(f, "nil"),
            HostValue::Str(s) => write!(f, "{:?}", s),
            HostValue::Array(items) => f.debug_list().entries(items.iter()).finish(),
            HostValue::Object(obj) => write!(f, "<{}#{}>", obj.class().name(), obj.id()),
        }
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Str(s)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        HostValue::array(items)
    }
}

// ============================================================================
// HostObject
// ============================================================================

/// An instance of a Host class
pub struct HostObject {
    id: u64,
    class: Arc<HostClass>,
    native: Option<NativePayload>,
}

impl HostObject {
    pub(crate) fn new(id: u64, class: Arc<HostClass>, native: Option<NativePayload>) -> Self {
        Self { id, class, native }
    }

    /// Interpreter-unique object id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The object's class
    pub fn class(&self) -> &Arc<HostClass> {
        &self.class
    }

    /// Native data attached at creation
    pub fn native(&self) -> Option<&NativePayload> {
        self.native.as_ref()
    }

    /// Native data downcast to a concrete type
    pub fn native_as<T: Any>(&self) -> Option<&T> {
        self.native.as_ref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("id", &self.id)
            .field("class", &self.class.name())
            .field("native", &self.native.is_some())
            .finish()
    }
}

// ============================================================================
// HostClass
// ============================================================================

/// A Host class: a name, an optional superclass and a method table
pub struct HostClass {
    name: String,
    superclass: Option<Arc<HostClass>>,
    methods: FxHashMap<String, HostMethod>,
}

impl HostClass {
    /// Start building a class
    pub fn builder(name: impl Into<String>) -> HostClassBuilder {
        HostClassBuilder {
            name: name.into(),
            superclass: None,
            methods: FxHashMap::default(),
        }
    }

    /// Class name as declared
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct superclass
    pub fn superclass(&self) -> Option<&Arc<HostClass>> {
        self.superclass.as_ref()
    }

    /// Find a method by message name, walking the superclass chain
    pub fn find_method(&self, message: &str) -> Option<HostMethod> {
        let key = message.to_ascii_uppercase();
        let mut class = Some(self);
        while let Some(c) = class {
            if let Some(method) = c.methods.get(&key) {
                return Some(method.clone());
            }
            class = c.superclass.as_deref();
        }
        None
    }

    /// Check whether this class is `other` or inherits from it
    pub fn is_subclass_of(&self, other: &HostClass) -> bool {
        let mut class = Some(self);
        while let Some(c) = class {
            if std::ptr::eq(c, other) || c.name.eq_ignore_ascii_case(&other.name) {
                return true;
            }
            class = c.superclass.as_deref();
        }
        false
    }

    /// Names of the methods defined directly on this class (uppercase)
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(|s| s.as_str()).collect()
    }
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostClass")
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|c| c.name()))
            .field("methods", &self.method_names())
            .finish()
    }
}

/// Builder for [`HostClass`]
pub struct HostClassBuilder {
    name: String,
    superclass: Option<Arc<HostClass>>,
    methods: FxHashMap<String, HostMethod>,
}

impl HostClassBuilder {
    /// Set the superclass
    pub fn superclass(mut self, superclass: Arc<HostClass>) -> Self {
        self.superclass = Some(superclass);
        self
    }

    /// Add a method; the name is stored uppercase
    pub fn method(
        mut self,
        name: &str,
        body: impl Fn(&dyn HostContext, &HostValue, &[HostValue]) -> HostResult<HostValue>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.methods.insert(name.to_ascii_uppercase(), Arc::new(body));
        self
    }

    /// Build the class
    pub fn build(self) -> HostClass {
        HostClass {
            name: self.name,
            superclass: self.superclass,
            methods: self.methods,
        }
    }
}
