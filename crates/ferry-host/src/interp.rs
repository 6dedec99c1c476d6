//! In-process Host interpreter
//!
//! A small class-based interpreter that implements [`HostContext`]. Classes
//! are registered by name, objects are created from classes, and behaviour
//! is reached with [`HostContext::send`]. A class that defines `UNKNOWN`
//! receives every message it has no method for, as
//! `UNKNOWN(messageName, argumentsArray)`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::context::HostContext;
use crate::error::{HostError, HostResult};
use crate::value::{HostClass, HostObject, HostValue, NativePayload};

/// Name of the fallback method for messages without a method
pub const UNKNOWN_METHOD: &str = "UNKNOWN";

struct Builtins {
    object: Arc<HostClass>,
    string: Arc<HostClass>,
    array: Arc<HostClass>,
    nil: Arc<HostClass>,
}

/// The reference Host interpreter
pub struct HostInterp {
    classes: RwLock<FxHashMap<String, Arc<HostClass>>>,
    builtins: Builtins,
    next_object_id: AtomicU64,
}

impl HostInterp {
    /// Create an interpreter with the builtin classes `Object`, `String`,
    /// `Array` and `NilObject`
    pub fn new() -> Self {
        let object = Arc::new(HostClass::builder("Object").build());
        let string = Arc::new(HostClass::builder("String").superclass(object.clone()).build());
        let array = Arc::new(HostClass::builder("Array").superclass(object.clone()).build());
        let nil = Arc::new(HostClass::builder("NilObject").superclass(object.clone()).build());

        let mut classes = FxHashMap::default();
        for class in [&object, &string, &array, &nil] {
            classes.insert(class.name().to_ascii_uppercase(), class.clone());
        }

        Self {
            classes: RwLock::new(classes),
            builtins: Builtins {
                object,
                string,
                array,
                nil,
            },
            next_object_id: AtomicU64::new(1),
        }
    }

    /// The root `Object` class
    pub fn object_class(&self) -> &Arc<HostClass> {
        &self.builtins.object
    }

    /// Number of registered classes (builtins included)
    pub fn class_count(&self) -> usize {
        self.classes.read().len()
    }
}

impl Default for HostInterp {
    fn default() -> Self {
        Self::new()
    }
}

impl HostContext for HostInterp {
    fn find_class(&self, name: &str) -> Option<Arc<HostClass>> {
        self.classes.read().get(&name.to_ascii_uppercase()).cloned()
    }

    fn register_class(&self, class: HostClass) -> Arc<HostClass> {
        let class = Arc::new(class);
        self.classes
            .write()
            .insert(class.name().to_ascii_uppercase(), class.clone());
        class
    }

    fn class_of(&self, value: &HostValue) -> Arc<HostClass> {
        match value {
            HostValue::Nil => self.builtins.nil.clone(),
            HostValue::Str(_) => self.builtins.string.clone(),
            HostValue::Array(_) => self.builtins.array.clone(),
            HostValue::Object(obj) => obj.class().clone(),
        }
    }

    fn new_object(&self, class: &Arc<HostClass>, native: Option<NativePayload>) -> HostValue {
        let id = self.next_object_id.fetch_add(1, Ordering::Relaxed);
        HostValue::Object(Arc::new(HostObject::new(id, class.clone(), native)))
    }

    fn send(&self, receiver: &HostValue, message: &str, args: &[HostValue]) -> HostResult<HostValue> {
        let class = self.class_of(receiver);

        // The class lock is released before the body runs: bodies may re-enter.
        if let Some(method) = class.find_method(message) {
            return method(self, receiver, args);
        }
        if let Some(unknown) = class.find_method(UNKNOWN_METHOD) {
            let forwarded = [HostValue::string(message), HostValue::array(args.to_vec())];
            return unknown(self, receiver, &forwarded);
        }

        Err(HostError::NoSuchMethod {
            class: class.name().to_string(),
            message: message.to_string(),
        })
    }

    fn array_len(&self, value: &HostValue) -> HostResult<usize> {
        value
            .as_array()
            .map(|items| items.len())
            .ok_or_else(|| HostError::NotAnArray(value.class_name().to_string()))
    }

    fn array_at(&self, value: &HostValue, index: usize) -> HostResult<HostValue> {
        let items = value
            .as_array()
            .ok_or_else(|| HostError::NotAnArray(value.class_name().to_string()))?;
        items.get(index).cloned().ok_or(HostError::IndexOutOfBounds {
            index,
            len: items.len(),
        })
    }
}
