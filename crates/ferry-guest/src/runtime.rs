//! GuestRuntime: the embedded Guest object runtime
//!
//! A dynamically typed runtime with native functions, tuples, dictionaries
//! and runtime-created types. All state sits behind one lock that is only
//! held for heap bookkeeping: it is never held while a native function body
//! runs, so native code may call back into the runtime (and into the Host)
//! on the same thread.
//!
//! # Lifecycle
//!
//! [`GuestRuntime::initialize`] creates the builtin types and singletons.
//! [`GuestRuntime::finalize`] clears every module namespace, releases the
//! runtime's own roots, and reports how many objects were still referenced
//! from elsewhere. After finalization every operation raises `RuntimeError`
//! and releasing a value is a no-op.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{GuestException, GuestResult, TeardownError};
use crate::heap::{Handle, Heap};
use crate::inittab;
use crate::module::{CallArgs, ModuleDef};
use crate::object::{Instance, ModuleObject, NativeFunction, Object, TypeObject};
use crate::value::{GuestKind, GuestValue};

/// Names of the builtin types
pub const BUILTIN_TYPES: &[&str] = &[
    "object", "type", "NoneType", "bool", "int", "str", "tuple", "dict", "function", "method",
    "module",
];

/// Attribute names that a synthesized type may not define
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    "__class__",
    "__dict__",
    "__bases__",
    "__mro__",
    "__name__",
    "__new__",
    "__init_subclass__",
];

/// Check if `name` is a valid Guest identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

fn stale() -> GuestException {
    GuestException::runtime_error("reference to a released object")
}

// ============================================================================
// Interpreter state
// ============================================================================

struct Roots {
    none: Handle,
    true_: Handle,
    false_: Handle,
    object: Handle,
    types: FxHashMap<&'static str, Handle>,
}

impl Roots {
    fn type_for(&self, kind: GuestKind) -> Handle {
        self.types.get(kind.type_name()).copied().unwrap_or(self.object)
    }

    fn handles(&self) -> Vec<Handle> {
        let mut handles = vec![self.none, self.true_, self.false_];
        handles.extend(self.types.values().copied());
        handles
    }
}

struct Interp {
    heap: Heap,
    roots: Option<Roots>,
    modules: FxHashMap<String, Handle>,
    local_modules: FxHashMap<String, ModuleDef>,
    /// Objects freed while the lock was held; dropped after unlocking.
    graveyard: Vec<Object>,
}

impl Interp {
    fn roots(&self) -> GuestResult<&Roots> {
        self.roots
            .as_ref()
            .ok_or_else(|| GuestException::runtime_error("guest runtime is finalized"))
    }

    fn object(&self, h: Handle) -> GuestResult<&Object> {
        self.roots()?;
        self.heap.get(h).ok_or_else(stale)
    }

    fn object_mut(&mut self, h: Handle) -> GuestResult<&mut Object> {
        self.roots()?;
        self.heap.get_mut(h).ok_or_else(stale)
    }

    fn acquire(&mut self, h: Handle) -> GuestResult<Handle> {
        self.roots()?;
        if self.heap.incref(h) {
            Ok(h)
        } else {
            Err(stale())
        }
    }

    fn alloc(&mut self, object: Object) -> GuestResult<Handle> {
        self.roots()?;
        Ok(self.heap.allocate(object))
    }

    fn release(&mut self, h: Handle) {
        if self.roots.is_some() {
            self.heap.decref(h, &mut self.graveyard);
        }
    }

    fn type_of(&self, h: Handle) -> GuestResult<Handle> {
        let roots = self.roots()?;
        Ok(match self.object(h)? {
            Object::Instance(inst) => inst.ty,
            other => roots.type_for(other.kind()),
        })
    }

    fn type_name(&self, ty: Handle) -> GuestResult<String> {
        match self.object(ty)? {
            Object::Type(t) => Ok(t.name.clone()),
            _ => Ok("object".to_string()),
        }
    }

    fn type_name_of(&self, h: Handle) -> GuestResult<String> {
        let ty = self.type_of(h)?;
        self.type_name(ty)
    }

    /// Depth-first, left-to-right linearization of a type and its bases
    fn mro(&self, ty: Handle) -> Vec<Handle> {
        let mut order = Vec::new();
        let mut stack = vec![ty];
        while let Some(h) = stack.pop() {
            if order.contains(&h) {
                continue;
            }
            order.push(h);
            if let Some(Object::Type(t)) = self.heap.get(h) {
                stack.extend(t.bases.iter().rev().copied());
            }
        }
        order
    }

    fn lookup(&self, ty: Handle, name: &str) -> Option<Handle> {
        self.mro(ty).into_iter().find_map(|h| match self.heap.get(h) {
            Some(Object::Type(t)) => t.dict.get(name).copied(),
            _ => None,
        })
    }

    fn clear_module(&mut self, h: Handle) {
        let globals = match self.heap.get_mut(h) {
            Some(Object::Module(m)) => std::mem::take(&mut m.globals),
            _ => return,
        };
        for value in globals.into_values() {
            self.release(value);
        }
    }

    fn format(&self, h: Handle, repr: bool) -> GuestResult<String> {
        Ok(match self.object(h)? {
            Object::None => "None".to_string(),
            Object::Bool(b) => (if *b { "True" } else { "False" }).to_string(),
            Object::Int(i) => i.to_string(),
            Object::Str(s) if repr => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Object::Str(s) => s.clone(),
            Object::Tuple(items) => {
                let parts = items
                    .iter()
                    .map(|item| self.format(*item, true))
                    .collect::<GuestResult<Vec<_>>>()?;
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
            Object::Dict(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let parts = keys
                    .into_iter()
                    .map(|k| -> GuestResult<String> {
                        Ok(format!("'{}': {}", k, self.format(map[k], true)?))
                    })
                    .collect::<GuestResult<Vec<_>>>()?;
                format!("{{{}}}", parts.join(", "))
            }
            Object::Function(f) => format!("<built-in function {}>", f.name),
            Object::BoundMethod { receiver, function } => {
                let name = match self.object(*function)? {
                    Object::Function(f) => f.name.clone(),
                    _ => "?".to_string(),
                };
                format!("<bound method {} of {}>", name, self.format(*receiver, true)?)
            }
            Object::Type(t) => format!("<class '{}'>", t.name),
            Object::Instance(_) => format!("<{} object at {:#x}>", self.type_name_of(h)?, h.id()),
            Object::Module(m) => format!("<module '{}'>", m.name),
        })
    }
}

// ============================================================================
// GuestRuntime
// ============================================================================

/// Handle to an embedded Guest runtime. Cheap to clone.
#[derive(Clone)]
pub struct GuestRuntime {
    inner: Arc<Mutex<Interp>>,
}

enum CallTarget {
    Native(crate::module::NativeFn, Option<Handle>),
    Bound(Handle, Handle),
    Type,
}

enum Instantiate {
    Instance,
    Str,
    Tuple,
}

impl GuestRuntime {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start a runtime with its builtin types and singletons
    pub fn initialize() -> Self {
        let mut heap = Heap::new();

        let new_type = |heap: &mut Heap, name: &str, bases: Vec<Handle>| {
            let name_h = heap.allocate(Object::Str(name.to_string()));
            let dict = std::iter::once(("__name__".to_string(), name_h)).collect();
            heap.allocate(Object::Type(TypeObject {
                name: name.to_string(),
                bases,
                dict,
                builtin: true,
            }))
        };

        let object = new_type(&mut heap, "object", Vec::new());
        let mut types = FxHashMap::default();
        types.insert("object", object);
        for name in BUILTIN_TYPES.iter().copied().filter(|n| *n != "object") {
            heap.incref(object);
            let ty = new_type(&mut heap, name, vec![object]);
            types.insert(name, ty);
        }

        let roots = Roots {
            none: heap.allocate(Object::None),
            true_: heap.allocate(Object::Bool(true)),
            false_: heap.allocate(Object::Bool(false)),
            object,
            types,
        };

        Self {
            inner: Arc::new(Mutex::new(Interp {
                heap,
                roots: Some(roots),
                modules: FxHashMap::default(),
                local_modules: FxHashMap::default(),
                graveyard: Vec::new(),
            })),
        }
    }

    /// Check if the runtime has not been finalized
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().roots.is_some()
    }

    /// Shut the runtime down.
    ///
    /// Module namespaces are cleared first (breaking module/function
    /// cycles), then the builtin roots are released. Anything still alive
    /// afterwards is held by a [`GuestValue`] outside the runtime or by a
    /// reference cycle, and is reported as [`TeardownError::Leaked`]. The
    /// heap is emptied either way.
    pub fn finalize(&self) -> Result<(), TeardownError> {
        self.with(|i| {
            if i.roots.is_none() {
                return Err(TeardownError::NotInitialized);
            }

            let modules: Vec<Handle> = i.modules.drain().map(|(_, h)| h).collect();
            for &m in &modules {
                i.clear_module(m);
            }
            for m in modules {
                i.release(m);
            }

            if let Some(roots) = i.roots.take() {
                for h in roots.handles() {
                    i.heap.decref(h, &mut i.graveyard);
                }
            }

            let leaked = i.heap.live_count();
            let drained = i.heap.drain();
            i.graveyard.extend(drained);
            i.local_modules.clear();

            if leaked > 0 {
                Err(TeardownError::Leaked(leaked))
            } else {
                Ok(())
            }
        })
    }

    /// Number of live heap objects (builtins included)
    pub fn live_objects(&self) -> usize {
        self.inner.lock().heap.live_count()
    }

    /// Make a module importable by this runtime only
    pub fn register_module(&self, def: ModuleDef) {
        self.inner.lock().local_modules.insert(def.name().to_string(), def);
    }

    // ========================================================================
    // Internal plumbing
    // ========================================================================

    /// Run `f` under the lock; objects freed meanwhile are dropped after
    /// the lock is released.
    fn with<R>(&self, f: impl FnOnce(&mut Interp) -> R) -> R {
        let (result, freed) = {
            let mut interp = self.inner.lock();
            let result = f(&mut interp);
            (result, std::mem::take(&mut interp.graveyard))
        };
        drop(freed);
        result
    }

    fn adopt(&self, h: Handle) -> GuestValue {
        GuestValue::adopt(self.clone(), h)
    }

    pub(crate) fn incref(&self, h: Handle) {
        self.with(|i| {
            i.heap.incref(h);
        });
    }

    pub(crate) fn release(&self, h: Handle) {
        self.with(|i| i.release(h));
    }

    pub(crate) fn refcount(&self, h: Handle) -> Option<usize> {
        self.inner.lock().heap.refcount(h)
    }

    pub(crate) fn kind_of(&self, h: Handle) -> Option<GuestKind> {
        self.inner.lock().heap.get(h).map(Object::kind)
    }

    pub(crate) fn read_str(&self, h: Handle) -> Option<String> {
        match self.inner.lock().heap.get(h) {
            Some(Object::Str(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub(crate) fn read_int(&self, h: Handle) -> Option<i64> {
        match self.inner.lock().heap.get(h) {
            Some(Object::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub(crate) fn read_bool(&self, h: Handle) -> Option<bool> {
        match self.inner.lock().heap.get(h) {
            Some(Object::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub(crate) fn read_tuple(&self, h: Handle) -> Option<Vec<GuestValue>> {
        let items = self.with(|i| {
            let items = match i.heap.get(h) {
                Some(Object::Tuple(items)) => items.clone(),
                _ => return None,
            };
            for item in &items {
                i.heap.incref(*item);
            }
            Some(items)
        })?;
        Some(items.into_iter().map(|h| self.adopt(h)).collect())
    }

    // ========================================================================
    // Value creation
    // ========================================================================

    /// The `None` singleton
    pub fn none(&self) -> GuestResult<GuestValue> {
        let h = self.with(|i| {
            let none = i.roots()?.none;
            i.acquire(none)
        })?;
        Ok(self.adopt(h))
    }

    /// `True` or `False`
    pub fn new_bool(&self, value: bool) -> GuestResult<GuestValue> {
        let h = self.with(|i| {
            let roots = i.roots()?;
            let h = if value { roots.true_ } else { roots.false_ };
            i.acquire(h)
        })?;
        Ok(self.adopt(h))
    }

    /// A new `int`
    pub fn new_int(&self, value: i64) -> GuestResult<GuestValue> {
        let h = self.with(|i| i.alloc(Object::Int(value)))?;
        Ok(self.adopt(h))
    }

    /// A new `str`
    pub fn new_str(&self, value: &str) -> GuestResult<GuestValue> {
        let h = self.with(|i| i.alloc(Object::Str(value.to_string())))?;
        Ok(self.adopt(h))
    }

    /// A new `tuple` holding a reference to each item
    pub fn new_tuple(&self, items: &[GuestValue]) -> GuestResult<GuestValue> {
        let handles: Vec<Handle> = items.iter().map(GuestValue::handle).collect();
        let h = self.with(|i| {
            for &item in &handles {
                i.object(item)?;
            }
            for &item in &handles {
                i.heap.incref(item);
            }
            i.alloc(Object::Tuple(handles))
        })?;
        Ok(self.adopt(h))
    }

    /// A new empty `dict`
    pub fn new_dict(&self) -> GuestResult<GuestValue> {
        let h = self.with(|i| i.alloc(Object::Dict(FxHashMap::default())))?;
        Ok(self.adopt(h))
    }

    /// A new native function. `bound` is carried by the function and handed
    /// to every call as [`CallArgs::bound`].
    pub fn new_function(
        &self,
        name: &str,
        bound: Option<&GuestValue>,
        body: impl Fn(&CallArgs<'_>) -> GuestResult<GuestValue> + Send + Sync + 'static,
    ) -> GuestResult<GuestValue> {
        let bound = bound.map(GuestValue::handle);
        let h = self.with(|i| {
            if let Some(b) = bound {
                i.acquire(b)?;
            }
            i.alloc(Object::Function(NativeFunction {
                name: name.to_string(),
                bound,
                body: Arc::new(body),
            }))
        })?;
        Ok(self.adopt(h))
    }

    /// Acquire a new reference from a raw handle
    pub fn acquire(&self, handle: Handle) -> GuestResult<GuestValue> {
        let h = self.with(|i| i.acquire(handle))?;
        Ok(self.adopt(h))
    }

    /// Look up a builtin type or constant (`None`, `True`, `False`) by exact name
    pub fn builtin(&self, name: &str) -> Option<GuestValue> {
        let h = self.with(|i| {
            let roots = i.roots.as_ref()?;
            let h = match name {
                "None" => roots.none,
                "True" => roots.true_,
                "False" => roots.false_,
                _ => *roots.types.get(name)?,
            };
            i.heap.incref(h).then_some(h)
        })?;
        Some(self.adopt(h))
    }

    /// Names accepted by [`builtin`](Self::builtin)
    pub fn builtin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = ["None", "True", "False"]
            .iter()
            .chain(BUILTIN_TYPES.iter())
            .map(|s| s.to_string())
            .collect();
        names.sort();
        names
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// The type of a value
    pub fn type_of(&self, value: &GuestValue) -> GuestResult<GuestValue> {
        let h = self.with(|i| {
            let ty = i.type_of(value.handle())?;
            i.acquire(ty)
        })?;
        Ok(self.adopt(h))
    }

    /// Name of a value's type
    pub fn type_name(&self, value: &GuestValue) -> GuestResult<String> {
        self.with(|i| i.type_name_of(value.handle()))
    }

    /// Check if `value` is an instance of `ty` or of a type derived from it
    pub fn is_instance(&self, value: &GuestValue, ty: &GuestValue) -> GuestResult<bool> {
        self.with(|i| {
            let own = i.type_of(value.handle())?;
            Ok(i.mro(own).contains(&ty.handle()))
        })
    }

    /// Attribute names visible on a value, sorted
    pub fn dir(&self, value: &GuestValue) -> GuestResult<Vec<String>> {
        self.with(|i| {
            let h = value.handle();
            let mut names: Vec<String> = Vec::new();
            let ty = match i.object(h)? {
                Object::Module(m) => {
                    names.extend(m.globals.keys().cloned());
                    None
                }
                Object::Type(_) => Some(h),
                Object::Instance(inst) => {
                    names.extend(inst.attrs.keys().cloned());
                    Some(inst.ty)
                }
                _ => Some(i.type_of(h)?),
            };
            if let Some(ty) = ty {
                for t in i.mro(ty) {
                    if let Some(Object::Type(t)) = i.heap.get(t) {
                        names.extend(t.dict.keys().cloned());
                    }
                }
            }
            names.sort();
            names.dedup();
            Ok(names)
        })
    }

    /// `str(value)`. A `__str__` defined on the value's type is honoured.
    pub fn str_of(&self, value: &GuestValue) -> GuestResult<String> {
        if value.kind() == Some(GuestKind::Instance) {
            let ty = self.type_of(value)?;
            if let Some(method) = self.type_lookup(&ty, "__str__")? {
                let result = self.call(&method, std::slice::from_ref(value))?;
                return result
                    .as_string()
                    .ok_or_else(|| GuestException::type_error("__str__ returned non-string"));
            }
        }
        self.with(|i| i.format(value.handle(), false))
    }

    /// `repr(value)`
    pub fn repr_of(&self, value: &GuestValue) -> GuestResult<String> {
        self.with(|i| i.format(value.handle(), true))
    }

    fn type_lookup(&self, ty: &GuestValue, name: &str) -> GuestResult<Option<GuestValue>> {
        let found = self.with(|i| match i.lookup(ty.handle(), name) {
            Some(h) => i.acquire(h).map(Some),
            None => Ok(None),
        })?;
        Ok(found.map(|h| self.adopt(h)))
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Get an attribute. Functions found on an instance's type are returned
    /// bound to the instance.
    pub fn getattr(&self, value: &GuestValue, name: &str) -> GuestResult<GuestValue> {
        let h = value.handle();
        let found = self.with(|i| {
            let direct = match i.object(h)? {
                Object::Instance(inst) => inst.attrs.get(name).copied(),
                Object::Module(m) => match m.globals.get(name) {
                    Some(v) => Some(*v),
                    None => {
                        return Err(GuestException::attribute_error(format!(
                            "module '{}' has no attribute '{}'",
                            m.name, name
                        )))
                    }
                },
                Object::Type(_) => i.lookup(h, name),
                _ => None,
            };
            if let Some(v) = direct {
                return i.acquire(v);
            }

            let ty = i.type_of(h)?;
            let Some(attr) = i.lookup(ty, name) else {
                return Err(GuestException::attribute_error(format!(
                    "'{}' object has no attribute '{}'",
                    i.type_name(ty)?,
                    name
                )));
            };

            if matches!(i.object(attr)?, Object::Function(_)) {
                i.heap.incref(h);
                i.heap.incref(attr);
                i.alloc(Object::BoundMethod {
                    receiver: h,
                    function: attr,
                })
            } else {
                i.acquire(attr)
            }
        })?;
        Ok(self.adopt(found))
    }

    /// Check if an attribute exists
    pub fn hasattr(&self, value: &GuestValue, name: &str) -> GuestResult<bool> {
        match self.getattr(value, name) {
            Ok(_) => Ok(true),
            Err(e) if e.is("AttributeError") => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Set an attribute on an instance, module or synthesized type
    pub fn setattr(&self, target: &GuestValue, name: &str, value: &GuestValue) -> GuestResult<()> {
        let (t, v) = (target.handle(), value.handle());
        self.with(|i| {
            i.object(v)?;
            let type_name = i.type_name_of(t)?;
            let namespace = match i.object_mut(t)? {
                Object::Instance(inst) => &mut inst.attrs,
                Object::Module(m) => &mut m.globals,
                Object::Type(ty) if !ty.builtin => &mut ty.dict,
                _ => {
                    return Err(GuestException::attribute_error(format!(
                        "'{}' object attribute '{}' is read-only",
                        type_name, name
                    )))
                }
            };
            let old = namespace.insert(name.to_string(), v);
            i.heap.incref(v);
            if let Some(old) = old {
                i.release(old);
            }
            Ok(())
        })
    }

    // ========================================================================
    // Dictionaries
    // ========================================================================

    /// Look up a key
    pub fn dict_get(&self, dict: &GuestValue, key: &str) -> GuestResult<Option<GuestValue>> {
        let found = self.with(|i| {
            let found = match i.object(dict.handle())? {
                Object::Dict(map) => map.get(key).copied(),
                _ => return Err(GuestException::type_error("expected a dict")),
            };
            match found {
                Some(h) => i.acquire(h).map(Some),
                None => Ok(None),
            }
        })?;
        Ok(found.map(|h| self.adopt(h)))
    }

    /// Insert or replace a key
    pub fn dict_set(&self, dict: &GuestValue, key: &str, value: &GuestValue) -> GuestResult<()> {
        let v = value.handle();
        self.with(|i| {
            i.object(v)?;
            let map = match i.object_mut(dict.handle())? {
                Object::Dict(map) => map,
                _ => return Err(GuestException::type_error("expected a dict")),
            };
            let old = map.insert(key.to_string(), v);
            i.heap.incref(v);
            if let Some(old) = old {
                i.release(old);
            }
            Ok(())
        })
    }

    /// Remove a key. Returns true if it was present.
    pub fn dict_remove(&self, dict: &GuestValue, key: &str) -> GuestResult<bool> {
        self.with(|i| {
            let old = match i.object_mut(dict.handle())? {
                Object::Dict(map) => map.remove(key),
                _ => return Err(GuestException::type_error("expected a dict")),
            };
            Ok(match old {
                Some(old) => {
                    i.release(old);
                    true
                }
                None => false,
            })
        })
    }

    /// Entries sorted by key
    pub fn dict_items(&self, dict: &GuestValue) -> GuestResult<Vec<(String, GuestValue)>> {
        let mut entries = self.with(|i| {
            let entries: Vec<(String, Handle)> = match i.object(dict.handle())? {
                Object::Dict(map) => map.iter().map(|(k, v)| (k.clone(), *v)).collect(),
                _ => return Err(GuestException::type_error("expected a dict")),
            };
            for (_, h) in &entries {
                i.heap.incref(*h);
            }
            Ok(entries)
        })?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries
            .into_iter()
            .map(|(k, h)| (k, self.adopt(h)))
            .collect())
    }

    /// Number of entries
    pub fn dict_len(&self, dict: &GuestValue) -> GuestResult<usize> {
        self.with(|i| match i.object(dict.handle())? {
            Object::Dict(map) => Ok(map.len()),
            _ => Err(GuestException::type_error("expected a dict")),
        })
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Call a function, bound method or type with positional arguments
    pub fn call(&self, callable: &GuestValue, args: &[GuestValue]) -> GuestResult<GuestValue> {
        self.call_with_keywords(callable, args, &[])
    }

    /// Call with positional and keyword arguments. Native bodies read the
    /// keywords through [`CallArgs::kwarg`].
    pub fn call_with_keywords(
        &self,
        callable: &GuestValue,
        args: &[GuestValue],
        kwargs: &[(String, GuestValue)],
    ) -> GuestResult<GuestValue> {
        let target = self.with(|i| {
            let target = match i.object(callable.handle())? {
                Object::Function(f) => CallTarget::Native(f.body.clone(), f.bound),
                Object::BoundMethod { receiver, function } => CallTarget::Bound(*receiver, *function),
                Object::Type(_) => CallTarget::Type,
                _ => {
                    return Err(GuestException::type_error(format!(
                        "'{}' object is not callable",
                        i.type_name_of(callable.handle())?
                    )))
                }
            };
            match &target {
                CallTarget::Native(_, Some(bound)) => {
                    i.heap.incref(*bound);
                }
                CallTarget::Bound(receiver, function) => {
                    i.heap.incref(*receiver);
                    i.heap.incref(*function);
                }
                _ => {}
            }
            Ok(target)
        })?;

        match target {
            CallTarget::Native(body, bound) => {
                let bound = bound.map(|h| self.adopt(h));
                let call = CallArgs::new(self, bound, args.to_vec(), kwargs.to_vec());
                body(&call)
            }
            CallTarget::Bound(receiver, function) => {
                let receiver = self.adopt(receiver);
                let function = self.adopt(function);
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(receiver);
                full.extend_from_slice(args);
                self.call_with_keywords(&function, &full, kwargs)
            }
            CallTarget::Type => self.instantiate(callable, args, kwargs),
        }
    }

    /// `value.name(*args)`
    pub fn call_method(&self, value: &GuestValue, name: &str, args: &[GuestValue]) -> GuestResult<GuestValue> {
        let method = self.getattr(value, name)?;
        self.call(&method, args)
    }

    fn instantiate(
        &self,
        ty: &GuestValue,
        args: &[GuestValue],
        kwargs: &[(String, GuestValue)],
    ) -> GuestResult<GuestValue> {
        let plan = self.with(|i| match i.object(ty.handle())? {
            Object::Type(t) if !t.builtin || t.name == "object" => Ok(Instantiate::Instance),
            Object::Type(t) if t.name == "str" => Ok(Instantiate::Str),
            Object::Type(t) if t.name == "tuple" => Ok(Instantiate::Tuple),
            Object::Type(t) => Err(GuestException::type_error(format!(
                "cannot create '{}' instances",
                t.name
            ))),
            _ => Err(GuestException::type_error("expected a type")),
        })?;

        if !kwargs.is_empty() && !matches!(plan, Instantiate::Instance) {
            return Err(GuestException::type_error(format!(
                "{}() takes no keyword arguments",
                self.with(|i| i.type_name(ty.handle()))?
            )));
        }

        match plan {
            Instantiate::Str => match args {
                [] => self.new_str(""),
                [value] => {
                    let s = self.str_of(value)?;
                    self.new_str(&s)
                }
                _ => Err(GuestException::type_error("str() takes at most 1 argument")),
            },
            Instantiate::Tuple => match args {
                [] => self.new_tuple(&[]),
                [value] if value.kind() == Some(GuestKind::Tuple) => Ok(value.clone()),
                [_] => Err(GuestException::type_error("tuple() argument must be a tuple")),
                _ => Err(GuestException::type_error("tuple() takes at most 1 argument")),
            },
            Instantiate::Instance => {
                let init = self.type_lookup(ty, "__init__")?;
                if init.is_none() && !(args.is_empty() && kwargs.is_empty()) {
                    return Err(GuestException::type_error(format!(
                        "{}() takes no arguments",
                        self.with(|i| i.type_name(ty.handle()))?
                    )));
                }

                let h = self.with(|i| {
                    let t = i.acquire(ty.handle())?;
                    i.alloc(Object::Instance(Instance {
                        ty: t,
                        attrs: FxHashMap::default(),
                    }))
                })?;
                let instance = self.adopt(h);

                if let Some(init) = init {
                    let mut full = Vec::with_capacity(args.len() + 1);
                    full.push(instance.clone());
                    full.extend_from_slice(args);
                    self.call_with_keywords(&init, &full, kwargs)?;
                }
                Ok(instance)
            }
        }
    }

    // ========================================================================
    // Type synthesis
    // ========================================================================

    /// Create a new type from a name, its bases and a namespace.
    ///
    /// Nothing is allocated unless every check passes: the name and every
    /// namespace key must be identifiers, no key may be reserved or repeated,
    /// and every base must be `object` or a non-builtin type. An empty
    /// `bases` means `(object,)`.
    pub fn new_type(
        &self,
        name: &str,
        bases: &[GuestValue],
        namespace: &[(String, GuestValue)],
    ) -> GuestResult<GuestValue> {
        if !is_identifier(name) {
            return Err(GuestException::type_error(format!(
                "type name '{}' is not an identifier",
                name
            )));
        }
        let mut seen = Vec::with_capacity(namespace.len());
        for (key, _) in namespace {
            if !is_identifier(key) {
                return Err(GuestException::type_error(format!(
                    "attribute name '{}' is not an identifier",
                    key
                )));
            }
            if RESERVED_ATTRIBUTES.contains(&key.as_str()) {
                return Err(GuestException::type_error(format!(
                    "attribute name '{}' is reserved",
                    key
                )));
            }
            if seen.contains(&key) {
                return Err(GuestException::type_error(format!(
                    "duplicate attribute name '{}'",
                    key
                )));
            }
            seen.push(key);
        }

        let base_handles: Vec<Handle> = bases.iter().map(GuestValue::handle).collect();
        let entries: Vec<(String, Handle)> = namespace
            .iter()
            .map(|(k, v)| (k.clone(), v.handle()))
            .collect();

        let h = self.with(|i| {
            let base_handles = if base_handles.is_empty() {
                vec![i.roots()?.object]
            } else {
                base_handles
            };
            for &b in &base_handles {
                match i.object(b)? {
                    Object::Type(t) if t.builtin && t.name != "object" => {
                        return Err(GuestException::type_error(format!(
                            "type '{}' is not an acceptable base type",
                            t.name
                        )))
                    }
                    Object::Type(_) => {}
                    _ => return Err(GuestException::type_error("bases must be types")),
                }
            }
            for (_, v) in &entries {
                i.object(*v)?;
            }

            for &b in &base_handles {
                i.heap.incref(b);
            }
            let mut dict: FxHashMap<String, Handle> = FxHashMap::default();
            for (k, v) in entries {
                i.heap.incref(v);
                dict.insert(k, v);
            }
            let name_h = i.alloc(Object::Str(name.to_string()))?;
            dict.insert("__name__".to_string(), name_h);

            i.alloc(Object::Type(TypeObject {
                name: name.to_string(),
                bases: base_handles,
                dict,
                builtin: false,
            }))
        })?;
        Ok(self.adopt(h))
    }

    // ========================================================================
    // Modules
    // ========================================================================

    /// Import a module by name. Each module is created once per runtime.
    pub fn import(&self, name: &str) -> GuestResult<GuestValue> {
        let (existing, local) = self.with(|i| {
            i.roots()?;
            let existing = match i.modules.get(name).copied() {
                Some(h) => Some(i.acquire(h)?),
                None => None,
            };
            Ok::<_, GuestException>((existing, i.local_modules.get(name).cloned()))
        })?;
        if let Some(h) = existing {
            return Ok(self.adopt(h));
        }

        let def = local.or_else(|| inittab::lookup(name)).ok_or_else(|| {
            GuestException::new("ModuleNotFoundError", format!("No module named '{}'", name))
        })?;

        let h = self.with(|i| {
            let name_h = i.alloc(Object::Str(name.to_string()))?;
            let globals = std::iter::once(("__name__".to_string(), name_h)).collect();
            let module = i.alloc(Object::Module(ModuleObject {
                name: name.to_string(),
                globals,
            }))?;

            for (fname, body) in def.functions() {
                i.heap.incref(module);
                let f = i.alloc(Object::Function(NativeFunction {
                    name: fname.clone(),
                    bound: Some(module),
                    body: body.clone(),
                }))?;
                let old = match i.heap.get_mut(module) {
                    Some(Object::Module(m)) => m.globals.insert(fname.clone(), f),
                    _ => None,
                };
                if let Some(old) = old {
                    i.release(old);
                }
            }

            // One reference for the module table, one for the caller.
            i.modules.insert(name.to_string(), module);
            i.acquire(module)
        })?;
        let module = self.adopt(h);

        for init in def.initializers() {
            if let Err(err) = init(self, &module) {
                self.with(|i| {
                    if let Some(h) = i.modules.remove(name) {
                        i.clear_module(h);
                        i.release(h);
                    }
                });
                return Err(err);
            }
        }
        Ok(module)
    }

    /// Check if a module has been imported
    pub fn is_imported(&self, name: &str) -> bool {
        self.inner.lock().modules.contains_key(name)
    }
}

impl std::fmt::Debug for GuestRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let interp = self.inner.lock();
        f.debug_struct("GuestRuntime")
            .field("initialized", &interp.roots.is_some())
            .field("live_objects", &interp.heap.live_count())
            .field("modules", &interp.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}
