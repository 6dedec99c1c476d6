//! Heap object representations
//!
//! Objects refer to each other by [`Handle`]; every handle stored in an
//! object accounts for one reference on the target.

use rustc_hash::FxHashMap;

use crate::heap::Handle;
use crate::module::NativeFn;
use crate::value::GuestKind;

pub(crate) enum Object {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Tuple(Vec<Handle>),
    Dict(FxHashMap<String, Handle>),
    Function(NativeFunction),
    BoundMethod { receiver: Handle, function: Handle },
    Type(TypeObject),
    Instance(Instance),
    Module(ModuleObject),
}

/// A native callable. `bound` is state carried by the callable itself
/// (the defining module, or a synthesized method's name).
pub(crate) struct NativeFunction {
    pub(crate) name: String,
    pub(crate) bound: Option<Handle>,
    pub(crate) body: NativeFn,
}

pub(crate) struct TypeObject {
    pub(crate) name: String,
    pub(crate) bases: Vec<Handle>,
    pub(crate) dict: FxHashMap<String, Handle>,
    pub(crate) builtin: bool,
}

pub(crate) struct Instance {
    pub(crate) ty: Handle,
    pub(crate) attrs: FxHashMap<String, Handle>,
}

pub(crate) struct ModuleObject {
    pub(crate) name: String,
    pub(crate) globals: FxHashMap<String, Handle>,
}

impl Object {
    pub(crate) fn kind(&self) -> GuestKind {
        match self {
            Object::None => GuestKind::None,
            Object::Bool(_) => GuestKind::Bool,
            Object::Int(_) => GuestKind::Int,
            Object::Str(_) => GuestKind::Str,
            Object::Tuple(_) => GuestKind::Tuple,
            Object::Dict(_) => GuestKind::Dict,
            Object::Function(_) => GuestKind::Function,
            Object::BoundMethod { .. } => GuestKind::BoundMethod,
            Object::Type(_) => GuestKind::Type,
            Object::Instance(_) => GuestKind::Instance,
            Object::Module(_) => GuestKind::Module,
        }
    }

    /// Handles this object holds a reference on
    pub(crate) fn children(&self) -> Vec<Handle> {
        match self {
            Object::None | Object::Bool(_) | Object::Int(_) | Object::Str(_) => Vec::new(),
            Object::Tuple(items) => items.clone(),
            Object::Dict(map) => map.values().copied().collect(),
            Object::Function(f) => f.bound.into_iter().collect(),
            Object::BoundMethod { receiver, function } => vec![*receiver, *function],
            Object::Type(t) => t.bases.iter().chain(t.dict.values()).copied().collect(),
            Object::Instance(inst) => std::iter::once(inst.ty)
                .chain(inst.attrs.values().copied())
                .collect(),
            Object::Module(m) => m.globals.values().copied().collect(),
        }
    }
}
