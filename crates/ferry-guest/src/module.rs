//! Native module definitions
//!
//! A [`ModuleDef`] describes a Guest module implemented in Rust: a set of
//! named native functions plus initializers run once on import. Functions
//! of a module are bound to the module object, so a body can reach module
//! state through [`CallArgs::bound`].

use std::sync::Arc;

use crate::error::{GuestException, GuestResult};
use crate::runtime::GuestRuntime;
use crate::value::GuestValue;

/// Native function body
pub type NativeFn = Arc<dyn Fn(&CallArgs<'_>) -> GuestResult<GuestValue> + Send + Sync>;

/// Module initializer, run after the module's functions are installed
pub type ModuleInit = Arc<dyn Fn(&GuestRuntime, &GuestValue) -> GuestResult<()> + Send + Sync>;

/// Arguments of a native call
pub struct CallArgs<'a> {
    rt: &'a GuestRuntime,
    bound: Option<GuestValue>,
    args: Vec<GuestValue>,
    kwargs: Vec<(String, GuestValue)>,
}

impl<'a> CallArgs<'a> {
    pub(crate) fn new(
        rt: &'a GuestRuntime,
        bound: Option<GuestValue>,
        args: Vec<GuestValue>,
        kwargs: Vec<(String, GuestValue)>,
    ) -> Self {
        Self {
            rt,
            bound,
            args,
            kwargs,
        }
    }

    /// The runtime executing the call
    pub fn runtime(&self) -> &'a GuestRuntime {
        self.rt
    }

    /// State bound to the callable at creation
    pub fn bound(&self) -> GuestResult<&GuestValue> {
        self.bound
            .as_ref()
            .ok_or_else(|| GuestException::type_error("function has no bound state"))
    }

    /// All positional arguments
    pub fn args(&self) -> &[GuestValue] {
        &self.args
    }

    /// All keyword arguments, in call order
    pub fn kwargs(&self) -> &[(String, GuestValue)] {
        &self.kwargs
    }

    /// Keyword argument `name`
    pub fn kwarg(&self, name: &str) -> Option<&GuestValue> {
        self.kwargs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Number of positional arguments
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Check if there are no positional arguments
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Positional argument at `index`
    pub fn arg(&self, index: usize) -> GuestResult<&GuestValue> {
        self.args.get(index).ok_or_else(|| {
            GuestException::type_error(format!(
                "missing required positional argument {} (got {})",
                index,
                self.args.len()
            ))
        })
    }

    /// Positional argument at `index` as a string
    pub fn str_arg(&self, index: usize) -> GuestResult<String> {
        let value = self.arg(index)?;
        value.as_string().ok_or_else(|| {
            GuestException::type_error(format!(
                "argument {} must be str, not {}",
                index,
                value.kind().map(|k| k.type_name()).unwrap_or("<released>")
            ))
        })
    }
}

/// Native module definition
#[derive(Clone)]
pub struct ModuleDef {
    name: String,
    functions: Vec<(String, NativeFn)>,
    initializers: Vec<ModuleInit>,
}

impl ModuleDef {
    /// Create an empty module definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            initializers: Vec::new(),
        }
    }

    /// Register a function, replacing one with the same name
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&CallArgs<'_>) -> GuestResult<GuestValue> + Send + Sync + 'static,
    ) {
        let name = name.into();
        self.functions.retain(|(n, _)| *n != name);
        self.functions.push((name, Arc::new(func)));
    }

    /// Register an initializer
    pub fn on_init(
        &mut self,
        init: impl Fn(&GuestRuntime, &GuestValue) -> GuestResult<()> + Send + Sync + 'static,
    ) {
        self.initializers.push(Arc::new(init));
    }

    /// Module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the registered functions, in registration order
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub(crate) fn functions(&self) -> &[(String, NativeFn)] {
        &self.functions
    }

    pub(crate) fn initializers(&self) -> &[ModuleInit] {
        &self.initializers
    }
}

impl std::fmt::Debug for ModuleDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDef")
            .field("name", &self.name)
            .field("functions", &self.function_names())
            .field("initializers", &self.initializers.len())
            .finish()
    }
}
