//! Registry services for a bridged module
//!
//! [`install`] adds a set of native functions to a module definition. The
//! functions keep an object registry (a `dict` stored in the module globals
//! under [`REGISTRY_GLOBAL`]) and resolve names in the module's namespace.
//!
//! | Function | Behaviour |
//! |----------|-----------|
//! | `store_object(value)` | store under `str(id(value))`, return the key |
//! | `lookup_object(key)` | stored object, `KeyError` when absent |
//! | `release_object(key)` | drop a stored object, `True` if it was present |
//! | `resolve_function(name)` | caseless global / builtin / dotted lookup |
//! | `set_globals(name, value)` | bind a module global |
//! | `invoke_str(key)` | `str()` of a stored object |
//! | `invoke_import(name)` | import a module and bind it as a global |
//! | `invoke_from_import(name, names)` | bind names from a module as globals |
//! | `invoke_function(name, args)` | call a resolved name, store the result |
//! | `get_builtin_constant(name)` | `True`, `False` or `None` |
//! | `get_builtin_constant_id(name)` | store a builtin constant, return its key |
//! | `debug_on()` / `debug_off()` | toggle call tracing on stderr |
//! | `get_corresponding_methodnames(cls, names)` | exact attribute names |
//!
//! Stored objects stay alive until released or until the module is torn
//! down with the runtime.
//!
//! Calls made by `invoke_function` follow the keyword convention of
//! [`call_with_arguments`]: a trailing `dict` holding the key
//! [`KWARGS_MARKER`] supplies keyword arguments.

use crate::error::{GuestException, GuestResult};
use crate::module::{CallArgs, ModuleDef};
use crate::runtime::GuestRuntime;
use crate::value::{GuestKind, GuestValue};

/// Module global holding the object registry
pub const REGISTRY_GLOBAL: &str = "registry";

/// Module global holding the tracing flag
pub const DEBUG_GLOBAL: &str = "debug_enabled";

/// Key marking a trailing argument dict as keyword arguments
pub const KWARGS_MARKER: &str = "kwargs";

/// Add the registry services to `def`
pub fn install(mut def: ModuleDef) -> ModuleDef {
    def.on_init(|rt, module| {
        let registry = rt.new_dict()?;
        rt.setattr(module, REGISTRY_GLOBAL, &registry)?;
        rt.setattr(module, DEBUG_GLOBAL, &rt.new_bool(false)?)?;
        Ok(())
    });

    def.register_function("store_object", |call| store(call, call.arg(0)?));

    def.register_function("lookup_object", |call| {
        let key = call.str_arg(0)?;
        trace(call, &format!("lookup_object({})", key));
        lookup(call, &key)
    });

    def.register_function("release_object", |call| {
        let rt = call.runtime();
        let key = call.str_arg(0)?;
        let removed = rt.dict_remove(&registry_of(call)?, &key)?;
        trace(call, &format!("release_object({}) -> {}", key, removed));
        rt.new_bool(removed)
    });

    def.register_function("resolve_function", |call| {
        let name = call.str_arg(0)?;
        trace(call, &format!("resolve_function({})", name));
        resolve(call.runtime(), call.bound()?, &name)
    });

    def.register_function("set_globals", |call| {
        let rt = call.runtime();
        let name = call.str_arg(0)?;
        trace(call, &format!("set_globals({})", name));
        rt.setattr(call.bound()?, &name, call.arg(1)?)?;
        rt.none()
    });

    def.register_function("invoke_str", |call| {
        let rt = call.runtime();
        let key = call.str_arg(0)?;
        let value = lookup(call, &key)?;
        let s = rt.str_of(&value)?;
        trace(call, &format!("invoke_str({}) -> {}", key, s));
        rt.new_str(&s)
    });

    def.register_function("invoke_import", |call| {
        let rt = call.runtime();
        let name = call.str_arg(0)?;
        trace(call, &format!("invoke_import({})", name));
        let imported = rt.import(&name)?;
        rt.setattr(call.bound()?, &name, &imported)?;
        rt.none()
    });

    def.register_function("invoke_from_import", |call| {
        let rt = call.runtime();
        let name = call.str_arg(0)?;
        let wanted = str_items(call.arg(1)?, "import names")?;
        trace(call, &format!("invoke_from_import({}, {:?})", name, wanted));
        let imported = rt.import(&name)?;
        let mut bindings = Vec::with_capacity(wanted.len());
        for attr in wanted {
            let value = rt.getattr(&imported, &attr).map_err(|e| {
                if e.is("AttributeError") {
                    GuestException::new(
                        "ImportError",
                        format!("cannot import name '{}' from '{}'", attr, name),
                    )
                } else {
                    e
                }
            })?;
            bindings.push((attr, value));
        }
        for (attr, value) in &bindings {
            rt.setattr(call.bound()?, attr, value)?;
        }
        rt.none()
    });

    def.register_function("invoke_function", |call| {
        let rt = call.runtime();
        let name = call.str_arg(0)?;
        let arguments = match call.args().get(1) {
            Some(arguments) => arguments.tuple_items().ok_or_else(|| {
                GuestException::type_error("invoke_function() arguments must be a tuple")
            })?,
            None => Vec::new(),
        };
        trace(call, &format!("invoke_function({}, {} args)", name, arguments.len()));

        let function = resolve(rt, call.bound()?, &name)?;
        let result = if function.kind().is_some_and(GuestKind::is_callable) {
            call_with_arguments(rt, &function, &arguments)?
        } else {
            function
        };
        store(call, &result)
    });

    def.register_function("get_builtin_constant", |call| {
        let name = call.str_arg(0)?;
        builtin_constant(call.runtime(), &name)
    });

    def.register_function("get_builtin_constant_id", |call| {
        let name = call.str_arg(0)?;
        let constant = builtin_constant(call.runtime(), &name)?;
        store(call, &constant)
    });

    def.register_function("debug_on", |call| set_debug(call, true));
    def.register_function("debug_off", |call| set_debug(call, false));

    def.register_function("get_corresponding_methodnames", |call| {
        let rt = call.runtime();
        let class_name = call.str_arg(0)?;
        let ty = resolve(rt, call.bound()?, &class_name)?;
        if ty.kind() != Some(GuestKind::Type) {
            return Err(GuestException::type_error(format!(
                "'{}' is not a type",
                class_name
            )));
        }
        let names = call
            .arg(1)?
            .tuple_items()
            .ok_or_else(|| GuestException::type_error("method names must be a tuple"))?;

        let attrs = rt.dir(&ty)?;
        let mut exact = Vec::with_capacity(names.len());
        for name in names {
            let wanted = name
                .as_string()
                .ok_or_else(|| GuestException::type_error("method names must be str"))?;
            let found = find_caseless(&attrs, &wanted)?.ok_or_else(|| {
                GuestException::attribute_error(format!(
                    "type '{}' has no attribute '{}'",
                    class_name, wanted
                ))
            })?;
            exact.push(rt.new_str(&found)?);
        }
        rt.new_tuple(&exact)
    });

    def
}

/// Call `function` with `arguments`. When the last argument is a `dict`
/// holding the key [`KWARGS_MARKER`], it is removed from the positional
/// arguments and its other entries are passed as keyword arguments.
pub fn call_with_arguments(
    rt: &GuestRuntime,
    function: &GuestValue,
    arguments: &[GuestValue],
) -> GuestResult<GuestValue> {
    if let Some((last, positional)) = arguments.split_last() {
        if last.kind() == Some(GuestKind::Dict) && rt.dict_get(last, KWARGS_MARKER)?.is_some() {
            let kwargs: Vec<(String, GuestValue)> = rt
                .dict_items(last)?
                .into_iter()
                .filter(|(key, _)| key != KWARGS_MARKER)
                .collect();
            return rt.call_with_keywords(function, positional, &kwargs);
        }
    }
    rt.call(function, arguments)
}

fn store(call: &CallArgs<'_>, value: &GuestValue) -> GuestResult<GuestValue> {
    let rt = call.runtime();
    let key = value.id().to_string();
    rt.dict_set(&registry_of(call)?, &key, value)?;
    trace(call, &format!("store_object -> {}", key));
    rt.new_str(&key)
}

fn builtin_constant(rt: &GuestRuntime, name: &str) -> GuestResult<GuestValue> {
    match name {
        "True" | "False" | "None" => rt
            .builtin(name)
            .ok_or_else(|| GuestException::runtime_error("guest runtime is finalized")),
        _ => Err(GuestException::name_error(format!(
            "'{}' is not a builtin constant",
            name
        ))),
    }
}

fn str_items(value: &GuestValue, what: &str) -> GuestResult<Vec<String>> {
    value
        .tuple_items()
        .ok_or_else(|| GuestException::type_error(format!("{} must be a tuple", what)))?
        .iter()
        .map(|item| {
            item.as_string()
                .ok_or_else(|| GuestException::type_error(format!("{} must be str", what)))
        })
        .collect()
}

fn registry_of(call: &CallArgs<'_>) -> GuestResult<GuestValue> {
    call.runtime().getattr(call.bound()?, REGISTRY_GLOBAL)
}

fn lookup(call: &CallArgs<'_>, key: &str) -> GuestResult<GuestValue> {
    call.runtime()
        .dict_get(&registry_of(call)?, key)?
        .ok_or_else(|| GuestException::key_error(format!("'{}'", key)))
}

fn set_debug(call: &CallArgs<'_>, enabled: bool) -> GuestResult<GuestValue> {
    let rt = call.runtime();
    rt.setattr(call.bound()?, DEBUG_GLOBAL, &rt.new_bool(enabled)?)?;
    if enabled {
        trace(call, "debug on");
    }
    rt.none()
}

fn trace(call: &CallArgs<'_>, message: &str) {
    let enabled = call
        .bound()
        .and_then(|module| call.runtime().getattr(module, DEBUG_GLOBAL))
        .ok()
        .and_then(|flag| flag.as_bool())
        .unwrap_or(false);
    if enabled {
        eprintln!("[registry] {}", message);
    }
}

/// Find `wanted` among `names`. An exact match wins; otherwise a single
/// case-insensitive match is accepted and several are ambiguous.
fn find_caseless(names: &[String], wanted: &str) -> GuestResult<Option<String>> {
    if names.iter().any(|n| n == wanted) {
        return Ok(Some(wanted.to_string()));
    }
    let lowered = wanted.to_lowercase();
    let mut matches = names.iter().filter(|n| n.to_lowercase() == lowered);
    match (matches.next(), matches.next()) {
        (None, _) => Ok(None),
        (Some(found), None) => Ok(Some(found.clone())),
        (Some(a), Some(b)) => Err(GuestException::name_error(format!(
            "name '{}' is ambiguous ('{}', '{}')",
            wanted, a, b
        ))),
    }
}

/// Resolve a (possibly dotted) name against a module's globals, then the
/// builtins. The longest dotted prefix bound as a global wins; remaining
/// segments are attribute lookups. Every step ignores case.
fn resolve(rt: &GuestRuntime, module: &GuestValue, name: &str) -> GuestResult<GuestValue> {
    if name.is_empty() {
        return Err(GuestException::name_error("empty name"));
    }
    let segments: Vec<&str> = name.split('.').collect();
    let globals = rt.dir(module)?;

    let mut start = None;
    for k in (1..=segments.len()).rev() {
        let prefix = segments[..k].join(".");
        if let Some(found) = find_caseless(&globals, &prefix)? {
            start = Some((rt.getattr(module, &found)?, k));
            break;
        }
    }

    let (mut current, consumed) = match start {
        Some(start) => start,
        None => {
            let found = find_caseless(&rt.builtin_names(), segments[0])?
                .and_then(|n| rt.builtin(&n))
                .ok_or_else(|| {
                    GuestException::name_error(format!("name '{}' is not defined", segments[0]))
                })?;
            (found, 1)
        }
    };

    for segment in &segments[consumed..] {
        let attrs = rt.dir(&current)?;
        let found = find_caseless(&attrs, segment)?.ok_or_else(|| {
            GuestException::name_error(format!("name '{}' is not defined", name))
        })?;
        current = rt.getattr(&current, &found)?;
    }
    Ok(current)
}
