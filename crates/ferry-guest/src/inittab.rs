//! Process-wide table of importable native modules
//!
//! Modules appended here can be imported by any runtime in the process.
//! A module registered on a runtime with
//! [`GuestRuntime::register_module`](crate::GuestRuntime::register_module)
//! takes precedence over an inittab entry with the same name.

use std::sync::LazyLock;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::module::ModuleDef;

static INITTAB: LazyLock<Mutex<FxHashMap<String, ModuleDef>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// Add a module, replacing an entry with the same name
pub fn append(def: ModuleDef) {
    INITTAB.lock().insert(def.name().to_string(), def);
}

/// Look up a module definition by name
pub fn lookup(name: &str) -> Option<ModuleDef> {
    INITTAB.lock().get(name).cloned()
}

/// Remove a module. Returns true if it was present.
pub fn remove(name: &str) -> bool {
    INITTAB.lock().remove(name).is_some()
}
