//! Ferry Guest - the embedded Guest runtime
//!
//! A small reference-counted object runtime that the bridge embeds:
//!
//! - [`GuestRuntime`]: lifecycle, calls, attributes, type creation, imports
//! - [`GuestValue`]: an owned reference, released on drop
//! - [`ModuleDef`] / [`inittab`]: native modules made importable
//! - [`registry`]: the object registry and name resolution services
//!
//! # Example
//!
//! ```ignore
//! use ferry_guest::{inittab, registry, GuestRuntime, ModuleDef};
//!
//! inittab::append(registry::install(ModuleDef::new("bridge")));
//! let rt = GuestRuntime::initialize();
//! let module = rt.import("bridge")?;
//! let key = rt.call_method(&module, "store_object", &[rt.new_str("x")?])?;
//! drop((key, module));
//! rt.finalize()?;
//! ```

#![warn(missing_docs)]

pub mod error;
mod heap;
pub mod inittab;
pub mod module;
mod object;
pub mod registry;
pub mod runtime;
pub mod value;

pub use error::{GuestException, GuestResult, TeardownError};
pub use heap::Handle;
pub use module::{CallArgs, ModuleDef, ModuleInit, NativeFn};
pub use runtime::{is_identifier, GuestRuntime, BUILTIN_TYPES, RESERVED_ATTRIBUTES};
pub use value::{GuestKind, GuestValue};
