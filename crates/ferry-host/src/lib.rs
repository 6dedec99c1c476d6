//! Ferry Host - the Host side of the cross-runtime bridge
//!
//! This crate provides the object protocol the bridge consumes from the Host
//! interpreter, plus a small in-process interpreter implementing it.
//!
//! - [`HostValue`]: the closed set of values the Host hands to the bridge
//! - [`HostContext`]: class lookup, instance-of tests, message sends, sequences
//! - [`HostInterp`]: a class-based interpreter with case-insensitive dispatch
//! - [`reflect`]: the `is_string` / `is_instance_of_class` helpers
//!
//! # Example
//!
//! ```ignore
//! use ferry_host::{HostClass, HostContext, HostInterp, HostValue};
//!
//! let interp = HostInterp::new();
//! let class = interp.register_class(
//!     HostClass::builder("Greeter")
//!         .method("greet", |_ctx, _recv, args| Ok(args[0].clone()))
//!         .build(),
//! );
//! let greeter = interp.new_object(&class, None);
//! let reply = interp.send(&greeter, "GREET", &[HostValue::from("hi")]).unwrap();
//! assert_eq!(reply.as_str(), Some("hi"));
//! ```

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod interp;
pub mod reflect;
pub mod value;

pub use context::HostContext;
pub use error::{HostError, HostResult};
pub use interp::HostInterp;
pub use value::{HostClass, HostClassBuilder, HostMethod, HostObject, HostValue, NativePayload};
