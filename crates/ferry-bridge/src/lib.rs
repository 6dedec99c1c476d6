//! Ferry Bridge - cross-runtime object bridge
//!
//! Lets Host code call Guest functions, pass Host values in, receive Guest
//! results back, and define Guest types whose methods are implemented by
//! Host objects.
//!
//! - [`convert`]: Host ⇄ Guest value conversion
//! - [`proxy`]: Opaque Reference Proxies for Guest values with no Host form
//! - [`invoke`]: calling Guest functions and proxy methods
//! - [`synth`]: Guest type synthesis with callbacks into the Host
//! - [`BridgeSession`]: the explicit session every operation runs against
//! - [`abi`]: the process-wide Initialize / Finalize / CallFunction / DefineClass
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ferry_bridge::{BridgeConfig, BridgeSession};
//! use ferry_host::{HostInterp, HostValue};
//!
//! let host = Arc::new(HostInterp::new());
//! let session = BridgeSession::open(host, BridgeConfig::new("shapes", false))?;
//! let reply = session.call_function("describe", Some(&HostValue::from("circle")))?;
//! session.close()?;
//! ```

#![warn(missing_docs)]

pub mod abi;
pub mod config;
pub mod convert;
mod dispatch;
pub mod error;
pub mod invoke;
pub mod proxy;
pub mod session;
pub mod synth;
pub mod trace;

pub use config::{BridgeConfig, ConfigError};
pub use error::{BridgeError, BridgeResult};
pub use proxy::{IdentityKey, OpaqueRef};
pub use session::{ActiveBinding, BridgeSession};
pub use trace::Tracer;
