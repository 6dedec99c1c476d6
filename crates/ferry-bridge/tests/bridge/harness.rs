//! Test harness for bridge sessions
//!
//! Provides a Host interpreter with recording classes and helpers that open
//! a session on a uniquely named Guest module.

use std::sync::Arc;

use ferry_bridge::{BridgeConfig, BridgeSession};
use ferry_guest::{inittab, GuestException, ModuleDef};
use ferry_host::{HostClass, HostContext, HostInterp, HostValue};
use parking_lot::Mutex;

/// Messages received by a recording Host object
pub type Log = Arc<Mutex<Vec<(String, Vec<HostValue>)>>>;

/// A fresh Host interpreter
pub fn host() -> Arc<dyn HostContext> {
    Arc::new(HostInterp::new())
}

/// Register a class that records every message its instances receive and
/// return one instance plus its log
pub fn recorder(host: &Arc<dyn HostContext>, class_name: &str) -> (HostValue, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let class = host.register_class(
        HostClass::builder(class_name)
            .method("UNKNOWN", move |_ctx, _receiver, args| {
                let message = args[0].as_str().unwrap_or_default().to_string();
                let call_args = args[1].as_array().unwrap_or(&[]).to_vec();
                sink.lock().push((message, call_args));
                Ok(HostValue::Nil)
            })
            .build(),
    );
    (host.new_object(&class, None), log)
}

/// Register a class that understands no messages
pub fn mute(host: &Arc<dyn HostContext>, class_name: &str) -> HostValue {
    let class = host.register_class(HostClass::builder(class_name).build());
    host.new_object(&class, None)
}

/// Append a Guest module with a few plain functions to the inittab
///
/// - `shout(s)` upper-cases its single argument
/// - `count(*args)` returns the number of arguments as a string
/// - `nothing()` returns `None`
/// - `type_of(x)` returns the type name of its single argument
/// - `number()` returns the int 42
/// - `fail()` raises `ValueError`
pub fn guest_module(name: &str) {
    let mut def = ModuleDef::new(name);
    def.register_function("shout", |call| {
        if call.len() != 1 {
            return Err(GuestException::type_error("shout() takes 1 argument"));
        }
        let s = call.str_arg(0)?;
        call.runtime().new_str(&s.to_uppercase())
    });
    def.register_function("count", |call| {
        call.runtime().new_str(&call.len().to_string())
    });
    def.register_function("nothing", |call| call.runtime().none());
    def.register_function("type_of", |call| {
        if call.len() != 1 {
            return Err(GuestException::type_error("type_of() takes 1 argument"));
        }
        let rt = call.runtime();
        rt.new_str(&rt.type_name(call.arg(0)?)?)
    });
    def.register_function("number", |call| call.runtime().new_int(42));
    def.register_function("fail", |_call| Err(GuestException::value_error("bad input")));
    inittab::append(def);
}

/// Open a session on a fresh Host with the test module `name`
pub fn open(name: &str) -> (Arc<dyn HostContext>, BridgeSession) {
    guest_module(name);
    let host = host();
    let session = BridgeSession::open(host.clone(), BridgeConfig::new(name, false)).unwrap();
    (host, session)
}

/// Build a Host array of strings
pub fn strings(items: &[&str]) -> HostValue {
    HostValue::array(items.iter().map(|s| HostValue::from(*s)).collect())
}
