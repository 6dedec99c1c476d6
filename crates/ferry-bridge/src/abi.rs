//! Process-wide bridge entry points
//!
//! The operations a Host extension exposes. They act on the one session
//! opened by [`initialize`]; the session handle is cloned out of the slot
//! before each call so callbacks can re-enter these functions.
//!
//! | Operation | Result |
//! |-----------|--------|
//! | [`initialize`] | opens a session, replacing (and closing) any previous one |
//! | [`finalize`] | [`STATUS_OK`] or [`STATUS_FINALIZE_FAILURE`] |
//! | [`call_function`] | Host value, or `None` for a Guest `None` |
//! | [`define_class`] | synthesizes and publishes a Guest type |

use std::sync::{Arc, LazyLock};

use ferry_host::{HostContext, HostValue};
use parking_lot::Mutex;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::session::BridgeSession;

/// Finalize succeeded (or there was nothing to finalize)
pub const STATUS_OK: i32 = 0;

/// The Guest runtime did not shut down cleanly
pub const STATUS_FINALIZE_FAILURE: i32 = 120;

static SESSION: LazyLock<Mutex<Option<BridgeSession>>> = LazyLock::new(|| Mutex::new(None));

/// Open the process session for `module_name`
pub fn initialize(host: Arc<dyn HostContext>, module_name: &str, debug: bool) -> BridgeResult<()> {
    initialize_with(host, BridgeConfig::new(module_name, debug))
}

/// Open the process session from a full configuration
pub fn initialize_with(host: Arc<dyn HostContext>, config: BridgeConfig) -> BridgeResult<()> {
    let session = BridgeSession::open(host, config)?;
    let previous = SESSION.lock().replace(session);
    if let Some(previous) = previous {
        if let Err(e) = previous.close() {
            previous
                .tracer()
                .warn(&format!("closing replaced session: {}", e));
        }
    }
    Ok(())
}

/// Close the process session.
///
/// Returns [`STATUS_OK`] when there is no session.
pub fn finalize() -> i32 {
    let session = SESSION.lock().take();
    let Some(session) = session else {
        return STATUS_OK;
    };
    match session.close() {
        Ok(()) => STATUS_OK,
        Err(e) => {
            session.tracer().warn(&format!("finalize: {}", e));
            STATUS_FINALIZE_FAILURE
        }
    }
}

/// Handle to the process session
pub fn current() -> BridgeResult<BridgeSession> {
    SESSION.lock().clone().ok_or(BridgeError::NotInitialized)
}

/// Call a function of the session module
pub fn call_function(name: &str, args: Option<&HostValue>) -> BridgeResult<Option<HostValue>> {
    current()?.call_function(name, args)
}

/// Synthesize a Guest type. `method_names` is a Host sequence of strings.
pub fn define_class(
    origin: &HostValue,
    class_name: &str,
    base: &str,
    method_names: &HostValue,
) -> BridgeResult<()> {
    let session = current()?;
    let names = string_list(session.host().as_ref(), method_names)?;
    session.define_class(origin, class_name, base, &names)
}

/// Call a method on the Guest object a proxy denotes
pub fn call_method(proxy: &HostValue, name: &str, args: &[HostValue]) -> BridgeResult<HostValue> {
    current()?.call_method(proxy, name, args)
}

/// `str()` of the Guest object a proxy denotes
pub fn string_value(proxy: &HostValue) -> BridgeResult<String> {
    current()?.string_value(proxy)
}

fn string_list(host: &dyn HostContext, value: &HostValue) -> BridgeResult<Vec<String>> {
    let len = host.array_len(value)?;
    (0..len)
        .map(|index| {
            let item = host.array_at(value, index)?;
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| BridgeError::UnsupportedHostType {
                    class: item.class_name().to_string(),
                })
        })
        .collect()
}
