//! Callback Dispatcher
//!
//! Each synthesized method is a native Guest function whose bound state is
//! the method name. Its body is a [`CallbackTarget`] that captured the
//! originating Host object and the session when the type was defined, so a
//! callback always reaches the object its own type was defined for.

use std::sync::Weak;

use ferry_guest::{CallArgs, GuestException, GuestResult, GuestValue};
use ferry_host::HostValue;

use crate::proxy;
use crate::session::{BridgeSession, SessionInner};

/// Routing captured by one synthesized type
pub(crate) struct CallbackTarget {
    session: Weak<SessionInner>,
    origin: HostValue,
    class_name: String,
}

impl CallbackTarget {
    pub(crate) fn new(session: &BridgeSession, origin: HostValue, class_name: &str) -> Self {
        Self {
            session: session.downgrade(),
            origin,
            class_name: class_name.to_string(),
        }
    }

    /// Forward a Guest method call to the Host.
    ///
    /// Every argument after the receiver is handed over as a proxy, in call
    /// order. The Host reply is discarded and the Guest caller gets `None`.
    pub(crate) fn dispatch(&self, call: &CallArgs<'_>) -> GuestResult<GuestValue> {
        let method = call
            .bound()?
            .as_string()
            .ok_or_else(|| GuestException::type_error("callback bound state must be a method name"))?;
        let session = BridgeSession::upgrade(&self.session)
            .ok_or_else(|| GuestException::runtime_error("bridge session is closed"))?;

        let args = call.args().get(1..).unwrap_or(&[]);
        session.tracer().debug(
            1,
            &format!("callback {}.{} ({} args)", self.class_name, method, args.len()),
        );

        let proxies = args
            .iter()
            .map(|arg| proxy::make_proxy(&session, arg))
            .collect::<Result<Vec<_>, _>>()?;

        session
            .host()
            .send(&self.origin, &method, &proxies)
            .map_err(|e| {
                GuestException::runtime_error(format!(
                    "{}.{} failed in host: {}",
                    self.class_name, method, e
                ))
            })?;
        call.runtime().none()
    }
}
