//! Opaque Reference Proxy
//!
//! A Guest value with no Host representation crosses into Host space as an
//! instance of the proxy class. The instance carries an [`OpaqueRef`]: the
//! [`IdentityKey`] the registry issued for the value, the raw Guest handle,
//! and a weak reference to the owning session.
//!
//! The registry keeps the value alive for the rest of the session, so a
//! proxy is a capability: dereferencing it acquires the stored handle
//! directly, without asking the registry again.

use std::fmt;
use std::sync::{Arc, Weak};

use ferry_guest::{GuestValue, Handle};
use ferry_host::{HostClass, HostError, HostResult, HostValue};

use crate::error::{BridgeError, BridgeResult};
use crate::session::{BridgeSession, SessionInner};

/// Registry-issued key naming one stored Guest value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// The key as issued by the registry
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Native payload of a proxy instance
pub struct OpaqueRef {
    key: IdentityKey,
    target: Handle,
    session: Weak<SessionInner>,
}

impl OpaqueRef {
    /// Identity key of the denoted value
    pub fn key(&self) -> &IdentityKey {
        &self.key
    }

    /// Session the proxy belongs to, if it is still alive
    pub fn session(&self) -> Option<BridgeSession> {
        BridgeSession::upgrade(&self.session)
    }
}

impl fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueRef")
            .field("key", &self.key)
            .field("target", &self.target)
            .finish()
    }
}

/// Store `value` in the registry and wrap the issued key in a proxy
pub fn make_proxy(session: &BridgeSession, value: &GuestValue) -> BridgeResult<HostValue> {
    let key = session.registry_call("store_object", std::slice::from_ref(value))?;
    let key = key.as_string().ok_or_else(|| BridgeError::UnsupportedGuestType {
        type_name: session
            .guest()
            .type_name(&key)
            .unwrap_or_else(|_| "<released>".to_string()),
    })?;

    session.tracer().debug(1, &format!("proxy {}", key));
    let payload = OpaqueRef {
        key: IdentityKey(key),
        target: value.handle(),
        session: session.downgrade(),
    };
    Ok(session
        .host()
        .new_object(session.proxy_class(), Some(Arc::new(payload))))
}

/// The payload of a proxy instance
pub fn opaque_ref(value: &HostValue) -> Option<&OpaqueRef> {
    value.as_object()?.native_as::<OpaqueRef>()
}

/// Acquire the Guest value a proxy denotes
pub(crate) fn dereference(session: &BridgeSession, opaque: &OpaqueRef) -> BridgeResult<GuestValue> {
    let owner = opaque.session();
    if !owner.is_some_and(|owner| owner.same_session(session)) {
        session
            .tracer()
            .warn(&format!("proxy {} belongs to another session", opaque.key));
        return Err(BridgeError::UnsupportedHostType {
            class: session.proxy_class().name().to_string(),
        });
    }
    Ok(session.guest().acquire(opaque.target)?)
}

/// Session and payload of a live proxy
fn bound(receiver: &HostValue) -> HostResult<(BridgeSession, &OpaqueRef)> {
    let opaque = opaque_ref(receiver)
        .ok_or_else(|| HostError::Condition("receiver is not a guest proxy".to_string()))?;
    let session = opaque
        .session()
        .ok_or_else(|| HostError::Condition(format!("proxy {} outlived its session", opaque.key)))?;
    Ok((session, opaque))
}

/// The Host class for proxies.
///
/// - `IDENTITY` answers the identity key
/// - `STRING` answers the Guest `str()` of the denoted value
/// - any other message is forwarded to the Guest object as a method call
pub fn proxy_class(name: &str) -> HostClass {
    HostClass::builder(name)
        .method("IDENTITY", |_ctx, receiver, _args| {
            let opaque = opaque_ref(receiver)
                .ok_or_else(|| HostError::Condition("receiver is not a guest proxy".to_string()))?;
            Ok(HostValue::string(opaque.key.as_str()))
        })
        .method("STRING", |_ctx, receiver, _args| {
            let (session, _) = bound(receiver)?;
            Ok(HostValue::string(session.string_value(receiver)?))
        })
        .method(ferry_host::interp::UNKNOWN_METHOD, |_ctx, receiver, args| {
            let (session, _) = bound(receiver)?;
            let message = args
                .first()
                .and_then(HostValue::as_str)
                .ok_or_else(|| HostError::Condition("missing message name".to_string()))?;
            let call_args = args.get(1).and_then(HostValue::as_array).unwrap_or(&[]);
            Ok(session.call_method(receiver, message, call_args)?)
        })
        .build()
}
