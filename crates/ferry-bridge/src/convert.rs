//! Value Converter
//!
//! | Host | Guest |
//! |------|-------|
//! | `nil` | `None` |
//! | `String` | `str` |
//! | `Array` | `tuple` (recursive) |
//! | proxy | the object it denotes |
//!
//! Anything else is [`BridgeError::UnsupportedHostType`] /
//! [`BridgeError::UnsupportedGuestType`].

use ferry_guest::{GuestKind, GuestValue};
use ferry_host::{reflect, HostValue};

use crate::error::{BridgeError, BridgeResult};
use crate::proxy;
use crate::session::BridgeSession;

/// Convert a Host value into a new Guest reference
pub fn to_guest(session: &BridgeSession, value: &HostValue) -> BridgeResult<GuestValue> {
    convert(session, value, 0)
}

fn convert(session: &BridgeSession, value: &HostValue, depth: usize) -> BridgeResult<GuestValue> {
    let host = session.host();
    let guest = session.guest();
    session
        .tracer()
        .debug(depth, &format!("to_guest {}", value.class_name()));

    match value {
        HostValue::Nil => Ok(guest.none()?),
        HostValue::Str(s) => Ok(guest.new_str(s)?),
        HostValue::Array(_) => {
            let len = host.array_len(value)?;
            let mut items = Vec::with_capacity(len);
            for index in 0..len {
                let item = host.array_at(value, index)?;
                items.push(convert(session, &item, depth + 1)?);
            }
            Ok(guest.new_tuple(&items)?)
        }
        HostValue::Object(_) => {
            if reflect::is_instance_of_class(host.as_ref(), value, session.proxy_class().name()) {
                if let Some(opaque) = proxy::opaque_ref(value) {
                    return proxy::dereference(session, opaque);
                }
            }
            Err(BridgeError::UnsupportedHostType {
                class: value.class_name().to_string(),
            })
        }
    }
}

/// Convert a Guest value into a Host value: `None` becomes `nil`, `str`
/// becomes `String`, a tuple becomes an `Array` of its converted items.
pub fn to_host(session: &BridgeSession, value: &GuestValue) -> BridgeResult<HostValue> {
    match value.kind() {
        Some(GuestKind::None) => Ok(HostValue::Nil),
        Some(GuestKind::Str) => value
            .as_string()
            .map(HostValue::Str)
            .ok_or_else(|| unsupported(session, value)),
        Some(GuestKind::Tuple) => {
            let items = value.tuple_items().ok_or_else(|| unsupported(session, value))?;
            let converted = items
                .iter()
                .map(|item| to_host(session, item))
                .collect::<BridgeResult<Vec<_>>>()?;
            Ok(HostValue::array(converted))
        }
        _ => Err(unsupported(session, value)),
    }
}

/// [`to_host`], falling back to an Opaque Reference Proxy for values with
/// no Host representation
pub fn to_host_or_proxy(session: &BridgeSession, value: &GuestValue) -> BridgeResult<HostValue> {
    match to_host(session, value) {
        Err(BridgeError::UnsupportedGuestType { .. }) => proxy::make_proxy(session, value),
        other => other,
    }
}

fn unsupported(session: &BridgeSession, value: &GuestValue) -> BridgeError {
    let type_name = session
        .guest()
        .type_name(value)
        .unwrap_or_else(|_| "<released>".to_string());
    BridgeError::UnsupportedGuestType { type_name }
}
