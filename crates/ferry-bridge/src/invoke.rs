//! Function Invoker
//!
//! Every Guest reference taken here is a [`GuestValue`] local, so the
//! callable, the converted arguments and the result are released on every
//! exit path, errors included.

use ferry_guest::{registry, GuestException, GuestKind, GuestValue};
use ferry_host::HostValue;

use crate::convert;
use crate::error::{BridgeError, BridgeResult};
use crate::proxy;
use crate::session::BridgeSession;

/// Call the module function `name`.
///
/// Absent `args` means no arguments. A sequence is spread into positional
/// arguments; any other value (`nil` included) is passed as the single
/// argument, so `"x"` and `["x"]` make the same call.
pub fn call_function(
    session: &BridgeSession,
    name: &str,
    args: Option<&HostValue>,
) -> BridgeResult<Option<HostValue>> {
    let guest = session.guest();
    let tracer = session.tracer();
    tracer.debug(0, &format!("call_function {}", name));

    let module = session.module()?;
    let callable = match guest.getattr(&module, name) {
        Ok(callable) => callable,
        Err(e) if e.is("AttributeError") => return Err(BridgeError::FunctionNotFound(name.to_string())),
        Err(e) => return Err(e.into()),
    };
    if !callable.kind().is_some_and(GuestKind::is_callable) {
        tracer.warn(&format!("{} is not callable", name));
        return Err(BridgeError::FunctionNotFound(name.to_string()));
    }

    let call_args = match args {
        None => Vec::new(),
        Some(value) => spread(convert::to_guest(session, value)?),
    };

    let result = guest.call(&callable, &call_args)?;
    if result.is_none() {
        tracer.debug(0, &format!("call_function {} -> None", name));
        return Ok(None);
    }
    convert::to_host(session, &result).map(Some)
}

fn spread(value: GuestValue) -> Vec<GuestValue> {
    match value.kind() {
        Some(GuestKind::Tuple) => value.tuple_items().unwrap_or_default(),
        _ => vec![value],
    }
}

/// Send message `name` to the Guest object `proxy` denotes.
///
/// The attribute name is matched exactly first, then ignoring case, so Host
/// messages (which are case-insensitive) reach Guest attributes.
///
/// - `name=` sets the attribute to the first argument and answers it.
/// - A callable attribute is called with the converted arguments, following
///   the registry's trailing keyword-dict convention.
/// - Any other attribute is answered as is; the arguments are ignored.
///
/// The answer is converted with [`convert::to_host_or_proxy`].
pub fn call_method(
    session: &BridgeSession,
    proxy: &HostValue,
    name: &str,
    args: &[HostValue],
) -> BridgeResult<HostValue> {
    let guest = session.guest();
    let target = dereference(session, proxy)?;
    session
        .tracer()
        .debug(0, &format!("call_method {} ({} args)", name, args.len()));

    let attrs = guest.dir(&target)?;
    let find = |wanted: &str| {
        attrs
            .iter()
            .find(|attr| *attr == wanted)
            .or_else(|| attrs.iter().find(|attr| attr.eq_ignore_ascii_case(wanted)))
            .cloned()
    };

    if let Some(attr) = name.strip_suffix('=') {
        let value = args.first().ok_or_else(|| {
            BridgeError::from(GuestException::type_error(format!(
                "'{}' takes exactly one argument",
                name
            )))
        })?;
        let attr = find(attr).unwrap_or_else(|| attr.to_string());
        let converted = convert::to_guest(session, value)?;
        guest.setattr(&target, &attr, &converted)?;
        return convert::to_host_or_proxy(session, &converted);
    }

    let attr = find(name).ok_or_else(|| {
        let type_name = guest
            .type_name(&target)
            .unwrap_or_else(|_| "<released>".to_string());
        BridgeError::FunctionNotFound(format!("{}.{}", type_name, name))
    })?;
    let value = guest.getattr(&target, &attr)?;
    if !value.kind().is_some_and(GuestKind::is_callable) {
        return convert::to_host_or_proxy(session, &value);
    }

    let converted = args
        .iter()
        .map(|arg| convert::to_guest(session, arg))
        .collect::<BridgeResult<Vec<_>>>()?;
    let result = registry::call_with_arguments(guest, &value, &converted)?;
    convert::to_host_or_proxy(session, &result)
}

/// `str()` of the Guest object `proxy` denotes
pub fn string_value(session: &BridgeSession, proxy: &HostValue) -> BridgeResult<String> {
    let target = dereference(session, proxy)?;
    Ok(session.guest().str_of(&target)?)
}

fn dereference(session: &BridgeSession, value: &HostValue) -> BridgeResult<GuestValue> {
    let opaque = proxy::opaque_ref(value).ok_or_else(|| BridgeError::UnsupportedHostType {
        class: value.class_name().to_string(),
    })?;
    proxy::dereference(session, opaque)
}
