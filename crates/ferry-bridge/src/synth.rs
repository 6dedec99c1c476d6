//! Dynamic Type Synthesizer
//!
//! Builds a Guest type whose methods call back into a Host object. All
//! checks run before anything is published, so a rejected definition leaves
//! the module namespace and the active binding untouched.

use std::sync::Arc;

use ferry_guest::{is_identifier, GuestKind, GuestValue, RESERVED_ATTRIBUTES};
use ferry_host::HostValue;

use crate::dispatch::CallbackTarget;
use crate::error::{BridgeError, BridgeResult};
use crate::session::{ActiveBinding, BridgeSession};

/// Define `class_name` in the session's Guest module as a subtype of the
/// type `base` resolves to, with one method per name in `method_names`.
pub fn define_class(
    session: &BridgeSession,
    origin: &HostValue,
    class_name: &str,
    base: &str,
    method_names: &[String],
) -> BridgeResult<()> {
    let guest = session.guest();
    let tracer = session.tracer();
    tracer.debug(
        0,
        &format!("define_class {}({}) {:?}", class_name, base, method_names),
    );

    validate_names(class_name, method_names)?;

    let module = session.module()?;
    let lowered = class_name.to_lowercase();
    if let Some(existing) = guest
        .dir(&module)?
        .into_iter()
        .find(|name| name.to_lowercase() == lowered)
    {
        return Err(BridgeError::ClassDefinition(format!(
            "'{}' is already defined in module {} as '{}'",
            class_name,
            session.config().module,
            existing
        )));
    }

    let base_type = resolve_base(session, base)?;

    let target = Arc::new(CallbackTarget::new(session, origin.clone(), class_name));
    let mut namespace: Vec<(String, GuestValue)> = Vec::with_capacity(method_names.len());
    for name in method_names {
        let bound = guest.new_str(name)?;
        let target = target.clone();
        let method = guest.new_function(name, Some(&bound), move |call| target.dispatch(call))?;
        namespace.push((name.clone(), method));
    }

    let ty = guest
        .new_type(class_name, &[base_type], &namespace)
        .map_err(|e| BridgeError::ClassDefinition(e.message))?;

    session.registry_call("set_globals", &[guest.new_str(class_name)?, ty])?;
    session.set_active_binding(ActiveBinding {
        origin: origin.clone(),
        class_name: class_name.to_string(),
    });
    tracer.debug(0, &format!("define_class {} published", class_name));
    Ok(())
}

fn validate_names(class_name: &str, method_names: &[String]) -> BridgeResult<()> {
    if !is_identifier(class_name) {
        return Err(BridgeError::ClassDefinition(format!(
            "invalid class name '{}'",
            class_name
        )));
    }
    for (i, name) in method_names.iter().enumerate() {
        if !is_identifier(name) {
            return Err(BridgeError::ClassDefinition(format!(
                "invalid method name '{}'",
                name
            )));
        }
        if RESERVED_ATTRIBUTES.contains(&name.as_str()) {
            return Err(BridgeError::ClassDefinition(format!(
                "method name '{}' is reserved",
                name
            )));
        }
        if method_names[..i].contains(name) {
            return Err(BridgeError::ClassDefinition(format!(
                "method name '{}' is listed twice",
                name
            )));
        }
    }
    Ok(())
}

fn resolve_base(session: &BridgeSession, base: &str) -> BridgeResult<GuestValue> {
    let name = session.guest().new_str(base)?;
    let resolved = match session.registry_call("resolve_function", &[name]) {
        Ok(resolved) => resolved,
        Err(BridgeError::GuestRuntimeFault { message, .. }) => {
            return Err(BridgeError::ClassDefinition(format!(
                "cannot resolve base type '{}': {}",
                base, message
            )))
        }
        Err(e) => return Err(e),
    };
    if resolved.kind() != Some(GuestKind::Type) {
        return Err(BridgeError::ClassDefinition(format!(
            "base '{}' is not a type",
            base
        )));
    }
    Ok(resolved)
}
