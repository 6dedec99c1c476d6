//! Reflection helpers exposed to Host code

use crate::context::HostContext;
use crate::value::HostValue;

/// Check if a value is a Host string
pub fn is_string(value: &HostValue) -> bool {
    matches!(value, HostValue::Str(_))
}

/// Check if a value is an instance of the named class.
///
/// Returns `false` when no class with that name is registered.
pub fn is_instance_of_class(ctx: &dyn HostContext, value: &HostValue, class_name: &str) -> bool {
    match ctx.find_class(class_name) {
        Some(class) => ctx.is_instance_of(value, &class),
        None => false,
    }
}
