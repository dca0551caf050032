//! Type-token semantics
//!
//! A type in script reads static fields and static methods, answers
//! `isAssignableFrom` and `name`, and constructs instances with `new`.

use super::{bound_method, call_overloaded, host_target};
use crate::error::{HeronError, HeronResult};
use crate::host::{HostType, HostValue, MethodDescriptor};
use crate::runtime::Runtime;
use heron_vm::{Value, arg, native_function};

pub(crate) fn get(runtime: &Runtime, ty: &HostType, key: &str) -> HeronResult<Value> {
    if let Some(field) = ty.static_field(key) {
        return runtime.converter().to_script(runtime, &field.get());
    }
    if ty.has_static_method(key) {
        return Ok(bound_method(runtime, ty, None, key));
    }
    Ok(match key {
        "isAssignableFrom" => {
            let this_type = ty.clone();
            native_function("isAssignableFrom", move |_vm, _this, args| {
                let other = arg(args, 0);
                let assignable = match host_target(&other) {
                    Some(HostValue::Type(other)) => this_type.is_assignable_from(other),
                    _ => false,
                };
                Ok(Value::Boolean(assignable))
            })
        }
        "name" => Value::from(ty.name()),
        _ => Value::Undefined,
    })
}

pub(crate) fn set(runtime: &Runtime, ty: &HostType, key: &str, value: &Value) -> HeronResult<bool> {
    let Some(field) = ty.static_field(key) else {
        return Err(HeronError::immutable(ty.name(), key));
    };
    if field.is_final() {
        return Err(HeronError::immutable(ty.name(), key));
    }
    let converted = runtime.converter().to_host(runtime, value, field.ty())?;
    field.set(ty.name(), converted)?;
    Ok(true)
}

pub(crate) fn has(ty: &HostType, key: &str) -> bool {
    ty.static_field(key).is_some()
        || ty.has_static_method(key)
        || matches!(key, "isAssignableFrom" | "name")
}

pub(crate) fn own_keys(ty: &HostType) -> Vec<String> {
    let mut keys = ty.static_field_names();
    for method in ["values", "valueOf"] {
        if ty.is_enum() && !keys.iter().any(|k| k == method) {
            keys.push(method.to_string());
        }
    }
    keys
}

pub(crate) fn construct(runtime: &Runtime, ty: &HostType, args: &[Value]) -> HeronResult<Value> {
    let candidates: Vec<&MethodDescriptor> = ty.constructors().iter().collect();
    if candidates.is_empty() {
        return Err(HeronError::host(format!("{} has no public constructor", ty.name())));
    }
    call_overloaded(runtime, &candidates, None, args, ty.name(), "<init>")
}
