//! Generic object semantics
//!
//! Reads resolve bean getter, then field, then bound method. Writes resolve
//! bean setter, then writable field; anything else is immutable. Members are
//! looked up in the cached dispatch table of the object's type.

use super::bound_method;
use crate::error::{HeronError, HeronResult};
use crate::host::{HostObjectRef, ParamType};
use crate::runtime::Runtime;
use heron_vm::Value;

pub(crate) fn get(runtime: &Runtime, obj: &HostObjectRef, key: &str) -> HeronResult<Value> {
    let ty = obj.host_type();
    let table = ty.dispatch();
    if let Some(getter) = table.getter(key) {
        let value = getter.invoke(Some(obj), &[])?;
        return runtime.converter().to_script(runtime, &value);
    }
    if let Some(field) = table.field(key) {
        return runtime.converter().to_script(runtime, &field.get(obj));
    }
    if !table.methods(key).is_empty() {
        return Ok(bound_method(runtime, &ty, Some(obj.clone()), key));
    }
    Ok(Value::Undefined)
}

pub(crate) fn set(runtime: &Runtime, obj: &HostObjectRef, key: &str, value: &Value) -> HeronResult<bool> {
    let ty = obj.host_type();
    let table = ty.dispatch();
    let converter = runtime.converter();
    if let Some(setter) = table.setter(key) {
        let param = setter.params().first().unwrap_or(&ParamType::Any);
        let converted = converter.to_host(runtime, value, param)?;
        setter.invoke(Some(obj), &[converted])?;
        return Ok(true);
    }
    match table.field(key) {
        Some(field) if !field.is_final() => {
            let converted = converter.to_host(runtime, value, field.ty())?;
            field.set(ty.name(), obj, converted)?;
            Ok(true)
        }
        _ => Err(HeronError::immutable(ty.name(), key)),
    }
}

pub(crate) fn has(obj: &HostObjectRef, key: &str) -> bool {
    obj.host_type().dispatch().has_member(key)
}

pub(crate) fn own_keys(obj: &HostObjectRef) -> Vec<String> {
    obj.host_type().dispatch().property_names()
}
