//! JSON conversion backed by `serde_json`

use crate::builtins::date_to_iso;
use crate::error::{VmError, VmResult};
use crate::object::{ObjectKind, ObjectRef};
use crate::value::Value;
use crate::vm::Vm;
use serde::Serialize;
use serde_json::{Map, Number};

/// Convert a script value to JSON.
///
/// Returns `None` for values JSON cannot represent at the top level
/// (`undefined` and functions).
pub fn to_json(vm: &Vm, value: &Value) -> VmResult<Option<serde_json::Value>> {
    let mut stack = Vec::new();
    to_json_inner(vm, value, &mut stack)
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn to_json_inner(
    vm: &Vm,
    value: &Value,
    stack: &mut Vec<usize>,
) -> VmResult<Option<serde_json::Value>> {
    let obj = match value {
        Value::Undefined => return Ok(None),
        Value::Null => return Ok(Some(serde_json::Value::Null)),
        Value::Boolean(b) => return Ok(Some(serde_json::Value::Bool(*b))),
        Value::Number(n) => return Ok(Some(number_to_json(*n))),
        Value::String(s) => return Ok(Some(serde_json::Value::String(s.to_string()))),
        Value::Object(obj) => obj,
    };
    if obj.is_callable() {
        return Ok(None);
    }
    if let ObjectKind::Date(ms) = obj.kind() {
        return Ok(Some(
            date_to_iso(*ms).map_or(serde_json::Value::Null, serde_json::Value::String),
        ));
    }
    if stack.contains(&obj.addr()) {
        return Err(VmError::type_error("Converting circular structure to JSON"));
    }
    stack.push(obj.addr());
    let result = object_to_json(vm, obj, value, stack);
    stack.pop();
    result.map(Some)
}

fn object_to_json(
    vm: &Vm,
    obj: &ObjectRef,
    value: &Value,
    stack: &mut Vec<usize>,
) -> VmResult<serde_json::Value> {
    if let Some(items) = obj.array_elements() {
        let mut out = Vec::with_capacity(items.len());
        for item in &items {
            out.push(to_json_inner(vm, item, stack)?.unwrap_or(serde_json::Value::Null));
        }
        return Ok(serde_json::Value::Array(out));
    }
    let keys = if obj.is_proxy() {
        vm.own_keys(value)?
    } else {
        obj.own_enumerable_keys()
    };
    let mut map = Map::new();
    for key in keys {
        let property = vm.get_property(value, &key)?;
        if let Some(json) = to_json_inner(vm, &property, stack)? {
            map.insert(key, json);
        }
    }
    Ok(serde_json::Value::Object(map))
}

/// Convert JSON to a script value
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(items) => Value::array(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            let obj = ObjectRef::ordinary();
            for (key, value) in map {
                obj.set_own(key, from_json(value));
            }
            Value::Object(obj)
        }
    }
}

/// `JSON.stringify(value, _, indent)`
pub fn stringify(vm: &Vm, value: &Value, indent: usize) -> VmResult<Option<String>> {
    let Some(json) = to_json(vm, value)? else {
        return Ok(None);
    };
    let text = if indent == 0 {
        serde_json::to_string(&json)
    } else {
        let indent = " ".repeat(indent.min(10));
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        let written = json.serialize(&mut serializer);
        written.map(|_| String::from_utf8_lossy(&out).into_owned())
    };
    text.map(Some)
        .map_err(|e| VmError::internal(format!("JSON serialization failed: {}", e)))
}

/// `JSON.parse(text)`
pub fn parse(text: &str) -> VmResult<Value> {
    serde_json::from_str::<serde_json::Value>(text)
        .map(|json| from_json(&json))
        .map_err(|e| {
            VmError::syntax_error(
                format!("Unexpected token in JSON: {}", e),
                e.line() as u32,
                e.column() as u32,
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_numbers_have_no_fraction() {
        let vm = Vm::new();
        let value = Value::array(vec![Value::from(1), Value::from(1.5), Value::from(f64::NAN)]);
        assert_eq!(
            stringify(&vm, &value, 0).unwrap().as_deref(),
            Some("[1,1.5,null]")
        );
    }

    #[test]
    fn test_parse_preserves_key_order() {
        let value = parse(r#"{"z":1,"a":[true,null]}"#).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.own_keys(), vec!["z", "a"]);
    }

    #[test]
    fn test_circular_structure() {
        let vm = Vm::new();
        let obj = ObjectRef::ordinary();
        obj.set_own("self", Value::Object(obj.clone()));
        let err = stringify(&vm, &Value::Object(obj.clone()), 0).unwrap_err();
        assert!(matches!(err, VmError::TypeError(_)));
        obj.clear_properties();
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse("{"), Err(VmError::SyntaxError { .. })));
    }
}
