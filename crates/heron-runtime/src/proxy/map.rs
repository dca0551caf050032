//! Map semantics
//!
//! Entries shadow map methods of the same name: `map.size` reads an entry
//! named `size` when one exists, otherwise it is the bound `size()` method.

use super::bound_method;
use crate::error::HeronResult;
use crate::host::{HostMap, HostValue, ParamType, map_type};
use crate::runtime::Runtime;
use heron_vm::Value;

pub(crate) fn get(runtime: &Runtime, map: &HostMap, key: &str) -> HeronResult<Value> {
    if let Some(entry) = map.get(key) {
        return runtime.converter().to_script(runtime, &entry);
    }
    let ty = map_type();
    if ty.dispatch().methods(key).is_empty() {
        return Ok(Value::Undefined);
    }
    Ok(bound_method(runtime, &ty, Some(map.as_object_ref()), key))
}

/// Insert or overwrite; visible to host reads immediately
pub(crate) fn set(runtime: &Runtime, map: &HostMap, key: &str, value: &Value) -> HeronResult<bool> {
    let converted: HostValue = runtime.converter().to_host(runtime, value, &ParamType::Any)?;
    map.insert(key, converted);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use crate::config::ConverterConfig;
    use crate::convert::ValueConverter;
    use crate::host::{HostMap, HostValue};
    use crate::runtime::Runtime;

    fn map_runtime() -> Runtime {
        let runtime = Runtime::new();
        runtime.set_converter(ValueConverter::with_config(ConverterConfig::new().proxy_map(true)));
        runtime
    }

    #[test]
    fn test_entries_shadow_methods() {
        let runtime = map_runtime();
        let _guard = runtime.lock().unwrap();
        let map: HostMap = [("size", "entry")].into_iter().collect();
        runtime.global().set("m", map.clone()).unwrap();
        assert_eq!(runtime.execute_string("m.size").unwrap(), "entry");
        map.remove("size");
        assert_eq!(runtime.execute_string("typeof m.size").unwrap(), "function");
        assert_eq!(runtime.execute_i64("m.size()").unwrap(), 0);
    }

    #[test]
    fn test_write_through_and_delete() {
        let runtime = map_runtime();
        let _guard = runtime.lock().unwrap();
        let map = HostMap::new();
        runtime.global().set("m", map.clone()).unwrap();
        runtime.execute_void("m.a = 1; m['b'] = 'two'; m.put('c', true)").unwrap();
        assert_eq!(map.get("a"), Some(HostValue::Int(1)));
        assert_eq!(map.get("b"), Some(HostValue::from("two")));
        assert_eq!(map.get("c"), Some(HostValue::Bool(true)));
        assert!(runtime.execute_bool("delete m.a; !('a' in m)").unwrap());
        assert_eq!(map.keys(), vec!["b", "c"]);
        assert_eq!(
            runtime.execute_string("JSON.stringify(Object.keys(m))").unwrap(),
            r#"["b","c"]"#
        );
    }
}
