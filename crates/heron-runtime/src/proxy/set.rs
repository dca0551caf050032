//! Set semantics
//!
//! Set methods take priority; any other key reads as `true` when it names a
//! member. Assigning a truthy value adds the key, a falsy one removes it.

use super::bound_method;
use crate::error::HeronResult;
use crate::host::{HostSet, HostValue, set_type};
use crate::runtime::Runtime;
use heron_vm::Value;

pub(crate) fn get(runtime: &Runtime, set: &HostSet, key: &str) -> HeronResult<Value> {
    let ty = set_type();
    if !ty.dispatch().methods(key).is_empty() {
        return Ok(bound_method(runtime, &ty, Some(set.as_object_ref()), key));
    }
    Ok(if set.contains_key(key) {
        Value::Boolean(true)
    } else {
        Value::Undefined
    })
}

pub(crate) fn set(set: &HostSet, key: &str, value: &Value) -> bool {
    if value.truthy() {
        set.insert(HostValue::from(key));
    } else {
        set.remove_key(key);
    }
    true
}

#[cfg(test)]
mod tests {
    use crate::config::ConverterConfig;
    use crate::convert::ValueConverter;
    use crate::host::{HostSet, HostValue};
    use crate::runtime::Runtime;

    #[test]
    fn test_set_proxy_semantics() {
        let runtime = Runtime::new();
        runtime.set_converter(ValueConverter::with_config(ConverterConfig::new().proxy_set(true)));
        let _guard = runtime.lock().unwrap();
        let set: HostSet = ["x", "y"].into_iter().collect();
        runtime.global().set("s", set.clone()).unwrap();

        assert!(runtime.execute_bool("s.contains('x')").unwrap());
        assert!(runtime.execute_bool("s.add('z')").unwrap());
        assert!(!runtime.execute_bool("s.add('x')").unwrap());
        assert!(runtime.execute_bool("s.x === true && 'y' in s").unwrap());
        runtime.execute_void("s.w = 1; s.y = false").unwrap();
        assert_eq!(set.keys(), vec!["x", "z", "w"]);
        assert!(runtime.execute_bool("delete s.x").unwrap());
        assert!(!set.contains(&HostValue::from("x")));
        assert_eq!(
            runtime.execute_string("JSON.stringify(Object.getOwnPropertyNames(s))").unwrap(),
            r#"["z","w"]"#
        );
    }
}
