//! Callable host functions

use crate::error::HeronResult;
use crate::host::{HostFunction, HostValue, ParamType};
use crate::runtime::Runtime;
use heron_vm::{Value, arg};

/// Convert arguments positionally (declared types, else `Any`), call, convert the result
pub(crate) fn apply(runtime: &Runtime, function: &HostFunction, args: &[Value]) -> HeronResult<Value> {
    let converter = runtime.converter();
    let host_args = match function.params() {
        Some(params) => params
            .iter()
            .enumerate()
            .map(|(i, param)| converter.to_host(runtime, &arg(args, i), param))
            .collect::<HeronResult<Vec<HostValue>>>()?,
        None => args
            .iter()
            .map(|value| converter.to_host(runtime, value, &ParamType::Any))
            .collect::<HeronResult<Vec<HostValue>>>()?,
    };
    let result = function.call(&host_args)?;
    if matches!(function.returns(), ParamType::Void) {
        return Ok(Value::Undefined);
    }
    converter.to_script(runtime, &result)
}

pub(crate) fn get(function: &HostFunction, key: &str) -> Value {
    match key {
        "name" => Value::from(function.name()),
        "length" => Value::from(function.params().map_or(0, <[ParamType]>::len)),
        _ => Value::Undefined,
    }
}

pub(crate) fn has(key: &str) -> bool {
    matches!(key, "name" | "length")
}

pub(crate) fn own_keys() -> Vec<String> {
    vec!["length".to_string(), "name".to_string()]
}

#[cfg(test)]
mod tests {
    use crate::error::HeronError;
    use crate::host::{HostFunction, HostValue, ParamType};
    use crate::runtime::Runtime;

    #[test]
    fn test_host_function_called_from_script() {
        let runtime = Runtime::new();
        let _guard = runtime.lock().unwrap();
        let repeat = HostFunction::typed(
            "repeat",
            vec![ParamType::String, ParamType::Int],
            ParamType::List,
            |args| {
                let text = args[0].as_str().unwrap_or_default();
                let times = args[1].as_i64().unwrap_or(0).max(0) as usize;
                Ok(HostValue::List(vec![HostValue::from(text); times]))
            },
        );
        runtime.global().set("repeat", repeat).unwrap();
        assert_eq!(runtime.execute_string("repeat('ab', 3).join('-')").unwrap(), "ab-ab-ab");
        assert!(runtime.execute_bool("Array.isArray(repeat('x', 1))").unwrap());
        assert_eq!(runtime.execute_string("repeat.name").unwrap(), "repeat");
        assert_eq!(runtime.execute_i64("repeat.length").unwrap(), 2);
    }

    #[test]
    fn test_host_failure_becomes_script_error() {
        let runtime = Runtime::new();
        let _guard = runtime.lock().unwrap();
        let fail = HostFunction::new("fail", |_| Err(HeronError::host("disk on fire")));
        runtime.global().set("fail", fail).unwrap();
        let caught = runtime.execute("fail()").unwrap_err();
        assert!(caught.to_string().contains("disk on fire"));
    }
}
