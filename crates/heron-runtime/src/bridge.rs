//! Functional interface bridge
//!
//! Wraps a script function, or an object literal whose properties name every
//! abstract method, as a host object implementing an interface. Calls from
//! the host lock the owning runtime, convert arguments to script, invoke and
//! convert the result to the declared return type.
//!
//! The bridge holds only a weak reference to its runtime. Closing the binding
//! releases the script value; later calls fail with `BindingClosed`.

use crate::error::{HeronError, HeronResult};
use crate::host::{AbstractMethod, HostFunction, HostObject, HostObjectRef, HostType, HostValue, ParamType};
use crate::runtime::{Runtime, WeakRuntime};
use heron_vm::{ObjectKind, Value};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindingKind {
    /// Every abstract method maps to the one function
    Function,
    /// Methods map to same-named properties
    Object,
}

/// Host object implemented by a script function or object
pub struct ScriptBackedObject {
    interface: HostType,
    runtime: WeakRuntime,
    runtime_id: u64,
    target: Mutex<Option<Value>>,
    kind: BindingKind,
}

/// Interface type of bare script callables
pub fn function_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::interface("Function")
            .abstract_method_variadic("call", vec![], Some(ParamType::Any), ParamType::Any)
            .build()
    })
    .clone()
}

impl ScriptBackedObject {
    fn new(runtime: &Runtime, value: &Value, interface: &HostType, kind: BindingKind) -> Self {
        Self {
            interface: interface.clone(),
            runtime: runtime.downgrade(),
            runtime_id: runtime.id(),
            target: Mutex::new(Some(value.clone())),
            kind,
        }
    }

    /// Bind a script function or object literal to `interface`
    pub(crate) fn bind(runtime: &Runtime, value: &Value, interface: &HostType) -> HeronResult<HostValue> {
        let Some(obj) = value.as_object() else {
            return Err(HeronError::conversion(interface.name(), value.type_of()));
        };
        let kind = if obj.is_callable() {
            BindingKind::Function
        } else if matches!(obj.kind(), ObjectKind::Ordinary) {
            for method in interface.abstract_methods() {
                let property = runtime.vm().get_property(value, &method.name)?;
                if !property.is_callable() {
                    return Err(HeronError::MissingMethod {
                        interface: interface.name().to_string(),
                        method: method.name,
                    });
                }
            }
            BindingKind::Object
        } else {
            return Err(HeronError::conversion(
                interface.name(),
                crate::convert::shape_of(value),
            ));
        };
        trace!(interface = interface.name(), ?kind, "binding script value to interface");
        Ok(HostValue::object(Self::new(runtime, value, interface, kind)))
    }

    /// Wrap a script callable as a host function
    pub(crate) fn function(runtime: &Runtime, value: &Value) -> HostFunction {
        let name = value
            .as_object()
            .and_then(|obj| obj.as_function())
            .map(|f| f.name().to_string())
            .unwrap_or_default();
        let backing = Arc::new(Self::new(runtime, value, &function_type(), BindingKind::Function));
        let invoker = backing.clone();
        HostFunction::backed_by(name, backing as HostObjectRef, move |args| {
            invoker.call(None, "call", args)
        })
    }

    pub fn interface(&self) -> &HostType {
        &self.interface
    }

    /// Id of the owning runtime
    pub fn runtime_id(&self) -> u64 {
        self.runtime_id
    }

    /// The bound script value, until closed
    pub fn script_value(&self) -> Option<Value> {
        self.target.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.target.lock().is_none()
    }

    fn call(&self, method: Option<&AbstractMethod>, name: &str, args: &[HostValue]) -> HeronResult<HostValue> {
        let runtime = self.runtime.upgrade().ok_or(HeronError::RuntimeClosed)?;
        if runtime.is_closed() {
            return Err(HeronError::RuntimeClosed);
        }
        let _guard = runtime.lock()?;
        let target = self.target.lock().clone().ok_or(HeronError::BindingClosed)?;
        let converter = runtime.converter();

        let flattened = spread_variadic(method, args);
        let script_args = flattened
            .iter()
            .map(|arg| converter.to_script(&runtime, arg))
            .collect::<HeronResult<Vec<_>>>()?;

        let vm = runtime.vm();
        let (callee, this) = match self.kind {
            BindingKind::Function => (target, Value::Undefined),
            BindingKind::Object => (vm.get_property(&target, name)?, target),
        };
        if !callee.is_callable() {
            return Err(HeronError::NoSuchMethod {
                type_name: self.interface.name().to_string(),
                method: name.to_string(),
                arity: args.len(),
            });
        }
        let result = vm
            .call(&callee, &this, &script_args)
            .map_err(|err| HeronError::execution(err.to_string()))?;

        match method.map(|m| &m.returns) {
            Some(ParamType::Void) => Ok(HostValue::Null),
            Some(returns) => converter.to_host(&runtime, &result, returns),
            None => converter.to_host(&runtime, &result, &ParamType::Any),
        }
    }
}

impl ScriptBackedObject {
    /// Run the script object's own `close`, if it has one
    fn forward_close(&self) -> HeronResult<()> {
        match self.call(None, "close", &[]) {
            Ok(_) | Err(HeronError::NoSuchMethod { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Spread a packed trailing list into positional arguments for variadic methods
fn spread_variadic(method: Option<&AbstractMethod>, args: &[HostValue]) -> Vec<HostValue> {
    let Some(method) = method.filter(|m| m.variadic.is_some()) else {
        return args.to_vec();
    };
    let fixed = method.params.len();
    match args {
        [head @ .., HostValue::List(tail)] if head.len() == fixed => {
            head.iter().chain(tail.iter()).cloned().collect()
        }
        _ => args.to_vec(),
    }
}

impl HostObject for ScriptBackedObject {
    fn host_type(&self) -> HostType {
        self.interface.clone()
    }

    fn dispatch(&self, method: &str, args: &[HostValue]) -> Option<HeronResult<HostValue>> {
        if method == "close" {
            let forwarded = match self.kind {
                BindingKind::Object if !self.is_closed() => self.forward_close(),
                _ => Ok(()),
            };
            return Some(self.close().and(forwarded).map(|()| HostValue::Null));
        }
        match self.interface.find_abstract(method) {
            Some(abstract_method) => Some(self.call(Some(&abstract_method), method, args)),
            None if self.kind == BindingKind::Object => Some(self.call(None, method, args)),
            None => None,
        }
    }

    fn close(&self) -> HeronResult<()> {
        let released = self.target.lock().take();
        if released.is_some() {
            trace!(interface = self.interface.name(), "script binding closed");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} (script)", self.interface.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joiner_type() -> HostType {
        HostType::interface("Joiner")
            .abstract_method("join", vec![ParamType::String, ParamType::String], ParamType::String)
            .build()
    }

    #[test]
    fn test_arrow_function_implements_interface() {
        let runtime = Runtime::new();
        let joiner = {
            let _guard = runtime.lock().unwrap();
            runtime
                .execute_as("(a, b) => [a, b].join(',')", &ParamType::Object(joiner_type()))
                .unwrap()
        };
        // the bridge locks the runtime itself
        let joined = joiner.invoke("join", &["a".into(), "b".into()]).unwrap();
        assert_eq!(joined, HostValue::from("a,b"));
        let nested = joiner.invoke("join", &[joined, "c".into()]).unwrap();
        assert_eq!(nested, HostValue::from("a,b,c"));
    }

    #[test]
    fn test_missing_method_is_reported() {
        let runtime = Runtime::new();
        let _guard = runtime.lock().unwrap();
        let err = runtime
            .execute_as("({ split: (s) => s })", &ParamType::Object(joiner_type()))
            .unwrap_err();
        assert!(matches!(
            err,
            HeronError::MissingMethod { ref method, .. } if method == "join"
        ));
    }

    #[test]
    fn test_closed_binding_fails() {
        let runtime = Runtime::new();
        let _guard = runtime.lock().unwrap();
        let joiner = runtime
            .execute_as("(a, b) => a + b", &ParamType::Object(joiner_type()))
            .unwrap();
        joiner.invoke("close", &[]).unwrap();
        assert!(matches!(
            joiner.invoke("join", &["a".into(), "b".into()]),
            Err(HeronError::BindingClosed)
        ));
    }

    #[test]
    fn test_script_errors_become_execution_errors() {
        let runtime = Runtime::new();
        let _guard = runtime.lock().unwrap();
        let joiner = runtime
            .execute_as("(a, b) => { throw new Error('no ' + a) }", &ParamType::Object(joiner_type()))
            .unwrap();
        match joiner.invoke("join", &["x".into(), "y".into()]) {
            Err(HeronError::Execution { message }) => assert!(message.contains("no x")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_runtime_gone() {
        let joiner = {
            let runtime = Runtime::new();
            let _guard = runtime.lock().unwrap();
            runtime
                .execute_as("(a, b) => a + b", &ParamType::Object(joiner_type()))
                .unwrap()
        };
        assert!(matches!(
            joiner.invoke("join", &["a".into(), "b".into()]),
            Err(HeronError::RuntimeClosed)
        ));
    }

    #[test]
    fn test_variadic_tail_is_spread() {
        let method = AbstractMethod {
            name: "join".to_string(),
            params: vec![],
            variadic: Some(ParamType::String),
            returns: ParamType::String,
        };
        let packed = [HostValue::List(vec!["a".into(), "b".into()])];
        assert_eq!(spread_variadic(Some(&method), &packed), vec![HostValue::from("a"), HostValue::from("b")]);
        let flat = [HostValue::from("a"), HostValue::from("b")];
        assert_eq!(spread_variadic(Some(&method), &flat).len(), 2);
    }
}
