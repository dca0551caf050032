//! Script-visible proxies over live host values
//!
//! One handler type, [`HostProxy`], serves every shape; the per-shape trap
//! semantics live in the submodules. Proxies are memoised per runtime in
//! [`ProxyBindings`], keyed by host identity and mode, so repeated crossings
//! of the same host value yield the same script object.

pub mod function;
pub mod map;
pub mod object;
pub mod set;
pub mod type_token;

use crate::convert::coerce;
use crate::error::{HeronError, HeronResult};
use crate::host::{HostObjectRef, HostType, HostValue, MethodDescriptor, ParamType};
use crate::runtime::{Runtime, WeakRuntime};
use dashmap::DashMap;
use heron_vm::{ObjectRef, ProxyHandler, Value, Vm, VmResult, WeakObjectRef, native_function};
use std::any::Any;
use std::sync::Arc;
use tracing::trace;

/// Proxy semantics selected by the conversion rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyMode {
    Map,
    Set,
    Object,
    Enum,
    Type,
    Function,
}

/// Proxy handler over a live host value
pub struct HostProxy {
    target: HostValue,
    mode: ProxyMode,
    runtime: WeakRuntime,
}

impl HostProxy {
    /// The proxied host value
    pub fn target(&self) -> &HostValue {
        &self.target
    }

    pub fn mode(&self) -> ProxyMode {
        self.mode
    }

    fn runtime(&self) -> VmResult<Runtime> {
        self.runtime
            .upgrade()
            .ok_or_else(|| HeronError::RuntimeClosed.into_vm_error())
    }

    fn object_ref(&self) -> HeronResult<HostObjectRef> {
        self.target
            .as_object_ref()
            .ok_or_else(|| HeronError::conversion("object", self.target.kind_name()))
    }

    fn trap<T>(&self, op: impl FnOnce(&Runtime) -> HeronResult<T>) -> VmResult<T> {
        let runtime = self.runtime()?;
        op(&runtime).map_err(HeronError::into_vm_error)
    }
}

impl ProxyHandler for HostProxy {
    fn get(&self, _vm: &Vm, key: &str) -> VmResult<Value> {
        self.trap(|runtime| match (&self.mode, &self.target) {
            (ProxyMode::Map, HostValue::Map(map)) => map::get(runtime, map, key),
            (ProxyMode::Set, HostValue::Set(set)) => set::get(runtime, set, key),
            (ProxyMode::Type, HostValue::Type(ty)) => type_token::get(runtime, ty, key),
            (ProxyMode::Function, HostValue::Function(f)) => Ok(function::get(f, key)),
            _ => object::get(runtime, &self.object_ref()?, key),
        })
    }

    fn set(&self, _vm: &Vm, key: &str, value: Value) -> VmResult<bool> {
        self.trap(|runtime| match (&self.mode, &self.target) {
            (ProxyMode::Map, HostValue::Map(map)) => map::set(runtime, map, key, &value),
            (ProxyMode::Set, HostValue::Set(set)) => Ok(set::set(set, key, &value)),
            (ProxyMode::Type, HostValue::Type(ty)) => type_token::set(runtime, ty, key, &value),
            (ProxyMode::Enum, HostValue::Enum(c)) => {
                Err(HeronError::immutable(c.type_name(), key))
            }
            (ProxyMode::Function, _) => Ok(false),
            _ => object::set(runtime, &self.object_ref()?, key, &value),
        })
    }

    fn has(&self, _vm: &Vm, key: &str) -> VmResult<bool> {
        self.trap(|_| match (&self.mode, &self.target) {
            (ProxyMode::Map, HostValue::Map(map)) => Ok(map.contains_key(key)),
            (ProxyMode::Set, HostValue::Set(set)) => Ok(set.contains_key(key)),
            (ProxyMode::Type, HostValue::Type(ty)) => Ok(type_token::has(ty, key)),
            (ProxyMode::Function, HostValue::Function(_)) => Ok(function::has(key)),
            _ => Ok(object::has(&self.object_ref()?, key)),
        })
    }

    fn delete(&self, _vm: &Vm, key: &str) -> VmResult<bool> {
        self.trap(|_| match (&self.mode, &self.target) {
            (ProxyMode::Map, HostValue::Map(map)) => {
                map.remove(key);
                Ok(true)
            }
            (ProxyMode::Set, HostValue::Set(set)) => {
                set.remove_key(key);
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    fn own_keys(&self, _vm: &Vm) -> VmResult<Vec<String>> {
        self.trap(|_| match (&self.mode, &self.target) {
            (ProxyMode::Map, HostValue::Map(map)) => Ok(map.keys()),
            (ProxyMode::Set, HostValue::Set(set)) => Ok(set.keys()),
            (ProxyMode::Type, HostValue::Type(ty)) => Ok(type_token::own_keys(ty)),
            (ProxyMode::Function, HostValue::Function(_)) => Ok(function::own_keys()),
            _ => Ok(object::own_keys(&self.object_ref()?)),
        })
    }

    fn apply(&self, _vm: &Vm, _this: &Value, args: &[Value]) -> VmResult<Value> {
        self.trap(|runtime| match &self.target {
            HostValue::Function(f) => function::apply(runtime, f, args),
            HostValue::Type(ty) => type_token::construct(runtime, ty, args),
            other => Err(HeronError::host(format!("{} is not callable", other.kind_name()))),
        })
    }

    fn construct(&self, _vm: &Vm, args: &[Value]) -> VmResult<Value> {
        self.trap(|runtime| match &self.target {
            HostValue::Type(ty) => type_token::construct(runtime, ty, args),
            other => Err(HeronError::host(format!(
                "{} is not a constructor",
                other.kind_name()
            ))),
        })
    }

    fn is_callable(&self) -> bool {
        matches!(self.mode, ProxyMode::Function | ProxyMode::Type)
    }

    fn describe(&self) -> String {
        match &self.target {
            HostValue::Map(map) => {
                let entries: Vec<String> = map
                    .entries()
                    .iter()
                    .map(|(k, v)| format!("{}={:?}", k, v))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            HostValue::Set(set) => {
                let members: Vec<String> = set.keys();
                format!("[{}]", members.join(", "))
            }
            HostValue::Type(ty) => format!("{:?}", ty.kind()).to_lowercase() + " " + ty.name(),
            HostValue::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
            HostValue::Enum(c) => c.name().to_string(),
            HostValue::Object(obj) => obj.describe(),
            other => format!("{:?}", other),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Host value behind a live (unrevoked) host proxy
pub fn host_target(value: &Value) -> Option<&HostValue> {
    let proxy = value.as_object()?.as_proxy()?;
    proxy
        .handler()?
        .as_any()
        .downcast_ref::<HostProxy>()
        .map(HostProxy::target)
}

/// Proxy for `value` in `mode`, reusing a live binding when one exists
pub(crate) fn bind(runtime: &Runtime, value: &HostValue, mode: ProxyMode) -> HeronResult<Value> {
    let id = value
        .identity()
        .ok_or_else(|| HeronError::conversion("proxy", value.kind_name()))?;
    let bindings = runtime.bindings();
    if let Some(existing) = bindings.lookup(id, mode) {
        return Ok(Value::Object(existing));
    }
    let handler = HostProxy {
        target: value.clone(),
        mode,
        runtime: runtime.downgrade(),
    };
    let proxy = ObjectRef::proxy(Arc::new(handler));
    bindings.insert(id, mode, &proxy);
    trace!(runtime = runtime.id(), ?mode, kind = %value.kind_name(), "bound host proxy");
    Ok(Value::Object(proxy))
}

/// Per-runtime proxy identity table
///
/// Entries are weak: a binding never keeps a proxy alive.
#[derive(Default)]
pub struct ProxyBindings {
    entries: DashMap<(usize, ProxyMode), WeakObjectRef>,
}

impl ProxyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live proxy bound to a host identity
    pub fn lookup(&self, id: usize, mode: ProxyMode) -> Option<ObjectRef> {
        self.entries.get(&(id, mode)).and_then(|weak| weak.upgrade())
    }

    pub fn insert(&self, id: usize, mode: ProxyMode, proxy: &ObjectRef) {
        self.entries.insert((id, mode), proxy.downgrade());
    }

    /// Drop every binding pointing at `proxy`
    pub fn remove_proxy(&self, proxy: &ObjectRef) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, weak| weak.upgrade().is_none_or(|live| &live != proxy));
        before - self.entries.len()
    }

    /// Drop bindings whose proxy is gone
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.is_alive());
        let swept = before - self.entries.len();
        if swept > 0 {
            trace!(swept, "swept dead proxy bindings");
        }
        swept
    }

    /// Revoke every live proxy and clear the table
    pub fn clear(&self) {
        let proxies: Vec<ObjectRef> = self
            .entries
            .iter()
            .filter_map(|entry| entry.value().upgrade())
            .collect();
        self.entries.clear();
        for proxy in &proxies {
            if let Some(proxy) = proxy.as_proxy() {
                proxy.revoke();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve an overload for script arguments, invoke it and convert the result
pub(crate) fn call_overloaded(
    runtime: &Runtime,
    candidates: &[&MethodDescriptor],
    receiver: Option<&HostObjectRef>,
    args: &[Value],
    type_name: &str,
    method: &str,
) -> HeronResult<Value> {
    let descriptor = coerce::select(candidates, args, coerce::match_cost).ok_or_else(|| {
        HeronError::NoSuchMethod {
            type_name: type_name.to_string(),
            method: method.to_string(),
            arity: args.len(),
        }
    })?;
    let converter = runtime.converter();
    let packed = coerce::pack(descriptor, args, |arg, param| {
        converter.to_host(runtime, arg, param)
    })?;
    let result = descriptor.invoke(receiver, &packed)?;
    if matches!(descriptor.returns(), ParamType::Void) {
        return Ok(Value::Undefined);
    }
    converter.to_script(runtime, &result)
}

/// A script function invoking an instance (or static) method by name
pub(crate) fn bound_method(
    runtime: &Runtime,
    owner: &HostType,
    receiver: Option<HostObjectRef>,
    name: &str,
) -> Value {
    let weak = runtime.downgrade();
    let owner = owner.clone();
    let method = name.to_string();
    native_function(name, move |_vm, _this, args| {
        let runtime = weak
            .upgrade()
            .ok_or_else(|| HeronError::RuntimeClosed.into_vm_error())?;
        let result = match &receiver {
            Some(receiver) => {
                let candidates: Vec<&MethodDescriptor> =
                    owner.dispatch().methods(&method).iter().collect();
                call_overloaded(&runtime, &candidates, Some(receiver), args, owner.name(), &method)
            }
            None => {
                let candidates = owner.static_methods(&method);
                call_overloaded(&runtime, &candidates, None, args, owner.name(), &method)
            }
        };
        result.map_err(HeronError::into_vm_error)
    })
}
