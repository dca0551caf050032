//! Proxy handlers
//!
//! A proxy object forwards every fundamental operation to a [`ProxyHandler`].
//! This is the seam through which an embedder projects its own objects into
//! the VM: the VM never inspects the target, it only calls traps.
//!
//! Trap contract:
//! - `get` returns `undefined` for unknown keys
//! - `set` / `delete` returning `Ok(false)` makes the VM throw a `TypeError`
//! - `own_keys` order is the enumeration order seen by script
//! - `apply` / `construct` are only reached when `is_callable` is true

use crate::error::{VmError, VmResult};
use crate::value::Value;
use crate::vm::Vm;
use std::any::Any;

/// Handler receiving the traps of a proxy object
pub trait ProxyHandler: Send + Sync + 'static {
    /// `proxy[key]`
    fn get(&self, vm: &Vm, key: &str) -> VmResult<Value>;

    /// `proxy[key] = value`
    fn set(&self, vm: &Vm, key: &str, value: Value) -> VmResult<bool>;

    /// `key in proxy`
    fn has(&self, vm: &Vm, key: &str) -> VmResult<bool>;

    /// `delete proxy[key]`
    fn delete(&self, _vm: &Vm, _key: &str) -> VmResult<bool> {
        Ok(false)
    }

    /// `Object.getOwnPropertyNames(proxy)`
    fn own_keys(&self, vm: &Vm) -> VmResult<Vec<String>>;

    /// `proxy(...args)`
    fn apply(&self, _vm: &Vm, _this: &Value, _args: &[Value]) -> VmResult<Value> {
        Err(VmError::type_error(format!("{} is not a function", self.describe())))
    }

    /// `new proxy(...args)`
    fn construct(&self, _vm: &Vm, _args: &[Value]) -> VmResult<Value> {
        Err(VmError::type_error(format!("{} is not a constructor", self.describe())))
    }

    /// Whether `typeof proxy === "function"`
    fn is_callable(&self) -> bool {
        false
    }

    /// Short description used in error messages and debug output
    fn describe(&self) -> String {
        "[object Object]".to_string()
    }

    /// Downcasting hook so an embedder can recognise its own handlers
    fn as_any(&self) -> &dyn Any;
}
