//! The VM boundary
//!
//! [`Vm`] is a cheap, cloneable handle. Every property operation the
//! interpreter performs goes through the methods here, which is also the API
//! an embedder uses to drive the VM from Rust.

use crate::builtins;
use crate::error::{VmError, VmResult};
use crate::function::Function;
use crate::interpreter::{self, Scope};
use crate::object::{ObjectKind, ObjectRef, ProxyObject, live_objects};
use crate::parser;
use crate::proxy::ProxyHandler;
use crate::value::{Value, format_number};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, trace};

/// Largest length a JS array can have
const MAX_ARRAY_LENGTH: f64 = 4_294_967_295.0;

/// VM configuration
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Maximum nesting of function calls before a stack overflow is reported
    pub max_call_depth: usize,
    /// Largest array the VM will allocate; arrays are densely stored
    pub max_array_length: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 128,
            max_array_length: 1 << 24,
        }
    }
}

/// Heap statistics snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapStats {
    /// Objects alive in the process
    pub live_objects: usize,
    /// Low-memory notifications handled by this VM
    pub gc_runs: u64,
    /// Scripts executed by this VM
    pub executions: u64,
}

type MemoryListener = Arc<dyn Fn() + Send + Sync>;

struct VmInner {
    global: ObjectRef,
    script_scope: RwLock<Arc<Scope>>,
    config: VmConfig,
    depth: AtomicUsize,
    executions: AtomicU64,
    gc_runs: AtomicU64,
    memory_listeners: Mutex<Vec<MemoryListener>>,
    disposed: AtomicBool,
}

/// Handle to a VM instance
#[derive(Clone)]
pub struct Vm {
    inner: Arc<VmInner>,
}

impl Vm {
    /// Create a VM with default configuration
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Create a VM with the given configuration
    pub fn with_config(config: VmConfig) -> Self {
        let global = ObjectRef::ordinary();
        builtins::install_globals(&global);
        let vm = Self {
            inner: Arc::new(VmInner {
                global,
                script_scope: RwLock::new(Scope::script()),
                config,
                depth: AtomicUsize::new(0),
                executions: AtomicU64::new(0),
                gc_runs: AtomicU64::new(0),
                memory_listeners: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        };
        vm.bind_script_this();
        vm
    }

    fn bind_script_this(&self) {
        self.inner
            .script_scope
            .read()
            .declare("this", Value::Object(self.inner.global.clone()), false);
    }

    fn check_alive(&self) -> VmResult<()> {
        if self.is_disposed() {
            Err(VmError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Whether two handles refer to the same VM
    pub fn ptr_eq(&self, other: &Vm) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Parse and run a script, returning its completion value
    pub fn execute(&self, source: &str) -> VmResult<Value> {
        self.check_alive()?;
        let program = parser::parse(source)?;
        self.inner.executions.fetch_add(1, Ordering::Relaxed);
        trace!(statements = program.body.len(), "executing script");
        let scope = self.inner.script_scope.read().clone();
        interpreter::run_program(self, &program, &scope)
    }

    /// The global object
    pub fn global(&self) -> ObjectRef {
        self.inner.global.clone()
    }

    /// Read a global binding (`undefined` when absent)
    pub fn get_global(&self, name: &str) -> Value {
        self.inner.global.get_own(name).unwrap_or_default()
    }

    /// Create or overwrite a global binding
    pub fn set_global(&self, name: &str, value: Value) {
        self.inner.global.set_own(name, value);
    }

    /// Remove a global binding, returning the removed value
    pub fn delete_global(&self, name: &str) -> Option<Value> {
        self.inner.global.delete_own(name)
    }

    fn live_handler<'a>(
        proxy: &'a ProxyObject,
        operation: &str,
    ) -> VmResult<&'a Arc<dyn ProxyHandler>> {
        proxy.handler().ok_or_else(|| {
            VmError::type_error(format!(
                "Cannot perform '{}' on a proxy that has been revoked",
                operation
            ))
        })
    }

    /// Validate a requested array length against JS rules and the VM limit
    pub fn array_length(&self, len: f64) -> VmResult<usize> {
        if !len.is_finite() || len < 0.0 || len.fract() != 0.0 || len > MAX_ARRAY_LENGTH {
            return Err(VmError::range_error("Invalid array length"));
        }
        let limit = self.inner.config.max_array_length;
        if len > limit as f64 {
            return Err(VmError::range_error(format!(
                "Array length {} exceeds the limit of {}",
                format_number(len),
                limit
            )));
        }
        Ok(len as usize)
    }

    /// Enter one level of native recursion
    fn enter(&self) -> VmResult<scopeguard::ScopeGuard<&AtomicUsize, fn(&AtomicUsize)>> {
        let depth = self.inner.depth.fetch_add(1, Ordering::Relaxed) + 1;
        let guard = scopeguard::guard(&self.inner.depth, (|depth: &AtomicUsize| {
            depth.fetch_sub(1, Ordering::Relaxed);
        }) as fn(&AtomicUsize));
        if depth > self.inner.config.max_call_depth {
            return Err(VmError::StackOverflow);
        }
        Ok(guard)
    }

    /// `target[key]`
    pub fn get_property(&self, target: &Value, key: &str) -> VmResult<Value> {
        match target {
            Value::Undefined | Value::Null => Err(VmError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                nullish_name(target),
                key
            ))),
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::from(s.chars().count()));
                }
                if let Some(c) = builtins::string_index(s, key) {
                    return Ok(c);
                }
                Ok(builtins::string_method(key).unwrap_or_default())
            }
            Value::Number(_) | Value::Boolean(_) => {
                Ok(builtins::primitive_method(target, key).unwrap_or_default())
            }
            Value::Object(obj) => self.get_object_property(obj, key),
        }
    }

    fn get_object_property(&self, obj: &ObjectRef, key: &str) -> VmResult<Value> {
        if let ObjectKind::Proxy(proxy) = obj.kind() {
            return Self::live_handler(proxy, "get")?.get(self, key);
        }
        if let Some(value) = obj.get_own(key) {
            return Ok(value);
        }
        let fallback = match obj.kind() {
            ObjectKind::Array(_) => {
                if key == "length" {
                    return Ok(Value::from(obj.array_len().unwrap_or(0)));
                }
                if let Some(index) = array_index(key) {
                    return Ok(obj.array_get(index).unwrap_or_default());
                }
                builtins::array_method(key)
            }
            ObjectKind::Function(func) => match key {
                "name" => Some(Value::from(func.name())),
                "length" => Some(Value::from(func.arity())),
                _ => builtins::function_method(key),
            },
            ObjectKind::Date(_) => {
                builtins::date_method(key).or_else(|| builtins::object_method(key))
            }
            ObjectKind::Ordinary | ObjectKind::Error | ObjectKind::Proxy(_) => {
                builtins::object_method(key)
            }
        };
        Ok(fallback.unwrap_or_default())
    }

    /// `target[key] = value`. A rejected write throws a `TypeError`.
    pub fn set_property(&self, target: &Value, key: &str, value: Value) -> VmResult<()> {
        let obj = match target {
            Value::Undefined | Value::Null => {
                return Err(VmError::type_error(format!(
                    "Cannot set properties of {} (setting '{}')",
                    nullish_name(target),
                    key
                )));
            }
            Value::Object(obj) => obj,
            _ => return Ok(()),
        };
        match obj.kind() {
            ObjectKind::Proxy(proxy) => {
                if Self::live_handler(proxy, "set")?.set(self, key, value)? {
                    Ok(())
                } else {
                    Err(VmError::type_error(format!(
                        "'set' on proxy: trap returned falsish for property '{}'",
                        key
                    )))
                }
            }
            ObjectKind::Array(_) if key == "length" => {
                let len = self.array_length(value.to_number())?;
                obj.array_set_len(len);
                Ok(())
            }
            ObjectKind::Array(_) if array_index(key).is_some() => {
                if let Some(index) = array_index(key) {
                    self.array_length(index as f64 + 1.0)?;
                    obj.array_set(index, value);
                }
                Ok(())
            }
            _ => {
                if obj.set_own(key, value) {
                    Ok(())
                } else {
                    Err(VmError::type_error(format!(
                        "Cannot assign to read only property '{}' of object",
                        key
                    )))
                }
            }
        }
    }

    /// `key in target`
    pub fn has_property(&self, target: &Value, key: &str) -> VmResult<bool> {
        let Value::Object(obj) = target else {
            return Err(VmError::type_error(format!(
                "Cannot use 'in' operator to search for '{}' in {}",
                key,
                self.to_js_string(target)?
            )));
        };
        if obj.has_own(key) {
            return Ok(true);
        }
        let found = match obj.kind() {
            ObjectKind::Proxy(proxy) => return Self::live_handler(proxy, "has")?.has(self, key),
            ObjectKind::Array(_) => {
                key == "length"
                    || array_index(key).is_some_and(|i| i < obj.array_len().unwrap_or(0))
                    || builtins::array_method(key).is_some()
            }
            ObjectKind::Function(_) => {
                matches!(key, "name" | "length") || builtins::function_method(key).is_some()
            }
            ObjectKind::Date(_) => {
                builtins::date_method(key).is_some() || builtins::object_method(key).is_some()
            }
            ObjectKind::Ordinary | ObjectKind::Error => builtins::object_method(key).is_some(),
        };
        Ok(found)
    }

    /// `delete target[key]`. A rejected delete throws a `TypeError`.
    pub fn delete_property(&self, target: &Value, key: &str) -> VmResult<bool> {
        let obj = match target {
            Value::Undefined | Value::Null => {
                return Err(VmError::type_error(
                    "Cannot convert undefined or null to object",
                ));
            }
            Value::Object(obj) => obj,
            _ => return Ok(true),
        };
        match obj.kind() {
            ObjectKind::Proxy(proxy) => {
                if Self::live_handler(proxy, "deleteProperty")?.delete(self, key)? {
                    Ok(true)
                } else {
                    Err(VmError::type_error(format!(
                        "'deleteProperty' on proxy: trap returned falsish for property '{}'",
                        key
                    )))
                }
            }
            ObjectKind::Array(_) if array_index(key).is_some() => {
                let len = obj.array_len().unwrap_or(0);
                if let Some(index) = array_index(key).filter(|i| *i < len) {
                    obj.array_set(index, Value::Undefined);
                }
                Ok(true)
            }
            _ => match obj.get_own_property(key) {
                Some(prop) if !prop.writable => Err(VmError::type_error(format!(
                    "Cannot delete property '{}' of object",
                    key
                ))),
                _ => {
                    obj.delete_own(key);
                    Ok(true)
                }
            },
        }
    }

    /// `Object.getOwnPropertyNames(target)`
    pub fn own_keys(&self, target: &Value) -> VmResult<Vec<String>> {
        match target {
            Value::Undefined | Value::Null => Err(VmError::type_error(
                "Cannot convert undefined or null to object",
            )),
            Value::String(s) => {
                let mut keys: Vec<String> = (0..s.chars().count()).map(|i| i.to_string()).collect();
                keys.push("length".to_string());
                Ok(keys)
            }
            Value::Object(obj) => match obj.kind() {
                ObjectKind::Proxy(proxy) => Self::live_handler(proxy, "ownKeys")?.own_keys(self),
                ObjectKind::Array(_) => {
                    let len = obj.array_len().unwrap_or(0);
                    let mut keys: Vec<String> = (0..len).map(|i| i.to_string()).collect();
                    keys.push("length".to_string());
                    keys.extend(obj.own_keys());
                    Ok(keys)
                }
                _ => Ok(obj.own_keys()),
            },
            _ => Ok(Vec::new()),
        }
    }

    /// Call `callee` with an explicit `this`
    pub fn call(&self, callee: &Value, this: &Value, args: &[Value]) -> VmResult<Value> {
        self.check_alive()?;
        let Some(obj) = callee.as_object() else {
            return Err(VmError::type_error(format!(
                "{} is not a function",
                self.to_js_string(callee)?
            )));
        };
        let _depth = self.enter()?;
        match obj.kind() {
            ObjectKind::Function(Function::Native { func, .. }) => func(self, this, args),
            ObjectKind::Function(Function::Script(closure)) => {
                interpreter::call_closure(self, closure, this, args)
            }
            ObjectKind::Proxy(proxy) if proxy.handler_raw().is_callable() => {
                Self::live_handler(proxy, "apply")?.apply(self, this, args)
            }
            _ => Err(VmError::type_error(format!("{:?} is not a function", obj))),
        }
    }

    /// `new callee(...args)`
    pub fn construct(&self, callee: &Value, args: &[Value]) -> VmResult<Value> {
        self.check_alive()?;
        let Some(obj) = callee.as_object() else {
            return Err(VmError::type_error(format!(
                "{} is not a constructor",
                self.to_js_string(callee)?
            )));
        };
        let _depth = self.enter()?;
        match obj.kind() {
            ObjectKind::Proxy(proxy) => Self::live_handler(proxy, "construct")?.construct(self, args),
            ObjectKind::Function(Function::Native { func, .. }) => {
                func(self, &Value::Undefined, args)
            }
            ObjectKind::Function(Function::Script(closure)) if !closure.def.arrow => {
                let instance = Value::Object(ObjectRef::ordinary());
                let result = interpreter::call_closure(self, closure, &instance, args)?;
                Ok(if result.is_object() { result } else { instance })
            }
            _ => Err(VmError::type_error(format!("{:?} is not a constructor", obj))),
        }
    }

    /// ECMAScript ToString, invoking script-level `toString` where one is defined
    pub fn to_js_string(&self, value: &Value) -> VmResult<String> {
        let obj = match value {
            Value::Undefined => return Ok("undefined".to_string()),
            Value::Null => return Ok("null".to_string()),
            Value::Boolean(b) => return Ok(b.to_string()),
            Value::Number(n) => return Ok(format_number(*n)),
            Value::String(s) => return Ok(s.to_string()),
            Value::Object(obj) => obj,
        };
        let _depth = self.enter()?;
        match obj.kind() {
            ObjectKind::Array(_) => {
                let items = obj.array_elements().unwrap_or_default();
                let mut parts = Vec::with_capacity(items.len());
                for item in &items {
                    parts.push(if item.is_nullish() {
                        String::new()
                    } else {
                        self.to_js_string(item)?
                    });
                }
                Ok(parts.join(","))
            }
            ObjectKind::Function(func) => {
                Ok(format!("function {}() {{ [native code] }}", func.name()))
            }
            ObjectKind::Date(ms) => {
                Ok(builtins::date_to_iso(*ms).unwrap_or_else(|| "Invalid Date".to_string()))
            }
            ObjectKind::Error => {
                let name = self.to_js_string(&obj.get_own("name").unwrap_or_default())?;
                let message = match obj.get_own("message") {
                    Some(Value::String(s)) => s.to_string(),
                    Some(other) if !other.is_undefined() => self.to_js_string(&other)?,
                    _ => String::new(),
                };
                Ok(if message.is_empty() {
                    name
                } else {
                    format!("{}: {}", name, message)
                })
            }
            ObjectKind::Proxy(proxy) => {
                let handler = Self::live_handler(proxy, "get")?;
                let method = handler.get(self, "toString")?;
                if !method.is_callable() {
                    return Ok(handler.describe());
                }
                match self.call(&method, value, &[])? {
                    Value::Object(_) => Ok(handler.describe()),
                    primitive => self.to_js_string(&primitive),
                }
            }
            ObjectKind::Ordinary => match obj.get_own("toString") {
                Some(method) if method.is_callable() => match self.call(&method, value, &[])? {
                    Value::Object(_) => Ok("[object Object]".to_string()),
                    primitive => self.to_js_string(&primitive),
                },
                _ => Ok("[object Object]".to_string()),
            },
        }
    }

    /// Drop all script state and reinstall the built-in globals
    pub fn reset(&self) {
        debug!("resetting vm");
        let released = self.inner.global.clear_properties();
        let scope = std::mem::replace(&mut *self.inner.script_scope.write(), Scope::script());
        let bindings = scope.clear();
        builtins::install_globals(&self.inner.global);
        self.bind_script_this();
        // Drop outside of any lock: values may hold proxies whose handlers own host state
        drop(released);
        drop(bindings);
    }

    /// Register a listener invoked on every low-memory notification
    pub fn on_low_memory(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.inner.memory_listeners.lock().push(Arc::new(listener));
    }

    /// Signal memory pressure: notify listeners and count a collection cycle
    pub fn low_memory_notification(&self) {
        self.inner.gc_runs.fetch_add(1, Ordering::Relaxed);
        let listeners = self.inner.memory_listeners.lock().clone();
        debug!(listeners = listeners.len(), "low memory notification");
        for listener in listeners {
            listener();
        }
    }

    /// Current heap statistics
    pub fn heap_stats(&self) -> HeapStats {
        HeapStats {
            live_objects: live_objects(),
            gc_runs: self.inner.gc_runs.load(Ordering::Relaxed),
            executions: self.inner.executions.load(Ordering::Relaxed),
        }
    }

    /// Dispose the VM. Later operations fail with [`VmError::Disposed`].
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("disposing vm");
        let released = self.inner.global.clear_properties();
        let bindings = self.inner.script_scope.read().clear();
        let listeners = std::mem::take(&mut *self.inner.memory_listeners.lock());
        drop(released);
        drop(bindings);
        drop(listeners);
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("disposed", &self.is_disposed())
            .field("stats", &self.heap_stats())
            .finish()
    }
}

fn nullish_name(value: &Value) -> &'static str {
    if value.is_null() { "null" } else { "undefined" }
}

/// Canonical array index for a property key
fn array_index(key: &str) -> Option<usize> {
    let index: usize = key.parse().ok()?;
    (index.to_string() == key).then_some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_vm_is_send_and_sync() {
        assert_send_sync::<Vm>();
        assert_send_sync::<Value>();
    }

    #[test]
    fn test_completion_value() {
        let vm = Vm::new();
        let value = vm.execute("let a = 2; a * 21").unwrap();
        assert_eq!(value.as_number(), Some(42.0));
    }

    #[test]
    fn test_script_scope_persists() {
        let vm = Vm::new();
        vm.execute("const greeting = 'hi'; var counter = 1").unwrap();
        assert_eq!(
            vm.execute("greeting + counter").unwrap().as_str(),
            Some("hi1")
        );
        assert_eq!(vm.get_global("counter").as_number(), Some(1.0));
        assert!(vm.get_global("greeting").is_undefined());
    }

    #[test]
    fn test_reset_clears_state() {
        let vm = Vm::new();
        vm.execute("let a = 1; var b = 2").unwrap();
        vm.reset();
        assert!(matches!(vm.execute("a"), Err(VmError::ReferenceError(_))));
        assert!(matches!(vm.execute("b"), Err(VmError::ReferenceError(_))));
        assert_eq!(vm.execute("JSON.stringify([1])").unwrap().as_str(), Some("[1]"));
    }

    #[test]
    fn test_stack_overflow() {
        let vm = Vm::with_config(VmConfig {
            max_call_depth: 32,
            ..VmConfig::default()
        });
        let err = vm
            .execute("function f() { return f() }\nf()")
            .unwrap_err();
        assert!(matches!(err, VmError::StackOverflow));
        // depth is restored once the error unwinds
        assert_eq!(vm.execute("(() => 1)()").unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn test_low_memory_listeners() {
        let vm = Vm::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        vm.on_low_memory(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        vm.low_memory_notification();
        vm.low_memory_notification();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(vm.heap_stats().gc_runs, 2);
    }

    #[test]
    fn test_disposed_vm_rejects_work() {
        let vm = Vm::new();
        vm.dispose();
        vm.dispose();
        assert!(matches!(vm.execute("1"), Err(VmError::Disposed)));
    }

    #[test]
    fn test_read_only_global_write_throws() {
        let vm = Vm::new();
        vm.global().define("fixed", Value::from(1), false);
        assert!(matches!(vm.execute("fixed = 2"), Err(VmError::TypeError(_))));
        assert_eq!(vm.get_global("fixed").as_number(), Some(1.0));
    }
}
