//! Runtime handle
//!
//! A [`Runtime`] owns one VM, a re-entrant lock, a value converter and the
//! per-runtime proxy binding table. Script execution, conversion and global
//! registration all require the calling thread to hold the lock:
//!
//! ```
//! use heron_runtime::Runtime;
//!
//! let runtime = Runtime::new();
//! let _guard = runtime.lock().unwrap();
//! runtime.global().set("answer", 42).unwrap();
//! assert_eq!(runtime.execute_i64("answer + 1").unwrap(), 43);
//! ```

use crate::config::{ConverterConfig, RuntimeConfig};
use crate::convert::ValueConverter;
use crate::error::{HeronError, HeronResult};
use crate::host::{HostObjectRef, HostValue, ParamType};
use crate::lock::RuntimeLock;
use crate::proxy::{self, ProxyBindings};
use heron_vm::{HeapStats, Value, Vm, VmConfig};
use parking_lot::RwLock;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace, warn};

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

struct RuntimeShared {
    id: u64,
    vm: Vm,
    lock: RuntimeLock,
    converter: RwLock<Arc<ValueConverter>>,
    bindings: ProxyBindings,
    config: RuntimeConfig,
    closed: AtomicBool,
}

impl Drop for RuntimeShared {
    fn drop(&mut self) {
        self.bindings.clear();
        self.vm.dispose();
        trace!(runtime = self.id, "runtime dropped");
    }
}

/// Handle to one exclusive-access VM instance
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<RuntimeShared>,
}

/// Non-owning runtime reference held by proxies and script bindings
#[derive(Clone, Default)]
pub struct WeakRuntime(Weak<RuntimeShared>);

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|shared| Runtime { shared })
    }
}

impl Runtime {
    /// Runtime with default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_converter(config, ValueConverter::new())
    }

    /// Runtime with its own converter configuration
    pub fn with_converter(config: RuntimeConfig, converter: ValueConverter) -> Self {
        let id = NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed);
        let vm = Vm::with_config(VmConfig {
            max_call_depth: config.max_call_depth,
            ..VmConfig::default()
        });
        let shared = Arc::new(RuntimeShared {
            id,
            vm,
            lock: RuntimeLock::new(),
            converter: RwLock::new(Arc::new(converter)),
            bindings: ProxyBindings::new(),
            config,
            closed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&shared);
        shared.vm.on_low_memory(move || {
            if let Some(shared) = weak.upgrade() {
                shared.bindings.sweep();
            }
        });

        debug!(runtime = id, "runtime created");
        Self { shared }
    }

    /// Runtime whose converter uses `config`
    pub fn with_converter_config(config: RuntimeConfig, converter: ConverterConfig) -> Self {
        Self::with_converter(config, ValueConverter::with_config(converter))
    }

    /// Process-unique runtime id
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    /// The underlying VM
    pub fn vm(&self) -> &Vm {
        &self.shared.vm
    }

    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Arc::downgrade(&self.shared))
    }

    /// Whether two handles refer to the same runtime
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // ---- locking ----

    /// Lock the runtime for the current thread, waiting up to the configured timeout
    pub fn lock(&self) -> HeronResult<RuntimeGuard<'_>> {
        self.lock_timeout(self.shared.config.lock_timeout)
    }

    /// Lock the runtime, waiting at most `timeout`
    pub fn lock_timeout(&self, timeout: Duration) -> HeronResult<RuntimeGuard<'_>> {
        self.shared.lock.acquire_timeout(timeout)?;
        Ok(RuntimeGuard {
            runtime: self,
            _not_send: PhantomData,
        })
    }

    /// Lock without a guard; pair with [`Runtime::unlock`]
    pub fn acquire(&self) -> HeronResult<()> {
        self.shared
            .lock
            .acquire_timeout(self.shared.config.lock_timeout)
            .map(|_| ())
    }

    /// Release one level of the lock held by the current thread
    pub fn unlock(&self) -> HeronResult<()> {
        self.shared.lock.release().map(|_| ())
    }

    pub fn is_locked_by_current_thread(&self) -> bool {
        self.shared.lock.is_held_by_current_thread()
    }

    pub fn is_locked(&self) -> bool {
        self.shared.lock.is_locked()
    }

    fn ensure(&self) -> HeronResult<()> {
        if self.is_closed() {
            return Err(HeronError::RuntimeClosed);
        }
        self.shared.lock.ensure_held()
    }

    // ---- globals ----

    /// The global object, for host registrations
    pub fn global(&self) -> GlobalObject<'_> {
        GlobalObject { runtime: self }
    }

    // ---- execution ----

    /// Run a script and return its completion value
    pub fn execute(&self, source: &str) -> HeronResult<Value> {
        self.ensure()?;
        Ok(self.shared.vm.execute(source)?)
    }

    /// Run a script and convert the result to `target`
    pub fn execute_as(&self, source: &str, target: &ParamType) -> HeronResult<HostValue> {
        let value = self.execute(source)?;
        self.to_host(&value, target)
    }

    /// Run a script and render the result with script string conversion
    pub fn execute_string(&self, source: &str) -> HeronResult<String> {
        let value = self.execute(source)?;
        Ok(self.shared.vm.to_js_string(&value)?)
    }

    pub fn execute_i64(&self, source: &str) -> HeronResult<i64> {
        let value = self.execute_as(source, &ParamType::Int)?;
        value
            .as_i64()
            .ok_or_else(|| HeronError::conversion("int", value.kind_name()))
    }

    pub fn execute_f64(&self, source: &str) -> HeronResult<f64> {
        let value = self.execute_as(source, &ParamType::Double)?;
        value
            .as_f64()
            .ok_or_else(|| HeronError::conversion("double", value.kind_name()))
    }

    pub fn execute_bool(&self, source: &str) -> HeronResult<bool> {
        let value = self.execute_as(source, &ParamType::Bool)?;
        value
            .as_bool()
            .ok_or_else(|| HeronError::conversion("boolean", value.kind_name()))
    }

    /// Run a script and convert the result structurally
    pub fn execute_object(&self, source: &str) -> HeronResult<HostValue> {
        self.execute_as(source, &ParamType::Any)
    }

    /// Run a script for its side effects
    pub fn execute_void(&self, source: &str) -> HeronResult<()> {
        self.execute(source).map(|_| ())
    }

    // ---- conversion ----

    /// Convert a script value to the host
    pub fn to_host(&self, value: &Value, target: &ParamType) -> HeronResult<HostValue> {
        self.ensure()?;
        self.converter().to_host(self, value, target)
    }

    /// Convert a host value to script
    pub fn to_script(&self, value: &HostValue) -> HeronResult<Value> {
        self.ensure()?;
        self.converter().to_script(self, value)
    }

    /// The installed converter
    pub fn converter(&self) -> Arc<ValueConverter> {
        self.shared.converter.read().clone()
    }

    /// Replace the converter; existing proxies keep their semantics
    pub fn set_converter(&self, converter: ValueConverter) {
        *self.shared.converter.write() = Arc::new(converter);
    }

    // ---- lifecycle ----

    /// Restore pristine globals and drop every proxy binding
    pub fn reset(&self) -> HeronResult<()> {
        self.ensure()?;
        self.shared.bindings.clear();
        self.shared.vm.reset();
        debug!(runtime = self.id(), "runtime reset");
        Ok(())
    }

    /// Dispose the runtime. Never waits for the lock; waiters wake and fail.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.shared.lock.is_locked() && !self.shared.lock.is_held_by_current_thread() {
            warn!(runtime = self.id(), "closing runtime locked by another thread");
        }
        self.shared.bindings.clear();
        self.shared.lock.dispose();
        self.shared.vm.dispose();
        debug!(runtime = self.id(), "runtime closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Memory pressure hint. A no-op once closed.
    pub fn low_memory_notification(&self) -> HeronResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.ensure()?;
        self.shared.vm.low_memory_notification();
        Ok(())
    }

    pub fn heap_stats(&self) -> HeapStats {
        self.shared.vm.heap_stats()
    }

    /// Number of tracked proxy bindings
    pub fn binding_count(&self) -> usize {
        self.shared.bindings.len()
    }

    pub(crate) fn bindings(&self) -> &ProxyBindings {
        &self.shared.bindings
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.shared.id)
            .field("locked", &self.is_locked())
            .field("closed", &self.is_closed())
            .field("bindings", &self.binding_count())
            .finish()
    }
}

/// Lock held by the current thread; released on drop
#[must_use = "the runtime unlocks as soon as the guard is dropped"]
pub struct RuntimeGuard<'a> {
    runtime: &'a Runtime,
    _not_send: PhantomData<*const ()>,
}

impl Deref for RuntimeGuard<'_> {
    type Target = Runtime;

    fn deref(&self) -> &Runtime {
        self.runtime
    }
}

impl Drop for RuntimeGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.runtime.shared.lock.release() {
            warn!(runtime = self.runtime.id(), error = %err, "failed to release runtime lock");
        }
    }
}

/// Host view of a runtime's global object
pub struct GlobalObject<'a> {
    runtime: &'a Runtime,
}

impl GlobalObject<'_> {
    pub fn runtime(&self) -> &Runtime {
        self.runtime
    }

    /// Bind a host value under `name`
    pub fn set(&self, name: &str, value: impl Into<HostValue>) -> HeronResult<()> {
        let script = self.runtime.to_script(&value.into())?;
        self.runtime.shared.vm.set_global(name, script);
        Ok(())
    }

    /// Bind a script value under `name`
    pub fn set_value(&self, name: &str, value: Value) -> HeronResult<()> {
        self.runtime.ensure()?;
        self.runtime.shared.vm.set_global(name, value);
        Ok(())
    }

    /// Raw script value of a global (`undefined` when absent)
    pub fn get_value(&self, name: &str) -> HeronResult<Value> {
        self.runtime.ensure()?;
        Ok(self.runtime.shared.vm.get_global(name))
    }

    /// Read a global back as a host value
    pub fn get(&self, name: &str) -> HeronResult<HostValue> {
        self.get_as(name, &ParamType::Any)
    }

    pub fn get_as(&self, name: &str, target: &ParamType) -> HeronResult<HostValue> {
        let value = self.get_value(name)?;
        self.runtime.to_host(&value, target)
    }

    /// The host object behind a proxied global
    pub fn get_object(&self, name: &str) -> HeronResult<HostObjectRef> {
        let value = self.get_value(name)?;
        proxy::host_target(&value)
            .and_then(HostValue::as_object_ref)
            .ok_or_else(|| HeronError::conversion("host object", crate::convert::shape_of(&value)))
    }

    pub fn has(&self, name: &str) -> HeronResult<bool> {
        self.runtime.ensure()?;
        Ok(self.runtime.shared.vm.global().has_own(name))
    }

    /// Remove a global and its proxy binding
    pub fn delete(&self, name: &str) -> HeronResult<bool> {
        self.runtime.ensure()?;
        let Some(removed) = self.runtime.shared.vm.delete_global(name) else {
            return Ok(false);
        };
        if let Value::Object(obj) = &removed
            && obj.is_proxy()
        {
            self.runtime.shared.bindings.remove_proxy(obj);
        }
        trace!(runtime = self.runtime.id(), name, "global deleted");
        Ok(true)
    }

    /// The global object itself
    pub fn object(&self) -> Value {
        Value::Object(self.runtime.shared.vm.global())
    }
}
