//! Console interceptor
//!
//! Installs `console.log`, `console.info`, `console.debug`, `console.warn` and
//! `console.error` on a runtime's global object. Output goes to a
//! process-wide handler; the default routes to `tracing` on target
//! `heron::console`.

use crate::error::HeronResult;
use crate::runtime::GlobalObject;
use heron_vm::{ObjectRef, Value, Vm, VmResult, native_function};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Info,
    Debug,
    Warn,
    Error,
}

impl ConsoleLevel {
    const ALL: [(ConsoleLevel, &'static str); 5] = [
        (ConsoleLevel::Log, "log"),
        (ConsoleLevel::Info, "info"),
        (ConsoleLevel::Debug, "debug"),
        (ConsoleLevel::Warn, "warn"),
        (ConsoleLevel::Error, "error"),
    ];
}

type ConsoleHandler = dyn Fn(ConsoleLevel, &str) + Send + Sync + 'static;

static CONSOLE_HANDLER: OnceLock<Mutex<Arc<ConsoleHandler>>> = OnceLock::new();

fn handler_slot() -> &'static Mutex<Arc<ConsoleHandler>> {
    CONSOLE_HANDLER.get_or_init(|| Mutex::new(Arc::new(default_console_handler)))
}

/// Replace the process-wide console handler
pub fn set_console_handler(handler: impl Fn(ConsoleLevel, &str) + Send + Sync + 'static) {
    *handler_slot().lock() = Arc::new(handler);
}

/// Restore the tracing-backed handler
pub fn reset_console_handler() {
    *handler_slot().lock() = Arc::new(default_console_handler);
}

fn default_console_handler(level: ConsoleLevel, message: &str) {
    match level {
        ConsoleLevel::Log | ConsoleLevel::Info => info!(target: "heron::console", "{}", message),
        ConsoleLevel::Debug => debug!(target: "heron::console", "{}", message),
        ConsoleLevel::Warn => warn!(target: "heron::console", "{}", message),
        ConsoleLevel::Error => error!(target: "heron::console", "{}", message),
    }
}

fn dispatch_console(level: ConsoleLevel, message: &str) {
    let handler = handler_slot().lock().clone();
    handler(level, message);
}

fn format_args(vm: &Vm, args: &[Value]) -> VmResult<String> {
    let parts = args
        .iter()
        .map(|arg| vm.to_js_string(arg))
        .collect::<VmResult<Vec<_>>>()?;
    Ok(parts.join(" "))
}

/// Installs and removes the `console` global
pub struct ConsoleInterceptor;

impl ConsoleInterceptor {
    /// Install `console` on the global object
    pub fn register(global: &GlobalObject<'_>) -> HeronResult<()> {
        let console = ObjectRef::ordinary();
        for (level, name) in ConsoleLevel::ALL {
            let method = native_function(name, move |vm, _this, args| {
                dispatch_console(level, &format_args(vm, args)?);
                Ok(Value::Undefined)
            });
            console.define(name, method, true);
        }
        global.set_value("console", Value::Object(console))
    }

    /// Remove `console`; returns whether it was installed
    pub fn unregister(global: &GlobalObject<'_>) -> HeronResult<bool> {
        global.delete("console")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;

    #[test]
    fn test_arguments_are_joined() {
        let runtime = Runtime::new();
        let _guard = runtime.lock().unwrap();
        let message = format_args(
            runtime.vm(),
            &[Value::from("a"), Value::from(1), Value::Boolean(true)],
        )
        .unwrap();
        assert_eq!(message, "a 1 true");
    }

    #[test]
    fn test_register_and_unregister() {
        let runtime = Runtime::new();
        let _guard = runtime.lock().unwrap();
        ConsoleInterceptor::register(&runtime.global()).unwrap();
        assert_eq!(runtime.execute_string("typeof console.warn").unwrap(), "function");
        // default handler only emits tracing events
        runtime.execute_void("console.debug('quiet')").unwrap();
        assert!(ConsoleInterceptor::unregister(&runtime.global()).unwrap());
        assert!(runtime.execute_bool("typeof console === 'undefined'").unwrap());
    }
}
