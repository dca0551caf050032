//! heron-runtime - host/script object bridge for the Heron VM.
//!
//! Exposes host objects (classes, interfaces, enums, maps, sets, callables) to
//! scripts through live proxies, converts values in both directions, lets
//! script functions implement host interfaces, and manages exclusive access to
//! VM instances with a re-entrant lock and a bounded engine pool.
//!
//! # Features
//!
//! - **Value conversion**: rule-driven host→script, type-driven script→host
//! - **Proxies**: map, set, object, enum, type-token and callable semantics
//! - **Interface bridge**: arrow functions and object literals as host objects
//! - **Locking**: per-runtime re-entrant lock with timeouts
//! - **Engine pool**: checkout/checkin with reset, idle sweeping, statistics
//!
//! # Example
//!
//! ```
//! use heron_runtime::{HostMap, Runtime};
//!
//! let runtime = Runtime::new();
//! let _guard = runtime.lock().unwrap();
//!
//! let settings = HostMap::new();
//! settings.insert("retries", 3);
//! runtime.global().set("settings", settings.clone()).unwrap();
//!
//! assert_eq!(runtime.execute_i64("settings.get('retries') + 1").unwrap(), 4);
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       EnginePool                             │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────┐           │
//! │  │   Runtime   │ │   Runtime   │ │   Runtime   │  ...      │
//! │  │ idle/active │ │ idle/active │ │ idle/active │           │
//! │  └─────────────┘ └─────────────┘ └─────────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                           ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Runtime                               │
//! │  - RuntimeLock (owner thread + depth)                        │
//! │  - ValueConverter (ConversionRuleSet)                        │
//! │  - ProxyBindings (host identity → proxy)                     │
//! └─────────────────────────────────────────────────────────────┘
//!            ↓ host → script                ↑ script → host
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │        HostProxy         │   │      ScriptBackedObject      │
//! │  map/set/object/enum/    │   │  function or object literal  │
//! │  type/function traps     │   │  implementing an interface   │
//! └──────────────────────────┘   └──────────────────────────────┘
//!                           ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       heron_vm::Vm                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod classes;
pub mod config;
pub mod console;
pub mod convert;
pub mod error;
pub mod host;
pub mod lock;
pub mod pool;
pub mod proxy;
pub mod runtime;

pub use bridge::ScriptBackedObject;
pub use config::{ConverterConfig, PoolConfig, RuntimeConfig};
pub use console::{ConsoleInterceptor, ConsoleLevel, reset_console_handler, set_console_handler};
pub use convert::{ConversionRule, ConversionRuleSet, Strategy, ValueConverter};
pub use error::{HeronError, HeronResult};
pub use host::{
    EnumConstant, HostFunction, HostMap, HostObject, HostObjectRef, HostSet, HostType, HostValue,
    ParamType, TypeKind,
};
pub use lock::RuntimeLock;
pub use pool::{EnginePool, PoolStats, PoolStatsSnapshot, PooledEngine};
pub use proxy::{HostProxy, ProxyBindings, ProxyMode};
pub use runtime::{GlobalObject, Runtime, RuntimeGuard, WeakRuntime};

pub use heron_vm::{HeapStats, Value, VmError};

pub mod prelude {
    pub use crate::config::{ConverterConfig, PoolConfig, RuntimeConfig};
    pub use crate::console::{ConsoleInterceptor, ConsoleLevel, set_console_handler};
    pub use crate::convert::ValueConverter;
    pub use crate::error::{HeronError, HeronResult};
    pub use crate::host::{
        HostFunction, HostMap, HostObject, HostObjectRef, HostSet, HostType, HostValue, ParamType,
        downcast,
    };
    pub use crate::pool::{EnginePool, PooledEngine};
    pub use crate::runtime::{GlobalObject, Runtime, RuntimeGuard};
    pub use heron_vm::Value;
}
