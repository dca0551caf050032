//! heron-vm - embeddable script VM used by the Heron interop runtime.
//!
//! A small tree-walking interpreter for a JavaScript subset. It exists to give
//! the runtime a concrete VM boundary: values, property operations, calls,
//! constructors, and a proxy trap seam through which host objects are
//! projected into script.
//!
//! # Example
//!
//! ```
//! use heron_vm::{Value, Vm};
//!
//! let vm = Vm::new();
//! vm.set_global("x", Value::from(20));
//! let result = vm.execute("x * 2 + 2").unwrap();
//! assert_eq!(result.as_number(), Some(42.0));
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  oxc AST   ┌──────────────┐  owned AST  ┌──────────────┐
//! │  oxc_parser  │ ─────────→ │    parser    │ ──────────→ │ interpreter  │
//! └──────────────┘            └──────────────┘             └──────┬───────┘
//!                                                                 ↓
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                               Vm                                     │
//! │  - get/set/has/delete/own_keys on any value                          │
//! │  - call / construct                                                  │
//! │  - proxy objects → ProxyHandler traps                                │
//! │  - persistent script scope, reset, dispose, heap stats               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod ast;
pub mod builtins;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod json;
pub mod object;
pub mod parser;
pub mod proxy;
pub mod value;
pub mod vm;

pub use error::{ThrownValue, VmError, VmResult};
pub use function::{Function, NativeFn, arg, native_function};
pub use object::{ObjectKind, ObjectRef, ProxyObject, WeakObjectRef, live_objects};
pub use proxy::ProxyHandler;
pub use value::Value;
pub use vm::{HeapStats, Vm, VmConfig};

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{VmError, VmResult};
    pub use crate::function::{arg, native_function};
    pub use crate::object::ObjectRef;
    pub use crate::proxy::ProxyHandler;
    pub use crate::value::Value;
    pub use crate::vm::Vm;
}
