//! Callable functions: native closures and script closures

use crate::ast::FunctionDef;
use crate::error::VmResult;
use crate::interpreter::Scope;
use crate::object::ObjectRef;
use crate::value::Value;
use crate::vm::Vm;
use std::sync::Arc;

/// Signature of a native function: `(vm, this, args) -> result`
pub type NativeFn = dyn Fn(&Vm, &Value, &[Value]) -> VmResult<Value> + Send + Sync;

/// A script closure: a function definition plus its captured scope
pub struct Closure {
    pub(crate) def: Arc<FunctionDef>,
    pub(crate) scope: Arc<Scope>,
}

/// A callable function
#[derive(Clone)]
pub enum Function {
    /// Implemented in Rust
    Native { name: Arc<str>, func: Arc<NativeFn> },
    /// Implemented in script
    Script(Arc<Closure>),
}

impl Function {
    /// Function name (`""` for anonymous functions)
    pub fn name(&self) -> &str {
        match self {
            Self::Native { name, .. } => name,
            Self::Script(closure) => closure.def.name.as_deref().unwrap_or(""),
        }
    }

    /// Declared parameter count, not counting a rest parameter
    pub fn arity(&self) -> usize {
        match self {
            Self::Native { .. } => 0,
            Self::Script(closure) => closure.def.params.len(),
        }
    }

    /// Whether this is an arrow function
    pub fn is_arrow(&self) -> bool {
        match self {
            Self::Native { .. } => false,
            Self::Script(closure) => closure.def.arrow,
        }
    }
}

/// Create a native function value
pub fn native_function(
    name: &str,
    func: impl Fn(&Vm, &Value, &[Value]) -> VmResult<Value> + Send + Sync + 'static,
) -> Value {
    Value::Object(ObjectRef::function(Function::Native {
        name: name.into(),
        func: Arc::new(func),
    }))
}

/// Argument at `index`, or `undefined`
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}
