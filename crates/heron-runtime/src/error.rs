//! Error types for heron-runtime
//!
//! Re-exports the VM error and adds the interop, locking and pooling errors.

use thiserror::Error;

pub use heron_vm::{VmError, VmResult};

/// Errors that can occur while crossing the host/script boundary
#[derive(Error, Debug)]
pub enum HeronError {
    /// A value could not be converted to the requested type
    #[error("Cannot convert {actual} to {target}")]
    Conversion { target: String, actual: String },

    /// A script object bound to an interface lacks one of its methods
    #[error("{interface} requires method '{method}'")]
    MissingMethod { interface: String, method: String },

    /// No host method matches the name and argument count
    #[error("No method {type_name}.{method} accepts {arity} argument(s)")]
    NoSuchMethod {
        type_name: String,
        method: String,
        arity: usize,
    },

    /// Write to a final field, enum constant or unknown member
    #[error("{type_name}.{member} is not writable")]
    Immutable { type_name: String, member: String },

    /// Script error surfaced to the host
    #[error(transparent)]
    Vm(#[from] VmError),

    /// Script failure inside a bridged call
    #[error("Execution failed: {message}")]
    Execution { message: String },

    /// Host code failed
    #[error("Host error: {message}")]
    Host { message: String },

    /// The runtime lock could not be acquired in time
    #[error("Timed out after {0}ms waiting for the runtime lock")]
    LockTimeout(u64),

    /// The calling thread does not hold the runtime lock
    #[error("Runtime is not locked by the current thread")]
    NotLocked,

    /// Unlock attempted by a thread that does not own the lock
    #[error("Runtime lock is owned by another thread")]
    NotOwner,

    /// The runtime has been closed
    #[error("Runtime has been closed")]
    RuntimeClosed,

    /// No engine became available before the wait timeout
    #[error("Engine pool exhausted after waiting {0}ms")]
    PoolExhausted(u64),

    /// The pool has been closed
    #[error("Engine pool has been closed")]
    PoolClosed,

    /// A script binding was used after being closed
    #[error("Script binding has been closed")]
    BindingClosed,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl HeronError {
    /// Create a conversion error
    pub fn conversion(target: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Conversion {
            target: target.into(),
            actual: actual.into(),
        }
    }

    /// Create an immutability error
    pub fn immutable(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Self::Immutable {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    /// Create a host failure
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }

    /// Create an execution failure
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Convert into a VM error so it can be thrown into script.
    ///
    /// Script errors pass through unchanged; everything else becomes a
    /// `TypeError` carrying the host message.
    pub fn into_vm_error(self) -> VmError {
        match self {
            Self::Vm(err) => err,
            other => VmError::type_error(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for HeronError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type alias for runtime operations
pub type HeronResult<T> = Result<T, HeronError>;
