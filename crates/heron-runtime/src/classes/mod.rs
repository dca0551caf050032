//! Bundled host classes
//!
//! Ready-made types commonly used from scripts: closeable interfaces, a
//! string builder, filesystem paths and files, and regex patterns.
//! [`register_all`] binds every type token under its class name.

pub mod closeable;
pub mod path;
pub mod pattern;
pub mod string_builder;

pub use closeable::{auto_closeable_type, closeable_type};
pub use path::{FileObject, PathObject, file_type, path_type};
pub use pattern::{MatcherObject, PatternObject, matcher_type, pattern_type};
pub use string_builder::{StringBuilder, string_builder_type};

use crate::error::{HeronError, HeronResult};
use crate::host::{HostObject, HostObjectRef, HostType, HostValue, downcast};
use crate::runtime::GlobalObject;

/// Every bundled type
pub fn all_types() -> Vec<HostType> {
    vec![
        auto_closeable_type(),
        closeable_type(),
        string_builder_type(),
        path_type(),
        file_type(),
        pattern_type(),
        matcher_type(),
    ]
}

/// Bind every bundled type token on the global object
pub fn register_all(global: &GlobalObject<'_>) -> HeronResult<()> {
    for ty in all_types() {
        let name = ty.name().to_string();
        global.set(&name, ty)?;
    }
    Ok(())
}

/// Concrete receiver of an instance method
pub(crate) fn receiver<'a, T: HostObject + 'static>(this: &'a HostObjectRef) -> HeronResult<&'a T> {
    downcast::<T>(this).ok_or_else(|| {
        HeronError::host(format!("unexpected receiver {}", this.describe()))
    })
}

/// String argument at `index`; null reads as an empty string
pub(crate) fn string_arg(args: &[HostValue], index: usize) -> &str {
    args.get(index).and_then(HostValue::as_str).unwrap_or_default()
}

/// Host-side rendering of a value, as string concatenation would produce it
pub(crate) fn display(value: &HostValue) -> String {
    match value {
        HostValue::Null => "null".to_string(),
        HostValue::Bool(b) => b.to_string(),
        HostValue::Int(n) => n.to_string(),
        HostValue::Double(n) => heron_vm::value::format_number(*n),
        HostValue::String(s) => s.clone(),
        HostValue::Enum(c) => c.name().to_string(),
        HostValue::Type(ty) => ty.name().to_string(),
        HostValue::Function(f) => format!("function {}", f.name()),
        HostValue::List(items) => items.iter().map(display).collect::<Vec<_>>().join(","),
        other => match other.as_object_ref() {
            Some(obj) => obj.describe(),
            None => other.kind_name(),
        },
    }
}
