//! `AutoCloseable` and `Closeable`

use crate::host::{HostType, ParamType};
use std::sync::OnceLock;

/// Interface with a single `close()`
pub fn auto_closeable_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::interface("AutoCloseable")
            .abstract_method("close", vec![], ParamType::Void)
            .build()
    })
    .clone()
}

/// `Closeable extends AutoCloseable`
pub fn closeable_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::interface("Closeable")
            .extends(&auto_closeable_type())
            .abstract_method("close", vec![], ParamType::Void)
            .build()
    })
    .clone()
}
