//! `StringBuilder`

use super::{display, receiver, string_arg};
use crate::host::{HostObject, HostType, HostValue, ParamType};
use parking_lot::Mutex;
use std::sync::OnceLock;

/// Mutable string buffer
#[derive(Debug, Default)]
pub struct StringBuilder {
    buffer: Mutex<String>,
}

impl StringBuilder {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            buffer: Mutex::new(initial.into()),
        }
    }

    pub fn append(&self, text: &str) {
        self.buffer.lock().push_str(text);
    }

    /// Length in UTF-16 code units, as scripts count it
    pub fn len(&self) -> usize {
        self.buffer.lock().encode_utf16().count()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }
}

pub fn string_builder_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::class("StringBuilder")
            .constructor(vec![], |_| Ok(HostValue::object(StringBuilder::default())))
            .constructor(vec![ParamType::String], |args| {
                Ok(HostValue::object(StringBuilder::new(string_arg(args, 0))))
            })
            .method("append", vec![ParamType::Any], ParamType::Any, |this, args| {
                let builder = receiver::<StringBuilder>(this)?;
                builder.append(&args.first().map(display).unwrap_or_default());
                Ok(HostValue::Object(this.clone()))
            })
            .method("length", vec![], ParamType::Int, |this, _| {
                Ok(HostValue::from(receiver::<StringBuilder>(this)?.len()))
            })
            .method("toString", vec![], ParamType::String, |this, _| {
                Ok(HostValue::from(receiver::<StringBuilder>(this)?.contents()))
            })
            .build()
    })
    .clone()
}

impl HostObject for StringBuilder {
    fn host_type(&self) -> HostType {
        string_builder_type()
    }

    fn describe(&self) -> String {
        self.contents()
    }
}
