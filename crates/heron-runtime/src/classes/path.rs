//! `Path` and `File`
//!
//! Thin wrappers over `std::path` and `std::fs` metadata. Nothing here reads
//! or writes file contents.

use super::{receiver, string_arg};
use crate::error::HeronResult;
use crate::host::{HostObject, HostObjectRef, HostType, HostValue, ParamType};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A filesystem path
#[derive(Debug, Clone)]
pub struct PathObject {
    path: PathBuf,
}

impl PathObject {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A file handle: a path plus metadata queries
#[derive(Debug, Clone)]
pub struct FileObject {
    path: PathBuf,
}

impl FileObject {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn can_read(&self) -> bool {
        if self.path.is_dir() {
            fs::read_dir(&self.path).is_ok()
        } else {
            fs::File::open(&self.path).is_ok()
        }
    }

    fn can_write(&self) -> bool {
        fs::metadata(&self.path).is_ok_and(|m| !m.permissions().readonly())
    }

    #[cfg(unix)]
    fn can_execute(&self) -> bool {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(&self.path).is_ok_and(|m| m.permissions().mode() & 0o111 != 0)
    }

    #[cfg(not(unix))]
    fn can_execute(&self) -> bool {
        self.path.exists()
    }

    /// Byte length, 0 when missing
    fn length(&self) -> u64 {
        fs::metadata(&self.path).map_or(0, |m| m.len())
    }
}

fn render(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn path_value(path: impl Into<PathBuf>) -> HostValue {
    HostValue::object(PathObject::new(path))
}

fn optional_path(path: Option<&Path>) -> HostValue {
    path.filter(|p| !p.as_os_str().is_empty())
        .map_or(HostValue::Null, path_value)
}

fn this_path(this: &HostObjectRef) -> HeronResult<&Path> {
    receiver::<PathObject>(this).map(PathObject::path)
}

fn this_file(this: &HostObjectRef) -> HeronResult<&FileObject> {
    receiver::<FileObject>(this)
}

pub fn path_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::class("Path")
            .static_method("of", vec![ParamType::String], ParamType::Any, |args| {
                Ok(path_value(string_arg(args, 0)))
            })
            .static_method(
                "of",
                vec![ParamType::String, ParamType::String],
                ParamType::Any,
                |args| Ok(path_value(Path::new(string_arg(args, 0)).join(string_arg(args, 1)))),
            )
            .method("resolve", vec![ParamType::String], ParamType::Any, |this, args| {
                Ok(path_value(this_path(this)?.join(string_arg(args, 0))))
            })
            .method("getFileName", vec![], ParamType::Any, |this, _| {
                Ok(optional_path(this_path(this)?.file_name().map(Path::new)))
            })
            .method("getParent", vec![], ParamType::Any, |this, _| {
                Ok(optional_path(this_path(this)?.parent()))
            })
            .method("isAbsolute", vec![], ParamType::Bool, |this, _| {
                Ok(HostValue::Bool(this_path(this)?.is_absolute()))
            })
            .method("toFile", vec![], ParamType::Any, |this, _| {
                Ok(HostValue::object(FileObject::new(this_path(this)?)))
            })
            .method("toString", vec![], ParamType::String, |this, _| {
                Ok(HostValue::from(render(this_path(this)?)))
            })
            .build()
    })
    .clone()
}

/// Instance method answering a metadata query
fn query(
    f: fn(&FileObject) -> HostValue,
) -> impl Fn(&HostObjectRef, &[HostValue]) -> HeronResult<HostValue> + Send + Sync + 'static {
    move |this, _| Ok(f(this_file(this)?))
}

pub fn file_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::class("File")
            .constructor(vec![ParamType::String], |args| {
                Ok(HostValue::object(FileObject::new(string_arg(args, 0))))
            })
            .constructor(vec![ParamType::String, ParamType::String], |args| {
                let path = Path::new(string_arg(args, 0)).join(string_arg(args, 1));
                Ok(HostValue::object(FileObject::new(path)))
            })
            .method("exists", vec![], ParamType::Bool, query(|f| f.path.exists().into()))
            .method("isFile", vec![], ParamType::Bool, query(|f| f.path.is_file().into()))
            .method("isDirectory", vec![], ParamType::Bool, query(|f| f.path.is_dir().into()))
            .method("canRead", vec![], ParamType::Bool, query(|f| f.can_read().into()))
            .method("canWrite", vec![], ParamType::Bool, query(|f| f.can_write().into()))
            .method("canExecute", vec![], ParamType::Bool, query(|f| f.can_execute().into()))
            .method("getName", vec![], ParamType::String, query(|f| {
                f.path
                    .file_name()
                    .map(|name| HostValue::from(name.to_string_lossy().into_owned()))
                    .unwrap_or_else(|| HostValue::from(""))
            }))
            .method("getPath", vec![], ParamType::String, query(|f| render(&f.path).into()))
            .method("length", vec![], ParamType::Int, query(|f| HostValue::Int(f.length() as i64)))
            .method("toPath", vec![], ParamType::Any, query(|f| path_value(&f.path)))
            .method("toString", vec![], ParamType::String, query(|f| render(&f.path).into()))
            .build()
    })
    .clone()
}

impl HostObject for PathObject {
    fn host_type(&self) -> HostType {
        path_type()
    }

    fn describe(&self) -> String {
        render(&self.path)
    }
}

impl HostObject for FileObject {
    fn host_type(&self) -> HostType {
        file_type()
    }

    fn describe(&self) -> String {
        render(&self.path)
    }
}
