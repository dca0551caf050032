//! Host object model
//!
//! Everything on the host side of the boundary is a [`HostValue`]. Reference
//! variants share their payload and compare by identity, so a value that
//! crosses into script and back is the same value.

pub mod collections;
pub mod types;

pub use collections::{HostMap, HostSet, map_type, set_type};
pub use types::{
    AbstractMethod, DispatchTable, EnumConstant, FieldDescriptor, HostType, MethodDescriptor,
    ParamType, StaticField, TypeBuilder, TypeKind,
};

use crate::convert::coerce;
use crate::error::{HeronError, HeronResult};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Upcast to `Any` for downcasting trait objects
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A Rust value exposed as a host object
pub trait HostObject: AsAny + Send + Sync {
    /// Type descriptor used for member dispatch
    fn host_type(&self) -> HostType;

    /// Dynamic dispatch hook. `None` falls back to the type's method table.
    fn dispatch(&self, _method: &str, _args: &[HostValue]) -> Option<HeronResult<HostValue>> {
        None
    }

    /// Release resources held by the object
    fn close(&self) -> HeronResult<()> {
        Ok(())
    }

    /// Short description used in debug output
    fn describe(&self) -> String {
        self.host_type().name().to_string()
    }
}

/// Shared host object reference
pub type HostObjectRef = Arc<dyn HostObject>;

/// Downcast a host object to its concrete type
pub fn downcast<T: HostObject + 'static>(obj: &HostObjectRef) -> Option<&T> {
    (**obj).as_any().downcast_ref::<T>()
}

/// Host callable implementation
pub type HostFn = dyn Fn(&[HostValue]) -> HeronResult<HostValue> + Send + Sync;

struct FunctionInner {
    name: String,
    params: Option<Vec<ParamType>>,
    returns: ParamType,
    func: Arc<HostFn>,
    backing: Option<HostObjectRef>,
}

/// A host callable. Equality is identity.
#[derive(Clone)]
pub struct HostFunction(Arc<FunctionInner>);

impl HostFunction {
    /// Untyped callable: script arguments convert with `ParamType::Any`
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[HostValue]) -> HeronResult<HostValue> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(FunctionInner {
            name: name.into(),
            params: None,
            returns: ParamType::Any,
            func: Arc::new(func),
            backing: None,
        }))
    }

    /// Callable with declared parameter and return types
    pub fn typed(
        name: impl Into<String>,
        params: Vec<ParamType>,
        returns: ParamType,
        func: impl Fn(&[HostValue]) -> HeronResult<HostValue> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(FunctionInner {
            name: name.into(),
            params: Some(params),
            returns,
            func: Arc::new(func),
            backing: None,
        }))
    }

    /// Callable implemented by a host object (script-backed functions)
    pub(crate) fn backed_by(
        name: impl Into<String>,
        backing: HostObjectRef,
        func: impl Fn(&[HostValue]) -> HeronResult<HostValue> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(FunctionInner {
            name: name.into(),
            params: None,
            returns: ParamType::Any,
            func: Arc::new(func),
            backing: Some(backing),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Declared parameter types, if any
    pub fn params(&self) -> Option<&[ParamType]> {
        self.0.params.as_deref()
    }

    pub fn returns(&self) -> &ParamType {
        &self.0.returns
    }

    pub fn call(&self, args: &[HostValue]) -> HeronResult<HostValue> {
        (self.0.func)(args)
    }

    /// The object implementing this callable, for script-backed functions
    pub fn backing(&self) -> Option<&HostObjectRef> {
        self.0.backing.as_ref()
    }

    /// Release the backing object
    pub fn close(&self) -> HeronResult<()> {
        match &self.0.backing {
            Some(backing) => backing.close(),
            None => Ok(()),
        }
    }

    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({})", self.0.name)
    }
}

/// A host-side value
#[derive(Clone, Default)]
pub enum HostValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Date(SystemTime),
    List(Vec<HostValue>),
    Map(HostMap),
    Set(HostSet),
    Enum(EnumConstant),
    Type(HostType),
    Object(HostObjectRef),
    Function(HostFunction),
}

impl HostValue {
    /// Wrap a Rust value as a host object
    pub fn object(obj: impl HostObject + 'static) -> Self {
        Self::Object(Arc::new(obj))
    }

    /// Shape name used in error messages
    pub fn kind_name(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::Int(_) => "int".to_string(),
            Self::Double(_) => "double".to_string(),
            Self::String(_) => "string".to_string(),
            Self::Date(_) => "date".to_string(),
            Self::List(_) => "list".to_string(),
            Self::Map(_) => "map".to_string(),
            Self::Set(_) => "set".to_string(),
            Self::Enum(c) => c.type_name().to_string(),
            Self::Type(_) => "type".to_string(),
            Self::Object(obj) => obj.host_type().name().to_string(),
            Self::Function(_) => "function".to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value; integral doubles qualify
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Double(n) => integral(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HostMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&HostSet> {
        match self {
            Self::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumConstant> {
        match self {
            Self::Enum(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&HostType> {
        match self {
            Self::Type(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Downcast an `Object` value to its concrete type
    pub fn downcast<T: HostObject + 'static>(&self) -> Option<&T> {
        self.as_object().and_then(downcast::<T>)
    }

    /// Object view for method dispatch (maps, sets, enum constants, objects)
    pub fn as_object_ref(&self) -> Option<HostObjectRef> {
        match self {
            Self::Map(map) => Some(map.as_object_ref()),
            Self::Set(set) => Some(set.as_object_ref()),
            Self::Enum(c) => Some(c.as_object_ref()),
            Self::Object(obj) => Some(obj.clone()),
            _ => None,
        }
    }

    /// Type of the value when it is an instance of a host type
    pub fn host_type(&self) -> Option<HostType> {
        self.as_object_ref().map(|obj| obj.host_type())
    }

    /// Identity of reference variants
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Self::Map(map) => Some(map.addr()),
            Self::Set(set) => Some(set.addr()),
            Self::Enum(c) => Some(c.addr()),
            Self::Type(ty) => Some(ty.addr()),
            Self::Object(obj) => Some(Arc::as_ptr(obj) as *const () as usize),
            Self::Function(f) => Some(f.addr()),
            _ => None,
        }
    }

    /// Invoke a method by name with overload resolution.
    ///
    /// Type tokens dispatch to static methods; functions answer `call`.
    pub fn invoke(&self, method: &str, args: &[HostValue]) -> HeronResult<HostValue> {
        match self {
            Self::Function(f) if method == "call" => f.call(args),
            Self::Type(ty) => invoke_static(ty, method, args),
            _ => match self.as_object_ref() {
                Some(obj) => invoke_method(&obj, method, args),
                None => Err(HeronError::NoSuchMethod {
                    type_name: self.kind_name(),
                    method: method.to_string(),
                    arity: args.len(),
                }),
            },
        }
    }
}

/// Invoke an instance method on a host object
pub fn invoke_method(
    obj: &HostObjectRef,
    method: &str,
    args: &[HostValue],
) -> HeronResult<HostValue> {
    if let Some(result) = obj.dispatch(method, args) {
        return result;
    }
    let ty = obj.host_type();
    let candidates: Vec<&MethodDescriptor> = ty.dispatch().methods(method).iter().collect();
    let (descriptor, packed) = coerce::resolve_host(&candidates, args)
        .ok_or_else(|| no_such_method(&ty, method, args.len()))?;
    descriptor.invoke(Some(obj), &packed)
}

/// Invoke a static method of a host type
pub fn invoke_static(ty: &HostType, method: &str, args: &[HostValue]) -> HeronResult<HostValue> {
    let candidates = ty.static_methods(method);
    let (descriptor, packed) = coerce::resolve_host(&candidates, args)
        .ok_or_else(|| no_such_method(ty, method, args.len()))?;
    descriptor.invoke(None, &packed)
}

pub(crate) fn no_such_method(ty: &HostType, method: &str, arity: usize) -> HeronError {
    HeronError::NoSuchMethod {
        type_name: ty.name().to_string(),
        method: method.to_string(),
        arity,
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            _ => match (self.identity(), other.identity()) {
                (Some(a), Some(b)) => a == b && std::mem::discriminant(self) == std::mem::discriminant(other),
                _ => false,
            },
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Double(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Date(t) => write!(f, "Date({:?})", t),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Map(map) => write!(f, "{:?}", map),
            Self::Set(set) => write!(f, "{:?}", set),
            Self::Enum(c) => write!(f, "{:?}", c),
            Self::Type(ty) => write!(f, "{:?}", ty),
            Self::Object(obj) => write!(f, "{}", obj.describe()),
            Self::Function(func) => write!(f, "{:?}", func),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// An integral double that fits in `i64` without saturating
pub fn integral(n: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    (n.is_finite() && n.fract() == 0.0 && (-LIMIT..LIMIT).contains(&n)).then_some(n as i64)
}

impl From<i32> for HostValue {
    fn from(n: i32) -> Self {
        Self::Int(n as i64)
    }
}

impl From<i64> for HostValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<usize> for HostValue {
    fn from(n: usize) -> Self {
        Self::Int(n as i64)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        Self::Double(n)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<SystemTime> for HostValue {
    fn from(t: SystemTime) -> Self {
        Self::Date(t)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        Self::List(items)
    }
}

impl From<HostMap> for HostValue {
    fn from(map: HostMap) -> Self {
        Self::Map(map)
    }
}

impl From<HostSet> for HostValue {
    fn from(set: HostSet) -> Self {
        Self::Set(set)
    }
}

impl From<EnumConstant> for HostValue {
    fn from(c: EnumConstant) -> Self {
        Self::Enum(c)
    }
}

impl From<HostType> for HostValue {
    fn from(ty: HostType) -> Self {
        Self::Type(ty)
    }
}

impl From<HostFunction> for HostValue {
    fn from(f: HostFunction) -> Self {
        Self::Function(f)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        step: i64,
    }

    fn counter_type() -> HostType {
        HostType::class("Counter")
            .method("next", vec![ParamType::Int], ParamType::Int, |this, args| {
                let step = downcast::<Counter>(this).map(|c| c.step).unwrap_or(0);
                Ok(HostValue::Int(args[0].as_i64().unwrap_or(0) + step))
            })
            .build()
    }

    impl HostObject for Counter {
        fn host_type(&self) -> HostType {
            use std::sync::OnceLock;
            static TYPE: OnceLock<HostType> = OnceLock::new();
            TYPE.get_or_init(counter_type).clone()
        }
    }

    #[test]
    fn test_invoke_with_coercion() {
        let counter = HostValue::object(Counter { step: 2 });
        let result = counter.invoke("next", &[HostValue::from("40")]).unwrap();
        assert_eq!(result, HostValue::Int(42));
        assert!(matches!(
            counter.invoke("next", &[]),
            Err(HeronError::NoSuchMethod { arity: 0, .. })
        ));
        assert!(counter.downcast::<Counter>().is_some());
    }

    #[test]
    fn test_reference_equality_is_identity() {
        let a = HostMap::new();
        let b = HostMap::new();
        assert_eq!(HostValue::Map(a.clone()), HostValue::Map(a.clone()));
        assert_ne!(HostValue::Map(a), HostValue::Map(b));
        assert_eq!(HostValue::from("x"), HostValue::String("x".to_string()));
        assert_eq!(HostValue::from(None::<i64>), HostValue::Null);
    }

    #[test]
    fn test_function_call() {
        let f = HostFunction::new("add", |args| {
            Ok(HostValue::Int(args.iter().filter_map(HostValue::as_i64).sum()))
        });
        let value = HostValue::Function(f);
        assert_eq!(
            value.invoke("call", &[HostValue::Int(1), HostValue::Int(2)]).unwrap(),
            HostValue::Int(3)
        );
    }
}
