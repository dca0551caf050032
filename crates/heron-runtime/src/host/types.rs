//! Host type descriptors
//!
//! A [`HostType`] describes a class, interface or enum of the host object
//! model: its constructors, methods (with overloads), fields, static members,
//! enum constants and abstract methods. Types are built once through
//! [`TypeBuilder`] and shared by reference. The member dispatch table used by
//! the generic object proxy is derived lazily on first use and cached.

use super::{HostObject, HostObjectRef, HostValue};
use crate::error::{HeronError, HeronResult};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

/// Kind of host type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
}

/// Conversion target for parameters, return values and `to_host`
#[derive(Clone)]
pub enum ParamType {
    /// Structural conversion, never fails
    Any,
    Bool,
    Int,
    Double,
    String,
    Date,
    List,
    Map,
    Set,
    /// A type token
    Type,
    /// A constant of the given enum type
    Enum(HostType),
    /// An instance of the given class or interface
    Object(HostType),
    /// A callable
    Function,
    /// No value (return type only)
    Void,
}

impl ParamType {
    /// Type name used in error messages
    pub fn describe(&self) -> String {
        match self {
            Self::Any => "any".to_string(),
            Self::Bool => "bool".to_string(),
            Self::Int => "int".to_string(),
            Self::Double => "double".to_string(),
            Self::String => "string".to_string(),
            Self::Date => "date".to_string(),
            Self::List => "list".to_string(),
            Self::Map => "map".to_string(),
            Self::Set => "set".to_string(),
            Self::Type => "type".to_string(),
            Self::Enum(ty) | Self::Object(ty) => ty.name().to_string(),
            Self::Function => "function".to_string(),
            Self::Void => "void".to_string(),
        }
    }

    /// Whether `null` is an acceptable value
    pub fn is_nullable(&self) -> bool {
        !matches!(self, Self::Bool | Self::Int | Self::Double)
    }
}

impl fmt::Debug for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Instance method implementation: `(receiver, args)`
pub type InstanceFn = dyn Fn(&HostObjectRef, &[HostValue]) -> HeronResult<HostValue> + Send + Sync;

/// Static method or constructor implementation
pub type StaticFn = dyn Fn(&[HostValue]) -> HeronResult<HostValue> + Send + Sync;

/// Field reader
pub type FieldGetter = dyn Fn(&HostObjectRef) -> HostValue + Send + Sync;

/// Field writer
pub type FieldSetter = dyn Fn(&HostObjectRef, HostValue) -> HeronResult<()> + Send + Sync;

#[derive(Clone)]
enum Invoker {
    Instance(Arc<InstanceFn>),
    Static(Arc<StaticFn>),
}

/// A method, static method or constructor overload.
///
/// Implementations receive exactly `params().len()` arguments, plus one
/// trailing `HostValue::List` holding the variadic tail when the method is
/// variadic. Arguments are already coerced to the declared types.
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    params: Vec<ParamType>,
    variadic: Option<ParamType>,
    returns: ParamType,
    invoker: Invoker,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same parameter types and variadic tail
    fn same_signature(&self, other: &MethodDescriptor) -> bool {
        let describe = |m: &MethodDescriptor| {
            (
                m.params.iter().map(ParamType::describe).collect::<Vec<_>>(),
                m.variadic.as_ref().map(ParamType::describe),
            )
        };
        describe(self) == describe(other)
    }

    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    /// Element type of the variadic tail
    pub fn variadic(&self) -> Option<&ParamType> {
        self.variadic.as_ref()
    }

    pub fn returns(&self) -> &ParamType {
        &self.returns
    }

    pub fn is_static(&self) -> bool {
        matches!(self.invoker, Invoker::Static(_))
    }

    /// Whether a call with `arity` positional arguments can bind to this overload
    pub fn accepts_arity(&self, arity: usize) -> bool {
        arity == self.params.len() || (self.variadic.is_some() && arity >= self.params.len())
    }

    /// Invoke with coerced, packed arguments
    pub fn invoke(
        &self,
        receiver: Option<&HostObjectRef>,
        args: &[HostValue],
    ) -> HeronResult<HostValue> {
        match (&self.invoker, receiver) {
            (Invoker::Instance(f), Some(receiver)) => f(receiver, args),
            (Invoker::Static(f), _) => f(args),
            (Invoker::Instance(_), None) => Err(HeronError::host(format!(
                "instance method '{}' invoked without a receiver",
                self.name
            ))),
        }
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?}", self.name, self.params)?;
        if let Some(variadic) = &self.variadic {
            write!(f, ", {:?}...", variadic)?;
        }
        write!(f, ") -> {:?}", self.returns)
    }
}

/// An instance field. A field without a setter is final.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: String,
    ty: ParamType,
    get: Arc<FieldGetter>,
    set: Option<Arc<FieldSetter>>,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &ParamType {
        &self.ty
    }

    pub fn is_final(&self) -> bool {
        self.set.is_none()
    }

    pub fn get(&self, receiver: &HostObjectRef) -> HostValue {
        (self.get)(receiver)
    }

    /// Write a coerced value. Fails on final fields.
    pub fn set(&self, type_name: &str, receiver: &HostObjectRef, value: HostValue) -> HeronResult<()> {
        match &self.set {
            Some(set) => set(receiver, value),
            None => Err(HeronError::immutable(type_name, &self.name)),
        }
    }
}

/// A static field holding its own value
pub struct StaticField {
    name: String,
    ty: ParamType,
    value: RwLock<HostValue>,
    writable: bool,
}

impl StaticField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &ParamType {
        &self.ty
    }

    pub fn is_final(&self) -> bool {
        !self.writable
    }

    pub fn get(&self) -> HostValue {
        self.value.read().clone()
    }

    /// Write a coerced value. Fails on final fields and enum constants.
    pub fn set(&self, type_name: &str, value: HostValue) -> HeronResult<()> {
        if !self.writable {
            return Err(HeronError::immutable(type_name, &self.name));
        }
        *self.value.write() = value;
        Ok(())
    }
}

/// An abstract interface method
#[derive(Debug, Clone)]
pub struct AbstractMethod {
    pub name: String,
    pub params: Vec<ParamType>,
    pub variadic: Option<ParamType>,
    pub returns: ParamType,
}

/// Bean-style property accessors
#[derive(Clone, Default)]
pub struct PropertyAccess {
    pub getter: Option<MethodDescriptor>,
    pub setter: Option<MethodDescriptor>,
}

/// Script-visible capabilities of an instance, keyed by property name
#[derive(Default)]
pub struct DispatchTable {
    properties: IndexMap<String, PropertyAccess>,
    fields: IndexMap<String, FieldDescriptor>,
    methods: IndexMap<String, Vec<MethodDescriptor>>,
}

impl DispatchTable {
    fn build(ty: &HostType) -> Self {
        let mut table = Self::default();
        let mut seen = Vec::new();
        table.collect(ty, &mut seen);
        for overloads in table.methods.values() {
            for method in overloads {
                if let Some(key) = bean_property(method) {
                    let access = table.properties.entry(key.clone()).or_default();
                    let slot = if method.params.is_empty() {
                        &mut access.getter
                    } else {
                        &mut access.setter
                    };
                    if slot.is_none() {
                        *slot = Some(method.clone());
                    }
                }
            }
        }
        table.properties.retain(|_, access| access.getter.is_some() || access.setter.is_some());
        table
    }

    /// Own members first. Every overload a type declares is kept; an inherited
    /// overload is hidden when a subtype already declares the same signature.
    fn collect(&mut self, ty: &HostType, seen: &mut Vec<usize>) {
        if seen.contains(&ty.addr()) {
            return;
        }
        seen.push(ty.addr());
        let visible: Vec<&MethodDescriptor> = ty
            .0
            .methods
            .iter()
            .filter(|method| {
                !self
                    .methods
                    .get(&method.name)
                    .is_some_and(|overrides| overrides.iter().any(|m| m.same_signature(method)))
            })
            .collect();
        for method in visible {
            self.methods
                .entry(method.name.clone())
                .or_default()
                .push(method.clone());
        }
        for field in &ty.0.fields {
            self.fields
                .entry(field.name.clone())
                .or_insert_with(|| field.clone());
        }
        for supertype in &ty.0.supertypes {
            self.collect(supertype, seen);
        }
    }

    /// Bean getter for a property
    pub fn getter(&self, key: &str) -> Option<&MethodDescriptor> {
        self.properties.get(key).and_then(|p| p.getter.as_ref())
    }

    /// Bean setter for a property
    pub fn setter(&self, key: &str) -> Option<&MethodDescriptor> {
        self.properties.get(key).and_then(|p| p.setter.as_ref())
    }

    pub fn field(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.get(key)
    }

    /// Overloads of a method (empty when unknown)
    pub fn methods(&self, name: &str) -> &[MethodDescriptor] {
        self.methods.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_member(&self, key: &str) -> bool {
        self.properties.contains_key(key) || self.fields.contains_key(key) || self.methods.contains_key(key)
    }

    /// Readable bean properties followed by fields, without duplicates
    pub fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .properties
            .iter()
            .filter(|(_, access)| access.getter.is_some())
            .map(|(name, _)| name.clone())
            .collect();
        for name in self.fields.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// `getFoo()` / `isFoo()` / `setFoo(x)` → `foo`
fn bean_property(method: &MethodDescriptor) -> Option<String> {
    if method.variadic.is_some() {
        return None;
    }
    let name = method.name.as_str();
    let suffix = match method.params.len() {
        0 => name
            .strip_prefix("get")
            .or_else(|| name.strip_prefix("is").filter(|_| matches!(method.returns, ParamType::Bool))),
        1 => name.strip_prefix("set"),
        _ => None,
    }?;
    let mut chars = suffix.chars();
    let first = chars.next().filter(|c| c.is_ascii_uppercase())?;
    Some(first.to_ascii_lowercase().to_string() + chars.as_str())
}

struct TypeInner {
    name: String,
    kind: TypeKind,
    supertypes: Vec<HostType>,
    constructors: Vec<MethodDescriptor>,
    methods: Vec<MethodDescriptor>,
    static_methods: Vec<MethodDescriptor>,
    fields: Vec<FieldDescriptor>,
    static_fields: IndexMap<String, StaticField>,
    constants: Vec<EnumConstant>,
    abstract_methods: Vec<AbstractMethod>,
    dispatch: OnceLock<DispatchTable>,
}

/// Shared host type descriptor. Equality is identity.
#[derive(Clone)]
pub struct HostType(Arc<TypeInner>);

impl HostType {
    /// Start building a class
    pub fn class(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Class)
    }

    /// Start building an interface
    pub fn interface(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Interface)
    }

    /// Start building an enum
    pub fn enumeration(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Enum)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> TypeKind {
        self.0.kind
    }

    pub fn is_interface(&self) -> bool {
        self.0.kind == TypeKind::Interface
    }

    pub fn is_enum(&self) -> bool {
        self.0.kind == TypeKind::Enum
    }

    pub fn supertypes(&self) -> &[HostType] {
        &self.0.supertypes
    }

    /// Whether `other` is this type or a (transitive) subtype of it
    pub fn is_assignable_from(&self, other: &HostType) -> bool {
        self == other || other.0.supertypes.iter().any(|s| self.is_assignable_from(s))
    }

    pub fn constructors(&self) -> &[MethodDescriptor] {
        &self.0.constructors
    }

    /// Static overloads named `name`
    pub fn static_methods(&self, name: &str) -> Vec<&MethodDescriptor> {
        self.0
            .static_methods
            .iter()
            .filter(|m| m.name == name)
            .collect()
    }

    pub fn has_static_method(&self, name: &str) -> bool {
        self.0.static_methods.iter().any(|m| m.name == name)
    }

    pub fn static_field(&self, name: &str) -> Option<&StaticField> {
        self.0.static_fields.get(name)
    }

    pub fn static_field_names(&self) -> Vec<String> {
        self.0.static_fields.keys().cloned().collect()
    }

    /// Enum constants in declaration order
    pub fn constants(&self) -> &[EnumConstant] {
        &self.0.constants
    }

    pub fn constant(&self, name: &str) -> Option<&EnumConstant> {
        self.0.constants.iter().find(|c| c.name() == name)
    }

    /// Abstract methods including inherited ones; `close` is never required
    pub fn abstract_methods(&self) -> Vec<AbstractMethod> {
        let mut out: Vec<AbstractMethod> = Vec::new();
        self.collect_abstract(&mut out);
        out
    }

    fn collect_abstract(&self, out: &mut Vec<AbstractMethod>) {
        for method in &self.0.abstract_methods {
            if method.name != "close" && !out.iter().any(|m| m.name == method.name) {
                out.push(method.clone());
            }
        }
        for supertype in &self.0.supertypes {
            supertype.collect_abstract(out);
        }
    }

    /// Abstract method by name
    pub fn find_abstract(&self, name: &str) -> Option<AbstractMethod> {
        self.abstract_methods().into_iter().find(|m| m.name == name)
    }

    /// Cached instance dispatch table
    pub fn dispatch(&self) -> &DispatchTable {
        self.0.dispatch.get_or_init(|| DispatchTable::build(self))
    }

    pub fn ptr_eq(&self, other: &HostType) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for HostType {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for HostType {}

impl fmt::Debug for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.0.kind, self.0.name)
    }
}

struct ConstantInner {
    name: String,
    ordinal: usize,
    type_name: String,
    owner: Weak<TypeInner>,
}

/// An enum constant. Equality is identity.
#[derive(Clone)]
pub struct EnumConstant(Arc<ConstantInner>);

impl EnumConstant {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn ordinal(&self) -> usize {
        self.0.ordinal
    }

    pub fn type_name(&self) -> &str {
        &self.0.type_name
    }

    /// The declaring enum type, while it is alive
    pub fn enum_type(&self) -> Option<HostType> {
        self.0.owner.upgrade().map(HostType)
    }

    /// Whether this constant belongs to `ty`
    pub fn is_instance_of(&self, ty: &HostType) -> bool {
        Weak::as_ptr(&self.0.owner) == Arc::as_ptr(&ty.0)
    }

    /// View as a host object for method dispatch
    pub fn as_object_ref(&self) -> HostObjectRef {
        self.0.clone()
    }

    pub fn ptr_eq(&self, other: &EnumConstant) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for EnumConstant {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for EnumConstant {}

impl fmt::Debug for EnumConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0.type_name, self.0.name)
    }
}

impl HostObject for ConstantInner {
    fn host_type(&self) -> HostType {
        match self.owner.upgrade() {
            Some(inner) => HostType(inner),
            None => HostType::class(self.type_name.clone()).build(),
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

fn constant_receiver(receiver: &HostObjectRef) -> HeronResult<&ConstantInner> {
    (**receiver)
        .as_any()
        .downcast_ref::<ConstantInner>()
        .ok_or_else(|| HeronError::host("receiver is not an enum constant"))
}

/// Builder for [`HostType`]
pub struct TypeBuilder {
    name: String,
    kind: TypeKind,
    supertypes: Vec<HostType>,
    constructors: Vec<MethodDescriptor>,
    methods: Vec<MethodDescriptor>,
    static_methods: Vec<MethodDescriptor>,
    fields: Vec<FieldDescriptor>,
    static_fields: Vec<(String, ParamType, HostValue, bool)>,
    constants: Vec<String>,
    abstract_methods: Vec<AbstractMethod>,
}

impl TypeBuilder {
    fn new(name: String, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            supertypes: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            static_methods: Vec::new(),
            fields: Vec::new(),
            static_fields: Vec::new(),
            constants: Vec::new(),
            abstract_methods: Vec::new(),
        }
    }

    /// Add a supertype (superclass or implemented interface)
    pub fn extends(mut self, supertype: &HostType) -> Self {
        self.supertypes.push(supertype.clone());
        self
    }

    pub fn constructor(
        self,
        params: Vec<ParamType>,
        f: impl Fn(&[HostValue]) -> HeronResult<HostValue> + Send + Sync + 'static,
    ) -> Self {
        self.constructor_variadic(params, None, f)
    }

    pub fn constructor_variadic(
        mut self,
        params: Vec<ParamType>,
        variadic: Option<ParamType>,
        f: impl Fn(&[HostValue]) -> HeronResult<HostValue> + Send + Sync + 'static,
    ) -> Self {
        let name = self.name.clone();
        self.constructors.push(MethodDescriptor {
            name,
            params,
            variadic,
            returns: ParamType::Any,
            invoker: Invoker::Static(Arc::new(f)),
        });
        self
    }

    /// Add an instance method overload
    pub fn method(
        self,
        name: &str,
        params: Vec<ParamType>,
        returns: ParamType,
        f: impl Fn(&HostObjectRef, &[HostValue]) -> HeronResult<HostValue> + Send + Sync + 'static,
    ) -> Self {
        self.method_variadic(name, params, None, returns, f)
    }

    /// Add an instance method overload with an optional variadic tail
    pub fn method_variadic(
        mut self,
        name: &str,
        params: Vec<ParamType>,
        variadic: Option<ParamType>,
        returns: ParamType,
        f: impl Fn(&HostObjectRef, &[HostValue]) -> HeronResult<HostValue> + Send + Sync + 'static,
    ) -> Self {
        self.methods.push(MethodDescriptor {
            name: name.to_string(),
            params,
            variadic,
            returns,
            invoker: Invoker::Instance(Arc::new(f)),
        });
        self
    }

    /// Add a static method overload
    pub fn static_method(
        mut self,
        name: &str,
        params: Vec<ParamType>,
        returns: ParamType,
        f: impl Fn(&[HostValue]) -> HeronResult<HostValue> + Send + Sync + 'static,
    ) -> Self {
        self.static_methods.push(MethodDescriptor {
            name: name.to_string(),
            params,
            variadic: None,
            returns,
            invoker: Invoker::Static(Arc::new(f)),
        });
        self
    }

    /// Add a final instance field
    pub fn field(
        mut self,
        name: &str,
        ty: ParamType,
        get: impl Fn(&HostObjectRef) -> HostValue + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            ty,
            get: Arc::new(get),
            set: None,
        });
        self
    }

    /// Add a writable instance field
    pub fn mutable_field(
        mut self,
        name: &str,
        ty: ParamType,
        get: impl Fn(&HostObjectRef) -> HostValue + Send + Sync + 'static,
        set: impl Fn(&HostObjectRef, HostValue) -> HeronResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            ty,
            get: Arc::new(get),
            set: Some(Arc::new(set)),
        });
        self
    }

    /// Add a final static field
    pub fn static_field(mut self, name: &str, ty: ParamType, value: HostValue) -> Self {
        self.static_fields.push((name.to_string(), ty, value, false));
        self
    }

    /// Add a writable static field
    pub fn mutable_static_field(mut self, name: &str, ty: ParamType, value: HostValue) -> Self {
        self.static_fields.push((name.to_string(), ty, value, true));
        self
    }

    /// Add an enum constant
    pub fn constant(mut self, name: &str) -> Self {
        self.constants.push(name.to_string());
        self
    }

    /// Add an abstract method (interfaces)
    pub fn abstract_method(self, name: &str, params: Vec<ParamType>, returns: ParamType) -> Self {
        self.abstract_method_variadic(name, params, None, returns)
    }

    /// Add an abstract method with a variadic tail
    pub fn abstract_method_variadic(
        mut self,
        name: &str,
        params: Vec<ParamType>,
        variadic: Option<ParamType>,
        returns: ParamType,
    ) -> Self {
        self.abstract_methods.push(AbstractMethod {
            name: name.to_string(),
            params,
            variadic,
            returns,
        });
        self
    }

    fn with_enum_members(self) -> Self {
        self.method("name", vec![], ParamType::String, |this, _| {
            Ok(HostValue::from(constant_receiver(this)?.name.as_str()))
        })
        .method("toString", vec![], ParamType::String, |this, _| {
            Ok(HostValue::from(constant_receiver(this)?.name.as_str()))
        })
        .method("ordinal", vec![], ParamType::Int, |this, _| {
            Ok(HostValue::Int(constant_receiver(this)?.ordinal as i64))
        })
    }

    pub fn build(self) -> HostType {
        let builder = if self.kind == TypeKind::Enum {
            self.with_enum_members()
        } else {
            self
        };
        let TypeBuilder {
            name,
            kind,
            supertypes,
            constructors,
            methods,
            mut static_methods,
            fields,
            static_fields,
            constants,
            abstract_methods,
        } = builder;

        let inner = Arc::new_cyclic(|owner: &Weak<TypeInner>| {
            let constants: Vec<EnumConstant> = constants
                .into_iter()
                .enumerate()
                .map(|(ordinal, constant)| {
                    EnumConstant(Arc::new(ConstantInner {
                        name: constant,
                        ordinal,
                        type_name: name.clone(),
                        owner: owner.clone(),
                    }))
                })
                .collect();

            let mut fields_by_name = IndexMap::new();
            for constant in &constants {
                fields_by_name.insert(
                    constant.name().to_string(),
                    StaticField {
                        name: constant.name().to_string(),
                        ty: ParamType::Any,
                        value: RwLock::new(HostValue::Enum(constant.clone())),
                        writable: false,
                    },
                );
            }
            for (field_name, ty, value, writable) in static_fields {
                fields_by_name.insert(
                    field_name.clone(),
                    StaticField {
                        name: field_name,
                        ty,
                        value: RwLock::new(value),
                        writable,
                    },
                );
            }

            if kind == TypeKind::Enum {
                let values = constants.clone();
                static_methods.push(MethodDescriptor {
                    name: "values".to_string(),
                    params: vec![],
                    variadic: None,
                    returns: ParamType::List,
                    invoker: Invoker::Static(Arc::new(move |_| {
                        Ok(HostValue::List(
                            values.iter().cloned().map(HostValue::Enum).collect(),
                        ))
                    })),
                });
                let lookup = constants.clone();
                let type_name = name.clone();
                static_methods.push(MethodDescriptor {
                    name: "valueOf".to_string(),
                    params: vec![ParamType::String],
                    variadic: None,
                    returns: ParamType::Any,
                    invoker: Invoker::Static(Arc::new(move |args| {
                        let wanted = args.first().and_then(HostValue::as_str).unwrap_or_default();
                        lookup
                            .iter()
                            .find(|c| c.name() == wanted)
                            .map(|c| HostValue::Enum(c.clone()))
                            .ok_or_else(|| {
                                HeronError::host(format!(
                                    "No enum constant {}.{}",
                                    type_name, wanted
                                ))
                            })
                    })),
                });
            }

            TypeInner {
                name,
                kind,
                supertypes,
                constructors,
                methods,
                static_methods,
                fields,
                static_fields: fields_by_name,
                constants,
                abstract_methods,
                dispatch: OnceLock::new(),
            }
        });
        HostType(inner)
    }
}
