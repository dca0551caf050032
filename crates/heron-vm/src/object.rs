//! Heap objects
//!
//! Objects are reference counted and shared between the VM and any host code
//! that holds a [`Value`]. Interior state sits behind `parking_lot` locks that
//! are only held for the duration of a single read or write; no lock is held
//! while calling out to script or to a proxy handler.

use crate::function::Function;
use crate::proxy::ProxyHandler;
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

static LIVE_OBJECTS: AtomicUsize = AtomicUsize::new(0);

/// Number of heap objects currently alive in this process
pub fn live_objects() -> usize {
    LIVE_OBJECTS.load(Ordering::Relaxed)
}

/// An own data property
#[derive(Clone, Debug)]
pub struct Property {
    pub value: Value,
    pub writable: bool,
    pub enumerable: bool,
}

impl Property {
    /// A writable, enumerable data property
    pub fn data(value: Value) -> Self {
        Self {
            value,
            writable: true,
            enumerable: true,
        }
    }

    /// A read-only, enumerable data property
    pub fn read_only(value: Value) -> Self {
        Self {
            value,
            writable: false,
            enumerable: true,
        }
    }
}

/// A proxy object: a handler that receives every trap, plus a revocation flag
pub struct ProxyObject {
    handler: Arc<dyn ProxyHandler>,
    revoked: AtomicBool,
}

impl ProxyObject {
    /// The handler, or `None` once revoked
    pub fn handler(&self) -> Option<&Arc<dyn ProxyHandler>> {
        if self.is_revoked() {
            None
        } else {
            Some(&self.handler)
        }
    }

    /// The handler regardless of revocation
    pub fn handler_raw(&self) -> &Arc<dyn ProxyHandler> {
        &self.handler
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }

    /// Revoke the proxy. Every later trap throws a TypeError.
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::Release);
    }
}

/// What kind of object this is
pub enum ObjectKind {
    /// Plain property bag
    Ordinary,
    /// Dense array
    Array(RwLock<Vec<Value>>),
    /// Callable function
    Function(Function),
    /// Proxy delegating to a handler
    Proxy(ProxyObject),
    /// Date holding epoch milliseconds
    Date(f64),
    /// Error object (`name` and `message` live in the property bag)
    Error,
}

/// A heap object
pub struct JsObject {
    kind: ObjectKind,
    properties: RwLock<IndexMap<String, Property>>,
}

impl JsObject {
    fn new(kind: ObjectKind) -> Self {
        LIVE_OBJECTS.fetch_add(1, Ordering::Relaxed);
        Self {
            kind,
            properties: RwLock::new(IndexMap::new()),
        }
    }
}

impl Drop for JsObject {
    fn drop(&mut self) {
        LIVE_OBJECTS.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Shared reference to a heap object. Equality is identity.
#[derive(Clone)]
pub struct ObjectRef(Arc<JsObject>);

/// Weak reference to a heap object
#[derive(Clone)]
pub struct WeakObjectRef(Weak<JsObject>);

impl WeakObjectRef {
    /// Upgrade to a strong reference if the object is still alive
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }

    /// Whether the referenced object is still alive
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl ObjectRef {
    fn with_kind(kind: ObjectKind) -> Self {
        Self(Arc::new(JsObject::new(kind)))
    }

    /// Create an empty ordinary object
    pub fn ordinary() -> Self {
        Self::with_kind(ObjectKind::Ordinary)
    }

    /// Create an array object
    pub fn array(items: Vec<Value>) -> Self {
        Self::with_kind(ObjectKind::Array(RwLock::new(items)))
    }

    /// Create a function object
    pub fn function(function: Function) -> Self {
        Self::with_kind(ObjectKind::Function(function))
    }

    /// Create a proxy object around a handler
    pub fn proxy(handler: Arc<dyn ProxyHandler>) -> Self {
        Self::with_kind(ObjectKind::Proxy(ProxyObject {
            handler,
            revoked: AtomicBool::new(false),
        }))
    }

    /// Create a date object from epoch milliseconds
    pub fn date(epoch_ms: f64) -> Self {
        Self::with_kind(ObjectKind::Date(epoch_ms))
    }

    /// Create an error object
    pub fn error(name: &str, message: &str) -> Self {
        let obj = Self::with_kind(ObjectKind::Error);
        obj.define("name", Value::from(name), true);
        obj.define("message", Value::from(message), true);
        obj
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.0.kind
    }

    pub fn is_array(&self) -> bool {
        matches!(self.0.kind, ObjectKind::Array(_))
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.0.kind, ObjectKind::Proxy(_))
    }

    /// Whether calling the object is allowed
    pub fn is_callable(&self) -> bool {
        match &self.0.kind {
            ObjectKind::Function(_) => true,
            ObjectKind::Proxy(proxy) => proxy.handler_raw().is_callable(),
            _ => false,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.0.kind {
            ObjectKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&ProxyObject> {
        match &self.0.kind {
            ObjectKind::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// The proxy handler, ignoring revocation
    pub fn proxy_handler(&self) -> Option<&Arc<dyn ProxyHandler>> {
        self.as_proxy().map(ProxyObject::handler_raw)
    }

    /// Snapshot of the array elements
    pub fn array_elements(&self) -> Option<Vec<Value>> {
        match &self.0.kind {
            ObjectKind::Array(items) => Some(items.read().clone()),
            _ => None,
        }
    }

    /// Array length, or `None` for non-arrays
    pub fn array_len(&self) -> Option<usize> {
        match &self.0.kind {
            ObjectKind::Array(items) => Some(items.read().len()),
            _ => None,
        }
    }

    /// Read one array element
    pub fn array_get(&self, index: usize) -> Option<Value> {
        match &self.0.kind {
            ObjectKind::Array(items) => items.read().get(index).cloned(),
            _ => None,
        }
    }

    /// Write one array element, growing the array with `undefined` holes
    pub fn array_set(&self, index: usize, value: Value) -> bool {
        match &self.0.kind {
            ObjectKind::Array(items) => {
                let mut items = items.write();
                if index >= items.len() {
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                true
            }
            _ => false,
        }
    }

    /// Append to an array, returning the new length
    pub fn array_push(&self, values: impl IntoIterator<Item = Value>) -> Option<usize> {
        match &self.0.kind {
            ObjectKind::Array(items) => {
                let mut items = items.write();
                items.extend(values);
                Some(items.len())
            }
            _ => None,
        }
    }

    /// Set the array length, truncating or padding with `undefined`
    pub fn array_set_len(&self, len: usize) -> bool {
        match &self.0.kind {
            ObjectKind::Array(items) => {
                items.write().resize(len, Value::Undefined);
                true
            }
            _ => false,
        }
    }

    /// Read an own data property
    pub fn get_own(&self, key: &str) -> Option<Value> {
        self.0.properties.read().get(key).map(|p| p.value.clone())
    }

    /// Read an own property descriptor
    pub fn get_own_property(&self, key: &str) -> Option<Property> {
        self.0.properties.read().get(key).cloned()
    }

    /// Write an own data property. Returns `false` when the property is read-only.
    pub fn set_own(&self, key: &str, value: Value) -> bool {
        let mut props = self.0.properties.write();
        match props.get_mut(key) {
            Some(prop) if !prop.writable => false,
            Some(prop) => {
                prop.value = value;
                true
            }
            None => {
                props.insert(key.to_string(), Property::data(value));
                true
            }
        }
    }

    /// Define (or redefine) an own data property
    pub fn define(&self, key: &str, value: Value, writable: bool) {
        let prop = if writable {
            Property::data(value)
        } else {
            Property::read_only(value)
        };
        self.0.properties.write().insert(key.to_string(), prop);
    }

    /// Define a non-enumerable own property
    pub fn define_hidden(&self, key: &str, value: Value) {
        self.0.properties.write().insert(
            key.to_string(),
            Property {
                value,
                writable: true,
                enumerable: false,
            },
        );
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.properties.read().contains_key(key)
    }

    /// Remove an own property, keeping the order of the remaining keys
    pub fn delete_own(&self, key: &str) -> Option<Value> {
        self.0
            .properties
            .write()
            .shift_remove(key)
            .map(|prop| prop.value)
    }

    /// Own property keys in insertion order
    pub fn own_keys(&self) -> Vec<String> {
        self.0.properties.read().keys().cloned().collect()
    }

    /// Own enumerable property keys in insertion order
    pub fn own_enumerable_keys(&self) -> Vec<String> {
        self.0
            .properties
            .read()
            .iter()
            .filter(|(_, prop)| prop.enumerable)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Remove every own property and return the removed values
    pub fn clear_properties(&self) -> Vec<Value> {
        let mut props = self.0.properties.write();
        props.drain(..).map(|(_, prop)| prop.value).collect()
    }

    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Arc::downgrade(&self.0))
    }

    /// Address of the object, stable for its lifetime
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            ObjectKind::Ordinary => write!(f, "[object Object]"),
            ObjectKind::Array(items) => write!(f, "Array({})", items.read().len()),
            ObjectKind::Function(func) => write!(f, "[Function: {}]", func.name()),
            ObjectKind::Proxy(proxy) if proxy.is_revoked() => write!(f, "Proxy {{ <revoked> }}"),
            ObjectKind::Proxy(proxy) => write!(f, "Proxy {{ {} }}", proxy.handler_raw().describe()),
            ObjectKind::Date(ms) => write!(f, "Date({})", ms),
            ObjectKind::Error => write!(f, "[object Error]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_property() {
        let obj = ObjectRef::ordinary();
        obj.define("x", Value::from(1), false);
        assert!(!obj.set_own("x", Value::from(2)));
        assert_eq!(obj.get_own("x").and_then(|v| v.as_number()), Some(1.0));
    }

    #[test]
    fn test_key_order_survives_delete() {
        let obj = ObjectRef::ordinary();
        for key in ["a", "b", "c"] {
            obj.set_own(key, Value::Null);
        }
        obj.delete_own("b");
        obj.set_own("d", Value::Null);
        assert_eq!(obj.own_keys(), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_array_growth() {
        let arr = ObjectRef::array(vec![]);
        arr.array_set(2, Value::from("x"));
        assert_eq!(arr.array_len(), Some(3));
        assert!(arr.array_get(0).is_some_and(|v| v.is_undefined()));
    }

    #[test]
    fn test_weak_ref() {
        let obj = ObjectRef::ordinary();
        let weak = obj.downgrade();
        assert!(weak.upgrade().is_some_and(|o| o == obj));
        drop(obj);
        assert!(!weak.is_alive());
    }
}
