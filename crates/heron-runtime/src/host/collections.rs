//! Host maps and sets
//!
//! Both are shared, insertion-ordered and interior-mutable so a proxy in
//! script and the host observe the same live data.

use super::{HostObject, HostObjectRef, HostType, HostValue, ParamType};
use crate::error::{HeronError, HeronResult};
use heron_vm::value::format_number;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// String form of a key or set member
pub fn member_key(value: &HostValue) -> String {
    match value {
        HostValue::Null => "null".to_string(),
        HostValue::Bool(b) => b.to_string(),
        HostValue::Int(n) => n.to_string(),
        HostValue::Double(n) => format_number(*n),
        HostValue::String(s) => s.clone(),
        HostValue::Enum(c) => c.name().to_string(),
        other => format!("{}@{:x}", other.kind_name(), other.identity().unwrap_or_default()),
    }
}

pub struct MapData {
    entries: RwLock<IndexMap<String, HostValue>>,
}

impl HostObject for MapData {
    fn host_type(&self) -> HostType {
        map_type()
    }
}

/// Shared string-keyed map
#[derive(Clone)]
pub struct HostMap(Arc<MapData>);

impl HostMap {
    pub fn new() -> Self {
        Self(Arc::new(MapData {
            entries: RwLock::new(IndexMap::new()),
        }))
    }

    pub fn get(&self, key: &str) -> Option<HostValue> {
        self.0.entries.read().get(key).cloned()
    }

    /// Insert or overwrite, returning the previous value
    pub fn insert(&self, key: impl Into<String>, value: impl Into<HostValue>) -> Option<HostValue> {
        self.0.entries.write().insert(key.into(), value.into())
    }

    /// Remove preserving the order of the remaining entries
    pub fn remove(&self, key: &str) -> Option<HostValue> {
        self.0.entries.write().shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.entries.read().is_empty()
    }

    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.0.entries.write());
        drop(removed);
    }

    /// Keys in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.0.entries.read().keys().cloned().collect()
    }

    /// Entry snapshot in insertion order
    pub fn entries(&self) -> Vec<(String, HostValue)> {
        self.0
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn ptr_eq(&self, other: &HostMap) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_object_ref(&self) -> HostObjectRef {
        self.0.clone()
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl Default for HostMap {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V: Into<HostValue>> FromIterator<(K, V)> for HostMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Self::new();
        {
            let mut entries = map.0.entries.write();
            for (k, v) in iter {
                entries.insert(k.into(), v.into());
            }
        }
        map
    }
}

impl fmt::Debug for HostMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

pub struct SetData {
    members: RwLock<IndexMap<String, HostValue>>,
}

impl HostObject for SetData {
    fn host_type(&self) -> HostType {
        set_type()
    }
}

/// Shared insertion-ordered set. Members are distinct by their key form.
#[derive(Clone)]
pub struct HostSet(Arc<SetData>);

impl HostSet {
    pub fn new() -> Self {
        Self(Arc::new(SetData {
            members: RwLock::new(IndexMap::new()),
        }))
    }

    /// Insert, returning whether the member is new
    pub fn insert(&self, value: impl Into<HostValue>) -> bool {
        let value = value.into();
        let mut members = self.0.members.write();
        let key = member_key(&value);
        if members.contains_key(&key) {
            return false;
        }
        members.insert(key, value);
        true
    }

    pub fn contains(&self, value: &HostValue) -> bool {
        self.contains_key(&member_key(value))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.members.read().contains_key(key)
    }

    pub fn remove(&self, value: &HostValue) -> bool {
        self.remove_key(&member_key(value))
    }

    pub fn remove_key(&self, key: &str) -> bool {
        self.0.members.write().shift_remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.members.read().is_empty()
    }

    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.0.members.write());
        drop(removed);
    }

    /// Member keys in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.0.members.read().keys().cloned().collect()
    }

    /// Members in insertion order
    pub fn values(&self) -> Vec<HostValue> {
        self.0.members.read().values().cloned().collect()
    }

    pub fn ptr_eq(&self, other: &HostSet) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_object_ref(&self) -> HostObjectRef {
        self.0.clone()
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl Default for HostSet {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Into<HostValue>> FromIterator<V> for HostSet {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl fmt::Debug for HostSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values()).finish()
    }
}

fn map_data(this: &HostObjectRef) -> HeronResult<&MapData> {
    super::downcast::<MapData>(this).ok_or_else(|| HeronError::host("receiver is not a map"))
}

fn set_data(this: &HostObjectRef) -> HeronResult<&SetData> {
    super::downcast::<SetData>(this).ok_or_else(|| HeronError::host("receiver is not a set"))
}

fn arg_key(args: &[HostValue]) -> String {
    args.first().map(member_key).unwrap_or_else(|| "null".to_string())
}

/// Builtin type of [`HostMap`]
pub fn map_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::class("Map")
            .method("containsKey", vec![ParamType::Any], ParamType::Bool, |this, args| {
                let key = arg_key(args);
                Ok(HostValue::Bool(map_data(this)?.entries.read().contains_key(&key)))
            })
            .method("get", vec![ParamType::Any], ParamType::Any, |this, args| {
                let key = arg_key(args);
                Ok(map_data(this)?.entries.read().get(&key).cloned().unwrap_or_default())
            })
            .method("put", vec![ParamType::Any, ParamType::Any], ParamType::Any, |this, args| {
                let key = arg_key(args);
                let value = args.get(1).cloned().unwrap_or_default();
                Ok(map_data(this)?.entries.write().insert(key, value).unwrap_or_default())
            })
            .method("remove", vec![ParamType::Any], ParamType::Any, |this, args| {
                let key = arg_key(args);
                Ok(map_data(this)?.entries.write().shift_remove(&key).unwrap_or_default())
            })
            .method("size", vec![], ParamType::Int, |this, _| {
                Ok(HostValue::from(map_data(this)?.entries.read().len()))
            })
            .method("isEmpty", vec![], ParamType::Bool, |this, _| {
                Ok(HostValue::Bool(map_data(this)?.entries.read().is_empty()))
            })
            .method("clear", vec![], ParamType::Void, |this, _| {
                let removed = std::mem::take(&mut *map_data(this)?.entries.write());
                drop(removed);
                Ok(HostValue::Null)
            })
            .method("keys", vec![], ParamType::List, |this, _| {
                let keys = map_data(this)?.entries.read().keys().cloned().map(HostValue::String).collect();
                Ok(HostValue::List(keys))
            })
            .method("values", vec![], ParamType::List, |this, _| {
                Ok(HostValue::List(map_data(this)?.entries.read().values().cloned().collect()))
            })
            .build()
    })
    .clone()
}

/// Builtin type of [`HostSet`]
pub fn set_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::class("Set")
            .method("contains", vec![ParamType::Any], ParamType::Bool, |this, args| {
                let key = arg_key(args);
                Ok(HostValue::Bool(set_data(this)?.members.read().contains_key(&key)))
            })
            .method("add", vec![ParamType::Any], ParamType::Bool, |this, args| {
                let value = args.first().cloned().unwrap_or_default();
                let mut members = set_data(this)?.members.write();
                let key = member_key(&value);
                if members.contains_key(&key) {
                    return Ok(HostValue::Bool(false));
                }
                members.insert(key, value);
                Ok(HostValue::Bool(true))
            })
            .method("remove", vec![ParamType::Any], ParamType::Bool, |this, args| {
                let key = arg_key(args);
                Ok(HostValue::Bool(set_data(this)?.members.write().shift_remove(&key).is_some()))
            })
            .method("size", vec![], ParamType::Int, |this, _| {
                Ok(HostValue::from(set_data(this)?.members.read().len()))
            })
            .method("isEmpty", vec![], ParamType::Bool, |this, _| {
                Ok(HostValue::Bool(set_data(this)?.members.read().is_empty()))
            })
            .method("clear", vec![], ParamType::Void, |this, _| {
                let removed = std::mem::take(&mut *set_data(this)?.members.write());
                drop(removed);
                Ok(HostValue::Null)
            })
            .method("values", vec![], ParamType::List, |this, _| {
                Ok(HostValue::List(set_data(this)?.members.read().values().cloned().collect()))
            })
            .build()
    })
    .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_methods_share_data() {
        let map: HostMap = [("x", 1), ("y", 2)].into_iter().collect();
        let value = HostValue::Map(map.clone());
        assert_eq!(value.invoke("containsKey", &[HostValue::from("x")]).unwrap(), HostValue::Bool(true));
        value
            .invoke("put", &[HostValue::from("z"), HostValue::from("3")])
            .unwrap();
        assert_eq!(map.get("z"), Some(HostValue::from("3")));
        assert_eq!(map.keys(), vec!["x", "y", "z"]);
        assert_eq!(value.invoke("remove", &[HostValue::from("x")]).unwrap(), HostValue::Int(1));
        assert_eq!(map.keys(), vec!["y", "z"]);
        assert_eq!(value.invoke("size", &[]).unwrap(), HostValue::Int(2));
    }

    #[test]
    fn test_set_insertion_order_and_add_result() {
        let set: HostSet = ["b", "a"].into_iter().collect();
        let value = HostValue::Set(set.clone());
        assert_eq!(value.invoke("add", &[HostValue::from("c")]).unwrap(), HostValue::Bool(true));
        assert_eq!(value.invoke("add", &[HostValue::from("a")]).unwrap(), HostValue::Bool(false));
        assert_eq!(set.keys(), vec!["b", "a", "c"]);
        assert!(set.contains(&HostValue::from("c")));
        assert!(set.remove(&HostValue::from("b")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_member_key_forms() {
        assert_eq!(member_key(&HostValue::Int(3)), "3");
        assert_eq!(member_key(&HostValue::Double(2.0)), "2");
        assert_eq!(member_key(&HostValue::Bool(true)), "true");
    }
}
