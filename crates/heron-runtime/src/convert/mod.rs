//! Value conversion between host and script
//!
//! [`ValueConverter`] decides how every value crosses the boundary. Host →
//! script consults the [`ConversionRuleSet`]; script → host is driven by the
//! requested [`ParamType`]. Proxies created here are memoised per runtime so a
//! host object keeps one identity in script.

pub mod coerce;
pub mod rules;

pub use rules::{ConversionRule, ConversionRuleSet, Strategy};

use crate::bridge::ScriptBackedObject;
use crate::config::ConverterConfig;
use crate::error::{HeronError, HeronResult};
use crate::host::{HostMap, HostSet, HostValue, ParamType, integral};
use crate::proxy::{self, ProxyMode};
use crate::runtime::Runtime;
use heron_vm::{ObjectKind, ObjectRef, Value};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Bidirectional value converter
#[derive(Debug, Clone, Default)]
pub struct ValueConverter {
    config: Arc<ConverterConfig>,
    rules: ConversionRuleSet,
}

impl ValueConverter {
    /// Converter with default rules and configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Converter with default rules
    pub fn with_config(config: ConverterConfig) -> Self {
        Self {
            config: Arc::new(config),
            rules: ConversionRuleSet::default(),
        }
    }

    /// Converter with custom rules
    pub fn with_rules(config: ConverterConfig, rules: ConversionRuleSet) -> Self {
        Self {
            config: Arc::new(config),
            rules,
        }
    }

    /// Live configuration; toggles take effect on the next conversion
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn rules(&self) -> &ConversionRuleSet {
        &self.rules
    }

    /// Host → script
    pub fn to_script(&self, runtime: &Runtime, value: &HostValue) -> HeronResult<Value> {
        match self.rules.select(value, &self.config) {
            Strategy::Native => native_to_script(value),
            Strategy::EnumProxy => proxy::bind(runtime, value, ProxyMode::Enum),
            Strategy::TypeProxy => proxy::bind(runtime, value, ProxyMode::Type),
            Strategy::MapProxy => proxy::bind(runtime, value, ProxyMode::Map),
            Strategy::SetProxy => proxy::bind(runtime, value, ProxyMode::Set),
            Strategy::ArrayCopy => {
                let items = match value {
                    HostValue::List(items) => items.clone(),
                    HostValue::Set(set) => set.values(),
                    other => vec![other.clone()],
                };
                let converted = items
                    .iter()
                    .map(|item| self.to_script(runtime, item))
                    .collect::<HeronResult<Vec<_>>>()?;
                Ok(Value::array(converted))
            }
            Strategy::CallableProxy => match value {
                HostValue::Function(f) => match script_origin(runtime, f.backing()) {
                    Some(original) => Ok(original),
                    None => proxy::bind(runtime, value, ProxyMode::Function),
                },
                other => self.object_to_script(runtime, other),
            },
            Strategy::ObjectProxy => self.object_to_script(runtime, value),
        }
    }

    fn object_to_script(&self, runtime: &Runtime, value: &HostValue) -> HeronResult<Value> {
        if let Some(original) = script_origin(runtime, value.as_object()) {
            return Ok(original);
        }
        match value {
            HostValue::Function(_) => proxy::bind(runtime, value, ProxyMode::Function),
            HostValue::Type(_) => proxy::bind(runtime, value, ProxyMode::Type),
            HostValue::List(_) => Err(HeronError::conversion("object", "list")),
            other if other.as_object_ref().is_some() => proxy::bind(runtime, value, ProxyMode::Object),
            other => Err(HeronError::conversion("object proxy", other.kind_name())),
        }
    }

    /// Script → host for the requested target type
    pub fn to_host(&self, runtime: &Runtime, value: &Value, target: &ParamType) -> HeronResult<HostValue> {
        if let Some(host) = proxy::host_target(value) {
            return coerce::coerce_host(host, target)
                .map(|(converted, _)| converted)
                .ok_or_else(|| HeronError::conversion(target.describe(), host.kind_name()));
        }
        let mismatch = || HeronError::conversion(target.describe(), shape_of(value));
        if value.is_nullish() {
            return match target {
                ParamType::Any | ParamType::Void => Ok(HostValue::Null),
                t if t.is_nullable() => Ok(HostValue::Null),
                _ => Err(mismatch()),
            };
        }
        match target {
            ParamType::Void => Ok(HostValue::Null),
            ParamType::Any => self.structural(runtime, value),
            ParamType::Bool => value.as_bool().map(HostValue::Bool).ok_or_else(mismatch),
            ParamType::Int => match value {
                Value::Number(n) => integral(*n).map(HostValue::Int).ok_or_else(mismatch),
                Value::String(s) => coerce::coerce_host(&HostValue::from(s.as_ref()), target)
                    .map(|(v, _)| v)
                    .ok_or_else(mismatch),
                _ => Err(mismatch()),
            },
            ParamType::Double => match value {
                Value::Number(n) => Ok(HostValue::Double(*n)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(HostValue::Double)
                    .map_err(|_| mismatch()),
                _ => Err(mismatch()),
            },
            ParamType::String => match value {
                Value::String(s) => Ok(HostValue::String(s.to_string())),
                Value::Number(_) | Value::Boolean(_) => {
                    Ok(HostValue::String(runtime.vm().to_js_string(value)?))
                }
                _ => Err(mismatch()),
            },
            ParamType::Date => match value {
                Value::Number(ms) => Ok(HostValue::Date(system_time(*ms))),
                Value::Object(obj) => match obj.kind() {
                    ObjectKind::Date(ms) => Ok(HostValue::Date(system_time(*ms))),
                    _ => Err(mismatch()),
                },
                _ => Err(mismatch()),
            },
            ParamType::List => match value.as_object().and_then(ObjectRef::array_elements) {
                Some(items) => Ok(HostValue::List(self.convert_all(runtime, &items)?)),
                None => Err(mismatch()),
            },
            ParamType::Set => match value.as_object().and_then(ObjectRef::array_elements) {
                Some(items) => Ok(HostValue::Set(
                    self.convert_all(runtime, &items)?.into_iter().collect::<HostSet>(),
                )),
                None => Err(mismatch()),
            },
            ParamType::Map => match value.as_object() {
                Some(obj) if matches!(obj.kind(), ObjectKind::Ordinary) => {
                    Ok(HostValue::Map(self.snapshot(runtime, obj)?))
                }
                _ => Err(mismatch()),
            },
            ParamType::Type => Err(mismatch()),
            ParamType::Enum(ty) => value
                .as_str()
                .and_then(|name| ty.constant(name))
                .map(|c| HostValue::Enum(c.clone()))
                .ok_or_else(mismatch),
            ParamType::Object(ty) if ty.is_interface() => match value.as_object() {
                Some(obj) if obj.is_callable() || matches!(obj.kind(), ObjectKind::Ordinary) => {
                    ScriptBackedObject::bind(runtime, value, ty)
                }
                _ => Err(mismatch()),
            },
            ParamType::Object(_) => Err(mismatch()),
            ParamType::Function => {
                if value.is_callable() {
                    Ok(HostValue::Function(ScriptBackedObject::function(runtime, value)))
                } else {
                    Err(mismatch())
                }
            }
        }
    }

    /// Shape-driven conversion used for `ParamType::Any`
    fn structural(&self, runtime: &Runtime, value: &Value) -> HeronResult<HostValue> {
        Ok(match value {
            Value::Undefined | Value::Null => HostValue::Null,
            Value::Boolean(b) => HostValue::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 && !(*n == 0.0 && n.is_sign_negative()) {
                    HostValue::Int(*n as i64)
                } else {
                    HostValue::Double(*n)
                }
            }
            Value::String(s) => HostValue::String(s.to_string()),
            Value::Object(obj) => match obj.kind() {
                ObjectKind::Date(ms) => HostValue::Date(system_time(*ms)),
                ObjectKind::Array(_) => {
                    let items = obj.array_elements().unwrap_or_default();
                    HostValue::List(self.convert_all(runtime, &items)?)
                }
                ObjectKind::Function(_) => {
                    HostValue::Function(ScriptBackedObject::function(runtime, value))
                }
                ObjectKind::Proxy(_) if obj.is_callable() => {
                    HostValue::Function(ScriptBackedObject::function(runtime, value))
                }
                ObjectKind::Proxy(_) => return Err(HeronError::conversion("any", "proxy")),
                ObjectKind::Ordinary | ObjectKind::Error => HostValue::Map(self.snapshot(runtime, obj)?),
            },
        })
    }

    fn convert_all(&self, runtime: &Runtime, items: &[Value]) -> HeronResult<Vec<HostValue>> {
        items
            .iter()
            .map(|item| self.to_host(runtime, item, &ParamType::Any))
            .collect()
    }

    /// Copy the enumerable own properties of a plain object
    fn snapshot(&self, runtime: &Runtime, obj: &ObjectRef) -> HeronResult<HostMap> {
        let map = HostMap::new();
        for key in obj.own_enumerable_keys() {
            let value = obj.get_own(&key).unwrap_or_default();
            if value.is_undefined() {
                continue;
            }
            map.insert(key, self.to_host(runtime, &value, &ParamType::Any)?);
        }
        Ok(map)
    }
}

/// Original script value behind a script-backed host object of this runtime
fn script_origin(runtime: &Runtime, backing: Option<&crate::host::HostObjectRef>) -> Option<Value> {
    let backed = crate::host::downcast::<ScriptBackedObject>(backing?)?;
    if backed.runtime_id() != runtime.id() {
        return None;
    }
    backed.script_value()
}

fn native_to_script(value: &HostValue) -> HeronResult<Value> {
    Ok(match value {
        HostValue::Null => Value::Null,
        HostValue::Bool(b) => Value::Boolean(*b),
        HostValue::Int(n) => Value::Number(*n as f64),
        HostValue::Double(n) => Value::Number(*n),
        HostValue::String(s) => Value::from(s.as_str()),
        HostValue::Date(t) => Value::Object(ObjectRef::date(epoch_millis(*t))),
        other => return Err(HeronError::conversion("primitive", other.kind_name())),
    })
}

/// Shape name of a script value for error messages
pub(crate) fn shape_of(value: &Value) -> String {
    match value {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::Array(_) => "array".to_string(),
            ObjectKind::Function(_) => "function".to_string(),
            ObjectKind::Date(_) => "date".to_string(),
            ObjectKind::Error => "error".to_string(),
            ObjectKind::Proxy(proxy) => proxy.handler_raw().describe(),
            ObjectKind::Ordinary => "object".to_string(),
        },
        other => other.type_of().to_string(),
    }
}

pub(crate) fn epoch_millis(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_millis() as f64,
        Err(before) => -(before.duration().as_millis() as f64),
    }
}

pub(crate) fn system_time(ms: f64) -> SystemTime {
    let offset = Duration::from_millis(ms.abs() as u64);
    if ms >= 0.0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH - offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostType;

    fn locked() -> Runtime {
        let runtime = Runtime::new();
        runtime.acquire().unwrap();
        runtime
    }

    #[test]
    fn test_primitives_round_trip() {
        let runtime = locked();
        let converter = runtime.converter();
        for value in [
            HostValue::Null,
            HostValue::Bool(true),
            HostValue::Int(42),
            HostValue::Double(2.5),
            HostValue::from("text"),
        ] {
            let script = converter.to_script(&runtime, &value).unwrap();
            let back = converter.to_host(&runtime, &script, &ParamType::Any).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_dates_cross_as_vm_dates() {
        let runtime = locked();
        let converter = runtime.converter();
        let time = UNIX_EPOCH + Duration::from_millis(1_000);
        let script = converter.to_script(&runtime, &HostValue::Date(time)).unwrap();
        assert!(matches!(script.as_object().map(ObjectRef::kind), Some(ObjectKind::Date(_))));
        assert_eq!(
            converter.to_host(&runtime, &script, &ParamType::Date).unwrap(),
            HostValue::Date(time)
        );
    }

    #[test]
    fn test_structural_conversion() {
        let runtime = locked();
        let value = runtime
            .execute("({ name: 'heron', tags: ['a', 'b'], ratio: 0.5, skip: undefined })")
            .unwrap();
        let host = runtime.to_host(&value, &ParamType::Any).unwrap();
        let map = host.as_map().unwrap();
        assert_eq!(map.keys(), vec!["name", "tags", "ratio"]);
        assert_eq!(map.get("ratio"), Some(HostValue::Double(0.5)));
        assert_eq!(
            map.get("tags"),
            Some(HostValue::List(vec![HostValue::from("a"), HostValue::from("b")]))
        );
    }

    #[test]
    fn test_conversion_errors_name_both_sides() {
        let runtime = locked();
        let err = runtime.to_host(&Value::from("x"), &ParamType::Int).unwrap_err();
        match err {
            HeronError::Conversion { target, actual } => {
                assert_eq!(target, "int");
                assert_eq!(actual, "string");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(runtime.to_host(&Value::Null, &ParamType::Bool).is_err());
        let ty = HostType::class("Widget").build();
        assert!(matches!(
            runtime.to_host(&Value::from(1), &ParamType::Object(ty)),
            Err(HeronError::Conversion { .. })
        ));
    }

    #[test]
    fn test_leading_rules_apply_to_primitives() {
        let runtime = locked();
        let rules = ConversionRuleSet::default()
            .with_leading_rule("boxed ints", |v, _| matches!(v, HostValue::Int(_)), Strategy::ArrayCopy)
            .with_leading_rule("string objects", |v, _| matches!(v, HostValue::String(_)), Strategy::ObjectProxy);
        let converter = ValueConverter::with_rules(ConverterConfig::default(), rules);

        let boxed = converter.to_script(&runtime, &HostValue::Int(7)).unwrap();
        assert_eq!(boxed.as_object().and_then(ObjectRef::array_len), Some(1));
        assert!(matches!(
            converter.to_script(&runtime, &HostValue::from("x")),
            Err(HeronError::Conversion { .. })
        ));
        assert!(matches!(
            converter.to_script(&runtime, &HostValue::Double(1.5)),
            Ok(Value::Number(n)) if n == 1.5
        ));
    }

    #[test]
    fn test_numeric_strings_coerce() {
        let runtime = locked();
        assert_eq!(
            runtime.to_host(&Value::from("12"), &ParamType::Int).unwrap(),
            HostValue::Int(12)
        );
        assert_eq!(
            runtime.to_host(&Value::from(3), &ParamType::String).unwrap(),
            HostValue::from("3")
        );
    }
}
