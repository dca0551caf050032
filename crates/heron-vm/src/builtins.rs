//! Built-in globals and primitive methods
//!
//! Globals are installed once per VM (and again on reset). Methods of
//! primitives, arrays, dates and functions are resolved by name on property
//! access instead of living on prototype objects.

use crate::error::{VmError, VmResult};
use crate::function::{arg, native_function};
use crate::json;
use crate::object::{ObjectKind, ObjectRef};
use crate::value::{Value, format_number};
use crate::vm::Vm;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use std::sync::Arc;

/// Longest string, in bytes, a builtin will produce
const MAX_STRING_LENGTH: usize = 1 << 29;

/// Install the global bindings on `global`
pub(crate) fn install_globals(global: &ObjectRef) {
    global.define_hidden("JSON", json_object());
    global.define_hidden("Object", object_constructor());
    global.define_hidden("Array", array_constructor());
    global.define_hidden("Math", math_object());
    global.define_hidden("Date", date_constructor());
    for name in ["Error", "TypeError", "RangeError", "ReferenceError"] {
        global.define_hidden(name, error_constructor(name));
    }
    global.define_hidden(
        "String",
        native_function("String", |vm, _, args| match args.first() {
            Some(value) => Ok(Value::from(vm.to_js_string(value)?)),
            None => Ok(Value::from("")),
        }),
    );
    global.define_hidden(
        "Number",
        native_function("Number", |_, _, args| {
            Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
        }),
    );
    global.define_hidden(
        "Boolean",
        native_function("Boolean", |_, _, args| {
            Ok(Value::Boolean(arg(args, 0).truthy()))
        }),
    );
    global.define_hidden(
        "parseInt",
        native_function("parseInt", |vm, _, args| {
            let text = vm.to_js_string(&arg(args, 0))?;
            let radix = match arg(args, 1) {
                Value::Undefined => 0,
                other => other.to_number() as u32,
            };
            Ok(Value::Number(parse_int(&text, radix)))
        }),
    );
    global.define_hidden(
        "parseFloat",
        native_function("parseFloat", |vm, _, args| {
            let text = vm.to_js_string(&arg(args, 0))?;
            Ok(Value::Number(parse_float(&text)))
        }),
    );
    global.define_hidden(
        "isNaN",
        native_function("isNaN", |_, _, args| {
            Ok(Value::Boolean(arg(args, 0).to_number().is_nan()))
        }),
    );
    global.define_hidden("NaN", Value::Number(f64::NAN));
    global.define_hidden("Infinity", Value::Number(f64::INFINITY));
}

fn json_object() -> Value {
    let obj = ObjectRef::ordinary();
    obj.define_hidden(
        "stringify",
        native_function("stringify", |vm, _, args| {
            let indent = match arg(args, 2) {
                Value::Number(n) if n > 0.0 => n as usize,
                Value::String(s) => s.len(),
                _ => 0,
            };
            Ok(json::stringify(vm, &arg(args, 0), indent)?
                .map(Value::from)
                .unwrap_or_default())
        }),
    );
    obj.define_hidden(
        "parse",
        native_function("parse", |vm, _, args| {
            let text = vm.to_js_string(&arg(args, 0))?;
            json::parse(&text)
        }),
    );
    Value::Object(obj)
}

fn object_constructor() -> Value {
    let ctor = native_function("Object", |_, _, args| match arg(args, 0) {
        value @ Value::Object(_) => Ok(value),
        _ => Ok(Value::Object(ObjectRef::ordinary())),
    });
    let Value::Object(obj) = &ctor else {
        return ctor;
    };
    obj.define_hidden(
        "keys",
        native_function("keys", |vm, _, args| {
            let keys = enumerable_keys(vm, &arg(args, 0))?;
            Ok(Value::array(keys.into_iter().map(Value::from).collect()))
        }),
    );
    obj.define_hidden(
        "getOwnPropertyNames",
        native_function("getOwnPropertyNames", |vm, _, args| {
            let keys = vm.own_keys(&arg(args, 0))?;
            Ok(Value::array(keys.into_iter().map(Value::from).collect()))
        }),
    );
    obj.define_hidden(
        "entries",
        native_function("entries", |vm, _, args| {
            let target = arg(args, 0);
            let mut entries = Vec::new();
            for key in enumerable_keys(vm, &target)? {
                let value = vm.get_property(&target, &key)?;
                entries.push(Value::array(vec![Value::from(key), value]));
            }
            Ok(Value::array(entries))
        }),
    );
    obj.define_hidden(
        "assign",
        native_function("assign", |vm, _, args| {
            let target = arg(args, 0);
            for source in args.iter().skip(1) {
                if source.is_nullish() {
                    continue;
                }
                for key in enumerable_keys(vm, source)? {
                    let value = vm.get_property(source, &key)?;
                    vm.set_property(&target, &key, value)?;
                }
            }
            Ok(target)
        }),
    );
    ctor
}

/// Keys reported by `Object.keys`
fn enumerable_keys(vm: &Vm, value: &Value) -> VmResult<Vec<String>> {
    match value {
        Value::Object(obj) if obj.is_proxy() => vm.own_keys(value),
        Value::Object(obj) => match obj.array_len() {
            Some(len) => Ok((0..len).map(|i| i.to_string()).collect()),
            None => Ok(obj.own_enumerable_keys()),
        },
        Value::String(s) => Ok((0..s.chars().count()).map(|i| i.to_string()).collect()),
        Value::Undefined | Value::Null => Err(VmError::type_error(
            "Cannot convert undefined or null to object",
        )),
        _ => Ok(Vec::new()),
    }
}

fn array_constructor() -> Value {
    let ctor = native_function("Array", |vm, _, args| match args {
        [Value::Number(n)] => Ok(Value::array(vec![Value::Undefined; vm.array_length(*n)?])),
        _ => Ok(Value::array(args.to_vec())),
    });
    if let Value::Object(obj) = &ctor {
        obj.define_hidden(
            "isArray",
            native_function("isArray", |_, _, args| {
                Ok(Value::Boolean(
                    arg(args, 0).as_object().is_some_and(ObjectRef::is_array),
                ))
            }),
        );
        obj.define_hidden(
            "of",
            native_function("of", |_, _, args| Ok(Value::array(args.to_vec()))),
        );
    }
    ctor
}

fn math_object() -> Value {
    let obj = ObjectRef::ordinary();
    let unary: [(&str, fn(f64) -> f64); 6] = [
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("abs", f64::abs),
        ("sqrt", f64::sqrt),
        ("trunc", f64::trunc),
        ("round", |n| (n + 0.5).floor()),
    ];
    for (name, op) in unary {
        obj.define_hidden(
            name,
            native_function(name, move |_, _, args| {
                Ok(Value::Number(op(arg(args, 0).to_number())))
            }),
        );
    }
    obj.define_hidden(
        "max",
        native_function("max", |_, _, args| {
            Ok(Value::Number(args.iter().map(Value::to_number).fold(
                f64::NEG_INFINITY,
                |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) },
            )))
        }),
    );
    obj.define_hidden(
        "min",
        native_function("min", |_, _, args| {
            Ok(Value::Number(args.iter().map(Value::to_number).fold(
                f64::INFINITY,
                |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) },
            )))
        }),
    );
    obj.define_hidden("PI", Value::Number(std::f64::consts::PI));
    Value::Object(obj)
}

fn error_constructor(name: &'static str) -> Value {
    native_function(name, move |vm, _, args| {
        let message = match arg(args, 0) {
            Value::Undefined => String::new(),
            other => vm.to_js_string(&other)?,
        };
        Ok(Value::Object(ObjectRef::error(name, &message)))
    })
}

/// Current time in epoch milliseconds
pub fn now_ms() -> f64 {
    Utc::now().timestamp_millis() as f64
}

fn date_constructor() -> Value {
    let ctor = native_function("Date", |vm, _, args| {
        let ms = match args.first() {
            None => now_ms(),
            Some(Value::String(s)) => parse_iso(s).unwrap_or(f64::NAN),
            Some(Value::Object(obj)) if matches!(obj.kind(), ObjectKind::Date(_)) => {
                Value::Object(obj.clone()).to_number()
            }
            Some(other) => {
                let n = other.to_number();
                if n.is_nan() {
                    parse_iso(&vm.to_js_string(other)?).unwrap_or(f64::NAN)
                } else {
                    n
                }
            }
        };
        Ok(Value::Object(ObjectRef::date(time_clip(ms))))
    });
    if let Value::Object(obj) = &ctor {
        obj.define_hidden(
            "now",
            native_function("now", |_, _, _| Ok(Value::Number(now_ms().floor()))),
        );
    }
    ctor
}

fn time_clip(ms: f64) -> f64 {
    if !ms.is_finite() || ms.abs() > 8.64e15 {
        f64::NAN
    } else {
        ms.trunc()
    }
}

fn utc_datetime(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(ms as i64)
}

/// Format epoch milliseconds as `YYYY-MM-DDTHH:mm:ss.sssZ`
pub fn date_to_iso(ms: f64) -> Option<String> {
    utc_datetime(ms).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Parse an RFC 3339 timestamp, or `YYYY-MM[-DD]` with an optional
/// `THH:mm[:ss[.sss]]` part read as UTC
pub fn parse_iso(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis() as f64);
    }
    let local = text.strip_suffix('Z').unwrap_or(text);
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(local, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(local, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", local), "%Y-%m-%d"))
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Some(naive.and_utc().timestamp_millis() as f64)
}

fn parse_int(text: &str, radix: u32) -> f64 {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) if radix == 16 || radix == 0 => (16, hex),
        _ => (if radix == 0 { 10 } else { radix }, digits),
    };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let valid: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
    if valid.is_empty() {
        return f64::NAN;
    }
    let value = valid
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    if negative { -value } else { value }
}

fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .take_while(|(i, c)| {
            c.is_ascii_digit() || *c == '.' || ((*c == '-' || *c == '+') && *i == 0) || *c == 'e'
        })
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    let mut candidate = &text[..end];
    while !candidate.is_empty() {
        if let Ok(n) = candidate.parse::<f64>() {
            return n;
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    if text.starts_with("Infinity") {
        return f64::INFINITY;
    }
    f64::NAN
}

fn this_string(vm: &Vm, this: &Value) -> VmResult<String> {
    match this {
        Value::String(s) => Ok(s.to_string()),
        Value::Undefined | Value::Null => Err(VmError::type_error(
            "String.prototype method called on null or undefined",
        )),
        other => vm.to_js_string(other),
    }
}

fn search_string(vm: &Vm, args: &[Value]) -> VmResult<String> {
    vm.to_js_string(&arg(args, 0))
}

/// Clamp a relative index the way `slice` does
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        (n as usize).min(len)
    }
}

/// Method of a string primitive
pub(crate) fn string_method(name: &str) -> Option<Value> {
    let method = match name {
        "toString" | "valueOf" => native_function(name, |vm, this, _| {
            Ok(Value::from(this_string(vm, this)?))
        }),
        "toUpperCase" => native_function(name, |vm, this, _| {
            Ok(Value::from(this_string(vm, this)?.to_uppercase()))
        }),
        "toLowerCase" => native_function(name, |vm, this, _| {
            Ok(Value::from(this_string(vm, this)?.to_lowercase()))
        }),
        "trim" => native_function(name, |vm, this, _| {
            Ok(Value::from(this_string(vm, this)?.trim()))
        }),
        "includes" => native_function(name, |vm, this, args| {
            let s = this_string(vm, this)?;
            Ok(Value::Boolean(s.contains(&search_string(vm, args)?)))
        }),
        "startsWith" => native_function(name, |vm, this, args| {
            let s = this_string(vm, this)?;
            Ok(Value::Boolean(s.starts_with(&search_string(vm, args)?)))
        }),
        "endsWith" => native_function(name, |vm, this, args| {
            let s = this_string(vm, this)?;
            Ok(Value::Boolean(s.ends_with(&search_string(vm, args)?)))
        }),
        "indexOf" => native_function(name, |vm, this, args| {
            let s = this_string(vm, this)?;
            let needle = search_string(vm, args)?;
            Ok(Value::Number(match s.find(&needle) {
                Some(byte) => s[..byte].chars().count() as f64,
                None => -1.0,
            }))
        }),
        "charAt" => native_function(name, |vm, this, args| {
            let s = this_string(vm, this)?;
            let index = arg(args, 0).to_number();
            let index = if index.is_nan() { 0 } else { index as usize };
            Ok(Value::from(
                s.chars().nth(index).map(String::from).unwrap_or_default(),
            ))
        }),
        "slice" | "substring" => native_function(name, |vm, this, args| {
            let chars: Vec<char> = this_string(vm, this)?.chars().collect();
            let start = relative_index(&arg(args, 0), chars.len(), 0);
            let end = relative_index(&arg(args, 1), chars.len(), chars.len());
            Ok(Value::from(
                chars[start.min(end)..end.max(start)].iter().collect::<String>(),
            ))
        }),
        "split" => native_function(name, |vm, this, args| {
            let s = this_string(vm, this)?;
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => vec![Value::from(s)],
                separator => {
                    let separator = vm.to_js_string(&separator)?;
                    if separator.is_empty() {
                        s.chars().map(|c| Value::from(c.to_string())).collect()
                    } else {
                        s.split(separator.as_str()).map(Value::from).collect()
                    }
                }
            };
            Ok(Value::array(parts))
        }),
        "replace" => native_function(name, |vm, this, args| {
            let s = this_string(vm, this)?;
            let pattern = search_string(vm, args)?;
            let replacement = vm.to_js_string(&arg(args, 1))?;
            Ok(Value::from(s.replacen(&pattern, &replacement, 1)))
        }),
        "repeat" => native_function(name, |vm, this, args| {
            let count = arg(args, 0).to_number();
            if count < 0.0 || count.is_infinite() {
                return Err(VmError::range_error(format!(
                    "Invalid count value: {}",
                    format_number(count)
                )));
            }
            let count = if count.is_nan() { 0 } else { count as usize };
            let s = this_string(vm, this)?;
            if s.len().saturating_mul(count) > MAX_STRING_LENGTH {
                return Err(VmError::range_error("Invalid string length"));
            }
            Ok(Value::from(s.repeat(count)))
        }),
        "concat" => native_function(name, |vm, this, args| {
            let mut s = this_string(vm, this)?;
            for value in args {
                s.push_str(&vm.to_js_string(value)?);
            }
            Ok(Value::from(s))
        }),
        _ => return None,
    };
    Some(method)
}

fn this_array(this: &Value) -> VmResult<ObjectRef> {
    match this {
        Value::Object(obj) if obj.is_array() => Ok(obj.clone()),
        _ => Err(VmError::type_error(
            "Array.prototype method called on incompatible receiver",
        )),
    }
}

fn callback(args: &[Value], method: &str) -> VmResult<Value> {
    let func = arg(args, 0);
    if func.is_callable() {
        Ok(func)
    } else {
        Err(VmError::type_error(format!(
            "Array.prototype.{} callback is not a function",
            method
        )))
    }
}

fn join(vm: &Vm, items: &[Value], separator: &str) -> VmResult<String> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(if item.is_nullish() {
            String::new()
        } else {
            vm.to_js_string(item)?
        });
    }
    Ok(parts.join(separator))
}

/// Method of an array object
pub(crate) fn array_method(name: &str) -> Option<Value> {
    let method = match name {
        "join" => native_function(name, |vm, this, args| {
            let items = this_array(this)?.array_elements().unwrap_or_default();
            let separator = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other => vm.to_js_string(&other)?,
            };
            Ok(Value::from(join(vm, &items, &separator)?))
        }),
        "toString" => native_function(name, |vm, this, _| {
            let items = this_array(this)?.array_elements().unwrap_or_default();
            Ok(Value::from(join(vm, &items, ",")?))
        }),
        "push" => native_function(name, |_, this, args| {
            let len = this_array(this)?.array_push(args.iter().cloned());
            Ok(Value::from(len.unwrap_or(0)))
        }),
        "pop" => native_function(name, |_, this, _| {
            let arr = this_array(this)?;
            let len = arr.array_len().unwrap_or(0);
            if len == 0 {
                return Ok(Value::Undefined);
            }
            let last = arr.array_get(len - 1).unwrap_or_default();
            arr.array_set_len(len - 1);
            Ok(last)
        }),
        "includes" => native_function(name, |_, this, args| {
            let needle = arg(args, 0);
            let items = this_array(this)?.array_elements().unwrap_or_default();
            Ok(Value::Boolean(items.iter().any(|item| {
                item.strict_equals(&needle)
                    || (item.as_number().is_some_and(f64::is_nan)
                        && needle.as_number().is_some_and(f64::is_nan))
            })))
        }),
        "indexOf" => native_function(name, |_, this, args| {
            let needle = arg(args, 0);
            let items = this_array(this)?.array_elements().unwrap_or_default();
            Ok(Value::Number(
                items
                    .iter()
                    .position(|item| item.strict_equals(&needle))
                    .map_or(-1.0, |i| i as f64),
            ))
        }),
        "slice" => native_function(name, |_, this, args| {
            let items = this_array(this)?.array_elements().unwrap_or_default();
            let start = relative_index(&arg(args, 0), items.len(), 0);
            let end = relative_index(&arg(args, 1), items.len(), items.len());
            Ok(Value::array(
                items.get(start..end.max(start)).unwrap_or_default().to_vec(),
            ))
        }),
        "concat" => native_function(name, |_, this, args| {
            let mut items = this_array(this)?.array_elements().unwrap_or_default();
            for value in args {
                match value.as_object().and_then(ObjectRef::array_elements) {
                    Some(more) => items.extend(more),
                    None => items.push(value.clone()),
                }
            }
            Ok(Value::array(items))
        }),
        "reverse" => native_function(name, |_, this, _| {
            let arr = this_array(this)?;
            let mut items = arr.array_elements().unwrap_or_default();
            items.reverse();
            for (index, item) in items.into_iter().enumerate() {
                arr.array_set(index, item);
            }
            Ok(this.clone())
        }),
        "forEach" => native_function(name, |vm, this, args| {
            let func = callback(args, "forEach")?;
            for (index, item) in this_array(this)?.array_elements().unwrap_or_default().into_iter().enumerate() {
                vm.call(&func, &Value::Undefined, &[item, Value::from(index), this.clone()])?;
            }
            Ok(Value::Undefined)
        }),
        "map" => native_function(name, |vm, this, args| {
            let func = callback(args, "map")?;
            let items = this_array(this)?.array_elements().unwrap_or_default();
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                out.push(vm.call(&func, &Value::Undefined, &[item, Value::from(index), this.clone()])?);
            }
            Ok(Value::array(out))
        }),
        "filter" => native_function(name, |vm, this, args| {
            let func = callback(args, "filter")?;
            let mut out = Vec::new();
            for (index, item) in this_array(this)?.array_elements().unwrap_or_default().into_iter().enumerate() {
                if vm
                    .call(&func, &Value::Undefined, &[item.clone(), Value::from(index), this.clone()])?
                    .truthy()
                {
                    out.push(item);
                }
            }
            Ok(Value::array(out))
        }),
        "find" => native_function(name, |vm, this, args| {
            let func = callback(args, "find")?;
            for (index, item) in this_array(this)?.array_elements().unwrap_or_default().into_iter().enumerate() {
                if vm
                    .call(&func, &Value::Undefined, &[item.clone(), Value::from(index), this.clone()])?
                    .truthy()
                {
                    return Ok(item);
                }
            }
            Ok(Value::Undefined)
        }),
        "some" | "every" => {
            let every = name == "every";
            native_function(name, move |vm, this, args| {
                let func = callback(args, if every { "every" } else { "some" })?;
                for (index, item) in this_array(this)?.array_elements().unwrap_or_default().into_iter().enumerate() {
                    let hit = vm
                        .call(&func, &Value::Undefined, &[item, Value::from(index), this.clone()])?
                        .truthy();
                    if hit != every {
                        return Ok(Value::Boolean(!every));
                    }
                }
                Ok(Value::Boolean(every))
            })
        }
        "reduce" => native_function(name, |vm, this, args| {
            let func = callback(args, "reduce")?;
            let mut items = this_array(this)?.array_elements().unwrap_or_default().into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match items.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(VmError::type_error(
                            "Reduce of empty array with no initial value",
                        ));
                    }
                },
            };
            for (index, item) in items {
                acc = vm.call(&func, &Value::Undefined, &[acc, item, Value::from(index), this.clone()])?;
            }
            Ok(acc)
        }),
        _ => return None,
    };
    Some(method)
}

fn this_date(this: &Value) -> VmResult<f64> {
    match this.as_object().map(ObjectRef::kind) {
        Some(ObjectKind::Date(ms)) => Ok(*ms),
        _ => Err(VmError::type_error("this is not a Date object.")),
    }
}

/// Method of a date object
pub(crate) fn date_method(name: &str) -> Option<Value> {
    let method = match name {
        "getTime" | "valueOf" => {
            native_function(name, |_, this, _| Ok(Value::Number(this_date(this)?)))
        }
        "toISOString" => native_function(name, |_, this, _| {
            date_to_iso(this_date(this)?)
                .map(Value::from)
                .ok_or_else(|| VmError::range_error("Invalid time value"))
        }),
        "toString" | "toJSON" => native_function(name, |_, this, _| {
            Ok(Value::from(
                date_to_iso(this_date(this)?).unwrap_or_else(|| "Invalid Date".to_string()),
            ))
        }),
        "getFullYear" => native_function(name, |_, this, _| {
            let year = utc_datetime(this_date(this)?).map_or(f64::NAN, |dt| f64::from(dt.year()));
            Ok(Value::Number(year))
        }),
        _ => return None,
    };
    Some(method)
}

/// Method of a function object
pub(crate) fn function_method(name: &str) -> Option<Value> {
    let method = match name {
        "call" => native_function(name, |vm, this, args| {
            vm.call(this, &arg(args, 0), args.get(1..).unwrap_or_default())
        }),
        "apply" => native_function(name, |vm, this, args| {
            let list = arg(args, 1)
                .as_object()
                .and_then(ObjectRef::array_elements)
                .unwrap_or_default();
            vm.call(this, &arg(args, 0), &list)
        }),
        "toString" => native_function(name, |vm, this, _| {
            Ok(Value::from(vm.to_js_string(this)?))
        }),
        _ => return None,
    };
    Some(method)
}

/// Method shared by ordinary objects
pub(crate) fn object_method(name: &str) -> Option<Value> {
    let method = match name {
        "hasOwnProperty" => native_function(name, |vm, this, args| {
            let key = vm.to_js_string(&arg(args, 0))?;
            Ok(Value::Boolean(match this {
                Value::Object(obj) if obj.is_proxy() => vm.has_property(this, &key)?,
                Value::Object(obj) => obj.has_own(&key),
                _ => false,
            }))
        }),
        "toString" => native_function(name, |vm, this, _| match this.as_object().map(ObjectRef::kind) {
            Some(ObjectKind::Error) => Ok(Value::from(vm.to_js_string(this)?)),
            _ => Ok(Value::from("[object Object]")),
        }),
        _ => return None,
    };
    Some(method)
}

/// Method of a number or boolean primitive
pub(crate) fn primitive_method(value: &Value, name: &str) -> Option<Value> {
    let method = match (value, name) {
        (_, "toString") => native_function(name, |vm, this, args| match (this, arg(args, 0)) {
            (Value::Number(n), Value::Number(radix)) if radix != 10.0 => {
                Ok(Value::from(to_radix(*n, radix as u32)?))
            }
            _ => Ok(Value::from(vm.to_js_string(this)?)),
        }),
        (_, "valueOf") => native_function(name, |_, this, _| Ok(this.clone())),
        (Value::Number(_), "toFixed") => native_function(name, |_, this, args| {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits as usize };
            if digits > 100 {
                return Err(VmError::range_error("toFixed() digits argument must be between 0 and 100"));
            }
            Ok(Value::from(format!("{:.*}", digits, this.to_number())))
        }),
        _ => return None,
    };
    Some(method)
}

fn to_radix(n: f64, radix: u32) -> VmResult<String> {
    if !(2..=36).contains(&radix) {
        return Err(VmError::range_error("toString() radix must be between 2 and 36"));
    }
    if n.fract() != 0.0 || !n.is_finite() {
        return Ok(format_number(n));
    }
    let negative = n < 0.0;
    let mut value = n.abs() as u64;
    let mut digits = Vec::new();
    loop {
        let digit = (value % u64::from(radix)) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        value /= u64::from(radix);
        if value == 0 {
            break;
        }
    }
    if negative {
        digits.push('-');
    }
    Ok(digits.into_iter().rev().collect())
}

/// Character at `index` of a string, as a one-character string
pub(crate) fn string_index(s: &Arc<str>, key: &str) -> Option<Value> {
    let index: usize = key.parse().ok()?;
    if index.to_string() != key {
        return None;
    }
    s.chars().nth(index).map(|c| Value::from(c.to_string()))
}
