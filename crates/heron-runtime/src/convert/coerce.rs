//! Argument coercion and overload resolution
//!
//! Candidates are scored per argument: an exact match costs 0, a coercion
//! costs 1, a mismatch disqualifies the candidate. The cheapest candidate wins;
//! fixed-arity candidates beat variadic ones, then declaration order breaks
//! ties.

use crate::error::{HeronError, HeronResult};
use crate::host::{HostValue, MethodDescriptor, ParamType, integral};
use crate::proxy;
use heron_vm::{ObjectKind, Value};

const EXACT: u32 = 0;
const COERCED: u32 = 1;

/// Pick the best overload for `args`
pub fn select<'a, A>(
    candidates: &[&'a MethodDescriptor],
    args: &[A],
    cost: impl Fn(&A, &ParamType) -> Option<u32>,
) -> Option<&'a MethodDescriptor> {
    let mut best: Option<(bool, u32, &'a MethodDescriptor)> = None;
    for candidate in candidates {
        if !candidate.accepts_arity(args.len()) {
            continue;
        }
        let Some(total) = score(candidate, args, &cost) else {
            continue;
        };
        let key = (candidate.variadic().is_some(), total);
        if best.is_none_or(|(variadic, cost, _)| key < (variadic, cost)) {
            best = Some((key.0, key.1, candidate));
        }
    }
    best.map(|(_, _, descriptor)| descriptor)
}

fn score<A>(
    candidate: &MethodDescriptor,
    args: &[A],
    cost: &impl Fn(&A, &ParamType) -> Option<u32>,
) -> Option<u32> {
    let fixed = candidate.params().len();
    let mut total = 0;
    for (arg, param) in args.iter().zip(candidate.params()) {
        total += cost(arg, param)?;
    }
    if let Some(variadic) = candidate.variadic() {
        for arg in &args[fixed..] {
            total += cost(arg, variadic)?;
        }
    }
    Some(total)
}

/// Convert arguments for the chosen overload, packing the variadic tail into a list
pub fn pack<A>(
    descriptor: &MethodDescriptor,
    args: &[A],
    mut convert: impl FnMut(&A, &ParamType) -> HeronResult<HostValue>,
) -> HeronResult<Vec<HostValue>> {
    let fixed = descriptor.params().len();
    let mut packed = Vec::with_capacity(fixed + 1);
    for (arg, param) in args.iter().zip(descriptor.params()) {
        packed.push(convert(arg, param)?);
    }
    if let Some(variadic) = descriptor.variadic() {
        let tail = args
            .get(fixed..)
            .unwrap_or_default()
            .iter()
            .map(|arg| convert(arg, variadic))
            .collect::<HeronResult<Vec<_>>>()?;
        packed.push(HostValue::List(tail));
    }
    Ok(packed)
}

/// Resolve and coerce a host-side call
pub fn resolve_host<'a>(
    candidates: &[&'a MethodDescriptor],
    args: &[HostValue],
) -> Option<(&'a MethodDescriptor, Vec<HostValue>)> {
    let descriptor = select(candidates, args, |arg, param| {
        coerce_host(arg, param).map(|(_, cost)| cost)
    })?;
    let packed = pack(descriptor, args, |arg, param| {
        coerce_host(arg, param)
            .map(|(value, _)| value)
            .ok_or_else(|| HeronError::conversion(param.describe(), arg.kind_name()))
    })
    .ok()?;
    Some((descriptor, packed))
}

fn parse_integral(s: &str) -> Option<i64> {
    integral(s.trim().parse::<f64>().ok()?)
}

/// Coerce a host value to a parameter type
pub fn coerce_host(value: &HostValue, param: &ParamType) -> Option<(HostValue, u32)> {
    if value.is_null() {
        return match param {
            ParamType::Any => Some((HostValue::Null, EXACT)),
            p if p.is_nullable() => Some((HostValue::Null, COERCED)),
            _ => None,
        };
    }
    let exact = |v: &HostValue| Some((v.clone(), EXACT));
    match (param, value) {
        (ParamType::Any | ParamType::Void, _) => exact(value),
        (ParamType::Bool, HostValue::Bool(_)) => exact(value),
        (ParamType::Int, HostValue::Int(_)) => exact(value),
        (ParamType::Int, HostValue::Double(n)) => integral(*n).map(|n| (HostValue::Int(n), COERCED)),
        (ParamType::Int, HostValue::String(s)) => {
            parse_integral(s).map(|n| (HostValue::Int(n), COERCED))
        }
        (ParamType::Double, HostValue::Double(_)) => exact(value),
        (ParamType::Double, HostValue::Int(n)) => Some((HostValue::Double(*n as f64), COERCED)),
        (ParamType::Double, HostValue::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .map(|n| (HostValue::Double(n), COERCED)),
        (ParamType::String, HostValue::String(_)) => exact(value),
        (ParamType::String, HostValue::Int(n)) => Some((HostValue::String(n.to_string()), COERCED)),
        (ParamType::String, HostValue::Double(n)) => Some((
            HostValue::String(heron_vm::value::format_number(*n)),
            COERCED,
        )),
        (ParamType::String, HostValue::Bool(b)) => Some((HostValue::String(b.to_string()), COERCED)),
        (ParamType::String, HostValue::Enum(c)) => {
            Some((HostValue::String(c.name().to_string()), COERCED))
        }
        (ParamType::Date, HostValue::Date(_)) => exact(value),
        (ParamType::List, HostValue::List(_)) => exact(value),
        (ParamType::List, HostValue::Set(set)) => Some((HostValue::List(set.values()), COERCED)),
        (ParamType::Map, HostValue::Map(_)) => exact(value),
        (ParamType::Set, HostValue::Set(_)) => exact(value),
        (ParamType::Type, HostValue::Type(_)) => exact(value),
        (ParamType::Enum(ty), HostValue::Enum(c)) if c.is_instance_of(ty) => exact(value),
        (ParamType::Enum(ty), HostValue::String(s)) => ty
            .constant(s)
            .map(|c| (HostValue::Enum(c.clone()), COERCED)),
        (ParamType::Function, HostValue::Function(_)) => exact(value),
        (ParamType::Object(ty), _) => value
            .host_type()
            .filter(|actual| ty.is_assignable_from(actual))
            .map(|_| (value.clone(), EXACT)),
        _ => None,
    }
}

/// Cost of converting a script value to a parameter type, without converting it
pub fn match_cost(value: &Value, param: &ParamType) -> Option<u32> {
    if let Some(host) = proxy::host_target(value) {
        return coerce_host(host, param).map(|(_, cost)| cost);
    }
    match (param, value) {
        (ParamType::Any | ParamType::Void, _) => Some(EXACT),
        (p, Value::Undefined | Value::Null) => p.is_nullable().then_some(COERCED),
        (ParamType::Bool, Value::Boolean(_)) => Some(EXACT),
        (ParamType::Int, Value::Number(n)) => integral(*n).map(|_| EXACT),
        (ParamType::Int, Value::String(s)) => parse_integral(s).map(|_| COERCED),
        (ParamType::Double, Value::Number(_)) => Some(EXACT),
        (ParamType::Double, Value::String(s)) => s.trim().parse::<f64>().ok().map(|_| COERCED),
        (ParamType::String, Value::String(_)) => Some(EXACT),
        (ParamType::String, Value::Number(_) | Value::Boolean(_)) => Some(COERCED),
        (ParamType::Enum(ty), Value::String(s)) => ty.constant(s).map(|_| COERCED),
        (_, Value::Object(obj)) => match (param, obj.kind()) {
            (ParamType::Date, ObjectKind::Date(_)) => Some(EXACT),
            (ParamType::List, ObjectKind::Array(_)) => Some(EXACT),
            (ParamType::Set, ObjectKind::Array(_)) => Some(COERCED),
            (ParamType::Map, ObjectKind::Ordinary) => Some(COERCED),
            (ParamType::Function, _) if obj.is_callable() => Some(EXACT),
            (ParamType::Object(ty), ObjectKind::Ordinary) if ty.is_interface() => Some(COERCED),
            (ParamType::Object(ty), _) if ty.is_interface() && obj.is_callable() => Some(COERCED),
            _ => None,
        },
        (ParamType::Date, Value::Number(_)) => Some(COERCED),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostType;

    fn echo_type() -> HostType {
        HostType::class("Echo")
            .method("echo", vec![ParamType::String], ParamType::String, |_, args| {
                Ok(args[0].clone())
            })
            .method_variadic(
                "echo",
                vec![],
                Some(ParamType::String),
                ParamType::List,
                |_, args| Ok(args[0].clone()),
            )
            .build()
    }

    #[test]
    fn test_fixed_arity_beats_variadic() {
        let ty = echo_type();
        let candidates: Vec<_> = ty.dispatch().methods("echo").iter().collect();
        let (chosen, packed) = resolve_host(&candidates, &[HostValue::from("abc")]).unwrap();
        assert!(chosen.variadic().is_none());
        assert_eq!(packed, vec![HostValue::from("abc")]);

        let (chosen, packed) =
            resolve_host(&candidates, &[HostValue::from("a"), HostValue::from("b")]).unwrap();
        assert!(chosen.variadic().is_some());
        assert_eq!(
            packed,
            vec![HostValue::List(vec![HostValue::from("a"), HostValue::from("b")])]
        );
    }

    #[test]
    fn test_exact_match_beats_coercion() {
        let ty = HostType::class("Num")
            .method("f", vec![ParamType::String], ParamType::String, |_, _| {
                Ok(HostValue::from("string"))
            })
            .method("f", vec![ParamType::Int], ParamType::String, |_, _| {
                Ok(HostValue::from("int"))
            })
            .build();
        let candidates: Vec<_> = ty.dispatch().methods("f").iter().collect();
        let pick = |value: Value| {
            select(&candidates, &[value], match_cost)
                .map(|m| m.params()[0].describe())
        };
        assert_eq!(pick(Value::from(1)).as_deref(), Some("int"));
        assert_eq!(pick(Value::from("1")).as_deref(), Some("string"));
        assert_eq!(pick(Value::from(1.5)).as_deref(), Some("string"));
        assert_eq!(pick(Value::Undefined).as_deref(), Some("string"));
    }

    #[test]
    fn test_coerce_host_table() {
        let int = coerce_host(&HostValue::from("42"), &ParamType::Int);
        assert_eq!(int.map(|(v, c)| (v, c)), Some((HostValue::Int(42), COERCED)));
        assert!(coerce_host(&HostValue::from("4.2"), &ParamType::Int).is_none());
        assert!(coerce_host(&HostValue::from("1e300"), &ParamType::Int).is_none());
        assert!(coerce_host(&HostValue::Double(1e300), &ParamType::Int).is_none());
        assert!(match_cost(&Value::from(1e19), &ParamType::Int).is_none());
        assert!(coerce_host(&HostValue::Int(1), &ParamType::Bool).is_none());
        assert!(coerce_host(&HostValue::Null, &ParamType::Int).is_none());
        assert_eq!(
            coerce_host(&HostValue::Null, &ParamType::String).map(|(_, c)| c),
            Some(COERCED)
        );
        let color = HostType::enumeration("Color").constant("Red").build();
        let red = coerce_host(&HostValue::from("Red"), &ParamType::Enum(color.clone()));
        assert!(matches!(red, Some((HostValue::Enum(_), COERCED))));
        assert!(coerce_host(&HostValue::from("Blue"), &ParamType::Enum(color)).is_none());
    }
}
