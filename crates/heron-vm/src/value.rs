//! Script values
//!
//! `Value` is the unit every VM operation consumes and produces. Primitives are
//! stored inline; everything else is an [`ObjectRef`] whose equality is
//! reference identity, matching `===` on objects.

use crate::object::{ObjectKind, ObjectRef};
use std::fmt;
use std::sync::Arc;

/// A script value
#[derive(Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean primitive
    Boolean(bool),
    /// Number primitive (IEEE-754 double)
    Number(f64),
    /// String primitive
    String(Arc<str>),
    /// Any object: ordinary, array, function, proxy, date or error
    Object(ObjectRef),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::String(s.into())
    }

    /// Create a number value
    pub fn number(n: f64) -> Self {
        Self::Number(n)
    }

    /// Create an array value from its elements
    pub fn array(items: Vec<Value>) -> Self {
        Self::Object(ObjectRef::array(items))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// `null` or `undefined`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Whether the value can be called
    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(ObjectRef::is_callable)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// ECMAScript ToBoolean
    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) => true,
        }
    }

    /// Result of the `typeof` operator
    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "object",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Object(obj) if obj.is_callable() => "function",
            Self::Object(_) => "object",
        }
    }

    /// ECMAScript ToNumber for primitives. Objects yield NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            Self::Object(obj) => match obj.kind() {
                ObjectKind::Date(ms) => *ms,
                _ => f64::NAN,
            },
        }
    }

    /// Strict equality (`===`)
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }

    /// Loose equality (`==`)
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined | Self::Null, Self::Undefined | Self::Null) => true,
            (Self::Undefined | Self::Null, _) | (_, Self::Undefined | Self::Null) => false,
            (Self::Number(_), Self::String(_))
            | (Self::String(_), Self::Number(_))
            | (Self::Boolean(_), _)
            | (_, Self::Boolean(_)) => {
                if self.is_object() || other.is_object() {
                    return false;
                }
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Object(obj) => write!(f, "{:?}", obj),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Self::Object(obj)
    }
}

/// Format a number the way ECMAScript Number::toString does
///
/// `ryu` supplies the shortest round-tripping digits; the layout (plain,
/// fractional or exponent form) follows the ECMAScript thresholds.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let mut buffer = ryu::Buffer::new();
    let (digits, point) = decimal_digits(buffer.format_finite(n.abs()));
    let k = digits.len() as i32;
    let sign = if n < 0.0 { "-" } else { "" };

    let body = if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{}.{}", int, frac)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let exponent = point - 1;
        let exp_sign = if exponent < 0 { "-" } else { "+" };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", first, exp_sign, exponent.abs())
        } else {
            format!("{}.{}e{}{}", first, rest, exp_sign, exponent.abs())
        }
    };
    format!("{}{}", sign, body)
}

/// Significant digits of a positive `ryu` rendering and the position of the
/// decimal point relative to them (value = 0.digits × 10^point)
fn decimal_digits(formatted: &str) -> (String, i32) {
    let (mantissa, exponent) = match formatted.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (formatted, 0),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all = format!("{}{}", int, frac);
    let leading = all.len() - all.trim_start_matches('0').len();
    let digits = all.trim_start_matches('0').trim_end_matches('0').to_string();
    let point = int.len() as i32 + exponent - leading as i32;
    (digits, point)
}

/// ECMAScript StringToNumber (decimal and hex forms)
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(-1.5e-10), "-1.5e-10");
        assert_eq!(format_number(123.456), "123.456");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(9007199254740993.0), "9007199254740992");
    }

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(" 42 "), 42.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert_eq!(string_to_number(""), 0.0);
        assert!(string_to_number("abc").is_nan());
    }

    #[test]
    fn test_equality() {
        assert!(Value::from(1).strict_equals(&Value::from(1.0)));
        assert!(!Value::from("1").strict_equals(&Value::from(1)));
        assert!(Value::from("1").loose_equals(&Value::from(1)));
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));

        let a = ObjectRef::ordinary();
        let b = ObjectRef::ordinary();
        assert!(Value::from(a.clone()).strict_equals(&Value::from(a)));
        assert!(!Value::from(b.clone()).strict_equals(&Value::from(ObjectRef::ordinary())));
    }

    #[test]
    fn test_truthy_and_typeof() {
        assert!(!Value::from("").truthy());
        assert!(Value::from("a").truthy());
        assert!(!Value::from(f64::NAN).truthy());
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::array(vec![]).type_of(), "object");
    }
}
