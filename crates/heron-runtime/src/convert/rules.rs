//! Host→script conversion rules
//!
//! An ordered list of (shape predicate, strategy) pairs. The first matching
//! rule decides how a host value is exposed to script. Enum and type-token
//! rules sit ahead of the generic object fallback.

use crate::config::ConverterConfig;
use crate::host::HostValue;
use std::fmt;

/// How a host value is represented in script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Null, booleans, numbers, strings and dates become VM primitives
    Native,
    /// Identity-preserving, immutable enum constant proxy
    EnumProxy,
    /// Constructible type token proxy
    TypeProxy,
    /// Map-semantics proxy
    MapProxy,
    /// Set-semantics proxy
    SetProxy,
    /// Element-wise copy into a script array
    ArrayCopy,
    /// Callable proxy
    CallableProxy,
    /// Reflective object proxy
    ObjectProxy,
}

/// Shape predicate of a rule
pub type ShapePredicate = fn(&HostValue, &ConverterConfig) -> bool;

/// One conversion rule. Immutable once registered.
#[derive(Clone)]
pub struct ConversionRule {
    pub name: &'static str,
    pub matches: ShapePredicate,
    pub strategy: Strategy,
}

impl fmt::Debug for ConversionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {:?}", self.name, self.strategy)
    }
}

/// Ordered rule registry
#[derive(Debug, Clone)]
pub struct ConversionRuleSet {
    rules: Vec<ConversionRule>,
}

impl ConversionRuleSet {
    /// An empty set: everything falls back to the object proxy
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule after the existing ones
    pub fn with_rule(mut self, name: &'static str, matches: ShapePredicate, strategy: Strategy) -> Self {
        self.rules.push(ConversionRule {
            name,
            matches,
            strategy,
        });
        self
    }

    /// Insert a rule ahead of every existing rule
    ///
    /// Primitives have no host identity, so a proxy strategy chosen for one
    /// fails with `Conversion` instead of falling back to a native value.
    pub fn with_leading_rule(
        mut self,
        name: &'static str,
        matches: ShapePredicate,
        strategy: Strategy,
    ) -> Self {
        self.rules.insert(
            0,
            ConversionRule {
                name,
                matches,
                strategy,
            },
        );
        self
    }

    pub fn rules(&self) -> &[ConversionRule] {
        &self.rules
    }

    /// Strategy of the first matching rule, or the object proxy fallback
    pub fn select(&self, value: &HostValue, config: &ConverterConfig) -> Strategy {
        self.rules
            .iter()
            .find(|rule| (rule.matches)(value, config))
            .map(|rule| rule.strategy)
            .unwrap_or(Strategy::ObjectProxy)
    }
}

impl Default for ConversionRuleSet {
    fn default() -> Self {
        Self::empty()
            .with_rule(
                "primitive",
                |v, _| {
                    matches!(
                        v,
                        HostValue::Null
                            | HostValue::Bool(_)
                            | HostValue::Int(_)
                            | HostValue::Double(_)
                            | HostValue::String(_)
                            | HostValue::Date(_)
                    )
                },
                Strategy::Native,
            )
            .with_rule("enum", |v, _| matches!(v, HostValue::Enum(_)), Strategy::EnumProxy)
            .with_rule("type", |v, _| matches!(v, HostValue::Type(_)), Strategy::TypeProxy)
            .with_rule(
                "map",
                |v, config| matches!(v, HostValue::Map(_)) && config.is_proxy_map_enabled(),
                Strategy::MapProxy,
            )
            .with_rule(
                "set",
                |v, config| matches!(v, HostValue::Set(_)) && config.is_proxy_set_enabled(),
                Strategy::SetProxy,
            )
            .with_rule("list", |v, _| matches!(v, HostValue::List(_)), Strategy::ArrayCopy)
            .with_rule(
                "callable",
                |v, _| matches!(v, HostValue::Function(_)),
                Strategy::CallableProxy,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostFunction, HostMap, HostSet, HostType};

    #[test]
    fn test_default_rule_order() {
        let rules = ConversionRuleSet::default();
        let config = ConverterConfig::default();
        let color = HostType::enumeration("Color").constant("Red").build();
        let red = HostValue::Enum(color.constant("Red").unwrap().clone());

        assert_eq!(rules.select(&HostValue::Int(1), &config), Strategy::Native);
        assert_eq!(rules.select(&red, &config), Strategy::EnumProxy);
        assert_eq!(rules.select(&HostValue::Type(color), &config), Strategy::TypeProxy);
        assert_eq!(rules.select(&HostValue::List(vec![]), &config), Strategy::ArrayCopy);
        let f = HostValue::Function(HostFunction::new("f", |_| Ok(HostValue::Null)));
        assert_eq!(rules.select(&f, &config), Strategy::CallableProxy);
    }

    #[test]
    fn test_collection_modes_follow_live_config() {
        let rules = ConversionRuleSet::default();
        let config = ConverterConfig::default();
        let map = HostValue::Map(HostMap::new());
        let set = HostValue::Set(HostSet::new());
        assert_eq!(rules.select(&map, &config), Strategy::ObjectProxy);
        assert_eq!(rules.select(&set, &config), Strategy::ObjectProxy);
        config.set_proxy_map_enabled(true);
        config.set_proxy_set_enabled(true);
        assert_eq!(rules.select(&map, &config), Strategy::MapProxy);
        assert_eq!(rules.select(&set, &config), Strategy::SetProxy);
    }

    #[test]
    fn test_leading_rule_takes_priority() {
        let rules = ConversionRuleSet::default().with_leading_rule(
            "strings-as-objects",
            |v, _| matches!(v, HostValue::String(_)),
            Strategy::ObjectProxy,
        );
        let config = ConverterConfig::default();
        assert_eq!(rules.select(&HostValue::from("x"), &config), Strategy::ObjectProxy);
        assert_eq!(rules.rules()[0].name, "strings-as-objects");
    }
}
