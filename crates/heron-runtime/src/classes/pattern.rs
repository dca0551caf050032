//! `Pattern` and `Matcher` over the `regex` crate

use super::{receiver, string_arg};
use crate::error::{HeronError, HeronResult};
use crate::host::{HostObject, HostType, HostValue, ParamType};
use parking_lot::Mutex;
use regex::Regex;
use std::sync::OnceLock;

/// A compiled regular expression
#[derive(Debug, Clone)]
pub struct PatternObject {
    source: String,
    regex: Regex,
    /// Anchored form used by `Matcher.matches()`
    full: Regex,
}

impl PatternObject {
    pub fn compile(source: &str) -> HeronResult<Self> {
        let invalid = |e: regex::Error| HeronError::host(format!("invalid pattern '{source}': {e}"));
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source).map_err(invalid)?,
            full: Regex::new(&format!("^(?:{source})$")).map_err(invalid)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matcher(&self, input: impl Into<String>) -> MatcherObject {
        MatcherObject {
            pattern: self.clone(),
            input: input.into(),
            state: Mutex::new(MatchState::default()),
        }
    }

    /// Split around matches, dropping trailing empty strings
    pub fn split(&self, input: &str) -> Vec<String> {
        let mut parts: Vec<String> = self.regex.split(input).map(str::to_string).collect();
        while parts.last().is_some_and(String::is_empty) && parts.len() > 1 {
            parts.pop();
        }
        parts
    }
}

#[derive(Debug, Default)]
struct MatchState {
    /// Where the next `find()` starts
    position: usize,
    /// Group spans of the last successful match
    groups: Option<Vec<Option<(usize, usize)>>>,
}

/// Stateful match over one input
#[derive(Debug)]
pub struct MatcherObject {
    pattern: PatternObject,
    input: String,
    state: Mutex<MatchState>,
}

impl MatcherObject {
    fn record(&self, captures: Option<regex::Captures<'_>>) -> bool {
        let mut state = self.state.lock();
        match captures {
            Some(caps) => {
                let groups: Vec<_> = caps.iter().map(|g| g.map(|m| (m.start(), m.end()))).collect();
                if let Some(Some((start, end))) = groups.first() {
                    state.position = if end == start { end + 1 } else { *end };
                }
                state.groups = Some(groups);
                true
            }
            None => {
                state.groups = None;
                false
            }
        }
    }

    /// Whether the whole input matches
    pub fn matches(&self) -> bool {
        self.record(self.pattern.full.captures(&self.input))
    }

    /// Find the next match
    pub fn find(&self) -> bool {
        let position = self.state.lock().position;
        if position > self.input.len() {
            return self.record(None);
        }
        self.record(self.pattern.regex.captures_at(&self.input, position))
    }

    /// Text of group `index` of the last match; `None` for an unmatched group
    pub fn group(&self, index: usize) -> HeronResult<Option<String>> {
        let state = self.state.lock();
        let groups = state
            .groups
            .as_ref()
            .ok_or_else(|| HeronError::host("No match found"))?;
        let span = groups
            .get(index)
            .ok_or_else(|| HeronError::host(format!("No group {index}")))?;
        Ok(span.map(|(start, end)| self.input[start..end].to_string()))
    }
}

fn group_value(matcher: &MatcherObject, index: i64) -> HeronResult<HostValue> {
    let index = usize::try_from(index).map_err(|_| HeronError::host(format!("No group {index}")))?;
    Ok(matcher.group(index)?.map_or(HostValue::Null, HostValue::from))
}

pub fn pattern_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::class("Pattern")
            .static_method("compile", vec![ParamType::String], ParamType::Any, |args| {
                Ok(HostValue::object(PatternObject::compile(string_arg(args, 0))?))
            })
            .static_method(
                "matches",
                vec![ParamType::String, ParamType::String],
                ParamType::Bool,
                |args| {
                    let pattern = PatternObject::compile(string_arg(args, 0))?;
                    Ok(HostValue::Bool(pattern.matcher(string_arg(args, 1)).matches()))
                },
            )
            .method("matcher", vec![ParamType::String], ParamType::Any, |this, args| {
                let pattern = receiver::<PatternObject>(this)?;
                Ok(HostValue::object(pattern.matcher(string_arg(args, 0))))
            })
            .method("pattern", vec![], ParamType::String, |this, _| {
                Ok(HostValue::from(receiver::<PatternObject>(this)?.source()))
            })
            .method("split", vec![ParamType::String], ParamType::List, |this, args| {
                let parts = receiver::<PatternObject>(this)?.split(string_arg(args, 0));
                Ok(HostValue::List(parts.into_iter().map(HostValue::from).collect()))
            })
            .method("toString", vec![], ParamType::String, |this, _| {
                Ok(HostValue::from(receiver::<PatternObject>(this)?.source()))
            })
            .build()
    })
    .clone()
}

pub fn matcher_type() -> HostType {
    static TYPE: OnceLock<HostType> = OnceLock::new();
    TYPE.get_or_init(|| {
        HostType::class("Matcher")
            .method("matches", vec![], ParamType::Bool, |this, _| {
                Ok(HostValue::Bool(receiver::<MatcherObject>(this)?.matches()))
            })
            .method("find", vec![], ParamType::Bool, |this, _| {
                Ok(HostValue::Bool(receiver::<MatcherObject>(this)?.find()))
            })
            .method("group", vec![], ParamType::Any, |this, _| {
                group_value(receiver::<MatcherObject>(this)?, 0)
            })
            .method("group", vec![ParamType::Int], ParamType::Any, |this, args| {
                let index = args.first().and_then(HostValue::as_i64).unwrap_or(0);
                group_value(receiver::<MatcherObject>(this)?, index)
            })
            .build()
    })
    .clone()
}

impl HostObject for PatternObject {
    fn host_type(&self) -> HostType {
        pattern_type()
    }

    fn describe(&self) -> String {
        self.source.clone()
    }
}

impl HostObject for MatcherObject {
    fn host_type(&self) -> HostType {
        matcher_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;

    #[test]
    fn test_find_walks_matches() {
        let pattern = PatternObject::compile(r"(\w)(\d)?").unwrap();
        let matcher = pattern.matcher("a1 b");
        assert!(matcher.find());
        assert_eq!(matcher.group(0).unwrap().as_deref(), Some("a1"));
        assert_eq!(matcher.group(2).unwrap().as_deref(), Some("1"));
        assert!(matcher.find());
        assert_eq!(matcher.group(1).unwrap().as_deref(), Some("b"));
        assert_eq!(matcher.group(2).unwrap(), None);
        assert!(!matcher.find());
        assert!(matcher.group(0).is_err());
    }

    #[test]
    fn test_split_drops_trailing_empties() {
        let pattern = PatternObject::compile(",").unwrap();
        assert_eq!(pattern.split("a,b,,"), vec!["a", "b"]);
        assert_eq!(pattern.split(""), vec![""]);
        assert!(PatternObject::compile("(").is_err());
    }

    #[test]
    fn test_pattern_from_script() {
        let runtime = Runtime::new();
        let _guard = runtime.lock().unwrap();
        runtime.global().set("Pattern", pattern_type()).unwrap();
        runtime.execute_void("let digits = Pattern.compile('^\\\\d+$')").unwrap();
        assert!(runtime.execute_bool("digits.matcher('12345').matches()").unwrap());
        assert!(!runtime.execute_bool("digits.matcher('12a45').matches()").unwrap());
        assert_eq!(runtime.execute_string("digits.pattern()").unwrap(), "^\\d+$");
        assert_eq!(
            runtime.execute_string("Pattern.compile('\\\\s*,\\\\s*').split('a , b,c').join('|')").unwrap(),
            "a|b|c"
        );
        assert!(runtime.execute_bool("Pattern.matches('[a-z]+', 'abc')").unwrap());
        assert!(runtime.execute("Pattern.compile('(')").is_err());
    }
}
