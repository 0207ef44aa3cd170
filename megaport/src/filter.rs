//! Matching engines shared by the lookup and list data sources
//!
//! * [`Glob`] compiles shell-style patterns (`*`, `?`, `[...]`) to anchored,
//!   case-sensitive regexes.
//! * [`FilterSet`] applies `filter { name, values }` blocks to API objects.
//!   Names and values are checked when the set is compiled so a bad filter
//!   fails before any API call.
//! * [`TagFilter`] requires every configured tag, values matched by glob.
//! * [`narrow_to_one`] applies criteria one at a time and reports which one
//!   eliminated the last candidate.

use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("invalid pattern \"{pattern}\": {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("unsupported filter name \"{name}\", expected one of: {}", allowed.join(", "))]
    UnknownFilter { name: String, allowed: Vec<String> },

    #[error("filter \"{name}\" expects {expected} values, got \"{value}\"")]
    InvalidValue {
        name: String,
        expected: &'static str,
        value: String,
    },

    #[error("filter \"{0}\" needs at least one value")]
    EmptyValues(String),

    #[error("no {subject} available")]
    NoCandidates { subject: String },

    #[error("no {subject} left after filtering on {attribute} = \"{value}\"")]
    NoMatch {
        subject: String,
        attribute: String,
        value: String,
    },

    #[error("{count} {subject} match the given criteria, add criteria to narrow it to one")]
    Ambiguous { subject: String, count: usize },
}

/// Shell-style pattern compiled to an anchored regex
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        let source = glob_to_regex(pattern)?;
        let regex = Regex::new(&source).map_err(|e| FilterError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

fn glob_to_regex(pattern: &str) -> Result<String, FilterError> {
    let invalid = |reason: &str| FilterError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("^(?s:");

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => {
                let escaped = chars.next().ok_or_else(|| invalid("trailing escape"))?;
                out.push_str(&regex::escape(&escaped.to_string()));
            }
            '[' => {
                let mut class = String::from("[");
                let mut first = true;
                let mut negated = false;
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        ']' if !first => {
                            closed = true;
                            break;
                        }
                        // a leading `]`, even after the negation, is literal
                        '!' | '^' if first && !negated => {
                            class.push('^');
                            negated = true;
                            continue;
                        }
                        '\\' => {
                            let escaped =
                                chars.next().ok_or_else(|| invalid("trailing escape"))?;
                            class.push_str(&regex::escape(&escaped.to_string()));
                        }
                        ']' | '-' if first => {
                            class.push('\\');
                            class.push(c);
                        }
                        '[' | '&' | '~' => {
                            class.push('\\');
                            class.push(c);
                        }
                        _ => class.push(c),
                    }
                    first = false;
                }
                if !closed {
                    return Err(invalid("unterminated character class"));
                }
                class.push(']');
                out.push_str(&class);
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }

    out.push_str(")$");
    Ok(out)
}

/// A `filter { name, values }` block as configured
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub name: String,
    pub values: Vec<String>,
}

/// Value of a filterable attribute on an API object
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(i64),
    Bool(bool),
}

impl FieldValue {
    pub fn text(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Bool,
}

/// A filter name and how to read it off `T`
pub struct FilterField<T> {
    pub name: &'static str,
    pub kind: FieldKind,
    pub extract: fn(&T) -> FieldValue,
}

impl<T> FilterField<T> {
    pub const fn text(name: &'static str, extract: fn(&T) -> FieldValue) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            extract,
        }
    }

    pub const fn number(name: &'static str, extract: fn(&T) -> FieldValue) -> Self {
        Self {
            name,
            kind: FieldKind::Number,
            extract,
        }
    }

    pub const fn boolean(name: &'static str, extract: fn(&T) -> FieldValue) -> Self {
        Self {
            name,
            kind: FieldKind::Bool,
            extract,
        }
    }
}

#[derive(Debug)]
enum ValueMatcher {
    Globs(Vec<Glob>),
    Numbers(Vec<i64>),
    Bools(Vec<bool>),
}

impl ValueMatcher {
    fn matches(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (ValueMatcher::Globs(globs), FieldValue::Text(s)) => globs.iter().any(|g| g.matches(s)),
            (ValueMatcher::Numbers(numbers), FieldValue::Number(n)) => numbers.contains(n),
            (ValueMatcher::Bools(bools), FieldValue::Bool(b)) => bools.contains(b),
            _ => false,
        }
    }
}

struct CompiledFilter<T> {
    matcher: ValueMatcher,
    extract: fn(&T) -> FieldValue,
}

/// Attribute filters that must all pass; each passes when any value matches
pub struct FilterSet<T> {
    filters: Vec<CompiledFilter<T>>,
}

impl<T> FilterSet<T> {
    pub fn compile(fields: &[FilterField<T>], specs: &[FilterSpec]) -> Result<Self, FilterError> {
        let filters = specs
            .iter()
            .map(|spec| {
                let field = fields.iter().find(|f| f.name == spec.name).ok_or_else(|| {
                    FilterError::UnknownFilter {
                        name: spec.name.clone(),
                        allowed: fields.iter().map(|f| f.name.to_string()).collect(),
                    }
                })?;
                if spec.values.is_empty() {
                    return Err(FilterError::EmptyValues(spec.name.clone()));
                }

                let matcher = match field.kind {
                    FieldKind::Text => ValueMatcher::Globs(
                        spec.values
                            .iter()
                            .map(|v| Glob::new(v))
                            .collect::<Result<_, _>>()?,
                    ),
                    FieldKind::Number => ValueMatcher::Numbers(
                        spec.values
                            .iter()
                            .map(|v| parse_number(&spec.name, v))
                            .collect::<Result<_, _>>()?,
                    ),
                    FieldKind::Bool => ValueMatcher::Bools(
                        spec.values
                            .iter()
                            .map(|v| parse_bool(&spec.name, v))
                            .collect::<Result<_, _>>()?,
                    ),
                };

                Ok(CompiledFilter {
                    matcher,
                    extract: field.extract,
                })
            })
            .collect::<Result<Vec<_>, FilterError>>()?;

        Ok(Self { filters })
    }

    pub fn matches(&self, item: &T) -> bool {
        self.filters
            .iter()
            .all(|f| f.matcher.matches(&(f.extract)(item)))
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

fn parse_number(name: &str, value: &str) -> Result<i64, FilterError> {
    let trimmed = value.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| {
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        })
        .ok_or_else(|| FilterError::InvalidValue {
            name: name.to_string(),
            expected: "integer",
            value: value.to_string(),
        })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, FilterError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(FilterError::InvalidValue {
            name: name.to_string(),
            expected: "boolean",
            value: value.to_string(),
        }),
    }
}

/// Every configured tag must be present, its value matched by glob
#[derive(Debug, Default)]
pub struct TagFilter {
    tags: Vec<(String, Glob)>,
}

impl TagFilter {
    pub fn compile(tags: &HashMap<String, String>) -> Result<Self, FilterError> {
        let mut compiled = tags
            .iter()
            .map(|(k, v)| Ok((k.clone(), Glob::new(v)?)))
            .collect::<Result<Vec<_>, FilterError>>()?;
        compiled.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self { tags: compiled })
    }

    pub fn matches(&self, tags: &HashMap<String, String>) -> bool {
        self.tags
            .iter()
            .all(|(key, glob)| tags.get(key).is_some_and(|v| glob.matches(v)))
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Stable sort on a primary key, ties broken by a secondary key
pub fn sort_by_two_keys<T, A, B>(items: &mut [T], first: impl Fn(&T) -> A, second: impl Fn(&T) -> B)
where
    A: Ord,
    B: Ord,
{
    items.sort_by(|a, b| match first(a).cmp(&first(b)) {
        Ordering::Equal => second(a).cmp(&second(b)),
        other => other,
    });
}

/// One narrowing step: the attribute it checks, the configured value and
/// the test candidates must pass
pub struct Criterion<'a, T> {
    pub attribute: &'static str,
    pub value: String,
    pub test: Box<dyn Fn(&T) -> bool + Send + Sync + 'a>,
}

impl<'a, T> Criterion<'a, T> {
    pub fn new(
        attribute: &'static str,
        value: impl ToString,
        test: impl Fn(&T) -> bool + Send + Sync + 'a,
    ) -> Self {
        Self {
            attribute,
            value: value.to_string(),
            test: Box::new(test),
        }
    }
}

/// Applies criteria in order and returns the single survivor
pub fn narrow_to_one<T>(
    subject: &str,
    candidates: Vec<T>,
    criteria: &[Criterion<'_, T>],
) -> Result<T, FilterError> {
    if candidates.is_empty() {
        return Err(FilterError::NoCandidates {
            subject: subject.to_string(),
        });
    }

    let mut remaining = candidates;
    for criterion in criteria {
        remaining.retain(|c| (criterion.test)(c));
        tracing::debug!(
            "{} = {:?} leaves {} {}",
            criterion.attribute,
            criterion.value,
            remaining.len(),
            subject
        );
        if remaining.is_empty() {
            return Err(FilterError::NoMatch {
                subject: subject.to_string(),
                attribute: criterion.attribute.to_string(),
                value: criterion.value.clone(),
            });
        }
    }

    if remaining.len() > 1 {
        return Err(FilterError::Ambiguous {
            subject: subject.to_string(),
            count: remaining.len(),
        });
    }

    remaining.pop().ok_or_else(|| FilterError::NoCandidates {
        subject: subject.to_string(),
    })
}
