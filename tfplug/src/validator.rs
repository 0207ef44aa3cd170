use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::fmt;

/// Attribute-level validation, run against known, non-null config values
pub trait Validator: fmt::Debug + Send + Sync {
    fn description(&self) -> String;
    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>);
}

/// Whole-config validation across several attributes
pub trait ConfigValidator: fmt::Debug + Send + Sync {
    fn validate(&self, config: &DynamicValue, diagnostics: &mut Vec<Diagnostic>);
}

#[derive(Debug)]
pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("length between {} and {}", min, max),
            (Some(min), None) => format!("length of at least {}", min),
            (None, Some(max)) => format!("length of at most {}", max),
            (None, None) => "any length".to_string(),
        }
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(s) = value.as_string() else {
            return;
        };
        let len = s.chars().count();
        if self.min.is_some_and(|min| len < min) || self.max.is_some_and(|max| len > max) {
            diagnostics.push(
                Diagnostic::error(
                    format!("Invalid length for {}", path),
                    format!("Expected {}, got length {}", self.description(), len),
                )
                .with_attribute(path.clone()),
            );
        }
    }
}

#[derive(Debug)]
pub struct StringOneOfValidator {
    pub allowed: Vec<String>,
}

impl StringOneOfValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for StringOneOfValidator {
    fn description(&self) -> String {
        format!("one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_string() {
            if !self.allowed.iter().any(|a| a == s) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid value for {}", path),
                        format!("Value '{}' must be {}", s, self.description()),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
    }
}

#[derive(Debug)]
pub struct NumberOneOfValidator {
    pub allowed: Vec<f64>,
}

impl NumberOneOfValidator {
    pub fn new(allowed: &[i64]) -> Self {
        Self {
            allowed: allowed.iter().map(|n| *n as f64).collect(),
        }
    }
}

impl Validator for NumberOneOfValidator {
    fn description(&self) -> String {
        let values: Vec<String> = self.allowed.iter().map(|n| n.to_string()).collect();
        format!("one of: {}", values.join(", "))
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(n) = value.as_number() {
            if !self.allowed.iter().any(|a| (a - n).abs() < f64::EPSILON) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid value for {}", path),
                        format!("Value {} must be {}", n, self.description()),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
    }
}

#[derive(Debug)]
pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRangeValidator {
    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("between {} and {}", min, max),
            (Some(min), None) => format!("at least {}", min),
            (None, Some(max)) => format!("at most {}", max),
            (None, None) => "any number".to_string(),
        }
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(n) = value.as_number() else {
            return;
        };
        if self.min.is_some_and(|min| n < min) || self.max.is_some_and(|max| n > max) {
            diagnostics.push(
                Diagnostic::error(
                    format!("Value out of range for {}", path),
                    format!("Value must be {}, got {}", self.description(), n),
                )
                .with_attribute(path.clone()),
            );
        }
    }
}

/// Accepts canonical hyphenated UUIDs
#[derive(Debug)]
pub struct UuidValidator;

impl Validator for UuidValidator {
    fn description(&self) -> String {
        "a valid UUID".to_string()
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_string() {
            // uuid also parses simple and braced forms; the API only issues hyphenated ones
            if s.len() != 36 || uuid::Uuid::parse_str(s).is_err() {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid UUID for {}", path),
                        format!("'{}' is not a valid UUID", s),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
    }
}

/// Requires exactly one of the named top-level attributes to be set
#[derive(Debug)]
pub struct ExactlyOneOf {
    pub attributes: Vec<String>,
}

impl ExactlyOneOf {
    pub fn new(attributes: &[&str]) -> Self {
        Self {
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl ConfigValidator for ExactlyOneOf {
    fn validate(&self, config: &DynamicValue, diagnostics: &mut Vec<Diagnostic>) {
        let mut set = 0;
        for name in &self.attributes {
            match config.get(&AttributePath::new(name)) {
                // can't decide until apply
                Some(Dynamic::Unknown) => return,
                Some(Dynamic::Null) | None => {}
                Some(_) => set += 1,
            }
        }

        if set != 1 {
            diagnostics.push(Diagnostic::error(
                "Invalid attribute combination",
                format!(
                    "Exactly one of these attributes must be configured: [{}]",
                    self.attributes.join(", ")
                ),
            ));
        }
    }
}

/// Rejects configs that set `attribute` together with any of `others`
#[derive(Debug)]
pub struct ConflictsWith {
    pub attribute: String,
    pub others: Vec<String>,
}

impl ConflictsWith {
    pub fn new(attribute: &str, others: &[&str]) -> Self {
        Self {
            attribute: attribute.to_string(),
            others: others.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl ConfigValidator for ConflictsWith {
    fn validate(&self, config: &DynamicValue, diagnostics: &mut Vec<Diagnostic>) {
        let is_set = |name: &str| {
            config
                .get(&AttributePath::new(name))
                .is_some_and(|v| !v.is_null())
        };

        if !is_set(&self.attribute) {
            return;
        }

        for other in &self.others {
            if is_set(other) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid attribute combination",
                        format!(
                            "Attribute \"{}\" cannot be specified when \"{}\" is specified",
                            other, self.attribute
                        ),
                    )
                    .with_attribute(AttributePath::new(other)),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn path() -> AttributePath {
        AttributePath::new("test_field")
    }

    #[test]
    fn string_length_validator_accepts_valid_length() {
        let validator = StringLengthValidator {
            min: Some(3),
            max: Some(10),
        };

        let mut diags = Vec::new();
        validator.validate(&Dynamic::String("hello".to_string()), &path(), &mut diags);

        assert!(diags.is_empty());
    }

    #[test]
    fn string_length_validator_rejects_too_short() {
        let validator = StringLengthValidator {
            min: Some(5),
            max: None,
        };

        let mut diags = Vec::new();
        validator.validate(&Dynamic::String("hi".to_string()), &path(), &mut diags);

        assert_eq!(diags.len(), 1);
        assert!(diags[0].detail.contains("at least 5"));
        assert_eq!(diags[0].attribute, Some(path()));
    }

    #[test]
    fn string_one_of_rejects_unlisted_value() {
        let validator = StringOneOfValidator::new(["AWS", "AZURE"]);

        let mut diags = Vec::new();
        validator.validate(&Dynamic::String("AZURE".to_string()), &path(), &mut diags);
        assert!(diags.is_empty());

        validator.validate(&Dynamic::String("azure".to_string()), &path(), &mut diags);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].detail.contains("one of: AWS, AZURE"));
    }

    #[test]
    fn number_one_of_checks_membership() {
        let validator = NumberOneOfValidator::new(&[1, 12, 24, 36]);

        let mut diags = Vec::new();
        validator.validate(&Dynamic::Number(12.0), &path(), &mut diags);
        assert!(diags.is_empty());

        validator.validate(&Dynamic::Number(6.0), &path(), &mut diags);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn number_range_enforces_minimum() {
        let validator = NumberRangeValidator::at_least(1.0);

        let mut diags = Vec::new();
        validator.validate(&Dynamic::Number(0.0), &path(), &mut diags);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].detail.contains("at least 1"));
    }

    #[test]
    fn uuid_validator_requires_hyphenated_form() {
        let validator = UuidValidator;

        let mut diags = Vec::new();
        validator.validate(
            &Dynamic::String("5b9b4c2a-4f4b-4f1e-9d2a-1c7b0f3e8a11".to_string()),
            &path(),
            &mut diags,
        );
        assert!(diags.is_empty());

        validator.validate(
            &Dynamic::String("5b9b4c2a4f4b4f1e9d2a1c7b0f3e8a11".to_string()),
            &path(),
            &mut diags,
        );
        validator.validate(&Dynamic::String("not-a-uuid".to_string()), &path(), &mut diags);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn validators_ignore_other_types() {
        let mut diags = Vec::new();
        StringLengthValidator {
            min: Some(5),
            max: None,
        }
        .validate(&Dynamic::Number(1.0), &path(), &mut diags);
        NumberRangeValidator::at_least(5.0).validate(
            &Dynamic::String("x".to_string()),
            &path(),
            &mut diags,
        );
        assert!(diags.is_empty());
    }

    fn config(pairs: &[(&str, Dynamic)]) -> DynamicValue {
        let map: HashMap<String, Dynamic> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        DynamicValue::new(Dynamic::Map(map))
    }

    #[test]
    fn exactly_one_of_counts_set_attributes() {
        let validator = ExactlyOneOf::new(&["id", "name", "site_code"]);

        let mut diags = Vec::new();
        validator.validate(
            &config(&[("id", Dynamic::Number(1.0)), ("name", Dynamic::Null)]),
            &mut diags,
        );
        assert!(diags.is_empty());

        validator.validate(&config(&[("id", Dynamic::Null)]), &mut diags);
        assert_eq!(diags.len(), 1);

        validator.validate(
            &config(&[
                ("id", Dynamic::Number(1.0)),
                ("name", Dynamic::String("x".to_string())),
            ]),
            &mut diags,
        );
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn exactly_one_of_defers_on_unknown() {
        let validator = ExactlyOneOf::new(&["id", "name"]);
        let mut diags = Vec::new();
        validator.validate(&config(&[("id", Dynamic::Unknown)]), &mut diags);
        assert!(diags.is_empty());
    }

    #[test]
    fn conflicts_with_flags_each_conflict() {
        let validator = ConflictsWith::new("service_key", &["location_id", "company_name"]);

        let mut diags = Vec::new();
        validator.validate(
            &config(&[
                ("service_key", Dynamic::String("k".to_string())),
                ("location_id", Dynamic::Number(3.0)),
                ("company_name", Dynamic::Null),
            ]),
            &mut diags,
        );

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute, Some(AttributePath::new("location_id")));
    }
}
