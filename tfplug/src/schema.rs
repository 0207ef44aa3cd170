//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining provider, resource and
//! data source schemas, plus the schema-driven passes the gRPC layer runs over
//! values: conforming, validation, computed-attribute planning and plan
//! modifiers.

use crate::plan_modifier::{PlanModifier, PlanModifyRequest};
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use crate::validator::{ConfigValidator, Validator};
use std::collections::HashMap;
use std::sync::Arc;

static NULL: Dynamic = Dynamic::Null;

/// AttributeType defines the type system for Terraform attributes
/// This must match Terraform's type system exactly
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>),               // Ordered, allows duplicates
    Set(Box<AttributeType>),                // Unordered, no duplicates
    Map(Box<AttributeType>),                // String keys only
    Object(HashMap<String, AttributeType>), // Fixed structure
}

impl AttributeType {
    /// Terraform's JSON type constraint, e.g. `["list","string"]`
    pub fn to_type_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            AttributeType::String => Value::from("string"),
            AttributeType::Number => Value::from("number"),
            AttributeType::Bool => Value::from("bool"),
            AttributeType::List(inner) => Value::Array(vec!["list".into(), inner.to_type_json()]),
            AttributeType::Set(inner) => Value::Array(vec!["set".into(), inner.to_type_json()]),
            AttributeType::Map(inner) => Value::Array(vec!["map".into(), inner.to_type_json()]),
            AttributeType::Object(fields) => {
                let fields: serde_json::Map<String, Value> = fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_type_json()))
                    .collect();
                Value::Array(vec!["object".into(), Value::Object(fields)])
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_type_json().to_string().into_bytes()
    }

    /// Convenience for `list(object({...}))` outputs
    pub fn list_of_objects(fields: &[(&str, AttributeType)]) -> Self {
        AttributeType::List(Box::new(AttributeType::Object(
            fields
                .iter()
                .map(|(name, ty)| (name.to_string(), ty.clone()))
                .collect(),
        )))
    }
}

/// Schema is returned by providers/resources/data sources
/// Version is used for state migration
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64, // Increment when schema changes require migration
    pub block: Block, // Root block containing all attributes
    pub config_validators: Vec<Arc<dyn ConfigValidator>>,
}

impl Schema {
    /// Attribute and config validation for a decoded configuration
    pub fn validate_config(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.block
            .validate(&config.value, &AttributePath::root(), &mut diagnostics);
        for validator in &self.config_validators {
            validator.validate(config, &mut diagnostics);
        }
        diagnostics
    }

    /// Shape a value to this schema, see [`Block::conform`]
    pub fn conform(&self, value: &DynamicValue) -> DynamicValue {
        DynamicValue::new(self.block.conform(&value.value))
    }
}

/// Block represents a configuration block
#[derive(Debug, Clone)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

impl Block {
    fn empty() -> Self {
        Self {
            version: 0,
            attributes: Vec::new(),
            block_types: Vec::new(),
            description: String::new(),
            description_kind: StringKind::Plain,
            deprecated: false,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn nested_block(&self, name: &str) -> Option<&NestedBlock> {
        self.block_types.iter().find(|b| b.type_name == name)
    }

    /// Returns a copy of `value` holding exactly the declared attributes and
    /// blocks: missing attributes become null, missing list/set blocks become
    /// empty lists and undeclared keys are dropped.
    pub fn conform(&self, value: &Dynamic) -> Dynamic {
        let Dynamic::Map(map) = value else {
            return value.clone();
        };

        let mut out = HashMap::with_capacity(self.attributes.len() + self.block_types.len());
        for attr in &self.attributes {
            out.insert(
                attr.name.clone(),
                map.get(&attr.name).cloned().unwrap_or(Dynamic::Null),
            );
        }

        for nested in &self.block_types {
            let current = map.get(&nested.type_name).unwrap_or(&NULL);
            let conformed = match nested.nesting {
                NestingMode::List | NestingMode::Set => match current {
                    Dynamic::List(items) => {
                        Dynamic::List(items.iter().map(|i| nested.block.conform(i)).collect())
                    }
                    Dynamic::Unknown => Dynamic::Unknown,
                    _ => Dynamic::List(Vec::new()),
                },
                _ => nested.block.conform(current),
            };
            out.insert(nested.type_name.clone(), conformed);
        }

        Dynamic::Map(out)
    }

    /// Checks a config object against the declared attributes and blocks
    pub fn validate(&self, config: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Dynamic::Map(map) = config else {
            return;
        };

        for key in map.keys() {
            if self.attribute(key).is_none() && self.nested_block(key).is_none() {
                diagnostics.push(
                    Diagnostic::error(
                        "Unsupported argument",
                        format!("An argument named \"{}\" is not expected here.", key),
                    )
                    .with_attribute(path.clone().attribute(key)),
                );
            }
        }

        for attr in &self.attributes {
            let attr_path = path.clone().attribute(&attr.name);
            match map.get(&attr.name).unwrap_or(&NULL) {
                Dynamic::Unknown => {}
                Dynamic::Null => {
                    if attr.required {
                        diagnostics.push(
                            Diagnostic::error(
                                "Missing required argument",
                                format!(
                                    "The argument \"{}\" is required, but no definition was found.",
                                    attr_path
                                ),
                            )
                            .with_attribute(attr_path),
                        );
                    }
                }
                value => {
                    if attr.deprecated {
                        let detail = attr
                            .deprecation_message
                            .clone()
                            .unwrap_or_else(|| format!("\"{}\" is deprecated.", attr_path));
                        diagnostics.push(
                            Diagnostic::warning("Attribute Deprecated", detail)
                                .with_attribute(attr_path.clone()),
                        );
                    }
                    for validator in &attr.validators {
                        validator.validate(value, &attr_path, diagnostics);
                    }
                }
            }
        }

        for nested in &self.block_types {
            let block_path = path.clone().attribute(&nested.type_name);
            match (nested.nesting, map.get(&nested.type_name).unwrap_or(&NULL)) {
                (_, Dynamic::Unknown) => {}
                (NestingMode::List | NestingMode::Set, value) => {
                    let items = value.as_list().map(Vec::as_slice).unwrap_or_default();
                    if (items.len() as i64) < nested.min_items {
                        diagnostics.push(
                            Diagnostic::error(
                                format!("Insufficient {} blocks", nested.type_name),
                                format!(
                                    "At least {} \"{}\" blocks are required.",
                                    nested.min_items, nested.type_name
                                ),
                            )
                            .with_attribute(block_path.clone()),
                        );
                    }
                    if nested.max_items > 0 && items.len() as i64 > nested.max_items {
                        diagnostics.push(
                            Diagnostic::error(
                                format!("Too many {} blocks", nested.type_name),
                                format!(
                                    "No more than {} \"{}\" blocks are allowed.",
                                    nested.max_items, nested.type_name
                                ),
                            )
                            .with_attribute(block_path.clone()),
                        );
                    }
                    for (i, item) in items.iter().enumerate() {
                        nested
                            .block
                            .validate(item, &block_path.clone().index(i as i64), diagnostics);
                    }
                }
                (_, Dynamic::Null) => {
                    if nested.min_items > 0 {
                        diagnostics.push(
                            Diagnostic::error(
                                "Missing required block",
                                format!("A \"{}\" block is required.", nested.type_name),
                            )
                            .with_attribute(block_path),
                        );
                    }
                }
                (_, value) => nested.block.validate(value, &block_path, diagnostics),
            }
        }
    }

    /// Marks computed attributes with no configured value as unknown in the
    /// planned object. Nested blocks are only walked when `include_nested`.
    pub fn mark_computed_unknown(&self, config: &Dynamic, planned: &mut Dynamic, include_nested: bool) {
        let Dynamic::Map(planned_map) = planned else {
            return;
        };

        for attr in self.attributes.iter().filter(|a| a.computed) {
            if field(config, &attr.name).is_null() {
                planned_map.insert(attr.name.clone(), Dynamic::Unknown);
            }
        }

        if !include_nested {
            return;
        }

        for nested in &self.block_types {
            let nested_config = field(config, &nested.type_name);
            let Some(planned_nested) = planned_map.get_mut(&nested.type_name) else {
                continue;
            };
            if matches!(planned_nested, Dynamic::Map(_)) {
                nested
                    .block
                    .mark_computed_unknown(nested_config, planned_nested, true);
            } else if let Dynamic::List(items) = planned_nested {
                for (i, item) in items.iter_mut().enumerate() {
                    let item_config = nested_config
                        .as_list()
                        .and_then(|l| l.get(i))
                        .unwrap_or(&NULL);
                    nested.block.mark_computed_unknown(item_config, item, true);
                }
            }
        }
    }

    /// Runs every attribute's plan modifiers against the planned object,
    /// collecting attributes that force replacement.
    pub fn apply_plan_modifiers(
        &self,
        path: &AttributePath,
        prior: &Dynamic,
        config: &Dynamic,
        planned: &mut Dynamic,
        requires_replace: &mut Vec<AttributePath>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let Dynamic::Map(planned_map) = planned else {
            return;
        };

        for attr in self.attributes.iter().filter(|a| !a.plan_modifiers.is_empty()) {
            let attr_path = path.clone().attribute(&attr.name);
            let mut plan = planned_map.get(&attr.name).cloned().unwrap_or(Dynamic::Null);
            let mut replace = false;

            for modifier in &attr.plan_modifiers {
                let response = modifier.modify_plan(PlanModifyRequest {
                    state: field(prior, &attr.name).clone(),
                    plan,
                    config: field(config, &attr.name).clone(),
                    attribute_path: attr_path.clone(),
                });
                plan = response.plan_value;
                replace |= response.requires_replace;
                diagnostics.extend(response.diagnostics);
            }

            if replace {
                requires_replace.push(attr_path);
            }
            planned_map.insert(attr.name.clone(), plan);
        }

        for nested in &self.block_types {
            let block_path = path.clone().attribute(&nested.type_name);
            let nested_prior = field(prior, &nested.type_name);
            let nested_config = field(config, &nested.type_name);
            let Some(planned_nested) = planned_map.get_mut(&nested.type_name) else {
                continue;
            };
            if matches!(planned_nested, Dynamic::Map(_)) {
                nested.block.apply_plan_modifiers(
                    &block_path,
                    nested_prior,
                    nested_config,
                    planned_nested,
                    requires_replace,
                    diagnostics,
                );
            } else if let Dynamic::List(items) = planned_nested {
                for (i, item) in items.iter_mut().enumerate() {
                    let element = |v: &Dynamic| -> Dynamic {
                        v.as_list()
                            .and_then(|l| l.get(i))
                            .cloned()
                            .unwrap_or(Dynamic::Null)
                    };
                    nested.block.apply_plan_modifiers(
                        &block_path.clone().index(i as i64),
                        &element(nested_prior),
                        &element(nested_config),
                        item,
                        requires_replace,
                        diagnostics,
                    );
                }
            }
        }
    }
}

fn field<'a>(value: &'a Dynamic, name: &str) -> &'a Dynamic {
    value
        .as_map()
        .and_then(|m| m.get(name))
        .unwrap_or(&NULL)
}

/// Attribute represents a single configuration attribute
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub deprecated: bool,
    pub deprecation_message: Option<String>,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
}

/// NestedBlock represents a nested configuration block
#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: i64,
    pub max_items: i64,
}

/// NestingMode defines how nested blocks are structured
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NestingMode {
    Invalid,
    Single,
    List,
    Set,
    Map,
    Group,
}

/// StringKind represents the format of string values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StringKind {
    Plain,
    Markdown,
}

/// AttributeBuilder provides fluent API for building attributes
/// ALWAYS use this instead of constructing Attribute directly
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                deprecated: false,
                deprecation_message: None,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    /// Mark as sensitive (hidden)
    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self, message: &str) -> Self {
        self.attribute.deprecated = true;
        self.attribute.deprecation_message = Some(message.to_string());
        self
    }

    pub fn validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.attribute.validators.push(Arc::from(validator));
        self
    }

    pub fn plan_modifier(mut self, modifier: Box<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(Arc::from(modifier));
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// NestedBlockBuilder builds `block "name" { ... }` definitions
pub struct NestedBlockBuilder {
    nested: NestedBlock,
}

impl NestedBlockBuilder {
    pub fn new(type_name: &str, nesting: NestingMode) -> Self {
        Self {
            nested: NestedBlock {
                type_name: type_name.to_string(),
                block: Block::empty(),
                nesting,
                min_items: 0,
                max_items: 0,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.nested.block.description = desc.to_string();
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.nested.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.nested.block.block_types.push(block);
        self
    }

    pub fn min_items(mut self, min: i64) -> Self {
        self.nested.min_items = min;
        self
    }

    pub fn max_items(mut self, max: i64) -> Self {
        self.nested.max_items = max;
        self
    }

    pub fn build(self) -> NestedBlock {
        self.nested
    }
}

/// SchemaBuilder provides fluent API for building schemas
/// ALWAYS use this for consistency
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block::empty(),
                config_validators: Vec::new(),
            },
        }
    }

    /// Set schema version
    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self.schema.block.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.schema.block.block_types.push(block);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn description_kind(mut self, kind: StringKind) -> Self {
        self.schema.block.description_kind = kind;
        self
    }

    pub fn config_validator(mut self, validator: Box<dyn ConfigValidator>) -> Self {
        self.schema.config_validators.push(Arc::from(validator));
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan_modifier::{RequiresReplace, UseStateForUnknown};
    use crate::validator::{ExactlyOneOf, StringOneOfValidator};

    fn obj(pairs: &[(&str, Dynamic)]) -> Dynamic {
        Dynamic::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn s(v: &str) -> Dynamic {
        Dynamic::String(v.to_string())
    }

    fn link_schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(Box::new(UseStateForUnknown))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("bandwidth", AttributeType::Number)
                    .required()
                    .plan_modifier(Box::new(RequiresReplace))
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("source", NestingMode::List)
                    .min_items(1)
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("target_id", AttributeType::String)
                            .optional()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("target", AttributeType::String)
                            .optional()
                            .deprecated("Use target_id instead.")
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("port", AttributeType::Number)
                            .optional()
                            .computed()
                            .build(),
                    )
                    .build(),
            )
            .build()
    }

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the resource")
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert!(matches!(attr.r#type, AttributeType::String));
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the resource");
    }

    #[test]
    fn type_json_encoding() {
        assert_eq!(AttributeType::String.to_bytes(), b"\"string\"".to_vec());
        assert_eq!(
            AttributeType::List(Box::new(AttributeType::Number)).to_type_json(),
            serde_json::json!(["list", "number"])
        );
        assert_eq!(
            AttributeType::list_of_objects(&[
                ("uid", AttributeType::String),
                ("speed", AttributeType::Number)
            ])
            .to_type_json(),
            serde_json::json!(["list", ["object", {"speed": "number", "uid": "string"}]])
        );
    }

    #[test]
    fn cloned_schema_keeps_modifiers() {
        let schema = link_schema();
        let cloned = schema.clone();
        assert_eq!(
            cloned
                .block
                .attribute("id")
                .map(|a| a.plan_modifiers.len()),
            Some(1)
        );
    }

    #[test]
    fn conform_fills_nulls_and_drops_unknown_keys() {
        let schema = link_schema();
        let value = obj(&[("name", s("link")), ("legacy", s("x"))]);

        let conformed = schema.block.conform(&value);
        let map = conformed.as_map().unwrap();

        assert_eq!(map.get("id"), Some(&Dynamic::Null));
        assert_eq!(map.get("source"), Some(&Dynamic::List(vec![])));
        assert!(!map.contains_key("legacy"));
    }

    #[test]
    fn validate_reports_missing_required_and_blocks() {
        let schema = link_schema();
        let diags = schema.validate_config(&DynamicValue::new(obj(&[(
            "bandwidth",
            Dynamic::Number(100.0),
        )])));

        assert!(diags
            .iter()
            .any(|d| d.summary == "Missing required argument"
                && d.attribute == Some(AttributePath::new("name"))));
        assert!(diags.iter().any(|d| d.summary == "Insufficient source blocks"));
    }

    #[test]
    fn validate_warns_on_deprecated_attribute() {
        let schema = link_schema();
        let config = obj(&[
            ("name", s("link")),
            ("bandwidth", Dynamic::Number(100.0)),
            ("source", Dynamic::List(vec![obj(&[("target", s("uid"))])])),
        ]);

        let diags = schema.validate_config(&DynamicValue::new(config));
        assert_eq!(diags.len(), 1);
        assert!(!diags[0].is_error());
        assert_eq!(
            diags[0].attribute,
            Some(AttributePath::new("source").index(0).attribute("target"))
        );
    }

    #[test]
    fn validate_runs_attribute_and_config_validators() {
        let schema = SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("cloud_provider", AttributeType::String)
                    .required()
                    .validator(Box::new(StringOneOfValidator::new(["AWS", "AZURE"])))
                    .build(),
            )
            .attribute(AttributeBuilder::new("id", AttributeType::Number).optional().build())
            .attribute(AttributeBuilder::new("name", AttributeType::String).optional().build())
            .config_validator(Box::new(ExactlyOneOf::new(&["id", "name"])))
            .build();

        let diags = schema.validate_config(&DynamicValue::new(obj(&[(
            "cloud_provider",
            s("GCP"),
        )])));
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn unknown_values_skip_validation() {
        let schema = link_schema();
        let config = obj(&[
            ("name", Dynamic::Unknown),
            ("bandwidth", Dynamic::Unknown),
            ("source", Dynamic::Unknown),
        ]);
        assert!(schema.validate_config(&DynamicValue::new(config)).is_empty());
    }

    #[test]
    fn mark_computed_unknown_walks_nested_blocks_on_create() {
        let schema = link_schema();
        let config = obj(&[
            ("name", s("link")),
            ("source", Dynamic::List(vec![obj(&[("port", Dynamic::Null)])])),
        ]);
        let mut planned = schema.block.conform(&config);

        schema.block.mark_computed_unknown(&config, &mut planned, true);

        let planned = DynamicValue::new(planned);
        assert!(planned
            .get(&AttributePath::new("id"))
            .unwrap()
            .is_unknown());
        assert!(planned
            .get(&AttributePath::new("source").index(0).attribute("port"))
            .unwrap()
            .is_unknown());
    }

    #[test]
    fn plan_modifiers_restore_state_and_flag_replacement() {
        let schema = link_schema();
        let prior = obj(&[
            ("id", s("uid-1")),
            ("name", s("link")),
            ("bandwidth", Dynamic::Number(100.0)),
        ]);
        let config = obj(&[
            ("name", s("link")),
            ("bandwidth", Dynamic::Number(200.0)),
        ]);
        let mut planned = obj(&[
            ("id", Dynamic::Unknown),
            ("name", s("link")),
            ("bandwidth", Dynamic::Number(200.0)),
        ]);

        let mut replace = Vec::new();
        let mut diags = Vec::new();
        schema.block.apply_plan_modifiers(
            &AttributePath::root(),
            &prior,
            &config,
            &mut planned,
            &mut replace,
            &mut diags,
        );

        assert_eq!(
            planned.as_map().unwrap().get("id"),
            Some(&s("uid-1"))
        );
        assert_eq!(replace, vec![AttributePath::new("bandwidth")]);
        assert!(diags.is_empty());
    }
}
