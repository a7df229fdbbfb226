//! Parameter schema compiler.
//!
//! Compiles a manifest's JSON-Schema subset into a validator applied to
//! every tool call before execution. The subset is deliberately flat:
//! an `object` root with `properties`/`required`, leaf types `string`,
//! `number`, `boolean`, and `array` (elements untyped).
//!
//! Two degradations are part of the contract and must not be tightened:
//! a root that is missing or not `type: "object"` compiles to an
//! accept-anything schema, and an unknown leaf type becomes an
//! accept-anything field. Existing manifests rely on both for forward
//! compatibility.

use serde_json::Value;

use crate::error::ToolError;

/// Leaf type of one declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafType {
    String,
    Number,
    Boolean,
    /// Array with untyped elements.
    Array,
    /// Accept any JSON value (unknown leaf types degrade here).
    Any,
}

impl LeafType {
    fn from_keyword(keyword: Option<&str>) -> Self {
        match keyword {
            Some("string") => LeafType::String,
            Some("number") => LeafType::Number,
            Some("boolean") => LeafType::Boolean,
            Some("array") => LeafType::Array,
            _ => LeafType::Any,
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            LeafType::String => value.is_string(),
            LeafType::Number => value.is_number(),
            LeafType::Boolean => value.is_boolean(),
            LeafType::Array => value.is_array(),
            LeafType::Any => true,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            LeafType::String => "string",
            LeafType::Number => "number",
            LeafType::Boolean => "boolean",
            LeafType::Array => "array",
            LeafType::Any => "any",
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub ty: LeafType,
    pub required: bool,
    pub description: Option<String>,
}

/// A compiled, ready-to-apply parameter schema.
#[derive(Debug, Clone)]
pub enum CompiledSchema {
    /// Root was absent or not an object schema: everything validates.
    AcceptAny,
    /// Object schema with declared fields. Undeclared keys pass through.
    Object { fields: Vec<FieldSpec> },
}

impl CompiledSchema {
    /// Compile a manifest parameter schema. Pure; never fails.
    pub fn compile(schema: Option<&Value>) -> Self {
        let Some(schema) = schema else {
            return CompiledSchema::AcceptAny;
        };
        if schema.get("type").and_then(Value::as_str) != Some("object") {
            return CompiledSchema::AcceptAny;
        }

        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let fields = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .map(|(name, prop)| FieldSpec {
                        name: name.clone(),
                        ty: LeafType::from_keyword(prop.get("type").and_then(Value::as_str)),
                        required: required.contains(&name.as_str()),
                        description: prop
                            .get("description")
                            .and_then(Value::as_str)
                            .map(String::from),
                    })
                    .collect()
            })
            .unwrap_or_default();

        CompiledSchema::Object { fields }
    }

    /// Validate a tool call's arguments against the compiled schema.
    pub fn validate(&self, args: &Value) -> Result<(), ToolError> {
        let fields = match self {
            CompiledSchema::AcceptAny => return Ok(()),
            CompiledSchema::Object { fields } => fields,
        };

        let Some(map) = args.as_object() else {
            return Err(ToolError::InvalidArguments(
                "arguments must be a JSON object".to_string(),
            ));
        };

        for field in fields {
            match map.get(&field.name) {
                None => {
                    if field.required {
                        return Err(ToolError::InvalidArguments(format!(
                            "missing required argument '{}'",
                            field.name
                        )));
                    }
                }
                Some(value) => {
                    if !field.ty.accepts(value) {
                        return Err(ToolError::InvalidArguments(format!(
                            "argument '{}' must be of type {}",
                            field.name,
                            field.ty.name()
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
