//! Tool descriptors derived from a server's declared input schemas.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::warn;

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    /// Arrays, objects, mixed unions and undeclared types. Values are
    /// forwarded unchecked for the service to validate.
    Any,
}

impl ParamType {
    /// Read the declared type of a property schema.
    ///
    /// Looks at `type` and at the alternatives of `anyOf`/`oneOf`, ignoring
    /// `null`. A single primitive type maps to itself and a number/integer
    /// mix to `number`. Everything else is [`ParamType::Any`].
    pub fn from_schema(property: &Value) -> Self {
        let mut declared = Vec::new();
        collect_types(property, &mut declared);
        declared.retain(|t| *t != "null");
        declared.sort_unstable();
        declared.dedup();

        match declared.as_slice() {
            [only] => Self::named(only),
            [] => Self::Any,
            mixed if mixed.iter().all(|t| matches!(*t, "number" | "integer")) => Self::Number,
            _ => Self::Any,
        }
    }

    fn named(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            _ => Self::Any,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Any => "any",
        }
    }

    /// Whether `value` is acceptable for this type.
    ///
    /// Integers are valid numbers, and a number without a fractional part
    /// is a valid integer.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
            }
            Self::Boolean => value.is_boolean(),
            Self::Any => true,
        }
    }

    /// Parse user-typed text into a value of this type.
    ///
    /// Booleans are lenient: `true`, `1`, `yes` and `ja` are true, anything
    /// else is false. For `any`, a JSON array or object is taken as typed
    /// and other input is text.
    pub fn parse(self, input: &str) -> Option<Value> {
        let input = input.trim();
        match self {
            Self::String => Some(Value::String(input.to_string())),
            Self::Number => input
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            Self::Integer => input.parse::<i64>().ok().map(Value::from),
            Self::Boolean => Some(Value::Bool(matches!(
                input.to_lowercase().as_str(),
                "true" | "1" | "yes" | "ja"
            ))),
            Self::Any => Some(
                serde_json::from_str::<Value>(input)
                    .ok()
                    .filter(|v| v.is_array() || v.is_object())
                    .unwrap_or_else(|| Value::String(input.to_string())),
            ),
        }
    }
}

fn collect_types<'a>(schema: &'a Value, out: &mut Vec<&'a str>) {
    match schema.get("type") {
        Some(Value::String(name)) => out.push(name),
        Some(Value::Array(names)) => out.extend(names.iter().filter_map(Value::as_str)),
        _ => {}
    }
    for keyword in ["anyOf", "oneOf"] {
        if let Some(Value::Array(alternatives)) = schema.get(keyword) {
            for alternative in alternatives {
                collect_types(alternative, out);
            }
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub required: bool,
    pub description: String,
}

/// A tool as listed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Parameters in the order the service declared them.
    pub params: Vec<ParamSpec>,
    /// False when the service declared no `properties` at all.
    pub schema_declared: bool,
}

impl ToolDescriptor {
    /// Look up a parameter by its declared name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

impl From<mcp::Tool> for ToolDescriptor {
    fn from(tool: mcp::Tool) -> Self {
        let schema = tool.input_schema.as_ref();
        let properties = schema
            .and_then(|s| s.get("properties"))
            .and_then(Value::as_object);
        let required: HashSet<&str> = schema
            .and_then(|s| s.get("required"))
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let params = properties
            .map(|props| {
                props
                    .iter()
                    .map(|(name, property)| ParamSpec {
                        name: name.clone(),
                        kind: ParamType::from_schema(property),
                        required: required.contains(name.as_str()),
                        description: property
                            .get("description")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            description: tool.description.unwrap_or_default(),
            name: tool.name,
            params,
            schema_declared: properties.is_some(),
        }
    }
}

/// Convert a server listing, keeping the first of any duplicated names.
pub fn descriptors_from(tools: Vec<mcp::Tool>) -> Vec<ToolDescriptor> {
    let mut seen = HashSet::new();
    tools
        .into_iter()
        .filter(|tool| {
            let fresh = seen.insert(tool.name.clone());
            if !fresh {
                warn!(tool = %tool.name, "server listed a tool twice; keeping the first");
            }
            fresh
        })
        .map(ToolDescriptor::from)
        .collect()
}
