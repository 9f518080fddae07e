//! Wrapper synthesis: turn a [`ToolDescriptor`] into a callable whose
//! declared parameters match the tool's schema.
//!
//! Parameter names are escaped into valid Rust identifiers so a binding
//! layer can expose them as real argument names:
//!
//! 1. characters outside `[A-Za-z0-9_]` become `_`;
//! 2. an empty name or one starting with a digit gets a `_` prefix;
//! 3. a keyword (`type`, `match`, `self`, `_`, ...) gets a `_` suffix;
//! 4. a name equal to an earlier declared one gets `_` suffixes until unique.
//!
//! Calls take declared names and are forwarded with the wire names.

use std::collections::HashSet;

use serde_json::{Map, Value, json};

use crate::bridge::Bridge;
use crate::descriptor::{ParamType, ToolDescriptor};
use crate::result::{CallResult, ErrorKind};
use crate::types::ToolSpec;

/// Strict, reserved and weak keywords that cannot be used as a plain
/// identifier.
const KEYWORDS: &[&str] = &[
    "_", "abstract", "as", "async", "await", "become", "box", "break", "const", "continue",
    "crate", "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if",
    "impl", "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv",
    "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "try",
    "type", "typeof", "union", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Escape one wire name into an identifier (rules 1-3).
pub fn escape_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if KEYWORDS.contains(&ident.as_str()) {
        ident.push('_');
    }
    ident
}

/// One declared parameter of a synthesized wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Identifier the caller uses.
    pub name: String,
    /// Name sent to the remote service.
    pub wire_name: String,
    pub kind: ParamType,
    pub required: bool,
    pub description: String,
}

/// Shape of a wrapper's parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    /// Exactly these parameters, in schema order.
    Named(Vec<Param>),
    /// No schema was declared; any named arguments are forwarded as-is.
    Keyword,
}

/// A callable standing in for one remote tool.
#[derive(Clone)]
pub struct ToolWrapper {
    name: String,
    description: String,
    signature: Signature,
    bridge: Bridge,
}

impl ToolWrapper {
    /// Build the wrapper for `descriptor`, forwarding through `bridge`.
    pub fn synthesize(descriptor: &ToolDescriptor, bridge: Bridge) -> Self {
        let signature = if descriptor.schema_declared {
            let mut taken = HashSet::new();
            let params = descriptor
                .params
                .iter()
                .map(|spec| {
                    let mut name = escape_identifier(&spec.name);
                    while !taken.insert(name.clone()) {
                        name.push('_');
                    }
                    Param {
                        name,
                        wire_name: spec.name.clone(),
                        kind: spec.kind,
                        required: spec.required,
                        description: spec.description.clone(),
                    }
                })
                .collect();
            Signature::Named(params)
        } else {
            Signature::Keyword
        };

        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            signature,
            bridge,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Declared parameter names in order; empty for keyword wrappers.
    pub fn param_names(&self) -> Vec<&str> {
        match &self.signature {
            Signature::Named(params) => params.iter().map(|p| p.name.as_str()).collect(),
            Signature::Keyword => Vec::new(),
        }
    }

    /// Find a declared parameter by declared or wire name.
    pub fn param(&self, name: &str) -> Option<&Param> {
        match &self.signature {
            Signature::Named(params) => params
                .iter()
                .find(|p| p.name == name)
                .or_else(|| params.iter().find(|p| p.wire_name == name)),
            Signature::Keyword => None,
        }
    }

    /// Tool specification as presented to the model, using declared names.
    pub fn spec(&self) -> ToolSpec {
        let input_schema = match &self.signature {
            Signature::Named(params) => {
                let properties: Map<String, Value> = params
                    .iter()
                    .map(|p| {
                        let mut property = match p.kind {
                            ParamType::Any => json!({}),
                            kind => json!({ "type": kind.as_str() }),
                        };
                        if !p.description.is_empty() {
                            property["description"] = Value::String(p.description.clone());
                        }
                        (p.name.clone(), property)
                    })
                    .collect();
                let required: Vec<&str> = params
                    .iter()
                    .filter(|p| p.required)
                    .map(|p| p.name.as_str())
                    .collect();
                json!({ "type": "object", "properties": properties, "required": required })
            }
            Signature::Keyword => json!({ "type": "object", "additionalProperties": true }),
        };

        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema,
        }
    }

    /// Call with named arguments keyed by declared names.
    ///
    /// Arguments that do not fit the signature are rejected with
    /// [`ErrorKind::InvalidArguments`] before anything is submitted.
    pub fn call(&self, arguments: Map<String, Value>) -> CallResult {
        match self.bind(arguments) {
            Ok(wire) => self.bridge.call_tool(self.name.clone(), wire),
            Err(message) => CallResult::error(ErrorKind::InvalidArguments, message),
        }
    }

    /// Call with values bound to parameters in declared order.
    pub fn call_positional(&self, values: Vec<Value>) -> CallResult {
        let Signature::Named(params) = &self.signature else {
            return CallResult::error(
                ErrorKind::InvalidArguments,
                format!("{} only accepts named arguments", self.name),
            );
        };
        if values.len() > params.len() {
            return CallResult::error(
                ErrorKind::InvalidArguments,
                format!(
                    "{} takes {} arguments but {} were given",
                    self.name,
                    params.len(),
                    values.len()
                ),
            );
        }
        let arguments = params.iter().map(|p| p.name.clone()).zip(values).collect();
        self.call(arguments)
    }

    /// Check declared-name arguments and map them to wire names.
    ///
    /// Values are forwarded unchanged. A `null` for an optional parameter
    /// counts as absent.
    pub fn bind(&self, mut arguments: Map<String, Value>) -> Result<Map<String, Value>, String> {
        let params = match &self.signature {
            Signature::Keyword => return Ok(arguments),
            Signature::Named(params) => params,
        };

        let mut wire = Map::new();
        for param in params {
            match arguments.remove(&param.name) {
                Some(Value::Null) if !param.required => {}
                Some(value) => {
                    if !param.kind.accepts(&value) {
                        return Err(format!(
                            "parameter `{}` of {} expects {}, got {value}",
                            param.name, self.name, param.kind
                        ));
                    }
                    wire.insert(param.wire_name.clone(), value);
                }
                None if param.required => {
                    return Err(format!(
                        "missing required parameter `{}` of {}",
                        param.name, self.name
                    ));
                }
                None => {}
            }
        }

        if let Some(unexpected) = arguments.keys().next() {
            return Err(format!("unexpected parameter `{unexpected}` for {}", self.name));
        }
        Ok(wire)
    }
}

impl std::fmt::Debug for ToolWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolWrapper")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}
