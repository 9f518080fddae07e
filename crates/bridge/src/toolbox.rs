//! Registration layer between synthesized wrappers and a model runtime.

use serde_json::{Map, Value};
use tracing::debug;

use crate::bridge::Bridge;
use crate::descriptor::ToolDescriptor;
use crate::types::{ToolCall, ToolResult, ToolSpec};
use crate::wrapper::ToolWrapper;

/// The wrappers registered for one run, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct Toolbox {
    wrappers: Vec<ToolWrapper>,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesize one wrapper per descriptor, all sharing `bridge`.
    pub fn synthesize(descriptors: &[ToolDescriptor], bridge: &Bridge) -> Self {
        let mut toolbox = Self::new();
        for descriptor in descriptors {
            toolbox.register(ToolWrapper::synthesize(descriptor, bridge.clone()));
        }
        toolbox
    }

    /// Add a wrapper, replacing any with the same name.
    pub fn register(&mut self, wrapper: ToolWrapper) {
        debug!(tool = wrapper.name(), params = ?wrapper.param_names(), "registering tool");
        match self.wrappers.iter_mut().find(|w| w.name() == wrapper.name()) {
            Some(existing) => *existing = wrapper,
            None => self.wrappers.push(wrapper),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolWrapper> {
        self.wrappers.iter().find(|w| w.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolWrapper> {
        self.wrappers.iter()
    }

    pub fn len(&self) -> usize {
        self.wrappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wrappers.is_empty()
    }

    /// Specs to advertise to the model.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.wrappers.iter().map(ToolWrapper::spec).collect()
    }

    /// Execute a model-requested call. Blocks until the call resolves.
    pub fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let Some(wrapper) = self.get(&call.name) else {
            return ToolResult::error(&call.id, format!("tool not found: {}", call.name));
        };

        let arguments = match &call.input {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return ToolResult::error(
                    &call.id,
                    format!("invalid input: expected an object, got {other}"),
                );
            }
        };

        ToolResult::new(&call.id, wrapper.call(arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeConfig;
    use crate::descriptor::{ParamSpec, ParamType};
    use serde_json::json;

    fn descriptors() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "calculate_inventory".to_string(),
                description: String::new(),
                params: vec![ParamSpec {
                    name: "artikel_a".to_string(),
                    kind: ParamType::Number,
                    required: true,
                    description: String::new(),
                }],
                schema_declared: true,
            },
            ToolDescriptor {
                name: "ping".to_string(),
                description: String::new(),
                params: Vec::new(),
                schema_declared: false,
            },
        ]
    }

    #[test]
    fn synthesizes_in_discovery_order() {
        let toolbox = Toolbox::synthesize(&descriptors(), &Bridge::new(BridgeConfig::default()));
        let names: Vec<_> = toolbox.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["calculate_inventory", "ping"]);
        assert_eq!(toolbox.len(), 2);
    }

    #[test]
    fn dispatch_reports_unknown_tools_and_bad_input() {
        let toolbox = Toolbox::synthesize(&descriptors(), &Bridge::new(BridgeConfig::default()));

        let result = toolbox.dispatch(&ToolCall {
            id: "1".to_string(),
            name: "missing".to_string(),
            input: json!({}),
        });
        assert_eq!(result.tool_call_id, "1");
        assert!(result.outcome.is_error());

        let result = toolbox.dispatch(&ToolCall {
            id: "2".to_string(),
            name: "calculate_inventory".to_string(),
            input: json!([3, 4]),
        });
        assert!(result.outcome.is_error());
    }

    #[test]
    fn dispatch_on_idle_bridge_is_an_error_value() {
        let toolbox = Toolbox::synthesize(&descriptors(), &Bridge::new(BridgeConfig::default()));
        let result = toolbox.dispatch(&ToolCall {
            id: "3".to_string(),
            name: "ping".to_string(),
            input: Value::Null,
        });
        match result.outcome {
            crate::types::ToolOutcome::Error { message } => {
                assert!(message.starts_with("error (not scheduled)"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
