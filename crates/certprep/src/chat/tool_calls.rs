//! Reassembly of streamed tool-call fragments.

use std::collections::BTreeMap;

use super::completion::{FunctionCall, ToolCall, ToolCallDelta};

/// Collects tool-call fragments keyed by their stream index.
///
/// The first fragment seen for an index supplies the call id and function
/// name; argument text from every fragment is appended in arrival order.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, PartialCall>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    pub fn push(&mut self, delta: &ToolCallDelta) {
        let function = delta.function.as_ref();
        let arguments = function.and_then(|f| f.arguments.as_deref()).unwrap_or_default();

        let call = self.calls.entry(delta.index).or_insert_with(|| PartialCall {
            id: delta.id.clone().unwrap_or_default(),
            name: function.and_then(|f| f.name.clone()).unwrap_or_default(),
            arguments: String::new(),
        });
        call.arguments.push_str(arguments);
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Completed calls in index order. Calls that never received argument
    /// text get `{}`.
    pub fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_values()
            .map(|call| ToolCall {
                id: call.id,
                kind: "function".to_string(),
                function: FunctionCall {
                    name: call.name,
                    arguments: if call.arguments.is_empty() {
                        "{}".to_string()
                    } else {
                        call.arguments
                    },
                },
            })
            .collect()
    }
}
