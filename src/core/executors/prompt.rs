//! Prompt assembly shared by the generator executors.

use crate::core::executors::ResolvedInput;
use crate::core::graph::{GeneratorConfig, InputValue};

const AGENT_LABEL: &str = "[Agent Instruction]";
const PROMPT_LABEL: &str = "[Prompt]";

/// Builds the combined prompt of a generator.
///
/// Parts come in a fixed order: the agent instruction, the node's own
/// prompt, then every upstream text in edge order. Each non-blank part is
/// labelled with where it came from; parts are separated by a blank line.
/// Returns an empty string when every part is blank.
pub fn combined_prompt(config: &GeneratorConfig, inputs: &[ResolvedInput]) -> String {
    let mut parts = Vec::new();

    let instruction = config.agent_instruction.trim();
    if !instruction.is_empty() {
        parts.push(format!("{}\n{}", AGENT_LABEL, instruction));
    }

    let own = config.prompt.trim();
    if !own.is_empty() {
        parts.push(format!("{}\n{}", PROMPT_LABEL, own));
    }

    for input in inputs {
        for value in input.result.values() {
            if let InputValue::Text(text) = value {
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(format!("[From {}]\n{}", input.source, text));
                }
            }
        }
    }

    parts.join("\n\n")
}
