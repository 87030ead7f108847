//! Prompting the model to rewrite a workflow document.

mod prompt;
mod repair;


pub use prompt::{EDITOR_PROMPT, build_editor_prompt, build_prompt, repair_instruction};
pub use repair::{MAX_REPAIR_ATTEMPTS, RepairError, Repaired, generate_with_repair};
