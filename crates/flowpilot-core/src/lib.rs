pub mod audit;
pub mod extract;
pub mod sanitize;
mod validation;
mod workflow;

pub use extract::{ExtractError, extract_json_object};
pub use sanitize::{
    CreateError, CreateRequest, ParseError, WorkflowUpdate, build_create_payload, parse_workflow,
    sanitize_for_update,
};
pub use validation::*;
pub use workflow::*;
