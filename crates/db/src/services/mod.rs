pub mod sequence;
pub mod workflow;

pub use sequence::SequenceService;
pub use workflow::{SendOutcome, WorkflowActionOutcome, WorkflowService};
