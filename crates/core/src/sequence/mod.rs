pub mod engine;
pub mod templates;

pub use engine::{AdvanceOutcome, SequenceEngine, SequenceError, StepCommand};
pub use templates::{SequenceTemplate, StepTemplate};
