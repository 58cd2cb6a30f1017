pub mod repositories;
pub mod services;

pub use repositories::{
    EnrollmentRepository, InMemoryEnrollmentRepository, InMemoryMessageRepository,
    InMemoryProspectRepository, MessageRepository, ProspectRepository, RepositoryError,
};
pub use services::{SendOutcome, SequenceService, WorkflowActionOutcome, WorkflowService};
