pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod queue;
pub mod scoring;
pub mod sequence;

pub use domain::icp::{
    IcpConfig, IcpConfigId, IcpConfigPatch, IcpPromptContext, IcpTemplate, ScoringWeights,
};
pub use domain::message::{
    Channel, GeneratedMessage, Message, MessageId, MessagePatch, MessageStatus, MessageType,
};
pub use domain::prospect::{
    CompanyAttributes, Prospect, ProspectAttributes, ProspectId, ProspectPatch, ProspectStatus,
    ResearchAttributes, ResearchReport,
};
pub use domain::sequence::{
    Enrollment, EnrollmentId, EnrollmentStatus, Sequence, SequenceId, Step, StepId, StepPatch,
    StepStatus, StepType,
};
pub use errors::{ApplicationError, DomainError, GenerationError, InterfaceError};
pub use queue::{
    ProspectListPage, ProspectQuery, ProspectSort, QueuePage, QueueQuery, ReviewQueue, SortOrder,
    WorkflowAction, WorkflowStats,
};
pub use scoring::{
    ActiveConfigStore, IcpScorer, Recommendation, ScoreBreakdown, ScoredProspect, ScoringInput,
};
pub use sequence::{AdvanceOutcome, SequenceEngine, SequenceError, SequenceTemplate, StepCommand};
