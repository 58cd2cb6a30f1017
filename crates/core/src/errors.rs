use thiserror::Error;

use crate::sequence::SequenceError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("scoring weights must sum to 100, got {sum}")]
    InvalidWeights { sum: u64 },
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("unknown workflow action `{0}`")]
    UnknownWorkflowAction(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failure of a research or message provider call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("provider transport failure: {0}")]
    Transport(String),
    #[error("provider call timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("provider returned unparseable output: {0}")]
    Parse(String),
    #[error("provider returned an empty response")]
    EmptyResponse,
    #[error("prompt rendering failed: {0}")]
    Prompt(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("concurrent modification: {0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ApplicationError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

impl From<SequenceError> for ApplicationError {
    fn from(value: SequenceError) -> Self {
        Self::Domain(DomainError::Sequence(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Conflict { .. } => {
                "The record was changed by another request. Reload and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotFound { correlation_id, .. }
            | Self::BadRequest { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::NotFound { .. }
            | ApplicationError::Domain(DomainError::Sequence(SequenceError::StepNotFound(_))) => {
                Self::NotFound { message: value.to_string(), correlation_id }
            }
            ApplicationError::Domain(DomainError::Sequence(
                SequenceError::StepNotInProgress { .. }
                | SequenceError::NoStepInProgress
                | SequenceError::EnrollmentNotActive { .. }
                | SequenceError::InvalidEnrollmentTransition { .. }
                | SequenceError::NextStepNotPending { .. }
                | SequenceError::EnrollmentClosed,
            ))
            | ApplicationError::Conflict(_) => {
                Self::Conflict { message: value.to_string(), correlation_id }
            }
            ApplicationError::Domain(_) | ApplicationError::Configuration(_) => {
                Self::BadRequest { message: value.to_string(), correlation_id }
            }
            ApplicationError::Generation(GenerationError::Parse(_))
            | ApplicationError::Generation(GenerationError::EmptyResponse)
            | ApplicationError::Generation(GenerationError::Prompt(_)) => {
                Self::Internal { message: value.to_string(), correlation_id }
            }
            ApplicationError::Generation(_) | ApplicationError::Persistence(_) => {
                Self::ServiceUnavailable { message: value.to_string(), correlation_id }
            }
        }
    }
}
