use async_trait::async_trait;
use thiserror::Error;

use outbound_core::domain::message::{Message, MessageId};
use outbound_core::domain::prospect::{Prospect, ProspectId, ProspectStatus};
use outbound_core::domain::sequence::{Enrollment, EnrollmentId};
use outbound_core::errors::ApplicationError;

pub mod memory;

pub use memory::{
    InMemoryEnrollmentRepository, InMemoryMessageRepository, InMemoryProspectRepository,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity} `{id}` already exists")]
    Duplicate { entity: &'static str, id: String },
    #[error("{entity} `{id}` not found")]
    Missing { entity: &'static str, id: String },
    #[error("{entity} `{id}` changed concurrently: expected version {expected}, found {found}")]
    VersionConflict { entity: &'static str, id: String, expected: u64, found: u64 },
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Missing { entity, id } => ApplicationError::NotFound { entity, id },
            RepositoryError::VersionConflict { .. } | RepositoryError::Duplicate { .. } => {
                ApplicationError::Conflict(value.to_string())
            }
            RepositoryError::Storage(message) => ApplicationError::Persistence(message),
        }
    }
}

#[async_trait]
pub trait ProspectRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProspectId) -> Result<Option<Prospect>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Prospect>, RepositoryError>;
    async fn list_by_status(
        &self,
        status: ProspectStatus,
    ) -> Result<Vec<Prospect>, RepositoryError>;
    async fn save(&self, prospect: Prospect) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn find_by_id(&self, id: &MessageId) -> Result<Option<Message>, RepositoryError>;
    /// Oldest first.
    async fn list_for_prospect(
        &self,
        prospect_id: &ProspectId,
    ) -> Result<Vec<Message>, RepositoryError>;
    async fn save(&self, message: Message) -> Result<(), RepositoryError>;
}

/// Enrollments are written with optimistic concurrency: `insert` refuses an
/// existing id and `save_if_version` only replaces the stored record when its
/// version still equals `expected_version`.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    async fn find_by_id(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError>;
    async fn find_active_for_prospect(
        &self,
        prospect_id: &ProspectId,
    ) -> Result<Option<Enrollment>, RepositoryError>;
    async fn list_for_prospect(
        &self,
        prospect_id: &ProspectId,
    ) -> Result<Vec<Enrollment>, RepositoryError>;
    async fn insert(&self, enrollment: Enrollment) -> Result<(), RepositoryError>;
    async fn save_if_version(
        &self,
        enrollment: Enrollment,
        expected_version: u64,
    ) -> Result<(), RepositoryError>;
}
