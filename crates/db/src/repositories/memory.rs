use std::collections::HashMap;

use tokio::sync::RwLock;

use outbound_core::domain::message::{Message, MessageId};
use outbound_core::domain::prospect::{Prospect, ProspectId, ProspectStatus};
use outbound_core::domain::sequence::{Enrollment, EnrollmentId, EnrollmentStatus};

use super::{EnrollmentRepository, MessageRepository, ProspectRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryProspectRepository {
    prospects: RwLock<HashMap<String, Prospect>>,
}

#[async_trait::async_trait]
impl ProspectRepository for InMemoryProspectRepository {
    async fn find_by_id(&self, id: &ProspectId) -> Result<Option<Prospect>, RepositoryError> {
        let prospects = self.prospects.read().await;
        Ok(prospects.get(&id.0).cloned())
    }

    async fn list(&self) -> Result<Vec<Prospect>, RepositoryError> {
        let prospects = self.prospects.read().await;
        let mut all = prospects.values().cloned().collect::<Vec<_>>();
        all.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
        });
        Ok(all)
    }

    async fn list_by_status(
        &self,
        status: ProspectStatus,
    ) -> Result<Vec<Prospect>, RepositoryError> {
        Ok(self.list().await?.into_iter().filter(|prospect| prospect.status == status).collect())
    }

    async fn save(&self, prospect: Prospect) -> Result<(), RepositoryError> {
        let mut prospects = self.prospects.write().await;
        prospects.insert(prospect.id.0.clone(), prospect);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<HashMap<String, Message>>,
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn find_by_id(&self, id: &MessageId) -> Result<Option<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages.get(&id.0).cloned())
    }

    async fn list_for_prospect(
        &self,
        prospect_id: &ProspectId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut owned = messages
            .values()
            .filter(|message| &message.prospect_id == prospect_id)
            .cloned()
            .collect::<Vec<_>>();
        owned.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(owned)
    }

    async fn save(&self, message: Message) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        messages.insert(message.id.0.clone(), message);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryEnrollmentRepository {
    enrollments: RwLock<HashMap<String, Enrollment>>,
}

#[async_trait::async_trait]
impl EnrollmentRepository for InMemoryEnrollmentRepository {
    async fn find_by_id(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        let enrollments = self.enrollments.read().await;
        Ok(enrollments.get(&id.0).cloned())
    }

    /// Paused enrollments still count: only completion releases the prospect.
    async fn find_active_for_prospect(
        &self,
        prospect_id: &ProspectId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let enrollments = self.enrollments.read().await;
        Ok(enrollments
            .values()
            .filter(|enrollment| &enrollment.prospect_id == prospect_id)
            .filter(|enrollment| enrollment.status != EnrollmentStatus::Completed)
            .max_by_key(|enrollment| enrollment.started_at)
            .cloned())
    }

    async fn list_for_prospect(
        &self,
        prospect_id: &ProspectId,
    ) -> Result<Vec<Enrollment>, RepositoryError> {
        let enrollments = self.enrollments.read().await;
        let mut owned = enrollments
            .values()
            .filter(|enrollment| &enrollment.prospect_id == prospect_id)
            .cloned()
            .collect::<Vec<_>>();
        owned.sort_by_key(|enrollment| enrollment.started_at);
        Ok(owned)
    }

    async fn insert(&self, enrollment: Enrollment) -> Result<(), RepositoryError> {
        let mut enrollments = self.enrollments.write().await;
        if enrollments.contains_key(&enrollment.id.0) {
            return Err(RepositoryError::Duplicate {
                entity: "enrollment",
                id: enrollment.id.0.clone(),
            });
        }
        enrollments.insert(enrollment.id.0.clone(), enrollment);
        Ok(())
    }

    async fn save_if_version(
        &self,
        enrollment: Enrollment,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut enrollments = self.enrollments.write().await;
        let stored = enrollments.get(&enrollment.id.0).ok_or_else(|| RepositoryError::Missing {
            entity: "enrollment",
            id: enrollment.id.0.clone(),
        })?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                entity: "enrollment",
                id: enrollment.id.0.clone(),
                expected: expected_version,
                found: stored.version,
            });
        }
        enrollments.insert(enrollment.id.0.clone(), enrollment);
        Ok(())
    }
}
