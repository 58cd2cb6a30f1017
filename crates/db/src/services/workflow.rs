use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use outbound_core::domain::message::{Message, MessageId, MessagePatch};
use outbound_core::domain::prospect::{Prospect, ProspectId, ProspectPatch, ProspectStatus};
use outbound_core::errors::ApplicationError;
use outbound_core::queue::{
    ProspectListPage, ProspectQuery, QueuePage, QueueQuery, ReviewQueue, WorkflowAction,
    WorkflowStats,
};
use outbound_core::scoring::{IcpScorer, ScoreBreakdown};
use outbound_core::sequence::AdvanceOutcome;

use super::SequenceService;
use crate::repositories::{MessageRepository, ProspectRepository};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowActionOutcome {
    pub prospect_id: ProspectId,
    pub action: WorkflowAction,
    pub prospect_status: ProspectStatus,
    pub messages_updated: usize,
}

/// Result of sending a message; `step` is set when sending completed the
/// enrollment step the message was drafted for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendOutcome {
    pub message: Message,
    pub step: Option<AdvanceOutcome>,
}

/// Reviewer-facing operations: the queue, message review and bulk actions.
#[derive(Clone)]
pub struct WorkflowService {
    prospects: Arc<dyn ProspectRepository>,
    messages: Arc<dyn MessageRepository>,
    sequences: SequenceService,
    queue: ReviewQueue,
}

impl WorkflowService {
    pub fn new(
        prospects: Arc<dyn ProspectRepository>,
        messages: Arc<dyn MessageRepository>,
        sequences: SequenceService,
        queue: ReviewQueue,
    ) -> Self {
        Self { prospects, messages, sequences, queue }
    }

    pub async fn queue(&self, query: &QueueQuery) -> Result<QueuePage, ApplicationError> {
        let prospects = self.prospects.list_by_status(query.status).await?;
        Ok(self.queue.project(&prospects, query))
    }

    /// Every prospect, not just those awaiting review. A status filter reads
    /// only that status from the repository.
    pub async fn list_prospects(
        &self,
        query: &ProspectQuery,
    ) -> Result<ProspectListPage, ApplicationError> {
        let prospects = match query.status {
            Some(status) => self.prospects.list_by_status(status).await?,
            None => self.prospects.list().await?,
        };
        Ok(self.queue.list(&prospects, query))
    }

    pub async fn stats(&self) -> Result<WorkflowStats, ApplicationError> {
        let prospects = self.prospects.list().await?;
        Ok(WorkflowStats::collect(&prospects))
    }

    pub async fn prospect(&self, id: &ProspectId) -> Result<Prospect, ApplicationError> {
        self.prospects
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("prospect", id.0.clone()))
    }

    pub async fn update_prospect(
        &self,
        id: &ProspectId,
        patch: ProspectPatch,
        now: DateTime<Utc>,
    ) -> Result<Prospect, ApplicationError> {
        let mut prospect = self.prospect(id).await?;
        prospect.apply_patch(patch, now);
        self.prospects.save(prospect.clone()).await?;
        Ok(prospect)
    }

    /// Re-scores a stored prospect with whatever research it already has.
    pub async fn rescore(
        &self,
        id: &ProspectId,
        scorer: &IcpScorer,
        now: DateTime<Utc>,
    ) -> Result<ScoreBreakdown, ApplicationError> {
        let mut prospect = self.prospect(id).await?;
        let breakdown = scorer.score_prospect(&prospect);
        prospect.apply_score(&breakdown);
        prospect.updated_at = now;
        self.prospects.save(prospect).await?;
        info!(
            event_name = "scoring.prospect.rescored",
            prospect_id = %id,
            total_score = breakdown.total_score,
            recommendation = breakdown.recommendation.as_str(),
            "prospect rescored"
        );
        Ok(breakdown)
    }

    pub async fn messages(&self, prospect_id: &ProspectId) -> Result<Vec<Message>, ApplicationError> {
        Ok(self.messages.list_for_prospect(prospect_id).await?)
    }

    pub async fn message(&self, id: &MessageId) -> Result<Message, ApplicationError> {
        self.messages
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("message", id.0.clone()))
    }

    pub async fn update_message(
        &self,
        id: &MessageId,
        patch: MessagePatch,
        now: DateTime<Utc>,
    ) -> Result<Message, ApplicationError> {
        let mut message = self.message(id).await?;
        message.apply_patch(patch, now);
        self.messages.save(message.clone()).await?;
        Ok(message)
    }

    pub async fn approve_message(
        &self,
        id: &MessageId,
        now: DateTime<Utc>,
    ) -> Result<Message, ApplicationError> {
        let mut message = self.message(id).await?;
        message.approve(now);
        self.messages.save(message.clone()).await?;
        info!(
            event_name = "workflow.message.approved",
            prospect_id = %message.prospect_id,
            message_id = %id,
            "message approved"
        );
        Ok(message)
    }

    pub async fn reject_message(
        &self,
        id: &MessageId,
        now: DateTime<Utc>,
    ) -> Result<Message, ApplicationError> {
        let mut message = self.message(id).await?;
        message.reject(now);
        self.messages.save(message.clone()).await?;
        info!(
            event_name = "workflow.message.rejected",
            prospect_id = %message.prospect_id,
            message_id = %id,
            "message rejected"
        );
        Ok(message)
    }

    /// Marks the message sent and the prospect contacted. If the message was
    /// drafted for the step its prospect's enrollment is currently on, that
    /// step is completed as well.
    pub async fn mark_sent(
        &self,
        id: &MessageId,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<SendOutcome, ApplicationError> {
        let mut message = self.message(id).await?;
        let mut prospect = self.prospect(&message.prospect_id).await?;

        message.mark_sent(now);
        self.messages.save(message.clone()).await?;

        prospect.status = ProspectStatus::Contacted;
        prospect.last_contacted_at = Some(now);
        prospect.updated_at = now;
        self.prospects.save(prospect).await?;

        let mut step = None;
        if let Some(step_id) = &message.sequence_step_id {
            if let Some(enrollment) = self.sequences.active_for(&message.prospect_id).await? {
                let on_step = enrollment.is_active()
                    && enrollment.current().is_some_and(|current| &current.id == step_id);
                if on_step {
                    step = Some(
                        self.sequences
                            .complete_step(&enrollment.id, step_id, false, now, correlation_id)
                            .await?,
                    );
                }
            }
        }

        info!(
            event_name = "workflow.message.sent",
            correlation_id = %correlation_id,
            prospect_id = %message.prospect_id,
            message_id = %id,
            step_completed = step.is_some(),
            "message marked as sent"
        );
        Ok(SendOutcome { message, step })
    }

    pub async fn apply_action(
        &self,
        prospect_id: &ProspectId,
        action: &str,
        now: DateTime<Utc>,
    ) -> Result<WorkflowActionOutcome, ApplicationError> {
        let action = WorkflowAction::parse(action)?;
        let mut prospect = self.prospect(prospect_id).await?;

        let mut messages_updated = 0;
        for mut message in self.messages.list_for_prospect(prospect_id).await? {
            if let Some(status) = action.message_status(message.status) {
                message.status = status;
                message.updated_at = now;
                self.messages.save(message).await?;
                messages_updated += 1;
            }
        }

        prospect.status = action.prospect_status();
        prospect.updated_at = now;
        self.prospects.save(prospect).await?;

        info!(
            event_name = "workflow.action.applied",
            prospect_id = %prospect_id,
            action = action.as_str(),
            messages_updated,
            "workflow action applied"
        );
        Ok(WorkflowActionOutcome {
            prospect_id: prospect_id.clone(),
            action,
            prospect_status: action.prospect_status(),
            messages_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use outbound_core::domain::message::{
        Channel, GeneratedMessage, Message, MessageId, MessagePatch, MessageStatus, MessageType,
    };
    use outbound_core::domain::prospect::{Prospect, ProspectId, ProspectStatus};
    use outbound_core::domain::sequence::{Sequence, SequenceId, Step, StepId, StepType};
    use outbound_core::errors::{ApplicationError, DomainError};
    use outbound_core::queue::{ProspectQuery, ProspectSort, QueueQuery, ReviewQueue, SortOrder};
    use outbound_core::scoring::{IcpScorer, Recommendation};
    use outbound_core::IcpConfig;

    use super::WorkflowService;
    use crate::repositories::{
        InMemoryEnrollmentRepository, InMemoryMessageRepository, InMemoryProspectRepository,
        MessageRepository, ProspectRepository,
    };
    use crate::services::SequenceService;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 2, 10, 0, 0).single().expect("timestamp")
    }

    struct Fixture {
        service: WorkflowService,
        sequences: SequenceService,
        prospects: Arc<InMemoryProspectRepository>,
        messages: Arc<InMemoryMessageRepository>,
    }

    fn fixture() -> Fixture {
        let prospects = Arc::new(InMemoryProspectRepository::default());
        let messages = Arc::new(InMemoryMessageRepository::default());
        let enrollments = Arc::new(InMemoryEnrollmentRepository::default());
        let sequences = SequenceService::new(enrollments, prospects.clone());
        let service = WorkflowService::new(
            prospects.clone(),
            messages.clone(),
            sequences.clone(),
            ReviewQueue::default(),
        );
        Fixture { service, sequences, prospects, messages }
    }

    async fn seed_prospect(fixture: &Fixture, id: &str, score: u32, status: ProspectStatus) {
        let mut prospect =
            Prospect::new(ProspectId(id.to_string()), format!("Prospect {id}"), now());
        prospect.icp_score = score;
        prospect.status = status;
        fixture.prospects.save(prospect).await.expect("seed prospect");
    }

    async fn seed_message(fixture: &Fixture, id: &str, prospect: &str) -> Message {
        let message = Message::from_generated(
            MessageId(id.to_string()),
            ProspectId(prospect.to_string()),
            Channel::Email,
            MessageType::Initial,
            GeneratedMessage {
                subject: Some("Scaling onboarding".to_string()),
                content: "Hi, saw the Series B news.".to_string(),
                hook: "Series B".to_string(),
            },
            now(),
        );
        fixture.messages.save(message.clone()).await.expect("seed message");
        message
    }

    #[tokio::test]
    async fn queue_lists_ready_prospects_by_score() {
        let fixture = fixture();
        seed_prospect(&fixture, "low", 40, ProspectStatus::ReadyForReview).await;
        seed_prospect(&fixture, "high", 90, ProspectStatus::ReadyForReview).await;
        seed_prospect(&fixture, "new", 99, ProspectStatus::New).await;

        let page = fixture.service.queue(&QueueQuery::default()).await.expect("queue");
        let ids = page.prospects.iter().map(|entry| entry.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["high", "low"]);

        let stats = fixture.service.stats().await.expect("stats");
        assert_eq!(stats.total_prospects, 3);
        assert_eq!(stats.count(ProspectStatus::ReadyForReview), 2);
    }

    #[tokio::test]
    async fn prospect_list_searches_every_status_and_pages() {
        let fixture = fixture();
        seed_prospect(&fixture, "ready", 40, ProspectStatus::ReadyForReview).await;
        seed_prospect(&fixture, "fresh", 90, ProspectStatus::New).await;
        seed_prospect(&fixture, "done", 70, ProspectStatus::Converted).await;

        let query = ProspectQuery {
            sort_by: ProspectSort::IcpScore,
            sort_order: SortOrder::Desc,
            per_page: Some(2),
            ..ProspectQuery::default()
        };
        let page = fixture.service.list_prospects(&query).await.expect("list");
        let ids = page.prospects.iter().map(|entry| entry.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["fresh", "done"]);
        assert_eq!((page.total, page.pages), (3, 2));

        let query = ProspectQuery {
            status: Some(ProspectStatus::Converted),
            search: Some("prospect D".to_string()),
            ..ProspectQuery::default()
        };
        let page = fixture.service.list_prospects(&query).await.expect("filtered list");
        assert_eq!(page.total, 1);
        assert_eq!(page.prospects[0].id.0, "done");
    }

    #[tokio::test]
    async fn approve_all_approves_ready_messages_only() {
        let fixture = fixture();
        seed_prospect(&fixture, "P-1", 80, ProspectStatus::ReadyForReview).await;
        seed_message(&fixture, "M-1", "P-1").await;
        let sent = seed_message(&fixture, "M-2", "P-1").await;
        fixture.service.mark_sent(&sent.id, now(), "corr").await.expect("send");

        let outcome = fixture
            .service
            .apply_action(&ProspectId("P-1".to_string()), "approve_all", now())
            .await
            .expect("approve all");
        assert_eq!(outcome.messages_updated, 1);
        assert_eq!(outcome.prospect_status, ProspectStatus::Approved);

        let statuses = fixture
            .service
            .messages(&ProspectId("P-1".to_string()))
            .await
            .expect("messages")
            .into_iter()
            .map(|message| message.status)
            .collect::<Vec<_>>();
        assert_eq!(statuses, vec![MessageStatus::Approved, MessageStatus::Sent]);
    }

    #[tokio::test]
    async fn skip_rejects_messages_and_reset_only_touches_the_prospect() {
        let fixture = fixture();
        seed_prospect(&fixture, "P-1", 80, ProspectStatus::ReadyForReview).await;
        seed_message(&fixture, "M-1", "P-1").await;
        let prospect_id = ProspectId("P-1".to_string());

        fixture.service.apply_action(&prospect_id, "skip", now()).await.expect("skip");
        assert_eq!(
            fixture.service.prospect(&prospect_id).await.expect("prospect").status,
            ProspectStatus::NotInterested
        );
        assert_eq!(
            fixture.service.message(&MessageId("M-1".to_string())).await.expect("message").status,
            MessageStatus::Rejected
        );

        let outcome = fixture.service.apply_action(&prospect_id, "reset", now()).await.expect("reset");
        assert_eq!(outcome.messages_updated, 0);
        assert_eq!(
            fixture.service.prospect(&prospect_id).await.expect("prospect").status,
            ProspectStatus::New
        );
    }

    #[tokio::test]
    async fn unknown_action_is_a_domain_error() {
        let fixture = fixture();
        seed_prospect(&fixture, "P-1", 80, ProspectStatus::ReadyForReview).await;

        let error = fixture
            .service
            .apply_action(&ProspectId("P-1".to_string()), "archive", now())
            .await
            .expect_err("unknown action");
        assert_eq!(
            error,
            ApplicationError::Domain(DomainError::UnknownWorkflowAction("archive".to_string()))
        );
    }

    #[tokio::test]
    async fn message_edits_are_recorded() {
        let fixture = fixture();
        seed_prospect(&fixture, "P-1", 80, ProspectStatus::ReadyForReview).await;
        let message = seed_message(&fixture, "M-1", "P-1").await;

        let patch = MessagePatch { content: Some("Shorter intro.".to_string()), ..MessagePatch::default() };
        let updated = fixture
            .service
            .update_message(&message.id, patch, now() + Duration::minutes(5))
            .await
            .expect("update");
        assert_eq!(updated.content, "Shorter intro.");
        assert_eq!(updated.edit_history.len(), 1);

        let rejected = fixture.service.reject_message(&message.id, now()).await.expect("reject");
        assert_eq!(rejected.status, MessageStatus::Rejected);
        let approved = fixture.service.approve_message(&message.id, now()).await.expect("approve");
        assert_eq!(approved.status, MessageStatus::Approved);

        let error = fixture
            .service
            .approve_message(&MessageId("missing".to_string()), now())
            .await
            .expect_err("missing message");
        assert!(matches!(error, ApplicationError::NotFound { entity: "message", .. }));
    }

    #[tokio::test]
    async fn sending_a_step_message_completes_the_current_step() {
        let fixture = fixture();
        seed_prospect(&fixture, "P-1", 80, ProspectStatus::Approved).await;
        let prospect_id = ProspectId("P-1".to_string());

        let mut sequence = Sequence::new(SequenceId("seq".to_string()), "Email first");
        sequence.insert_step(None, Step::new(StepId("email".to_string()), StepType::ColdEmail));
        sequence.insert_step(
            None,
            Step::new(StepId("call".to_string()), StepType::ColdCall).with_wait_days(3),
        );
        let enrollment =
            fixture.sequences.enroll(&prospect_id, sequence, now()).await.expect("enroll");

        let mut message = seed_message(&fixture, "M-1", "P-1").await;
        message.sequence_step_id = Some(StepId("email".to_string()));
        fixture.messages.save(message.clone()).await.expect("link message");

        let outcome = fixture.service.mark_sent(&message.id, now(), "corr").await.expect("send");
        assert_eq!(outcome.message.status, MessageStatus::Sent);
        let step = outcome.step.expect("step completed");
        assert_eq!(step.next_step, Some(StepId("call".to_string())));

        let prospect = fixture.service.prospect(&prospect_id).await.expect("prospect");
        assert_eq!(prospect.status, ProspectStatus::Contacted);
        assert_eq!(prospect.last_contacted_at, Some(now()));

        let stored = fixture.sequences.get(&enrollment.id).await.expect("enrollment");
        assert_eq!(stored.current_step, 1);

        // A second send of the same message no longer matches the current step.
        let again = fixture.service.mark_sent(&message.id, now(), "corr").await.expect("resend");
        assert_eq!(again.step, None);
    }

    #[tokio::test]
    async fn rescoring_writes_the_breakdown_back() {
        let fixture = fixture();
        let mut prospect = Prospect::new(ProspectId("P-1".to_string()), "Ada Park", now());
        prospect.title = Some("VP of Engineering".to_string());
        fixture.prospects.save(prospect).await.expect("seed");

        let config = IcpConfig {
            target_titles: vec!["VP of Engineering".to_string()],
            ..IcpConfig::default()
        };
        let scorer = IcpScorer::new(Some(config));
        let breakdown = fixture
            .service
            .rescore(&ProspectId("P-1".to_string()), &scorer, now())
            .await
            .expect("rescore");

        let stored = fixture.service.prospect(&ProspectId("P-1".to_string())).await.expect("prospect");
        assert_eq!(stored.icp_score, breakdown.total_score);
        assert_eq!(stored.icp_recommendation, Some(breakdown.recommendation));
        assert_eq!(breakdown.total_score, 58);
        assert_eq!(breakdown.recommendation, Recommendation::LowPriority);

        let unconfigured = fixture
            .service
            .rescore(&ProspectId("P-1".to_string()), &IcpScorer::new(None), now())
            .await
            .expect("unconfigured");
        assert_eq!(unconfigured.total_score, 50);
    }
}
