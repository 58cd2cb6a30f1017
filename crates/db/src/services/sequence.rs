use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use outbound_core::audit::{AuditContext, AuditSink, InMemoryAuditSink, NoopAuditSink};
use outbound_core::domain::prospect::{ProspectId, ProspectStatus};
use outbound_core::domain::sequence::{
    Enrollment, EnrollmentId, Sequence, Step, StepId, StepPatch,
};
use outbound_core::errors::{ApplicationError, DomainError};
use outbound_core::sequence::{
    AdvanceOutcome, SequenceEngine, SequenceError, SequenceTemplate, StepCommand,
};

use crate::repositories::{EnrollmentRepository, ProspectRepository};

/// Enrollment lifecycle on top of the repositories.
///
/// Every write loads the stored enrollment, runs the engine on a copy and
/// saves it only if the stored version is unchanged. Two callers racing on
/// the same step both pass the engine check against their own copy, but only
/// one save succeeds; the other gets [`ApplicationError::Conflict`].
#[derive(Clone)]
pub struct SequenceService {
    enrollments: Arc<dyn EnrollmentRepository>,
    prospects: Arc<dyn ProspectRepository>,
    audit: Arc<dyn AuditSink>,
    engine: SequenceEngine,
}

impl SequenceService {
    pub fn new(
        enrollments: Arc<dyn EnrollmentRepository>,
        prospects: Arc<dyn ProspectRepository>,
    ) -> Self {
        Self { enrollments, prospects, audit: Arc::new(NoopAuditSink), engine: SequenceEngine::new() }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub async fn get(&self, id: &EnrollmentId) -> Result<Enrollment, ApplicationError> {
        self.enrollments
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("enrollment", id.0.clone()))
    }

    pub async fn active_for(
        &self,
        prospect_id: &ProspectId,
    ) -> Result<Option<Enrollment>, ApplicationError> {
        Ok(self.enrollments.find_active_for_prospect(prospect_id).await?)
    }

    pub async fn enroll_from_template(
        &self,
        prospect_id: &ProspectId,
        template_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, ApplicationError> {
        let template = SequenceTemplate::find(template_key)
            .ok_or_else(|| ApplicationError::not_found("sequence_template", template_key))?;
        self.enroll(prospect_id, template.instantiate(), now).await
    }

    /// Starts `sequence` for the prospect. A previous unfinished enrollment
    /// is closed first so a prospect is never in two sequences at once.
    pub async fn enroll(
        &self,
        prospect_id: &ProspectId,
        sequence: Sequence,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, ApplicationError> {
        let mut prospect = self
            .prospects
            .find_by_id(prospect_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("prospect", prospect_id.0.clone()))?;

        if let Some(previous) = self.enrollments.find_active_for_prospect(prospect_id).await? {
            let expected = previous.version;
            let mut closed = previous;
            self.engine.supersede(&mut closed, now)?;
            let closed_id = closed.id.clone();
            self.enrollments.save_if_version(closed, expected).await?;
            info!(
                event_name = "sequence.enrollment.superseded",
                prospect_id = %prospect_id,
                enrollment_id = %closed_id,
                "previous enrollment closed"
            );
        }

        let enrollment = Enrollment::start(
            EnrollmentId(Uuid::new_v4().to_string()),
            prospect_id.clone(),
            sequence,
            now,
        )?;
        self.enrollments.insert(enrollment.clone()).await?;

        prospect.status = ProspectStatus::InSequence;
        prospect.updated_at = now;
        self.prospects.save(prospect).await?;

        info!(
            event_name = "sequence.enrollment.started",
            prospect_id = %prospect_id,
            enrollment_id = %enrollment.id,
            steps = enrollment.sequence.steps.len(),
            "prospect enrolled"
        );
        Ok(enrollment)
    }

    pub async fn complete_step(
        &self,
        id: &EnrollmentId,
        step_id: &StepId,
        response_received: bool,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<AdvanceOutcome, ApplicationError> {
        let command = StepCommand::Complete { step_id: step_id.clone(), response_received };
        self.transition(id, command, now, correlation_id).await
    }

    pub async fn skip_step(
        &self,
        id: &EnrollmentId,
        step_id: &StepId,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<AdvanceOutcome, ApplicationError> {
        self.transition(id, StepCommand::Skip { step_id: step_id.clone() }, now, correlation_id)
            .await
    }

    /// A reply that stops the sequence also marks the prospect as responded.
    pub async fn record_reply(
        &self,
        id: &EnrollmentId,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<AdvanceOutcome, ApplicationError> {
        self.transition(id, StepCommand::RecordReply, now, correlation_id).await
    }

    pub async fn transition(
        &self,
        id: &EnrollmentId,
        command: StepCommand,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<AdvanceOutcome, ApplicationError> {
        let current = self.get(id).await?;
        let expected = current.version;
        let audit = AuditContext::new(
            Some(current.prospect_id.clone()),
            Some(current.id.clone()),
            correlation_id,
            "sequence_service",
        );

        // Events are held back until the save decides whether the
        // transition happened.
        let staged = InMemoryAuditSink::default();
        let mut next = current;
        let result = self.engine.apply_with_audit(&mut next, &command, now, &staged, &audit);
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(error) => {
                self.flush(&staged);
                warn!(
                    event_name = "sequence.step.rejected",
                    correlation_id = %correlation_id,
                    enrollment_id = %id,
                    error = %error,
                    "step transition rejected"
                );
                return Err(error.into());
            }
        };

        let prospect_id = next.prospect_id.clone();
        if let Err(error) = self.enrollments.save_if_version(next, expected).await {
            warn!(
                event_name = "sequence.step.conflict",
                correlation_id = %correlation_id,
                enrollment_id = %id,
                error = %error,
                "enrollment changed before the transition was saved"
            );
            return Err(error.into());
        }
        self.flush(&staged);

        if outcome.stopped_on_reply {
            self.mark_responded(&prospect_id, now).await?;
        }

        info!(
            event_name = transition_event_name(&command),
            correlation_id = %correlation_id,
            prospect_id = %prospect_id,
            enrollment_id = %id,
            left_step = %outcome.left_step,
            current_step = outcome.current_step,
            sequence_complete = outcome.sequence_complete,
            "sequence step transition applied"
        );
        Ok(outcome)
    }

    pub async fn pause(&self, id: &EnrollmentId) -> Result<Enrollment, ApplicationError> {
        let engine = self.engine;
        let (enrollment, ()) = self.mutate(id, |enrollment| engine.pause(enrollment)).await?;
        info!(event_name = "sequence.enrollment.paused", enrollment_id = %id, "enrollment paused");
        Ok(enrollment)
    }

    pub async fn resume(&self, id: &EnrollmentId) -> Result<Enrollment, ApplicationError> {
        let engine = self.engine;
        let (enrollment, ()) = self.mutate(id, |enrollment| engine.resume(enrollment)).await?;
        info!(event_name = "sequence.enrollment.resumed", enrollment_id = %id, "enrollment resumed");
        Ok(enrollment)
    }

    /// Returns the updated enrollment and the order the step landed on.
    pub async fn insert_step(
        &self,
        id: &EnrollmentId,
        position: Option<u32>,
        step: Step,
    ) -> Result<(Enrollment, u32), ApplicationError> {
        self.mutate(id, |enrollment| enrollment.insert_step(position, step)).await
    }

    pub async fn delete_step(
        &self,
        id: &EnrollmentId,
        step_id: &StepId,
    ) -> Result<(Enrollment, Step), ApplicationError> {
        self.mutate(id, |enrollment| enrollment.delete_step(step_id)).await
    }

    pub async fn reorder_steps(
        &self,
        id: &EnrollmentId,
        step_ids: &[StepId],
    ) -> Result<Enrollment, ApplicationError> {
        let (enrollment, ()) =
            self.mutate(id, |enrollment| enrollment.reorder_steps(step_ids)).await?;
        Ok(enrollment)
    }

    pub async fn update_step(
        &self,
        id: &EnrollmentId,
        step_id: &StepId,
        patch: StepPatch,
    ) -> Result<Enrollment, ApplicationError> {
        let (enrollment, ()) =
            self.mutate(id, |enrollment| enrollment.update_step(step_id, patch)).await?;
        Ok(enrollment)
    }

    async fn mutate<T, F>(
        &self,
        id: &EnrollmentId,
        edit: F,
    ) -> Result<(Enrollment, T), ApplicationError>
    where
        F: FnOnce(&mut Enrollment) -> Result<T, SequenceError>,
    {
        let current = self.get(id).await?;
        let expected = current.version;
        let mut next = current;
        let value = edit(&mut next)?;
        self.enrollments.save_if_version(next.clone(), expected).await?;
        Ok((next, value))
    }

    async fn mark_responded(
        &self,
        prospect_id: &ProspectId,
        now: DateTime<Utc>,
    ) -> Result<(), ApplicationError> {
        let Some(mut prospect) = self.prospects.find_by_id(prospect_id).await? else {
            return Err(DomainError::InvariantViolation(format!(
                "enrollment references missing prospect `{prospect_id}`"
            ))
            .into());
        };
        prospect.status = ProspectStatus::Responded;
        prospect.updated_at = now;
        self.prospects.save(prospect).await?;
        Ok(())
    }

    fn flush(&self, staged: &InMemoryAuditSink) {
        for event in staged.events() {
            self.audit.emit(event);
        }
    }
}

fn transition_event_name(command: &StepCommand) -> &'static str {
    match command {
        StepCommand::Complete { .. } => "sequence.step.completed",
        StepCommand::Skip { .. } => "sequence.step.skipped",
        StepCommand::RecordReply => "sequence.step.replied",
    }
}
