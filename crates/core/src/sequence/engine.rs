use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::sequence::{Enrollment, EnrollmentStatus, StepId, StepStatus};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("step not found: {0}")]
    StepNotFound(StepId),
    #[error("step {step_id} is {status:?}, only the in-progress step can be left")]
    StepNotInProgress { step_id: StepId, status: StepStatus },
    #[error("enrollment has no step in progress")]
    NoStepInProgress,
    #[error("enrollment is {status:?}, transitions require an active enrollment")]
    EnrollmentNotActive { status: EnrollmentStatus },
    #[error("invalid enrollment transition from {from:?} to {to:?}")]
    InvalidEnrollmentTransition { from: EnrollmentStatus, to: EnrollmentStatus },
    #[error("step {0} is in progress and cannot be deleted")]
    InProgressStepDeletion(StepId),
    #[error("reorder must name each of the {expected} steps exactly once, got {received} ids")]
    ReorderMismatch { expected: usize, received: usize },
    #[error("sequence has no steps")]
    EmptySequence,
    #[error("steps must be inserted after the current step {current_step}, got position {position}")]
    InsertBehindCurrentStep { position: u32, current_step: u32 },
    #[error("reorder would put step {step_id} ({status:?}) on the wrong side of the current step")]
    ReorderAcrossCurrentStep { step_id: StepId, status: StepStatus },
    #[error("step {step_id} follows the current step but is {status:?}, not pending")]
    NextStepNotPending { step_id: StepId, status: StepStatus },
    #[error("enrollment is completed, its steps can no longer be rearranged")]
    EnrollmentClosed,
}

/// External event that moves an enrollment off its in-progress step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum StepCommand {
    Complete { step_id: StepId, response_received: bool },
    Skip { step_id: StepId },
    RecordReply,
}

impl StepCommand {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Complete { .. } => "sequence.step_completed",
            Self::Skip { .. } => "sequence.step_skipped",
            Self::RecordReply => "sequence.reply_recorded",
        }
    }
}

/// What a transition did. `sequence_complete` is the terminal signal, not an
/// error: there was no step at `left_order + 1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    pub left_step: StepId,
    pub left_order: u32,
    pub left_status: StepStatus,
    pub next_step: Option<StepId>,
    pub current_step: u32,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub next_action_at: Option<DateTime<Utc>>,
    pub sequence_complete: bool,
    pub stopped_on_reply: bool,
}

/// Step state machine for a single enrollment.
///
/// Transitions mutate the enrollment in place and bump its `version`.
/// Callers that share enrollments across tasks run the engine on a copy and
/// persist it with a version check.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequenceEngine;

impl SequenceEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn complete(
        &self,
        enrollment: &mut Enrollment,
        step_id: &StepId,
        response_received: bool,
        now: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, SequenceError> {
        ensure_next_pending(enrollment, step_id)?;
        let order = leave_step(enrollment, step_id, StepStatus::Completed, response_received, now)?;
        Ok(advance(enrollment, step_id, order, StepStatus::Completed, now))
    }

    /// Same advancement as [`SequenceEngine::complete`]; only the recorded
    /// status of the step being left differs.
    pub fn skip(
        &self,
        enrollment: &mut Enrollment,
        step_id: &StepId,
        now: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, SequenceError> {
        ensure_next_pending(enrollment, step_id)?;
        let order = leave_step(enrollment, step_id, StepStatus::Skipped, false, now)?;
        Ok(advance(enrollment, step_id, order, StepStatus::Skipped, now))
    }

    /// Completes the in-progress step with a response. A `stop_on_reply` step
    /// ends the enrollment and skips whatever is still pending.
    pub fn record_reply(
        &self,
        enrollment: &mut Enrollment,
        now: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, SequenceError> {
        ensure_active(enrollment)?;
        let current = enrollment.current().ok_or(SequenceError::NoStepInProgress)?;
        let step_id = current.id.clone();
        let stop = current.stop_on_reply;
        if !stop {
            ensure_next_pending(enrollment, &step_id)?;
        }

        let order = leave_step(enrollment, &step_id, StepStatus::Completed, true, now)?;
        if !stop {
            return Ok(advance(enrollment, &step_id, order, StepStatus::Completed, now));
        }

        for step in &mut enrollment.sequence.steps {
            if step.status == StepStatus::Pending {
                step.status = StepStatus::Skipped;
            }
        }
        finish(enrollment, now);

        Ok(AdvanceOutcome {
            left_step: step_id,
            left_order: order,
            left_status: StepStatus::Completed,
            next_step: None,
            current_step: enrollment.current_step,
            scheduled_date: None,
            next_action_at: None,
            sequence_complete: true,
            stopped_on_reply: true,
        })
    }

    pub fn apply(
        &self,
        enrollment: &mut Enrollment,
        command: &StepCommand,
        now: DateTime<Utc>,
    ) -> Result<AdvanceOutcome, SequenceError> {
        match command {
            StepCommand::Complete { step_id, response_received } => {
                self.complete(enrollment, step_id, *response_received, now)
            }
            StepCommand::Skip { step_id } => self.skip(enrollment, step_id, now),
            StepCommand::RecordReply => self.record_reply(enrollment, now),
        }
    }

    pub fn apply_with_audit<S>(
        &self,
        enrollment: &mut Enrollment,
        command: &StepCommand,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<AdvanceOutcome, SequenceError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(enrollment, command, now);
        match &result {
            Ok(outcome) => {
                let mut event = audit
                    .event(command.event_type(), AuditCategory::Sequence, AuditOutcome::Success)
                    .with_metadata("left_step", outcome.left_step.0.clone())
                    .with_metadata("left_order", outcome.left_order.to_string())
                    .with_metadata("sequence_complete", outcome.sequence_complete.to_string());
                if let Some(next) = &outcome.next_step {
                    event = event
                        .with_metadata("next_step", next.0.clone())
                        .with_metadata("current_step", outcome.current_step.to_string());
                }
                sink.emit(event);
            }
            Err(error) => {
                sink.emit(
                    audit
                        .event(
                            "sequence.transition_rejected",
                            AuditCategory::Sequence,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("command", command.event_type())
                        .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    pub fn pause(&self, enrollment: &mut Enrollment) -> Result<(), SequenceError> {
        set_status(enrollment, EnrollmentStatus::Active, EnrollmentStatus::Paused)
    }

    pub fn resume(&self, enrollment: &mut Enrollment) -> Result<(), SequenceError> {
        set_status(enrollment, EnrollmentStatus::Paused, EnrollmentStatus::Active)
    }

    /// Ends an enrollment that a newer one replaces. Step statuses are kept
    /// as they were.
    pub fn supersede(
        &self,
        enrollment: &mut Enrollment,
        now: DateTime<Utc>,
    ) -> Result<(), SequenceError> {
        if enrollment.status == EnrollmentStatus::Completed {
            return Err(SequenceError::InvalidEnrollmentTransition {
                from: enrollment.status,
                to: EnrollmentStatus::Completed,
            });
        }
        finish(enrollment, now);
        Ok(())
    }
}

fn ensure_active(enrollment: &Enrollment) -> Result<(), SequenceError> {
    if enrollment.status == EnrollmentStatus::Active {
        Ok(())
    } else {
        Err(SequenceError::EnrollmentNotActive { status: enrollment.status })
    }
}

fn set_status(
    enrollment: &mut Enrollment,
    from: EnrollmentStatus,
    to: EnrollmentStatus,
) -> Result<(), SequenceError> {
    if enrollment.status != from {
        return Err(SequenceError::InvalidEnrollmentTransition { from: enrollment.status, to });
    }
    enrollment.status = to;
    enrollment.version += 1;
    Ok(())
}

/// The step after `step_id`, when there is one, must not have run yet.
/// Checked before anything is mutated so a rejected transition leaves the
/// enrollment untouched.
fn ensure_next_pending(enrollment: &Enrollment, step_id: &StepId) -> Result<(), SequenceError> {
    let in_progress = enrollment
        .sequence
        .step(step_id)
        .filter(|step| step.status == StepStatus::InProgress)
        .map(|step| step.order);
    let Some(order) = in_progress else {
        return Ok(());
    };
    match enrollment.sequence.step_at(order + 1) {
        Some(next) if next.status != StepStatus::Pending => Err(SequenceError::NextStepNotPending {
            step_id: next.id.clone(),
            status: next.status,
        }),
        _ => Ok(()),
    }
}

/// Moves the step off `in_progress`. Only one caller can win this for a
/// given step; every later attempt sees a non-in-progress status.
fn leave_step(
    enrollment: &mut Enrollment,
    step_id: &StepId,
    status: StepStatus,
    response_received: bool,
    now: DateTime<Utc>,
) -> Result<u32, SequenceError> {
    ensure_active(enrollment)?;
    let step = enrollment
        .sequence
        .step_mut(step_id)
        .ok_or_else(|| SequenceError::StepNotFound(step_id.clone()))?;
    if step.status != StepStatus::InProgress {
        return Err(SequenceError::StepNotInProgress { step_id: step_id.clone(), status: step.status });
    }

    step.status = status;
    step.response_received = response_received;
    if status == StepStatus::Completed {
        step.completed_date = Some(now);
    }
    Ok(step.order)
}

fn advance(
    enrollment: &mut Enrollment,
    left_step: &StepId,
    left_order: u32,
    left_status: StepStatus,
    now: DateTime<Utc>,
) -> AdvanceOutcome {
    let next_order = left_order + 1;
    let mut outcome = AdvanceOutcome {
        left_step: left_step.clone(),
        left_order,
        left_status,
        next_step: None,
        current_step: enrollment.current_step,
        scheduled_date: None,
        next_action_at: None,
        sequence_complete: false,
        stopped_on_reply: false,
    };

    let Some(next) = enrollment.sequence.step_at_mut(next_order) else {
        finish(enrollment, now);
        outcome.current_step = enrollment.current_step;
        outcome.sequence_complete = true;
        return outcome;
    };

    next.status = StepStatus::InProgress;
    let wait = Duration::days(i64::from(next.wait_days));
    if next.step_type.is_wait() {
        next.scheduled_date = Some(now + wait);
    }
    let next_action_at = now + wait + Duration::hours(i64::from(next.delay_hours));

    outcome.next_step = Some(next.id.clone());
    outcome.scheduled_date = next.scheduled_date;
    outcome.next_action_at = Some(next_action_at);
    outcome.current_step = next_order;

    enrollment.current_step = next_order;
    enrollment.next_action_at = Some(next_action_at);
    enrollment.version += 1;
    outcome
}

fn finish(enrollment: &mut Enrollment, now: DateTime<Utc>) {
    enrollment.status = EnrollmentStatus::Completed;
    enrollment.completed_at = Some(now);
    enrollment.next_action_at = None;
    enrollment.version += 1;
}
