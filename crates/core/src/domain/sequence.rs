use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::message::{Channel, MessageType};
use crate::domain::prospect::ProspectId;
use crate::sequence::SequenceError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnrollmentId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    LinkedinConnection,
    LinkedinDm,
    LinkedinInmail,
    ColdEmail,
    FollowUpEmail,
    ColdCall,
    Voicemail,
    Wait,
    Task,
}

impl StepType {
    pub const ALL: [StepType; 9] = [
        Self::LinkedinConnection,
        Self::LinkedinDm,
        Self::LinkedinInmail,
        Self::ColdEmail,
        Self::FollowUpEmail,
        Self::ColdCall,
        Self::Voicemail,
        Self::Wait,
        Self::Task,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinkedinConnection => "linkedin_connection",
            Self::LinkedinDm => "linkedin_dm",
            Self::LinkedinInmail => "linkedin_inmail",
            Self::ColdEmail => "cold_email",
            Self::FollowUpEmail => "follow_up_email",
            Self::ColdCall => "cold_call",
            Self::Voicemail => "voicemail",
            Self::Wait => "wait",
            Self::Task => "task",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| kind.as_str() == normalized)
    }

    /// Outreach channel a step is drafted for; control steps have none.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Self::LinkedinConnection => Some(Channel::LinkedinConnection),
            Self::LinkedinDm => Some(Channel::Linkedin),
            Self::LinkedinInmail => Some(Channel::LinkedinInmail),
            Self::ColdEmail | Self::FollowUpEmail => Some(Channel::Email),
            Self::ColdCall | Self::Voicemail => Some(Channel::Phone),
            Self::Wait | Self::Task => None,
        }
    }

    pub fn is_wait(&self) -> bool {
        matches!(self, Self::Wait)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Paused,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub order: u32,
    pub step_type: StepType,
    pub name: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub notes: Option<String>,
    pub wait_days: u32,
    pub delay_hours: u32,
    pub message_type: MessageType,
    pub is_optional: bool,
    pub stop_on_reply: bool,
    pub status: StepStatus,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    pub response_received: bool,
}

impl Step {
    pub fn new(id: StepId, step_type: StepType) -> Self {
        Self {
            id,
            order: 0,
            step_type,
            name: None,
            subject: None,
            content: None,
            notes: None,
            wait_days: 0,
            delay_hours: 0,
            message_type: MessageType::Initial,
            is_optional: false,
            stop_on_reply: true,
            status: StepStatus::Pending,
            scheduled_date: None,
            completed_date: None,
            response_received: false,
        }
    }

    pub fn with_wait_days(mut self, wait_days: u32) -> Self {
        self.wait_days = wait_days;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn apply_patch(&mut self, patch: StepPatch) {
        if let Some(step_type) = patch.step_type {
            self.step_type = step_type;
        }
        if let Some(name) = patch.name {
            self.name = Some(name);
        }
        if let Some(subject) = patch.subject {
            self.subject = Some(subject);
        }
        if let Some(content) = patch.content {
            self.content = Some(content);
        }
        if let Some(notes) = patch.notes {
            self.notes = Some(notes);
        }
        if let Some(wait_days) = patch.wait_days {
            self.wait_days = wait_days;
        }
        if let Some(delay_hours) = patch.delay_hours {
            self.delay_hours = delay_hours;
        }
        if let Some(message_type) = patch.message_type {
            self.message_type = message_type;
        }
        if let Some(stop_on_reply) = patch.stop_on_reply {
            self.stop_on_reply = stop_on_reply;
        }
    }
}

/// Editable step fields. Order and status are owned by reordering and the
/// sequence engine respectively, so they are not patchable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepPatch {
    pub step_type: Option<StepType>,
    pub name: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    pub notes: Option<String>,
    pub wait_days: Option<u32>,
    pub delay_hours: Option<u32>,
    pub message_type: Option<MessageType>,
    pub stop_on_reply: Option<bool>,
}

/// An ordered list of steps. Orders are expected to be contiguous from zero;
/// the editing operations below keep them that way.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub id: SequenceId,
    pub name: String,
    pub steps: Vec<Step>,
}

impl Sequence {
    pub fn new(id: SequenceId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), steps: Vec::new() }
    }

    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|step| &step.id == id)
    }

    pub fn step_mut(&mut self, id: &StepId) -> Option<&mut Step> {
        self.steps.iter_mut().find(|step| &step.id == id)
    }

    pub fn step_at(&self, order: u32) -> Option<&Step> {
        self.steps.iter().find(|step| step.order == order)
    }

    pub fn step_at_mut(&mut self, order: u32) -> Option<&mut Step> {
        self.steps.iter_mut().find(|step| step.order == order)
    }

    pub fn ordered_steps(&self) -> Vec<&Step> {
        let mut steps = self.steps.iter().collect::<Vec<_>>();
        steps.sort_by_key(|step| step.order);
        steps
    }

    pub fn first_order(&self) -> Option<u32> {
        self.steps.iter().map(|step| step.order).min()
    }

    /// Inserts `step` at `position`, shifting every step at or after it up by
    /// one. Without a position the step is appended. Returns the assigned order.
    pub fn insert_step(&mut self, position: Option<u32>, mut step: Step) -> u32 {
        let len = self.steps.len() as u32;
        let order = position.map(|position| position.min(len)).unwrap_or(len);

        for existing in self.steps.iter_mut().filter(|existing| existing.order >= order) {
            existing.order += 1;
        }

        step.order = order;
        self.steps.push(step);
        order
    }

    /// Removes a step and shifts every later step down by one.
    pub fn delete_step(&mut self, id: &StepId) -> Result<Step, SequenceError> {
        let index = self
            .steps
            .iter()
            .position(|step| &step.id == id)
            .ok_or_else(|| SequenceError::StepNotFound(id.clone()))?;
        let removed = self.steps.remove(index);

        for step in self.steps.iter_mut().filter(|step| step.order > removed.order) {
            step.order -= 1;
        }

        Ok(removed)
    }

    /// Assigns orders `0..n` following `step_ids`, which must name every step
    /// exactly once.
    pub fn reorder(&mut self, step_ids: &[StepId]) -> Result<(), SequenceError> {
        let mut seen = std::collections::BTreeSet::new();
        let covers_all = step_ids.len() == self.steps.len()
            && step_ids.iter().all(|id| seen.insert(id) && self.step(id).is_some());
        if !covers_all {
            return Err(SequenceError::ReorderMismatch {
                expected: self.steps.len(),
                received: step_ids.len(),
            });
        }

        for (order, id) in step_ids.iter().enumerate() {
            if let Some(step) = self.step_mut(id) {
                step.order = order as u32;
            }
        }
        Ok(())
    }

    pub fn update_step(&mut self, id: &StepId, patch: StepPatch) -> Result<(), SequenceError> {
        let step = self.step_mut(id).ok_or_else(|| SequenceError::StepNotFound(id.clone()))?;
        step.apply_patch(patch);
        Ok(())
    }
}

/// One prospect's run through its own instance of a sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub prospect_id: ProspectId,
    pub sequence: Sequence,
    pub current_step: u32,
    pub status: EnrollmentStatus,
    pub started_at: DateTime<Utc>,
    pub next_action_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Bumped on every state change; repositories compare it on save.
    pub version: u64,
}

impl Enrollment {
    /// Starts the run: the first step goes in progress, all others wait.
    pub fn start(
        id: EnrollmentId,
        prospect_id: ProspectId,
        mut sequence: Sequence,
        now: DateTime<Utc>,
    ) -> Result<Self, SequenceError> {
        let first_order = sequence.first_order().ok_or(SequenceError::EmptySequence)?;

        for step in &mut sequence.steps {
            step.status = StepStatus::Pending;
            step.scheduled_date = None;
            step.completed_date = None;
            step.response_received = false;
        }
        if let Some(first) = sequence.step_at_mut(first_order) {
            first.status = StepStatus::InProgress;
            if first.step_type.is_wait() {
                first.scheduled_date = Some(now + chrono::Duration::days(i64::from(first.wait_days)));
            }
        }

        Ok(Self {
            id,
            prospect_id,
            sequence,
            current_step: first_order,
            status: EnrollmentStatus::Active,
            started_at: now,
            next_action_at: Some(now),
            completed_at: None,
            notes: None,
            version: 1,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active
    }

    /// The step under the pointer, if it is still in progress.
    pub fn current(&self) -> Option<&Step> {
        self.sequence
            .step_at(self.current_step)
            .filter(|step| step.status == StepStatus::InProgress)
    }

    /// Steps can only be inserted after the pointer, so everything behind it
    /// stays settled and every new step still gets its turn.
    pub fn insert_step(&mut self, position: Option<u32>, step: Step) -> Result<u32, SequenceError> {
        self.ensure_open()?;
        if let Some(position) = position.filter(|position| *position <= self.current_step) {
            return Err(SequenceError::InsertBehindCurrentStep {
                position,
                current_step: self.current_step,
            });
        }

        let order = self.sequence.insert_step(position, step);
        self.version += 1;
        Ok(order)
    }

    pub fn delete_step(&mut self, id: &StepId) -> Result<Step, SequenceError> {
        self.ensure_open()?;
        let step = self.sequence.step(id).ok_or_else(|| SequenceError::StepNotFound(id.clone()))?;
        if step.status == StepStatus::InProgress {
            return Err(SequenceError::InProgressStepDeletion(id.clone()));
        }
        if self.sequence.steps.len() == 1 {
            return Err(SequenceError::EmptySequence);
        }

        let removed = self.sequence.delete_step(id)?;
        if removed.order < self.current_step {
            self.current_step -= 1;
        }
        self.version += 1;
        Ok(removed)
    }

    /// The pointer follows its step. Settled steps must stay before it and
    /// pending steps after it; any other arrangement is rejected untouched.
    pub fn reorder_steps(&mut self, step_ids: &[StepId]) -> Result<(), SequenceError> {
        self.ensure_open()?;
        let anchor = self.sequence.step_at(self.current_step).map(|step| step.id.clone());
        let mut reordered = self.sequence.clone();
        reordered.reorder(step_ids)?;

        let pointer = anchor
            .and_then(|id| reordered.step(&id).map(|step| step.order))
            .unwrap_or(self.current_step);
        let misplaced = reordered.steps.iter().find(|step| {
            let settled = matches!(step.status, StepStatus::Completed | StepStatus::Skipped);
            (step.order < pointer && !settled)
                || (step.order > pointer && step.status != StepStatus::Pending)
        });
        if let Some(step) = misplaced {
            return Err(SequenceError::ReorderAcrossCurrentStep {
                step_id: step.id.clone(),
                status: step.status,
            });
        }

        self.sequence = reordered;
        self.current_step = pointer;
        self.version += 1;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SequenceError> {
        if self.status == EnrollmentStatus::Completed {
            return Err(SequenceError::EnrollmentClosed);
        }
        Ok(())
    }

    pub fn update_step(&mut self, id: &StepId, patch: StepPatch) -> Result<(), SequenceError> {
        self.sequence.update_step(id, patch)?;
        self.version += 1;
        Ok(())
    }
}
