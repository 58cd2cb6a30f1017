use serde::Serialize;
use uuid::Uuid;

use crate::domain::message::MessageType;
use crate::domain::sequence::{Sequence, SequenceId, Step, StepId, StepType};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepTemplate {
    pub step_type: StepType,
    pub name: &'static str,
    pub wait_days: u32,
    pub message_type: MessageType,
}

/// A reusable list of steps that enrollments copy from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SequenceTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub steps: Vec<StepTemplate>,
}

impl SequenceTemplate {
    pub fn standard() -> Self {
        let step = |step_type: StepType,
                    name: &'static str,
                    wait_days: u32,
                    message_type: MessageType| StepTemplate {
            step_type,
            name,
            wait_days,
            message_type,
        };

        Self {
            key: "standard",
            name: "Standard Multi-Channel",
            steps: vec![
                step(StepType::LinkedinConnection, "LinkedIn Connection", 0, MessageType::Initial),
                step(StepType::ColdEmail, "Initial Email", 2, MessageType::Initial),
                step(StepType::LinkedinInmail, "LinkedIn InMail", 3, MessageType::FollowUp1),
                step(StepType::ColdCall, "Cold Call", 2, MessageType::Initial),
                step(StepType::Voicemail, "Voicemail", 0, MessageType::Initial),
                step(StepType::FollowUpEmail, "Follow-up Email", 3, MessageType::FollowUp2),
            ],
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::standard()]
    }

    pub fn find(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        Self::all().into_iter().find(|template| template.key == key)
    }

    /// Fresh sequence with new step ids and orders `0..n`.
    pub fn instantiate(&self) -> Sequence {
        let mut sequence =
            Sequence::new(SequenceId(Uuid::new_v4().to_string()), self.name.to_string());
        for template in &self.steps {
            let step = Step::new(StepId(Uuid::new_v4().to_string()), template.step_type)
                .with_name(template.name)
                .with_wait_days(template.wait_days)
                .with_message_type(template.message_type);
            sequence.insert_step(None, step);
        }
        sequence
    }
}
