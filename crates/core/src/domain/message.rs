use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::prospect::ProspectId;
use crate::domain::sequence::StepId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Linkedin,
    LinkedinInmail,
    LinkedinConnection,
    Phone,
}

/// Drafting constraints handed to the message provider for one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelGuidelines {
    pub max_words: u32,
    pub include_subject: bool,
    pub style: &'static str,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Self::Email,
        Self::Linkedin,
        Self::LinkedinInmail,
        Self::LinkedinConnection,
        Self::Phone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Linkedin => "linkedin",
            Self::LinkedinInmail => "linkedin_inmail",
            Self::LinkedinConnection => "linkedin_connection",
            Self::Phone => "phone",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|channel| channel.as_str() == normalized)
    }

    pub fn guidelines(&self) -> ChannelGuidelines {
        match self {
            Self::Email => ChannelGuidelines {
                max_words: 150,
                include_subject: true,
                style: "Professional but conversational. Short paragraphs. Clear CTA.",
            },
            Self::Linkedin => ChannelGuidelines {
                max_words: 300,
                include_subject: false,
                style: "Casual and friendly. Like messaging a colleague. No formal salutations.",
            },
            Self::LinkedinInmail => ChannelGuidelines {
                max_words: 200,
                include_subject: true,
                style: "Professional but personal. Reference their profile/activity.",
            },
            Self::LinkedinConnection => ChannelGuidelines {
                max_words: 100,
                include_subject: false,
                style: "Very brief. Just explain why you're connecting.",
            },
            Self::Phone => ChannelGuidelines {
                max_words: 100,
                include_subject: false,
                style: "Talking points and key questions to ask.",
            },
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Initial,
    FollowUp1,
    FollowUp2,
    Breakup,
}

impl MessageType {
    pub const ALL: [MessageType; 4] =
        [Self::Initial, Self::FollowUp1, Self::FollowUp2, Self::Breakup];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::FollowUp1 => "follow_up_1",
            Self::FollowUp2 => "follow_up_2",
            Self::Breakup => "breakup",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| kind.as_str() == normalized)
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            Self::Initial => {
                "First touch. Focus on providing value and sparking curiosity. Don't be pushy."
            }
            Self::FollowUp1 => "Gentle follow-up. Provide additional value or a different angle.",
            Self::FollowUp2 => {
                "Try a different approach. Maybe share a relevant case study or insight."
            }
            Self::Breakup => {
                "Final attempt. Create urgency but be respectful. Offer to reconnect later."
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Draft,
    ReadyForReview,
    Approved,
    Sent,
    Delivered,
    Opened,
    Clicked,
    Replied,
    Bounced,
    Rejected,
}

/// Provider output for one drafted message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedMessage {
    pub subject: Option<String>,
    pub content: String,
    pub hook: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRecord {
    pub field: String,
    pub edited_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub prospect_id: ProspectId,
    pub sequence_step_id: Option<StepId>,
    pub channel: Channel,
    pub message_type: MessageType,
    pub subject: Option<String>,
    pub content: String,
    pub hook: Option<String>,
    pub status: MessageStatus,
    pub generation_context: Option<serde_json::Value>,
    pub edit_history: Vec<EditRecord>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn from_generated(
        id: MessageId,
        prospect_id: ProspectId,
        channel: Channel,
        message_type: MessageType,
        generated: GeneratedMessage,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            prospect_id,
            sequence_step_id: None,
            channel,
            message_type,
            subject: generated.subject,
            content: generated.content,
            hook: Some(generated.hook).filter(|hook| !hook.is_empty()),
            status: MessageStatus::ReadyForReview,
            generation_context: None,
            edit_history: Vec::new(),
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn replace_content(&mut self, generated: GeneratedMessage, now: DateTime<Utc>) {
        self.subject = generated.subject;
        self.content = generated.content;
        self.hook = Some(generated.hook).filter(|hook| !hook.is_empty());
        self.status = MessageStatus::ReadyForReview;
        self.updated_at = now;
    }

    pub fn approve(&mut self, now: DateTime<Utc>) {
        self.status = MessageStatus::Approved;
        self.updated_at = now;
    }

    pub fn reject(&mut self, now: DateTime<Utc>) {
        self.status = MessageStatus::Rejected;
        self.updated_at = now;
    }

    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.status = MessageStatus::Sent;
        self.sent_at = Some(now);
        self.updated_at = now;
    }

    /// Content edits are recorded in the edit history; other fields are not.
    pub fn apply_patch(&mut self, patch: MessagePatch, now: DateTime<Utc>) {
        if let Some(content) = patch.content {
            self.content = content;
            self.edit_history.push(EditRecord { field: "content".to_string(), edited_at: now });
        }
        if let Some(subject) = patch.subject {
            self.subject = Some(subject);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub subject: Option<String>,
    pub status: Option<MessageStatus>,
}
