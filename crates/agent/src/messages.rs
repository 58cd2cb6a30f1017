use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use outbound_core::domain::icp::IcpPromptContext;
use outbound_core::domain::message::{Channel, GeneratedMessage, MessageType};
use outbound_core::domain::prospect::ResearchReport;
use outbound_core::errors::GenerationError;

use crate::llm::LlmClient;
use crate::prompts::{PromptRenderer, ProspectSummary};
use crate::response::json_payload;

#[async_trait]
pub trait MessageProvider: Send + Sync {
    async fn generate(
        &self,
        prospect: &ProspectSummary,
        research: Option<&ResearchReport>,
        icp: &IcpPromptContext,
        channel: Channel,
        message_type: MessageType,
    ) -> Result<GeneratedMessage, GenerationError>;
}

pub struct LlmMessageProvider {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptRenderer>,
}

impl LlmMessageProvider {
    pub fn new(client: Arc<dyn LlmClient>, prompts: Arc<PromptRenderer>) -> Self {
        Self { client, prompts }
    }
}

#[async_trait]
impl MessageProvider for LlmMessageProvider {
    async fn generate(
        &self,
        prospect: &ProspectSummary,
        research: Option<&ResearchReport>,
        icp: &IcpPromptContext,
        channel: Channel,
        message_type: MessageType,
    ) -> Result<GeneratedMessage, GenerationError> {
        let prompt = self.prompts.message(prospect, research, icp, channel, message_type)?;
        let reply = self.client.complete(&prompt).await?;
        Ok(parse_message(&reply))
    }
}

/// Never fails: a reply without a usable `content` (or `body`) string is
/// kept verbatim as the content with an empty hook.
pub fn parse_message(reply: &str) -> GeneratedMessage {
    let fallback = || GeneratedMessage { subject: None, content: reply.trim().to_string(), hook: String::new() };

    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(json_payload(reply)) else {
        return fallback();
    };
    let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);

    let Some(content) = text("content").or_else(|| text("body")) else {
        return fallback();
    };
    GeneratedMessage {
        subject: text("subject").filter(|subject| !subject.trim().is_empty()),
        content,
        hook: text("hook").unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use outbound_core::domain::icp::IcpPromptContext;
    use outbound_core::domain::message::{Channel, MessageType};
    use outbound_core::errors::GenerationError;

    use super::{parse_message, LlmMessageProvider, MessageProvider};
    use crate::llm::LlmClient;
    use crate::prompts::{PromptRenderer, ProspectSummary};

    struct Canned(&'static str);

    #[async_trait]
    impl LlmClient for Canned {
        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok(self.0.to_string())
        }
    }

    struct Down;

    #[async_trait]
    impl LlmClient for Down {
        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            Err(GenerationError::Transport("connection refused".to_string()))
        }
    }

    #[test]
    fn structured_reply_is_used_as_is() {
        let message = parse_message(
            "```json\n{\"subject\": \"Deploy pain\", \"content\": \"Hi Ada,\", \"hook\": \"Series B\"}\n```",
        );
        assert_eq!(message.subject.as_deref(), Some("Deploy pain"));
        assert_eq!(message.content, "Hi Ada,");
        assert_eq!(message.hook, "Series B");
    }

    #[test]
    fn body_key_is_read_as_content() {
        let message = parse_message("{\"body\": \"Quick note\", \"hook\": \"talk\"}");
        assert_eq!(message.content, "Quick note");
        assert_eq!(message.subject, None);
    }

    #[test]
    fn unstructured_reply_degrades_to_raw_content() {
        let message = parse_message("Hi Ada, congrats on the raise!\n");
        assert_eq!(message.content, "Hi Ada, congrats on the raise!");
        assert_eq!(message.hook, "");
        assert_eq!(message.subject, None);

        let no_content = parse_message("{\"hook\": \"x\"}");
        assert_eq!(no_content.content, "{\"hook\": \"x\"}");
        assert_eq!(no_content.hook, "");
    }

    #[tokio::test]
    async fn transport_failures_are_not_swallowed() {
        let provider = LlmMessageProvider::new(
            Arc::new(Down),
            Arc::new(PromptRenderer::new().expect("templates")),
        );
        let error = provider
            .generate(
                &ProspectSummary::default(),
                None,
                &IcpPromptContext::default(),
                Channel::Email,
                MessageType::Initial,
            )
            .await
            .expect_err("transport");
        assert!(matches!(error, GenerationError::Transport(_)));
    }

    #[tokio::test]
    async fn provider_parses_the_model_reply() {
        let provider = LlmMessageProvider::new(
            Arc::new(Canned("{\"content\": \"Hello\", \"hook\": \"webinar\"}")),
            Arc::new(PromptRenderer::new().expect("templates")),
        );
        let message = provider
            .generate(
                &ProspectSummary::default(),
                None,
                &IcpPromptContext::default(),
                Channel::Linkedin,
                MessageType::Initial,
            )
            .await
            .expect("generate");
        assert_eq!(message.content, "Hello");
        assert_eq!(message.hook, "webinar");
    }
}
