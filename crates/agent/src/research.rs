use std::sync::Arc;

use async_trait::async_trait;

use outbound_core::domain::icp::IcpPromptContext;
use outbound_core::domain::prospect::ResearchReport;
use outbound_core::errors::GenerationError;

use crate::llm::LlmClient;
use crate::prompts::{PromptRenderer, ProspectSummary};
use crate::response::json_payload;

#[async_trait]
pub trait ResearchProvider: Send + Sync {
    async fn research(
        &self,
        prospect: &ProspectSummary,
        icp: &IcpPromptContext,
    ) -> Result<ResearchReport, GenerationError>;
}

pub struct LlmResearchProvider {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptRenderer>,
}

impl LlmResearchProvider {
    pub fn new(client: Arc<dyn LlmClient>, prompts: Arc<PromptRenderer>) -> Self {
        Self { client, prompts }
    }
}

#[async_trait]
impl ResearchProvider for LlmResearchProvider {
    async fn research(
        &self,
        prospect: &ProspectSummary,
        icp: &IcpPromptContext,
    ) -> Result<ResearchReport, GenerationError> {
        let prompt = self.prompts.research(prospect, icp)?;
        let reply = self.client.complete(&prompt).await?;
        parse_research(&reply)
    }
}

/// Missing fields take their defaults; anything that is not a JSON object
/// is a parse failure.
pub fn parse_research(reply: &str) -> Result<ResearchReport, GenerationError> {
    serde_json::from_str(json_payload(reply))
        .map_err(|error| GenerationError::Parse(format!("research report: {error}")))
}
