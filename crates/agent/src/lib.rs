//! LLM-backed research and drafting.
//!
//! `llm` talks to the model provider, `prompts` renders the research and
//! drafting prompts, `research` and `messages` turn replies into domain
//! values, and `generation` runs the full research → rescore → draft flow
//! against the repositories.
//!
//! The model never decides scores or workflow state. It supplies research
//! signals and draft text; scoring and status changes stay deterministic.

pub mod generation;
pub mod llm;
pub mod messages;
pub mod prompts;
pub mod research;
pub mod response;

pub use generation::{GenerationOutcome, GenerationRequest, GenerationWorkflow};
pub use llm::{client_from_config, AnthropicClient, LlmClient, OllamaClient, RetryingClient};
pub use messages::{LlmMessageProvider, MessageProvider};
pub use prompts::{PromptRenderer, ProspectSummary};
pub use research::{LlmResearchProvider, ResearchProvider};
