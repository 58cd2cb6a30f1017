//! Research, rescoring and drafting for a single prospect.
//!
//! A generation run moves the prospect to `researching` before calling the
//! providers. Any failure after that point, including the run exceeding the
//! configured timeout, puts the prospect back to the status it had before
//! the run and returns the error. Drafts are only persisted once every
//! provider call has succeeded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use outbound_core::config::{GenerationConfig, LlmConfig};
use outbound_core::domain::icp::IcpConfig;
use outbound_core::domain::message::{Channel, GeneratedMessage, Message, MessageId, MessageType};
use outbound_core::domain::prospect::{Prospect, ProspectId, ProspectStatus, ResearchReport};
use outbound_core::domain::sequence::{EnrollmentId, StepStatus};
use outbound_core::errors::{ApplicationError, GenerationError};
use outbound_core::scoring::{ActiveConfigStore, IcpScorer, ScoreBreakdown};
use outbound_db::{MessageRepository, ProspectRepository, SequenceService};

use crate::messages::MessageProvider;
use crate::prompts::ProspectSummary;
use crate::research::ResearchProvider;

pub const NO_ICP_CONFIGURED: &str = "No ICP configuration found";

/// Channels and message types to draft; `None` falls back to the
/// `generation` config section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub channels: Option<Vec<Channel>>,
    pub message_types: Option<Vec<MessageType>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationOutcome {
    pub prospect_id: ProspectId,
    pub research: ResearchReport,
    pub breakdown: ScoreBreakdown,
    pub messages: Vec<Message>,
}

pub struct GenerationWorkflow {
    prospects: Arc<dyn ProspectRepository>,
    messages: Arc<dyn MessageRepository>,
    sequences: SequenceService,
    configs: ActiveConfigStore,
    research: Arc<dyn ResearchProvider>,
    writer: Arc<dyn MessageProvider>,
    llm: LlmConfig,
    generation: GenerationConfig,
    timeout: Duration,
}

impl GenerationWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prospects: Arc<dyn ProspectRepository>,
        messages: Arc<dyn MessageRepository>,
        sequences: SequenceService,
        configs: ActiveConfigStore,
        research: Arc<dyn ResearchProvider>,
        writer: Arc<dyn MessageProvider>,
        llm: LlmConfig,
        generation: GenerationConfig,
    ) -> Self {
        let timeout = Duration::from_secs(generation.timeout_secs);
        Self { prospects, messages, sequences, configs, research, writer, llm, generation, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn generate(
        &self,
        prospect_id: &ProspectId,
        request: GenerationRequest,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<GenerationOutcome, ApplicationError> {
        let mut prospect = self.load_prospect(prospect_id).await?;
        let icp = self.preflight()?;

        let prior_status = prospect.status;
        prospect.status = ProspectStatus::Researching;
        prospect.updated_at = now;
        self.prospects.save(prospect.clone()).await?;
        info!(
            event_name = "generation.started",
            correlation_id = %correlation_id,
            prospect_id = %prospect_id,
            prior_status = prior_status.as_str(),
            "generation run started"
        );

        let channels = request.channels.unwrap_or_else(|| self.generation.channels.clone());
        let message_types =
            request.message_types.unwrap_or_else(|| self.generation.message_types.clone());
        let run = self.run(prospect.clone(), &icp, &channels, &message_types, now);

        match self.bounded(run).await {
            Ok(outcome) => {
                info!(
                    event_name = "generation.completed",
                    correlation_id = %correlation_id,
                    prospect_id = %prospect_id,
                    total_score = outcome.breakdown.total_score,
                    messages = outcome.messages.len(),
                    "generation run completed"
                );
                Ok(outcome)
            }
            Err(error) => {
                prospect.status = prior_status;
                prospect.updated_at = now;
                // The generation error is what the caller needs, even when the
                // rollback itself fails.
                match self.prospects.save(prospect).await {
                    Ok(()) => warn!(
                        event_name = "generation.rollback",
                        correlation_id = %correlation_id,
                        prospect_id = %prospect_id,
                        restored_status = prior_status.as_str(),
                        error = %error,
                        "generation failed, prospect status restored"
                    ),
                    Err(rollback_error) => error!(
                        event_name = "generation.rollback_failed",
                        correlation_id = %correlation_id,
                        prospect_id = %prospect_id,
                        restored_status = prior_status.as_str(),
                        error = %error,
                        rollback_error = %rollback_error,
                        "generation failed and the prospect status could not be restored"
                    ),
                }
                Err(error)
            }
        }
    }

    /// Redrafts one message in place from the prospect's stored research.
    pub async fn regenerate_message(
        &self,
        message_id: &MessageId,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<Message, ApplicationError> {
        let mut message = self
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("message", message_id.0.clone()))?;
        let prospect = self.load_prospect(&message.prospect_id).await?;
        let icp = self.preflight()?;

        let draft = self
            .bounded(self.draft(&prospect, &icp, message.channel, message.message_type))
            .await?;
        message.replace_content(draft, now);
        self.messages.save(message.clone()).await?;
        info!(
            event_name = "generation.message.regenerated",
            correlation_id = %correlation_id,
            prospect_id = %message.prospect_id,
            message_id = %message_id,
            "message regenerated"
        );
        Ok(message)
    }

    /// Drafts one message for every channel-bearing step of the enrollment
    /// that has not been completed or skipped yet.
    pub async fn draft_sequence_messages(
        &self,
        enrollment_id: &EnrollmentId,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<Vec<Message>, ApplicationError> {
        let enrollment = self.sequences.get(enrollment_id).await?;
        let prospect = self.load_prospect(&enrollment.prospect_id).await?;
        let icp = self.preflight()?;

        let open_steps = enrollment
            .sequence
            .ordered_steps()
            .into_iter()
            .filter(|step| matches!(step.status, StepStatus::Pending | StepStatus::InProgress))
            .filter_map(|step| step.step_type.channel().map(|channel| (step.clone(), channel)))
            .collect::<Vec<_>>();

        let drafting = async {
            let mut drafts = Vec::with_capacity(open_steps.len());
            for (step, channel) in &open_steps {
                let generated = self.draft(&prospect, &icp, *channel, step.message_type).await?;
                let mut message = self.new_message(&prospect, *channel, step.message_type, generated, now);
                message.sequence_step_id = Some(step.id.clone());
                drafts.push(message);
            }
            Ok::<_, ApplicationError>(drafts)
        };
        let drafts = self.bounded(drafting).await?;

        for message in &drafts {
            self.messages.save(message.clone()).await?;
        }
        info!(
            event_name = "generation.sequence.drafted",
            correlation_id = %correlation_id,
            prospect_id = %prospect.id,
            enrollment_id = %enrollment_id,
            messages = drafts.len(),
            "sequence messages drafted"
        );
        Ok(drafts)
    }

    async fn run(
        &self,
        mut prospect: Prospect,
        icp: &IcpConfig,
        channels: &[Channel],
        message_types: &[MessageType],
        now: DateTime<Utc>,
    ) -> Result<GenerationOutcome, ApplicationError> {
        let context = icp.to_prompt_context();
        let report = self.research.research(&ProspectSummary::from(&prospect), &context).await?;
        prospect.record_research(report.clone(), now);

        let breakdown = IcpScorer::new(Some(icp.clone())).score_prospect(&prospect);
        prospect.apply_score(&breakdown);

        let mut drafts = Vec::with_capacity(channels.len() * message_types.len());
        for channel in channels {
            for message_type in message_types {
                let generated = self.draft(&prospect, icp, *channel, *message_type).await?;
                drafts.push(self.new_message(&prospect, *channel, *message_type, generated, now));
            }
        }

        for message in &drafts {
            self.messages.save(message.clone()).await?;
        }
        prospect.status = ProspectStatus::ReadyForReview;
        prospect.updated_at = now;
        self.prospects.save(prospect.clone()).await?;

        Ok(GenerationOutcome { prospect_id: prospect.id, research: report, breakdown, messages: drafts })
    }

    async fn draft(
        &self,
        prospect: &Prospect,
        icp: &IcpConfig,
        channel: Channel,
        message_type: MessageType,
    ) -> Result<GeneratedMessage, ApplicationError> {
        Ok(self
            .writer
            .generate(
                &ProspectSummary::from(prospect),
                prospect.research.as_ref(),
                &icp.to_prompt_context(),
                channel,
                message_type,
            )
            .await?)
    }

    fn new_message(
        &self,
        prospect: &Prospect,
        channel: Channel,
        message_type: MessageType,
        generated: GeneratedMessage,
        now: DateTime<Utc>,
    ) -> Message {
        let mut message = Message::from_generated(
            MessageId(Uuid::new_v4().to_string()),
            prospect.id.clone(),
            channel,
            message_type,
            generated,
            now,
        );
        message.generation_context = Some(json!({
            "model": self.llm.model,
            "research_summary": prospect.research_summary,
            "icp_score": prospect.icp_score,
        }));
        message
    }

    fn preflight(&self) -> Result<IcpConfig, ApplicationError> {
        let icp = self
            .configs
            .active()
            .ok_or_else(|| ApplicationError::Configuration(NO_ICP_CONFIGURED.to_string()))?;
        self.llm.ensure_credentials().map_err(ApplicationError::Configuration)?;
        Ok(icp)
    }

    async fn load_prospect(&self, id: &ProspectId) -> Result<Prospect, ApplicationError> {
        self.prospects
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("prospect", id.0.clone()))
    }

    async fn bounded<T, F>(&self, work: F) -> Result<T, ApplicationError>
    where
        F: Future<Output = Result<T, ApplicationError>>,
    {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout { seconds: self.timeout.as_secs() }.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use secrecy::SecretString;

    use outbound_core::config::AppConfig;
    use outbound_core::domain::icp::{IcpConfig, IcpConfigId, IcpPromptContext};
    use outbound_core::domain::message::{Channel, GeneratedMessage, MessageStatus, MessageType};
    use outbound_core::domain::prospect::{
        IcpSignals, Prospect, ProspectId, ProspectStatus, ResearchReport,
    };
    use outbound_core::domain::sequence::{Sequence, SequenceId, Step, StepId, StepType};
    use outbound_core::errors::{ApplicationError, GenerationError};
    use outbound_core::scoring::ActiveConfigStore;
    use outbound_db::{
        InMemoryEnrollmentRepository, InMemoryMessageRepository, InMemoryProspectRepository,
        MessageRepository, ProspectRepository, RepositoryError, SequenceService,
    };

    use super::{GenerationRequest, GenerationWorkflow, NO_ICP_CONFIGURED};
    use crate::messages::MessageProvider;
    use crate::prompts::ProspectSummary;
    use crate::research::ResearchProvider;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 15, 0, 0).single().expect("timestamp")
    }

    enum ResearchBehavior {
        Report(ResearchReport),
        Fail,
        Hang,
    }

    struct StubResearch(ResearchBehavior);

    #[async_trait]
    impl ResearchProvider for StubResearch {
        async fn research(
            &self,
            _prospect: &ProspectSummary,
            _icp: &IcpPromptContext,
        ) -> Result<ResearchReport, GenerationError> {
            match &self.0 {
                ResearchBehavior::Report(report) => Ok(report.clone()),
                ResearchBehavior::Fail => Err(GenerationError::Parse("not json".to_string())),
                ResearchBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(GenerationError::EmptyResponse)
                }
            }
        }
    }

    struct StubWriter;

    #[async_trait]
    impl MessageProvider for StubWriter {
        async fn generate(
            &self,
            prospect: &ProspectSummary,
            research: Option<&ResearchReport>,
            _icp: &IcpPromptContext,
            channel: Channel,
            message_type: MessageType,
        ) -> Result<GeneratedMessage, GenerationError> {
            Ok(GeneratedMessage {
                subject: channel.guidelines().include_subject.then(|| "Quick idea".to_string()),
                content: format!(
                    "Hi {}, {} via {}",
                    prospect.first_name,
                    message_type.as_str(),
                    channel.as_str()
                ),
                hook: research
                    .and_then(|report| report.personalization_hooks.first().cloned())
                    .unwrap_or_default(),
            })
        }
    }

    struct Fixture {
        workflow: GenerationWorkflow,
        prospects: Arc<InMemoryProspectRepository>,
        messages: Arc<InMemoryMessageRepository>,
        sequences: SequenceService,
        prospect_id: ProspectId,
    }

    fn icp() -> IcpConfig {
        let mut config = IcpConfig::new(IcpConfigId("icp-1".to_string()), "Platform");
        config.target_titles = vec!["VP of Engineering".to_string()];
        config.positive_signals = vec!["hiring".to_string()];
        config.trigger_events = vec!["series b".to_string()];
        config
    }

    fn report() -> ResearchReport {
        ResearchReport {
            summary: "Leads a growing platform group.".to_string(),
            personalization_hooks: vec!["Announced Series B last month".to_string()],
            icp_signals_found: IcpSignals {
                positive_signals: vec!["Actively hiring SREs".to_string()],
                ..IcpSignals::default()
            },
            ..ResearchReport::default()
        }
    }

    async fn fixture(research: ResearchBehavior, configs: ActiveConfigStore, with_key: bool) -> Fixture {
        let prospects = Arc::new(InMemoryProspectRepository::default());
        let messages = Arc::new(InMemoryMessageRepository::default());
        let enrollments = Arc::new(InMemoryEnrollmentRepository::default());
        let sequences = SequenceService::new(enrollments, prospects.clone());

        let prospect_id = ProspectId("P-1".to_string());
        let mut prospect = Prospect::new(prospect_id.clone(), "Ada Park", now());
        prospect.title = Some("VP of Engineering".to_string());
        prospect.status = ProspectStatus::New;
        prospects.save(prospect).await.expect("seed prospect");

        let config = AppConfig::default();
        let mut llm = config.llm.clone();
        llm.api_key = with_key.then(|| SecretString::from("sk-test".to_string()));

        let workflow = GenerationWorkflow::new(
            prospects.clone(),
            messages.clone(),
            sequences.clone(),
            configs,
            Arc::new(StubResearch(research)),
            Arc::new(StubWriter),
            llm,
            config.generation.clone(),
        )
        .with_timeout(Duration::from_millis(200));
        Fixture { workflow, prospects, messages, sequences, prospect_id }
    }

    fn configured() -> ActiveConfigStore {
        ActiveConfigStore::with_config(icp()).expect("store")
    }

    async fn status(fixture: &Fixture) -> ProspectStatus {
        fixture
            .prospects
            .find_by_id(&fixture.prospect_id)
            .await
            .expect("find")
            .map(|prospect| prospect.status)
            .expect("prospect")
    }

    #[tokio::test]
    async fn successful_run_rescores_and_drafts_every_combination() {
        let fixture = fixture(ResearchBehavior::Report(report()), configured(), true).await;
        let request = GenerationRequest {
            channels: Some(vec![Channel::Email, Channel::Linkedin]),
            message_types: Some(vec![MessageType::Initial, MessageType::FollowUp1]),
        };

        let outcome = fixture
            .workflow
            .generate(&fixture.prospect_id, request, now(), "corr")
            .await
            .expect("generate");

        assert_eq!(outcome.messages.len(), 4);
        assert!(outcome.messages.iter().all(|message| message.status == MessageStatus::ReadyForReview));
        assert_eq!(outcome.messages[0].hook.as_deref(), Some("Announced Series B last month"));
        assert_eq!(status(&fixture).await, ProspectStatus::ReadyForReview);

        let stored = fixture.prospects.find_by_id(&fixture.prospect_id).await.expect("find").expect("prospect");
        assert_eq!(stored.research_summary.as_deref(), Some("Leads a growing platform group."));
        assert_eq!(stored.icp_score, outcome.breakdown.total_score);
        // Research signals lift the score above the title-only 58.
        assert!(outcome.breakdown.total_score > 58);
        assert_eq!(
            fixture.messages.list_for_prospect(&fixture.prospect_id).await.expect("list").len(),
            4
        );
    }

    #[tokio::test]
    async fn provider_failure_restores_prior_status() {
        let fixture = fixture(ResearchBehavior::Fail, configured(), true).await;

        let error = fixture
            .workflow
            .generate(&fixture.prospect_id, GenerationRequest::default(), now(), "corr")
            .await
            .expect_err("research fails");
        assert_eq!(error, ApplicationError::Generation(GenerationError::Parse("not json".to_string())));
        assert_eq!(status(&fixture).await, ProspectStatus::New);
        assert!(fixture.messages.list_for_prospect(&fixture.prospect_id).await.expect("list").is_empty());
    }

    /// Accepts the first `allowed` saves, then reports a storage failure.
    struct FailingSaves {
        inner: InMemoryProspectRepository,
        allowed: usize,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl ProspectRepository for FailingSaves {
        async fn find_by_id(&self, id: &ProspectId) -> Result<Option<Prospect>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn list(&self) -> Result<Vec<Prospect>, RepositoryError> {
            self.inner.list().await
        }

        async fn list_by_status(
            &self,
            status: ProspectStatus,
        ) -> Result<Vec<Prospect>, RepositoryError> {
            self.inner.list_by_status(status).await
        }

        async fn save(&self, prospect: Prospect) -> Result<(), RepositoryError> {
            if self.saves.fetch_add(1, Ordering::SeqCst) >= self.allowed {
                return Err(RepositoryError::Storage("disk full".to_string()));
            }
            self.inner.save(prospect).await
        }
    }

    #[tokio::test]
    async fn failed_rollback_still_reports_the_generation_error() {
        let inner = InMemoryProspectRepository::default();
        let prospect_id = ProspectId("P-1".to_string());
        inner.save(Prospect::new(prospect_id.clone(), "Ada Park", now())).await.expect("seed");
        let prospects = Arc::new(FailingSaves { inner, allowed: 1, saves: AtomicUsize::new(0) });
        let sequences = SequenceService::new(
            Arc::new(InMemoryEnrollmentRepository::default()),
            prospects.clone(),
        );

        let config = AppConfig::default();
        let mut llm = config.llm.clone();
        llm.api_key = Some(SecretString::from("sk-test".to_string()));
        let workflow = GenerationWorkflow::new(
            prospects.clone(),
            Arc::new(InMemoryMessageRepository::default()),
            sequences,
            configured(),
            Arc::new(StubResearch(ResearchBehavior::Fail)),
            Arc::new(StubWriter),
            llm,
            config.generation.clone(),
        );

        let error = workflow
            .generate(&prospect_id, GenerationRequest::default(), now(), "corr")
            .await
            .expect_err("research fails");
        assert_eq!(error, ApplicationError::Generation(GenerationError::Parse("not json".to_string())));
        assert_eq!(prospects.saves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn timeout_restores_prior_status() {
        let fixture = fixture(ResearchBehavior::Hang, configured(), true).await;

        let error = fixture
            .workflow
            .generate(&fixture.prospect_id, GenerationRequest::default(), now(), "corr")
            .await
            .expect_err("times out");
        assert!(matches!(error, ApplicationError::Generation(GenerationError::Timeout { .. })));
        assert_eq!(status(&fixture).await, ProspectStatus::New);
    }

    #[tokio::test]
    async fn missing_icp_or_credentials_fail_before_any_change() {
        let fixture = fixture(ResearchBehavior::Report(report()), ActiveConfigStore::new(), true).await;
        let error = fixture
            .workflow
            .generate(&fixture.prospect_id, GenerationRequest::default(), now(), "corr")
            .await
            .expect_err("no icp");
        assert_eq!(error, ApplicationError::Configuration(NO_ICP_CONFIGURED.to_string()));
        assert_eq!(status(&fixture).await, ProspectStatus::New);

        let fixture = self::fixture(ResearchBehavior::Report(report()), configured(), false).await;
        let error = fixture
            .workflow
            .generate(&fixture.prospect_id, GenerationRequest::default(), now(), "corr")
            .await
            .expect_err("no key");
        assert!(matches!(error, ApplicationError::Configuration(_)));

        let error = fixture
            .workflow
            .generate(&ProspectId("missing".to_string()), GenerationRequest::default(), now(), "corr")
            .await
            .expect_err("no prospect");
        assert!(matches!(error, ApplicationError::NotFound { entity: "prospect", .. }));
    }

    #[tokio::test]
    async fn regenerating_replaces_content_in_place() {
        let fixture = fixture(ResearchBehavior::Report(report()), configured(), true).await;
        let outcome = fixture
            .workflow
            .generate(&fixture.prospect_id, GenerationRequest::default(), now(), "corr")
            .await
            .expect("generate");
        let original = outcome.messages[0].clone();

        let regenerated = fixture
            .workflow
            .regenerate_message(&original.id, now(), "corr")
            .await
            .expect("regenerate");
        assert_eq!(regenerated.id, original.id);
        assert_eq!(regenerated.status, MessageStatus::ReadyForReview);
        assert_eq!(regenerated.content, original.content);
    }

    #[tokio::test]
    async fn sequence_drafts_cover_open_channel_steps() {
        let fixture = fixture(ResearchBehavior::Report(report()), configured(), true).await;
        let mut sequence = Sequence::new(SequenceId("seq".to_string()), "Mixed");
        sequence.insert_step(None, Step::new(StepId("connect".to_string()), StepType::LinkedinConnection));
        sequence.insert_step(None, Step::new(StepId("wait".to_string()), StepType::Wait).with_wait_days(2));
        sequence.insert_step(None, Step::new(StepId("email".to_string()), StepType::ColdEmail));
        let enrollment = fixture
            .sequences
            .enroll(&fixture.prospect_id, sequence, now())
            .await
            .expect("enroll");

        let drafts = fixture
            .workflow
            .draft_sequence_messages(&enrollment.id, now(), "corr")
            .await
            .expect("draft");
        let steps = drafts
            .iter()
            .map(|message| message.sequence_step_id.as_ref().map(|id| id.0.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(steps, vec![Some("connect"), Some("email")]);
        assert_eq!(drafts[0].channel, Channel::LinkedinConnection);
        assert_eq!(drafts[1].channel, Channel::Email);
    }
}
