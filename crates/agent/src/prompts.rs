//! Prompt templates for the research and drafting calls.
//!
//! Templates are plain-text tera templates registered under `.txt` names so
//! no HTML escaping is applied. List values are joined in Rust before
//! rendering.

use serde::Serialize;
use tera::{Context, Tera};

use outbound_core::domain::icp::IcpPromptContext;
use outbound_core::domain::message::{Channel, MessageType};
use outbound_core::domain::prospect::{Prospect, ResearchReport};
use outbound_core::errors::GenerationError;

const RESEARCH_TEMPLATE: &str = "research.txt";
const MESSAGE_TEMPLATE: &str = "message.txt";

const RESEARCH_PROMPT: &str = r#"You are a sales research assistant. Research the following prospect and provide insights for cold outbound messaging.

PROSPECT INFORMATION:
- Name: {{ prospect.name }}
- Title: {{ prospect.title }}
- Company: {{ prospect.company }}
- LinkedIn: {{ prospect.linkedin_url }}
- Twitter: {{ prospect.twitter_url }}

ICP CONTEXT (What we're selling):
- Product: {{ product_name }}
- Description: {{ product_description }}
- Target Industries: {{ industries }}
- Pain Points We Solve: {{ pain_points }}
- Value Props: {{ value_props }}

Based on available public information, provide:

1. SUMMARY: A 2-3 sentence summary of who this person is and their likely priorities.
2. PERSONALIZATION HOOKS: 3-5 specific things we could reference to personalize outreach.
3. PAIN POINTS: What challenges might they face that our product solves?
4. ICP SIGNALS: How well does this prospect match our ICP? List positive and negative signals.
5. RECOMMENDED APPROACH: What angle is most likely to resonate?

Respond in JSON format:
{
    "summary": "...",
    "personalization_hooks": ["...", "..."],
    "likely_pain_points": ["...", "..."],
    "icp_signals_found": {
        "positive_signals": ["...", "..."],
        "negative_signals": ["...", "..."],
        "confidence_score": 0-100
    },
    "recommended_approach": "...",
    "talking_points": ["...", "..."],
    "questions_to_ask": ["...", "..."]
}"#;

const MESSAGE_PROMPT: &str = r#"You are an expert cold outbound copywriter. Write a {{ channel }} message for sales outreach.

PROSPECT:
- Name: {{ prospect.name }}
- First Name: {{ prospect.first_name }}
- Title: {{ prospect.title }}
- Company: {{ prospect.company }}

RESEARCH INSIGHTS:
{{ research }}

WHAT WE'RE SELLING:
- Product: {{ product_name }}
- Company: {{ product_company }}
- Description: {{ product_description }}

VALUE PROPOSITIONS:
{% for item in value_props %}- {{ item }}
{% endfor %}
PAIN POINTS WE ADDRESS:
{% for item in pain_points %}- {{ item }}
{% endfor %}
CHANNEL: {{ channel }}
MESSAGE TYPE: {{ message_type }}
GUIDANCE: {{ guidance }}

STYLE REQUIREMENTS:
- Maximum {{ max_words }} words
- Style: {{ style }}
- Tone: {{ tone }}
- NEVER use these phrases: {{ avoid }}

CUSTOM INSTRUCTIONS:
{{ instructions }}

IMPORTANT RULES:
1. Personalize using the research insights
2. Lead with value, not features
3. Keep it short and scannable
4. Include ONE clear call-to-action
5. Sound human, not robotic
6. Reference something specific about them or their company

Respond in JSON format:
{
{% if include_subject %}    "subject": "...",
{% endif %}    "content": "The message body",
    "hook": "The personalization element used"
}"#;

/// What the providers are told about a prospect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProspectSummary {
    pub name: String,
    pub first_name: String,
    pub title: String,
    pub company: String,
    pub linkedin_url: String,
    pub twitter_url: String,
}

impl From<&Prospect> for ProspectSummary {
    fn from(prospect: &Prospect) -> Self {
        let or_unknown = |value: Option<&str>| {
            value.filter(|value| !value.trim().is_empty()).unwrap_or("Unknown").to_string()
        };
        let or_missing = |value: Option<&str>| {
            value.filter(|value| !value.trim().is_empty()).unwrap_or("Not provided").to_string()
        };
        Self {
            name: prospect.full_name.clone(),
            first_name: prospect.greeting_name().to_string(),
            title: or_unknown(prospect.title.as_deref()),
            company: or_unknown(prospect.company.as_ref().and_then(|company| company.name.as_deref())),
            linkedin_url: or_missing(prospect.linkedin_url.as_deref()),
            twitter_url: or_missing(prospect.twitter_url.as_deref()),
        }
    }
}

pub struct PromptRenderer {
    tera: Tera,
}

impl PromptRenderer {
    pub fn new() -> Result<Self, GenerationError> {
        let mut tera = Tera::default();
        tera.add_raw_template(RESEARCH_TEMPLATE, RESEARCH_PROMPT).map_err(prompt_error)?;
        tera.add_raw_template(MESSAGE_TEMPLATE, MESSAGE_PROMPT).map_err(prompt_error)?;
        Ok(Self { tera })
    }

    pub fn research(
        &self,
        prospect: &ProspectSummary,
        icp: &IcpPromptContext,
    ) -> Result<String, GenerationError> {
        let mut context = Context::new();
        context.insert("prospect", prospect);
        context.insert("product_name", &icp.product.name.as_deref().unwrap_or("Unknown"));
        context.insert("product_description", &icp.product.description.as_deref().unwrap_or_default());
        context.insert("industries", &icp.target_company.industries.join(", "));
        context.insert("pain_points", &icp.messaging.pain_points.join(", "));
        context.insert("value_props", &icp.messaging.value_props.join(", "));
        self.tera.render(RESEARCH_TEMPLATE, &context).map_err(prompt_error)
    }

    pub fn message(
        &self,
        prospect: &ProspectSummary,
        research: Option<&ResearchReport>,
        icp: &IcpPromptContext,
        channel: Channel,
        message_type: MessageType,
    ) -> Result<String, GenerationError> {
        let guidelines = channel.guidelines();
        let research = match research {
            Some(report) => serde_json::to_string_pretty(report)
                .map_err(|error| GenerationError::Prompt(error.to_string()))?,
            None => "No research available".to_string(),
        };

        let mut context = Context::new();
        context.insert("prospect", prospect);
        context.insert("research", &research);
        context.insert("product_name", &icp.product.name.as_deref().unwrap_or("our product"));
        context.insert("product_company", &icp.product.company.as_deref().unwrap_or_default());
        context.insert("product_description", &icp.product.description.as_deref().unwrap_or_default());
        context.insert("value_props", &icp.messaging.value_props);
        context.insert("pain_points", &icp.messaging.pain_points);
        context.insert("channel", channel.as_str());
        context.insert("message_type", message_type.as_str());
        context.insert("guidance", message_type.guidance());
        context.insert("max_words", &guidelines.max_words);
        context.insert("style", guidelines.style);
        context.insert("include_subject", &guidelines.include_subject);
        context.insert("tone", &icp.messaging.tone);
        context.insert("avoid", &icp.messaging.avoid.join(", "));
        context.insert("instructions", &icp.messaging.instructions.as_deref().unwrap_or("None"));
        self.tera.render(MESSAGE_TEMPLATE, &context).map_err(prompt_error)
    }
}

fn prompt_error(error: tera::Error) -> GenerationError {
    GenerationError::Prompt(error.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use outbound_core::domain::icp::{IcpConfig, IcpConfigId};
    use outbound_core::domain::message::{Channel, MessageType};
    use outbound_core::domain::prospect::{CompanyAttributes, Prospect, ProspectId, ResearchReport};

    use super::{PromptRenderer, ProspectSummary};

    fn icp() -> IcpConfig {
        let mut config = IcpConfig::new(IcpConfigId("icp-1".to_string()), "Platform teams");
        config.product_name = Some("Pipeline Guard".to_string());
        config.target_industries = vec!["SaaS".to_string(), "Fintech".to_string()];
        config.pain_points = vec!["Flaky deploys".to_string()];
        config.value_propositions = vec!["Ship twice as often".to_string()];
        config.avoid_phrases = vec!["synergy".to_string()];
        config
    }

    fn prospect() -> Prospect {
        let mut prospect = Prospect::new(ProspectId("p-1".to_string()), "Ada Park", Utc::now());
        prospect.title = Some("VP of Engineering".to_string());
        prospect.company = Some(CompanyAttributes {
            name: Some("Acme & Co".to_string()),
            ..CompanyAttributes::default()
        });
        prospect
    }

    #[test]
    fn summary_fills_unknown_fields() {
        let mut bare = Prospect::new(ProspectId("p-2".to_string()), "Lin Osei", Utc::now());
        bare.title = Some("  ".to_string());
        let summary = ProspectSummary::from(&bare);
        assert_eq!(summary.first_name, "Lin");
        assert_eq!(summary.title, "Unknown");
        assert_eq!(summary.company, "Unknown");
        assert_eq!(summary.linkedin_url, "Not provided");
    }

    #[test]
    fn research_prompt_carries_prospect_and_product() {
        let renderer = PromptRenderer::new().expect("templates compile");
        let prompt = renderer
            .research(&ProspectSummary::from(&prospect()), &icp().to_prompt_context())
            .expect("render");

        assert!(prompt.contains("- Name: Ada Park"));
        assert!(prompt.contains("- Company: Acme & Co"));
        assert!(prompt.contains("- Product: Pipeline Guard"));
        assert!(prompt.contains("- Target Industries: SaaS, Fintech"));
        assert!(prompt.contains("\"confidence_score\": 0-100"));
    }

    #[test]
    fn message_prompt_follows_channel_guidelines() {
        let renderer = PromptRenderer::new().expect("templates compile");
        let summary = ProspectSummary::from(&prospect());
        let context = icp().to_prompt_context();
        let report = ResearchReport { summary: "Leads a 40-person team.".to_string(), ..ResearchReport::default() };

        let email = renderer
            .message(&summary, Some(&report), &context, Channel::Email, MessageType::FollowUp1)
            .expect("render email");
        assert!(email.contains("Maximum 150 words"));
        assert!(email.contains("\"subject\""));
        assert!(email.contains("MESSAGE TYPE: follow_up_1"));
        assert!(email.contains("- Ship twice as often"));
        assert!(email.contains("NEVER use these phrases: synergy"));
        assert!(email.contains("Leads a 40-person team."));

        let connection = renderer
            .message(&summary, None, &context, Channel::LinkedinConnection, MessageType::Initial)
            .expect("render connection");
        assert!(connection.contains("Maximum 100 words"));
        assert!(!connection.contains("\"subject\""));
        assert!(connection.contains("No research available"));
    }
}
