use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IcpConfigId(pub String);

/// Percentage weights applied to the four component scores.
///
/// The scorer multiplies each component by `weight / 100` without checking the
/// sum; [`ScoringWeights::validate`] is applied when a config is saved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub title: u32,
    pub company: u32,
    pub signals: u32,
    pub triggers: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { title: 25, company: 25, signals: 30, triggers: 20 }
    }
}

impl ScoringWeights {
    /// Widened so arbitrary deserialized weights cannot overflow.
    pub fn sum(&self) -> u64 {
        [self.title, self.company, self.signals, self.triggers].into_iter().map(u64::from).sum()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let sum = self.sum();
        if sum == 100 {
            Ok(())
        } else {
            Err(DomainError::InvalidWeights { sum })
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpConfig {
    pub id: IcpConfigId,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_default: bool,

    pub product_name: Option<String>,
    pub company_name: Option<String>,
    pub product_description: Option<String>,

    pub target_industries: Vec<String>,
    pub company_size_min: u32,
    pub company_size_max: u32,
    pub target_locations: Vec<String>,
    pub revenue_min: Option<u64>,
    pub revenue_max: Option<u64>,

    pub target_titles: Vec<String>,
    pub title_keywords: Vec<String>,
    pub exclude_titles: Vec<String>,
    pub target_seniority: Vec<String>,

    pub positive_signals: Vec<String>,
    pub negative_signals: Vec<String>,
    pub tech_stack_positive: Vec<String>,
    pub tech_stack_negative: Vec<String>,
    pub trigger_events: Vec<String>,

    pub pain_points: Vec<String>,
    pub value_propositions: Vec<String>,

    pub messaging_tone: String,
    pub avoid_phrases: Vec<String>,
    pub custom_instructions: Option<String>,

    pub weights: ScoringWeights,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for IcpConfig {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: IcpConfigId(String::new()),
            name: String::new(),
            description: None,
            is_active: true,
            is_default: false,
            product_name: None,
            company_name: None,
            product_description: None,
            target_industries: Vec::new(),
            company_size_min: 50,
            company_size_max: 10_000,
            target_locations: Vec::new(),
            revenue_min: None,
            revenue_max: None,
            target_titles: Vec::new(),
            title_keywords: Vec::new(),
            exclude_titles: Vec::new(),
            target_seniority: Vec::new(),
            positive_signals: Vec::new(),
            negative_signals: Vec::new(),
            tech_stack_positive: Vec::new(),
            tech_stack_negative: Vec::new(),
            trigger_events: Vec::new(),
            pain_points: Vec::new(),
            value_propositions: Vec::new(),
            messaging_tone: "professional".to_string(),
            avoid_phrases: Vec::new(),
            custom_instructions: None,
            weights: ScoringWeights::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl IcpConfig {
    pub fn new(id: IcpConfigId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), ..Self::default() }
    }

    /// Nested view of the profile handed to research and message providers.
    pub fn to_prompt_context(&self) -> IcpPromptContext {
        IcpPromptContext {
            product: ProductContext {
                name: self.product_name.clone(),
                company: self.company_name.clone(),
                description: self.product_description.clone(),
            },
            target_company: TargetCompanyContext {
                industries: self.target_industries.clone(),
                size_range: format!("{}-{}", self.company_size_min, self.company_size_max),
                locations: self.target_locations.clone(),
            },
            target_persona: TargetPersonaContext {
                titles: self.target_titles.clone(),
                title_keywords: self.title_keywords.clone(),
                seniority: self.target_seniority.clone(),
                exclude: self.exclude_titles.clone(),
            },
            signals: SignalsContext {
                positive: self.positive_signals.clone(),
                negative: self.negative_signals.clone(),
                tech_stack_positive: self.tech_stack_positive.clone(),
                tech_stack_negative: self.tech_stack_negative.clone(),
                triggers: self.trigger_events.clone(),
            },
            messaging: MessagingContext {
                pain_points: self.pain_points.clone(),
                value_props: self.value_propositions.clone(),
                tone: self.messaging_tone.clone(),
                avoid: self.avoid_phrases.clone(),
                instructions: self.custom_instructions.clone(),
            },
        }
    }

    /// Applies only the fields present in `patch`. Identity and default flag are
    /// never touched here; the config store owns those.
    pub fn apply_patch(&mut self, patch: IcpConfigPatch) {
        macro_rules! apply {
            ($($field:ident),+ $(,)?) => {
                $(if let Some(value) = patch.$field {
                    self.$field = value;
                })+
            };
        }

        apply!(
            name,
            target_industries,
            company_size_min,
            company_size_max,
            target_locations,
            target_titles,
            title_keywords,
            exclude_titles,
            target_seniority,
            positive_signals,
            negative_signals,
            tech_stack_positive,
            tech_stack_negative,
            trigger_events,
            pain_points,
            value_propositions,
            messaging_tone,
            avoid_phrases,
            weights,
        );

        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(product_name) = patch.product_name {
            self.product_name = Some(product_name);
        }
        if let Some(company_name) = patch.company_name {
            self.company_name = Some(company_name);
        }
        if let Some(product_description) = patch.product_description {
            self.product_description = Some(product_description);
        }
        if let Some(revenue_min) = patch.revenue_min {
            self.revenue_min = Some(revenue_min);
        }
        if let Some(revenue_max) = patch.revenue_max {
            self.revenue_max = Some(revenue_max);
        }
        if let Some(custom_instructions) = patch.custom_instructions {
            self.custom_instructions = Some(custom_instructions);
        }
    }
}

/// Partial update for an [`IcpConfig`]; `None` means "leave unchanged".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpConfigPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub product_name: Option<String>,
    pub company_name: Option<String>,
    pub product_description: Option<String>,
    pub target_industries: Option<Vec<String>>,
    pub company_size_min: Option<u32>,
    pub company_size_max: Option<u32>,
    pub target_locations: Option<Vec<String>>,
    pub revenue_min: Option<u64>,
    pub revenue_max: Option<u64>,
    pub target_titles: Option<Vec<String>>,
    pub title_keywords: Option<Vec<String>>,
    pub exclude_titles: Option<Vec<String>>,
    pub target_seniority: Option<Vec<String>>,
    pub positive_signals: Option<Vec<String>>,
    pub negative_signals: Option<Vec<String>>,
    pub tech_stack_positive: Option<Vec<String>>,
    pub tech_stack_negative: Option<Vec<String>>,
    pub trigger_events: Option<Vec<String>>,
    pub pain_points: Option<Vec<String>>,
    pub value_propositions: Option<Vec<String>>,
    pub messaging_tone: Option<String>,
    pub avoid_phrases: Option<Vec<String>>,
    pub custom_instructions: Option<String>,
    pub weights: Option<ScoringWeights>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcpPromptContext {
    pub product: ProductContext,
    pub target_company: TargetCompanyContext,
    pub target_persona: TargetPersonaContext,
    pub signals: SignalsContext,
    pub messaging: MessagingContext,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductContext {
    pub name: Option<String>,
    pub company: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCompanyContext {
    pub industries: Vec<String>,
    pub size_range: String,
    pub locations: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPersonaContext {
    pub titles: Vec<String>,
    pub title_keywords: Vec<String>,
    pub seniority: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalsContext {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
    pub tech_stack_positive: Vec<String>,
    pub tech_stack_negative: Vec<String>,
    pub triggers: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingContext {
    pub pain_points: Vec<String>,
    pub value_props: Vec<String>,
    pub tone: String,
    pub avoid: Vec<String>,
    pub instructions: Option<String>,
}

/// A pre-built profile operators can start from instead of an empty ICP.
#[derive(Clone, Debug)]
pub struct IcpTemplate {
    pub key: &'static str,
    pub name: &'static str,
    build: fn(IcpConfig) -> IcpConfig,
}

impl IcpTemplate {
    /// Security and platform engineering buyers of a static analysis product.
    pub fn code_security() -> Self {
        Self { key: "code-security", name: "Semgrep ICP", build: code_security_profile }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::code_security()]
    }

    pub fn find(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        Self::all().into_iter().find(|template| template.key == key)
    }

    /// A fresh, non-default config filled from the template.
    pub fn instantiate(&self, id: IcpConfigId, now: DateTime<Utc>) -> IcpConfig {
        let config = IcpConfig {
            is_default: false,
            created_at: now,
            updated_at: now,
            ..IcpConfig::new(id, self.name)
        };
        (self.build)(config)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

fn code_security_profile(base: IcpConfig) -> IcpConfig {
    IcpConfig {
        description: Some(
            "Ideal Customer Profile for Semgrep - Code Security Platform".to_string(),
        ),
        product_name: Some("Semgrep".to_string()),
        company_name: Some("Semgrep".to_string()),
        product_description: Some(
            "Semgrep is a fast, open-source static analysis tool for finding bugs, detecting \
             vulnerabilities, and enforcing code standards. It supports 30+ languages and \
             integrates seamlessly into CI/CD pipelines."
                .to_string(),
        ),
        target_industries: strings(&[
            "Technology",
            "Financial Services",
            "Healthcare",
            "E-commerce",
            "SaaS",
            "Fintech",
        ]),
        company_size_min: 100,
        company_size_max: 10_000,
        target_locations: strings(&[
            "United States",
            "Canada",
            "United Kingdom",
            "Germany",
            "Australia",
        ]),
        target_titles: strings(&[
            "VP of Engineering",
            "Director of Engineering",
            "Head of Engineering",
            "CISO",
            "Chief Information Security Officer",
            "VP of Security",
            "Director of Security",
            "Head of Security",
            "Security Engineering Manager",
            "Platform Engineering Lead",
            "DevOps Director",
            "Head of DevOps",
            "AppSec Manager",
            "Application Security Lead",
        ]),
        title_keywords: strings(&[
            "security",
            "engineering",
            "devops",
            "platform",
            "appsec",
            "devsecops",
            "infrastructure",
        ]),
        exclude_titles: strings(&["Intern", "Student", "Junior", "Entry Level", "Recruiter", "HR"]),
        target_seniority: strings(&["VP", "Director", "Head", "C-Level", "Manager", "Lead"]),
        positive_signals: strings(&[
            "SAST",
            "static analysis",
            "code security",
            "DevSecOps",
            "shift left",
            "CI/CD security",
            "supply chain security",
            "SBOM",
            "vulnerability scanning",
            "code review automation",
            "security automation",
            "AppSec program",
        ]),
        negative_signals: strings(&[
            "competitor customer",
            "already using Snyk",
            "small team",
            "no security budget",
        ]),
        tech_stack_positive: strings(&[
            "GitHub",
            "GitLab",
            "Jenkins",
            "CircleCI",
            "Kubernetes",
            "Docker",
            "AWS",
            "GCP",
            "Azure",
        ]),
        trigger_events: strings(&[
            "recent funding round",
            "security incident in news",
            "hiring security engineers",
            "new CISO hired",
            "compliance requirement",
            "SOC 2 certification",
            "going public",
        ]),
        pain_points: strings(&[
            "Too many false positives from current SAST tools",
            "Slow scan times blocking CI/CD pipelines",
            "Difficulty getting developers to adopt security tools",
            "Lack of custom rule capabilities",
            "High cost of enterprise security tools",
            "Security team bottleneck in code reviews",
        ]),
        value_propositions: strings(&[
            "Find real bugs 10x faster with low false positive rate",
            "Developer-friendly tool that engineers actually want to use",
            "Write custom rules in minutes, not days",
            "Seamless CI/CD integration - scans complete in seconds",
            "Open source core with enterprise features",
            "Single tool for security, quality, and compliance",
        ]),
        messaging_tone: "professional".to_string(),
        avoid_phrases: strings(&[
            "synergy",
            "leverage",
            "circle back",
            "game-changer",
            "best-in-class",
            "revolutionary",
        ]),
        custom_instructions: Some(
            "Focus on the developer experience and speed. Emphasize that Semgrep is built by \
             security researchers who understand that tools need to be fast and accurate to be \
             adopted. Mention the open-source community if relevant."
                .to_string(),
        ),
        ..base
    }
}
