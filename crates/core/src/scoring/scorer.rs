//! Scoring algorithms for prospects against an ICP

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{NEUTRAL_TOTAL, STRONG_COMPONENT_THRESHOLD, WEAK_COMPONENT_THRESHOLD};
use crate::domain::icp::IcpConfig;
use crate::domain::prospect::{
    CompanyAttributes, Prospect, ProspectAttributes, ResearchAttributes,
};

const UNKNOWN_TITLE_SCORE: i32 = 30;
const NO_COMPANY_SCORE: i32 = 40;
const COMPANY_BASE_SCORE: i32 = 50;
const SIGNALS_BASE_SCORE: i32 = 50;
const TRIGGERS_BASE_SCORE: i32 = 40;

/// Priority band derived from the weighted total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    HighPriority,
    MediumPriority,
    LowPriority,
    Skip,
}

impl Recommendation {
    /// Bands are applied to the unrounded total.
    pub fn from_total(total: f64) -> Self {
        if total >= 80.0 {
            Self::HighPriority
        } else if total >= 60.0 {
            Self::MediumPriority
        } else if total >= 40.0 {
            Self::LowPriority
        } else {
            Self::Skip
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighPriority => "high_priority",
            Self::MediumPriority => "medium_priority",
            Self::LowPriority => "low_priority",
            Self::Skip => "skip",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high_priority" => Some(Self::HighPriority),
            "medium_priority" => Some(Self::MediumPriority),
            "low_priority" => Some(Self::LowPriority),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

/// The four raw component scores, each within 0..=100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub title_match: u32,
    pub company_fit: u32,
    pub signals: u32,
    pub trigger_events: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Absent when no profile was configured.
    pub components: Option<ComponentScores>,
    pub total_score: u32,
    pub match_reasons: Vec<String>,
    pub concerns: Vec<String>,
    pub recommendation: Recommendation,
}

impl ScoreBreakdown {
    /// Low-confidence result used when no ICP is configured.
    pub fn unconfigured() -> Self {
        Self {
            components: None,
            total_score: NEUTRAL_TOTAL,
            match_reasons: Vec::new(),
            concerns: vec!["No ICP configured".to_string()],
            recommendation: Recommendation::MediumPriority,
        }
    }
}

/// Everything the scorer reads about one prospect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringInput {
    pub id: Option<String>,
    pub name: Option<String>,
    pub prospect: ProspectAttributes,
    pub company: Option<CompanyAttributes>,
    pub research: Option<ResearchAttributes>,
}

impl From<&Prospect> for ScoringInput {
    fn from(prospect: &Prospect) -> Self {
        Self {
            id: Some(prospect.id.0.clone()),
            name: Some(prospect.full_name.clone()),
            prospect: prospect.attributes(),
            company: prospect.company.clone(),
            research: prospect.research_attributes(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredProspect {
    #[serde(flatten)]
    pub input: ScoringInput,
    pub breakdown: ScoreBreakdown,
}

/// Scorer bound to one ICP snapshot (or to none).
#[derive(Clone, Debug, Default)]
pub struct IcpScorer {
    config: Option<Arc<IcpConfig>>,
}

impl IcpScorer {
    pub fn new(config: Option<IcpConfig>) -> Self {
        Self { config: config.map(Arc::new) }
    }

    pub fn from_shared(config: Option<Arc<IcpConfig>>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> Option<&IcpConfig> {
        self.config.as_deref()
    }

    pub fn score(
        &self,
        prospect: &ProspectAttributes,
        company: Option<&CompanyAttributes>,
        research: Option<&ResearchAttributes>,
    ) -> ScoreBreakdown {
        score(prospect, company, research, self.config())
    }

    pub fn score_input(&self, input: &ScoringInput) -> ScoreBreakdown {
        self.score(&input.prospect, input.company.as_ref(), input.research.as_ref())
    }

    pub fn score_prospect(&self, prospect: &Prospect) -> ScoreBreakdown {
        self.score_input(&ScoringInput::from(prospect))
    }

    /// Scores a batch and orders it by total score, highest first. Equal
    /// scores keep their input order.
    pub fn bulk_score(&self, batch: Vec<ScoringInput>) -> Vec<ScoredProspect> {
        let mut scored = batch
            .into_iter()
            .map(|input| {
                let breakdown = self.score_input(&input);
                ScoredProspect { input, breakdown }
            })
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| right.breakdown.total_score.cmp(&left.breakdown.total_score));
        scored
    }
}

/// Pure scoring function. Absent inputs degrade to neutral component scores.
pub fn score(
    prospect: &ProspectAttributes,
    company: Option<&CompanyAttributes>,
    research: Option<&ResearchAttributes>,
    config: Option<&IcpConfig>,
) -> ScoreBreakdown {
    let Some(config) = config else {
        return ScoreBreakdown::unconfigured();
    };

    let company = company.filter(|company| !company.is_empty());
    let research = research.filter(|research| !research.is_empty());

    let components = ComponentScores {
        title_match: title_score(prospect, config),
        company_fit: company_score(company, config),
        signals: signals_score(research, config),
        trigger_events: trigger_score(research, config),
    };

    let weights = config.weights;
    let total = f64::from(components.title_match) * (f64::from(weights.title) / 100.0)
        + f64::from(components.company_fit) * (f64::from(weights.company) / 100.0)
        + f64::from(components.signals) * (f64::from(weights.signals) / 100.0)
        + f64::from(components.trigger_events) * (f64::from(weights.triggers) / 100.0);

    let mut match_reasons = Vec::new();
    let mut concerns = Vec::new();

    if components.title_match >= STRONG_COMPONENT_THRESHOLD {
        match_reasons.push(format!(
            "Strong title match: {}",
            prospect.title.as_deref().unwrap_or_default()
        ));
    } else if components.title_match < WEAK_COMPONENT_THRESHOLD {
        concerns.push("Title doesn't match ICP targets".to_string());
    }

    if components.company_fit >= STRONG_COMPONENT_THRESHOLD {
        match_reasons.push("Company fits ICP criteria".to_string());
    } else if components.company_fit < WEAK_COMPONENT_THRESHOLD {
        concerns.push("Company may not be ideal fit".to_string());
    }

    if components.signals >= STRONG_COMPONENT_THRESHOLD {
        match_reasons.push("Strong positive signals detected".to_string());
    } else if components.signals < WEAK_COMPONENT_THRESHOLD && research.is_some() {
        concerns.push("Few positive signals found".to_string());
    }

    ScoreBreakdown {
        components: Some(components),
        total_score: total.round_ties_even() as u32,
        match_reasons,
        concerns,
        recommendation: Recommendation::from_total(total),
    }
}

fn contains_ci(haystack_lower: &str, needle: &str) -> bool {
    haystack_lower.contains(&needle.to_lowercase())
}

fn clamp_component(score: i32) -> u32 {
    score.clamp(0, 100) as u32
}

fn title_score(prospect: &ProspectAttributes, config: &IcpConfig) -> u32 {
    let title = prospect.title.as_deref().unwrap_or_default().to_lowercase();
    if title.is_empty() {
        return UNKNOWN_TITLE_SCORE as u32;
    }

    let mut score = 0;

    if config.target_titles.iter().any(|target| contains_ci(&title, target)) {
        score = 100;
    }

    let keywords_matched =
        config.title_keywords.iter().filter(|keyword| contains_ci(&title, keyword)).count() as i32;
    if keywords_matched > 0 {
        score = score.max((30 + keywords_matched * 20).min(80));
    }

    let seniority = prospect.seniority.as_deref().unwrap_or_default().to_lowercase();
    let senior = config
        .target_seniority
        .iter()
        .any(|target| contains_ci(&title, target) || contains_ci(&seniority, target));
    if senior {
        score = (score + 15).min(100);
    }

    // Exclusion wins over every other signal.
    if config.exclude_titles.iter().any(|exclude| contains_ci(&title, exclude)) {
        score = 0;
    }

    clamp_component(score)
}

fn company_score(company: Option<&CompanyAttributes>, config: &IcpConfig) -> u32 {
    let Some(company) = company else {
        return NO_COMPANY_SCORE as u32;
    };

    let mut score = COMPANY_BASE_SCORE;

    let industry = company.industry.as_deref().unwrap_or_default().to_lowercase();
    if config.target_industries.iter().any(|target| contains_ci(&industry, target)) {
        score += 25;
    }

    if let Some(count) = company.employee_count.filter(|count| *count > 0) {
        if (config.company_size_min..=config.company_size_max).contains(&count) {
            score += 20;
        } else if count < config.company_size_min {
            score -= 15;
        } else if count > config.company_size_max {
            score -= 10;
        }
    }

    let location = company
        .location
        .as_deref()
        .filter(|location| !location.is_empty())
        .or(company.headquarters.as_deref())
        .unwrap_or_default()
        .to_lowercase();
    if config.target_locations.iter().any(|target| contains_ci(&location, target)) {
        score += 10;
    }

    clamp_component(score)
}

fn signals_score(research: Option<&ResearchAttributes>, config: &IcpConfig) -> u32 {
    let Some(research) = research else {
        return SIGNALS_BASE_SCORE as u32;
    };

    let mut score = SIGNALS_BASE_SCORE;

    for signal in &research.positive_signals {
        let signal = signal.to_lowercase();
        if config.positive_signals.iter().any(|target| contains_ci(&signal, target)) {
            score += 10;
        }
    }

    // Tech stack entries match exactly.
    for tech in &research.tech_stack {
        if config.tech_stack_positive.contains(tech) {
            score += 5;
        }
    }

    for signal in &research.negative_signals {
        let signal = signal.to_lowercase();
        if config.negative_signals.iter().any(|target| contains_ci(&signal, target)) {
            score -= 20;
        }
    }

    for tech in &research.tech_stack {
        if config.tech_stack_negative.contains(tech) {
            score -= 15;
        }
    }

    clamp_component(score)
}

fn trigger_score(research: Option<&ResearchAttributes>, config: &IcpConfig) -> u32 {
    let Some(research) = research else {
        return TRIGGERS_BASE_SCORE as u32;
    };

    let mut score = TRIGGERS_BASE_SCORE;
    let text = research
        .recent_news
        .iter()
        .chain(&research.personalization_hooks)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let triggers_found =
        config.trigger_events.iter().filter(|trigger| contains_ci(&text, trigger)).count() as i32;
    score += 15 * triggers_found;

    if text.contains("funding") || text.contains("raised") {
        score += 10;
    }
    if text.contains("hiring") || text.contains("growing") {
        score += 5;
    }

    clamp_component(score)
}
