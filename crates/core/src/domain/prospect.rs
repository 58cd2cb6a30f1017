use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::{Recommendation, ScoreBreakdown};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProspectId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectStatus {
    New,
    Researching,
    ReadyForReview,
    Approved,
    InSequence,
    Contacted,
    Responded,
    MeetingBooked,
    Converted,
    NotInterested,
    Bounced,
}

impl ProspectStatus {
    pub const ALL: [ProspectStatus; 11] = [
        Self::New,
        Self::Researching,
        Self::ReadyForReview,
        Self::Approved,
        Self::InSequence,
        Self::Contacted,
        Self::Responded,
        Self::MeetingBooked,
        Self::Converted,
        Self::NotInterested,
        Self::Bounced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Researching => "researching",
            Self::ReadyForReview => "ready_for_review",
            Self::Approved => "approved",
            Self::InSequence => "in_sequence",
            Self::Contacted => "contacted",
            Self::Responded => "responded",
            Self::MeetingBooked => "meeting_booked",
            Self::Converted => "converted",
            Self::NotInterested => "not_interested",
            Self::Bounced => "bounced",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|status| status.as_str() == normalized)
    }
}

/// Person-level inputs to the title score.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProspectAttributes {
    pub title: Option<String>,
    pub seniority: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyAttributes {
    pub name: Option<String>,
    pub domain: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<u32>,
    pub location: Option<String>,
    pub headquarters: Option<String>,
    pub tech_stack: Vec<String>,
    pub recent_news: Vec<String>,
}

impl CompanyAttributes {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.domain.is_none()
            && self.industry.is_none()
            && self.employee_count.is_none()
            && self.location.is_none()
            && self.headquarters.is_none()
            && self.tech_stack.is_empty()
            && self.recent_news.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpSignals {
    pub positive_signals: Vec<String>,
    pub negative_signals: Vec<String>,
    pub confidence_score: u8,
}

impl Default for IcpSignals {
    fn default() -> Self {
        Self { positive_signals: Vec::new(), negative_signals: Vec::new(), confidence_score: 50 }
    }
}

/// Structured output of a research provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchReport {
    pub summary: String,
    pub personalization_hooks: Vec<String>,
    pub likely_pain_points: Vec<String>,
    pub icp_signals_found: IcpSignals,
    pub recommended_approach: String,
    pub talking_points: Vec<String>,
    pub questions_to_ask: Vec<String>,
}

/// Research-derived inputs to the signals and trigger scores.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchAttributes {
    pub positive_signals: Vec<String>,
    pub negative_signals: Vec<String>,
    pub tech_stack: Vec<String>,
    pub recent_news: Vec<String>,
    pub personalization_hooks: Vec<String>,
}

impl ResearchAttributes {
    pub fn from_research(report: &ResearchReport, company: Option<&CompanyAttributes>) -> Self {
        let (tech_stack, recent_news) = company
            .map(|company| (company.tech_stack.clone(), company.recent_news.clone()))
            .unwrap_or_default();

        Self {
            positive_signals: report.icp_signals_found.positive_signals.clone(),
            negative_signals: report.icp_signals_found.negative_signals.clone(),
            tech_stack,
            recent_news,
            personalization_hooks: report.personalization_hooks.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positive_signals.is_empty()
            && self.negative_signals.is_empty()
            && self.tech_stack.is_empty()
            && self.recent_news.is_empty()
            && self.personalization_hooks.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prospect {
    pub id: ProspectId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    pub seniority: Option<String>,
    pub department: Option<String>,
    pub company: Option<CompanyAttributes>,
    pub linkedin_url: Option<String>,
    pub twitter_url: Option<String>,
    pub status: ProspectStatus,
    pub source: Option<String>,
    pub icp_score: u32,
    pub icp_match_reasons: Vec<String>,
    pub icp_concerns: Vec<String>,
    pub icp_recommendation: Option<Recommendation>,
    pub research: Option<ResearchReport>,
    pub research_summary: Option<String>,
    pub personalization_hooks: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub researched_at: Option<DateTime<Utc>>,
    pub last_contacted_at: Option<DateTime<Utc>>,
}

impl Prospect {
    pub fn new(id: ProspectId, full_name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            first_name: None,
            last_name: None,
            full_name: full_name.into(),
            email: None,
            phone: None,
            title: None,
            seniority: None,
            department: None,
            company: None,
            linkedin_url: None,
            twitter_url: None,
            status: ProspectStatus::New,
            source: None,
            icp_score: 0,
            icp_match_reasons: Vec::new(),
            icp_concerns: Vec::new(),
            icp_recommendation: None,
            research: None,
            research_summary: None,
            personalization_hooks: Vec::new(),
            created_at,
            updated_at: created_at,
            researched_at: None,
            last_contacted_at: None,
        }
    }

    pub fn attributes(&self) -> ProspectAttributes {
        ProspectAttributes { title: self.title.clone(), seniority: self.seniority.clone() }
    }

    pub fn research_attributes(&self) -> Option<ResearchAttributes> {
        self.research
            .as_ref()
            .map(|report| ResearchAttributes::from_research(report, self.company.as_ref()))
    }

    /// First name if known, otherwise the first word of the full name.
    pub fn greeting_name(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.full_name.split_whitespace().next())
            .unwrap_or("there")
    }

    pub fn apply_score(&mut self, breakdown: &ScoreBreakdown) {
        self.icp_score = breakdown.total_score;
        self.icp_match_reasons = breakdown.match_reasons.clone();
        self.icp_concerns = breakdown.concerns.clone();
        self.icp_recommendation = Some(breakdown.recommendation);
    }

    pub fn record_research(&mut self, report: ResearchReport, now: DateTime<Utc>) {
        self.research_summary = Some(report.summary.clone());
        self.personalization_hooks = report.personalization_hooks.clone();
        self.research = Some(report);
        self.researched_at = Some(now);
        self.updated_at = now;
    }

    pub fn apply_patch(&mut self, patch: ProspectPatch, now: DateTime<Utc>) {
        if let Some(first_name) = patch.first_name {
            self.first_name = Some(first_name);
        }
        if let Some(last_name) = patch.last_name {
            self.last_name = Some(last_name);
        }
        if let Some(full_name) = patch.full_name {
            self.full_name = full_name;
        }
        if let Some(email) = patch.email {
            self.email = Some(email);
        }
        if let Some(phone) = patch.phone {
            self.phone = Some(phone);
        }
        if let Some(title) = patch.title {
            self.title = Some(title);
        }
        if let Some(seniority) = patch.seniority {
            self.seniority = Some(seniority);
        }
        if let Some(company) = patch.company {
            self.company = Some(company);
        }
        if let Some(linkedin_url) = patch.linkedin_url {
            self.linkedin_url = Some(linkedin_url);
        }
        if let Some(twitter_url) = patch.twitter_url {
            self.twitter_url = Some(twitter_url);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProspectPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
    pub seniority: Option<String>,
    pub company: Option<CompanyAttributes>,
    pub linkedin_url: Option<String>,
    pub twitter_url: Option<String>,
    pub status: Option<ProspectStatus>,
}
