//! Review queue and prospect list projections, plus bulk workflow actions.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::QueueConfig;
use crate::domain::message::MessageStatus;
use crate::domain::prospect::{Prospect, ProspectId, ProspectStatus};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueQuery {
    pub status: ProspectStatus,
    pub page: u32,
    pub per_page: Option<u32>,
}

impl Default for QueueQuery {
    fn default() -> Self {
        Self { status: ProspectStatus::ReadyForReview, page: 1, per_page: None }
    }
}

/// Row shown to a reviewer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: ProspectId,
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
    pub icp_score: u32,
    pub icp_match_reasons: Vec<String>,
    pub research_summary: Option<String>,
    pub status: ProspectStatus,
}

impl From<&Prospect> for QueueEntry {
    fn from(prospect: &Prospect) -> Self {
        Self {
            id: prospect.id.clone(),
            full_name: prospect.full_name.clone(),
            first_name: prospect.first_name.clone(),
            last_name: prospect.last_name.clone(),
            title: prospect.title.clone(),
            company_name: prospect.company.as_ref().and_then(|company| company.name.clone()),
            email: prospect.email.clone(),
            linkedin_url: prospect.linkedin_url.clone(),
            icp_score: prospect.icp_score,
            icp_match_reasons: prospect.icp_match_reasons.clone(),
            research_summary: prospect.research_summary.clone(),
            status: prospect.status,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePage {
    pub prospects: Vec<QueueEntry>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
}

/// Highest score first, then oldest, then id.
pub fn review_order(left: &Prospect, right: &Prospect) -> Ordering {
    right
        .icp_score
        .cmp(&left.icp_score)
        .then_with(|| left.created_at.cmp(&right.created_at))
        .then_with(|| left.id.cmp(&right.id))
}

/// Column a prospect list is sorted by. Unknown names fall back to creation time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectSort {
    #[default]
    CreatedAt,
    UpdatedAt,
    IcpScore,
    FullName,
    CompanyName,
}

impl ProspectSort {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "updated_at" => Self::UpdatedAt,
            "icp_score" => Self::IcpScore,
            "full_name" => Self::FullName,
            "company_name" => Self::CompanyName,
            _ => Self::CreatedAt,
        }
    }

    fn compare(&self, left: &Prospect, right: &Prospect) -> Ordering {
        match self {
            Self::CreatedAt => left.created_at.cmp(&right.created_at),
            Self::UpdatedAt => left.updated_at.cmp(&right.updated_at),
            Self::IcpScore => left.icp_score.cmp(&right.icp_score),
            Self::FullName => {
                left.full_name.to_lowercase().cmp(&right.full_name.to_lowercase())
            }
            Self::CompanyName => company_key(left).cmp(&company_key(right)),
        }
    }
}

fn company_name(prospect: &Prospect) -> Option<&str> {
    prospect.company.as_ref().and_then(|company| company.name.as_deref())
}

fn company_key(prospect: &Prospect) -> Option<String> {
    company_name(prospect).map(str::to_lowercase)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filter, search and paging for the full prospect list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProspectQuery {
    pub status: Option<ProspectStatus>,
    /// Case-insensitive substring of the name, email or company name.
    pub search: Option<String>,
    pub sort_by: ProspectSort,
    pub sort_order: SortOrder,
    pub page: u32,
    pub per_page: Option<u32>,
}

impl Default for ProspectQuery {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            sort_by: ProspectSort::default(),
            sort_order: SortOrder::default(),
            page: 1,
            per_page: None,
        }
    }
}

impl ProspectQuery {
    fn matches(&self, prospect: &Prospect) -> bool {
        if self.status.is_some_and(|status| prospect.status != status) {
            return false;
        }
        let Some(needle) = self.search.as_deref().map(str::trim).filter(|term| !term.is_empty())
        else {
            return true;
        };

        let needle = needle.to_lowercase();
        [Some(prospect.full_name.as_str()), prospect.email.as_deref(), company_name(prospect)]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProspectListPage {
    pub prospects: Vec<QueueEntry>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
    pub pages: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct ReviewQueue {
    default_per_page: u32,
    max_per_page: u32,
}

impl Default for ReviewQueue {
    fn default() -> Self {
        Self { default_per_page: 20, max_per_page: 100 }
    }
}

impl ReviewQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self { default_per_page: config.per_page, max_per_page: config.max_per_page }
    }

    pub fn project<'a, I>(&self, prospects: I, query: &QueueQuery) -> QueuePage
    where
        I: IntoIterator<Item = &'a Prospect>,
    {
        let (page, per_page) = self.bounds(query.page, query.per_page);

        let mut matching =
            prospects.into_iter().filter(|prospect| prospect.status == query.status).collect::<Vec<_>>();
        matching.sort_by(|left, right| review_order(left, right));

        let total = matching.len();
        let prospects = slice(matching, page, per_page);

        QueuePage { prospects, total, page, per_page }
    }

    /// The whole prospect list, filtered and searched, sorted on the chosen
    /// column with ties broken by id.
    pub fn list<'a, I>(&self, prospects: I, query: &ProspectQuery) -> ProspectListPage
    where
        I: IntoIterator<Item = &'a Prospect>,
    {
        let (page, per_page) = self.bounds(query.page, query.per_page);

        let mut matching =
            prospects.into_iter().filter(|prospect| query.matches(prospect)).collect::<Vec<_>>();
        matching.sort_by(|left, right| {
            let ordering = query.sort_by.compare(left, right);
            let ordering = match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            ordering.then_with(|| left.id.cmp(&right.id))
        });

        let total = matching.len();
        let pages = total.div_ceil(per_page as usize);
        let prospects = slice(matching, page, per_page);

        ProspectListPage { prospects, total, page, per_page, pages }
    }

    fn bounds(&self, page: u32, per_page: Option<u32>) -> (u32, u32) {
        (page.max(1), per_page.unwrap_or(self.default_per_page).clamp(1, self.max_per_page))
    }
}

fn slice(matching: Vec<&Prospect>, page: u32, per_page: u32) -> Vec<QueueEntry> {
    let offset = (page as usize - 1).saturating_mul(per_page as usize);
    matching.into_iter().skip(offset).take(per_page as usize).map(QueueEntry::from).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    ApproveAll,
    Skip,
    Reset,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApproveAll => "approve_all",
            Self::Skip => "skip",
            Self::Reset => "reset",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve_all" => Ok(Self::ApproveAll),
            "skip" => Ok(Self::Skip),
            "reset" => Ok(Self::Reset),
            _ => Err(DomainError::UnknownWorkflowAction(value.to_string())),
        }
    }

    pub fn prospect_status(&self) -> ProspectStatus {
        match self {
            Self::ApproveAll => ProspectStatus::Approved,
            Self::Skip => ProspectStatus::NotInterested,
            Self::Reset => ProspectStatus::New,
        }
    }

    /// New status for a message currently in `current`, if the action touches it.
    pub fn message_status(&self, current: MessageStatus) -> Option<MessageStatus> {
        match (self, current) {
            (Self::ApproveAll, MessageStatus::ReadyForReview) => Some(MessageStatus::Approved),
            (Self::Skip, MessageStatus::ReadyForReview) => Some(MessageStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub total_prospects: usize,
    pub by_status: BTreeMap<String, usize>,
}

impl WorkflowStats {
    pub fn collect<'a, I>(prospects: I) -> Self
    where
        I: IntoIterator<Item = &'a Prospect>,
    {
        let mut by_status =
            ProspectStatus::ALL.iter().map(|status| (status.as_str().to_string(), 0)).collect::<BTreeMap<_, _>>();
        let mut total_prospects = 0;
        for prospect in prospects {
            total_prospects += 1;
            *by_status.entry(prospect.status.as_str().to_string()).or_default() += 1;
        }
        Self { total_prospects, by_status }
    }

    pub fn count(&self, status: ProspectStatus) -> usize {
        self.by_status.get(status.as_str()).copied().unwrap_or_default()
    }
}
