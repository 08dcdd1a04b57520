// Listing & ordering types

use crate::domain::error::{DomainError, Result};
use crate::domain::job::{Job, JobStatus};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Upper bound for `page_size` in paged listings
pub const MAX_PAGE_SIZE: u32 = 100;

/// Order in which queued jobs are claimed
///
/// `PriorityFirst` picks the most urgent job regardless of arrival order.
/// `Fifo` keeps strict insertion order; priority only breaks ties between
/// rows sharing a position, which never happens with unique ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DequeueOrder {
    #[default]
    PriorityFirst,
    Fifo,
}

impl FromStr for DequeueOrder {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "priority" | "priority_first" => Ok(DequeueOrder::PriorityFirst),
            "fifo" => Ok(DequeueOrder::Fifo),
            other => Err(DomainError::ValidationError(format!(
                "unknown dequeue order '{}' (expected 'priority' or 'fifo')",
                other
            ))),
        }
    }
}

/// Sortable columns of the job list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Id,
    WorkerType,
    Priority,
    Status,
    CreateTime,
    LastUpdateTime,
}

impl SortField {
    /// Column name (whitelisted, safe to splice into SQL)
    pub fn column(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::WorkerType => "worker_type",
            SortField::Priority => "priority",
            SortField::Status => "status",
            SortField::CreateTime => "create_time",
            SortField::LastUpdateTime => "last_update_time",
        }
    }
}

impl FromStr for SortField {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "id" => Ok(SortField::Id),
            "worker_type" | "worker" => Ok(SortField::WorkerType),
            "priority" => Ok(SortField::Priority),
            "status" => Ok(SortField::Status),
            "create_time" => Ok(SortField::CreateTime),
            "last_update_time" => Ok(SortField::LastUpdateTime),
            other => Err(DomainError::UnknownSortField(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Paged listing request (page is 1-based)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListQuery {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub worker_type: Option<String>,
    #[serde(default)]
    pub sort_field: SortField,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

impl Default for JobListQuery {
    fn default() -> Self {
        Self {
            status: None,
            worker_type: None,
            sort_field: SortField::default(),
            sort_direction: SortDirection::default(),
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl JobListQuery {
    /// Page size clamped to `1..=MAX_PAGE_SIZE`
    pub fn limit(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit())
    }
}

/// One page of jobs plus the unpaged total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: i64,
}
