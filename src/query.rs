//! Task listing: filter, sort and paginate a principal's tasks.
//!
//! Raw query-string values arrive as [`TaskListParams`] and are checked into a
//! [`TaskQuery`] before anything reaches the store. Sort fields come from a fixed
//! allow-list, so only known column names are ever placed into SQL.

use crate::error::AppError;
use crate::models::{OwnedTask, Task, TaskPriority, TaskStatus};
use crate::store::TaskStore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid query: unsupported sortBy '{0}'.")]
    SortField(String),
    #[error("Invalid query: sortOrder must be ASC or DESC, got '{0}'.")]
    SortOrder(String),
    #[error("Invalid query: page must be a positive integer, got '{0}'.")]
    Page(String),
    #[error("Invalid query: limit must be a positive integer, got '{0}'.")]
    Limit(String),
    #[error("Invalid query: page {page} with limit {limit} is out of range.")]
    OutOfRange { page: u64, limit: u64 },
}

impl From<QueryError> for AppError {
    fn from(error: QueryError) -> AppError {
        AppError::BadRequest(error.to_string())
    }
}

/// Columns a task list may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
    Title,
    Status,
}

impl SortField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "createdAt" => Some(SortField::CreatedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            "dueDate" => Some(SortField::DueDate),
            "priority" => Some(SortField::Priority),
            "title" => Some(SortField::Title),
            "status" => Some(SortField::Status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Case-insensitive, so `asc` and `ASC` are both accepted.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "ASC" => Some(SortOrder::Asc),
            "DESC" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Exact-match filters applied on top of owner scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.priority.map_or(true, |p| task.priority == p)
    }
}

/// Offset/limit pair handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u64,
}

/// Raw `GET /api/tasks` query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListParams {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// A checked task listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub filter: TaskFilter,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub page: u64,
    pub limit: u64,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            filter: TaskFilter::default(),
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn positive(raw: Option<String>, default: u64, err: fn(String) -> QueryError) -> Result<u64, QueryError> {
    match non_empty(raw) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(err(raw)),
        },
    }
}

impl TryFrom<TaskListParams> for TaskQuery {
    type Error = QueryError;

    fn try_from(params: TaskListParams) -> Result<Self, Self::Error> {
        // Filter values outside the status/priority domain are dropped, not rejected.
        let status = non_empty(params.status).and_then(|raw| {
            let parsed = TaskStatus::parse(&raw);
            if parsed.is_none() {
                log::debug!("ignoring unknown status filter '{}'", raw);
            }
            parsed
        });
        let priority = non_empty(params.priority).and_then(|raw| {
            let parsed = TaskPriority::parse(&raw);
            if parsed.is_none() {
                log::debug!("ignoring unknown priority filter '{}'", raw);
            }
            parsed
        });

        let sort_by = match non_empty(params.sort_by) {
            Some(raw) => SortField::parse(&raw).ok_or(QueryError::SortField(raw))?,
            None => SortField::default(),
        };
        let sort_order = match non_empty(params.sort_order) {
            Some(raw) => SortOrder::parse(&raw).ok_or(QueryError::SortOrder(raw))?,
            None => SortOrder::default(),
        };

        let query = TaskQuery {
            filter: TaskFilter { status, priority },
            sort_by,
            sort_order,
            page: positive(params.page, DEFAULT_PAGE, QueryError::Page)?,
            limit: positive(params.limit, DEFAULT_LIMIT, QueryError::Limit)?,
        };
        query.window()?;
        Ok(query)
    }
}

impl TaskQuery {
    pub fn window(&self) -> Result<PageWindow, QueryError> {
        let offset = (self.page - 1)
            .checked_mul(self.limit)
            .filter(|offset| offset.checked_add(self.limit).is_some())
            .filter(|offset| i64::try_from(*offset).is_ok() && i64::try_from(self.limit).is_ok())
            .ok_or(QueryError::OutOfRange {
                page: self.page,
                limit: self.limit,
            })?;
        Ok(PageWindow {
            offset,
            limit: self.limit,
        })
    }

    /// Orders two tasks by the requested field and direction.
    ///
    /// Missing due dates sort after every real date in ascending order. Titles
    /// compare case-insensitively. Ties fall back to the task id so pages are
    /// stable.
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let primary = match self.sort_by {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::DueDate => match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Status => a.status.rank().cmp(&b.status.rank()),
        };
        let primary = match self.sort_order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// Pagination metadata returned alongside a page of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_tasks: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let offset = (page - 1).saturating_mul(limit);
        Self {
            current_page: page,
            total_pages: total.div_ceil(limit),
            total_tasks: total,
            has_next: offset.saturating_add(limit) < total,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<OwnedTask>,
    pub pagination: Pagination,
}

/// Lists one page of `owner`'s tasks.
pub async fn list_tasks(
    store: &dyn TaskStore,
    owner: Uuid,
    query: &TaskQuery,
) -> Result<TaskPage, AppError> {
    let window = query.window()?;
    let rows = store.find_tasks(owner, query, window).await?;
    Ok(TaskPage {
        pagination: Pagination::new(query.page, query.limit, rows.total),
        tasks: rows.tasks,
    })
}
