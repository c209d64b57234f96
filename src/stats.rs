//! Per-owner task statistics.

use crate::error::AppError;
use crate::models::{Task, TaskPriority, TaskStatus};
use crate::store::TaskStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Raw tallies as produced by a store. Missing keys mean zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub by_status: HashMap<TaskStatus, u64>,
    pub by_priority: HashMap<TaskPriority, u64>,
    pub overdue: u64,
}

impl TaskCounts {
    pub fn tally<'a, I>(tasks: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let mut counts = TaskCounts::default();
        for task in tasks {
            *counts.by_status.entry(task.status).or_default() += 1;
            *counts.by_priority.entry(task.priority).or_default() += 1;
            if task.is_overdue(now) {
                counts.overdue += 1;
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCount {
    pub priority: TaskPriority,
    pub count: u64,
}

/// Response body of `GET /api/tasks/stats/summary`.
///
/// Every status and every priority is listed, in declaration order, even when
/// its count is zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub status_stats: Vec<StatusCount>,
    pub priority_stats: Vec<PriorityCount>,
    pub overdue_count: u64,
}

impl TaskSummary {
    pub fn total(&self) -> u64 {
        self.status_stats.iter().map(|s| s.count).sum()
    }

    pub fn status_count(&self, status: TaskStatus) -> u64 {
        self.status_stats
            .iter()
            .find(|s| s.status == status)
            .map_or(0, |s| s.count)
    }

    pub fn priority_count(&self, priority: TaskPriority) -> u64 {
        self.priority_stats
            .iter()
            .find(|p| p.priority == priority)
            .map_or(0, |p| p.count)
    }
}

impl From<TaskCounts> for TaskSummary {
    fn from(counts: TaskCounts) -> Self {
        Self {
            status_stats: TaskStatus::ALL
                .into_iter()
                .map(|status| StatusCount {
                    status,
                    count: counts.by_status.get(&status).copied().unwrap_or(0),
                })
                .collect(),
            priority_stats: TaskPriority::ALL
                .into_iter()
                .map(|priority| PriorityCount {
                    priority,
                    count: counts.by_priority.get(&priority).copied().unwrap_or(0),
                })
                .collect(),
            overdue_count: counts.overdue,
        }
    }
}

/// Summarizes every task owned by `owner`, ignoring pagination.
pub async fn summarize(store: &dyn TaskStore, owner: Uuid) -> Result<TaskSummary, AppError> {
    let counts = store.count_tasks(owner, Utc::now()).await?;
    Ok(counts.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskInput;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn task(status: TaskStatus, priority: TaskPriority, due: Option<DateTime<Utc>>) -> Task {
        let mut task = Task::new(
            TaskInput {
                title: "t".into(),
                status: Some(status),
                priority: Some(priority),
                ..Default::default()
            }
            .into_new_task()
            .unwrap(),
            Uuid::nil(),
        );
        task.due_date = due;
        task
    }

    #[test]
    fn test_empty_summary_lists_every_bucket() {
        let summary = TaskSummary::from(TaskCounts::default());
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "statusStats": [
                    { "status": "pending", "count": 0 },
                    { "status": "in-progress", "count": 0 },
                    { "status": "completed", "count": 0 }
                ],
                "priorityStats": [
                    { "priority": "low", "count": 0 },
                    { "priority": "medium", "count": 0 },
                    { "priority": "high", "count": 0 }
                ],
                "overdueCount": 0
            })
        );
    }

    #[test]
    fn test_tally() {
        let now = Utc::now();
        let past = Some(now - Duration::days(2));
        let future = Some(now + Duration::days(2));
        let tasks = vec![
            task(TaskStatus::Pending, TaskPriority::High, past),
            task(TaskStatus::InProgress, TaskPriority::High, past),
            task(TaskStatus::Completed, TaskPriority::Low, past),
            task(TaskStatus::Pending, TaskPriority::Medium, future),
            task(TaskStatus::Pending, TaskPriority::Medium, None),
        ];

        let summary = TaskSummary::from(TaskCounts::tally(&tasks, now));

        assert_eq!(summary.total(), tasks.len() as u64);
        assert_eq!(summary.status_count(TaskStatus::Pending), 3);
        assert_eq!(summary.status_count(TaskStatus::InProgress), 1);
        assert_eq!(summary.status_count(TaskStatus::Completed), 1);
        assert_eq!(summary.priority_count(TaskPriority::Low), 1);
        assert_eq!(summary.priority_count(TaskPriority::Medium), 2);
        assert_eq!(summary.priority_count(TaskPriority::High), 2);
        assert_eq!(summary.overdue_count, 2);
        assert!(
            summary.overdue_count
                <= summary.total() - summary.status_count(TaskStatus::Completed)
        );
    }
}
