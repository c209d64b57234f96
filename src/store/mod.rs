//! Storage abstraction for users and tasks.
//!
//! Every task operation takes the owning user's id explicitly; the stores never
//! infer an owner. A task owned by someone else is reported exactly like a task
//! that does not exist. Tasks come back with their owner's summary attached,
//! read in the same snapshot as the task itself.

pub mod memory;
pub mod postgres;

use crate::error::AppError;
use crate::models::{NewTask, NewUser, OwnedTask, TaskChanges, User, UserProfile};
use crate::query::{PageWindow, TaskQuery};
use crate::stats::TaskCounts;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// The unique user attribute that a write collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Username => f.write_str("username"),
            UniqueField::Email => f.write_str("email"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A user with the same username or email already exists.
    #[error("a user with this {0} already exists")]
    Duplicate(UniqueField),

    /// The backend failed (connection, query, lock).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> AppError {
        match error {
            StoreError::Duplicate(UniqueField::Email) => {
                AppError::Conflict("User with this email or username already exists.".into())
            }
            StoreError::Duplicate(UniqueField::Username) => {
                AppError::Conflict("Username already taken.".into())
            }
            StoreError::Backend(detail) => AppError::DatabaseError(detail),
        }
    }
}

/// One page of tasks plus the number of tasks matching the query overall.
#[derive(Debug, Clone, Default)]
pub struct TaskRows {
    pub tasks: Vec<OwnedTask>,
    pub total: u64,
}

/// Persistence for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds the user whose email or username equals `identifier`.
    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError>;

    /// Finds a user by id, without the password hash.
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError>;

    /// Persists a new user. Fails with [`StoreError::Duplicate`] on a taken username or email.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Deletes a user together with all of their tasks, atomically.
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Owner-scoped persistence for tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, owner: Uuid, task: NewTask) -> Result<OwnedTask, StoreError>;

    async fn find_task(&self, id: Uuid, owner: Uuid) -> Result<Option<OwnedTask>, StoreError>;

    /// Applies `changes` and returns the updated task, or `None` if not found for `owner`.
    async fn update_task(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: &TaskChanges,
    ) -> Result<Option<OwnedTask>, StoreError>;

    /// Returns `false` when nothing was deleted.
    async fn delete_task(&self, id: Uuid, owner: Uuid) -> Result<bool, StoreError>;

    /// Filters, sorts and slices `owner`'s tasks. The page and the total come
    /// from the same snapshot.
    async fn find_tasks(
        &self,
        owner: Uuid,
        query: &TaskQuery,
        window: PageWindow,
    ) -> Result<TaskRows, StoreError>;

    /// Status, priority and overdue tallies over all of `owner`'s tasks, from
    /// one snapshot.
    async fn count_tasks(&self, owner: Uuid, now: DateTime<Utc>) -> Result<TaskCounts, StoreError>;
}
