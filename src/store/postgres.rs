use super::{StoreError, TaskRows, TaskStore, UniqueField, UserStore};
use crate::models::{
    NewTask, NewUser, OwnedTask, Task, TaskChanges, TaskPriority, TaskStatus, User, UserProfile,
    UserSummary,
};
use crate::query::{PageWindow, SortField, TaskQuery};
use crate::stats::TaskCounts;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, created_at, updated_at";
const PROFILE_COLUMNS: &str = "id, username, email, first_name, last_name, created_at";
const TASK_COLUMNS: &str =
    "id, title, description, status, priority, due_date, user_id, created_at, updated_at";
/// Task columns plus the owner summary, over `tasks` joined with `users`.
const OWNED_TASK_COLUMNS: &str = "tasks.id, tasks.title, tasks.description, tasks.status, \
     tasks.priority, tasks.due_date, tasks.user_id, tasks.created_at, tasks.updated_at, \
     users.username, users.first_name, users.last_name";
const JOIN_OWNER: &str = "JOIN users ON users.id = tasks.user_id";

/// Postgres-backed store. The schema lives in `migrations/`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Maps unique violations on the users table to [`StoreError::Duplicate`].
impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db) = &error {
            if db.code().as_deref() == Some("23505") {
                let field = match db.constraint() {
                    Some(name) if name.contains("username") => UniqueField::Username,
                    _ => UniqueField::Email,
                };
                return StoreError::Duplicate(field);
            }
        }
        StoreError::Backend(error.to_string())
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Opens a read-only transaction so that several reads share one snapshot.
    async fn snapshot(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

impl<'r> FromRow<'r, PgRow> for OwnedTask {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OwnedTask {
            task: Task::from_row(row)?,
            user: UserSummary::from_row(row)?,
        })
    }
}

/// Ordering expression for a sort field. Titles compare lowercased and
/// byte-wise, matching the in-memory store.
fn sort_key(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "tasks.created_at",
        SortField::UpdatedAt => "tasks.updated_at",
        SortField::DueDate => "tasks.due_date",
        SortField::Priority => "tasks.priority",
        SortField::Title => "LOWER(tasks.title) COLLATE \"C\"",
        SortField::Status => "tasks.status",
    }
}

fn push_task_scope<'a>(builder: &mut QueryBuilder<'a, Postgres>, owner: Uuid, query: &TaskQuery) {
    builder.push(" WHERE tasks.user_id = ").push_bind(owner);
    if let Some(status) = query.filter.status {
        builder.push(" AND tasks.status = ").push_bind(status);
    }
    if let Some(priority) = query.filter.priority {
        builder.push(" AND tasks.priority = ").push_bind(priority);
    }
}

fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {} FROM users WHERE email = $1 OR username = $1 LIMIT 1",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", PROFILE_COLUMNS);
        Ok(sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let user = User::new(user);
        let sql = format!(
            "INSERT INTO users ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {cols}",
            cols = USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM tasks WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_task(&self, owner: Uuid, task: NewTask) -> Result<OwnedTask, StoreError> {
        let task = Task::new(task, owner);
        let sql = format!(
            "WITH written AS (INSERT INTO tasks ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {cols}) SELECT {owned} FROM written AS tasks {join}",
            cols = TASK_COLUMNS,
            owned = OWNED_TASK_COLUMNS,
            join = JOIN_OWNER
        );
        Ok(sqlx::query_as::<_, OwnedTask>(&sql)
            .bind(task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.status)
            .bind(task.priority)
            .bind(task.due_date)
            .bind(task.user_id)
            .bind(task.created_at)
            .bind(task.updated_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_task(&self, id: Uuid, owner: Uuid) -> Result<Option<OwnedTask>, StoreError> {
        let sql = format!(
            "SELECT {} FROM tasks {} WHERE tasks.id = $1 AND tasks.user_id = $2",
            OWNED_TASK_COLUMNS, JOIN_OWNER
        );
        Ok(sqlx::query_as::<_, OwnedTask>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_task(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: &TaskChanges,
    ) -> Result<Option<OwnedTask>, StoreError> {
        let mut builder =
            QueryBuilder::<Postgres>::new("WITH written AS (UPDATE tasks SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(title) = &changes.title {
            builder.push(", title = ").push_bind(title.clone());
        }
        if let Some(description) = &changes.description {
            builder.push(", description = ").push_bind(description.clone());
        }
        if let Some(status) = changes.status {
            builder.push(", status = ").push_bind(status);
        }
        if let Some(priority) = changes.priority {
            builder.push(", priority = ").push_bind(priority);
        }
        if let Some(due_date) = changes.due_date {
            builder.push(", due_date = ").push_bind(due_date);
        }
        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND user_id = ")
            .push_bind(owner)
            .push(" RETURNING ")
            .push(TASK_COLUMNS)
            .push(format!(
                ") SELECT {} FROM written AS tasks {}",
                OWNED_TASK_COLUMNS, JOIN_OWNER
            ));

        Ok(builder
            .build_query_as::<OwnedTask>()
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_task(&self, id: Uuid, owner: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_tasks(
        &self,
        owner: Uuid,
        query: &TaskQuery,
        window: PageWindow,
    ) -> Result<TaskRows, StoreError> {
        let mut tx = self.snapshot().await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tasks");
        push_task_scope(&mut count, owner, query);
        let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

        // Column and direction come from the SortField/SortOrder allow-lists.
        let mut page = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM tasks {}",
            OWNED_TASK_COLUMNS, JOIN_OWNER
        ));
        push_task_scope(&mut page, owner, query);
        page.push(format!(
            " ORDER BY {} {}, tasks.id ASC",
            sort_key(query.sort_by),
            query.sort_order.keyword()
        ));
        page.push(" LIMIT ")
            .push_bind(i64::try_from(window.limit).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(window.offset).unwrap_or(i64::MAX));
        let tasks = page.build_query_as::<OwnedTask>().fetch_all(&mut *tx).await?;

        tx.commit().await?;
        Ok(TaskRows {
            tasks,
            total: to_count(total),
        })
    }

    async fn count_tasks(&self, owner: Uuid, now: DateTime<Utc>) -> Result<TaskCounts, StoreError> {
        let mut tx = self.snapshot().await?;

        let by_status: Vec<(TaskStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM tasks WHERE user_id = $1 GROUP BY status",
        )
        .bind(owner)
        .fetch_all(&mut *tx)
        .await?;

        let by_priority: Vec<(TaskPriority, i64)> = sqlx::query_as(
            "SELECT priority, COUNT(*) FROM tasks WHERE user_id = $1 GROUP BY priority",
        )
        .bind(owner)
        .fetch_all(&mut *tx)
        .await?;

        let overdue: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks WHERE user_id = $1 AND due_date < $2 AND status <> $3",
        )
        .bind(owner)
        .bind(now)
        .bind(TaskStatus::Completed)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(TaskCounts {
            by_status: by_status
                .into_iter()
                .map(|(status, n)| (status, to_count(n)))
                .collect(),
            by_priority: by_priority
                .into_iter()
                .map(|(priority, n)| (priority, to_count(n)))
                .collect(),
            overdue: to_count(overdue),
        })
    }
}
