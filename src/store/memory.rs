use super::{StoreError, TaskRows, TaskStore, UniqueField, UserStore};
use crate::models::{NewTask, NewUser, OwnedTask, Task, TaskChanges, User, UserProfile};
use crate::query::{PageWindow, TaskQuery};
use crate::stats::TaskCounts;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tasks: HashMap<Uuid, Task>,
}

/// Pairs a task with its owner's summary.
fn with_owner(users: &HashMap<Uuid, User>, task: &Task) -> Result<OwnedTask, StoreError> {
    let owner = users
        .get(&task.user_id)
        .ok_or_else(|| StoreError::Backend(format!("task {} has no owner", task.id)))?;
    Ok(OwnedTask {
        task: task.clone(),
        user: owner.summary(),
    })
}

/// Process-local store used by the test suite and when no `DATABASE_URL` is set.
///
/// Users and tasks share one lock, so every operation sees a consistent snapshot
/// and multi-record writes are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .users
            .values()
            .find(|u| u.matches_identifier(identifier))
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.read()?.users.get(&id).map(User::profile))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.write()?;
        for existing in tables.users.values() {
            if existing.email == user.email {
                return Err(StoreError::Duplicate(UniqueField::Email));
            }
            if existing.username == user.username {
                return Err(StoreError::Duplicate(UniqueField::Username));
            }
        }
        let user = User::new(user);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }
        tables.tasks.retain(|_, task| task.user_id != id);
        Ok(true)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_task(&self, owner: Uuid, task: NewTask) -> Result<OwnedTask, StoreError> {
        let mut tables = self.write()?;
        let user = tables
            .users
            .get(&owner)
            .map(User::summary)
            .ok_or_else(|| StoreError::Backend(format!("owner {} does not exist", owner)))?;
        let task = Task::new(task, owner);
        tables.tasks.insert(task.id, task.clone());
        Ok(OwnedTask { task, user })
    }

    async fn find_task(&self, id: Uuid, owner: Uuid) -> Result<Option<OwnedTask>, StoreError> {
        let tables = self.read()?;
        tables
            .tasks
            .get(&id)
            .filter(|task| task.user_id == owner)
            .map(|task| with_owner(&tables.users, task))
            .transpose()
    }

    async fn update_task(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: &TaskChanges,
    ) -> Result<Option<OwnedTask>, StoreError> {
        let mut tables = self.write()?;
        let Tables { users, tasks } = &mut *tables;
        match tasks.get_mut(&id).filter(|task| task.user_id == owner) {
            Some(task) => {
                changes.apply(task, Utc::now());
                with_owner(users, task).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn delete_task(&self, id: Uuid, owner: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        let owned = tables.tasks.get(&id).map_or(false, |task| task.user_id == owner);
        if owned {
            tables.tasks.remove(&id);
        }
        Ok(owned)
    }

    async fn find_tasks(
        &self,
        owner: Uuid,
        query: &TaskQuery,
        window: PageWindow,
    ) -> Result<TaskRows, StoreError> {
        let tables = self.read()?;
        let mut matching: Vec<&Task> = tables
            .tasks
            .values()
            .filter(|task| task.user_id == owner && query.filter.matches(task))
            .collect();
        matching.sort_by(|a, b| query.compare(a, b));

        let total = matching.len() as u64;
        let tasks = matching
            .into_iter()
            .skip(usize::try_from(window.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(window.limit).unwrap_or(usize::MAX))
            .map(|task| with_owner(&tables.users, task))
            .collect::<Result<_, _>>()?;
        Ok(TaskRows { tasks, total })
    }

    async fn count_tasks(&self, owner: Uuid, now: DateTime<Utc>) -> Result<TaskCounts, StoreError> {
        let tables = self.read()?;
        Ok(TaskCounts::tally(
            tables.tasks.values().filter(|task| task.user_id == owner),
            now,
        ))
    }
}
