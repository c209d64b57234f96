pub mod task;
pub mod user;

pub use task::{
    NewTask, OwnedTask, Task, TaskChanges, TaskInput, TaskPriority, TaskStatus, TaskUpdateInput,
};
pub use user::{NewUser, User, UserProfile, UserSummary};
