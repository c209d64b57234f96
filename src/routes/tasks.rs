use crate::{
    auth::AuthenticatedUser,
    error::AppError,
    models::{TaskInput, TaskUpdateInput},
    query::{self, TaskListParams, TaskQuery},
    state::AppState,
    stats,
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde_json::json;
use uuid::Uuid;

fn task_not_found() -> AppError {
    AppError::NotFound("Task not found.".into())
}

/// Retrieves one page of the authenticated user's tasks.
///
/// ## Query Parameters:
/// - `status`, `priority` (optional): exact-match filters. Unknown values are ignored.
/// - `sortBy` (optional): one of `createdAt`, `updatedAt`, `dueDate`, `priority`,
///   `title`, `status`. Defaults to `createdAt`.
/// - `sortOrder` (optional): `asc` or `desc`. Defaults to `desc`.
/// - `page`, `limit` (optional): positive integers, defaulting to 1 and 10.
///
/// ## Responses:
/// - `200 OK`: `{ tasks, pagination }`. Each task carries its owner under `user`.
/// - `400 Bad Request`: invalid sort or paging parameters.
/// - `401 Unauthorized`: missing or invalid token.
#[get("")]
pub async fn get_tasks(
    state: web::Data<AppState>,
    params: web::Query<TaskListParams>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let query = TaskQuery::try_from(params.into_inner())?;
    let page = query::list_tasks(state.tasks.as_ref(), user.id(), &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Status, priority and overdue counts over all of the user's tasks.
#[get("/stats/summary")]
pub async fn get_task_stats(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let summary = stats::summarize(state.tasks.as_ref(), user.id()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Fetches a single task, returned bare with its owner under `user`. Tasks owned
/// by someone else are reported as missing.
#[get("/{id}")]
pub async fn get_task(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task = state
        .tasks
        .find_task(path.into_inner(), user.id())
        .await?
        .ok_or_else(task_not_found)?;
    Ok(HttpResponse::Ok().json(task))
}

/// Creates a new task for the authenticated user.
///
/// ## Request Body:
/// - `title`: required, at most 200 characters.
/// - `description` (optional).
/// - `status` (optional): `pending`, `in-progress` or `completed`. Defaults to `pending`.
/// - `priority` (optional): `low`, `medium` or `high`. Defaults to `medium`.
/// - `dueDate` (optional): RFC 3339 timestamp or `YYYY-MM-DD`.
///
/// ## Responses:
/// - `201 Created`: `{ message, task }`.
/// - `400 Bad Request`: missing title, unknown enum value or bad date.
#[post("")]
pub async fn create_task(
    state: web::Data<AppState>,
    task_data: web::Json<TaskInput>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let new_task = task_data.into_inner().into_new_task()?;
    let task = state.tasks.create_task(user.id(), new_task).await?;
    log::debug!("user {} created task {}", user.id(), task.task.id);

    Ok(HttpResponse::Created().json(json!({
        "message": "Task created successfully.",
        "task": task
    })))
}

/// Applies a partial update. Absent fields are left unchanged.
#[put("/{id}")]
pub async fn update_task(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    task_data: web::Json<TaskUpdateInput>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let changes = task_data.into_inner().into_changes()?;
    let task = state
        .tasks
        .update_task(path.into_inner(), user.id(), &changes)
        .await?
        .ok_or_else(task_not_found)?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Task updated successfully.",
        "task": task
    })))
}

#[delete("/{id}")]
pub async fn delete_task(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let task_id = path.into_inner();
    if !state.tasks.delete_task(task_id, user.id()).await? {
        return Err(task_not_found());
    }
    log::debug!("user {} deleted task {}", user.id(), task_id);

    Ok(HttpResponse::Ok().json(json!({ "message": "Task deleted successfully." })))
}
