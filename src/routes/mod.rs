pub mod auth;
pub mod health;
pub mod tasks;

use actix_web::{web, HttpRequest};

use crate::auth::AuthMiddleware;
use crate::error::AppError;

fn json_error(err: actix_web::error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::debug!("rejected request body: {}", err);
    AppError::BadRequest(format!("Invalid request body: {}", err)).into()
}

fn query_error(err: actix_web::error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid query string: {}", err)).into()
}

/// Task ids that are not UUIDs cannot name an existing task.
fn path_error(err: actix_web::error::PathError, _req: &HttpRequest) -> actix_web::Error {
    log::debug!("unparsable task id: {}", err);
    AppError::NotFound("Task not found.".into()).into()
}

/// Registers everything under `/api`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .service(
            web::scope("/auth")
                .service(auth::register)
                .service(auth::login)
                .service(auth::me),
        )
        .service(
            web::scope("/tasks")
                .wrap(AuthMiddleware)
                .app_data(web::PathConfig::default().error_handler(path_error))
                .service(tasks::get_task_stats)
                .service(tasks::get_tasks)
                .service(tasks::create_task)
                .service(tasks::get_task)
                .service(tasks::update_task)
                .service(tasks::delete_task),
        );
}
