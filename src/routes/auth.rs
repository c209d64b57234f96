use crate::{
    auth::{AuthMiddleware, AuthenticatedUser, LoginRequest, RegisterRequest},
    error::AppError,
    state::AppState,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;

/// Register a new user
///
/// Creates a new user account and returns an authentication token.
#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    let response = state.accounts.register(register_data.into_inner()).await?;
    Ok(HttpResponse::Created().json(response))
}

/// Login user
///
/// Authenticates a user by email or username and returns an authentication token.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let response = state.accounts.login(login_data.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Returns the user the bearer token belongs to.
#[get("/me", wrap = "AuthMiddleware")]
pub async fn me(user: AuthenticatedUser) -> impl Responder {
    HttpResponse::Ok().json(json!({ "user": user.0 }))
}
