#![allow(dead_code)]

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test, web, Error,
};
use chrono::Duration;
use serde_json::{json, Value};
use std::sync::Arc;
use taskvault::auth::{AuthResponse, PasswordVerifier, TokenIssuer};
use taskvault::store::MemoryStore;
use taskvault::AppState;

pub const SECRET: &[u8] = b"integration-test-secret";
pub const PASSWORD: &str = "secret1";

/// Builds the full application the way `main` does, minus CORS.
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(actix_web::middleware::Logger::default())
                .app_data($state.clone())
                .service(taskvault::routes::health::health)
                .service(actix_web::web::scope("/api").configure(taskvault::routes::config)),
        )
        .await
    };
}

pub fn tokens() -> TokenIssuer {
    TokenIssuer::new(SECRET, Duration::days(7))
}

/// A fresh in-memory application state. The store is returned too so tests can
/// reach behind the HTTP surface.
pub fn state() -> (web::Data<AppState>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    // bcrypt at its minimum cost keeps the suite fast.
    let passwords = PasswordVerifier::new(4).unwrap();
    let state = AppState::new(store.clone(), tokens(), passwords);
    (web::Data::new(state), store)
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// Sends `req` and returns the status with the JSON body (`Null` if empty).
pub async fn send<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let bytes = test::read_body(resp).await;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub async fn register<S, B>(app: &S, username: &str, email: &str) -> AuthResponse
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "username": username,
            "email": email,
            "password": PASSWORD
        }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    serde_json::from_value(body).unwrap()
}

/// Creates a task and returns its JSON representation.
pub async fn create_task<S, B>(app: &S, token: &str, payload: Value) -> Value
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/tasks")
        .insert_header(bearer(token))
        .set_json(payload)
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "task creation failed: {}", body);
    body["task"].clone()
}

pub async fn get<S, B>(app: &S, token: &str, uri: &str) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    let req = test::TestRequest::get()
        .uri(uri)
        .insert_header(bearer(token))
        .to_request();
    send(app, req).await
}
