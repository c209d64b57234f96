use super::password::PasswordVerifier;
use super::token::TokenIssuer;
use super::{AuthResponse, LoginRequest, RegisterRequest};
use crate::error::AppError;
use crate::models::NewUser;
use crate::store::UserStore;
use std::sync::Arc;
use validator::Validate;

pub const MIN_PASSWORD_LENGTH: usize = 6;

const INVALID_CREDENTIALS: &str = "Invalid credentials.";

/// Registration and login on top of the credential store.
#[derive(Clone)]
pub struct Accounts {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenIssuer>,
    passwords: PasswordVerifier,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Accounts {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<TokenIssuer>, passwords: PasswordVerifier) -> Self {
        Self {
            users,
            tokens,
            passwords,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AppError> {
        let request = RegisterRequest {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password: request.password,
            first_name: blank_to_none(request.first_name),
            last_name: blank_to_none(request.last_name),
        };

        if request.username.is_empty() || request.email.is_empty() || request.password.is_empty() {
            return Err(AppError::BadRequest(
                "Username, email, and password are required.".into(),
            ));
        }
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters long.",
                MIN_PASSWORD_LENGTH
            )));
        }
        request.validate()?;

        // Checked up front so the common case answers before paying for a hash.
        // The store still enforces uniqueness when two registrations race.
        if self.users.find_user_by_identifier(&request.email).await?.is_some() {
            return Err(AppError::Conflict(
                "User with this email or username already exists.".into(),
            ));
        }
        if self
            .users
            .find_user_by_identifier(&request.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already taken.".into()));
        }

        let password_hash = self.passwords.hash(request.password).await?;
        let user = self
            .users
            .create_user(NewUser {
                username: request.username,
                email: request.email,
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
            })
            .await?;

        log::info!("registered user {}", user.id);
        Ok(AuthResponse {
            message: "User registered successfully.".into(),
            token: self.tokens.issue(user.id)?,
            user: user.into(),
        })
    }

    /// Unknown identifiers and wrong passwords produce the same error.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AppError> {
        let identifier = request.identifier.trim();
        if identifier.is_empty() || request.password.is_empty() {
            return Err(AppError::BadRequest(
                "Email/username and password are required.".into(),
            ));
        }

        let user = match self.users.find_user_by_identifier(identifier).await? {
            Some(user) => user,
            None => {
                self.passwords.verify_dummy(request.password).await?;
                log::debug!("login failed: unknown identifier");
                return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
            }
        };

        if !self
            .passwords
            .verify(request.password, user.password_hash.clone())
            .await?
        {
            log::debug!("login failed: wrong password for user {}", user.id);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        Ok(AuthResponse {
            message: "Login successful.".into(),
            token: self.tokens.issue(user.id)?,
            user: user.into(),
        })
    }
}
