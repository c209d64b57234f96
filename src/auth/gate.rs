//! Per-request authentication.
//!
//! A request moves through `Unauthenticated -> TokenPresent -> TokenValid ->
//! PrincipalResolved`; a failure at any step ends it as an [`AuthRejection`].

use super::token::{TokenError, TokenIssuer};
use crate::error::AppError;
use crate::models::UserProfile;
use crate::store::UserStore;
use std::sync::Arc;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthRejection {
    #[error("no bearer token was provided")]
    NoToken,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    /// The token is genuine but its user no longer exists.
    #[error("token refers to an unknown user")]
    UnknownUser,
    #[error("authentication failed internally: {0}")]
    Internal(String),
}

impl From<TokenError> for AuthRejection {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Malformed => AuthRejection::Malformed,
            TokenError::BadSignature => AuthRejection::BadSignature,
            TokenError::Expired => AuthRejection::Expired,
            TokenError::Signing(detail) => AuthRejection::Internal(detail),
        }
    }
}

/// Expired tokens get their own message; every other token problem reads the same.
impl From<AuthRejection> for AppError {
    fn from(rejection: AuthRejection) -> AppError {
        match rejection {
            AuthRejection::NoToken => {
                AppError::Unauthorized("Access denied. No token provided.".into())
            }
            AuthRejection::Malformed | AuthRejection::BadSignature => {
                AppError::Unauthorized("Access denied. Invalid token.".into())
            }
            AuthRejection::Expired => AppError::Unauthorized("Access denied. Token expired.".into()),
            AuthRejection::UnknownUser => {
                AppError::Unauthorized("Access denied. User not found.".into())
            }
            AuthRejection::Internal(detail) => AppError::InternalServerError(format!(
                "Internal server error during authentication: {}",
                detail
            )),
        }
    }
}

/// Resolves an `Authorization` header into the requesting user.
#[derive(Clone)]
pub struct AuthGate {
    tokens: Arc<TokenIssuer>,
    users: Arc<dyn UserStore>,
}

impl AuthGate {
    pub fn new(tokens: Arc<TokenIssuer>, users: Arc<dyn UserStore>) -> Self {
        Self { tokens, users }
    }

    /// Extracts the token from a `Bearer <token>` header value.
    pub fn bearer_token(authorization: Option<&str>) -> Result<&str, AuthRejection> {
        let header = authorization.ok_or(AuthRejection::NoToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or(AuthRejection::Malformed)?;
        if token.is_empty() {
            return Err(AuthRejection::Malformed);
        }
        Ok(token)
    }

    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<UserProfile, AuthRejection> {
        let result = self.resolve(authorization).await;
        match &result {
            Ok(user) => log::debug!("authenticated user {}", user.id),
            Err(AuthRejection::Internal(detail)) => log::error!("auth gate failure: {}", detail),
            Err(rejection) => log::debug!("request rejected: {}", rejection),
        }
        result
    }

    async fn resolve(&self, authorization: Option<&str>) -> Result<UserProfile, AuthRejection> {
        let token = Self::bearer_token(authorization)?;
        let user_id = self.tokens.validate(token)?;
        self.users
            .find_user_by_id(user_id)
            .await
            .map_err(|e| AuthRejection::Internal(e.to_string()))?
            .ok_or(AuthRejection::UnknownUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::store::{MemoryStore, StoreError};
    use actix_web::ResponseError;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    struct FailingStore;

    #[async_trait]
    impl UserStore for FailingStore {
        async fn find_user_by_identifier(
            &self,
            _identifier: &str,
        ) -> Result<Option<crate::models::User>, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn find_user_by_id(&self, _id: Uuid) -> Result<Option<UserProfile>, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn create_user(&self, _user: NewUser) -> Result<crate::models::User, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn delete_user(&self, _id: Uuid) -> Result<bool, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
    }

    fn tokens() -> Arc<TokenIssuer> {
        Arc::new(TokenIssuer::new(b"gate-test-secret", Duration::days(7)))
    }

    async fn gate_with_user() -> (AuthGate, Arc<MemoryStore>, UserProfile) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create_user(NewUser {
                username: "alice".into(),
                email: "a@x.com".into(),
                password_hash: "hash".into(),
                first_name: None,
                last_name: None,
            })
            .await
            .unwrap();
        let gate = AuthGate::new(tokens(), store.clone());
        (gate, store, user.profile())
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(AuthGate::bearer_token(None), Err(AuthRejection::NoToken));
        assert_eq!(
            AuthGate::bearer_token(Some("Basic abc")),
            Err(AuthRejection::Malformed)
        );
        assert_eq!(
            AuthGate::bearer_token(Some("Bearer ")),
            Err(AuthRejection::Malformed)
        );
        assert_eq!(AuthGate::bearer_token(Some("Bearer abc")), Ok("abc"));
    }

    #[actix_rt::test]
    async fn test_valid_token_resolves_principal() {
        let (gate, _store, user) = gate_with_user().await;
        let token = gate.tokens.issue(user.id).unwrap();
        let header = format!("Bearer {}", token);

        assert_eq!(gate.authenticate(Some(header.as_str())).await, Ok(user));
    }

    #[actix_rt::test]
    async fn test_rejections() {
        let (gate, store, user) = gate_with_user().await;

        assert_eq!(gate.authenticate(None).await, Err(AuthRejection::NoToken));
        assert_eq!(
            gate.authenticate(Some("Bearer garbage")).await,
            Err(AuthRejection::Malformed)
        );

        let foreign = TokenIssuer::new(b"someone-else", Duration::days(7))
            .issue(user.id)
            .unwrap();
        assert_eq!(
            gate.authenticate(Some(format!("Bearer {}", foreign).as_str())).await,
            Err(AuthRejection::BadSignature)
        );

        let expired = gate
            .tokens
            .issue_at(user.id, Utc::now() - Duration::days(8))
            .unwrap();
        assert_eq!(
            gate.authenticate(Some(format!("Bearer {}", expired).as_str())).await,
            Err(AuthRejection::Expired)
        );

        let token = gate.tokens.issue(user.id).unwrap();
        assert!(store.delete_user(user.id).await.unwrap());
        assert_eq!(
            gate.authenticate(Some(format!("Bearer {}", token).as_str())).await,
            Err(AuthRejection::UnknownUser)
        );
    }

    #[actix_rt::test]
    async fn test_store_failure_is_internal() {
        let gate = AuthGate::new(tokens(), Arc::new(FailingStore));
        let token = gate.tokens.issue(Uuid::new_v4()).unwrap();

        let rejection = gate
            .authenticate(Some(format!("Bearer {}", token).as_str()))
            .await
            .unwrap_err();
        assert!(matches!(rejection, AuthRejection::Internal(_)));
        assert_eq!(AppError::from(rejection).status_code(), 500);
    }

    #[test]
    fn test_outward_messages() {
        let message = |r: AuthRejection| AppError::from(r).client_message().to_string();
        assert_eq!(message(AuthRejection::Malformed), message(AuthRejection::BadSignature));
        assert_eq!(message(AuthRejection::Expired), "Access denied. Token expired.");
        assert_eq!(
            AppError::from(AuthRejection::UnknownUser).status_code(),
            401
        );
    }
}
