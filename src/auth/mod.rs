pub mod accounts;
pub mod extractors;
pub mod gate;
pub mod middleware;
pub mod password;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::UserProfile;

// Re-export necessary items
pub use accounts::Accounts;
pub use extractors::AuthenticatedUser;
pub use gate::{AuthGate, AuthRejection};
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password, PasswordVerifier};
pub use token::{Claims, TokenError, TokenIssuer};

lazy_static! {
    // Regex for username validation: alphanumeric, underscores, hyphens
    static ref USERNAME_REGEX: regex::Regex = regex::Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Represents the payload for a user login request.
///
/// The identifier is matched against both email and username, so clients may
/// send it under any of the three names.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "email", alias = "username")]
    pub identifier: String,
    #[serde(default)]
    pub password: String,
}

/// Represents the payload for a new user registration request.
///
/// Missing fields deserialize as empty so the account layer can answer with a
/// single "required" message instead of a serde error.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Between 1 and 50 characters: letters, digits, underscores or hyphens.
    #[serde(default)]
    #[validate(
        length(min = 1, max = 50),
        regex(
            path = "USERNAME_REGEX",
            message = "Username must be alphanumeric, underscores, or hyphens"
        )
    )]
    pub username: String,
    #[serde(default)]
    #[validate(email, length(max = 100))]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[validate(length(max = 50))]
    pub first_name: Option<String>,
    #[validate(length(max = 50))]
    pub last_name: Option<String>,
}

/// Response structure after successful authentication (login or registration).
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    /// The JWT (JSON Web Token) for session authentication.
    pub token: String,
    pub user: UserProfile,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn register(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_login_request_accepts_any_identifier_name() {
        for body in [
            r#"{"identifier":"alice","password":"pw"}"#,
            r#"{"username":"alice","password":"pw"}"#,
            r#"{"email":"alice","password":"pw"}"#,
        ] {
            let request: LoginRequest = serde_json::from_str(body).unwrap();
            assert_eq!(request.identifier, "alice");
            assert_eq!(request.password, "pw");
        }

        let empty: LoginRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.identifier.is_empty());
    }

    #[test]
    fn test_register_request_validation() {
        assert!(register("test_user-123", "test@example.com").validate().is_ok());
        // Contains space and exclamation
        assert!(register("test user!", "test@example.com").validate().is_err());
        assert!(register(&"u".repeat(51), "test@example.com").validate().is_err());
        assert!(register("tu", "testexample.com").validate().is_err());

        let long_email = format!("{}@example.com", "e".repeat(95));
        assert!(register("tu", &long_email).validate().is_err());

        let named = RegisterRequest {
            first_name: Some("n".repeat(51)),
            ..register("tu", "test@example.com")
        };
        assert!(named.validate().is_err());
    }

    #[test]
    fn test_register_request_reads_camel_case_names() {
        let request: RegisterRequest = serde_json::from_str(
            r#"{"username":"alice","email":"a@x.com","password":"secret1","firstName":"Alice"}"#,
        )
        .unwrap();
        assert_eq!(request.first_name.as_deref(), Some("Alice"));
        assert_eq!(request.last_name, None);
    }
}
