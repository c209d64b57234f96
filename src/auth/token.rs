use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject of the token: the user's id.
    pub sub: Uuid,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

/// Why a token could not be issued or accepted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    /// Not a structurally valid token for this issuer.
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        match error.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        }
    }
}

/// Issuing can only fail on signing, which is a server fault. Requests use the
/// auth gate's rejections instead.
impl From<TokenError> for AppError {
    fn from(error: TokenError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

/// Issues and validates HS256 identity tokens.
///
/// Built once at startup from the configured secret and shared read-only by
/// every request.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Issues a token for `user_id` that expires one TTL from now.
    pub fn issue(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issues a token as if it had been minted at `issued_at`.
    pub fn issue_at(&self, user_id: Uuid, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| TokenError::Signing("token expiry is out of range".to_string()))?;
        let claims = Claims {
            sub: user_id,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verifies signature and expiry, returning the embedded user id.
    pub fn validate(&self, token: &str) -> Result<Uuid, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(TokenError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(secret.as_bytes(), Duration::days(7))
    }

    #[test]
    fn test_token_generation_and_verification() {
        let issuer = issuer("test_secret_for_gen_verify");
        let user_id = Uuid::new_v4();
        let token = issuer.issue(user_id).unwrap();
        assert_eq!(issuer.validate(&token), Ok(user_id));
    }

    #[test]
    fn test_claims_carry_ttl() {
        let issuer = issuer("test_secret_for_claims");
        let token = issuer.issue(Uuid::new_v4()).unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test_secret_for_claims"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(data.claims.exp - data.claims.iat, Duration::days(7).num_seconds());
    }

    #[test]
    fn test_token_expiration() {
        let issuer = issuer("test_secret_for_expiration");
        let minted = Utc::now() - Duration::days(7) - Duration::hours(2);
        let expired_token = issuer.issue_at(Uuid::new_v4(), minted).unwrap();

        assert_eq!(issuer.validate(&expired_token), Err(TokenError::Expired));
    }

    #[test]
    fn test_expiry_past_the_calendar_is_an_error() {
        let issuer = issuer("test_secret_for_overflow");
        let result = issuer.issue_at(Uuid::new_v4(), DateTime::<Utc>::MAX_UTC - Duration::days(1));
        assert!(matches!(result, Err(TokenError::Signing(_))));
    }

    #[test]
    fn test_invalid_token_signature() {
        let token = issuer("secret_one").issue(Uuid::new_v4()).unwrap();
        assert_eq!(
            issuer("a_completely_different_secret").validate(&token),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_tampered_signature() {
        let issuer = issuer("test_secret_for_tamper");
        let token = issuer.issue(Uuid::new_v4()).unwrap();

        let (unsigned, signature) = token.rsplit_once('.').unwrap();
        let first = signature.chars().next().unwrap();
        let swapped = if first == 'A' { 'B' } else { 'A' };
        let tampered = format!("{}.{}{}", unsigned, swapped, &signature[1..]);

        assert_eq!(issuer.validate(&tampered), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_payload() {
        let issuer = issuer("test_secret_for_payload");
        let token = issuer.issue(Uuid::new_v4()).unwrap();
        let other = issuer.issue(Uuid::new_v4()).unwrap();

        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert_eq!(issuer.validate(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_malformed_tokens() {
        let issuer = issuer("test_secret_for_malformed");
        assert_eq!(issuer.validate(""), Err(TokenError::Malformed));
        assert_eq!(issuer.validate("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(issuer.validate("a.b"), Err(TokenError::Malformed));
    }
}
