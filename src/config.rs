use chrono::Duration;
use std::env;

/// Lowest bcrypt work factor accepted outside of tests.
pub const MIN_BCRYPT_COST: u32 = 10;
/// Highest work factor bcrypt supports.
pub const MAX_BCRYPT_COST: u32 = 31;
/// Longest token lifetime accepted from `JWT_EXPIRE`, in days.
pub const MAX_JWT_TTL_DAYS: i64 = 3650;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Process-wide settings, loaded once at startup and shared read-only afterwards.
pub struct Config {
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub bcrypt_cost: u32,
    pub cors_origin: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("server_port", &self.server_port)
            .field("server_host", &self.server_host)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_ttl", &self.jwt_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("cors_origin", &self.cors_origin)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let jwt_ttl = match var("JWT_EXPIRE") {
            Some(raw) => parse_ttl(&raw).ok_or_else(|| ConfigError::Invalid {
                name: "JWT_EXPIRE",
                reason: format!(
                    "'{}' is not a duration like 7d, 12h, 30m or 3600 of at most {} days",
                    raw, MAX_JWT_TTL_DAYS
                ),
            })?,
            None => Duration::days(7),
        };

        let bcrypt_cost = match var("BCRYPT_COST") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|cost| (MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(cost))
                .ok_or_else(|| ConfigError::Invalid {
                    name: "BCRYPT_COST",
                    reason: format!(
                        "'{}' is not a number between {} and {}",
                        raw, MIN_BCRYPT_COST, MAX_BCRYPT_COST
                    ),
                })?,
            None => bcrypt::DEFAULT_COST,
        };

        let server_port = match var("SERVER_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "SERVER_PORT",
                reason: format!("'{}' is not a port number", raw),
            })?,
            None => 8080,
        };

        Ok(Self {
            database_url: var("DATABASE_URL"),
            server_port,
            server_host: var("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            jwt_secret,
            jwt_ttl,
            bcrypt_cost,
            cors_origin: var("CORS_ORIGIN"),
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

/// Parses `7d`, `12h`, `30m`, `45s` or a bare number of seconds, up to
/// `MAX_JWT_TTL_DAYS`.
fn parse_ttl(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last()? {
        (idx, c) if c.is_ascii_alphabetic() => (&raw[..idx], Some(c.to_ascii_lowercase())),
        _ => (raw, None),
    };
    let amount: i64 = digits.parse().ok().filter(|n| *n > 0)?;
    let ttl = match unit {
        None | Some('s') => Duration::try_seconds(amount),
        Some('m') => Duration::try_minutes(amount),
        Some('h') => Duration::try_hours(amount),
        Some('d') => Duration::try_days(amount),
        Some(_) => None,
    }?;
    Some(ttl).filter(|ttl| *ttl <= Duration::days(MAX_JWT_TTL_DAYS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();

        assert_eq!(config.database_url, None);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.jwt_ttl, Duration::days(7));
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.server_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_config_custom_values() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://test"),
            ("SERVER_PORT", "3000"),
            ("SERVER_HOST", "0.0.0.0"),
            ("JWT_EXPIRE", "12h"),
            ("BCRYPT_COST", "10"),
        ]))
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://test"));
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.jwt_ttl, Duration::hours(12));
        assert_eq!(config.bcrypt_cost, 10);
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));

        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn test_weak_bcrypt_cost_is_rejected() {
        let result = Config::from_lookup(lookup(&[("JWT_SECRET", "x"), ("BCRYPT_COST", "4")]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { name: "BCRYPT_COST", .. })
        ));
    }

    #[test]
    fn test_parse_ttl() {
        assert_eq!(parse_ttl("7d"), Some(Duration::days(7)));
        assert_eq!(parse_ttl("30m"), Some(Duration::minutes(30)));
        assert_eq!(parse_ttl("45s"), Some(Duration::seconds(45)));
        assert_eq!(parse_ttl("3600"), Some(Duration::seconds(3600)));
        assert_eq!(parse_ttl("2H"), Some(Duration::hours(2)));
        assert_eq!(parse_ttl("0d"), None);
        assert_eq!(parse_ttl("7w"), None);
        assert_eq!(parse_ttl("d"), None);
        assert_eq!(parse_ttl(""), None);
        assert_eq!(parse_ttl("3650d"), Some(Duration::days(3650)));
        assert_eq!(parse_ttl("3651d"), None);
    }

    #[test]
    fn test_huge_ttl_is_a_config_error() {
        for raw in ["99999999999999d", "1000000000000000", "9223372036854775807s", "400000h"] {
            let result = Config::from_lookup(lookup(&[("JWT_SECRET", "x"), ("JWT_EXPIRE", raw)]));
            assert!(
                matches!(result, Err(ConfigError::Invalid { name: "JWT_EXPIRE", .. })),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "top-secret-value")])).unwrap();
        assert!(!format!("{:?}", config).contains("top-secret-value"));
    }
}
