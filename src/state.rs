use std::sync::Arc;

use crate::auth::{Accounts, AuthGate, PasswordVerifier, TokenIssuer};
use crate::config::Config;
use crate::error::AppError;
use crate::store::{MemoryStore, PgStore, TaskStore, UserStore};

/// Everything a request handler needs, registered once as `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Accounts,
    pub gate: AuthGate,
    pub tasks: Arc<dyn TaskStore>,
}

impl AppState {
    /// Wires the account layer, the auth gate and the task store over one backing store.
    pub fn new<S>(store: Arc<S>, tokens: TokenIssuer, passwords: PasswordVerifier) -> Self
    where
        S: UserStore + TaskStore + 'static,
    {
        let tokens = Arc::new(tokens);
        let users: Arc<dyn UserStore> = store.clone();
        Self {
            accounts: Accounts::new(users.clone(), tokens.clone(), passwords),
            gate: AuthGate::new(tokens, users),
            tasks: store,
        }
    }

    /// Connects to Postgres when `DATABASE_URL` is set and falls back to the
    /// in-memory store otherwise.
    pub async fn from_config(config: &Config) -> Result<Self, AppError> {
        let tokens = TokenIssuer::new(config.jwt_secret.as_bytes(), config.jwt_ttl);
        let passwords = PasswordVerifier::new(config.bcrypt_cost)?;

        match &config.database_url {
            Some(url) => {
                let store = PgStore::connect(url).await?;
                log::info!("using postgres task store");
                Ok(Self::new(Arc::new(store), tokens, passwords))
            }
            None => {
                log::warn!("DATABASE_URL is not set; data lives in memory and is lost on restart");
                Ok(Self::new(Arc::new(MemoryStore::new()), tokens, passwords))
            }
        }
    }
}
