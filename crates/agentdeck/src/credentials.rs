use parking_lot::RwLock;
use std::collections::HashMap;
use std::env;
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
use mockall::automock;
#[cfg(test)]
use mockall::predicate::*;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

/// Credentials the dashboard knows how to use.
pub const KNOWN_CREDENTIALS: &[&str] = &[OPENAI_API_KEY, ANTHROPIC_API_KEY];

#[derive(Error, Debug, PartialEq)]
pub enum CredentialError {
    #[error("Could not find {0} in the credential store or environment variables")]
    Missing(String),

    #[error("Failed to access environment variable: {0}")]
    EnvVarAccess(String),

    #[error("Unknown credential name: {0}")]
    UnknownName(String),
}

impl From<env::VarError> for CredentialError {
    fn from(err: env::VarError) -> Self {
        CredentialError::EnvVarAccess(err.to_string())
    }
}

#[cfg_attr(test, automock)]
pub trait Environment: Send + Sync {
    fn get_var(&self, key: &str) -> std::result::Result<String, env::VarError>;
}

pub struct RealEnvironment;

impl Environment for RealEnvironment {
    fn get_var(&self, key: &str) -> std::result::Result<String, env::VarError> {
        env::var(key)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub enum KeyRetrievalStrategy {
    /// Only look in environment variables
    EnvironmentOnly,
    /// Only look in the dashboard's own store
    StoreOnly,
    /// Try the store first, then environment variables
    #[default]
    Both,
}

/// Opaque key/value source of provider credentials.
pub trait CredentialStore: Send + Sync {
    fn get(&self, name: &str) -> Result<String, CredentialError>;

    fn set(&self, name: &str, value: &str) -> Result<(), CredentialError>;

    /// Returns whether a stored value was removed.
    fn clear(&self, name: &str) -> bool;

    fn is_configured(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }
}

/// Credentials entered through the dashboard, held for the life of the
/// process, with the process environment as fallback.
pub struct MemoryCredentials<E: Environment = RealEnvironment> {
    keys: RwLock<HashMap<String, String>>,
    env: E,
    strategy: KeyRetrievalStrategy,
}

impl MemoryCredentials<RealEnvironment> {
    pub fn new() -> Self {
        Self::with_environment(RealEnvironment, KeyRetrievalStrategy::default())
    }
}

impl Default for MemoryCredentials<RealEnvironment> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Environment> MemoryCredentials<E> {
    pub fn with_environment(env: E, strategy: KeyRetrievalStrategy) -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            env,
            strategy,
        }
    }
}

impl<E: Environment> CredentialStore for MemoryCredentials<E> {
    fn get(&self, name: &str) -> Result<String, CredentialError> {
        let keys = self.keys.read();
        get_api_key(name, self.strategy, &keys, &self.env)
    }

    fn set(&self, name: &str, value: &str) -> Result<(), CredentialError> {
        if !KNOWN_CREDENTIALS.contains(&name) {
            return Err(CredentialError::UnknownName(name.to_string()));
        }
        self.keys.write().insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, name: &str) -> bool {
        self.keys.write().remove(name).is_some()
    }
}

pub fn get_api_key(
    api_key_name: &str,
    strategy: KeyRetrievalStrategy,
    store: &HashMap<String, String>,
    env: &impl Environment,
) -> Result<String, CredentialError> {
    let from_store = || {
        store
            .get(api_key_name)
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .ok_or_else(|| CredentialError::Missing(api_key_name.to_string()))
    };
    let from_env = || {
        env.get_var(api_key_name)
            .map_err(CredentialError::from)
            .and_then(|value| {
                if value.trim().is_empty() {
                    Err(CredentialError::Missing(api_key_name.to_string()))
                } else {
                    Ok(value)
                }
            })
    };

    match strategy {
        KeyRetrievalStrategy::EnvironmentOnly => from_env(),
        KeyRetrievalStrategy::StoreOnly => from_store(),
        KeyRetrievalStrategy::Both => match from_store() {
            Ok(key) => Ok(key),
            Err(e) => {
                debug!("{} not in credential store ({}), trying environment", api_key_name, e);
                from_env().map_err(|_| CredentialError::Missing(api_key_name.to_string()))
            }
        },
    }
}
