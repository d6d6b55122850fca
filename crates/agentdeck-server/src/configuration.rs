use crate::error::{to_env_var, ConfigError};
use agentdeck::collaborators::DUCKDUCKGO_BASE;
use agentdeck::dashboard::Intervals;
use agentdeck::generator::{Endpoints, LMSTUDIO_HOST, LOCALAI_HOST};
use agentdeck::providers::{anthropic::ANTHROPIC_HOST, ollama::OLLAMA_HOST, openai::OPENAI_HOST};
use agentdeck::relay::TELEGRAM_API_BASE;
use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::Other(config::ConfigError::Message(format!(
                "invalid listen address {}:{}",
                self.host, self.port
            ))))
    }
}

/// Base URLs of the local runtimes.
#[derive(Debug, Deserialize)]
pub struct BackendSettings {
    pub ollama: String,
    pub lmstudio: String,
    pub localai: String,
}

/// Base URLs of the hosted APIs. Their keys live in the credential store.
#[derive(Debug, Deserialize)]
pub struct ProviderSettings {
    pub openai: String,
    pub anthropic: String,
}

#[derive(Debug, Deserialize)]
pub struct RelaySettings {
    pub api_base: String,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct ProbeSettings {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct GenerationSettings {
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct SearchSettings {
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct FileSettings {
    pub root: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub backends: BackendSettings,
    pub providers: ProviderSettings,
    pub relay: RelaySettings,
    pub probe: ProbeSettings,
    pub generation: GenerationSettings,
    pub search: SearchSettings,
    pub files: FileSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("backends.ollama", OLLAMA_HOST)?
            .set_default("backends.lmstudio", LMSTUDIO_HOST)?
            .set_default("backends.localai", LOCALAI_HOST)?
            .set_default("providers.openai", OPENAI_HOST)?
            .set_default("providers.anthropic", ANTHROPIC_HOST)?
            .set_default("relay.api_base", TELEGRAM_API_BASE)?
            .set_default("relay.poll_interval_secs", 2)?
            .set_default("probe.interval_secs", 30)?
            .set_default("probe.timeout_secs", 5)?
            .set_default("generation.timeout_secs", 120)?
            .set_default("search.base_url", DUCKDUCKGO_BASE)?
            .set_default("files.root", "uploads")?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("AGENTDECK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => settings.validate(),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        for (key, secs) in [
            ("relay.poll_interval_secs", self.relay.poll_interval_secs),
            ("probe.interval_secs", self.probe.interval_secs),
            ("probe.timeout_secs", self.probe.timeout_secs),
            ("generation.timeout_secs", self.generation.timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Other(config::ConfigError::Message(format!(
                    "{} must be at least 1",
                    to_env_var(key)
                ))));
            }
        }
        Ok(self)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            ollama: self.backends.ollama.clone(),
            lmstudio: self.backends.lmstudio.clone(),
            localai: self.backends.localai.clone(),
            openai: self.providers.openai.clone(),
            anthropic: self.providers.anthropic.clone(),
        }
    }

    pub fn intervals(&self) -> Intervals {
        Intervals {
            probe: Duration::from_secs(self.probe.interval_secs),
            probe_timeout: Duration::from_secs(self.probe.timeout_secs),
            relay_poll: Duration::from_secs(self.relay.poll_interval_secs),
        }
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation.timeout_secs)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}
