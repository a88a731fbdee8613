//! Server Configuration
//!
//! Everything is read from the environment (after `.env` is loaded).

use agent_core::reasoning::DEFAULT_MAX_ROUND_TRIPS;
use agent_core::{AgentError, Result};
use agent_runtime::GeminiConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://tasks.db?mode=rwc";

/// Which task store backs the tools
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite { url: String },
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub store: StoreBackend,
    pub max_round_trips: usize,
    pub gemini: GeminiConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let gemini = GeminiConfig::from_env()?;
        Self::from_lookup(gemini, |key| std::env::var(key).ok())
    }

    fn from_lookup(gemini: GeminiConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let store = match lookup("TASK_STORE").as_deref().map(str::trim) {
            None | Some("" | "memory") => StoreBackend::Memory,
            Some("sqlite") => StoreBackend::Sqlite {
                url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            },
            Some(other) => {
                return Err(AgentError::Config(format!(
                    "TASK_STORE must be 'memory' or 'sqlite', got '{other}'"
                )));
            }
        };

        let max_round_trips = match lookup("AGENT_MAX_ROUND_TRIPS") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    AgentError::Config(format!(
                        "AGENT_MAX_ROUND_TRIPS must be a positive number, got '{raw}'"
                    ))
                })?,
            None => DEFAULT_MAX_ROUND_TRIPS,
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            store,
            max_round_trips,
            gemini,
        })
    }
}
