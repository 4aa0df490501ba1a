use std::path::PathBuf;

use teloxide::types::ChatId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} is invalid ({value:?}): {problem}")]
    Invalid {
        name: &'static str,
        value: String,
        problem: String,
    },
}

/// Where records are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// A sqlx SQLite URL, like `sqlite:recruits.sqlite`.
    Sqlite { url: String },
    /// A directory holding `blacklist-data.json` and `recruits-data.json`.
    JsonFiles { dir: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub storage: StorageConfig,
    /// Staff chat. Its administrators are managers.
    pub control_chat: ChatId,
    /// Where blacklist entries get posted.
    pub blacklist_chat: ChatId,
    /// Where recruit requests get posted for approval.
    pub approval_chat: ChatId,
    /// How many recruiters the leaderboard shows.
    pub ranking_limit: usize,
}

impl Config {
    pub const DEFAULT_RANKING_LIMIT: usize = 10;

    /// Reads the configuration from the process environment,
    /// after loading a `.env` file if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let storage = match get("DATABASE_URL") {
            Some(url) => StorageConfig::Sqlite { url },
            None => StorageConfig::JsonFiles {
                dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| String::from("."))),
            },
        };

        let chat = |name: &'static str| -> Result<ChatId, ConfigError> {
            let value = get(name).ok_or(ConfigError::Missing(name))?;
            value
                .parse::<i64>()
                .map(ChatId)
                .map_err(|e| ConfigError::Invalid {
                    name,
                    value,
                    problem: e.to_string(),
                })
        };

        let ranking_limit = match get("RANKING_LIMIT") {
            None => Self::DEFAULT_RANKING_LIMIT,
            Some(value) => match value.parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        name: "RANKING_LIMIT",
                        value,
                        problem: String::from("must be at least 1"),
                    })
                }
                Ok(limit) => limit,
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        name: "RANKING_LIMIT",
                        problem: e.to_string(),
                        value,
                    })
                }
            },
        };

        Ok(Config {
            storage,
            control_chat: chat("CONTROL_CHAT_ID")?,
            blacklist_chat: chat("BLACKLIST_CHAT_ID")?,
            approval_chat: chat("RECRUIT_APPROVAL_CHAT_ID")?,
            ranking_limit,
        })
    }
}
