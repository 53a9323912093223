use std::path::PathBuf;

/// Fatal configuration problems. Raised before any network call is made.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not found in environment or .env file")]
    MissingSecret(&'static str),

    #[error("missing required key in settings: {0}")]
    MissingField(&'static str),

    #[error("required key in settings has an empty value: {0}")]
    EmptyField(&'static str),

    #[error("'whitelisted_chat_ids' is empty, nobody would receive the message")]
    EmptyRecipients,

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("could not decode settings document: {0}")]
    Malformed(String),

    #[error("could not read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the single generation attempt. Fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("could not reach provider: {0}")]
    Unreachable(String),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("provider returned no usable text")]
    Empty,
}

impl GenerationError {
    /// Operator hint for well-known provider failures.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            GenerationError::Status { status: 401 | 403, .. } => {
                Some("check OPENAI_API_KEY in the environment or .env file")
            }
            GenerationError::Status { status: 404, .. } => {
                Some("the model might not exist at this base url, check the settings document")
            }
            GenerationError::Status { status: 429, .. } => {
                Some("rate limited, you might be exceeding your quota")
            }
            GenerationError::Unreachable(_) => Some("check network access and 'openai_base_url'"),
            _ => None,
        }
    }
}

/// Per-recipient send failure. Never fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("recipient unreachable: {0}")]
    Unreachable(String),

    #[error("telegram api error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),
}

impl SendError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            SendError::Unreachable(detail) if detail.contains("blocked") => {
                Some("has the user blocked the bot?")
            }
            SendError::Unreachable(_) => Some("is the id correct? has the user started the bot?"),
            _ => None,
        }
    }
}
