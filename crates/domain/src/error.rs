/// Shared error type used across all Databox client crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    #[error("invalid route: {0}")]
    InvalidRoute(String),

    #[error("token request rejected ({status}): {body}")]
    TokenRejected { status: u16, body: String },

    #[error("arbiter: {0}")]
    Arbiter(String),

    #[error("store: {0}")]
    Store(String),

    #[error("frame: {0}")]
    Frame(String),

    #[error("function: {0}")]
    Function(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the arbiter refused to issue a token.
    pub fn is_token_rejected(&self) -> bool {
        matches!(self, Error::TokenRejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
