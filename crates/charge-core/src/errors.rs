/// Core error type for the charging-port bot.
///
/// Adapter crates map their specific errors into this type so the core can keep
/// user-facing replies plain and push details into the log.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned code {code}: {message}")]
    Upstream { code: i64, message: String },

    #[error("no devices requested")]
    NoDevices,

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
