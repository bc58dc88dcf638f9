use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tender {0} is already stored")]
    DuplicateKey(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Storage failures break deduplication and filter persistence, so the
    /// scheduler stops on them instead of skipping to the next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Sqlite(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_fatal() {
        let err = AppError::Sqlite(rusqlite::Error::InvalidQuery);
        assert!(err.is_fatal());
    }

    #[test]
    fn duplicates_and_config_errors_are_not_fatal() {
        assert!(!AppError::DuplicateKey("0123".into()).is_fatal());
        assert!(!AppError::Config("missing bot_token".into()).is_fatal());
    }
}
