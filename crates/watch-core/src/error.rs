use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Stale result for {symbol}: no longer watched")]
    Stale { symbol: String },

    #[error("Command error: {0}")]
    Command(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Fetch failures that are recovered by skipping the symbol or cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WatchError::Network(_) | WatchError::Http { .. } | WatchError::Parse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(WatchError::Network("timeout".into()).is_transient());
        assert!(WatchError::Http { status: 502, body: String::new() }.is_transient());
        assert!(WatchError::Parse("bad json".into()).is_transient());
        assert!(!WatchError::Stale { symbol: "SH600000".into() }.is_transient());
        assert!(!WatchError::Config("bad tz".into()).is_transient());
        assert!(!WatchError::Command("unknown".into()).is_transient());
    }
}
