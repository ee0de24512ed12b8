use std::fmt;

#[derive(Debug)]
pub enum Error {
    Config(String),

    Io(String),

    TransportUnavailable(String),

    Transport(String),

    FetchExhausted {
        source: String,
        attempts: Vec<String>,
    },

    NoStructuralMatch { source: String },

    Persistence(String),

    Parse(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {msg}"),
            Error::Io(msg) => write!(f, "IO error: {msg}"),
            Error::TransportUnavailable(msg) => write!(f, "Transport unavailable: {msg}"),
            Error::Transport(msg) => write!(f, "Transport error: {msg}"),
            Error::FetchExhausted { source, attempts } => write!(
                f,
                "All fetch strategies exhausted for {source}: {}",
                attempts.join("; ")
            ),
            Error::NoStructuralMatch { source } => {
                write!(f, "No flow table found in content for {source}")
            }
            Error::Persistence(msg) => write!(f, "Persistence error: {msg}"),
            Error::Parse(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
