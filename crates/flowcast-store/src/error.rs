use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the store layer.
///
/// Per §7, most store-level problems (missing file, malformed record) are
/// recovered locally and surfaced as warnings rather than as an `Error` —
/// these variants cover the genuinely fatal cases: an unreadable data
/// directory, or a malformed companion config file.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<flowcast_core::Error> for Error {
    fn from(err: flowcast_core::Error) -> Self {
        match err {
            flowcast_core::Error::Config(msg) => Error::Config(msg),
        }
    }
}
