use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Resolve the data directory holding event logs and workflow mappings (§6),
/// honouring the `DATA_PATH` environment variable ahead of OS/platform
/// defaults.
///
/// Priority: explicit path -> `DATA_PATH` env var -> OS data dir -> `~/.flowcast`.
pub fn resolve_data_path(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }
    if let Ok(env_path) = std::env::var("DATA_PATH") {
        return Ok(expand_tilde(&env_path));
    }
    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("flowcast"));
    }
    if let Some(home) = std::env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".flowcast"));
    }
    Err(Error::Config(
        "could not determine data path: no HOME directory or OS data directory found".to_string(),
    ))
}

/// Resolve the log directory (`LOGS_FOLDER`, §6), defaulting to `<data>/logs`.
pub fn resolve_logs_path(data_path: &std::path::Path, explicit_path: Option<&str>) -> PathBuf {
    if let Some(path) = explicit_path {
        return expand_tilde(path);
    }
    if let Ok(env_path) = std::env::var("LOGS_FOLDER") {
        return expand_tilde(&env_path);
    }
    data_path.join("logs")
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins_over_everything() {
        let resolved = resolve_data_path(Some("/tmp/explicit-flowcast")).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/explicit-flowcast"));
    }

    #[test]
    fn logs_path_defaults_under_data_path() {
        let data = PathBuf::from("/tmp/flowcast-data");
        assert_eq!(resolve_logs_path(&data, None), data.join("logs"));
    }
}
