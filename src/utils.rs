use std::path::PathBuf;

/// Get the flow data directory from environment variable or use default
pub fn get_data_dir() -> PathBuf {
    std::env::var("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Read an optional API key from the named environment variable.
/// Empty values are treated as absent.
pub fn api_key_from_env(var: &str) -> Option<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}
