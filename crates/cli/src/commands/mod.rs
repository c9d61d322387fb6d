pub mod actions;
pub mod config_cmd;
pub mod serve;
pub mod trigger;

use std::path::PathBuf;

use repobot_config::{AppConfig, ConfigError};

/// Load config from `--config` or the default location, with env
/// overrides. Only the default location may be absent.
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(p) => AppConfig::load_explicit(&p),
        None => AppConfig::load(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_explicit_config_is_an_error() {
        let err = load_config(Some(PathBuf::from("/nonexistent/repobot.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
        assert!(err.to_string().contains("/nonexistent/repobot.toml"));
    }
}
