//! `repobot config`: print the default configuration.

use repobot_config::AppConfig;

pub fn run() {
    println!("{}", AppConfig::default_toml());
}

#[cfg(test)]
mod tests {
    use repobot_config::AppConfig;

    #[test]
    fn default_toml_parses_back() {
        let parsed: AppConfig = toml::from_str(&AppConfig::default_toml()).unwrap();
        assert_eq!(parsed.github.bot_name, "repobot");
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn config_path_is_under_config_dir() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().ends_with("config.toml"));
    }
}
