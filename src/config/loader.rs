//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    ParseToml(toml::de::Error),
    ParseJson(serde_json::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseToml(e) => write!(f, "Parse error: {}", e),
            ConfigError::ParseJson(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::ParseToml(e) => Some(e),
            ConfigError::ParseJson(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Document syntax, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// `.json` files are JSON; everything else is read as TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Parse and validate a configuration document.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(ConfigError::ParseToml)?,
        ConfigFormat::Json => serde_json::from_str(content).map_err(ConfigError::ParseJson)?,
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML or JSON file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content, ConfigFormat::from_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("config.JSON")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("config.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Toml);
    }

    #[test]
    fn loads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "Port": 8090, "MaxThreads": 2 }"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.port, 8090);
        assert_eq!(config.worker_count(), 2);
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(matches!(
            parse_config("port = ", ConfigFormat::Toml),
            Err(ConfigError::ParseToml(_))
        ));
        assert!(matches!(
            parse_config("{ \"Port\": ", ConfigFormat::Json),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn validation_errors_are_listed() {
        let err = parse_config("workers = 0\nrequest_timeout_secs = 0", ConfigFormat::Toml).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("workers"), "{message}");
        assert!(message.contains("request_timeout_secs"), "{message}");
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_config(Path::new("/definitely/not/here.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
