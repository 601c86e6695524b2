//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load configuration from a TOML file.
///
/// Only parse success is checked here. Semantic checks run at boot.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;

    tracing::info!(path = %path.display(), config = ?config, "Configuration loaded");

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
[server]
project_name = "example"
name = "example-service"
host = "127.0.0.1"
http_port = 8181
grpc_port = 9191
pprof_port = 6060
prome_port = 9999
debug = true
endpoints = ["127.0.0.1:2379", "127.0.0.1:22379"]
registry_ttl_secs = 30
"#,
        );

        let config = load_config(file.path()).unwrap();
        let server = config.server;
        assert_eq!(server.project_name, "example");
        assert_eq!(server.name, "example-service");
        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.http_port, 8181);
        assert_eq!(server.grpc_port, 9191);
        assert_eq!(server.pprof_port, 6060);
        assert_eq!(server.prome_port, 9999);
        assert!(server.debug);
        assert_eq!(server.endpoints, vec!["127.0.0.1:2379", "127.0.0.1:22379"]);
        assert_eq!(server.registry_ttl_secs, 30);
        assert!(server.discovery_enabled());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write_config("[server]\nproject_name = \"p\"\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.project_name, "p");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.pprof_port, 0);
        assert!(!config.server.discovery_enabled());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let file = write_config("[server\nhttp_port = \"not a number\"");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let file = write_config("[server]\nhttp_port = \"eighty\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
