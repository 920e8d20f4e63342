use crate::config::substitute_env_vars;
use crate::utils::error::{Result, WsError};
use crate::utils::validation::{validate_path, validate_range, validate_url_base, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/cstbox/websvc.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    /// Free-form application settings merged into the server settings.
    pub settings: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_url_base")]
    pub url_base: String,
    pub services_home: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

fn default_port() -> u16 {
    8888
}

fn default_url_base() -> String {
    "/api/".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            url_base: default_url_base(),
            services_home: None,
            debug: false,
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(WsError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when it exists, built-in defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().is_file() {
            Self::from_file(path)
        } else {
            tracing::debug!(
                "no configuration at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| WsError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn custom_settings(&self) -> serde_json::Map<String, serde_json::Value> {
        self.settings.clone().unwrap_or_default()
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        validate_range("server.port", self.server.port, 1, u16::MAX)?;
        validate_url_base("server.url_base", &self.server.url_base)?;
        if let Some(home) = &self.server.services_home {
            validate_path("server.services_home", home)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config.server.port, 8888);
        assert_eq!(config.server.url_base, "/api/");
        assert!(!config.server.debug);
        assert!(config.custom_settings().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = ServerConfig::from_toml_str(
            r#"
[server]
port = 9090
url_base = "/ws/"
services_home = "/opt/cstbox/lib/python/pycstbox/webservices/services"
debug = true

[settings]
xsrf_cookies = false
gzip = true
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.url_base, "/ws/");
        assert!(config.server.debug);
        assert_eq!(
            config.custom_settings().get("gzip"),
            Some(&serde_json::Value::Bool(true))
        );
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("WEBSVC_TEST_SERVICES_HOME", "/srv/services");

        let config = ServerConfig::from_toml_str(
            r#"
[server]
services_home = "${WEBSVC_TEST_SERVICES_HOME}"
"#,
        )
        .unwrap();
        assert_eq!(config.server.services_home.as_deref(), Some("/srv/services"));

        std::env::remove_var("WEBSVC_TEST_SERVICES_HOME");
    }

    #[test]
    fn test_invalid_url_base() {
        let config = ServerConfig::from_toml_str(
            r#"
[server]
url_base = "api"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default() {
        let config = ServerConfig::load_or_default("/no/such/websvc.toml").unwrap();
        assert_eq!(config.server.port, 8888);

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[server]\nport = 8081\n")
            .unwrap();
        let config = ServerConfig::load_or_default(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 8081);
    }
}
