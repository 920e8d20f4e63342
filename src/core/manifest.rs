use crate::utils::error::{Result, WsError};
use crate::utils::validation::validate_non_empty_string;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_FILE_NAME: &str = "MANIFEST";
pub const DEFAULT_MAPPING: &str = "handlers";

/// Content of a service `MANIFEST` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceManifest {
    pub service: ServiceSection,
    /// Free-form section handed to the service init hook.
    pub settings: Option<toml::Table>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    pub label: String,
    #[serde(default = "default_mapping")]
    pub mapping: String,
}

fn default_mapping() -> String {
    DEFAULT_MAPPING.to_string()
}

impl ServiceManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(WsError::IoError)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            WsError::ConfigValidationError { message, .. } => WsError::ConfigValidationError {
                field: path.as_ref().display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let manifest: Self =
            toml::from_str(content).map_err(|e| WsError::ConfigValidationError {
                field: MANIFEST_FILE_NAME.to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        validate_non_empty_string("service.label", &manifest.service.label)?;
        validate_non_empty_string("service.mapping", &manifest.service.mapping)?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_defaults_to_handlers() {
        let manifest = ServiceManifest::from_toml_str(
            r#"
[service]
label = "Diagnostics"
"#,
        )
        .unwrap();
        assert_eq!(manifest.service.label, "Diagnostics");
        assert_eq!(manifest.service.mapping, "handlers");
        assert!(manifest.settings.is_none());
    }

    #[test]
    fn test_settings_section() {
        let manifest = ServiceManifest::from_toml_str(
            r#"
[service]
label = "Greetings"
mapping = "routes_v2"

[settings]
greeting = "Hi"
"#,
        )
        .unwrap();
        assert_eq!(manifest.service.mapping, "routes_v2");
        let settings = manifest.settings.unwrap();
        assert_eq!(settings.get("greeting").and_then(|v| v.as_str()), Some("Hi"));
    }

    #[test]
    fn test_label_is_required() {
        assert!(ServiceManifest::from_toml_str("[service]\nmapping = \"handlers\"\n").is_err());
        assert!(ServiceManifest::from_toml_str("[service]\nlabel = \"  \"\n").is_err());
    }
}
