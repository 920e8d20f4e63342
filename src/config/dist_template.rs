use crate::config::substitute_env_vars;
use crate::core::package_manifest::DEVEL_HOME_ENV;
use crate::domain::model::CopyTarget;
use crate::utils::error::{Result, WsError};
use crate::utils::validation::{validate_non_empty_string, validate_relative_path, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const TEMPLATE_FILE_NAME: &str = "dist-template.toml";

/// Shared build template, owned by the development environment rather than
/// by the module. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistTemplate {
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Staging root; packages are staged under `<root>/<module name>`.
    /// Defaults to `<devel home>/build`.
    pub root: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub bin: Option<TargetLayout>,
    pub python: Option<TargetLayout>,
    pub init_scripts: Option<TargetLayout>,
    pub etc: Option<TargetLayout>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetLayout {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub executable: Option<bool>,
    pub include: Option<Vec<String>>,
    pub exclude_suffixes: Option<Vec<String>>,
    pub exclude_dirs: Option<Vec<String>>,
}

/// A target layout with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLayout {
    pub target: CopyTarget,
    pub source: String,
    pub destination: String,
    pub executable: bool,
    pub include: Vec<String>,
    pub exclude_suffixes: Vec<String>,
    pub exclude_dirs: Vec<String>,
}

impl ResolvedLayout {
    fn default_for(target: CopyTarget) -> Self {
        let (source, destination, executable) = match target {
            CopyTarget::BinFiles => ("bin", "opt/cstbox/bin", true),
            CopyTarget::PythonFiles => ("lib/python", "opt/cstbox/lib/python", false),
            CopyTarget::InitScripts => ("init.d", "etc/init.d", true),
            CopyTarget::EtcFiles => ("etc", "etc/cstbox", false),
        };
        let (exclude_suffixes, exclude_dirs) = match target {
            CopyTarget::PythonFiles => (
                vec![".pyc".to_string(), ".pyo".to_string()],
                vec!["__pycache__".to_string()],
            ),
            _ => (Vec::new(), Vec::new()),
        };

        Self {
            target,
            source: source.to_string(),
            destination: destination.to_string(),
            executable,
            include: Vec::new(),
            exclude_suffixes,
            exclude_dirs,
        }
    }
}

impl DistTemplate {
    /// Resolves the devel home (explicit path first, then the environment)
    /// and checks that it is a directory.
    pub fn resolve_devel_home(explicit: Option<&Path>) -> Result<PathBuf> {
        let home = match explicit {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(DEVEL_HOME_ENV) {
                Some(value) if !value.is_empty() => PathBuf::from(value),
                _ => {
                    return Err(WsError::TemplateUnresolved {
                        path: PathBuf::from(format!("${}", DEVEL_HOME_ENV)),
                        reason: "environment variable not set".to_string(),
                    })
                }
            },
        };

        if !home.is_dir() {
            return Err(WsError::TemplateUnresolved {
                path: home,
                reason: "devel home is not a directory".to_string(),
            });
        }
        Ok(home)
    }

    /// Loads `dist-template.toml` from the devel home.
    pub fn load(devel_home: &Path) -> Result<Self> {
        let path = devel_home.join(TEMPLATE_FILE_NAME);
        if !path.is_file() {
            return Err(WsError::TemplateUnresolved {
                path,
                reason: "template file not found".to_string(),
            });
        }
        Self::from_file(&path)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(WsError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| WsError::ConfigValidationError {
            field: "dist_template".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn staging_root(&self, devel_home: &Path) -> PathBuf {
        match &self.build.root {
            Some(root) => {
                let root = PathBuf::from(root);
                if root.is_absolute() {
                    root
                } else {
                    devel_home.join(root)
                }
            }
            None => devel_home.join("build"),
        }
    }

    pub fn staging_dir(&self, devel_home: &Path, module_name: &str) -> PathBuf {
        self.staging_root(devel_home).join(module_name)
    }

    pub fn layout_for(&self, target: CopyTarget) -> ResolvedLayout {
        let mut resolved = ResolvedLayout::default_for(target);
        let overrides = match target {
            CopyTarget::BinFiles => self.layout.bin.as_ref(),
            CopyTarget::PythonFiles => self.layout.python.as_ref(),
            CopyTarget::InitScripts => self.layout.init_scripts.as_ref(),
            CopyTarget::EtcFiles => self.layout.etc.as_ref(),
        };

        if let Some(o) = overrides {
            if let Some(source) = &o.source {
                resolved.source = source.clone();
            }
            if let Some(destination) = &o.destination {
                resolved.destination = destination.clone();
            }
            if let Some(executable) = o.executable {
                resolved.executable = executable;
            }
            if let Some(include) = &o.include {
                resolved.include = include.clone();
            }
            if let Some(suffixes) = &o.exclude_suffixes {
                resolved.exclude_suffixes = suffixes.clone();
            }
            if let Some(dirs) = &o.exclude_dirs {
                resolved.exclude_dirs = dirs.clone();
            }
        }
        resolved
    }
}

impl Validate for DistTemplate {
    fn validate(&self) -> Result<()> {
        if let Some(root) = &self.build.root {
            validate_non_empty_string("build.root", root)?;
        }
        for target in CopyTarget::ALL {
            let layout = self.layout_for(target);
            validate_relative_path(&format!("layout.{}.source", target), &layout.source)?;
            validate_relative_path(&format!("layout.{}.destination", target), &layout.destination)?;
        }
        Ok(())
    }
}
