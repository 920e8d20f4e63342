//! Declaration of the distribution package: its module name and the copy
//! targets the aggregate `copy_files` target depends on.

use crate::domain::model::CopyTarget;
use crate::utils::error::{Result, WsError};
use crate::utils::validation::{validate_package_name, Validate};

pub const MODULE_NAME: &str = "ext-webservices";

pub const COPY_FILES_TARGET: &str = "copy_files";

/// Environment variable pointing at the directory that holds the shared
/// build template.
pub const DEVEL_HOME_ENV: &str = "CSTBOX_DEVEL_HOME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    pub module_name: String,
    prerequisites: Vec<CopyTarget>,
}

impl PackageManifest {
    /// The manifest of this module.
    pub fn declared() -> Self {
        Self {
            module_name: MODULE_NAME.to_string(),
            prerequisites: vec![
                CopyTarget::BinFiles,
                CopyTarget::PythonFiles,
                CopyTarget::InitScripts,
                CopyTarget::EtcFiles,
            ],
        }
    }

    /// Same module with its prerequisites listed in another order. Duplicates
    /// are dropped, the aggregate depends on a set; `validate` rejects any
    /// set other than the four copy targets.
    pub fn with_prerequisites(module_name: &str, prerequisites: &[CopyTarget]) -> Self {
        let mut unique = Vec::with_capacity(prerequisites.len());
        for target in prerequisites {
            if !unique.contains(target) {
                unique.push(*target);
            }
        }
        Self {
            module_name: module_name.to_string(),
            prerequisites: unique,
        }
    }

    pub fn prerequisites(&self) -> &[CopyTarget] {
        &self.prerequisites
    }

    pub fn prerequisite_names(&self) -> Vec<&'static str> {
        self.prerequisites.iter().map(|t| t.target_name()).collect()
    }

    /// Lines printed by `cstbox-dist --list`.
    pub fn listing(&self) -> Vec<String> {
        vec![
            format!("MODULE_NAME={}", self.module_name),
            format!("{}: {}", COPY_FILES_TARGET, self.prerequisite_names().join(" ")),
        ]
    }

    /// All invocable target names: the aggregate first, then its prerequisites.
    pub fn target_names(&self) -> Vec<&'static str> {
        std::iter::once(COPY_FILES_TARGET)
            .chain(self.prerequisite_names())
            .collect()
    }
}

impl Default for PackageManifest {
    fn default() -> Self {
        Self::declared()
    }
}

impl Validate for PackageManifest {
    fn validate(&self) -> Result<()> {
        validate_package_name("module_name", &self.module_name)?;

        let missing: Vec<&str> = CopyTarget::ALL
            .iter()
            .filter(|t| !self.prerequisites.contains(t))
            .map(|t| t.target_name())
            .collect();
        if !missing.is_empty() || self.prerequisites.len() != CopyTarget::ALL.len() {
            return Err(WsError::ConfigValidationError {
                field: COPY_FILES_TARGET.to_string(),
                message: format!("missing prerequisites: {}", missing.join(", ")),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_name() {
        assert_eq!(MODULE_NAME, "ext-webservices");
        assert_eq!(PackageManifest::declared().module_name, "ext-webservices");
        assert!(PackageManifest::declared().validate().is_ok());
    }

    #[test]
    fn test_copy_files_has_exactly_four_prerequisites() {
        let manifest = PackageManifest::declared();
        let mut names = manifest.prerequisite_names();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "copy_bin_files",
                "copy_etc_files",
                "copy_init_scripts",
                "copy_python_files"
            ]
        );
    }

    #[test]
    fn test_target_names_lead_with_aggregate() {
        let names = PackageManifest::declared().target_names();
        assert_eq!(names.len(), 5);
        assert_eq!(names[0], "copy_files");
    }

    #[test]
    fn test_listing() {
        assert_eq!(
            PackageManifest::declared().listing(),
            vec![
                "MODULE_NAME=ext-webservices".to_string(),
                "copy_files: copy_bin_files copy_python_files copy_init_scripts copy_etc_files"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_duplicate_prerequisites_collapse() {
        let manifest = PackageManifest::with_prerequisites(
            MODULE_NAME,
            &[CopyTarget::EtcFiles, CopyTarget::BinFiles, CopyTarget::EtcFiles],
        );
        assert_eq!(
            manifest.prerequisites(),
            &[CopyTarget::EtcFiles, CopyTarget::BinFiles]
        );
    }

    #[test]
    fn test_incomplete_prerequisites_rejected() {
        let subset = PackageManifest::with_prerequisites(MODULE_NAME, &[CopyTarget::BinFiles]);
        assert!(matches!(
            subset.validate(),
            Err(WsError::ConfigValidationError { ref message, .. }) if message.contains("copy_etc_files")
        ));

        let empty = PackageManifest::with_prerequisites(MODULE_NAME, &[]);
        assert!(empty.validate().is_err());

        let permuted = PackageManifest::with_prerequisites(
            MODULE_NAME,
            &[
                CopyTarget::EtcFiles,
                CopyTarget::InitScripts,
                CopyTarget::PythonFiles,
                CopyTarget::BinFiles,
            ],
        );
        assert!(permuted.validate().is_ok());
    }

    #[test]
    fn test_bad_module_name_rejected() {
        let manifest = PackageManifest::with_prerequisites("Ext WebServices", &CopyTarget::ALL);
        assert!(manifest.validate().is_err());
    }
}
