pub mod dir_copy;

use crate::config::dist_template::DistTemplate;
use crate::core::dist::DistEngine;
use crate::core::package_manifest::PackageManifest;
use crate::domain::ports::CopyTask;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use dir_copy::DirCopyTask;
use std::path::Path;
use std::sync::Arc;

/// Builds an engine whose prerequisites are filesystem copies laid out by
/// `template`.
pub fn build_dist_engine(
    manifest: PackageManifest,
    template: &DistTemplate,
    devel_home: &Path,
    module_dir: &Path,
) -> Result<DistEngine> {
    manifest.validate()?;
    template.validate()?;

    let staging_dir = template.staging_dir(devel_home, &manifest.module_name);
    tracing::info!("📁 Staging {} into {}", manifest.module_name, staging_dir.display());

    let tasks: Vec<DirCopyTask> = manifest
        .prerequisites()
        .iter()
        .map(|target| DirCopyTask::from_layout(&template.layout_for(*target), module_dir, &staging_dir))
        .collect();

    let mut engine = DistEngine::new(manifest);
    for task in tasks {
        tracing::debug!(
            "{}: {} -> {}",
            task.target(),
            task.source().display(),
            task.destination().display()
        );
        engine.add_task(Arc::new(task));
    }
    Ok(engine)
}
