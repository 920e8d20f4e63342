use anyhow::Result;
use ext_webservices::domain::model::{CopyTarget, TargetState};
use ext_webservices::{build_dist_engine, DistTemplate, ExecutionMode, PackageManifest, WsError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A module tree with one file in each of the four source directories.
fn create_module_tree(root: &Path) {
    write(&root.join("bin/websvcd"), "#!/bin/sh\nexec true\n");
    write(
        &root.join("lib/python/pycstbox/webservices/services/hello/MANIFEST"),
        "[service]\nlabel = \"Hello\"\n",
    );
    write(
        &root.join("lib/python/pycstbox/webservices/wsapp.pyc"),
        "stale bytecode",
    );
    write(&root.join("init.d/cstbox-ext-webservices"), "#!/bin/sh\n");
    write(&root.join("etc/websvc.toml"), "[server]\nport = 8888\n");
}

fn create_devel_home(root: &Path, template: &str) {
    fs::create_dir_all(root).unwrap();
    fs::write(root.join("dist-template.toml"), template).unwrap();
}

#[tokio::test]
async fn test_copy_files_stages_every_group() -> Result<()> {
    let module = TempDir::new()?;
    let devel = TempDir::new()?;
    create_module_tree(module.path());
    create_devel_home(devel.path(), "");

    let template = DistTemplate::load(devel.path())?;
    let mut engine = build_dist_engine(
        PackageManifest::declared(),
        &template,
        devel.path(),
        module.path(),
    )?;

    let report = engine.copy_files().await?;
    assert_eq!(engine.state(), TargetState::Completed);
    assert_eq!(report.reports.len(), 4);
    assert_eq!(report.total_copied(), 4);

    let stage = devel.path().join("build/ext-webservices");
    assert!(stage.join("opt/cstbox/bin/websvcd").is_file());
    assert!(stage
        .join("opt/cstbox/lib/python/pycstbox/webservices/services/hello/MANIFEST")
        .is_file());
    assert!(!stage
        .join("opt/cstbox/lib/python/pycstbox/webservices/wsapp.pyc")
        .exists());
    assert!(stage.join("etc/init.d/cstbox-ext-webservices").is_file());
    assert!(stage.join("etc/cstbox/websvc.toml").is_file());

    Ok(())
}

#[tokio::test]
async fn test_second_invocation_is_up_to_date() -> Result<()> {
    let module = TempDir::new()?;
    let devel = TempDir::new()?;
    create_module_tree(module.path());
    create_devel_home(devel.path(), "");

    let template = DistTemplate::load(devel.path())?;
    let mut engine = build_dist_engine(
        PackageManifest::declared(),
        &template,
        devel.path(),
        module.path(),
    )?;

    engine.copy_files().await?;
    let second = engine.copy_files().await?;

    assert_eq!(engine.state(), TargetState::Completed);
    assert_eq!(second.total_copied(), 0);
    assert_eq!(second.total_skipped(), 4);

    Ok(())
}

#[tokio::test]
async fn test_failing_prerequisite_fails_aggregate() -> Result<()> {
    let module = TempDir::new()?;
    let devel = TempDir::new()?;
    create_module_tree(module.path());
    fs::remove_dir_all(module.path().join("init.d"))?;
    create_devel_home(devel.path(), "");

    let template = DistTemplate::load(devel.path())?;

    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        let mut engine = build_dist_engine(
            PackageManifest::declared(),
            &template,
            devel.path(),
            module.path(),
        )?
        .with_mode(mode);

        let err = engine.copy_files().await.unwrap_err();
        assert_eq!(engine.state(), TargetState::Failed);
        match err {
            WsError::TargetFailed { target, source } => {
                assert_eq!(target, "copy_init_scripts");
                assert!(matches!(*source, WsError::MissingSource { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    Ok(())
}

fn count_files(root: &Path) -> usize {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

#[tokio::test]
async fn test_parallel_failure_leaves_stage_still() -> Result<()> {
    let module = TempDir::new()?;
    let devel = TempDir::new()?;
    create_module_tree(module.path());
    fs::remove_dir_all(module.path().join("bin"))?;
    for i in 0..2000 {
        write(
            &module.path().join(format!("lib/python/pycstbox/bulk/mod_{i:04}.py")),
            "x = 1\n",
        );
    }
    create_devel_home(devel.path(), "");

    let template = DistTemplate::load(devel.path())?;
    let mut engine = build_dist_engine(
        PackageManifest::declared(),
        &template,
        devel.path(),
        module.path(),
    )?
    .with_mode(ExecutionMode::Parallel);

    let err = engine.copy_files().await.unwrap_err();
    assert!(matches!(err, WsError::TargetFailed { ref target, .. } if target == "copy_bin_files"));

    let stage = devel.path().join("build/ext-webservices");
    let at_failure = count_files(&stage);
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert_eq!(count_files(&stage), at_failure);

    Ok(())
}

#[tokio::test]
async fn test_permuted_declaration_same_outcome() -> Result<()> {
    let module = TempDir::new()?;
    create_module_tree(module.path());

    let declared_devel = TempDir::new()?;
    let permuted_devel = TempDir::new()?;
    create_devel_home(declared_devel.path(), "");
    create_devel_home(permuted_devel.path(), "");

    let permuted = PackageManifest::with_prerequisites(
        "ext-webservices",
        &[
            CopyTarget::EtcFiles,
            CopyTarget::PythonFiles,
            CopyTarget::InitScripts,
            CopyTarget::BinFiles,
        ],
    );

    let template = DistTemplate::default();
    let declared_report = build_dist_engine(
        PackageManifest::declared(),
        &template,
        declared_devel.path(),
        module.path(),
    )?
    .copy_files()
    .await?;
    let permuted_report = build_dist_engine(permuted, &template, permuted_devel.path(), module.path())?
        .with_mode(ExecutionMode::Parallel)
        .copy_files()
        .await?;

    assert_eq!(declared_report.total_copied(), permuted_report.total_copied());
    let permuted_targets: Vec<CopyTarget> =
        permuted_report.reports.iter().map(|r| r.target).collect();
    assert_eq!(
        permuted_targets,
        vec![
            CopyTarget::EtcFiles,
            CopyTarget::PythonFiles,
            CopyTarget::InitScripts,
            CopyTarget::BinFiles
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_template_layout_override() -> Result<()> {
    let module = TempDir::new()?;
    let devel = TempDir::new()?;
    create_module_tree(module.path());
    write(&module.path().join("target/release/websvcd"), "ELF");
    write(&module.path().join("target/release/websvcd.d"), "deps");

    let stage_root = devel.path().join("stage");
    create_devel_home(
        devel.path(),
        &format!(
            r#"
[build]
root = "{}"

[layout.bin]
source = "target/release"
include = ["websvcd"]
"#,
            stage_root.display().to_string().replace('\\', "/")
        ),
    );

    let template = DistTemplate::load(devel.path())?;
    let mut engine = build_dist_engine(
        PackageManifest::declared(),
        &template,
        devel.path(),
        module.path(),
    )?;
    let reports = engine.run_target("copy_bin_files").await?;

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].copied, 1);
    let bin = stage_root.join("ext-webservices/opt/cstbox/bin");
    assert!(bin.join("websvcd").is_file());
    assert!(!bin.join("websvcd.d").exists());

    Ok(())
}

#[test]
fn test_unresolved_template_aborts() {
    let devel = TempDir::new().unwrap();

    let err = DistTemplate::load(devel.path()).unwrap_err();
    assert!(matches!(err, WsError::TemplateUnresolved { .. }));

    let missing = devel.path().join("not-there");
    let err = DistTemplate::resolve_devel_home(Some(&missing)).unwrap_err();
    assert!(matches!(err, WsError::TemplateUnresolved { .. }));
}
