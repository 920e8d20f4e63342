use crate::core::package_manifest::{PackageManifest, COPY_FILES_TARGET};
use crate::domain::model::{CopyReport, CopyTarget, TargetState};
use crate::domain::ports::CopyTask;
use crate::utils::error::{Result, WsError};
use crate::utils::validation::Validate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub target: &'static str,
    pub reports: Vec<CopyReport>,
    pub duration: Duration,
}

impl AggregateReport {
    pub fn total_copied(&self) -> usize {
        self.reports.iter().map(|r| r.copied).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.reports.iter().map(|r| r.skipped).sum()
    }
}

/// Runs the copy targets declared by a [`PackageManifest`].
pub struct DistEngine {
    manifest: PackageManifest,
    tasks: HashMap<CopyTarget, Arc<dyn CopyTask>>,
    mode: ExecutionMode,
    state: TargetState,
}

impl DistEngine {
    pub fn new(manifest: PackageManifest) -> Self {
        Self {
            manifest,
            tasks: HashMap::new(),
            mode: ExecutionMode::default(),
            state: TargetState::NotStarted,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Binds a task to its target, replacing any previous binding.
    pub fn add_task(&mut self, task: Arc<dyn CopyTask>) {
        self.tasks.insert(task.target(), task);
    }

    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    /// State of the last `copy_files` invocation.
    pub fn state(&self) -> TargetState {
        self.state
    }

    /// Runs a target by name: the aggregate or one of its prerequisites.
    pub async fn run_target(&mut self, name: &str) -> Result<Vec<CopyReport>> {
        if name == COPY_FILES_TARGET {
            return Ok(self.copy_files().await?.reports);
        }

        let target: CopyTarget = name.parse()?;
        if !self.manifest.prerequisites().contains(&target) {
            return Err(WsError::UnknownTarget {
                name: name.to_string(),
            });
        }
        let task = self.task_for(target)?;
        Ok(vec![run_task(task, Arc::new(AtomicBool::new(false))).await?])
    }

    /// Completes only when every prerequisite completed. The first failure
    /// cancels the remaining ones and is returned once they have all stopped
    /// writing.
    pub async fn copy_files(&mut self) -> Result<AggregateReport> {
        let start = Instant::now();
        if let Err(e) = self.manifest.validate() {
            self.state = TargetState::Failed;
            return Err(e);
        }
        tracing::info!(
            "📦 {}: {} for {}",
            COPY_FILES_TARGET,
            self.manifest.prerequisite_names().join(", "),
            self.manifest.module_name
        );

        let outcome = match self.bound_tasks() {
            Ok(tasks) => match self.mode {
                ExecutionMode::Sequential => run_sequential(tasks).await,
                ExecutionMode::Parallel => run_parallel(tasks).await,
            },
            Err(e) => Err(e),
        };

        match outcome {
            Ok(mut reports) => {
                let order = self.manifest.prerequisites();
                reports.sort_by_key(|r| order.iter().position(|t| *t == r.target));
                self.state = TargetState::Completed;

                let report = AggregateReport {
                    target: COPY_FILES_TARGET,
                    reports,
                    duration: start.elapsed(),
                };
                tracing::info!(
                    "✅ {} completed (copied: {}, up to date: {}, duration: {:?})",
                    COPY_FILES_TARGET,
                    report.total_copied(),
                    report.total_skipped(),
                    report.duration
                );
                Ok(report)
            }
            Err(e) => {
                self.state = TargetState::Failed;
                tracing::error!("❌ {} failed: {}", COPY_FILES_TARGET, e);
                Err(e)
            }
        }
    }

    fn task_for(&self, target: CopyTarget) -> Result<Arc<dyn CopyTask>> {
        self.tasks
            .get(&target)
            .cloned()
            .ok_or_else(|| WsError::ConfigError {
                message: format!("no task bound to {}", target),
            })
    }

    fn bound_tasks(&self) -> Result<Vec<Arc<dyn CopyTask>>> {
        self.manifest
            .prerequisites()
            .iter()
            .map(|t| self.task_for(*t))
            .collect()
    }

    pub fn get_execution_summary(report: &AggregateReport) -> HashMap<String, serde_json::Value> {
        let mut summary = HashMap::new();

        summary.insert(
            "target".to_string(),
            serde_json::Value::String(report.target.to_string()),
        );
        summary.insert(
            "total_copied".to_string(),
            serde_json::Value::Number(report.total_copied().into()),
        );
        summary.insert(
            "total_skipped".to_string(),
            serde_json::Value::Number(report.total_skipped().into()),
        );
        summary.insert(
            "total_duration_ms".to_string(),
            serde_json::Value::Number((report.duration.as_millis() as u64).into()),
        );

        let targets: Vec<serde_json::Value> = report
            .reports
            .iter()
            .map(|r| serde_json::Value::String(r.target.target_name().to_string()))
            .collect();
        summary.insert("executed_targets".to_string(), serde_json::Value::Array(targets));

        summary
    }
}

async fn run_task(task: Arc<dyn CopyTask>, cancel_token: Arc<AtomicBool>) -> Result<CopyReport> {
    let target = task.target();
    tracing::debug!("▶️ {}", target);
    match task.run(cancel_token).await {
        Ok(report) => {
            tracing::info!(
                "✅ {} (copied: {}, up to date: {})",
                target,
                report.copied,
                report.skipped
            );
            Ok(report)
        }
        Err(e @ WsError::Cancelled { .. }) => {
            tracing::warn!("⏹️ {}", e);
            Err(e)
        }
        Err(e) => {
            tracing::error!("❌ {} failed: {}", target, e);
            Err(WsError::TargetFailed {
                target: target.target_name().to_string(),
                source: Box::new(e),
            })
        }
    }
}

async fn run_sequential(tasks: Vec<Arc<dyn CopyTask>>) -> Result<Vec<CopyReport>> {
    let cancel_token = Arc::new(AtomicBool::new(false));
    let mut reports = Vec::with_capacity(tasks.len());
    for task in tasks {
        reports.push(run_task(task, cancel_token.clone()).await?);
    }
    Ok(reports)
}

async fn run_parallel(tasks: Vec<Arc<dyn CopyTask>>) -> Result<Vec<CopyReport>> {
    let cancel_token = Arc::new(AtomicBool::new(false));
    let mut set = JoinSet::new();
    for task in tasks {
        set.spawn(run_task(task, cancel_token.clone()));
    }

    let mut reports = Vec::with_capacity(set.len());
    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        let outcome = joined
            .map_err(|e| WsError::ServerError {
                message: format!("copy task aborted: {}", e),
            })
            .and_then(|r| r);
        match outcome {
            Ok(report) => reports.push(report),
            // siblings stopped by the token are not the cause
            Err(WsError::Cancelled { .. }) => {}
            Err(e) => {
                if first_error.is_none() {
                    cancel_token.store(true, Ordering::SeqCst);
                    first_error = Some(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(reports),
    }
}
