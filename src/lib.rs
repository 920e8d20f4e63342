pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::services::builtin_registry;
pub use app::tasks::build_dist_engine;
pub use config::{dist_template::DistTemplate, server_config::ServerConfig};
pub use crate::core::{
    dist::{DistEngine, ExecutionMode},
    package_manifest::{PackageManifest, COPY_FILES_TARGET, MODULE_NAME},
    server::AppServer,
};
pub use utils::error::{Result, WsError};
