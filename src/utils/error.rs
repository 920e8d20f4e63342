use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Directory walk failed: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration parsing failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },


    #[error("Build template unresolved ({path}): {reason}")]
    TemplateUnresolved { path: PathBuf, reason: String },

    #[error("Source directory for {target} not found: {path}")]
    MissingSource { target: String, path: PathBuf },

    #[error("Target {target} failed: {source}")]
    TargetFailed {
        target: String,
        #[source]
        source: Box<WsError>,
    },

    #[error("Target {target} cancelled after a sibling target failed")]
    Cancelled { target: String },

    #[error("Unknown target: {name}")]
    UnknownTarget { name: String },

    #[error("No service plugin registered under '{name}'")]
    UnknownService { name: String },

    #[error("Service '{service}' has no route table named '{mapping}'")]
    MissingMapping { service: String, mapping: String },

    #[error("\"{pattern}\" is an invalid route specification ({reason})")]
    InvalidRoute { pattern: String, reason: String },

    #[error("Service '{service}' initialization failed: {message}")]
    ServiceInitError { service: String, message: String },

    #[error("server already started")]
    AlreadyStarted,

    #[error("Server error: {message}")]
    ServerError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Io,
    Packaging,
    Service,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code of a failed command. Never 0, whatever the severity.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl WsError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            WsError::IoError(_) | WsError::WalkError(_) => ErrorCategory::Io,
            WsError::SerializationError(_)
            | WsError::ConfigError { .. }
            | WsError::ConfigValidationError { .. }
            | WsError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            WsError::TemplateUnresolved { .. }
            | WsError::MissingSource { .. }
            | WsError::TargetFailed { .. }
            | WsError::Cancelled { .. }
            | WsError::UnknownTarget { .. } => ErrorCategory::Packaging,
            WsError::UnknownService { .. }
            | WsError::MissingMapping { .. }
            | WsError::InvalidRoute { .. }
            | WsError::ServiceInitError { .. } => ErrorCategory::Service,
            WsError::AlreadyStarted | WsError::ServerError { .. } => ErrorCategory::Server,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            WsError::InvalidRoute { .. }
            | WsError::ServiceInitError { .. }
            | WsError::Cancelled { .. } => ErrorSeverity::Medium,
            WsError::TargetFailed { source, .. } => source.severity().max(ErrorSeverity::High),
            WsError::IoError(_) | WsError::WalkError(_) | WsError::ServerError { .. } => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            WsError::TemplateUnresolved { .. } => {
                "Set CSTBOX_DEVEL_HOME to the directory holding dist-template.toml"
            }
            WsError::MissingSource { .. } => {
                "Create the source directory or fix its path in the build template"
            }
            WsError::TargetFailed { source, .. } => source.recovery_suggestion(),
            WsError::UnknownTarget { .. } => "Run with --list to see the available targets",
            WsError::UnknownService { .. } => {
                "Remove the service directory or register its plugin in the service registry"
            }
            WsError::MissingMapping { .. } => {
                "Fix the 'mapping' key of the service MANIFEST"
            }
            WsError::InvalidRoute { .. } => "Fix the route pattern declared by the service",
            WsError::ServiceInitError { .. } => "Check the [settings] section of the service MANIFEST",
            WsError::AlreadyStarted => "Stop the running server before starting it again",
            WsError::IoError(_) | WsError::WalkError(_) => {
                "Check file permissions and available disk space"
            }
            WsError::ServerError { .. } => "Check that the port is free and the process may bind it",
            _ => "Review the configuration file and command line options",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            WsError::TargetFailed { target, source } => {
                format!("{} failed: {}", target, source.user_friendly_message())
            }
            WsError::TemplateUnresolved { path, .. } => {
                format!("Cannot resolve the shared build template at {}", path.display())
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WsError>;
