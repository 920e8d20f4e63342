pub mod dist_template;
pub mod server_config;

#[cfg(feature = "cli")]
use crate::config::server_config::DEFAULT_CONFIG_PATH;
use crate::utils::error::{Result, WsError};
#[cfg(feature = "cli")]
use clap::Parser;
use regex::Regex;

/// Command line of the `websvcd` daemon. Options given here override the
/// configuration file.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "websvcd")]
#[command(about = "CSTBox web services daemon")]
pub struct CliConfig {
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[arg(short, long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub url_base: Option<String>,

    #[arg(long)]
    pub services_home: Option<String>,

    #[arg(short, long, help = "Activate debug mode")]
    pub debug: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: Option<String>,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Level for the daemon logs once the overrides are applied to `config`:
    /// debug mode, from the command line or the file, logs at debug level.
    pub fn effective_log_level(&self, config: &server_config::ServerConfig) -> &str {
        match &self.log_level {
            Some(level) => level,
            None if self.verbose || config.server.debug => "debug",
            None => "info",
        }
    }

    pub fn apply_overrides(&self, config: &mut server_config::ServerConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url_base) = &self.url_base {
            config.server.url_base = url_base.clone();
        }
        if let Some(home) = &self.services_home {
            config.server.services_home = Some(home.clone());
        }
        if self.debug {
            config.server.debug = true;
        }
    }
}

/// Replaces `${VAR}` with the value of the environment variable, leaving
/// unknown variables untouched.
pub(crate) fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| WsError::ConfigError {
        message: format!("invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}
