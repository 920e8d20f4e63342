use axum::http::StatusCode;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

/// How a served request was logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutcome {
    Muted,
    Info,
    Warning,
    Error,
}

/// Request logger able to mute periodic requests (notification polling and
/// the like) after their first successful occurrence. Failed requests are
/// always logged.
#[derive(Debug, Default)]
pub struct RequestLogger {
    muted: Mutex<HashSet<String>>,
}

impl RequestLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_request(
        &self,
        status: StatusCode,
        uri: &str,
        summary: &str,
        disable_request_logging: bool,
        elapsed: Duration,
    ) -> LogOutcome {
        let outcome = if status.as_u16() < 400 {
            let mut muted = self.muted.lock().unwrap_or_else(|e| e.into_inner());
            if muted.contains(uri) {
                return LogOutcome::Muted;
            }
            if disable_request_logging {
                muted.insert(uri.to_string());
                tracing::warn!("request '{}' is muted => last time we log it", uri);
            }
            LogOutcome::Info
        } else if status.as_u16() < 500 {
            LogOutcome::Warning
        } else {
            LogOutcome::Error
        };

        let ms = elapsed.as_secs_f64() * 1000.0;
        match outcome {
            LogOutcome::Info => tracing::info!("{} {} {:.2}ms", status.as_u16(), summary, ms),
            LogOutcome::Warning => tracing::warn!("{} {} {:.2}ms", status.as_u16(), summary, ms),
            LogOutcome::Error => tracing::error!("{} {} {:.2}ms", status.as_u16(), summary, ms),
            LogOutcome::Muted => {}
        }
        outcome
    }

    pub fn is_muted(&self, uri: &str) -> bool {
        self.muted
            .lock()
            .map(|m| m.contains(uri))
            .unwrap_or(false)
    }
}
