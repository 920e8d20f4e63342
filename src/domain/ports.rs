use crate::domain::model::{CopyReport, CopyTarget, HandlerResult, RouteSpec, WsReply, WsRequest};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// A staging step behind one of the `copy_*` targets.
#[async_trait]
pub trait CopyTask: Send + Sync {
    fn target(&self) -> CopyTarget;

    /// Stops writing and returns `WsError::Cancelled` once `cancel_token`
    /// is set.
    async fn run(&self, cancel_token: Arc<AtomicBool>) -> Result<CopyReport>;
}

/// Request handler. Every verb answers 501 unless overridden.
#[async_trait]
pub trait WsHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Handlers polled periodically return true so that only their first
    /// successful request reaches the log.
    fn disable_request_logging(&self) -> bool {
        false
    }

    async fn do_get(&self, _req: &WsRequest) -> HandlerResult {
        Ok(WsReply::not_implemented())
    }

    async fn do_post(&self, _req: &WsRequest) -> HandlerResult {
        Ok(WsReply::not_implemented())
    }

    async fn do_put(&self, _req: &WsRequest) -> HandlerResult {
        Ok(WsReply::not_implemented())
    }

    async fn do_delete(&self, _req: &WsRequest) -> HandlerResult {
        Ok(WsReply::not_implemented())
    }
}

/// What a service plugin receives when discovery initializes it.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub name: String,
    pub span: tracing::Span,
    pub settings: Option<toml::Table>,
}

/// A compiled-in service plugin.
pub trait WebService: Send + Sync {
    /// Called once during discovery, before the route table is read. Other
    /// services may not be initialized yet.
    fn init(&mut self, _ctx: &ServiceContext) -> Result<()> {
        Ok(())
    }

    /// Route table published under `mapping`, with URLs relative to the
    /// service namespace.
    fn route_table(&self, mapping: &str) -> Option<Vec<RouteSpec>>;
}
