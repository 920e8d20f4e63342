//! Internal web services for tests and diagnostics.

use crate::domain::model::{HandlerResult, RouteSpec, WsReply, WsRequest};
use crate::domain::ports::{ServiceContext, WebService, WsHandler};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::Span;

pub const SERVICE_NAME: &str = "_diags";

pub struct DiagsService {
    span: Span,
}

impl DiagsService {
    pub fn new() -> Self {
        Self {
            span: tracing::info_span!("service", name = SERVICE_NAME),
        }
    }
}

impl Default for DiagsService {
    fn default() -> Self {
        Self::new()
    }
}

impl WebService for DiagsService {
    fn init(&mut self, ctx: &ServiceContext) -> Result<()> {
        self.span = ctx.span.clone();
        Ok(())
    }

    fn route_table(&self, mapping: &str) -> Option<Vec<RouteSpec>> {
        match mapping {
            "handlers" => Some(vec![
                RouteSpec::new(
                    "/hello",
                    Arc::new(HelloHandler {
                        span: self.span.clone(),
                    }),
                ),
                RouteSpec::new("/routes", Arc::new(RoutesHandler)),
            ]),
            _ => None,
        }
    }
}

pub fn create() -> Box<dyn WebService> {
    Box::new(DiagsService::new())
}

pub struct HelloHandler {
    span: Span,
}

#[async_trait]
impl WsHandler for HelloHandler {
    fn name(&self) -> &str {
        "HelloHandler"
    }

    async fn do_get(&self, req: &WsRequest) -> HandlerResult {
        let to_who = req.argument_or("to", "World");
        self.span
            .in_scope(|| tracing::debug!("saying hello to {}", to_who));
        Ok(WsReply::json(json!({ "message": format!("Hello {}", to_who) })))
    }
}

/// Lists the URL patterns of the whole application, in dispatch order.
pub struct RoutesHandler;

#[async_trait]
impl WsHandler for RoutesHandler {
    fn name(&self) -> &str {
        "RoutesHandler"
    }

    async fn do_get(&self, req: &WsRequest) -> HandlerResult {
        Ok(WsReply::json(json!({ "routes": req.app.routes })))
    }
}
