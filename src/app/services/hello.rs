//! Test web service.

use crate::domain::model::{HandlerResult, RouteSpec, WsReply, WsRequest};
use crate::domain::ports::{ServiceContext, WebService, WsHandler};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::Span;

pub const SERVICE_NAME: &str = "hello";

pub struct HelloService {
    span: Span,
}

impl WebService for HelloService {
    fn init(&mut self, ctx: &ServiceContext) -> Result<()> {
        self.span = ctx.span.clone();
        Ok(())
    }

    fn route_table(&self, mapping: &str) -> Option<Vec<RouteSpec>> {
        (mapping == "handlers").then(|| {
            vec![RouteSpec::new(
                "/say",
                Arc::new(SayHelloHandler {
                    span: self.span.clone(),
                }),
            )]
        })
    }
}

pub fn create() -> Box<dyn WebService> {
    Box::new(HelloService {
        span: tracing::info_span!("service", name = SERVICE_NAME),
    })
}

pub struct SayHelloHandler {
    span: Span,
}

#[async_trait]
impl WsHandler for SayHelloHandler {
    fn name(&self) -> &str {
        "SayHelloHandler"
    }

    async fn do_post(&self, req: &WsRequest) -> HandlerResult {
        let to_who = req.argument_or("to", "World");
        self.span
            .in_scope(|| tracing::debug!("saying hello to {}", to_who));
        Ok(WsReply::json(json!({ "message": format!("Hello {}", to_who) })))
    }
}
