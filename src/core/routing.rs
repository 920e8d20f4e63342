use crate::domain::model::{HandlerError, RouteSpec, ServiceDescriptor, WsReply, WsRequest};
use crate::domain::ports::WsHandler;
use crate::utils::error::{Result, WsError};
use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use regex::Regex;
use std::sync::Arc;

/// Catch-all handler answering 404 to anything no service claimed.
pub struct InvalidRequest;

#[async_trait]
impl WsHandler for InvalidRequest {
    fn name(&self) -> &str {
        "InvalidRequest"
    }

    async fn do_get(&self, _req: &WsRequest) -> crate::domain::model::HandlerResult {
        Ok(WsReply::empty(StatusCode::NOT_FOUND))
    }

    async fn do_post(&self, req: &WsRequest) -> crate::domain::model::HandlerResult {
        self.do_get(req).await
    }
}

pub fn fallback_handlers() -> Vec<RouteSpec> {
    vec![RouteSpec::new("/.*", Arc::new(InvalidRequest))]
}

struct CompiledRoute {
    pattern: String,
    regex: Regex,
    handler: Arc<dyn WsHandler>,
}

/// Ordered dispatch table; the first pattern matching the whole path wins.
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    /// Top-level rules, then each service's rules, then the fallback rules.
    pub fn build(
        toplevel: &[RouteSpec],
        services: &[ServiceDescriptor],
        fallback: &[RouteSpec],
    ) -> Result<Self> {
        let specs = toplevel
            .iter()
            .chain(services.iter().flat_map(|s| s.handlers.iter()))
            .chain(fallback.iter())
            .cloned();
        Self::from_specs(specs)
    }

    pub fn from_specs(specs: impl IntoIterator<Item = RouteSpec>) -> Result<Self> {
        let routes = specs
            .into_iter()
            .map(|spec| {
                let regex = Regex::new(&format!("^(?:{})$", spec.pattern)).map_err(|e| {
                    WsError::InvalidRoute {
                        pattern: spec.pattern.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(CompiledRoute {
                    pattern: spec.pattern,
                    regex,
                    handler: spec.handler,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { routes })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn patterns(&self) -> Vec<String> {
        self.routes.iter().map(|r| r.pattern.clone()).collect()
    }

    /// `(pattern, handler name)` pairs, in dispatch order.
    pub fn rules(&self) -> Vec<(&str, &str)> {
        self.routes
            .iter()
            .map(|r| (r.pattern.as_str(), r.handler.name()))
            .collect()
    }

    /// Handler for `path` and the groups captured by its pattern.
    pub fn resolve(&self, path: &str) -> Option<(Arc<dyn WsHandler>, Vec<String>)> {
        self.routes.iter().find_map(|route| {
            route.regex.captures(path).map(|caps| {
                let args = caps
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| unquote_path_arg(m.as_str())).unwrap_or_default())
                    .collect();
                (route.handler.clone(), args)
            })
        })
    }
}

/// Percent-decodes a captured path group. Unlike in a query string, `+`
/// stays a plus sign.
fn unquote_path_arg(raw: &str) -> String {
    let escaped = raw
        .replace('+', "%2B")
        .replace('&', "%26")
        .replace('=', "%3D");
    url::form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}

/// Runs the handler method matching the request verb and turns any error
/// escaping it into a JSON reply.
pub async fn process_request(handler: &dyn WsHandler, req: &WsRequest) -> WsReply {
    let outcome = match req.method {
        Method::GET => handler.do_get(req).await,
        Method::POST => handler.do_post(req).await,
        Method::PUT => handler.do_put(req).await,
        Method::DELETE => handler.do_delete(req).await,
        _ => Err(HandlerError::http(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed",
        )),
    };

    match outcome {
        Ok(reply) => reply,
        Err(e) => {
            match &e {
                HandlerError::Http { status, message } => {
                    tracing::warn!("{}: HTTP {}: {}", handler.name(), status.as_u16(), message)
                }
                HandlerError::Internal {
                    errtype, message, ..
                } => {
                    tracing::error!(
                        "{}: unexpected error '{}' with message '{}'",
                        handler.name(),
                        errtype,
                        message
                    )
                }
            }
            e.into_reply()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{AppContext, HandlerResult};
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl WsHandler for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        async fn do_get(&self, req: &WsRequest) -> HandlerResult {
            Ok(WsReply::json(json!({ "args": req.path_args })))
        }

        async fn do_put(&self, _req: &WsRequest) -> HandlerResult {
            Err(HandlerError::internal("ValueError", "boom"))
        }
    }

    fn request(method: Method, uri: &str) -> WsRequest {
        WsRequest::new(method, uri, None, Vec::new(), None, Arc::new(AppContext::default()))
    }

    fn table() -> RouteTable {
        RouteTable::build(
            &[],
            &[ServiceDescriptor {
                name: "echo".to_string(),
                label: "Echo".to_string(),
                handlers: vec![RouteSpec::new("/api/echo/items/([0-9]+)", Arc::new(Echo))],
            }],
            &fallback_handlers(),
        )
        .unwrap()
    }

    #[test]
    fn test_patterns_are_anchored() {
        let table = table();
        let (handler, args) = table.resolve("/api/echo/items/42").unwrap();
        assert_eq!(handler.name(), "Echo");
        assert_eq!(args, vec!["42".to_string()]);

        let (handler, _) = table.resolve("/api/echo/items/42/extra").unwrap();
        assert_eq!(handler.name(), "InvalidRequest");
        let (handler, _) = table.resolve("/prefix/api/echo/items/42").unwrap();
        assert_eq!(handler.name(), "InvalidRequest");
    }

    #[test]
    fn test_path_args_are_decoded() {
        let table = RouteTable::from_specs([RouteSpec::new(
            "/api/echo/files/([^/]+)/(.*)",
            Arc::new(Echo) as Arc<dyn WsHandler>,
        )])
        .unwrap();

        let (_, args) = table
            .resolve("/api/echo/files/caf%C3%A9%20bar/a+b%26c=d")
            .unwrap();
        assert_eq!(args, vec!["café bar".to_string(), "a+b&c=d".to_string()]);

        let (_, args) = table.resolve("/api/echo/files/x/").unwrap();
        assert_eq!(args, vec!["x".to_string(), String::new()]);
    }

    #[test]
    fn test_dispatch_order() {
        let table = table();
        assert_eq!(
            table.patterns(),
            vec!["/api/echo/items/([0-9]+)".to_string(), "/.*".to_string()]
        );
        assert_eq!(table.rules()[1], ("/.*", "InvalidRequest"));
    }

    #[tokio::test]
    async fn test_invalid_request_is_404() {
        let reply = process_request(&InvalidRequest, &request(Method::GET, "/nothing")).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert!(reply.body.is_none());

        let reply = process_request(&InvalidRequest, &request(Method::POST, "/nothing")).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);

        let reply = process_request(&InvalidRequest, &request(Method::PUT, "/nothing")).await;
        assert_eq!(reply.status, StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_unimplemented_and_failing_methods() {
        let reply = process_request(&Echo, &request(Method::DELETE, "/x")).await;
        assert_eq!(reply.status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(reply.body, Some(json!({ "message": "not yet implemented" })));

        let reply = process_request(&Echo, &request(Method::PUT, "/x")).await;
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.body.unwrap()["errtype"], "ValueError");

        let reply = process_request(&Echo, &request(Method::PATCH, "/x")).await;
        assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
