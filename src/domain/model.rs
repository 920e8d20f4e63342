use crate::domain::ports::WsHandler;
use crate::utils::error::WsError;
use axum::http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// One of the file groups staged into the distribution package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CopyTarget {
    BinFiles,
    PythonFiles,
    InitScripts,
    EtcFiles,
}

impl CopyTarget {
    pub const ALL: [CopyTarget; 4] = [
        CopyTarget::BinFiles,
        CopyTarget::PythonFiles,
        CopyTarget::InitScripts,
        CopyTarget::EtcFiles,
    ];

    pub fn target_name(self) -> &'static str {
        match self {
            CopyTarget::BinFiles => "copy_bin_files",
            CopyTarget::PythonFiles => "copy_python_files",
            CopyTarget::InitScripts => "copy_init_scripts",
            CopyTarget::EtcFiles => "copy_etc_files",
        }
    }
}

impl fmt::Display for CopyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target_name())
    }
}

impl FromStr for CopyTarget {
    type Err = WsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CopyTarget::ALL
            .into_iter()
            .find(|t| t.target_name() == s)
            .ok_or_else(|| WsError::UnknownTarget {
                name: s.to_string(),
            })
    }
}

/// Outcome of one copy task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub target: CopyTarget,
    pub destination: PathBuf,
    pub copied: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    NotStarted,
    Completed,
    Failed,
}

/// A URL pattern bound to the handler serving it.
#[derive(Clone)]
pub struct RouteSpec {
    pub pattern: String,
    pub handler: Arc<dyn WsHandler>,
}

impl RouteSpec {
    pub fn new(pattern: impl Into<String>, handler: Arc<dyn WsHandler>) -> Self {
        Self {
            pattern: pattern.into(),
            handler,
        }
    }
}

impl fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSpec")
            .field("pattern", &self.pattern)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// A discovered service: symbolic name, display label and its namespaced routes.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub label: String,
    pub handlers: Vec<RouteSpec>,
}

/// Application-wide data handlers can read while serving a request.
#[derive(Debug, Clone, Default)]
pub struct AppContext {
    pub routes: Vec<String>,
    pub settings: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct WsRequest {
    pub method: Method,
    pub uri: String,
    pub path: String,
    pub path_args: Vec<String>,
    pub remote_ip: Option<IpAddr>,
    pub body: Vec<u8>,
    pub app: Arc<AppContext>,
    arguments: Vec<(String, String)>,
}

impl WsRequest {
    /// Builds a request, collecting arguments from the query string and, for
    /// urlencoded forms, from the body.
    pub fn new(
        method: Method,
        uri: &str,
        content_type: Option<&str>,
        body: Vec<u8>,
        remote_ip: Option<IpAddr>,
        app: Arc<AppContext>,
    ) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query)),
            None => (uri.to_string(), None),
        };

        let mut arguments: Vec<(String, String)> = query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        let is_form = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|media| media.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        if is_form {
            arguments.extend(url::form_urlencoded::parse(&body).into_owned());
        }

        Self {
            method,
            uri: uri.to_string(),
            path,
            path_args: Vec::new(),
            remote_ip,
            body,
            app,
            arguments,
        }
    }

    /// Last value given for `name`, query string first then form body.
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn argument_or(&self, name: &str, default: &str) -> String {
        self.argument(name).unwrap_or(default).to_string()
    }

    pub fn required_argument(&self, name: &str) -> Result<&str, HandlerError> {
        self.argument(name).ok_or_else(|| {
            HandlerError::http(StatusCode::BAD_REQUEST, format!("Missing argument {}", name))
        })
    }

    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            HandlerError::http(StatusCode::BAD_REQUEST, format!("invalid JSON body: {}", e))
        })
    }

    /// `METHOD uri (ip)`, as written in the request log.
    pub fn summary(&self) -> String {
        let ip = self
            .remote_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!("{} {} ({})", self.method, self.uri, ip)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WsReply {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl WsReply {
    pub fn json(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: Some(body),
        }
    }

    pub fn empty(status: StatusCode) -> Self {
        Self { status, body: None }
    }

    pub fn not_implemented() -> Self {
        Self {
            status: StatusCode::NOT_IMPLEMENTED,
            body: Some(json!({ "message": "not yet implemented" })),
        }
    }

    /// Error reply built by a handler on purpose, as opposed to a failure
    /// escaping it.
    pub fn error_reply(message: &str, status: Option<StatusCode>, addit_infos: Option<&str>) -> Self {
        match addit_infos {
            Some(infos) => {
                tracing::error!("request error: {} (addit infos: {})", message, infos)
            }
            None => tracing::error!("request error: {}", message),
        }

        Self {
            status: status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: Some(json!({
                "message": message,
                "additInfos": addit_infos.unwrap_or(""),
            })),
        }
    }
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("HTTP {status}: {message}")]
    Http { status: StatusCode, message: String },

    #[error("{errtype}: {message}")]
    Internal {
        errtype: String,
        message: String,
        reason: Option<String>,
    },
}

impl HandlerError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        HandlerError::Http {
            status,
            message: message.into(),
        }
    }

    pub fn internal(errtype: impl Into<String>, message: impl Into<String>) -> Self {
        HandlerError::Internal {
            errtype: errtype.into(),
            message: message.into(),
            reason: None,
        }
    }

    pub fn with_reason(self, reason: impl Into<String>) -> Self {
        match self {
            HandlerError::Internal {
                errtype, message, ..
            } => HandlerError::Internal {
                errtype,
                message,
                reason: Some(reason.into()),
            },
            other => other,
        }
    }

    pub fn into_reply(self) -> WsReply {
        match self {
            HandlerError::Http { status, message } => WsReply {
                status,
                body: Some(json!({ "message": message })),
            },
            HandlerError::Internal {
                errtype,
                message,
                reason,
            } => WsReply {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: Some(json!({
                    "errtype": errtype,
                    "message": message,
                    "additInfos": reason.unwrap_or_default(),
                })),
            },
        }
    }
}

impl From<WsError> for HandlerError {
    fn from(e: WsError) -> Self {
        HandlerError::internal("WsError", e.to_string())
            .with_reason(e.recovery_suggestion())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::internal("SerializationError", e.to_string())
    }
}

pub type HandlerResult = std::result::Result<WsReply, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, content_type: Option<&str>, body: &str) -> WsRequest {
        WsRequest::new(
            Method::POST,
            uri,
            content_type,
            body.as_bytes().to_vec(),
            None,
            Arc::new(AppContext::default()),
        )
    }

    #[test]
    fn test_copy_target_names() {
        let names: Vec<&str> = CopyTarget::ALL.iter().map(|t| t.target_name()).collect();
        assert_eq!(
            names,
            vec![
                "copy_bin_files",
                "copy_python_files",
                "copy_init_scripts",
                "copy_etc_files"
            ]
        );
        assert_eq!(
            "copy_init_scripts".parse::<CopyTarget>().unwrap(),
            CopyTarget::InitScripts
        );
        assert!("copy_docs".parse::<CopyTarget>().is_err());
    }

    #[test]
    fn test_arguments_from_query_and_form() {
        let req = request(
            "/api/hello/say?to=Alice&lang=fr",
            Some("application/x-www-form-urlencoded; charset=UTF-8"),
            "to=Bob+Smith",
        );
        assert_eq!(req.path, "/api/hello/say");
        assert_eq!(req.argument("to"), Some("Bob Smith"));
        assert_eq!(req.argument("lang"), Some("fr"));
        assert_eq!(req.argument_or("missing", "World"), "World");
        assert!(req.required_argument("missing").is_err());
    }

    #[test]
    fn test_form_media_type_is_case_insensitive() {
        let req = request("/x", Some("Application/X-WWW-Form-URLEncoded ; charset=utf-8"), "to=Bob");
        assert_eq!(req.argument("to"), Some("Bob"));

        let req = request("/x", Some("application/x-www-form-urlencoded-v2"), "to=Bob");
        assert_eq!(req.argument("to"), None);
    }

    #[test]
    fn test_body_ignored_when_not_a_form() {
        let req = request("/x?to=Alice", Some("application/json"), "{\"to\":\"Bob\"}");
        assert_eq!(req.argument("to"), Some("Alice"));

        #[derive(serde::Deserialize)]
        struct Payload {
            to: String,
        }
        let payload: Payload = req.json_body().unwrap();
        assert_eq!(payload.to, "Bob");
    }

    #[test]
    fn test_handler_error_replies() {
        let reply = HandlerError::http(StatusCode::FORBIDDEN, "nope").into_reply();
        assert_eq!(reply.status, StatusCode::FORBIDDEN);
        assert_eq!(reply.body, Some(json!({ "message": "nope" })));

        let reply = HandlerError::internal("ValueError", "bad value")
            .with_reason("out of range")
            .into_reply();
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            reply.body,
            Some(json!({
                "errtype": "ValueError",
                "message": "bad value",
                "additInfos": "out of range"
            }))
        );
    }

    #[test]
    fn test_error_reply_defaults_to_500() {
        let reply = WsReply::error_reply("device offline", None, None);
        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            reply.body,
            Some(json!({ "message": "device offline", "additInfos": "" }))
        );
    }
}
