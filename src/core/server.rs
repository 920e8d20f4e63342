//! HTTP application server hosting the discovered services.

use crate::core::discovery::{discover_services, ServiceRegistry};
use crate::core::request_log::RequestLogger;
use crate::core::routing::{fallback_handlers, process_request, RouteTable};
use crate::domain::model::{AppContext, RouteSpec, ServiceDescriptor, WsReply, WsRequest};
use crate::utils::error::{Result, WsError};
use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{Map, Value};
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::net::TcpListener;

pub const APP_NAME: &str = "wsapi";
pub const DEFAULT_URL_BASE: &str = "/api/";
pub const DEFAULT_PORT: u16 = 8888;
/// Where the package installs the application data.
pub const DEFAULT_APP_HOME: &str = "/opt/cstbox/lib/python/pycstbox/webservices";
pub const DEFAULT_SERVICES_HOME: &str = "/opt/cstbox/lib/python/pycstbox/webservices/services";

#[derive(Clone)]
struct AppState {
    table: Arc<RouteTable>,
    context: Arc<AppContext>,
    request_log: Arc<RequestLogger>,
}

pub struct AppServer {
    url_base: String,
    port: u16,
    debug: bool,
    app_home: PathBuf,
    services_home: PathBuf,
    registry: ServiceRegistry,
    services: Mutex<Option<Vec<ServiceDescriptor>>>,
    toplevel_handlers: Vec<RouteSpec>,
    fallback_handlers: Vec<RouteSpec>,
    request_log: Arc<RequestLogger>,
    running: AtomicBool,
}

impl AppServer {
    pub fn new(url_base: &str, port: u16, debug: bool) -> Self {
        if debug {
            tracing::warn!("AppServer instantiated with debug mode activated");
        }
        Self {
            url_base: url_base.to_string(),
            port,
            debug,
            app_home: PathBuf::from(DEFAULT_APP_HOME),
            services_home: PathBuf::from(DEFAULT_SERVICES_HOME),
            registry: ServiceRegistry::new(),
            services: Mutex::new(None),
            toplevel_handlers: Vec::new(),
            fallback_handlers: fallback_handlers(),
            request_log: Arc::new(RequestLogger::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Base directory relative services homes are resolved against.
    pub fn with_app_home<P: Into<PathBuf>>(mut self, app_home: P) -> Self {
        self.app_home = app_home.into();
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url_base(&self) -> &str {
        &self.url_base
    }

    pub fn services_home(&self) -> &Path {
        &self.services_home
    }

    /// Overrides the services home. Relative paths are taken from the
    /// application home; the result must be an existing directory.
    pub fn set_services_home<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if path == self.services_home {
            return Ok(());
        }
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.app_home.join(path)
        };
        if !path.is_dir() {
            return Err(WsError::InvalidConfigValueError {
                field: "services_home".to_string(),
                value: path.display().to_string(),
                reason: "not an existing directory".to_string(),
            });
        }
        tracing::info!("services_home overridden to {}", path.display());
        self.services_home = path;
        self.services
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        Ok(())
    }

    /// Rules dispatched before any service rule.
    pub fn add_toplevel_handler(&mut self, spec: RouteSpec) {
        self.toplevel_handlers.push(spec);
    }

    /// Discovered services. Discovery runs on first access only.
    pub fn services(&self) -> Result<Vec<ServiceDescriptor>> {
        let mut cache = self.services.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(services) = cache.as_ref() {
            return Ok(services.clone());
        }

        let services = discover_services(&self.services_home, &self.url_base, &self.registry)?;
        if services.is_empty() {
            tracing::warn!("No service found");
        }
        *cache = Some(services.clone());
        Ok(services)
    }

    /// Builds the axum router for the discovered services. Custom settings
    /// win over the built-in ones.
    pub fn router(&self, custom_settings: Map<String, Value>) -> Result<Router> {
        let mut settings = Map::new();
        settings.insert("debug".to_string(), Value::Bool(self.debug));
        settings.extend(custom_settings);

        let services = self.services()?;
        let table = RouteTable::build(&self.toplevel_handlers, &services, &self.fallback_handlers)?;

        tracing::info!("url dispatch rules:");
        for (pattern, handler) in table.rules() {
            tracing::info!(" - {} -> {}", pattern, handler);
        }

        let context = AppContext {
            routes: table.patterns(),
            settings,
        };
        let state = AppState {
            table: Arc::new(table),
            context: Arc::new(context),
            request_log: self.request_log.clone(),
        };

        Ok(Router::new().fallback(dispatch).with_state(state))
    }

    /// Listens on all interfaces until SIGTERM or SIGINT.
    pub async fn start(&self, custom_settings: Map<String, Value>) -> Result<()> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| WsError::ServerError {
            message: format!("cannot listen on {}: {}", addr, e),
        })?;
        self.serve(listener, custom_settings, shutdown_signal()).await
    }

    /// Serves on `listener` until `shutdown` completes. The server can be
    /// started again once this returns.
    pub async fn serve<F>(
        &self,
        listener: TcpListener,
        custom_settings: Map<String, Value>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(WsError::AlreadyStarted);
        }
        let _running = RunningGuard(&self.running);

        tracing::info!("server initializing");
        let router = self.router(custom_settings)?;

        let local_addr = listener.local_addr()?;
        tracing::info!("listening on port {}", local_addr.port());
        tracing::info!("web server started");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| WsError::ServerError {
            message: e.to_string(),
        })?;

        tracing::info!("terminated");
        Ok(())
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn dispatch(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();

    let raw_uri = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let mut req = WsRequest::new(
        method,
        &raw_uri,
        content_type,
        body.to_vec(),
        connect_info.map(|ConnectInfo(addr)| addr.ip()),
        state.context.clone(),
    );

    let (reply, disable_logging) = match state.table.resolve(&req.path) {
        Some((handler, path_args)) => {
            req.path_args = path_args;
            let reply = process_request(handler.as_ref(), &req).await;
            (reply, handler.disable_request_logging())
        }
        None => (WsReply::empty(StatusCode::NOT_FOUND), false),
    };

    state.request_log.log_request(
        reply.status,
        &req.uri,
        &req.summary(),
        disable_logging,
        start.elapsed(),
    );

    into_response(reply)
}

fn into_response(reply: WsReply) -> Response {
    match reply.body {
        Some(body) => (reply.status, Json(body)).into_response(),
        None => (reply.status, Body::empty()).into_response(),
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("SIGINT received."),
            Err(e) => {
                tracing::warn!("cannot listen for SIGINT: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("SIGTERM received.");
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("stopping server loop.");
}

impl Default for AppServer {
    fn default() -> Self {
        Self::new(DEFAULT_URL_BASE, DEFAULT_PORT, false)
    }
}
