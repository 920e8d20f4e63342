//! Startup-time discovery of the services installed in the services home.
//!
//! A service is a sub-directory of the home holding a `MANIFEST` file, whose
//! name matches a plugin registered in the [`ServiceRegistry`]. Discovery
//! happens once; services cannot be plugged in or out afterwards.
//!
//! Routes declared by a service are relative to its namespace: `/bar` in
//! service `foo` is served at `<url base>/foo/bar`, whatever the slashes at
//! the junction.

use crate::core::manifest::{ServiceManifest, MANIFEST_FILE_NAME};
use crate::domain::model::{RouteSpec, ServiceDescriptor};
use crate::domain::ports::{ServiceContext, WebService};
use crate::utils::error::{Result, WsError};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub type ServiceFactory = fn() -> Box<dyn WebService>;

/// Compiled-in service plugins, by service name.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    factories: BTreeMap<String, ServiceFactory>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, factory: ServiceFactory) -> &mut Self {
        self.factories.insert(name.to_string(), factory);
        self
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn WebService>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}

/// Prefixes a service-relative rule with the service namespace.
pub fn namespaced_url(url_base: &str, service_name: &str, rule: &str) -> String {
    format!(
        "{}/{}/{}",
        url_base.trim_end_matches('/'),
        service_name,
        rule.trim_start_matches('/')
    )
}

fn check_route(pattern: &str) -> Result<()> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| WsError::InvalidRoute {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Scans `home` and loads every valid service, sorted by name.
///
/// Unregistered services and unknown route table names abort the whole
/// discovery. A failing init hook or an invalid route only drops the
/// service concerned.
pub fn discover_services(
    home: &Path,
    url_base: &str,
    registry: &ServiceRegistry,
) -> Result<Vec<ServiceDescriptor>> {
    tracing::debug!("discovering services stored in {}", home.display());

    let mut names: Vec<String> = fs::read_dir(home)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    let mut services = Vec::new();
    for service_name in names {
        let service_path = home.join(&service_name);
        tracing::info!("analysing directory {}...", service_path.display());

        let manifest_path = service_path.join(MANIFEST_FILE_NAME);
        if !manifest_path.is_file() {
            tracing::info!("*** expected files not found => discarded");
            continue;
        }
        tracing::info!("... valid service location");

        let manifest = ServiceManifest::from_file(&manifest_path)?;
        tracing::info!("... loading service '{}'...", service_name);

        let mut plugin = registry.create(&service_name).ok_or_else(|| {
            let err = WsError::UnknownService {
                name: service_name.clone(),
            };
            tracing::error!("{}", err);
            err
        })?;

        match load_service(plugin.as_mut(), &service_name, &manifest, url_base) {
            Ok(descriptor) => {
                tracing::info!(">>> success");
                services.push(descriptor);
            }
            Err(e @ WsError::MissingMapping { .. }) => {
                tracing::error!("{}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::error!("{}", e);
                tracing::error!(
                    "*** Could not load service '{}' because of previous error",
                    service_name
                );
            }
        }
    }
    Ok(services)
}

fn load_service(
    plugin: &mut dyn WebService,
    service_name: &str,
    manifest: &ServiceManifest,
    url_base: &str,
) -> Result<ServiceDescriptor> {
    let ctx = ServiceContext {
        name: service_name.to_string(),
        span: tracing::info_span!("service", name = %service_name),
        settings: manifest.settings.clone(),
    };
    tracing::info!("... invoking service init hook...");
    plugin.init(&ctx).map_err(|e| match e {
        e @ WsError::ServiceInitError { .. } => e,
        other => WsError::ServiceInitError {
            service: service_name.to_string(),
            message: other.to_string(),
        },
    })?;
    tracing::info!("... service init OK");

    let mapping = &manifest.service.mapping;
    let rules = plugin
        .route_table(mapping)
        .ok_or_else(|| WsError::MissingMapping {
            service: service_name.to_string(),
            mapping: mapping.clone(),
        })?;

    let mut handlers = Vec::with_capacity(rules.len());
    for rule in rules {
        let effective_url = namespaced_url(url_base, service_name, &rule.pattern);
        check_route(&effective_url)?;
        handlers.push(RouteSpec::new(effective_url, rule.handler));
    }

    Ok(ServiceDescriptor {
        name: service_name.to_string(),
        label: manifest.service.label.clone(),
        handlers,
    })
}
