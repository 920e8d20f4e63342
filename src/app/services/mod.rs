pub mod diags;
pub mod hello;

use crate::core::discovery::ServiceRegistry;

/// Registry holding the services shipped with this package.
pub fn builtin_registry() -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    registry
        .register(diags::SERVICE_NAME, diags::create)
        .register(hello::SERVICE_NAME, hello::create);
    registry
}
