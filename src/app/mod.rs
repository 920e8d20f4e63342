// Application layer: concrete copy tasks and the services shipped with the package.

pub mod services;
pub mod tasks;
