// Domain layer: core models and ports (interfaces) shared by the packaging
// and web service sides.

pub mod model;
pub mod ports;
