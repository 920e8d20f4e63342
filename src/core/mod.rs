pub mod discovery;
pub mod dist;
pub mod manifest;
pub mod package_manifest;
pub mod request_log;
pub mod routing;
pub mod server;

pub use crate::domain::model::{CopyReport, CopyTarget, ServiceDescriptor, WsReply, WsRequest};
pub use crate::domain::ports::{CopyTask, WebService, WsHandler};
pub use crate::utils::error::Result;
