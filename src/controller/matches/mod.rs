pub mod http_handlers;
pub mod service;

pub use http_handlers::*;
pub use service::*;
