//! HTTP reply proxy

mod handler;
pub mod replies;
pub mod server;
pub mod upstream;

pub use handler::{json_response, preflight_response, with_cors, ReplyProxy, CORS_HEADERS};
pub use server::{build_router, run_server, serve, ProxyState};
pub use upstream::{Completion, UpstreamClient, UpstreamError};
