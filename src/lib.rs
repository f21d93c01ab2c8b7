//! reply-proxy: chat widget client and reply proxy for an OpenAI-compatible API
//!
//! Features:
//! - Stateless single-turn proxy that injects a persona and the API key
//! - Uniform `{reply, error?}` envelope with CORS headers on every path
//! - Widget-side client that always resolves to displayable text
//! - Terminal chat widget driving the same client

pub mod api;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod proxy;
pub mod widget;

pub use client::{ProxyClient, ReplySource};
pub use config::{AppConfig, Credential};
pub use proxy::{run_server, ReplyProxy};
pub use widget::ChatWidget;
