//! Wire types for the widget-facing and upstream-facing APIs

mod chat;
mod openai;

pub use chat::*;
pub use openai::*;
