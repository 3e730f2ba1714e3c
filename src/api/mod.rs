//! Keep-alive HTTP surface
//!
//! Hosting platforms that idle sleeping processes ping `/health`; `/status`
//! exposes the same view as the Telegram `/status` command as JSON.

pub mod server;

pub use server::{create_app, AppState, StatusReport};
