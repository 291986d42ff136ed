//! HTTP server

mod http;

pub use http::{route, run, serve, AppState};
