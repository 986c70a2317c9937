//! Warden HTTP gateway
//!
//! Accepts authorization requests, authenticates management calls with
//! bearer tokens, and serves Prometheus metrics. All decision logic lives in
//! `warden-authz`; this crate is the thin transport around it.

pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use routes::router;
pub use state::{AppState, DirectoryResolver};
