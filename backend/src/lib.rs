//! Task management HTTP API.

pub mod app;
pub mod config;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod service;
pub mod storage;

pub use app::{router, AppState};
pub use config::Config;
