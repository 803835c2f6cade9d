//! HTTP, WebSocket and SSE endpoints

pub mod art;
pub mod cache;
pub mod dashboard;
pub mod health;
pub mod mode;
pub mod sse;
pub mod ws;

pub use health::health_routes;
