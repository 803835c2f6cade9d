//! # Tableau Common Library
//!
//! Shared code for the Tableau dashboard services:
//! - Error type and result alias
//! - TOML configuration model and file resolution
//! - Clock abstraction (wall clock and a manual clock for tests)
//! - Generic TTL cache store
//! - Event types and the broadcast `EventBus`
//! - Server-Sent Events helpers

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod time;

pub use cache::{CacheStats, TtlCache};
pub use error::{Error, Result};
pub use time::{Clock, ManualClock, SystemClock};
