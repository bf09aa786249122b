//! service-core: Shared infrastructure for the video studio services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
