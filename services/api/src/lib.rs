//! services/api/src/lib.rs
//!
//! The shared reading groups service: storage adapters, configuration and the
//! axum web layer. The binaries in `src/bin` wire these together.

pub mod adapters;
pub mod config;
pub mod error;
pub mod import;
pub mod sweeper;
pub mod web;

pub use web::build_router;
