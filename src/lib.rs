//! Web admin panel backend library.
//!
//! Provides the privileged request boundary for the panel: session
//! lifecycle/validation and sandboxed file browsing. The binary entry
//! point is in main.rs.

pub mod api;
pub mod audit;
pub mod config;
pub mod files;
pub mod kv;
pub mod sandbox;
pub mod server;
pub mod session;
pub mod users;
