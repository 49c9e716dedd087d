//! Pathway relay - a pass-through proxy for Credential Finder pathway pages
//!
//! This library provides a thin HTTP relay that:
//! - Fetches pathway pages from a fixed upstream origin
//! - Injects a stylesheet link and a script block before `</head>`
//! - Rewrites upstream links so the browser keeps routing through the relay
//! - Serves assets from a local directory when present, upstream otherwise

pub mod assets;
pub mod config;
pub mod error;
pub mod mime;
pub mod relay;
pub mod rewrite;
pub mod upstream;

/// Version information for the relay
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
