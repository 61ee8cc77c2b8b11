//! Caddy management module
//!
//! This module contains all functionality related to the Caddy web server:
//! - Installation from the vendor apt repository
//! - Service lifecycle (restart, status, stop, removal)
//! - Reverse proxy rules kept in a registry file and mirrored into the Caddyfile

pub mod installer;
pub mod proxy;
pub mod registry;
pub mod service;
