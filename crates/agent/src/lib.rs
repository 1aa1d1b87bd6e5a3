//! Sysguard agent internals: HTTP API and configuration

pub mod api;
pub mod config;
