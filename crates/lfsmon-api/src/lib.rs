#![warn(missing_docs)]

//! Lustre monitor request layer: REST API, configuration, CLI and auth helpers

pub mod api;
pub mod cli;
pub mod config;
pub mod security;

pub use api::MonitorApi;
pub use config::MonitorConfig;
