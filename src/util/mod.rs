//! Utility modules: logging setup and configuration files

pub mod config;
pub mod logger;
