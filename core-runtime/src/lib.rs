//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the HTTP bridge:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the bridge core depends on. It
//! establishes the logging conventions and the validated configuration from
//! which a bridge factory, its baseline transport context and its fetch
//! engine are built.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{BridgeConfig, BridgeConfigBuilder};
pub use error::{Error, Result};
