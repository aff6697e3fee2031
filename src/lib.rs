//! Workspace facade crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `http-bridge-workspace`
//! and enable the documented features without needing to wire each crate
//! individually. With `desktop-shims` (on by default) the reqwest engine is
//! used when no fetch engine is injected.

pub use core_bridge::*;
