//! Shared utilities for mcp-relay
//!
//! Tracing setup and the environment-driven [`Settings`] used by both
//! front ends.

pub mod config;
pub mod logging;

pub use config::{ConfigError, Settings, SlackSettings, read_prompt};
pub use logging::{LogFormat, init_tracing};
