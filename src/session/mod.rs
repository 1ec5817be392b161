//! Engine session and its configuration

mod config;
#[allow(clippy::module_inception)]
mod session;

pub use config::{ConfigError, ConfigResult, EngineConfig};
pub use session::Session;
