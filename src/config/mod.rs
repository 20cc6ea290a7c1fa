//! Configuration management for the engine.
//!
//! # Configuration File Format
//!
//! Configuration is stored in TOML format. The search order is:
//! 1. `./acton-engine.toml` (project-local)
//! 2. `~/.config/acton-engine/config.toml` (XDG config)
//!
//! # Example Configuration
//!
//! ```toml
//! max_turns = 20
//! tool_timeout_secs = 30
//! task_deadline_secs = 600
//! max_attempts = 3
//! protocol = "tagged-inline"
//!
//! [workspace]
//! allowed_commands = ["cargo", "ls", "git"]
//!
//! [logging]
//! level = "info"
//! log_dir = "/var/log/acton-engine"
//! ```

mod file;
mod types;

pub use file::{from_path, from_str, load, search_paths, xdg_config_dir};
pub use types::{
    EngineConfig, WorkspaceConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_TURNS,
    DEFAULT_TASK_DEADLINE_SECS, DEFAULT_TOOL_TIMEOUT_SECS,
};
