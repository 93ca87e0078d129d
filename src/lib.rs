//! Aggregates subscription quota and credit balances across AI coding
//! providers (Claude, Codex, z.ai, OpenRouter, OpenCode Zen) into one
//! normalized, cached payload for a host UI.

pub mod config;
pub mod plugin_paths;
pub mod usage;
pub mod usage_reset;
