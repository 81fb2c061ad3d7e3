//! CLI module - interactive interface for Webpilot

pub mod commands;
pub mod repl;

pub use repl::Repl;
