//! A small coding agent for the terminal.
//!
//! The model gets exactly one tool, either writing files or running shell
//! commands, and keeps calling it until it can answer the request. The
//! crate ships the `mini-cursor` binary, and everything it is assembled
//! from can be used as a library as well.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod repl;
mod session;
pub mod tools;

pub use config::{Config, ConfigError};
pub use repl::{PROMPT, Repl};
pub use session::{Session, SessionBuilder, ToolKind};

/// Re-exports of [`mini_cursor_core`] crate.
pub mod core {
    pub use mini_cursor_core::*;
}
