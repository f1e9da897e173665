//! I/O helpers for bt commands.

pub mod agent;
pub mod atomic;
pub mod clock;
pub mod config;
pub mod gates;
pub mod gh;
pub mod git;
pub mod invoker;
pub mod notify;
pub mod paths;
pub mod process;
pub mod progress_store;
pub mod prompt;
pub mod scaffold;
pub mod staged;
