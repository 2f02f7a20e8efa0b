// src/exec/mod.rs

//! Concrete task implementations.
//!
//! - [`command`] runs a shell command per invocation; this is what the
//!   config-driven `dagrun` binary registers for every `[task.<name>]`.

pub mod command;

pub use command::CommandTask;
