//! Lua-backed execution of single-document commands against Redis.

pub mod commands;
pub mod executor;
pub mod scripts;

pub use executor::execute_command;
