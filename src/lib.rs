//! Library crate for netzap-console: scan orchestration, result storage and
//! the HTTP API in front of a ZMap scan engine.
pub mod command;
pub mod engine;
pub mod error;
pub mod export;
pub mod normalize;
pub mod orchestrator;
pub mod request;
pub mod server;
pub mod store;
pub mod targets;
pub mod types;

pub use error::{ConsoleError, Result};
