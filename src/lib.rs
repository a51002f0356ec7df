//! servertee - process-wide stdout tee with live record streaming
//!
//! Everything the process writes to stdout is split into lines, stamped,
//! mirrored to the original console, appended to a log file and broadcast to
//! any number of live subscribers.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod helper;
pub mod redirect;
pub mod server;
pub mod tee;

pub use error::TeeError;
pub use redirect::StdoutTee;
pub use tee::{Interceptor, TeeOptions, TeeWriter};
