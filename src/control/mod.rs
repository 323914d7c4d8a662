//! Structured message link between the supervisor and its worker processes.
//!
//! Framing is one JSON object per line: supervisor → worker over the worker's stdin,
//! worker → supervisor over its stdout.

mod codec;
mod message;

pub use codec::{ControlReader, ControlWriter, decode_line, encode_line};
pub use message::{BROADCAST, ControlMessage, SUPERVISOR_NAME};
