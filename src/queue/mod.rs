//! Command queue (gateway → worker hand-off)

pub mod client;
pub mod messages;

pub use client::{CommandQueue, STREAM_NAME};
pub use messages::{QueueMessage, CMD_SUBJECT_PREFIX};
